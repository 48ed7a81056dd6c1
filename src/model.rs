use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

pub const GRID_MIN: u32 = 1;
pub const GRID_MAX: u32 = 24;
pub const DEFAULT_ROWS: u32 = 4;
pub const DEFAULT_COLS: u32 = 6;
pub const DEFAULT_CLASS_NAME: &str = "Period 1";
pub const UNNAMED: &str = "(unnamed)";

/// Standard codes were once namespaced under the state curriculum prefix.
/// They are stored stripped; the strip is case-insensitive.
pub const LEGACY_STANDARD_PREFIX: &str = "NC.7.";

/// Every student carries all of these flags, defaulting to false.
pub const STUDENT_FLAGS: [&str; 6] = ["ml", "mlNew", "iep504", "ec", "bubble", "ca"];

/// Mastery level. Wire values are 0/2/3/5; the gaps are legacy values
/// (1 "Help", 4 "Advanced") that are remapped on read and never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    NoEvidence,
    Developing,
    Proficient,
    Absent,
}

impl Level {
    pub fn code(self) -> u8 {
        match self {
            Level::NoEvidence => 0,
            Level::Developing => 2,
            Level::Proficient => 3,
            Level::Absent => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Level::NoEvidence => "N/A",
            Level::Developing => "Developing",
            Level::Proficient => "Proficient",
            Level::Absent => "Absent",
        }
    }

    /// Tap-to-cycle order used by the seat UI.
    pub fn next(self) -> Level {
        match self {
            Level::NoEvidence => Level::Developing,
            Level::Developing => Level::Proficient,
            Level::Proficient => Level::Absent,
            Level::Absent => Level::NoEvidence,
        }
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    Grid,
    Free,
    Snap,
}

impl LayoutMode {
    pub fn from_str_loose(s: &str) -> Option<LayoutMode> {
        match s {
            "grid" => Some(LayoutMode::Grid),
            "free" => Some(LayoutMode::Free),
            "snap" => Some(LayoutMode::Snap),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub r: u32,
    pub c: u32,
    pub x: f64,
    pub y: f64,
    pub rot: f64,
    pub student_id: Option<String>,
}

impl Seat {
    /// Empty seat centered in its grid cell, fractional 0..1 coordinates.
    pub fn empty_at(r: u32, c: u32, rows: u32, cols: u32) -> Seat {
        Seat {
            r,
            c,
            x: cell_x(c, cols),
            y: cell_y(r, rows),
            rot: 0.0,
            student_id: None,
        }
    }
}

/// Clamp a requested grid dimension into the supported range.
pub fn clamp_dim(n: f64) -> u32 {
    (n.floor() as i64).clamp(GRID_MIN as i64, GRID_MAX as i64) as u32
}

pub fn cell_x(c: u32, cols: u32) -> f64 {
    (c as f64 + 0.5) / cols.max(1) as f64
}

pub fn cell_y(r: u32, rows: u32) -> f64 {
    (r as f64 + 0.5) / rows.max(1) as f64
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub flags: BTreeMap<String, bool>,
}

pub fn default_flags() -> BTreeMap<String, bool> {
    STUDENT_FLAGS
        .iter()
        .map(|k| (k.to_string(), false))
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub class_ids: Vec<String>,
}

/// Two-level mark table: skill id -> student id -> level. Kept nested
/// rather than keyed by a joined "studentId:skillId" string so identifiers
/// containing the delimiter can never collide.
pub type Marks = BTreeMap<String, BTreeMap<String, Level>>;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRoom {
    pub id: String,
    pub name: String,
    pub rows: u32,
    pub cols: u32,
    pub seats: Vec<Seat>,
    pub students: Vec<Student>,
    pub marks: Marks,
    pub layout_mode: LayoutMode,
}

impl ClassRoom {
    pub fn seat(&self, r: u32, c: u32) -> Option<&Seat> {
        self.seats.iter().find(|s| s.r == r && s.c == c)
    }

    pub fn seat_mut(&mut self, r: u32, c: u32) -> Option<&mut Seat> {
        self.seats.iter_mut().find(|s| s.r == r && s.c == c)
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn student_mut(&mut self, id: &str) -> Option<&mut Student> {
        self.students.iter_mut().find(|s| s.id == id)
    }

    pub fn has_student_named(&self, name: &str, excluding: Option<&str>) -> bool {
        let wanted = name.trim().to_lowercase();
        self.students.iter().any(|s| {
            excluding != Some(s.id.as_str()) && s.name.trim().to_lowercase() == wanted
        })
    }

    /// Re-dimension the lattice in place. Seats still inside the new bounds
    /// keep their occupant and free-form position; everything else is
    /// dropped and new cells start empty.
    pub fn rebuild_lattice(&mut self, rows: u32, cols: u32) {
        let old = std::mem::take(&mut self.seats);
        self.rows = rows;
        self.cols = cols;
        let mut seats = Vec::with_capacity((rows * cols) as usize);
        for r in 0..rows {
            for c in 0..cols {
                match old.iter().find(|s| s.r == r && s.c == c) {
                    Some(s) => seats.push(s.clone()),
                    None => seats.push(Seat::empty_at(r, c, rows, cols)),
                }
            }
        }
        self.seats = seats;
    }

    /// Drop every mark recorded for the student, across all skills.
    pub fn clear_student_marks(&mut self, student_id: &str) {
        for cells in self.marks.values_mut() {
            cells.remove(student_id);
        }
        self.marks.retain(|_, cells| !cells.is_empty());
    }

    /// Unassign the student from whichever seat they occupy, if any.
    pub fn unassign_student(&mut self, student_id: &str) {
        for seat in &mut self.seats {
            if seat.student_id.as_deref() == Some(student_id) {
                seat.student_id = None;
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub classes: Vec<ClassRoom>,
    pub skills: Vec<Skill>,
    pub selected_class_id: String,
    pub selected_skill_id: Option<String>,
    pub edit_assign_mode: bool,
}

impl State {
    pub fn class(&self, id: &str) -> Option<&ClassRoom> {
        self.classes.iter().find(|c| c.id == id)
    }

    pub fn class_mut(&mut self, id: &str) -> Option<&mut ClassRoom> {
        self.classes.iter_mut().find(|c| c.id == id)
    }

    pub fn skill(&self, id: &str) -> Option<&Skill> {
        self.skills.iter().find(|s| s.id == id)
    }

    pub fn skill_mut(&mut self, id: &str) -> Option<&mut Skill> {
        self.skills.iter_mut().find(|s| s.id == id)
    }
}
