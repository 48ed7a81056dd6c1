//! State normalization. Persisted documents arrive here as untrusted JSON
//! (old schema versions, hand-edited exports, partial writes) and leave as a
//! structurally valid `State`. Normalization is total: every input, however
//! malformed, produces a usable state without erroring. Unrecoverable
//! fragments are dropped rather than surfaced.

use crate::model::{
    cell_x, cell_y, clamp_dim, default_flags, ClassRoom, LayoutMode, Level, Marks, Seat, Skill,
    State, Student, DEFAULT_CLASS_NAME, DEFAULT_COLS, DEFAULT_ROWS, LEGACY_STANDARD_PREFIX,
    STUDENT_FLAGS, UNNAMED,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// Short opaque identifier. Collisions are not cryptographically bounded,
/// which is acceptable for a single teacher's entity population.
pub fn uid() -> String {
    let mut s = Uuid::new_v4().simple().to_string();
    s.truncate(8);
    s
}

/// Strip the legacy curriculum namespace from a standard code.
/// Case-insensitive, applied on every write path.
pub fn clean_standard(code: &str) -> String {
    let prefix = LEGACY_STANDARD_PREFIX;
    match code.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => code[prefix.len()..].to_string(),
        _ => code.to_string(),
    }
}

/// Map a stored mark value onto the canonical level set.
///
/// Two legacy encodings survive in old documents: raw 1 ("Help") from the
/// five-level scheme maps to Developing, and raw 4 ("Advanced", since
/// removed) maps to Proficient. Anything else outside {0,2,3,5} is not a
/// mark and is dropped.
pub fn canon_level(raw: &Value) -> Option<Level> {
    let n = raw.as_f64()?;
    if n.fract() != 0.0 {
        return None;
    }
    match n as i64 {
        0 => Some(Level::NoEvidence),
        1 | 2 => Some(Level::Developing),
        3 | 4 => Some(Level::Proficient),
        5 => Some(Level::Absent),
        _ => None,
    }
}

/// Normalize a raw JSON document. Unparseable input yields the default state.
pub fn normalize(raw: &str) -> State {
    match serde_json::from_str::<Value>(raw) {
        Ok(v) => normalize_value(&v),
        Err(_) => default_state(),
    }
}

/// Normalize an already-parsed value. Total: never panics, always returns a
/// state in which the selected class exists and every lattice is complete.
pub fn normalize_value(raw: &Value) -> State {
    let Some(obj) = raw.as_object() else {
        return default_state();
    };

    // Resolve class identifiers up front so lifted legacy skills can link to
    // the identifier the class will actually carry after normalization.
    let classes_raw: Vec<(String, Value)> = obj
        .get("classes")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .map(|v| {
                    let id = v
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(uid);
                    (id, v.clone())
                })
                .collect()
        })
        .unwrap_or_default();

    // One skill shape per pass: the flat global registry when present,
    // otherwise the legacy per-class lists are lifted into it.
    let skills = match obj.get("skills").and_then(Value::as_array) {
        Some(arr) => norm_skills_flat(arr),
        None => lift_embedded_skills(&classes_raw),
    };

    let mut classes: Vec<ClassRoom> = classes_raw
        .iter()
        .map(|(id, v)| norm_class(id.clone(), v))
        .collect();
    if classes.is_empty() {
        classes.push(default_class(DEFAULT_CLASS_NAME));
    }

    let selected_class_id = match obj.get("selectedClassId").and_then(Value::as_str) {
        Some(id) if classes.iter().any(|c| c.id == id) => id.to_string(),
        _ => classes[0].id.clone(),
    };
    let selected_skill_id = obj
        .get("selectedSkillId")
        .and_then(Value::as_str)
        .filter(|id| skills.iter().any(|s| s.id == *id))
        .map(str::to_string);
    let edit_assign_mode = obj
        .get("editAssignMode")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    State {
        classes,
        skills,
        selected_class_id,
        selected_skill_id,
        edit_assign_mode,
    }
}

pub fn new_class(name: &str, rows: u32, cols: u32) -> ClassRoom {
    let mut cl = ClassRoom {
        id: uid(),
        name: name.to_string(),
        rows,
        cols,
        seats: Vec::new(),
        students: Vec::new(),
        marks: Marks::new(),
        layout_mode: LayoutMode::Grid,
    };
    cl.rebuild_lattice(rows, cols);
    cl
}

pub fn default_class(name: &str) -> ClassRoom {
    new_class(name, DEFAULT_ROWS, DEFAULT_COLS)
}

pub fn default_state() -> State {
    let cl = default_class(DEFAULT_CLASS_NAME);
    let selected_class_id = cl.id.clone();
    State {
        classes: vec![cl],
        skills: Vec::new(),
        selected_class_id,
        selected_skill_id: None,
        edit_assign_mode: false,
    }
}

fn norm_class(id: String, raw: &Value) -> ClassRoom {
    let rows = grid_dim(raw.get("rows"), DEFAULT_ROWS);
    let cols = grid_dim(raw.get("cols"), DEFAULT_COLS);
    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("Class")
        .to_string();
    let layout_mode = raw
        .get("layoutMode")
        .and_then(Value::as_str)
        .and_then(LayoutMode::from_str_loose)
        .unwrap_or(LayoutMode::Grid);

    ClassRoom {
        id,
        name,
        rows,
        cols,
        seats: norm_seats(rows, cols, raw.get("seats")),
        students: norm_students(raw.get("students")),
        marks: norm_marks(raw.get("marks")),
        layout_mode,
    }
}

fn grid_dim(v: Option<&Value>, default: u32) -> u32 {
    match v.and_then(Value::as_f64) {
        Some(n) => clamp_dim(n),
        None => default,
    }
}

/// Produce exactly rows x cols seats in row-major order. Fragments matching
/// a cell are reused; out-of-bounds fragments are discarded on purpose
/// (shrinking the grid unassigns the students seated past the new edge).
fn norm_seats(rows: u32, cols: u32, raw: Option<&Value>) -> Vec<Seat> {
    let empty: Vec<Value> = Vec::new();
    let fragments = raw.and_then(Value::as_array).unwrap_or(&empty);
    let mut seats = Vec::with_capacity((rows * cols) as usize);
    for r in 0..rows {
        for c in 0..cols {
            let found = fragments.iter().find(|f| {
                cell_index(f.get("r")) == Some(r) && cell_index(f.get("c")) == Some(c)
            });
            seats.push(match found {
                Some(f) => seat_from_fragment(f, r, c, rows, cols),
                None => Seat::empty_at(r, c, rows, cols),
            });
        }
    }
    seats
}

fn seat_from_fragment(f: &Value, r: u32, c: u32, rows: u32, cols: u32) -> Seat {
    let student_id = f
        .get("studentId")
        .and_then(Value::as_str)
        .map(str::to_string);
    // Free-form coordinates travel as a pair; a seat missing either one is
    // re-centered in its grid cell.
    let x = f.get("x").and_then(Value::as_f64);
    let y = f.get("y").and_then(Value::as_f64);
    let (x, y) = match (x, y) {
        (Some(x), Some(y)) => (x, y),
        _ => (cell_x(c, cols), cell_y(r, rows)),
    };
    let rot = f.get("rot").and_then(Value::as_f64).unwrap_or(0.0);
    Seat {
        r,
        c,
        x,
        y,
        rot,
        student_id,
    }
}

fn cell_index(v: Option<&Value>) -> Option<u32> {
    let n = v?.as_f64()?;
    if n.fract() != 0.0 || n < 0.0 || n > u32::MAX as f64 {
        return None;
    }
    Some(n as u32)
}

/// A student without a string identifier cannot be re-linked to seats or
/// marks, so such entries are dropped rather than repaired. Duplicated
/// identifiers keep the first occurrence.
fn norm_students(raw: Option<&Value>) -> Vec<Student> {
    let Some(arr) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for v in arr {
        let Some(obj) = v.as_object() else { continue };
        let Some(sid) = obj.get("id").and_then(Value::as_str) else {
            continue;
        };
        if !seen.insert(sid) {
            continue;
        }
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(UNNAMED)
            .to_string();
        let mut flags = default_flags();
        if let Some(stored) = obj.get("flags").and_then(Value::as_object) {
            for key in STUDENT_FLAGS {
                if let Some(v) = stored.get(key) {
                    flags.insert(key.to_string(), truthy(v));
                }
            }
        }
        out.push(Student {
            id: sid.to_string(),
            name,
            flags,
        });
    }
    out
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn norm_marks(raw: Option<&Value>) -> Marks {
    let Some(obj) = raw.and_then(Value::as_object) else {
        return Marks::new();
    };
    let mut out = Marks::new();
    for (skill_id, cells) in obj {
        let Some(cells) = cells.as_object() else { continue };
        let mut canon = BTreeMap::new();
        for (student_id, lv) in cells {
            if let Some(level) = canon_level(lv) {
                canon.insert(student_id.clone(), level);
            }
        }
        if !canon.is_empty() {
            out.insert(skill_id.clone(), canon);
        }
    }
    out
}

fn opt_standard(v: Option<&Value>) -> Option<String> {
    let cleaned = clean_standard(v?.as_str()?);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn norm_skills_flat(arr: &[Value]) -> Vec<Skill> {
    let mut out = Vec::new();
    for v in arr {
        let Some(obj) = v.as_object() else { continue };
        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(uid);
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(UNNAMED)
            .to_string();
        out.push(Skill {
            id,
            name,
            domain: obj.get("domain").and_then(Value::as_str).map(str::to_string),
            standard_code: opt_standard(obj.get("standardCode")),
            description: obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            class_ids: dedup_ids(obj.get("classIds")),
        });
    }
    out
}

fn dedup_ids(v: Option<&Value>) -> Vec<String> {
    let Some(arr) = v.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for v in arr {
        if let Some(s) = v.as_str() {
            if !s.is_empty() && seen.insert(s) {
                out.push(s.to_string());
            }
        }
    }
    out
}

/// Lift per-class skill lists (the format before the global registry) into
/// flat global skills. Identity is the (name, domain, standard, description)
/// tuple: the same skill embedded in several classes becomes one entry
/// linked to all of them. The embedded lists are not carried forward.
fn lift_embedded_skills(classes: &[(String, Value)]) -> Vec<Skill> {
    let mut lifted: Vec<Skill> = Vec::new();
    let mut seen: HashMap<(String, String, String, String), usize> = HashMap::new();
    for (class_id, raw) in classes {
        let Some(arr) = raw.get("skills").and_then(Value::as_array) else {
            continue;
        };
        for sk in arr {
            let Some(obj) = sk.as_object() else { continue };
            let name = obj
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(UNNAMED)
                .to_string();
            let domain = obj.get("domain").and_then(Value::as_str).map(str::to_string);
            let standard_code = opt_standard(obj.get("standardCode"));
            let description = obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);
            let key = (
                name.clone(),
                domain.clone().unwrap_or_default(),
                standard_code.clone().unwrap_or_default(),
                description.clone().unwrap_or_default(),
            );
            match seen.get(&key) {
                Some(&i) => {
                    if !lifted[i].class_ids.contains(class_id) {
                        lifted[i].class_ids.push(class_id.clone());
                    }
                }
                None => {
                    let id = obj
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(uid);
                    seen.insert(key, lifted.len());
                    lifted.push(Skill {
                        id,
                        name,
                        domain,
                        standard_code,
                        description,
                        class_ids: vec![class_id.clone()],
                    });
                }
            }
        }
    }
    lifted
}
