//! Entity lifecycle through the sidecar: cascades on delete, seat
//! uniqueness, resize truncation, and persistence across restarts.

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_seatmond");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn seatmond");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn result(value: &serde_json::Value) -> &serde_json::Value {
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "expected ok response, got {}",
        value
    );
    value.get("result").expect("result")
}

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    value
        .pointer("/error/code")
        .and_then(|v| v.as_str())
        .expect("error code")
}

struct Harness {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Harness {
    fn start(workspace: &PathBuf) -> Harness {
        let (child, stdin, reader) = spawn_sidecar();
        let mut h = Harness {
            child,
            stdin,
            reader,
            next_id: 0,
        };
        let resp = h.call(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        result(&resp);
        h
    }

    fn call(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        request(
            &mut self.stdin,
            &mut self.reader,
            &self.next_id.to_string(),
            method,
            params,
        )
    }

    fn state(&mut self) -> serde_json::Value {
        let resp = self.call("state.get", json!({}));
        result(&resp).get("state").expect("state").clone()
    }

    fn stop(mut self) {
        let _ = self.child.kill();
    }
}

#[test]
fn duplicate_names_are_rejected_case_insensitively() {
    let workspace = temp_dir("seatmon-dup");
    let mut h = Harness::start(&workspace);

    let created = h.call("classes.create", json!({ "name": "P1", "rows": 2, "cols": 2 }));
    let class_id = result(&created)
        .get("classId")
        .and_then(|v| v.as_str())
        .expect("classId")
        .to_string();

    let added = h.call("students.add", json!({ "classId": class_id, "name": "Ada" }));
    let ada = result(&added)
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();

    let dup = h.call("students.add", json!({ "classId": class_id, "name": "  ada " }));
    assert_eq!(error_code(&dup), "duplicate_name");

    let ben = h.call("students.add", json!({ "classId": class_id, "name": "Ben" }));
    let ben = result(&ben)
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();

    let clash = h.call(
        "students.rename",
        json!({ "classId": class_id, "studentId": ben, "name": "ADA" }),
    );
    assert_eq!(error_code(&clash), "duplicate_name");

    // Renaming to your own name (different casing) is fine.
    let own = h.call(
        "students.rename",
        json!({ "classId": class_id, "studentId": ada, "name": "ADA" }),
    );
    result(&own);

    h.stop();
}

#[test]
fn a_student_occupies_at_most_one_seat() {
    let workspace = temp_dir("seatmon-oneseat");
    let mut h = Harness::start(&workspace);

    let created = h.call("classes.create", json!({ "name": "P1", "rows": 1, "cols": 3 }));
    let class_id = result(&created)
        .get("classId")
        .and_then(|v| v.as_str())
        .expect("classId")
        .to_string();
    let added = h.call("students.add", json!({ "classId": class_id, "name": "Ada" }));
    let ada = result(&added)
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();

    result(&h.call(
        "seating.assign",
        json!({ "classId": class_id, "r": 0, "c": 0, "studentId": ada }),
    ));
    result(&h.call(
        "seating.assign",
        json!({ "classId": class_id, "r": 0, "c": 2, "studentId": ada }),
    ));

    let doc = h.state();
    let seats = doc
        .pointer("/classes/1/seats")
        .and_then(|v| v.as_array())
        .expect("seats");
    let occupied: Vec<(u64, u64)> = seats
        .iter()
        .filter(|s| s.get("studentId").map(|v| !v.is_null()).unwrap_or(false))
        .map(|s| {
            (
                s.get("r").and_then(|v| v.as_u64()).unwrap_or(99),
                s.get("c").and_then(|v| v.as_u64()).unwrap_or(99),
            )
        })
        .collect();
    assert_eq!(occupied, vec![(0, 2)]);

    h.stop();
}

#[test]
fn deletions_cascade_across_the_document() {
    let workspace = temp_dir("seatmon-cascade");
    let mut h = Harness::start(&workspace);

    let created = h.call("classes.create", json!({ "name": "P1", "rows": 2, "cols": 2 }));
    let class_id = result(&created)
        .get("classId")
        .and_then(|v| v.as_str())
        .expect("classId")
        .to_string();
    let added = h.call("students.add", json!({ "classId": class_id, "name": "Ada" }));
    let ada = result(&added)
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();
    let skill = h.call("skills.create", json!({ "name": "Integers" }));
    let skill_id = result(&skill)
        .get("skillId")
        .and_then(|v| v.as_str())
        .expect("skillId")
        .to_string();

    result(&h.call(
        "seating.assign",
        json!({ "classId": class_id, "r": 1, "c": 1, "studentId": ada }),
    ));
    result(&h.call(
        "marks.set",
        json!({ "classId": class_id, "skillId": skill_id, "studentId": ada, "level": 3 }),
    ));
    result(&h.call("skills.select", json!({ "skillId": skill_id })));

    // Deleting the student unassigns the seat and clears their marks.
    result(&h.call(
        "students.delete",
        json!({ "classId": class_id, "studentId": ada }),
    ));
    let doc = h.state();
    assert!(doc
        .pointer("/classes/1/seats")
        .and_then(|v| v.as_array())
        .expect("seats")
        .iter()
        .all(|s| s.get("studentId").map(|v| v.is_null()).unwrap_or(false)));
    assert!(doc
        .pointer("/classes/1/marks")
        .and_then(|v| v.as_object())
        .expect("marks")
        .is_empty());

    // Deleting the skill clears the selection that pointed at it.
    result(&h.call("skills.delete", json!({ "skillId": skill_id })));
    let doc = h.state();
    assert!(doc.get("selectedSkillId").expect("selection").is_null());
    assert_eq!(
        doc.get("skills").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    // Deleting the class prunes it from skill links and repairs selection.
    let skill = h.call("skills.create", json!({ "name": "Volume" }));
    let skill_id = result(&skill)
        .get("skillId")
        .and_then(|v| v.as_str())
        .expect("skillId")
        .to_string();
    result(&h.call("classes.delete", json!({ "classId": class_id })));
    let doc = h.state();
    let linked = doc
        .pointer("/skills/0/classIds")
        .and_then(|v| v.as_array())
        .expect("classIds");
    assert!(linked.iter().all(|v| v.as_str() != Some(class_id.as_str())));
    assert_ne!(
        doc.get("selectedClassId").and_then(|v| v.as_str()),
        Some(class_id.as_str())
    );
    let _ = skill_id;

    h.stop();
}

#[test]
fn shrinking_the_grid_drops_out_of_range_occupants() {
    let workspace = temp_dir("seatmon-shrink");
    let mut h = Harness::start(&workspace);

    let created = h.call("classes.create", json!({ "name": "P1", "rows": 1, "cols": 2 }));
    let class_id = result(&created)
        .get("classId")
        .and_then(|v| v.as_str())
        .expect("classId")
        .to_string();
    let added = h.call("students.add", json!({ "classId": class_id, "name": "Ada" }));
    let ada = result(&added)
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();
    result(&h.call(
        "seating.assign",
        json!({ "classId": class_id, "r": 0, "c": 1, "studentId": ada }),
    ));

    let resized = h.call(
        "classes.resize",
        json!({ "classId": class_id, "rows": 1, "cols": 1 }),
    );
    assert_eq!(
        result(&resized).get("seatCount").and_then(|v| v.as_u64()),
        Some(1)
    );
    let doc = h.state();
    assert!(doc
        .pointer("/classes/1/seats/0/studentId")
        .expect("seat")
        .is_null());

    // Growing back re-synthesizes empty seats; the student stays unseated.
    result(&h.call(
        "classes.resize",
        json!({ "classId": class_id, "rows": 2, "cols": 2 }),
    ));
    let doc = h.state();
    let seats = doc
        .pointer("/classes/1/seats")
        .and_then(|v| v.as_array())
        .expect("seats");
    assert_eq!(seats.len(), 4);
    assert!(seats
        .iter()
        .all(|s| s.get("studentId").map(|v| v.is_null()).unwrap_or(false)));

    h.stop();
}

#[test]
fn state_survives_a_restart() {
    let workspace = temp_dir("seatmon-restart");

    let mut h = Harness::start(&workspace);
    let created = h.call("classes.create", json!({ "name": "Period 2", "rows": 3, "cols": 3 }));
    let class_id = result(&created)
        .get("classId")
        .and_then(|v| v.as_str())
        .expect("classId")
        .to_string();
    let added = h.call("students.add", json!({ "classId": class_id, "name": "Ada" }));
    result(&added);
    result(&h.call(
        "classes.setLayoutMode",
        json!({ "classId": class_id, "mode": "free" }),
    ));
    let before = h.state();
    h.stop();

    let mut h = Harness::start(&workspace);
    let after = h.state();
    assert_eq!(before, after);
    h.stop();
}
