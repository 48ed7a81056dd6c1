use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::handlers::commit_ok;
use crate::ipc::types::{AppState, Request};
use crate::model::Level;
use crate::norm;
use serde_json::json;
use std::collections::BTreeMap;

const LEVELS: [Level; 4] = [
    Level::NoEvidence,
    Level::Developing,
    Level::Proficient,
    Level::Absent,
];

fn handle_marks_levels(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let levels: Vec<serde_json::Value> = LEVELS
        .iter()
        .map(|lv| json!({ "code": lv.code(), "label": lv.label() }))
        .collect();
    ok(&req.id, json!({ "levels": levels }))
}

fn handle_marks_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let Some(skill_id) = req.params.get("skillId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing skillId", None);
    };
    let Some(student_id) = req.params.get("studentId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };
    // null clears the cell back to "never evaluated"; a value must land in
    // the canonical set (legacy 1 and 4 are accepted and remapped).
    let level = match req.params.get("level") {
        Some(v) if v.is_null() => None,
        Some(v) => match norm::canon_level(v) {
            Some(lv) => Some(lv),
            None => return err(&req.id, "bad_params", "invalid level", None),
        },
        None => return err(&req.id, "bad_params", "missing level", None),
    };

    if container.state.skill(skill_id).is_none() {
        return err(&req.id, "not_found", "skill not found", None);
    }
    let Some(cl) = container.state.class_mut(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    if cl.student(student_id).is_none() {
        return err(&req.id, "not_found", "student not found", None);
    }

    match level {
        Some(lv) => {
            cl.marks
                .entry(skill_id.to_string())
                .or_insert_with(BTreeMap::new)
                .insert(student_id.to_string(), lv);
        }
        None => {
            if let Some(cells) = cl.marks.get_mut(skill_id) {
                cells.remove(student_id);
                if cells.is_empty() {
                    cl.marks.remove(skill_id);
                }
            }
        }
    }

    let result = json!({
        "classId": class_id,
        "skillId": skill_id,
        "studentId": student_id,
        "level": level.map(Level::code)
    });
    commit_ok(container, &req.id, result)
}

fn handle_marks_cycle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let Some(skill_id) = req.params.get("skillId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing skillId", None);
    };
    let Some(student_id) = req.params.get("studentId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };

    if container.state.skill(skill_id).is_none() {
        return err(&req.id, "not_found", "skill not found", None);
    }
    let Some(cl) = container.state.class_mut(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    if cl.student(student_id).is_none() {
        return err(&req.id, "not_found", "student not found", None);
    }

    // A cell that was never evaluated cycles as if it were at N/A.
    let current = cl
        .marks
        .get(skill_id)
        .and_then(|cells| cells.get(student_id))
        .copied()
        .unwrap_or(Level::NoEvidence);
    let next = current.next();
    cl.marks
        .entry(skill_id.to_string())
        .or_insert_with(BTreeMap::new)
        .insert(student_id.to_string(), next);

    let result = json!({
        "classId": class_id,
        "skillId": skill_id,
        "studentId": student_id,
        "level": next.code(),
        "label": next.label()
    });
    commit_ok(container, &req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.levels" => Some(handle_marks_levels(state, req)),
        "marks.set" => Some(handle_marks_set(state, req)),
        "marks.cycle" => Some(handle_marks_cycle(state, req)),
        _ => None,
    }
}
