use crate::ipc::error::{err, no_workspace};
use crate::ipc::handlers::commit_ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Free-form coordinates are kept slightly inside the board so a desk can
/// never be dragged fully out of view.
const POS_MIN: f64 = 0.02;
const POS_MAX: f64 = 0.98;

fn cell(v: Option<&serde_json::Value>) -> Option<u32> {
    let n = v?.as_u64()?;
    u32::try_from(n).ok()
}

fn handle_seating_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let (Some(r), Some(c)) = (cell(req.params.get("r")), cell(req.params.get("c"))) else {
        return err(&req.id, "bad_params", "r and c must be non-negative integers", None);
    };
    let student_id = match req.params.get("studentId") {
        Some(v) if v.is_null() => None,
        Some(v) => match v.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                return err(&req.id, "bad_params", "studentId must be a string or null", None)
            }
        },
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };

    let Some(cl) = container.state.class_mut(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    if cl.seat(r, c).is_none() {
        return err(&req.id, "not_found", "no seat at that position", None);
    }
    if let Some(sid) = &student_id {
        if cl.student(sid).is_none() {
            return err(&req.id, "not_found", "student not found", None);
        }
        // One desk per student: an assignment elsewhere moves them here.
        cl.unassign_student(sid);
    }
    if let Some(seat) = cl.seat_mut(r, c) {
        seat.student_id = student_id.clone();
    }

    let result = json!({ "classId": class_id, "r": r, "c": c, "studentId": student_id });
    commit_ok(container, &req.id, result)
}

fn handle_seating_swap(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let a = req.params.get("a");
    let b = req.params.get("b");
    let (Some(ar), Some(ac), Some(br), Some(bc)) = (
        cell(a.and_then(|v| v.get("r"))),
        cell(a.and_then(|v| v.get("c"))),
        cell(b.and_then(|v| v.get("r"))),
        cell(b.and_then(|v| v.get("c"))),
    ) else {
        return err(&req.id, "bad_params", "a and b must carry integer r and c", None);
    };

    let Some(cl) = container.state.class_mut(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    if cl.seat(ar, ac).is_none() || cl.seat(br, bc).is_none() {
        return err(&req.id, "not_found", "no seat at that position", None);
    }
    let occupant_a = cl.seat(ar, ac).and_then(|s| s.student_id.clone());
    let occupant_b = cl.seat(br, bc).and_then(|s| s.student_id.clone());
    if let Some(seat) = cl.seat_mut(ar, ac) {
        seat.student_id = occupant_b;
    }
    if let Some(seat) = cl.seat_mut(br, bc) {
        seat.student_id = occupant_a;
    }

    let result = json!({ "classId": class_id });
    commit_ok(container, &req.id, result)
}

fn handle_seating_position(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let (Some(r), Some(c)) = (cell(req.params.get("r")), cell(req.params.get("c"))) else {
        return err(&req.id, "bad_params", "r and c must be non-negative integers", None);
    };
    let (Some(x), Some(y)) = (
        req.params.get("x").and_then(|v| v.as_f64()),
        req.params.get("y").and_then(|v| v.as_f64()),
    ) else {
        return err(&req.id, "bad_params", "x and y must be numbers", None);
    };

    let Some(cl) = container.state.class_mut(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    let Some(seat) = cl.seat_mut(r, c) else {
        return err(&req.id, "not_found", "no seat at that position", None);
    };
    seat.x = x.clamp(POS_MIN, POS_MAX);
    seat.y = y.clamp(POS_MIN, POS_MAX);

    let result = json!({ "classId": class_id, "r": r, "c": c, "x": seat.x, "y": seat.y });
    commit_ok(container, &req.id, result)
}

fn handle_seating_rotate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let (Some(r), Some(c)) = (cell(req.params.get("r")), cell(req.params.get("c"))) else {
        return err(&req.id, "bad_params", "r and c must be non-negative integers", None);
    };
    let Some(rot) = req.params.get("rot").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "rot must be a number", None);
    };

    let Some(cl) = container.state.class_mut(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    let Some(seat) = cl.seat_mut(r, c) else {
        return err(&req.id, "not_found", "no seat at that position", None);
    };
    seat.rot = rot.rem_euclid(360.0);

    let result = json!({ "classId": class_id, "r": r, "c": c, "rot": seat.rot });
    commit_ok(container, &req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "seating.assign" => Some(handle_seating_assign(state, req)),
        "seating.swap" => Some(handle_seating_swap(state, req)),
        "seating.position" => Some(handle_seating_position(state, req)),
        "seating.rotate" => Some(handle_seating_rotate(state, req)),
        _ => None,
    }
}
