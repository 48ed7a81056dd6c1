use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::handlers::commit_ok;
use crate::ipc::types::{AppState, Request};
use crate::model::{default_flags, Student, STUDENT_FLAGS};
use crate::norm;
use serde_json::json;

fn class_param<'a>(req: &'a Request) -> Result<&'a str, serde_json::Value> {
    req.params
        .get("classId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| err(&req.id, "bad_params", "missing classId", None))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_ref() else {
        return no_workspace(&req.id);
    };
    let class_id = match class_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(cl) = container.state.class(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    ok(&req.id, json!({ "students": &cl.students }))
}

fn handle_students_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let class_id = match class_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing name", None),
    };
    let Some(cl) = container.state.class_mut(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    if cl.has_student_named(&name, None) {
        return err(
            &req.id,
            "duplicate_name",
            "that name already exists in this class",
            None,
        );
    }

    let student = Student {
        id: norm::uid(),
        name: name.clone(),
        flags: default_flags(),
    };
    let student_id = student.id.clone();
    cl.students.push(student);

    let result = json!({ "studentId": student_id, "name": name });
    commit_ok(container, &req.id, result)
}

fn handle_students_rename(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let class_id = match class_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(student_id) = req.params.get("studentId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing name", None),
    };
    let Some(cl) = container.state.class_mut(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    if cl.has_student_named(&name, Some(student_id)) {
        return err(
            &req.id,
            "duplicate_name",
            "that name already exists in this class",
            None,
        );
    }
    let Some(student) = cl.student_mut(student_id) else {
        return err(&req.id, "not_found", "student not found", None);
    };
    student.name = name.clone();

    let result = json!({ "studentId": student_id, "name": name });
    commit_ok(container, &req.id, result)
}

fn handle_students_set_flag(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let class_id = match class_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(student_id) = req.params.get("studentId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };
    let flag = match req.params.get("flag").and_then(|v| v.as_str()) {
        Some(f) if STUDENT_FLAGS.contains(&f) => f.to_string(),
        Some(f) => {
            return err(
                &req.id,
                "bad_params",
                format!("unknown flag: {}", f),
                Some(json!({ "known": STUDENT_FLAGS })),
            )
        }
        None => return err(&req.id, "bad_params", "missing flag", None),
    };
    let Some(value) = req.params.get("value").and_then(|v| v.as_bool()) else {
        return err(&req.id, "bad_params", "value must be a boolean", None);
    };
    let Some(cl) = container.state.class_mut(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    let Some(student) = cl.student_mut(student_id) else {
        return err(&req.id, "not_found", "student not found", None);
    };
    student.flags.insert(flag.clone(), value);

    let result = json!({ "studentId": student_id, "flag": flag, "value": value });
    commit_ok(container, &req.id, result)
}

fn handle_students_clear_marks(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let class_id = match class_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(student_id) = req.params.get("studentId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };
    let Some(cl) = container.state.class_mut(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    if cl.student(student_id).is_none() {
        return err(&req.id, "not_found", "student not found", None);
    }
    cl.clear_student_marks(student_id);

    let result = json!({ "studentId": student_id });
    commit_ok(container, &req.id, result)
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let class_id = match class_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(student_id) = req.params.get("studentId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };
    let Some(cl) = container.state.class_mut(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    if cl.student(student_id).is_none() {
        return err(&req.id, "not_found", "student not found", None);
    }

    // Removing a student unassigns their seat and clears their marks; their
    // flags and name go with the roster entry.
    cl.unassign_student(student_id);
    cl.clear_student_marks(student_id);
    cl.students.retain(|s| s.id != student_id);

    let result = json!({ "deleted": student_id });
    commit_ok(container, &req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.add" => Some(handle_students_add(state, req)),
        "students.rename" => Some(handle_students_rename(state, req)),
        "students.setFlag" => Some(handle_students_set_flag(state, req)),
        "students.clearMarks" => Some(handle_students_clear_marks(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
