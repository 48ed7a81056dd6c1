use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::handlers::commit_ok;
use crate::ipc::types::{AppState, Request};
use crate::model::{clamp_dim, LayoutMode, DEFAULT_CLASS_NAME, DEFAULT_COLS, DEFAULT_ROWS};
use crate::norm;
use serde_json::json;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_ref() else {
        return no_workspace(&req.id);
    };
    let st = &container.state;
    let classes: Vec<serde_json::Value> = st
        .classes
        .iter()
        .map(|cl| {
            let skill_count = st
                .skills
                .iter()
                .filter(|sk| sk.class_ids.contains(&cl.id))
                .count();
            json!({
                "id": cl.id,
                "name": cl.name,
                "rows": cl.rows,
                "cols": cl.cols,
                "layoutMode": cl.layout_mode,
                "studentCount": cl.students.len(),
                "skillCount": skill_count
            })
        })
        .collect();
    ok(
        &req.id,
        json!({ "classes": classes, "selectedClassId": st.selected_class_id }),
    )
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing name", None),
    };
    let rows = req
        .params
        .get("rows")
        .and_then(|v| v.as_f64())
        .map(clamp_dim)
        .unwrap_or(DEFAULT_ROWS);
    let cols = req
        .params
        .get("cols")
        .and_then(|v| v.as_f64())
        .map(clamp_dim)
        .unwrap_or(DEFAULT_COLS);

    let cl = norm::new_class(&name, rows, cols);
    let class_id = cl.id.clone();
    container.state.classes.push(cl);
    container.state.selected_class_id = class_id.clone();

    let result = json!({ "classId": class_id, "name": name });
    commit_ok(container, &req.id, result)
}

fn handle_classes_rename(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing name", None),
    };
    let Some(cl) = container.state.class_mut(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    cl.name = name.clone();

    let result = json!({ "classId": class_id, "name": name });
    commit_ok(container, &req.id, result)
}

fn handle_classes_resize(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let (Some(rows), Some(cols)) = (
        req.params.get("rows").and_then(|v| v.as_f64()),
        req.params.get("cols").and_then(|v| v.as_f64()),
    ) else {
        return err(&req.id, "bad_params", "rows and cols must be numbers", None);
    };
    let (rows, cols) = (clamp_dim(rows), clamp_dim(cols));
    let Some(cl) = container.state.class_mut(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };

    // Seats past the new edge are dropped along with their occupants;
    // everything still in range keeps its assignment and position.
    cl.rebuild_lattice(rows, cols);

    let result = json!({
        "classId": class_id,
        "rows": rows,
        "cols": cols,
        "seatCount": cl.seats.len()
    });
    commit_ok(container, &req.id, result)
}

fn handle_classes_set_layout_mode(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let mode = match req
        .params
        .get("mode")
        .and_then(|v| v.as_str())
        .and_then(LayoutMode::from_str_loose)
    {
        Some(m) => m,
        None => {
            return err(
                &req.id,
                "bad_params",
                "mode must be one of grid, free, snap",
                None,
            )
        }
    };
    let Some(cl) = container.state.class_mut(class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    cl.layout_mode = mode;

    let result = json!({ "classId": class_id, "layoutMode": mode });
    commit_ok(container, &req.id, result)
}

fn handle_classes_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    if container.state.class(class_id).is_none() {
        return err(&req.id, "not_found", "class not found", None);
    }
    container.state.selected_class_id = class_id.to_string();

    let result = json!({ "selectedClassId": class_id });
    commit_ok(container, &req.id, result)
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let st = &mut container.state;
    if st.class(class_id).is_none() {
        return err(&req.id, "not_found", "class not found", None);
    }

    st.classes.retain(|c| c.id != class_id);
    // The class disappears from every skill's link set; the skills
    // themselves survive.
    for sk in &mut st.skills {
        sk.class_ids.retain(|id| id != class_id);
    }
    if st.classes.is_empty() {
        st.classes.push(norm::default_class(DEFAULT_CLASS_NAME));
    }
    if st.class(&st.selected_class_id.clone()).is_none() {
        st.selected_class_id = st.classes[0].id.clone();
    }

    let result = json!({
        "deleted": class_id,
        "selectedClassId": st.selected_class_id
    });
    commit_ok(container, &req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.rename" => Some(handle_classes_rename(state, req)),
        "classes.resize" => Some(handle_classes_resize(state, req)),
        "classes.setLayoutMode" => Some(handle_classes_set_layout_mode(state, req)),
        "classes.select" => Some(handle_classes_select(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        _ => None,
    }
}
