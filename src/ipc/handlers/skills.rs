use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::handlers::commit_ok;
use crate::ipc::types::{AppState, Request};
use crate::model::Skill;
use crate::norm;
use serde_json::json;

fn handle_skills_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_ref() else {
        return no_workspace(&req.id);
    };
    ok(
        &req.id,
        json!({
            "skills": &container.state.skills,
            "selectedSkillId": &container.state.selected_skill_id
        }),
    )
}

fn opt_string_param(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn handle_skills_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing name", None),
    };
    let standard_code = opt_string_param(req, "standardCode")
        .map(|s| norm::clean_standard(&s))
        .filter(|s| !s.is_empty());

    let skill = Skill {
        id: norm::uid(),
        name: name.clone(),
        domain: opt_string_param(req, "domain"),
        standard_code,
        description: opt_string_param(req, "description"),
        class_ids: vec![container.state.selected_class_id.clone()],
    };
    let skill_id = skill.id.clone();
    container.state.skills.push(skill);

    let result = json!({ "skillId": skill_id, "name": name });
    commit_ok(container, &req.id, result)
}

fn handle_skills_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(skill_id) = req.params.get("skillId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing skillId", None);
    };

    // Validate before touching the record: a partial update must not land.
    if let Some(name) = req.params.get("name") {
        match name.as_str() {
            Some(v) if !v.trim().is_empty() => {}
            _ => return err(&req.id, "bad_params", "name must be a non-empty string", None),
        }
    }
    for key in ["domain", "standardCode", "description"] {
        if let Some(v) = req.params.get(key) {
            if !v.is_string() && !v.is_null() {
                return err(
                    &req.id,
                    "bad_params",
                    format!("{} must be a string or null", key),
                    None,
                );
            }
        }
    }

    let Some(skill) = container.state.skill_mut(skill_id) else {
        return err(&req.id, "not_found", "skill not found", None);
    };
    if let Some(name) = req.params.get("name").and_then(|v| v.as_str()) {
        skill.name = name.trim().to_string();
    }
    if let Some(v) = req.params.get("domain") {
        skill.domain = v.as_str().map(str::to_string);
    }
    if let Some(v) = req.params.get("standardCode") {
        skill.standard_code = v
            .as_str()
            .map(norm::clean_standard)
            .filter(|s| !s.is_empty());
    }
    if let Some(v) = req.params.get("description") {
        skill.description = v.as_str().map(str::to_string);
    }

    let result = json!({ "skill": &*skill });
    commit_ok(container, &req.id, result)
}

fn handle_skills_link(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(skill_id) = req.params.get("skillId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing skillId", None);
    };
    let Some(wanted) = req.params.get("classIds").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "classIds must be an array", None);
    };

    let st = &mut container.state;
    // Ids that don't name a class are ignored; linking to nothing at all is
    // rejected so a skill can't silently vanish from every roster.
    let mut ids: Vec<String> = Vec::new();
    for v in wanted {
        if let Some(id) = v.as_str() {
            if st.classes.iter().any(|c| c.id == id) && !ids.iter().any(|x| x == id) {
                ids.push(id.to_string());
            }
        }
    }
    if ids.is_empty() {
        return err(&req.id, "bad_params", "no matching classes", None);
    }
    let Some(skill) = st.skill_mut(skill_id) else {
        return err(&req.id, "not_found", "skill not found", None);
    };
    skill.class_ids = ids;

    let result = json!({ "skillId": skill_id, "classIds": &skill.class_ids });
    commit_ok(container, &req.id, result)
}

fn handle_skills_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(param) = req.params.get("skillId") else {
        return err(&req.id, "bad_params", "missing skillId", None);
    };
    let selection = match param.as_str() {
        Some(id) => {
            if container.state.skill(id).is_none() {
                return err(&req.id, "not_found", "skill not found", None);
            }
            Some(id.to_string())
        }
        None if param.is_null() => None,
        None => return err(&req.id, "bad_params", "skillId must be a string or null", None),
    };
    container.state.selected_skill_id = selection;

    let result = json!({ "selectedSkillId": &container.state.selected_skill_id });
    commit_ok(container, &req.id, result)
}

fn handle_skills_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(skill_id) = req.params.get("skillId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing skillId", None);
    };
    let st = &mut container.state;
    if st.skill(skill_id).is_none() {
        return err(&req.id, "not_found", "skill not found", None);
    }

    // Deleting a skill takes its mark column with it, in every class.
    for cl in &mut st.classes {
        cl.marks.remove(skill_id);
    }
    st.skills.retain(|s| s.id != skill_id);
    if st.selected_skill_id.as_deref() == Some(skill_id) {
        st.selected_skill_id = None;
    }

    let result = json!({ "deleted": skill_id });
    commit_ok(container, &req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "skills.list" => Some(handle_skills_list(state, req)),
        "skills.create" => Some(handle_skills_create(state, req)),
        "skills.update" => Some(handle_skills_update(state, req)),
        "skills.link" => Some(handle_skills_link(state, req)),
        "skills.select" => Some(handle_skills_select(state, req)),
        "skills.delete" => Some(handle_skills_delete(state, req)),
        _ => None,
    }
}
