use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::handlers::commit_ok;
use crate::ipc::types::{AppState, Request};
use crate::norm;
use chrono::Utc;
use serde_json::json;

fn handle_state_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_ref() else {
        return no_workspace(&req.id);
    };
    ok(&req.id, json!({ "state": &container.state }))
}

/// Replace the whole document. `params.raw` may be a JSON string or an
/// already-parsed object; either way it passes through normalization, so
/// arbitrary imports (old exports, hand-edited files) are safe.
fn handle_state_replace(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(raw) = req.params.get("raw") else {
        return err(&req.id, "bad_params", "missing params.raw", None);
    };
    let next = match raw.as_str() {
        Some(s) => norm::normalize(s),
        None => norm::normalize_value(raw),
    };
    container.state = next;
    let result = json!({ "state": &container.state });
    commit_ok(container, &req.id, result)
}

fn handle_state_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_ref() else {
        return no_workspace(&req.id);
    };
    let body = match serde_json::to_string_pretty(&container.state) {
        Ok(b) => b,
        Err(e) => return err(&req.id, "export_failed", e.to_string(), None),
    };
    ok(
        &req.id,
        json!({
            "filename": format!("monitoring-{}.json", Utc::now().format("%Y-%m-%d")),
            "body": body
        }),
    )
}

/// Wrap the state in the `{data: ...}` envelope the remote blob-store proxy
/// accepts. The shell performs the actual push; a failed push never touches
/// local state.
fn handle_sync_pack(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_ref() else {
        return no_workspace(&req.id);
    };
    ok(&req.id, json!({ "data": &container.state }))
}

fn handle_sync_apply(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(container) = state.container.as_mut() else {
        return no_workspace(&req.id);
    };
    let Some(data) = req.params.get("data").filter(|d| d.is_object()) else {
        return err(
            &req.id,
            "bad_params",
            "invalid payload: expected { data: <object> }",
            None,
        );
    };
    container.state = norm::normalize_value(data);
    let result = json!({ "state": &container.state });
    commit_ok(container, &req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "state.get" => Some(handle_state_get(state, req)),
        "state.replace" => Some(handle_state_replace(state, req)),
        "state.export" => Some(handle_state_export(state, req)),
        "sync.pack" => Some(handle_sync_pack(state, req)),
        "sync.apply" => Some(handle_sync_apply(state, req)),
        _ => None,
    }
}
