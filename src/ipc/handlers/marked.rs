use serde_json::json;

use crate::backend::{AttendanceUpdate, RosterMark};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| format!("missing {}", key))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_session", "open a session first", None);
    };
    let Some(backend) = state.backend.as_deref() else {
        return err(&req.id, "no_backend", "no backend URL configured", None);
    };
    let Some(teacher_id) = store.teacher_id() else {
        return err(&req.id, "no_teacher", "no teacher id on this session", None);
    };
    match backend.marked_attendances(&teacher_id) {
        Ok(overview) => ok(&req.id, json!(overview)),
        Err(e) => err(&req.id, e.kind.as_str(), e.message, None),
    }
}

fn handle_students(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_session", "open a session first", None);
    }
    let Some(backend) = state.backend.as_deref() else {
        return err(&req.id, "no_backend", "no backend URL configured", None);
    };
    let subject_code = match get_required_str(&req.params, "subjectCode") {
        Ok(v) => v,
        Err(message) => return err(&req.id, "bad_params", message, None),
    };
    let date = match get_required_str(&req.params, "date") {
        Ok(v) => v,
        Err(message) => return err(&req.id, "bad_params", message, None),
    };
    match backend.update_roster(&subject_code, &date) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, e.kind.as_str(), e.message, None),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_session", "open a session first", None);
    };
    let Some(backend) = state.backend.as_deref() else {
        return err(&req.id, "no_backend", "no backend URL configured", None);
    };
    let Some(teacher_id) = store.teacher_id() else {
        return err(&req.id, "no_teacher", "no teacher id on this session", None);
    };
    let subject_code = match get_required_str(&req.params, "subjectCode") {
        Ok(v) => v,
        Err(message) => return err(&req.id, "bad_params", message, None),
    };
    let date = match get_required_str(&req.params, "date") {
        Ok(v) => v,
        Err(message) => return err(&req.id, "bad_params", message, None),
    };
    let updates: Vec<RosterMark> = match req.params.get("updates") {
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(updates) => updates,
            Err(e) => return err(&req.id, "bad_params", format!("bad updates: {}", e), None),
        },
        None => return err(&req.id, "bad_params", "missing updates", None),
    };
    if updates.is_empty() {
        return err(&req.id, "bad_params", "updates must not be empty", None);
    }

    let update = AttendanceUpdate {
        teacher_id,
        subject_code,
        date,
        updates,
    };
    match backend.push_attendance_update(&update) {
        Ok(()) => ok(&req.id, json!({ "updated": update.updates.len() })),
        Err(e) => err(&req.id, e.kind.as_str(), e.message, None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marked.list" => Some(handle_list(state, req)),
        "marked.students" => Some(handle_students(state, req)),
        "marked.update" => Some(handle_update(state, req)),
        _ => None,
    }
}
