use std::path::PathBuf;

use serde_json::json;
use uuid::Uuid;

use crate::backend::HttpBackend;
use crate::cascade::FilterController;
use crate::config::Policies;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::SessionStore;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "backendConfigured": state.backend.is_some(),
        }),
    )
}

fn handle_session_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = req
        .params
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
    else {
        return err(&req.id, "bad_params", "missing params.workspacePath", None);
    };

    let store = match SessionStore::open(&path) {
        Ok(store) => store,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
    };

    // Credentials and backend location supplied here overwrite what the
    // workspace remembers; otherwise the stored values carry over.
    if let Some(url) = req.params.get("backendUrl").and_then(|v| v.as_str()) {
        if let Err(e) = store.set_backend_url(url) {
            return err(&req.id, "db_update_failed", format!("{e:?}"), None);
        }
    }
    if let Some(token) = req.params.get("token").and_then(|v| v.as_str()) {
        if let Err(e) = store.set_token(token) {
            return err(&req.id, "db_update_failed", format!("{e:?}"), None);
        }
    }
    if let Some(teacher_id) = req.params.get("teacherId").and_then(|v| v.as_str()) {
        if let Err(e) = store.set_teacher_id(teacher_id) {
            return err(&req.id, "db_update_failed", format!("{e:?}"), None);
        }
    }

    let policies = match req.params.get("policies") {
        Some(raw) => match serde_json::from_value::<Policies>(raw.clone()) {
            Ok(policies) => policies,
            Err(e) => return err(&req.id, "bad_params", format!("bad policies: {}", e), None),
        },
        None => Policies::default(),
    };

    let backend = match store.backend_url() {
        Some(url) => match HttpBackend::new(&url, store.token()) {
            Ok(backend) => Some(Box::new(backend) as Box<dyn crate::backend::Backend>),
            Err(e) => return err(&req.id, "backend_init_failed", e.to_string(), None),
        },
        None => None,
    };

    let session_id = Uuid::new_v4().to_string();
    if let Err(e) = store.set_session_id(&session_id) {
        return err(&req.id, "db_update_failed", format!("{e:?}"), None);
    }

    let mut controller = FilterController::new(policies.sections.clone());
    controller.seed_subject_cache(store.load_subject_cache());

    let teacher_id = store.teacher_id();
    let backend_configured = backend.is_some();
    state.workspace = Some(path.clone());
    state.store = Some(store);
    state.backend = backend;
    state.policies = policies;
    state.controller = controller;
    state.summary.clear();
    state.courses_loaded = false;

    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "sessionId": session_id,
            "backendConfigured": backend_configured,
            "teacherId": teacher_id,
        }),
    )
}

fn handle_session_info(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_session", "open a session first", None);
    };
    ok(
        &req.id,
        json!({
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "sessionId": store.session_id(),
            "teacherId": store.teacher_id(),
            "backendUrl": store.backend_url(),
            "backendConfigured": state.backend.is_some(),
            "coursesLoaded": state.courses_loaded,
            "policies": state.policies,
        }),
    )
}

fn handle_courses_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_session", "open a session first", None);
    };
    let force = req
        .params
        .get("force")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    if state.courses_loaded && !force {
        return ok(
            &req.id,
            json!({ "courses": state.controller.course_config(), "cached": true }),
        );
    }

    let Some(backend) = state.backend.as_deref() else {
        return err(&req.id, "no_backend", "no backend URL configured", None);
    };
    let Some(teacher_id) = store.teacher_id() else {
        return err(&req.id, "no_teacher", "no teacher id on this session", None);
    };

    match backend.course_config(&teacher_id) {
        Ok(config) => {
            state.controller.set_course_config(config);
            state.courses_loaded = true;
            ok(
                &req.id,
                json!({ "courses": state.controller.course_config(), "cached": false }),
            )
        }
        Err(e) => err(&req.id, e.kind.as_str(), e.message, None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "session.open" => Some(handle_session_open(state, req)),
        "session.info" => Some(handle_session_info(state, req)),
        "courses.load" => Some(handle_courses_load(state, req)),
        _ => None,
    }
}
