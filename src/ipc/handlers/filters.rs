use std::collections::VecDeque;

use serde_json::json;

use crate::backend::{Backend, SubjectQuery};
use crate::cascade::{Applied, Fetch, FilterController, Outcome, PersistedFilters};
use crate::ipc::error::{err, ok, ok_with_advisories};
use crate::ipc::types::{AppState, Request};
use crate::store::SessionStore;

/// Execute the lookups a mutation asked for, feeding results (and their
/// follow-up lookups) back into the controller until the queue drains. A
/// failed lookup becomes one advisory and an empty list; with no backend
/// configured every lookup fails that way.
pub(in crate::ipc) fn run_fetches(
    controller: &mut FilterController,
    backend: Option<&dyn Backend>,
    store: Option<&SessionStore>,
    teacher_id: Option<&str>,
    fetches: Vec<Fetch>,
    advisories: &mut Vec<String>,
) {
    let mut queue: VecDeque<Fetch> = fetches.into();
    while let Some(fetch) = queue.pop_front() {
        let Some(backend) = backend else {
            if controller.fail_fetch(&fetch) {
                advisories.push("No backend configured; lookups are unavailable".to_string());
            }
            continue;
        };
        match fetch.clone() {
            Fetch::Semesters(key) => {
                let course_id = controller
                    .course_config()
                    .get(&key.course)
                    .map(|c| c.course_id.clone());
                let result = match (course_id, teacher_id) {
                    (Some(course_id), Some(teacher_id)) => backend.semesters(&course_id, teacher_id),
                    _ => {
                        if controller.fail_fetch(&fetch) {
                            advisories
                                .push("Cannot fetch semesters without a course and teacher".to_string());
                        }
                        continue;
                    }
                };
                match result {
                    Ok(semesters) => {
                        if let Applied::Applied(out) = controller.apply_semesters(key, semesters) {
                            drain(out, &mut queue, advisories);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "semester lookup failed");
                        if controller.fail_fetch(&fetch) {
                            advisories.push("Failed to fetch semesters. Please try again.".to_string());
                        }
                    }
                }
            }
            Fetch::Specializations(key) => {
                let display_name = controller
                    .course_config()
                    .get(&key.course)
                    .map(|c| c.display_name.clone());
                let result = match (display_name, teacher_id) {
                    (Some(course), Some(teacher_id)) => {
                        backend.specializations(&course, key.semester, teacher_id)
                    }
                    _ => {
                        if controller.fail_fetch(&fetch) {
                            advisories.push(
                                "Cannot fetch specializations without a course and teacher"
                                    .to_string(),
                            );
                        }
                        continue;
                    }
                };
                match result {
                    Ok(info) => {
                        if let Applied::Applied(out) = controller.apply_specializations(key, info) {
                            drain(out, &mut queue, advisories);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "specialization lookup failed");
                        if controller.fail_fetch(&fetch) {
                            advisories
                                .push("Failed to fetch specializations. Please try again.".to_string());
                        }
                    }
                }
            }
            Fetch::Subjects(key) => {
                let display_name = controller
                    .course_config()
                    .get(&key.course)
                    .map(|c| c.display_name.clone());
                let Some(course) = display_name else {
                    if controller.fail_fetch(&fetch) {
                        advisories.push("Cannot fetch subjects for an unknown course".to_string());
                    }
                    continue;
                };
                let query = SubjectQuery {
                    course,
                    semester: key.semester,
                    specialization: key.specialization.clone(),
                    section: key.section.clone(),
                };
                match backend.subjects(&query) {
                    Ok(subjects) => {
                        let applied = controller.apply_subjects(key.clone(), subjects.clone());
                        if let Applied::Applied(out) = applied {
                            if let Some(store) = store {
                                if let Err(e) = store.save_subject_entry(&key, &subjects) {
                                    tracing::warn!(error = %e, "failed to persist subject cache");
                                }
                            }
                            drain(out, &mut queue, advisories);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "subject lookup failed");
                        if controller.fail_fetch(&fetch) {
                            advisories.push("Failed to fetch subjects. Please try again.".to_string());
                        }
                    }
                }
            }
        }
    }
}

fn drain(out: Outcome, queue: &mut VecDeque<Fetch>, advisories: &mut Vec<String>) {
    advisories.extend(out.advisories);
    queue.extend(out.fetches);
}

pub(in crate::ipc) fn controller_view(controller: &FilterController) -> serde_json::Value {
    json!({
        "selection": controller.selection(),
        "availableSemesters": controller.semesters(),
        "availableSpecializations": controller.specializations(),
        "hasSpecializations": controller.has_specializations(),
        "specializationResolved": controller.specialization_resolved(),
        "subjects": controller.subjects(),
        "sectionOptions": controller.section_options(),
        "filtersLoaded": controller.filters_loaded(),
    })
}

/// Write the current selection through to the store, preserving the persisted
/// detail-return flag. Empty selections are not written; the last snapshot
/// wins.
fn persist_selection(store: &SessionStore, controller: &FilterController) {
    let selection = controller.selection();
    if selection.is_empty() {
        return;
    }
    let return_from_detail = store.load_filters().return_from_detail;
    let snapshot = PersistedFilters {
        selection: selection.clone(),
        return_from_detail,
    };
    if let Err(e) = store.save_filters(&snapshot) {
        tracing::warn!(error = %e, "failed to persist filter snapshot");
    }
}

fn finish_mutation(state: &mut AppState, req: &Request, out: Outcome) -> serde_json::Value {
    let mut advisories = out.advisories;
    let AppState {
        controller,
        backend,
        store,
        ..
    } = state;
    let store = store.as_ref();
    let teacher_id = store.and_then(|s| s.teacher_id());
    run_fetches(
        controller,
        backend.as_deref(),
        store,
        teacher_id.as_deref(),
        out.fetches,
        &mut advisories,
    );
    if let Some(store) = store {
        persist_selection(store, controller);
    }
    ok_with_advisories(&req.id, controller_view(controller), advisories)
}

fn opt_string(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn opt_semester(params: &serde_json::Value) -> Result<Option<u32>, String> {
    let Some(value) = params.get("semester") else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    if let Some(n) = value.as_u64() {
        return Ok(Some(n as u32));
    }
    // The picker hands semesters over as strings.
    if let Some(s) = value.as_str() {
        if s.trim().is_empty() {
            return Ok(None);
        }
        return s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| format!("semester {} is not a number", s));
    }
    Err("semester must be a number, string, or null".to_string())
}

fn handle_state(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_session", "open a session first", None);
    };
    let mut view = controller_view(&state.controller);
    view["returnFromDetail"] = json!(store.load_filters().return_from_detail);
    ok(&req.id, view)
}

fn handle_set_course(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_session", "open a session first", None);
    }
    let course = opt_string(&req.params, "course");
    state.summary.clear();
    let out = state.controller.set_course(course);
    finish_mutation(state, req, out)
}

fn handle_set_semester(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_session", "open a session first", None);
    }
    let semester = match opt_semester(&req.params) {
        Ok(semester) => semester,
        Err(message) => return err(&req.id, "bad_params", message, None),
    };
    state.summary.clear();
    let out = state.controller.set_semester(semester);
    finish_mutation(state, req, out)
}

fn handle_set_specialization(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_session", "open a session first", None);
    }
    let specialization = opt_string(&req.params, "specialization");
    state.summary.clear();
    let out = state.controller.set_specialization(specialization);
    finish_mutation(state, req, out)
}

fn handle_set_section(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_session", "open a session first", None);
    }
    let section = opt_string(&req.params, "section");
    state.summary.clear();
    let out = state.controller.set_section(section);
    finish_mutation(state, req, out)
}

fn handle_set_subject(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_session", "open a session first", None);
    }
    let subject = opt_string(&req.params, "subject");
    let out = state.controller.set_subject(subject);
    finish_mutation(state, req, out)
}

fn handle_set_academic_year(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_session", "open a session first", None);
    }
    let academic_year = opt_string(&req.params, "academicYear");
    let out = state.controller.set_academic_year(academic_year);
    finish_mutation(state, req, out)
}

fn handle_set_date_range(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_session", "open a session first", None);
    }
    let start_date = opt_string(&req.params, "startDate");
    let end_date = opt_string(&req.params, "endDate");
    let out = state.controller.set_date_range(start_date, end_date);
    finish_mutation(state, req, out)
}

fn handle_flag_detail_return(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_session", "open a session first", None);
    };
    let value = req
        .params
        .get("value")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    if let Err(e) = store.set_return_flag(value) {
        return err(&req.id, "db_update_failed", format!("{e:?}"), None);
    }
    ok(&req.id, json!({ "returnFromDetail": value }))
}

fn handle_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_session", "open a session first", None);
    };
    state.controller.clear();
    state.summary.clear();
    if let Err(e) = store.save_filters(&PersistedFilters::default()) {
        return err(&req.id, "db_update_failed", format!("{e:?}"), None);
    }
    if let Err(e) = store.clear_subject_cache() {
        return err(&req.id, "db_update_failed", format!("{e:?}"), None);
    }
    ok(&req.id, controller_view(&state.controller))
}

/// Seed the controller from the persisted snapshot, resolve every lookup the
/// seed needs, and run the one automatic summary fetch if the snapshot asked
/// for it and the restored subject survived validation.
fn handle_restore(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_session", "open a session first", None);
    }

    let mut advisories: Vec<String> = Vec::new();

    // The cascade cannot validate a saved course without the course map.
    if !state.courses_loaded {
        let teacher_id = state.store.as_ref().and_then(|s| s.teacher_id());
        if let (Some(backend), Some(teacher_id)) = (state.backend.as_deref(), teacher_id) {
            match backend.course_config(&teacher_id) {
                Ok(config) => {
                    state.controller.set_course_config(config);
                    state.courses_loaded = true;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "course configuration lookup failed");
                    advisories.push("Failed to load courses. Please try again.".to_string());
                }
            }
        }
    }

    let persisted = state
        .store
        .as_ref()
        .map(|s| s.load_filters())
        .unwrap_or_default();
    let out = state.controller.restore(persisted);
    advisories.extend(out.advisories);

    {
        let AppState {
            controller,
            backend,
            store,
            ..
        } = &mut *state;
        let store = store.as_ref();
        let teacher_id = store.and_then(|s| s.teacher_id());
        run_fetches(
            controller,
            backend.as_deref(),
            store,
            teacher_id.as_deref(),
            out.fetches,
            &mut advisories,
        );
        if let Some(store) = store {
            persist_selection(store, controller);
        }
    }

    // The detail-return flag is one-shot whether or not the fetch fires.
    let auto_fetch = state.controller.take_auto_fetch_ready();
    if let Some(store) = state.store.as_ref() {
        if let Err(e) = store.set_return_flag(false) {
            tracing::warn!(error = %e, "failed to clear detail-return flag");
        }
    }

    let mut summary_result = serde_json::Value::Null;
    if auto_fetch {
        match super::summary::run_summary_fetch(state) {
            super::summary::SummaryOutcome::Fetched {
                records,
                advisories: more,
            } => {
                advisories.extend(more);
                summary_result = json!({
                    "records": records,
                    "stats": crate::summary::stats(&records),
                });
            }
            super::summary::SummaryOutcome::Failed { message, .. } => {
                advisories.push(message);
            }
        }
    }

    let mut view = controller_view(&state.controller);
    view["restored"] = json!(true);
    view["autoFetched"] = json!(auto_fetch);
    if !summary_result.is_null() {
        view["summary"] = summary_result;
    }
    ok_with_advisories(&req.id, view, advisories)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "filters.state" => Some(handle_state(state, req)),
        "filters.restore" => Some(handle_restore(state, req)),
        "filters.clear" => Some(handle_clear(state, req)),
        "filters.setCourse" => Some(handle_set_course(state, req)),
        "filters.setSemester" => Some(handle_set_semester(state, req)),
        "filters.setSpecialization" => Some(handle_set_specialization(state, req)),
        "filters.setSection" => Some(handle_set_section(state, req)),
        "filters.setSubject" => Some(handle_set_subject(state, req)),
        "filters.setAcademicYear" => Some(handle_set_academic_year(state, req)),
        "filters.setDateRange" => Some(handle_set_date_range(state, req)),
        "filters.flagDetailReturn" => Some(handle_flag_detail_return(state, req)),
        _ => None,
    }
}
