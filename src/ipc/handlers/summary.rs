use serde_json::json;

use crate::ipc::error::{err, ok, ok_with_advisories};
use crate::ipc::types::{AppState, Request};
use crate::summary::{self, AttendanceStatus, SummaryRecord};

pub(in crate::ipc) enum SummaryOutcome {
    Fetched {
        records: Vec<SummaryRecord>,
        advisories: Vec<String>,
    },
    Failed {
        code: String,
        message: String,
    },
}

/// Validate the current selection and, if it holds up, fetch and derive the
/// summary. Validation failures never reach the network; transport failures
/// and empty results both leave the held summary empty.
pub(in crate::ipc) fn run_summary_fetch(state: &mut AppState) -> SummaryOutcome {
    let query = match summary::build_query(
        state.controller.selection(),
        state.controller.has_specializations(),
        state.controller.subjects(),
    ) {
        Ok(query) => query,
        Err(message) => {
            return SummaryOutcome::Failed {
                code: "validation_failed".to_string(),
                message,
            }
        }
    };
    let Some(backend) = state.backend.as_deref() else {
        return SummaryOutcome::Failed {
            code: "no_backend".to_string(),
            message: "no backend URL configured".to_string(),
        };
    };
    match backend.attendance_summary(&query) {
        Ok(rows) if rows.is_empty() => {
            state.summary.clear();
            let message = match (&query.start_date, &query.end_date) {
                (Some(start), Some(end)) => format!(
                    "No attendance records found for the selected criteria between {} and {}",
                    start, end
                ),
                _ => "No attendance records found for the selected criteria".to_string(),
            };
            SummaryOutcome::Fetched {
                records: Vec::new(),
                advisories: vec![message],
            }
        }
        Ok(rows) => {
            let records = summary::derive_records(rows, &state.policies.status);
            state.summary = records.clone();
            SummaryOutcome::Fetched {
                records,
                advisories: Vec::new(),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "summary fetch failed");
            state.summary.clear();
            SummaryOutcome::Failed {
                code: e.kind.as_str().to_string(),
                message: e.message,
            }
        }
    }
}

fn handle_fetch(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_session", "open a session first", None);
    }
    match run_summary_fetch(state) {
        SummaryOutcome::Fetched {
            records,
            advisories,
        } => ok_with_advisories(
            &req.id,
            json!({
                "records": records,
                "stats": summary::stats(&records),
            }),
            advisories,
        ),
        SummaryOutcome::Failed { code, message } => err(&req.id, &code, message, None),
    }
}

fn handle_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_session", "open a session first", None);
    }
    ok(&req.id, json!({ "stats": summary::stats(&state.summary) }))
}

fn handle_by_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_session", "open a session first", None);
    }
    let Some(status) = req
        .params
        .get("status")
        .and_then(|v| v.as_str())
        .and_then(AttendanceStatus::parse)
    else {
        return err(
            &req.id,
            "bad_params",
            "status must be Good, Warning, or Critical",
            None,
        );
    };
    let records = summary::filter_by_status(&state.summary, status);
    ok(&req.id, json!({ "records": records }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "summary.fetch" => Some(handle_fetch(state, req)),
        "summary.stats" => Some(handle_stats(state, req)),
        "summary.byStatus" => Some(handle_by_status(state, req)),
        _ => None,
    }
}
