mod common;

use common::{open_session, request, spawn_sidecar, temp_dir, FixtureBackend};
use serde_json::json;

fn assert_known(value: &serde_json::Value, method: &str) {
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("rollbook-router-smoke");
    let backend = FixtureBackend::start();
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let methods: Vec<(&str, serde_json::Value)> = vec![
        ("health", json!({})),
        ("session.info", json!({})),
        ("courses.load", json!({})),
        ("filters.state", json!({})),
        ("filters.setCourse", json!({ "course": "BBA" })),
        ("filters.setSemester", json!({ "semester": 1 })),
        ("filters.setSpecialization", json!({ "specialization": null })),
        ("filters.setSection", json!({ "section": "A" })),
        ("filters.setSubject", json!({ "subject": "FIN101" })),
        ("filters.setAcademicYear", json!({ "academicYear": "2025-2026" })),
        (
            "filters.setDateRange",
            json!({ "startDate": "2025-08-01", "endDate": "2025-08-31" }),
        ),
        ("filters.flagDetailReturn", json!({ "value": true })),
        ("summary.fetch", json!({})),
        ("summary.stats", json!({})),
        ("summary.byStatus", json!({ "status": "Good" })),
        ("marked.list", json!({})),
        (
            "marked.students",
            json!({ "subjectCode": "FIN101", "date": "2025-08-01" }),
        ),
        (
            "marked.update",
            json!({
                "subjectCode": "FIN101",
                "date": "2025-08-01",
                "updates": [{ "studentId": "s1", "present": false }]
            }),
        ),
        ("filters.restore", json!({})),
        ("filters.clear", json!({})),
    ];

    let health = request(&mut stdin, &mut reader, "0", "health", json!({}));
    assert_known(&health, "health");
    let _ = open_session(&mut stdin, &mut reader, "open", &workspace, &backend.url);

    for (idx, (method, params)) in methods.into_iter().enumerate() {
        let resp = request(&mut stdin, &mut reader, &(idx + 1).to_string(), method, params);
        assert_known(&resp, method);
    }

    let unknown = request(&mut stdin, &mut reader, "zz", "nope.nothing", json!({}));
    assert_eq!(unknown.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        unknown
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
