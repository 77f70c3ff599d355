mod common;

use common::{open_session, request, request_ok, spawn_sidecar, temp_dir, FixtureBackend};
use serde_json::json;

fn select_bba_sem1(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
) {
    request_ok(stdin, reader, "c1", "courses.load", json!({}));
    request_ok(
        stdin,
        reader,
        "c2",
        "filters.setCourse",
        json!({ "course": "BBA" }),
    );
    request_ok(
        stdin,
        reader,
        "c3",
        "filters.setSemester",
        json!({ "semester": 1 }),
    );
    request_ok(
        stdin,
        reader,
        "c4",
        "filters.setSubject",
        json!({ "subject": "FIN101" }),
    );
    request_ok(
        stdin,
        reader,
        "c5",
        "filters.setAcademicYear",
        json!({ "academicYear": "2025-2026" }),
    );
}

#[test]
fn incomplete_selection_fails_validation_without_a_network_call() {
    let workspace = temp_dir("rollbook-summary-validation");
    let backend = FixtureBackend::start();
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    open_session(&mut stdin, &mut reader, "1", &workspace, &backend.url);
    request_ok(&mut stdin, &mut reader, "2", "courses.load", json!({}));
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "filters.setCourse",
        json!({ "course": "BBA" }),
    );

    let resp = request(&mut stdin, &mut reader, "4", "summary.fetch", json!({}));
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(
        resp["error"]["code"].as_str(),
        Some("validation_failed"),
        "{}",
        resp
    );
    assert!(resp["error"]["message"]
        .as_str()
        .unwrap_or_default()
        .contains("Course, Semester, Subject"));
    assert_eq!(
        backend
            .hits_for("/attendance/getAttendanceByCourseAndSubject")
            .len(),
        0
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn fetch_normalizes_year_sends_null_section_and_derives_statuses() {
    let workspace = temp_dir("rollbook-summary-fetch");
    let backend = FixtureBackend::start();
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    open_session(&mut stdin, &mut reader, "1", &workspace, &backend.url);
    select_bba_sem1(&mut stdin, &mut reader);

    let result = request_ok(&mut stdin, &mut reader, "2", "summary.fetch", json!({}));
    let records = result["records"].as_array().expect("records");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["percentage"], json!(90.0));
    assert_eq!(records[0]["status"], json!("Good"));
    assert_eq!(records[1]["percentage"], json!(70.0));
    assert_eq!(records[1]["status"], json!("Warning"));
    assert_eq!(records[2]["percentage"], json!(20.0));
    assert_eq!(records[2]["status"], json!("Critical"));
    assert_eq!(result["stats"]["total"], json!(3));
    assert_eq!(result["stats"]["good"], json!(1));
    assert_eq!(result["stats"]["warning"], json!(1));
    assert_eq!(result["stats"]["critical"], json!(1));
    assert_eq!(result["stats"]["averageAttendance"], json!(60.0));

    let hits = backend.hits_for("/attendance/getAttendanceByCourseAndSubject");
    assert_eq!(hits.len(), 1);
    let body = &hits[0].body;
    assert_eq!(body["academicYear"].as_str(), Some("2025-26"));
    assert_eq!(body["course"].as_str(), Some("c-bba"));
    // Section rides along as an explicit null when unset.
    assert!(body.get("section").is_some());
    assert!(body["section"].is_null());
    assert!(body.get("startDate").is_none());
    assert_eq!(
        hits[0].authorization.as_deref(),
        Some("Bearer tok-test-1"),
        "summary call must carry the bearer token"
    );

    let filtered = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "summary.byStatus",
        json!({ "status": "critical" }),
    );
    assert_eq!(filtered["records"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(
        filtered["records"][0]["studentName"].as_str(),
        Some("Meera Iyer")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn zero_rows_come_back_as_an_advisory_empty_state() {
    let workspace = temp_dir("rollbook-summary-empty");
    let backend = FixtureBackend::start();
    backend.set_summary_students(json!([]));
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    open_session(&mut stdin, &mut reader, "1", &workspace, &backend.url);
    select_bba_sem1(&mut stdin, &mut reader);

    let result = request_ok(&mut stdin, &mut reader, "2", "summary.fetch", json!({}));
    assert_eq!(result["records"], json!([]));
    let advisories = result["advisories"].as_array().expect("advisories");
    assert!(advisories[0]
        .as_str()
        .unwrap_or_default()
        .contains("No attendance records found"));

    let stats = request_ok(&mut stdin, &mut reader, "3", "summary.stats", json!({}));
    assert_eq!(stats["stats"]["total"], json!(0));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn status_thresholds_are_a_session_policy() {
    let workspace = temp_dir("rollbook-summary-policy");
    let backend = FixtureBackend::start();
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    // The legacy 50/30 table, applied for this session only.
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "session.open",
        json!({
            "workspacePath": workspace.to_string_lossy(),
            "backendUrl": backend.url,
            "token": "tok-test-1",
            "teacherId": "T-9",
            "policies": {
                "status": { "goodMin": 50.0, "warningMin": 30.0 }
            }
        }),
    );
    select_bba_sem1(&mut stdin, &mut reader);

    let result = request_ok(&mut stdin, &mut reader, "2", "summary.fetch", json!({}));
    let records = result["records"].as_array().expect("records");
    // 90% and 70% both clear the 50% bar; 20% falls under 30%.
    assert_eq!(records[0]["status"], json!("Good"));
    assert_eq!(records[1]["status"], json!("Good"));
    assert_eq!(records[2]["status"], json!("Critical"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
