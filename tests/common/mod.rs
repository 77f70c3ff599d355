#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rollbookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollbookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "expected ok for {}: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

#[derive(Debug, Clone)]
pub struct Hit {
    pub method: String,
    pub path: String,
    pub body: serde_json::Value,
    pub authorization: Option<String>,
}

pub struct FixtureState {
    pub courses: serde_json::Value,
    pub semesters: Vec<u32>,
    pub has_specializations: bool,
    pub specializations: Vec<String>,
    pub subjects: serde_json::Value,
    pub summary_students: serde_json::Value,
    pub marked: serde_json::Value,
    pub roster: serde_json::Value,
    /// Paths (prefix-matched) that answer 500 instead of their payload.
    pub fail_paths: Vec<String>,
}

impl Default for FixtureState {
    fn default() -> Self {
        Self {
            courses: json!({
                "BBA": {
                    "displayName": "Bachelor of Business Administration",
                    "courseId": "c-bba",
                    "totalSemesters": 6
                },
                "MBA(MS)-2Yrs": {
                    "displayName": "MBA (Management Studies)",
                    "courseId": "c-mba",
                    "totalSemesters": 4
                }
            }),
            semesters: vec![1, 2, 3],
            has_specializations: false,
            specializations: Vec::new(),
            subjects: json!([
                { "code": "FIN101", "name": "Corporate Finance", "courseId": "c-bba" },
                { "code": "MKT101", "name": "Marketing Basics", "courseId": "c-bba" }
            ]),
            summary_students: json!([
                {
                    "studentId": "s1",
                    "rollNumber": "R-001",
                    "studentName": "Asha Verma",
                    "classesAttended": 9,
                    "totalClasses": 10
                },
                {
                    "studentId": "s2",
                    "rollNumber": "R-002",
                    "studentName": "Rohan Gupta",
                    "classesAttended": 7,
                    "totalClasses": 10
                },
                {
                    "studentId": "s3",
                    "rollNumber": "R-003",
                    "studentName": "Meera Iyer",
                    "classesAttended": 2,
                    "totalClasses": 10
                }
            ]),
            marked: json!({
                "teacher": "Asha Verma",
                "hasAllAccess": false,
                "attendances": [
                    {
                        "subjectCode": "FIN101",
                        "subjectName": "Corporate Finance",
                        "date": "2025-08-01",
                        "markedAt": "2025-08-01T09:05:00Z",
                        "totalStudents": 3,
                        "presentCount": 2,
                        "absentCount": 1,
                        "canUpdate": true
                    }
                ]
            }),
            roster: json!({
                "students": [
                    { "studentId": "s1", "rollNo": "R-001", "name": "Asha Verma", "present": true },
                    { "studentId": "s2", "rollNo": "R-002", "name": "Rohan Gupta", "present": false }
                ]
            }),
            fail_paths: Vec::new(),
        }
    }
}

/// A one-connection-at-a-time HTTP stand-in for the attendance backend.
/// Records every request so tests can assert on call counts and payloads.
pub struct FixtureBackend {
    pub url: String,
    pub state: Arc<Mutex<FixtureState>>,
    pub hits: Arc<Mutex<Vec<Hit>>>,
}

impl FixtureBackend {
    pub fn start() -> Self {
        Self::start_with(FixtureState::default())
    }

    pub fn start_with(initial: FixtureState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fixture backend");
        let addr = listener.local_addr().expect("fixture addr");
        let state = Arc::new(Mutex::new(initial));
        let hits: Arc<Mutex<Vec<Hit>>> = Arc::new(Mutex::new(Vec::new()));

        let server_state = Arc::clone(&state);
        let server_hits = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let state = Arc::clone(&server_state);
                let hits = Arc::clone(&server_hits);
                // Serve inline; both sidecar and tests issue one request at
                // a time.
                let _ = serve_connection(stream, &state, &hits);
            }
        });

        Self {
            url: format!("http://{}", addr),
            state,
            hits,
        }
    }

    pub fn hits_for(&self, path_prefix: &str) -> Vec<Hit> {
        self.hits
            .lock()
            .expect("hits lock")
            .iter()
            .filter(|h| h.path.starts_with(path_prefix))
            .cloned()
            .collect()
    }

    pub fn set_subjects(&self, subjects: serde_json::Value) {
        self.state.lock().expect("state lock").subjects = subjects;
    }

    pub fn set_specializations(&self, required: bool, values: Vec<String>) {
        let mut state = self.state.lock().expect("state lock");
        state.has_specializations = required;
        state.specializations = values;
    }

    pub fn set_summary_students(&self, students: serde_json::Value) {
        self.state.lock().expect("state lock").summary_students = students;
    }

    pub fn fail_path(&self, path: &str) {
        self.state
            .lock()
            .expect("state lock")
            .fail_paths
            .push(path.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.lock().expect("state lock").fail_paths.clear();
    }
}

fn serve_connection(
    stream: TcpStream,
    state: &Arc<Mutex<FixtureState>>,
    hits: &Arc<Mutex<Vec<Hit>>>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    let mut authorization: Option<String> = None;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header)?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if name == "content-length" {
                content_length = value.parse().unwrap_or(0);
            } else if name == "authorization" {
                authorization = Some(value.to_string());
            }
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body)?;
    }
    let body_json: serde_json::Value =
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);

    hits.lock().expect("hits lock").push(Hit {
        method: method.clone(),
        path: path.clone(),
        body: body_json,
        authorization,
    });

    let (status, payload) = route(&method, &path, &state.lock().expect("state lock"));
    let body = payload.to_string();
    let mut stream = stream;
    write!(
        stream,
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        if status == 200 { "OK" } else { "Internal Server Error" },
        body.len(),
        body
    )?;
    stream.flush()
}

fn route(method: &str, path: &str, state: &FixtureState) -> (u16, serde_json::Value) {
    if state.fail_paths.iter().any(|p| path.starts_with(p.as_str())) {
        return (500, json!({ "message": "backend unavailable" }));
    }
    match (method, path) {
        ("POST", "/attendance") => (200, json!({ "success": true, "data": state.courses.clone() })),
        ("POST", "/attendance/getspecializations") => (
            200,
            json!({
                "hasSpecializations": state.has_specializations,
                "specializations": state.specializations.clone(),
            }),
        ),
        ("POST", "/attendance/getsubjects") => (200, state.subjects.clone()),
        ("POST", "/attendance/getAttendanceByCourseAndSubject") => {
            (200, json!({ "students": state.summary_students.clone() }))
        }
        ("POST", "/attendance/update-attendance") => (200, json!({ "success": true })),
        ("GET", p) if p.ends_with("/semesters") => (
            200,
            json!({ "success": true, "data": { "availableSemesters": state.semesters.clone() } }),
        ),
        ("GET", p) if p.starts_with("/attendance/teacher-marked/") => (200, state.marked.clone()),
        ("GET", p) if p.starts_with("/attendance/fetch-students-for-update/") => {
            (200, state.roster.clone())
        }
        _ => (404, json!({ "message": format!("no route for {} {}", method, path) })),
    }
}

/// Open a session against the fixture backend with the standard test
/// credentials.
pub fn open_session(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    workspace: &std::path::Path,
    backend_url: &str,
) -> serde_json::Value {
    request_ok(
        stdin,
        reader,
        id,
        "session.open",
        json!({
            "workspacePath": workspace.to_string_lossy(),
            "backendUrl": backend_url,
            "token": "tok-test-1",
            "teacherId": "T-9",
        }),
    )
}
