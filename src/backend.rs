use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    Network,
    Status,
    Decode,
}

impl BackendErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network_error",
            Self::Status => "backend_rejected",
            Self::Decode => "bad_backend_payload",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for BackendError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseInfo {
    pub display_name: String,
    pub course_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_semesters: Option<u32>,
}

/// Course key (as shown in the picker) to its backend metadata.
pub type CourseConfig = HashMap<String, CourseInfo>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecializationInfo {
    pub has_specializations: bool,
    #[serde(default)]
    pub specializations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectQuery {
    pub course: String,
    pub semester: u32,
    pub specialization: Option<String>,
    pub section: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryQuery {
    pub course: String,
    pub semester: u32,
    pub subject: String,
    /// Already normalized to "YYYY-YY".
    pub academic_year: String,
    pub specialization: Option<String>,
    /// Always serialized, null when unset. The backend distinguishes
    /// "no section filter" from an omitted key.
    pub section: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub student_id: String,
    pub roll_number: String,
    pub student_name: String,
    pub classes_attended: u32,
    pub total_classes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarkedAttendance {
    pub subject_code: String,
    #[serde(default)]
    pub subject_name: Option<String>,
    pub date: String,
    #[serde(default)]
    pub marked_at: Option<String>,
    #[serde(default)]
    pub total_students: u32,
    #[serde(default)]
    pub present_count: u32,
    #[serde(default)]
    pub absent_count: u32,
    #[serde(default)]
    pub can_update: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarkedOverview {
    pub teacher: String,
    #[serde(default)]
    pub has_all_access: bool,
    #[serde(default)]
    pub attendances: Vec<MarkedAttendance>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub student_id: String,
    #[serde(default)]
    pub roll_no: String,
    #[serde(default)]
    pub name: String,
    pub present: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterMark {
    pub student_id: String,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceUpdate {
    pub teacher_id: String,
    pub subject_code: String,
    pub date: String,
    pub updates: Vec<RosterMark>,
}

/// Consumed REST surface of the attendance backend. One implementation talks
/// HTTP; tests substitute their own.
pub trait Backend {
    fn course_config(&self, teacher_id: &str) -> Result<CourseConfig, BackendError>;
    fn semesters(&self, course_id: &str, teacher_id: &str) -> Result<Vec<u32>, BackendError>;
    fn specializations(
        &self,
        course: &str,
        semester: u32,
        teacher_id: &str,
    ) -> Result<SpecializationInfo, BackendError>;
    fn subjects(&self, query: &SubjectQuery) -> Result<Vec<Subject>, BackendError>;
    fn attendance_summary(&self, query: &SummaryQuery) -> Result<Vec<SummaryRow>, BackendError>;
    fn marked_attendances(&self, teacher_id: &str) -> Result<MarkedOverview, BackendError>;
    fn update_roster(
        &self,
        subject_code: &str,
        date: &str,
    ) -> Result<Vec<RosterEntry>, BackendError>;
    fn push_attendance_update(&self, update: &AttendanceUpdate) -> Result<(), BackendError>;
}

pub struct HttpBackend {
    base: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BackendError::new(BackendErrorKind::Network, e.to_string()))?;
        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn get(&self, path: &str) -> Result<serde_json::Value, BackendError> {
        let url = format!("{}{}", self.base, path);
        tracing::debug!(%url, "backend GET");
        let mut req = self.client.get(&url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .map_err(|e| BackendError::new(BackendErrorKind::Network, e.to_string()))?;
        Self::decode(resp)
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value, BackendError> {
        let url = format!("{}{}", self.base, path);
        tracing::debug!(%url, "backend POST");
        let mut req = self.client.post(&url).json(body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .map_err(|e| BackendError::new(BackendErrorKind::Network, e.to_string()))?;
        Self::decode(resp)
    }

    fn decode(resp: reqwest::blocking::Response) -> Result<serde_json::Value, BackendError> {
        let status = resp.status();
        let body: serde_json::Value = resp.json().unwrap_or(serde_json::Value::Null);
        if !status.is_success() {
            let message = body
                .get("message")
                .or_else(|| body.get("error"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("backend returned {}", status));
            tracing::warn!(%status, %message, "backend rejected request");
            return Err(BackendError::new(BackendErrorKind::Status, message));
        }
        Ok(body)
    }

    fn from_value<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, BackendError> {
        serde_json::from_value(value)
            .map_err(|e| BackendError::new(BackendErrorKind::Decode, e.to_string()))
    }
}

impl Backend for HttpBackend {
    fn course_config(&self, teacher_id: &str) -> Result<CourseConfig, BackendError> {
        let body = self.post("/attendance", &json!({ "teacherId": teacher_id }))?;
        if body.get("success").and_then(|v| v.as_bool()) != Some(true) {
            return Err(BackendError::new(
                BackendErrorKind::Status,
                "course configuration lookup did not succeed",
            ));
        }
        Self::from_value(body.get("data").cloned().unwrap_or(serde_json::Value::Null))
    }

    fn semesters(&self, course_id: &str, teacher_id: &str) -> Result<Vec<u32>, BackendError> {
        let body = self.get(&format!("/attendance/{}/{}/semesters", course_id, teacher_id))?;
        if body.get("success").and_then(|v| v.as_bool()) != Some(true) {
            return Ok(Vec::new());
        }
        let semesters = body
            .get("data")
            .and_then(|d| d.get("availableSemesters"))
            .cloned()
            .unwrap_or_else(|| json!([]));
        Self::from_value(semesters)
    }

    fn specializations(
        &self,
        course: &str,
        semester: u32,
        teacher_id: &str,
    ) -> Result<SpecializationInfo, BackendError> {
        let body = self.post(
            "/attendance/getspecializations",
            &json!({
                "course": course,
                "semester": semester,
                "teacherId": teacher_id,
            }),
        )?;
        Self::from_value(body)
    }

    fn subjects(&self, query: &SubjectQuery) -> Result<Vec<Subject>, BackendError> {
        let body = self.post(
            "/attendance/getsubjects",
            &json!({
                "course": query.course,
                "semester": query.semester,
                "specialization": query.specialization,
                "section": query.section,
            }),
        )?;
        Self::from_value(body)
    }

    fn attendance_summary(&self, query: &SummaryQuery) -> Result<Vec<SummaryRow>, BackendError> {
        let mut body = json!({
            "course": query.course,
            "semester": query.semester,
            "subject": query.subject,
            "academicYear": query.academic_year,
            "section": query.section,
        });
        if let Some(spec) = &query.specialization {
            body["specialization"] = json!(spec);
        }
        if let (Some(start), Some(end)) = (&query.start_date, &query.end_date) {
            body["startDate"] = json!(start);
            body["endDate"] = json!(end);
        }
        let resp = self.post("/attendance/getAttendanceByCourseAndSubject", &body)?;
        // Either {students: [...]} or a bare array.
        let rows = match resp {
            serde_json::Value::Object(mut map) => {
                map.remove("students").unwrap_or(serde_json::Value::Null)
            }
            other => other,
        };
        if rows.is_null() {
            return Ok(Vec::new());
        }
        Self::from_value(rows)
    }

    fn marked_attendances(&self, teacher_id: &str) -> Result<MarkedOverview, BackendError> {
        let body = self.get(&format!("/attendance/teacher-marked/{}", teacher_id))?;
        Self::from_value(body)
    }

    fn update_roster(
        &self,
        subject_code: &str,
        date: &str,
    ) -> Result<Vec<RosterEntry>, BackendError> {
        let body = self.get(&format!(
            "/attendance/fetch-students-for-update/{}/{}",
            subject_code, date
        ))?;
        let students = body.get("students").cloned().unwrap_or_else(|| json!([]));
        Self::from_value(students)
    }

    fn push_attendance_update(&self, update: &AttendanceUpdate) -> Result<(), BackendError> {
        self.post(
            "/attendance/update-attendance",
            &json!({
                "teacherId": update.teacher_id,
                "subjectCode": update.subject_code,
                "date": update.date,
                "updates": update.updates,
            }),
        )?;
        Ok(())
    }
}
