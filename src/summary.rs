use serde::{Deserialize, Serialize};

use crate::backend::{Subject, SummaryQuery, SummaryRow};
use crate::cascade::FilterSelection;
use crate::config::StatusPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Good,
    Warning,
    Critical,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "good" => Some(Self::Good),
            "warning" => Some(Self::Warning),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// One row per student for the resolved filter tuple, with the derived
/// fields attached. Recreated on every successful summary fetch.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub student_id: String,
    pub roll_number: String,
    pub student_name: String,
    pub classes_attended: u32,
    pub total_classes: u32,
    pub percentage: f64,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total: usize,
    pub good: usize,
    pub warning: usize,
    pub critical: usize,
    pub average_attendance: f64,
}

/// "YYYY-YYYY" collapses to "YYYY-YY"; "YYYY-YY" passes through; anything
/// else is invalid.
pub fn normalize_academic_year(year: &str) -> Option<String> {
    let (start, end) = year.split_once('-')?;
    if start.len() != 4 || !start.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match end.len() {
        4 if end.bytes().all(|b| b.is_ascii_digit()) => {
            Some(format!("{}-{}", start, &end[2..]))
        }
        2 if end.bytes().all(|b| b.is_ascii_digit()) => Some(year.to_string()),
        _ => None,
    }
}

/// Attendance percentage rounded to two decimals; 0 when no classes were
/// held.
pub fn calculate_percentage(attended: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = (attended as f64 / total as f64) * 100.0;
    (raw * 100.0).round() / 100.0
}

pub fn status_for(percentage: f64, policy: &StatusPolicy) -> AttendanceStatus {
    if percentage >= policy.good_min {
        AttendanceStatus::Good
    } else if percentage >= policy.warning_min {
        AttendanceStatus::Warning
    } else {
        AttendanceStatus::Critical
    }
}

pub fn derive_records(rows: Vec<SummaryRow>, policy: &StatusPolicy) -> Vec<SummaryRecord> {
    rows.into_iter()
        .map(|row| {
            let percentage = calculate_percentage(row.classes_attended, row.total_classes);
            SummaryRecord {
                student_id: row.student_id,
                roll_number: row.roll_number,
                student_name: row.student_name,
                classes_attended: row.classes_attended,
                total_classes: row.total_classes,
                percentage,
                status: status_for(percentage, policy),
            }
        })
        .collect()
}

pub fn stats(records: &[SummaryRecord]) -> SummaryStats {
    if records.is_empty() {
        return SummaryStats::default();
    }
    let mut out = SummaryStats {
        total: records.len(),
        ..SummaryStats::default()
    };
    let mut sum = 0.0;
    for record in records {
        sum += record.percentage;
        match record.status {
            AttendanceStatus::Good => out.good += 1,
            AttendanceStatus::Warning => out.warning += 1,
            AttendanceStatus::Critical => out.critical += 1,
        }
    }
    out.average_attendance = (sum / records.len() as f64 * 100.0).round() / 100.0;
    out
}

pub fn filter_by_status(
    records: &[SummaryRecord],
    status: AttendanceStatus,
) -> Vec<SummaryRecord> {
    records
        .iter()
        .filter(|r| r.status == status)
        .cloned()
        .collect()
}

/// Validate the resolved selection and shape the backend request. Validation
/// failures come back as user-facing messages and no network call is made.
pub fn build_query(
    selection: &FilterSelection,
    has_specializations: bool,
    subjects: &[Subject],
) -> Result<SummaryQuery, String> {
    let (Some(_course), Some(semester), Some(subject), Some(academic_year)) = (
        selection.course.as_ref(),
        selection.semester,
        selection.subject.as_ref(),
        selection.academic_year.as_ref(),
    ) else {
        return Err("Please select Course, Semester, Subject, and Academic Year".to_string());
    };
    if has_specializations && selection.specialization.is_none() {
        return Err("Please select a Specialization".to_string());
    }
    let Some(academic_year) = normalize_academic_year(academic_year) else {
        return Err(format!("Academic year {} is invalid", academic_year));
    };
    // The summary endpoint is keyed on the subject's owning course id.
    let course_id = subjects
        .iter()
        .find(|s| &s.code == subject)
        .and_then(|s| s.course_id.clone())
        .unwrap_or_default();
    if (selection.start_date.is_some()) != (selection.end_date.is_some()) {
        return Err("Provide both start and end dates, or neither".to_string());
    }
    Ok(SummaryQuery {
        course: course_id,
        semester,
        subject: subject.trim().to_string(),
        academic_year,
        specialization: if has_specializations {
            selection.specialization.clone()
        } else {
            None
        },
        section: selection.section.clone(),
        start_date: selection.start_date.clone(),
        end_date: selection.end_date.clone(),
    })
}
