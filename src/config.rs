use serde::{Deserialize, Serialize};

/// Percentage thresholds for classifying a student's attendance.
///
/// The default is the 75/65 table used by the student detail views. Older
/// dashboards shipped a 50/30 table; deployments that still want it can
/// override the thresholds at session open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusPolicy {
    pub good_min: f64,
    pub warning_min: f64,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            good_min: 75.0,
            warning_min: 65.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SectionRule {
    pub course: String,
    pub semester: u32,
    pub sections: Vec<String>,
}

/// Section options per (course, semester). A local rule table, not a remote
/// lookup: the backend exposes no section endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SectionRules {
    pub default_sections: Vec<String>,
    #[serde(default)]
    pub overrides: Vec<SectionRule>,
}

impl Default for SectionRules {
    fn default() -> Self {
        Self {
            default_sections: vec!["A".to_string(), "B".to_string()],
            overrides: vec![SectionRule {
                course: "MBA(MS)-2Yrs".to_string(),
                semester: 1,
                sections: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            }],
        }
    }
}

impl SectionRules {
    pub fn options_for(&self, course: &str, semester: u32) -> Vec<String> {
        for rule in &self.overrides {
            if rule.course == course && rule.semester == semester {
                return rule.sections.clone();
            }
        }
        self.default_sections.clone()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Policies {
    #[serde(default)]
    pub status: StatusPolicy,
    #[serde(default)]
    pub sections: SectionRules,
}
