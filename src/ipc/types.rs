use std::path::PathBuf;

use serde::Deserialize;

use crate::backend::Backend;
use crate::cascade::FilterController;
use crate::config::Policies;
use crate::store::SessionStore;
use crate::summary::SummaryRecord;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<SessionStore>,
    pub backend: Option<Box<dyn Backend>>,
    pub policies: Policies,
    pub controller: FilterController,
    pub summary: Vec<SummaryRecord>,
    pub courses_loaded: bool,
}

impl AppState {
    pub fn new() -> Self {
        let policies = Policies::default();
        let controller = FilterController::new(policies.sections.clone());
        Self {
            workspace: None,
            store: None,
            backend: None,
            policies,
            controller,
            summary: Vec::new(),
            courses_loaded: false,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
