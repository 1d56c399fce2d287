use crate::config::DashboardConfig;
use crate::workbook::LoadedWorkbook;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// One UI client's isolated state. Sessions never share snapshots.
pub struct Session {
    pub opened_at: DateTime<Utc>,
    pub workbook: Option<LoadedWorkbook>,
}

pub struct AppState {
    pub config: DashboardConfig,
    pub sessions: HashMap<String, Session>,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
        }
    }
}
