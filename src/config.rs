use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variable naming an optional JSON config file.
pub const CONFIG_ENV: &str = "EXAMDASHD_CONFIG";

pub const DEFAULT_SHEET_NAME: &str = "UG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentPrefix {
    pub department: String,
    pub prefix: String,
}

/// Static dashboard configuration. Immutable once loaded; the filter cascade
/// receives it by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardConfig {
    pub sheet_name: String,
    /// Home-department subject-code prefixes. A subject matching none of these
    /// is an open elective.
    pub department_prefixes: Vec<DepartmentPrefix>,
    /// Cross-listed electives per department. These codes always land in the
    /// open-elective view, even when their prefix matches a home department.
    pub extra_subjects: BTreeMap<String, Vec<String>>,
    pub semesters: Vec<i64>,
}

const DEFAULT_PREFIXES: [(&str, &str); 10] = [
    ("Aerospace", "AE"),
    ("Automobile", "AU"),
    ("Electronics Comm", "EC"),
    ("Artificial Intelligence", "AZ"),
    ("Information Tech", "IT"),
    ("Inst Eng", "EI"),
    ("Mech", "ME"),
    ("Production", "PR"),
    ("Robotics", "RO"),
    ("Rubber and Plastics", "RP"),
];

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            department_prefixes: DEFAULT_PREFIXES
                .iter()
                .map(|(department, prefix)| DepartmentPrefix {
                    department: department.to_string(),
                    prefix: prefix.to_string(),
                })
                .collect(),
            extra_subjects: DEFAULT_PREFIXES
                .iter()
                .map(|(department, _)| (department.to_string(), Vec::new()))
                .collect(),
            semesters: vec![5, 7],
        }
    }
}

impl DashboardConfig {
    /// Reads the file named by `EXAMDASHD_CONFIG`, or returns the defaults
    /// when the variable is unset.
    pub fn load_from_env() -> anyhow::Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load_from_path(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.to_string_lossy()))?;
        let cfg: DashboardConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.to_string_lossy()))?;
        if cfg.sheet_name.trim().is_empty() {
            anyhow::bail!("config sheetName must not be empty");
        }
        if cfg.department_prefixes.iter().any(|p| p.prefix.is_empty()) {
            anyhow::bail!("config departmentPrefixes must not contain empty prefixes");
        }
        Ok(cfg)
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.department_prefixes.iter().map(|p| p.prefix.as_str())
    }

    pub fn has_home_prefix(&self, subject_code: &str) -> bool {
        self.prefixes().any(|p| subject_code.starts_with(p))
    }

    pub fn is_extra_subject(&self, subject_code: &str) -> bool {
        self.extra_subjects
            .values()
            .any(|codes| codes.iter().any(|c| c == subject_code))
    }
}
