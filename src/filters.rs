use crate::calc::CalcError;
use crate::config::DashboardConfig;
use crate::records::ExamRecord;
use serde::{Serialize, Serializer};
use serde_json::json;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub const OVERALL: &str = "Overall";
pub const OPEN_ELECTIVE: &str = "Others (Open Elective)";
pub const ALL: &str = "All";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DepartmentChoice {
    #[default]
    Overall,
    OpenElective,
    Named(String),
}

impl DepartmentChoice {
    pub fn as_str(&self) -> &str {
        match self {
            DepartmentChoice::Overall => OVERALL,
            DepartmentChoice::OpenElective => OPEN_ELECTIVE,
            DepartmentChoice::Named(name) => name.as_str(),
        }
    }
}

impl Serialize for DepartmentChoice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// "All" or one concrete value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Choice<T> {
    #[default]
    All,
    Only(T),
}

impl<T: PartialEq> Choice<T> {
    pub fn admits(&self, value: &T) -> bool {
        match self {
            Choice::All => true,
            Choice::Only(v) => v == value,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Choice::All)
    }
}

impl<T: fmt::Display> Serialize for Choice<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Choice::All => serializer.serialize_str(ALL),
            Choice::Only(v) => serializer.collect_str(v),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub department: DepartmentChoice,
    pub branch: Choice<String>,
    pub semester: Choice<i64>,
    pub subject: Choice<String>,
}

fn is_sentinel(s: &str, sentinel: &str) -> bool {
    s.eq_ignore_ascii_case(sentinel)
}

fn optional_str<'a>(
    obj: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<&'a str>, CalcError> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_str() {
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => Ok(Some(s.trim())),
            None => Err(CalcError::new(
                "bad_params",
                format!("selection.{} must be a string", key),
            )),
        },
    }
}

/// Parse a selection object. Absent keys mean Overall/All; the branch is
/// forced to All unless a named department is selected.
pub fn parse_selection(
    raw: Option<&serde_json::Value>,
    config: &DashboardConfig,
) -> Result<Selection, CalcError> {
    let Some(raw) = raw.filter(|v| !v.is_null()) else {
        return Ok(Selection::default());
    };
    let Some(obj) = raw.as_object() else {
        return Err(CalcError::new("bad_params", "selection must be an object"));
    };

    let department = match optional_str(obj, "department")? {
        None => DepartmentChoice::Overall,
        Some(s) if is_sentinel(s, OVERALL) => DepartmentChoice::Overall,
        Some(s) if is_sentinel(s, OPEN_ELECTIVE) => DepartmentChoice::OpenElective,
        Some(s) => DepartmentChoice::Named(s.to_string()),
    };

    let branch = match (&department, optional_str(obj, "branch")?) {
        (DepartmentChoice::Named(_), Some(s)) if !is_sentinel(s, ALL) => {
            Choice::Only(s.to_string())
        }
        _ => Choice::All,
    };

    let semester = match obj.get("semester") {
        None => Choice::All,
        Some(v) if v.is_null() => Choice::All,
        Some(v) => {
            let n = match v {
                serde_json::Value::String(s) if is_sentinel(s.trim(), ALL) => None,
                serde_json::Value::String(s) => Some(s.trim().parse::<i64>().map_err(|_| {
                    CalcError::new("bad_params", "selection.semester must be an integer or 'All'")
                })?),
                serde_json::Value::Number(_) => Some(v.as_i64().ok_or_else(|| {
                    CalcError::new("bad_params", "selection.semester must be an integer or 'All'")
                })?),
                _ => {
                    return Err(CalcError::new(
                        "bad_params",
                        "selection.semester must be an integer or 'All'",
                    ))
                }
            };
            match n {
                None => Choice::All,
                Some(n) if config.semesters.contains(&n) => Choice::Only(n),
                Some(n) => {
                    return Err(CalcError::new(
                        "bad_params",
                        "selection.semester is not an offered semester",
                    )
                    .with_details(json!({ "semester": n, "offered": config.semesters })))
                }
            }
        }
    };

    let subject = match optional_str(obj, "subject")? {
        Some(s) if !is_sentinel(s, ALL) => Choice::Only(s.to_string()),
        _ => Choice::All,
    };

    Ok(Selection {
        department,
        branch,
        semester,
        subject,
    })
}

/// A read-only window over a loaded record snapshot.
///
/// Every filter step returns a new view; the snapshot and earlier views are
/// never touched.
#[derive(Debug, Clone)]
pub struct View {
    records: Arc<[ExamRecord]>,
    rows: Vec<usize>,
}

impl View {
    pub fn full(records: Arc<[ExamRecord]>) -> Self {
        let rows = (0..records.len()).collect();
        Self { records, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExamRecord> + '_ {
        self.rows.iter().map(move |&i| &self.records[i])
    }

    fn retain<F>(&self, keep: F) -> View
    where
        F: Fn(&ExamRecord) -> bool,
    {
        View {
            records: Arc::clone(&self.records),
            rows: self
                .rows
                .iter()
                .copied()
                .filter(|&i| keep(&self.records[i]))
                .collect(),
        }
    }

    /// Rows in either view, each once, in snapshot order. Both views must
    /// share a snapshot.
    fn union(&self, other: &View) -> View {
        let rows: BTreeSet<usize> = self.rows.iter().chain(&other.rows).copied().collect();
        View {
            records: Arc::clone(&self.records),
            rows: rows.into_iter().collect(),
        }
    }

    fn distinct<F>(&self, field: F) -> Vec<String>
    where
        F: Fn(&ExamRecord) -> &str,
    {
        self.iter()
            .map(field)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

pub fn filter_department(
    view: &View,
    choice: &DepartmentChoice,
    config: &DashboardConfig,
) -> View {
    match choice {
        DepartmentChoice::Overall => view.clone(),
        DepartmentChoice::Named(name) => view.retain(|r| r.department == *name),
        DepartmentChoice::OpenElective => {
            let unclaimed = view.retain(|r| !config.has_home_prefix(&r.subject_code));
            let cross_listed = view.retain(|r| config.is_extra_subject(&r.subject_code));
            unclaimed.union(&cross_listed)
        }
    }
}

pub fn filter_branch(view: &View, choice: &Choice<String>) -> View {
    match choice {
        Choice::All => view.clone(),
        Choice::Only(_) => view.retain(|r| choice.admits(&r.branch)),
    }
}

pub fn filter_semester(view: &View, choice: &Choice<i64>) -> View {
    match choice {
        Choice::All => view.clone(),
        Choice::Only(sem) => view.retain(|r| r.semester == Some(*sem)),
    }
}

pub fn filter_subject(view: &View, choice: &Choice<String>) -> View {
    match choice {
        Choice::All => view.clone(),
        Choice::Only(_) => view.retain(|r| choice.admits(&r.subject_code)),
    }
}

/// Department, then branch, then semester, then subject. Branch only applies
/// under a named department.
pub fn apply_filters(view: &View, selection: &Selection, config: &DashboardConfig) -> View {
    let v = filter_department(view, &selection.department, config);
    let v = match selection.department {
        DepartmentChoice::Named(_) => filter_branch(&v, &selection.branch),
        DepartmentChoice::Overall | DepartmentChoice::OpenElective => v,
    };
    let v = filter_semester(&v, &selection.semester);
    filter_subject(&v, &selection.subject)
}

/// Dropdown contents for one selection state. Each list is drawn from the view
/// produced by the steps above it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub departments: Vec<String>,
    pub branch_enabled: bool,
    pub branches: Vec<String>,
    pub semesters: Vec<String>,
    pub subjects: Vec<String>,
}

pub fn filter_options(
    view: &View,
    selection: &Selection,
    config: &DashboardConfig,
) -> FilterOptions {
    let mut departments = vec![OVERALL.to_string(), OPEN_ELECTIVE.to_string()];
    departments.extend(view.distinct(|r| r.department.as_str()));

    let by_department = filter_department(view, &selection.department, config);

    let branch_enabled = matches!(selection.department, DepartmentChoice::Named(_));
    let mut branches = vec![ALL.to_string()];
    let by_branch = if branch_enabled {
        branches.extend(by_department.distinct(|r| r.branch.as_str()));
        filter_branch(&by_department, &selection.branch)
    } else {
        by_department
    };

    let mut semesters = vec![ALL.to_string()];
    semesters.extend(config.semesters.iter().map(|s| s.to_string()));

    let by_semester = filter_semester(&by_branch, &selection.semester);
    let mut subjects = vec![ALL.to_string()];
    subjects.extend(by_semester.distinct(|r| r.subject_code.as_str()));

    FilterOptions {
        departments,
        branch_enabled,
        branches,
        semesters,
        subjects,
    }
}
