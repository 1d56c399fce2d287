use crate::filters::{Selection, View};
use crate::records::{ExamRecord, Mark, SubjectType};
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashSet;

/// Fixed display order for grades, best first. `U` is the fail grade.
pub const GRADE_ORDER: [&str; 7] = ["O", "A+", "A", "B+", "B", "C", "U"];

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * count as f64 / total as f64
    }
}

// ---------------------------------------------------------------------------
// Pass / fail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PassStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStatus {
    pub reg_no: String,
    pub status: PassStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: PassStatus,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassFailSummary {
    pub total: usize,
    /// Always `[Pass, Fail]`.
    pub rows: Vec<StatusCount>,
}

impl PassFailSummary {
    #[allow(dead_code)]
    pub fn count(&self, status: PassStatus) -> usize {
        self.rows
            .iter()
            .find(|r| r.status == status)
            .map(|r| r.count)
            .unwrap_or(0)
    }
}

/// One status per distinct student, ordered by registration number. A single
/// `U` row fails the student.
pub fn student_statuses(view: &View) -> Vec<StudentStatus> {
    let mut failed: BTreeMap<&str, bool> = BTreeMap::new();
    for r in view.iter() {
        *failed.entry(r.reg_no.as_str()).or_insert(false) |= r.is_fail();
    }
    failed
        .into_iter()
        .map(|(reg_no, failed)| StudentStatus {
            reg_no: reg_no.to_string(),
            status: if failed {
                PassStatus::Fail
            } else {
                PassStatus::Pass
            },
        })
        .collect()
}

pub fn pass_fail_summary(statuses: &[StudentStatus]) -> PassFailSummary {
    let total = statuses.len();
    let rows = [PassStatus::Pass, PassStatus::Fail]
        .into_iter()
        .map(|status| {
            let count = statuses.iter().filter(|s| s.status == status).count();
            StatusCount {
                status,
                count,
                percentage: percentage(count, total),
            }
        })
        .collect();
    PassFailSummary { total, rows }
}

// ---------------------------------------------------------------------------
// Fail categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailCategory {
    Prevention,
    Malpractice,
    Absent,
    Attempted,
}

impl FailCategory {
    pub const ALL: [FailCategory; 4] = [
        FailCategory::Prevention,
        FailCategory::Malpractice,
        FailCategory::Absent,
        FailCategory::Attempted,
    ];

    pub fn from_reason(reason: Option<&str>) -> Self {
        let code = reason.map(|r| r.trim().to_ascii_uppercase());
        match code.as_deref() {
            Some("P") => FailCategory::Prevention,
            Some("M") => FailCategory::Malpractice,
            Some("A") => FailCategory::Absent,
            Some(_) | None => FailCategory::Attempted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRow {
    pub reg_no: String,
    pub subject_code: String,
    pub category: FailCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: FailCategory,
    pub count: usize,
}

/// One row per failing (student, subject) pair, in view order.
pub fn categorize_failures(view: &View) -> Vec<FailureRow> {
    view.iter()
        .filter(|r| r.is_fail())
        .map(|r| FailureRow {
            reg_no: r.reg_no.clone(),
            subject_code: r.subject_code.clone(),
            category: FailCategory::from_reason(r.fail_reason.as_deref()),
        })
        .collect()
}

/// All four categories, in fixed order, zero-filled.
pub fn fail_category_summary(failures: &[FailureRow]) -> Vec<CategoryCount> {
    FailCategory::ALL
        .into_iter()
        .map(|category| CategoryCount {
            category,
            count: failures.iter().filter(|f| f.category == category).count(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Grade distribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCount {
    pub grade: String,
    pub count: usize,
}

/// Distinct students holding each grade, in [`GRADE_ORDER`]. Grades outside
/// the fixed set are not reported.
pub fn grade_distribution(view: &View) -> Vec<GradeCount> {
    let mut students: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
    for r in view.iter() {
        students
            .entry(r.grade.as_str())
            .or_default()
            .insert(r.reg_no.as_str());
    }
    GRADE_ORDER
        .iter()
        .map(|g| GradeCount {
            grade: g.to_string(),
            count: students.get(g).map(|s| s.len()).unwrap_or(0),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Subjects failed per student
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailCountRow {
    pub subjects_failed: usize,
    pub student_count: usize,
}

/// Histogram of failed-subject counts over students with at least one fail,
/// ordered by fail count.
pub fn subjects_failed(view: &View) -> Vec<FailCountRow> {
    let mut per_student: BTreeMap<&str, usize> = BTreeMap::new();
    for r in view.iter().filter(|r| r.is_fail()) {
        *per_student.entry(r.reg_no.as_str()).or_insert(0) += 1;
    }
    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
    for n in per_student.into_values() {
        *histogram.entry(n).or_insert(0) += 1;
    }
    histogram
        .into_iter()
        .map(|(subjects_failed, student_count)| FailCountRow {
            subjects_failed,
            student_count,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Average marks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkMean {
    pub average: Option<f64>,
    pub count: usize,
    pub missing_count: usize,
}

/// Mean over present marks only. Missing marks are counted but never enter
/// the denominator.
pub fn mark_mean<I>(marks: I) -> MarkMean
where
    I: IntoIterator<Item = Mark>,
{
    let mut sum = 0.0;
    let mut count = 0usize;
    let mut missing_count = 0usize;
    for m in marks {
        match m {
            Mark::Missing => missing_count += 1,
            Mark::Value(v) => {
                sum += v;
                count += 1;
            }
        }
    }
    MarkMean {
        average: if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        },
        count,
        missing_count,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkKind {
    Internal,
    External,
    Total,
}

impl MarkKind {
    fn column(self) -> &'static str {
        match self {
            MarkKind::Internal => "SESMARK",
            MarkKind::External => "ESEM",
            MarkKind::Total => "TOTMARK",
        }
    }

    fn of(self, r: &ExamRecord) -> Mark {
        match self {
            MarkKind::Internal => r.internal_mark,
            MarkKind::External => r.external_mark,
            MarkKind::Total => r.total_mark,
        }
    }
}

/// Subject-type buckets for the internal-mark breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InternalBucket {
    Theory,
    Practical,
    Lab,
    Single,
    Other,
}

impl InternalBucket {
    pub const ALL: [InternalBucket; 5] = [
        InternalBucket::Theory,
        InternalBucket::Practical,
        InternalBucket::Lab,
        InternalBucket::Single,
        InternalBucket::Other,
    ];

    fn of(subject_type: Option<SubjectType>) -> Self {
        match subject_type {
            Some(SubjectType::Theory) => InternalBucket::Theory,
            Some(SubjectType::Practical) => InternalBucket::Practical,
            Some(SubjectType::Lab) => InternalBucket::Lab,
            Some(SubjectType::Single) => InternalBucket::Single,
            Some(SubjectType::Open) | None => InternalBucket::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAverage {
    pub mark_type: MarkKind,
    pub column: String,
    pub average: Option<f64>,
    pub count: usize,
    pub missing_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalAverage {
    pub subject_type: InternalBucket,
    pub average: Option<f64>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageMarks {
    /// Internal, External, Total.
    pub overall: Vec<MarkAverage>,
    /// All five buckets, in fixed order.
    pub internal_by_type: Vec<InternalAverage>,
}

pub fn average_marks(view: &View) -> AverageMarks {
    let overall = [MarkKind::Internal, MarkKind::External, MarkKind::Total]
        .into_iter()
        .map(|kind| {
            let mean = mark_mean(view.iter().map(|r| kind.of(r)));
            MarkAverage {
                mark_type: kind,
                column: kind.column().to_string(),
                average: mean.average,
                count: mean.count,
                missing_count: mean.missing_count,
            }
        })
        .collect();

    let internal_by_type = InternalBucket::ALL
        .into_iter()
        .map(|bucket| {
            let mean = mark_mean(
                view.iter()
                    .filter(|r| InternalBucket::of(r.subject_type) == bucket)
                    .map(|r| r.internal_mark),
            );
            InternalAverage {
                subject_type: bucket,
                average: mean.average,
                count: mean.count,
            }
        })
        .collect();

    AverageMarks {
        overall,
        internal_by_type,
    }
}

// ---------------------------------------------------------------------------
// Dashboard model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardModel {
    pub selection: Selection,
    pub record_count: usize,
    pub student_count: usize,
    pub pass_fail: PassFailSummary,
    pub fail_categories: Vec<CategoryCount>,
    pub average_marks: AverageMarks,
    pub subjects_failed: Vec<FailCountRow>,
    /// The per-student fail histogram is only charted across all subjects.
    pub show_subjects_failed: bool,
    pub grade_distribution: Vec<GradeCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardDetails {
    pub students: Vec<StudentStatus>,
    pub failures: Vec<FailureRow>,
}

pub fn compute_dashboard(view: &View, selection: &Selection) -> DashboardModel {
    let statuses = student_statuses(view);
    let failures = categorize_failures(view);
    DashboardModel {
        selection: selection.clone(),
        record_count: view.len(),
        student_count: statuses.len(),
        pass_fail: pass_fail_summary(&statuses),
        fail_categories: fail_category_summary(&failures),
        average_marks: average_marks(view),
        subjects_failed: subjects_failed(view),
        show_subjects_failed: selection.subject.is_all(),
        grade_distribution: grade_distribution(view),
    }
}

pub fn compute_details(view: &View) -> DashboardDetails {
    DashboardDetails {
        students: student_statuses(view),
        failures: categorize_failures(view),
    }
}
