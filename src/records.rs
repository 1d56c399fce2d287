use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

pub const FAIL_GRADE: &str = "U";

/// Column names the workbook must expose, in schema order.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "DEPNAME", "BRNAME", "SEM", "REGNO", "SUBCODE", "SUBTYPE", "SESMARK", "ESEM", "TOTMARK",
    "GRADE",
];

/// One cell as handed over by the workbook reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text rendering used for identifier-like columns. Whole numbers render
    /// without a trailing `.0` so numeric registration numbers stay stable.
    fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(v) if v.is_finite() && v.fract() == 0.0 => format!("{}", *v as i64),
            Cell::Number(v) => v.to_string(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// A mark cell after numeric coercion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mark {
    Missing,
    Value(f64),
}

impl Mark {
    pub fn value(self) -> Option<f64> {
        match self {
            Mark::Missing => None,
            Mark::Value(v) => Some(v),
        }
    }

    fn coerce(cell: &Cell) -> Mark {
        let v = match cell {
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            Cell::Empty | Cell::Bool(_) => None,
        };
        match v {
            Some(v) if v.is_finite() => Mark::Value(v),
            _ => Mark::Missing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SubjectType {
    Theory,
    Practical,
    Lab,
    Single,
    Open,
}

impl SubjectType {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "T" => Some(SubjectType::Theory),
            "P" => Some(SubjectType::Practical),
            "L" => Some(SubjectType::Lab),
            "S" => Some(SubjectType::Single),
            "O" => Some(SubjectType::Open),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExamRecord {
    pub reg_no: String,
    pub department: String,
    pub branch: String,
    pub semester: Option<i64>,
    pub subject_code: String,
    pub subject_type: Option<SubjectType>,
    pub internal_mark: Mark,
    pub external_mark: Mark,
    pub total_mark: Mark,
    pub grade: String,
    /// Trimmed, upper-cased text of the external-mark cell when it holds a
    /// code rather than a number.
    pub fail_reason: Option<String>,
}

impl ExamRecord {
    pub fn is_fail(&self) -> bool {
        self.grade == FAIL_GRADE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("missing required column(s): {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },
    #[error("sheet `{sheet}` not found (available: {})", .available.join(", "))]
    MissingSheet {
        sheet: String,
        available: Vec<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ParsedRecords {
    pub records: Vec<ExamRecord>,
    pub dropped_columns: Vec<String>,
    /// Mark cells that did not coerce to a number.
    pub coercion_gaps: usize,
    /// Rows repeating an earlier `(REGNO, SUBCODE)` pair.
    pub duplicate_rows: usize,
    pub skipped_blank_rows: usize,
}

struct ColumnIndex {
    department: usize,
    branch: usize,
    semester: usize,
    reg_no: usize,
    subject_code: usize,
    subject_type: usize,
    internal: usize,
    external: usize,
    total: usize,
    grade: usize,
}

impl ColumnIndex {
    fn resolve(headers: &[String]) -> Result<Self, SchemaError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let found: Vec<Option<usize>> = REQUIRED_COLUMNS.iter().map(|c| find(*c)).collect();
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .zip(&found)
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns { missing });
        }
        let idx: Vec<usize> = found.into_iter().flatten().collect();
        Ok(Self {
            department: idx[0],
            branch: idx[1],
            semester: idx[2],
            reg_no: idx[3],
            subject_code: idx[4],
            subject_type: idx[5],
            internal: idx[6],
            external: idx[7],
            total: idx[8],
            grade: idx[9],
        })
    }

    fn all(&self) -> [usize; 10] {
        [
            self.department,
            self.branch,
            self.semester,
            self.reg_no,
            self.subject_code,
            self.subject_type,
            self.internal,
            self.external,
            self.total,
            self.grade,
        ]
    }
}

fn coerce_semester(cell: &Cell) -> Option<i64> {
    let v = match cell {
        Cell::Number(v) => *v,
        Cell::Text(s) => s.trim().parse::<f64>().ok()?,
        Cell::Empty | Cell::Bool(_) => return None,
    };
    if v.is_finite() && v.fract() == 0.0 {
        Some(v as i64)
    } else {
        None
    }
}

fn fail_reason_code(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Text(s) => {
            let t = s.trim().to_ascii_uppercase();
            if t.is_empty() {
                None
            } else {
                Some(t)
            }
        }
        _ => None,
    }
}

/// Map a raw sheet onto exam records.
///
/// Only a missing required column is fatal. Mark cells that do not coerce
/// become [`Mark::Missing`] and the row is kept.
pub fn parse_records(table: &RawTable) -> Result<ParsedRecords, SchemaError> {
    let cols = ColumnIndex::resolve(&table.headers)?;
    let used = cols.all();

    let mut out = ParsedRecords {
        dropped_columns: table
            .headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .map(|(_, h)| h.trim().to_string())
            .collect(),
        ..ParsedRecords::default()
    };

    let empty = Cell::Empty;
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for row in &table.rows {
        let cell = |i: usize| row.get(i).unwrap_or(&empty);

        if used.iter().all(|&i| cell(i).is_blank()) {
            out.skipped_blank_rows += 1;
            continue;
        }

        let reg_no = cell(cols.reg_no).as_text();
        let subject_code = cell(cols.subject_code).as_text();
        if !seen.insert((reg_no.clone(), subject_code.clone())) {
            out.duplicate_rows += 1;
            continue;
        }

        let marks = [
            Mark::coerce(cell(cols.internal)),
            Mark::coerce(cell(cols.external)),
            Mark::coerce(cell(cols.total)),
        ];
        out.coercion_gaps += marks.iter().filter(|m| **m == Mark::Missing).count();

        let record = ExamRecord {
            reg_no,
            department: cell(cols.department).as_text(),
            branch: cell(cols.branch).as_text(),
            semester: coerce_semester(cell(cols.semester)),
            subject_code,
            subject_type: SubjectType::from_code(&cell(cols.subject_type).as_text()),
            internal_mark: marks[0],
            external_mark: marks[1],
            total_mark: marks[2],
            grade: cell(cols.grade).as_text().to_ascii_uppercase(),
            fail_reason: fail_reason_code(cell(cols.external)),
        };
        out.records.push(record);
    }

    Ok(out)
}
