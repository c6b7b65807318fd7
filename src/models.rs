use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Blank,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Blank;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_nan() => Cell::Blank,
            Ok(value) if value.is_finite() => Cell::Number(value),
            _ => Cell::Text(trimmed.to_string()),
        }
    }

    /// Text as a spreadsheet would display it; whole numbers drop the `.0`.
    pub fn display(&self) -> String {
        match self {
            Cell::Blank => String::new(),
            Cell::Number(value) if value.fract() == 0.0 => format!("{}", *value as i64),
            Cell::Number(value) => value.to_string(),
            Cell::Text(text) => text.clone(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }
}

/// One loaded sheet: a header row plus data rows. Rows shorter than the
/// header read as blank in the missing positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.headers.iter().position(|header| header.trim() == wanted)
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        static BLANK: Cell = Cell::Blank;
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&BLANK)
    }

    pub fn is_numeric_column(&self, column: usize) -> bool {
        (0..self.rows.len()).all(|row| !matches!(self.cell(row, column), Cell::Text(_)))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PendingPolicy {
    /// A course value of exactly 1 marks the course as pending.
    #[default]
    FlagIsPending,
    /// Course values are summed directly as completed units.
    FlagIsCompletedCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DenominatorKind {
    #[default]
    Observed,
    Sanctioned,
}

/// Headers that never count as course columns even when numeric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedColumns {
    pub name: String,
    pub office: String,
    pub others: Vec<String>,
}

impl ReservedColumns {
    pub fn contains(&self, header: &str) -> bool {
        let header = header.trim();
        header == self.name.trim()
            || header == self.office.trim()
            || self.others.iter().any(|other| other.trim() == header)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupDef {
    pub name: String,
    #[serde(default)]
    pub offices: Vec<String>,
    #[serde(default)]
    pub sanctioned_strength: Option<usize>,
}

/// Office to group membership with a fallback bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTable {
    pub groups: Vec<GroupDef>,
    pub default_group: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenominatorPolicy {
    /// Members are the rows present in the group.
    Observed,
    /// Members are a fixed headcount per group, independent of the rows present.
    Sanctioned(BTreeMap<String, usize>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    /// Bucket offices through the configured group table.
    Group,
    /// Bucket by the raw text of a named column.
    Column(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Exact,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeRecord {
    pub row: usize,
    pub name: String,
    pub office: String,
    pub pending_count: usize,
    pub completed_count: usize,
    pub completion_pct: f64,
    pub pending_courses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAggregate {
    pub group: String,
    pub observed_members: usize,
    pub member_count: usize,
    pub total_slots: usize,
    pub pending_slots: usize,
    pub completed_slots: usize,
    pub completion_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub loaded_at: DateTime<Utc>,
    pub source: String,
    pub course_columns: Vec<String>,
    pub employees: Vec<EmployeeRecord>,
    pub groups: Vec<GroupAggregate>,
    pub overall: GroupAggregate,
}

impl Snapshot {
    pub fn course_count(&self) -> usize {
        self.course_columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cells_by_content() {
        assert_eq!(Cell::parse("  "), Cell::Blank);
        assert_eq!(Cell::parse(" 1 "), Cell::Number(1.0));
        assert_eq!(Cell::parse("Nellore"), Cell::Text("Nellore".to_string()));
        assert_eq!(Cell::parse("NaN"), Cell::Blank);
        assert_eq!(Cell::parse("inf"), Cell::Text("inf".to_string()));
    }

    #[test]
    fn displays_whole_numbers_without_fraction() {
        assert_eq!(Cell::Number(42.0).display(), "42");
        assert_eq!(Cell::Number(0.5).display(), "0.5");
        assert_eq!(Cell::Blank.display(), "");
    }

    #[test]
    fn short_rows_read_as_blank() {
        let table = Table::new(
            vec!["Name".to_string(), "Course A".to_string()],
            vec![vec![Cell::Text("Ravi".to_string())]],
        );
        assert_eq!(table.cell(0, 1), &Cell::Blank);
        assert!(table.is_numeric_column(1));
        assert!(!table.is_numeric_column(0));
    }

    #[test]
    fn reserved_columns_match_trimmed_headers() {
        let reserved = ReservedColumns {
            name: "Name".to_string(),
            office: "Office".to_string(),
            others: vec!["Total Courses".to_string()],
        };
        assert!(reserved.contains(" Total Courses"));
        assert!(reserved.contains("Office"));
        assert!(!reserved.contains("POSH"));
    }

    #[test]
    fn column_lookup_ignores_surrounding_whitespace() {
        let table = Table::new(vec![" Office of Working ".to_string()], Vec::new());
        assert_eq!(table.column_index("Office of Working"), Some(0));
        assert_eq!(table.column_index("Office"), None);
    }
}
