use std::collections::{BTreeMap, HashSet};

use crate::error::{EngineError, EngineResult};
use crate::models::{
    Cell, DenominatorPolicy, EmployeeRecord, GroupAggregate, GroupKey, GroupTable, PendingPolicy,
    ReservedColumns, SearchMode, Table,
};

/// Course columns are the numeric, non-reserved headers, in table order.
/// Blank and duplicate headers are skipped.
pub fn classify_columns(table: &Table, reserved: &ReservedColumns) -> EngineResult<Vec<String>> {
    for required in [&reserved.name, &reserved.office] {
        if table.column_index(required).is_none() {
            return Err(EngineError::missing_column(required.trim()));
        }
    }

    let mut seen = HashSet::new();
    let mut courses = Vec::new();
    for (index, header) in table.headers.iter().enumerate() {
        let header = header.trim();
        if header.is_empty() || reserved.contains(header) || !seen.insert(header) {
            continue;
        }
        if table.is_numeric_column(index) {
            courses.push(header.to_string());
        }
    }

    if courses.is_empty() {
        return Err(EngineError::NoCourseColumns);
    }

    tracing::debug!(count = courses.len(), columns = ?courses, "classified course columns");
    Ok(courses)
}

/// Returns a copy of the table with blank course cells set to 0.
pub fn normalize_flags(table: &Table, course_columns: &[String]) -> Table {
    let indices: Vec<usize> = course_columns
        .iter()
        .filter_map(|column| table.column_index(column))
        .collect();
    let width = table.headers.len();

    let rows = table
        .rows
        .iter()
        .map(|cells| {
            let mut cells = cells.clone();
            if cells.len() < width {
                cells.resize(width, Cell::Blank);
            }
            for &index in &indices {
                if cells[index] == Cell::Blank {
                    cells[index] = Cell::Number(0.0);
                }
            }
            cells
        })
        .collect();

    Table::new(table.headers.clone(), rows)
}

pub fn derive_employee_fields(
    table: &Table,
    reserved: &ReservedColumns,
    course_columns: &[String],
    policy: PendingPolicy,
) -> EngineResult<Vec<EmployeeRecord>> {
    let total = course_columns.len();
    if total == 0 {
        return Err(EngineError::ZeroCourseCount);
    }

    let name_index = require_column(table, &reserved.name)?;
    let office_index = require_column(table, &reserved.office)?;
    let courses = course_columns
        .iter()
        .map(|column| require_column(table, column).map(|index| (column.as_str(), index)))
        .collect::<EngineResult<Vec<_>>>()?;

    let mut records = Vec::with_capacity(table.row_count());
    for row in 0..table.row_count() {
        let values: Vec<(&str, f64)> = courses
            .iter()
            .map(|&(column, index)| (column, table.cell(row, index).as_number().unwrap_or(0.0)))
            .collect();

        let completed_count = match policy {
            PendingPolicy::FlagIsPending => {
                total - values.iter().filter(|(_, value)| *value == 1.0).count()
            }
            PendingPolicy::FlagIsCompletedCount => {
                let sum: f64 = values.iter().map(|(_, value)| value).sum();
                let clamped = sum.round().clamp(0.0, total as f64);
                if clamped != sum.round() {
                    tracing::warn!(row, sum, total, "completed units out of range, clamped");
                }
                clamped as usize
            }
        };
        let pending_count = total - completed_count;

        let pending_courses: Vec<String> = match policy {
            PendingPolicy::FlagIsPending => values
                .iter()
                .filter(|(_, value)| *value == 1.0)
                .map(|(column, _)| column.to_string())
                .collect(),
            PendingPolicy::FlagIsCompletedCount => {
                // The lowest-valued columns account for the shortfall; ties keep column order.
                let mut order: Vec<usize> = (0..values.len()).collect();
                order.sort_by(|&a, &b| values[a].1.total_cmp(&values[b].1));
                let mut pending = order[..pending_count].to_vec();
                pending.sort_unstable();
                pending
                    .into_iter()
                    .map(|index| values[index].0.to_string())
                    .collect()
            }
        };

        records.push(EmployeeRecord {
            row,
            name: table.cell(row, name_index).display(),
            office: table.cell(row, office_index).display(),
            pending_count,
            completed_count,
            completion_pct: percentage(completed_count, total),
            pending_courses,
        });
    }

    Ok(records)
}

/// Exact lookup of an office in the membership lists; the first listed group
/// wins and unmatched offices fall into the default group.
pub fn assign_group<'a>(office: &str, groups: &'a GroupTable) -> &'a str {
    let office = office.trim();
    groups
        .groups
        .iter()
        .find(|group| group.offices.iter().any(|member| member.trim() == office))
        .map(|group| group.name.as_str())
        .unwrap_or(groups.default_group.as_str())
}

/// Slot-weighted completion per group, sorted by group name.
pub fn aggregate(
    table: &Table,
    records: &[EmployeeRecord],
    course_count: usize,
    key: &GroupKey,
    groups: &GroupTable,
    policy: &DenominatorPolicy,
) -> EngineResult<Vec<GroupAggregate>> {
    if course_count == 0 {
        return Err(EngineError::ZeroCourseCount);
    }

    let key_index = match key {
        GroupKey::Group => None,
        GroupKey::Column(header) => Some(require_column(table, header)?),
    };

    let mut buckets: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for record in records {
        let label = match key_index {
            None => assign_group(&record.office, groups).to_string(),
            Some(index) => table.cell(record.row, index).display(),
        };
        let entry = buckets.entry(label).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += record.pending_count;
    }

    let mut members = Vec::with_capacity(buckets.len());
    for (group, (observed, _)) in &buckets {
        let count = match policy {
            DenominatorPolicy::Observed => *observed,
            DenominatorPolicy::Sanctioned(strengths) => match strengths.get(group) {
                None => return Err(EngineError::unknown_group(group.clone())),
                Some(0) => {
                    return Err(EngineError::InvalidStrength {
                        group: group.clone(),
                    })
                }
                Some(strength) => *strength,
            },
        };
        members.push(count);
    }

    Ok(buckets
        .into_iter()
        .zip(members)
        .map(|((group, (observed, pending)), member_count)| {
            slot_aggregate(group, observed, member_count, pending, course_count)
        })
        .collect())
}

/// Division-level figure over every record, with the observed denominator.
pub fn overall(
    records: &[EmployeeRecord],
    course_count: usize,
    label: &str,
) -> EngineResult<GroupAggregate> {
    if course_count == 0 {
        return Err(EngineError::ZeroCourseCount);
    }
    let pending = records.iter().map(|record| record.pending_count).sum();
    Ok(slot_aggregate(
        label.to_string(),
        records.len(),
        records.len(),
        pending,
        course_count,
    ))
}

/// Employees with outstanding courses, most pending first.
pub fn most_pending(records: &[EmployeeRecord], limit: usize) -> Vec<&EmployeeRecord> {
    let mut pending: Vec<&EmployeeRecord> = records
        .iter()
        .filter(|record| record.pending_count > 0)
        .collect();
    pending.sort_by(|a, b| {
        b.pending_count
            .cmp(&a.pending_count)
            .then_with(|| a.name.cmp(&b.name))
    });
    pending.truncate(limit);
    pending
}

/// Case-insensitive name search. A blank query matches nothing in either mode.
pub fn search_by_name<'a>(
    records: &'a [EmployeeRecord],
    query: &str,
    mode: SearchMode,
) -> Vec<&'a EmployeeRecord> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    records
        .iter()
        .filter(|record| {
            let name = record.name.trim().to_lowercase();
            match mode {
                SearchMode::Exact => name == query,
                SearchMode::Contains => name.contains(&query),
            }
        })
        .collect()
}

pub fn percentage(completed: usize, total: usize) -> f64 {
    round2(completed as f64 / total as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn slot_aggregate(
    group: String,
    observed_members: usize,
    member_count: usize,
    pending_slots: usize,
    course_count: usize,
) -> GroupAggregate {
    let total_slots = member_count * course_count;
    if pending_slots > total_slots {
        tracing::warn!(
            group = %group,
            pending_slots,
            total_slots,
            "pending slots exceed sanctioned slots"
        );
    }
    let completed_slots = total_slots.saturating_sub(pending_slots);
    let completion_pct = if total_slots == 0 {
        0.0
    } else {
        percentage(completed_slots, total_slots)
    };

    GroupAggregate {
        group,
        observed_members,
        member_count,
        total_slots,
        pending_slots,
        completed_slots,
        completion_pct,
    }
}

fn require_column(table: &Table, name: &str) -> EngineResult<usize> {
    table
        .column_index(name)
        .ok_or_else(|| EngineError::missing_column(name.trim()))
}
