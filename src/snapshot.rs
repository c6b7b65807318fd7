use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use uuid::Uuid;

use crate::completion;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::models::{GroupKey, Snapshot, Table};

/// Runs the whole pipeline over one table. Every precondition is checked
/// before a snapshot exists, so a failure leaves nothing half-built.
pub fn build_snapshot(
    table: &Table,
    source: &str,
    config: &EngineConfig,
) -> EngineResult<Snapshot> {
    let reserved = config.reserved_columns();
    let course_columns = completion::classify_columns(table, &reserved)?;
    let normalized = completion::normalize_flags(table, &course_columns);
    let employees = completion::derive_employee_fields(
        &normalized,
        &reserved,
        &course_columns,
        config.policy.pending,
    )?;
    let groups = completion::aggregate(
        &normalized,
        &employees,
        course_columns.len(),
        &GroupKey::Group,
        &config.group_table(),
        &config.denominator_policy(),
    )?;
    let overall = completion::overall(&employees, course_columns.len(), "Overall")?;

    Ok(Snapshot {
        id: Uuid::new_v4(),
        loaded_at: Utc::now(),
        source: source.to_string(),
        course_columns,
        employees,
        groups,
        overall,
    })
}

/// Holds the most recent successful snapshot. Readers clone the `Arc` and
/// always see a complete snapshot; a failed load keeps the previous one.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swaps in `snapshot` and returns the one it replaced.
    pub fn replace(&self, snapshot: Arc<Snapshot>) -> Option<Arc<Snapshot>> {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        tracing::info!(
            id = %snapshot.id,
            source = %snapshot.source,
            employees = snapshot.employees.len(),
            "snapshot replaced"
        );
        guard.replace(snapshot)
    }

    pub fn load(
        &self,
        table: &Table,
        source: &str,
        config: &EngineConfig,
    ) -> EngineResult<Arc<Snapshot>> {
        match build_snapshot(table, source, config) {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.replace(Arc::clone(&snapshot));
                Ok(snapshot)
            }
            Err(err) => {
                tracing::warn!(source, error = %err, "load rejected, keeping previous snapshot");
                Err(err)
            }
        }
    }
}
