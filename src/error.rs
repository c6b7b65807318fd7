use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("required column `{column}` not found")]
    MissingColumn { column: String },
    #[error("no numeric course columns found")]
    NoCourseColumns,
    #[error("course count is zero, completion percentage is undefined")]
    ZeroCourseCount,
    #[error("group `{group}` has no sanctioned strength configured")]
    UnknownGroup { group: String },
    #[error("group `{group}` has a sanctioned strength of zero")]
    InvalidStrength { group: String },
}

impl EngineError {
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    pub fn unknown_group(group: impl Into<String>) -> Self {
        Self::UnknownGroup {
            group: group.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
