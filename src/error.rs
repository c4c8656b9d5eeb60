use thiserror::Error;

#[derive(Error, Debug)]
pub enum WmmError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Filter pattern must not be empty")]
    EmptyPattern,

    #[error("{field} is longer than {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("Unknown timeline granularity: {0} (expected year, month, day or unit)")]
    UnknownGranularity(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown filter: {0}")]
    UnknownFilter(i64),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl WmmError {
    /// Malformed input detected before the store was touched.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Self::EmptyPattern
                | Self::TooLong { .. }
                | Self::EmptyField(_)
                | Self::UnknownGranularity(_)
                | Self::InvalidDate(_)
                | Self::InvalidAmount(_)
                | Self::UnknownFilter(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WmmError>;
