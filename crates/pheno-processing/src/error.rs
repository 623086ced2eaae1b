//! Custom error types for the surveillance preparation pipeline.
//!
//! Row- and field-level problems (unparseable dates, non-numeric counts,
//! zero totals) are recovered locally during cleaning and never surface
//! here; they are reported through [`crate::types::CleaningReport`]. The
//! variants below cover the failures a caller must actually handle.

use thiserror::Error;

/// The main error type for the preparation pipeline.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// A structurally required column is absent from the input table.
    ///
    /// This is the only data-shaped condition that fails the pipeline;
    /// everything else degrades to row/field-level diagnostics.
    #[error("Required column '{0}' not found in dataset")]
    MissingColumn(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] crate::config::ConfigValidationError),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this error reports a missing required column.
    pub fn is_missing_column(&self) -> bool {
        match self {
            Self::MissingColumn(_) => true,
            Self::WithContext { source, .. } => source.is_missing_column(),
            _ => false,
        }
    }
}

/// Result type alias for preparation operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_display() {
        let err = ProcessingError::MissingColumn("VRSA".to_string());
        assert!(err.to_string().contains("VRSA"));
        assert!(err.is_missing_column());
    }

    #[test]
    fn test_with_context_preserves_kind() {
        let err = ProcessingError::MissingColumn("week".to_string()).with_context("During cleaning");
        assert!(err.to_string().contains("During cleaning"));
        assert!(err.is_missing_column());
    }

    #[test]
    fn test_context_on_polars_result() {
        let res: std::result::Result<(), polars::error::PolarsError> = Err(
            polars::error::PolarsError::ComputeError("boom".into()),
        );
        let err = res.context("while filtering").unwrap_err();
        assert!(err.to_string().contains("while filtering"));
        assert!(!err.is_missing_column());
    }
}
