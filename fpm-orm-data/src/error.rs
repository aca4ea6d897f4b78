/// Errors that can occur in the data layer.
#[derive(Debug)]
pub enum DataError {
    /// A single-row lookup that was required to match found nothing.
    NotFound(String),
    /// Malformed caller input: bad condition shape, placeholder/argument
    /// mismatch, unsafe identifier, bad pager or sort direction.
    Validation(String),
    /// A write payload that is neither a typed record nor a field map.
    UnknownDataType(String),
    /// An error reported by the underlying driver, carried verbatim.
    Database(Box<dyn std::error::Error + Send + Sync>),
    /// A migration script failed; the remaining scripts were not attempted.
    Migration {
        script: String,
        source: Box<DataError>,
    },
    /// Invalid connection or engine configuration.
    Config(String),
    Other(String),
}

impl DataError {
    /// Construct a `Database` variant from any error type.
    ///
    /// Used by backend crates (e.g. `fpm-orm-sqlx`) to wrap driver-specific
    /// errors.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        DataError::Validation(msg.into())
    }

    /// Whether this error is a caller mistake rather than a driver failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DataError::Validation(_) | DataError::UnknownDataType(_)
        )
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NotFound(msg) => write!(f, "Not found: {msg}"),
            DataError::Validation(msg) => write!(f, "Invalid query: {msg}"),
            DataError::UnknownDataType(kind) => write!(f, "unknown data type: {kind}"),
            DataError::Database(err) => write!(f, "Database error: {err}"),
            DataError::Migration { script, source } => {
                write!(f, "Migration {script} failed: {source}")
            }
            DataError::Config(msg) => write!(f, "Config error: {msg}"),
            DataError::Other(msg) => write!(f, "Data error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(err) => Some(err.as_ref()),
            DataError::Migration { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Validation(err.to_string())
    }
}

/// Convenience alias for data-layer results.
pub type DataResult<T> = Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_unknown_data_type() {
        let err = DataError::UnknownDataType("array".into());
        assert_eq!(err.to_string(), "unknown data type: array");
        assert!(err.is_validation());
    }

    #[test]
    fn test_migration_source_chain() {
        let err = DataError::Migration {
            script: "V1__init.sql".into(),
            source: Box::new(DataError::Other("boom".into())),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "Data error: boom");
        assert!(!err.is_validation());
    }
}
