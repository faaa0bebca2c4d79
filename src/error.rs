//! Error types for mybind.

use thiserror::Error;

use crate::driver::DriverError;

/// Which side of a statement an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Parameter,
    Column,
}

impl std::fmt::Display for SlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotKind::Parameter => write!(f, "parameter"),
            SlotKind::Column => write!(f, "column"),
        }
    }
}

/// Failure to turn a decoded value into the requested Rust type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("cannot read {found} as {expected}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value does not fit in {target}")]
    Overflow { target: &'static str },

    #[error("invalid UTF-8: {0}")]
    Utf8(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),
}

/// The main error type for binding operations.
#[derive(Debug, Error)]
pub enum BindError {
    /// Parameter or column index outside the statement's slot range.
    #[error("Wrong {kind} index {pos} (statement has {count})")]
    OutOfRange {
        kind: SlotKind,
        pos: usize,
        count: usize,
    },

    /// Calendar field outside its legal range.
    #[error("Calendar field {field} out of range: {value}")]
    CivilRange { field: &'static str, value: i64 },

    /// Execution attempted with a non-null parameter of unknown type.
    #[error("Parameter {0} has no bound type")]
    UnresolvedType(usize),

    /// Typed read of a NULL slot.
    #[error("Field {0} is NULL")]
    NullValue(usize),

    /// Typed read with no current row.
    #[error("No current row")]
    NoRow,

    /// Named column lookup failed.
    #[error("Field '{0}' not found")]
    NotFound(String),

    /// Malformed connection string or timestamp text.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Slot content cannot be represented as the requested type.
    #[error("Conversion error at {pos}: {source}")]
    Conversion {
        pos: usize,
        #[source]
        source: ValueError,
    },

    /// Columns whose data did not fit the result buffer during fetch.
    #[error("Data truncated in column(s) {0:?}")]
    Truncated(Vec<usize>),

    /// Error surfaced verbatim by the driver.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BindError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create a parameter index error.
    pub fn param_range(pos: usize, count: usize) -> Self {
        Self::OutOfRange {
            kind: SlotKind::Parameter,
            pos,
            count,
        }
    }

    /// Create a column index error.
    pub fn column_range(pos: usize, count: usize) -> Self {
        Self::OutOfRange {
            kind: SlotKind::Column,
            pos,
            count,
        }
    }

    /// True for both index and calendar range failures.
    pub fn is_range(&self) -> bool {
        matches!(self, Self::OutOfRange { .. } | Self::CivilRange { .. })
    }
}

/// Result type alias for binding operations.
pub type BindResult<T> = Result<T, BindError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BindError::parse(5, "unexpected character");
        assert_eq!(
            err.to_string(),
            "Parse error at position 5: unexpected character"
        );
    }

    #[test]
    fn test_range_display() {
        let err = BindError::param_range(3, 2);
        assert_eq!(err.to_string(), "Wrong parameter index 3 (statement has 2)");
        assert!(err.is_range());

        let err = BindError::CivilRange {
            field: "year",
            value: 1600,
        };
        assert!(err.is_range());
        assert!(!BindError::NullValue(0).is_range());
    }

    #[test]
    fn test_driver_error_is_verbatim() {
        let err: BindError = DriverError::new(1064, "You have an error in your SQL syntax").into();
        assert_eq!(err.to_string(), "You have an error in your SQL syntax");
    }
}
