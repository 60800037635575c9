//! Error types for the fuzzy inference engine.

use thiserror::Error;

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure is fatal to the evaluation that raised it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// An unknown variable, term, or rule block name.
    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    /// A value required for computation was never set or never resolved this cycle.
    #[error("Undefined value: {0}")]
    UndefinedValue(String),

    /// Curve breakpoints are not in non-decreasing x order.
    #[error("Breakpoint {index} of {variable}.{term} is out of order")]
    OrderingViolation {
        variable: String,
        term: String,
        index: usize,
    },

    /// Unknown method tag, role/term mismatch, or a duplicate name.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Zero envelope area or nothing to accumulate.
    #[error("Arithmetic degeneracy: {0}")]
    ArithmeticDegeneracy(String),

    /// The model document could not be read or written.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[test]
fn test_ordering_violation_display() {
    let err = Error::OrderingViolation {
        variable: "temperature".to_string(),
        term: "hot".to_string(),
        index: 2,
    };

    assert_eq!(err.to_string(), "Breakpoint 2 of temperature.hot is out of order");
}

#[test]
fn test_json_error_conversion() {
    let err: Error = serde_json::from_str::<f64>("not json").unwrap_err().into();

    assert!(matches!(err, Error::Serialization(_)));
}
