use thiserror::Error;

/// Main error type for the tuner
#[derive(Error, Debug)]
pub enum TunerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Surrogate error: {0}")]
    Surrogate(#[from] SurrogateError),

    #[error("Batch failed: none of the {attempted} submitted evaluations produced a result")]
    BatchFailed { attempted: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while building or using the parameter encoding
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Ranges must be passed as tuples or lists: parameter {name}")]
    UnsupportedDomain { name: String },

    #[error("No known subtype (numerical, string, boolean) for parameter {name}")]
    UnsupportedCategoryType { name: String },

    #[error("Invalid numeric range for parameter {name}: {reason}")]
    InvalidNumericRange { name: String, reason: String },

    #[error("Empty domain for parameter {name}")]
    EmptyDomain { name: String },

    #[error("Single-choice options of parameter {name} are not contiguous")]
    NonContiguousGroup { name: String },

    #[error("Instance does not fit the expected number of attributes: expected {expected}, got {got}")]
    EncodedLengthMismatch { expected: usize, got: usize },

    #[error("Invalid setting {field}: {reason}")]
    InvalidSetting { field: String, reason: String },
}

/// Errors surfaced by a single heuristic evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Solver failed: {message}")]
    SolverFailed { message: String },

    #[error("Solver does not expose metric {metric}")]
    MissingMetric { metric: String },

    #[error("Solver panicked: {message}")]
    Panicked { message: String },
}

/// Errors raised while fitting the surrogate tree
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurrogateError {
    #[error("Insufficient samples: {samples} available, at least {required} required")]
    InsufficientSamples { samples: usize, required: usize },

    #[error("Degenerate target: every training target has the same value")]
    DegenerateTarget,

    #[error("Dimension mismatch: expected {expected} features, row {row} has {got}")]
    DimensionMismatch { expected: usize, got: usize, row: usize },

    #[error("Target length mismatch: {rows} rows but {targets} targets")]
    TargetLengthMismatch { rows: usize, targets: usize },

    #[error("Malformed tree at node {node}: {reason}")]
    MalformedTree { node: usize, reason: String },
}

/// Result type alias for tuner operations
pub type TunerResult<T> = Result<T, TunerError>;

/// Macro for creating configuration errors on a named setting
#[macro_export]
macro_rules! config_error {
    ($field:expr, $($arg:tt)*) => {
        $crate::ConfigError::InvalidSetting {
            field: $field.to_string(),
            reason: format!($($arg)*),
        }
    };
}
