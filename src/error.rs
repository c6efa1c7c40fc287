use thiserror::Error;

/// Errors raised for input the engine cannot repair on its own.
///
/// Data-quality anomalies (extra parents, dangling connections) are not
/// represented here; they are logged and repaired in place.
#[derive(Debug, Error)]
pub enum FamilyTreeError {
    #[error("invalid entity identifier {0:?}")]
    InvalidIdentifier(String),
    #[error("maximum traversal distance must be non-negative, got {0}")]
    NegativeDistance(i64),
    #[error("unknown entity {0}")]
    UnknownEntity(String),
    #[error("failed to parse {what}: {message}")]
    Parse { what: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, FamilyTreeError>;
