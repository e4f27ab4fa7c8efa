use thiserror::Error;

/// Error taxonomy for indexing and retrieval.
///
/// External-dependency variants carry an actionable `suggestion` so the
/// caller can surface a next step alongside the failure.
#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    VectorDimension { expected: usize, actual: usize },

    #[error("Invalid parameter '{parameter}': {message}")]
    Validation { parameter: String, message: String },

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Model host unreachable at {url}: {message}")]
    HostUnreachable { url: String, message: String },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Filesystem error at {path}: {message}")]
    FileSystem { path: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Security violation: {0}")]
    Security(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AtlasError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn dimension(expected: usize, actual: usize) -> Self {
        Self::VectorDimension { expected, actual }
    }

    pub fn validation(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub fn filesystem(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileSystem {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn security(msg: impl Into<String>) -> Self {
        Self::Security(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::HostUnreachable { .. })
    }

    /// A stable machine-readable code for the tool-call boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::VectorDimension { .. } => "VECTOR_DIMENSION_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Timeout(_) => "REQUEST_TIMEOUT",
            Self::HostUnreachable { .. } => "HOST_UNREACHABLE",
            Self::ModelNotFound(_) => "MODEL_NOT_FOUND",
            Self::FileSystem { .. } => "FILESYSTEM_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::Embedding(_) => "EMBEDDING_ERROR",
            Self::Security(_) => "SECURITY_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// An actionable next step for external-dependency failures, when one
    /// exists.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::HostUnreachable { .. } => {
                Some("Check that the model host is running and OLLAMA_BASE_URL points at it")
            }
            Self::ModelNotFound(_) => {
                Some("Pull the model on the host (e.g. `ollama pull <model>`) or configure another")
            }
            Self::VectorDimension { .. } => {
                Some("The configured embedding dimension does not match the model; re-index after fixing CODEATLAS_EMBEDDING_DIM")
            }
            Self::Storage(_) => Some("Verify the database path is writable and the VSS extension loads"),
            Self::Timeout(_) => Some("Increase the request timeout or reduce batch concurrency"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AtlasError::validation("query", "too short").code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(AtlasError::dimension(768, 384).code(), "VECTOR_DIMENSION_ERROR");
        assert_eq!(AtlasError::Timeout(30_000).code(), "REQUEST_TIMEOUT");
    }

    #[test]
    fn test_predicates() {
        assert!(AtlasError::not_found("repo").is_not_found());
        assert!(AtlasError::validation("q", "m").is_validation());
        assert!(AtlasError::Timeout(1).is_transient());
        assert!(!AtlasError::storage("x").is_transient());
    }

    #[test]
    fn test_suggestions_exist_for_external_failures() {
        assert!(AtlasError::ModelNotFound("m".into()).suggestion().is_some());
        assert!(AtlasError::dimension(768, 10).suggestion().is_some());
        assert!(AtlasError::parse("bad").suggestion().is_none());
    }
}
