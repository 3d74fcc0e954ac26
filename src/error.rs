use thiserror::Error;

/// Error types for the recommendation pipeline
#[derive(Error, Debug)]
pub enum RecommendError {
    // Classification errors: fatal for the request, no partial ranking
    #[error("Classification unavailable: {message}")]
    Classification { message: String },

    // Corpus errors
    #[error("Corpus load failed: {path} - {message}")]
    CorpusLoad { path: String, message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid configuration file: {path}")]
    InvalidConfig { path: String },

    // Scoring backend errors. These never cross the orchestrator boundary;
    // the scorer converts them into fallback scores.
    #[error("Scoring backend error: {message}")]
    Backend { message: String },

    #[error("Scoring batch misaligned: expected {expected} entries, got {actual}")]
    BatchMisaligned { expected: usize, actual: usize },

    // System errors
    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RecommendError {
    /// Create a classification error
    pub fn classification(message: impl Into<String>) -> Self {
        Self::Classification { message: message.into() }
    }

    /// Create a corpus load error
    pub fn corpus_load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorpusLoad { path: path.into(), message: message.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a scoring backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend { message: message.into() }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Whether the request can be retried as-is
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Backend { .. } | Self::BatchMisaligned { .. } => true,
            Self::Classification { .. }
            | Self::CorpusLoad { .. }
            | Self::Configuration { .. }
            | Self::InvalidConfig { .. }
            | Self::Io { .. }
            | Self::Internal { .. } => false,
        }
    }

    /// Error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            Self::Classification { .. } => "classification",
            Self::CorpusLoad { .. } => "corpus",
            Self::Configuration { .. } | Self::InvalidConfig { .. } => "configuration",
            Self::Backend { .. } | Self::BatchMisaligned { .. } => "scoring",
            Self::Io { .. } => "io",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<std::io::Error> for RecommendError {
    fn from(err: std::io::Error) -> Self {
        Self::Io { message: err.to_string() }
    }
}

impl From<anyhow::Error> for RecommendError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal { message: err.to_string() }
    }
}

/// Result type alias for the recommendation pipeline
pub type RecommendResult<T> = std::result::Result<T, RecommendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = RecommendError::classification("empty query");
        assert_eq!(error.category(), "classification");
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_backend_errors_recoverable() {
        let error = RecommendError::backend("connection refused");
        assert!(error.is_recoverable());
        assert_eq!(error.category(), "scoring");

        let misaligned = RecommendError::BatchMisaligned { expected: 20, actual: 7 };
        assert!(misaligned.is_recoverable());
        assert_eq!(misaligned.category(), "scoring");
    }

    #[test]
    fn test_corpus_error_display() {
        let error = RecommendError::corpus_load("corpus.csv", "file not found");
        assert!(error.to_string().contains("corpus.csv"));
        assert_eq!(error.category(), "corpus");
    }
}
