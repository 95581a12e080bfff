//! Error types and result aliases for Carton operations.
//!
//! Provides a unified error type that covers all possible error conditions
//! across the Carton crates with actionable error messages.

use thiserror::Error;

/// Unified error type for all Carton operations
#[derive(Error, Debug)]
pub enum CartonError {
    // Config errors
    #[error("Failed to parse JSON: {message}")]
    JsonParse { message: String },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // Lockfile errors
    #[error("Corrupt lockfile: {reason}")]
    CorruptLockfile { reason: String },

    #[error("Package '{id}' referenced in the graph has no lockfile entry")]
    PackageDataMissing { id: String },

    // Registry errors
    #[error("Package '{name}' not found in registry")]
    PackageNotFound { name: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Fetch errors
    #[error("Fetch of '{package}' failed: upstream returned {status}")]
    FetchFailed { package: String, status: String },

    #[error("Package '{id}' has no tarball URL to fetch from")]
    MissingSource { id: String },

    #[error("Integrity check failed for {package}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        package: String,
        expected: String,
        actual: String,
    },

    // Extraction errors
    #[error("Archive entry '{entry}' escapes the extraction directory")]
    PathTraversal { entry: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for Carton operations
pub type CartonResult<T> = Result<T, CartonError>;

impl CartonError {
    /// Create a network error from any error type
    pub fn network<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Check if this error is recoverable by re-running the operation
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CartonError::Network { .. } | CartonError::FetchFailed { .. } | CartonError::Io { .. }
        )
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            CartonError::PackageNotFound { .. } => {
                Some("Check the package name spelling or try searching the registry")
            },
            CartonError::Network { .. } | CartonError::FetchFailed { .. } => {
                Some("Check your internet connection and try again")
            },
            CartonError::CorruptLockfile { .. } => {
                Some("Delete carton.lock and re-run install to regenerate it")
            },
            CartonError::IntegrityMismatch { .. } => {
                Some("The downloaded archive does not match the pinned digest; the source may have been tampered with")
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CartonError::PackageNotFound {
            name: "left-pad".to_string(),
        };
        assert_eq!(err.to_string(), "Package 'left-pad' not found in registry");

        let err = CartonError::CorruptLockfile {
            reason: "lockfileVersion must be >= 1".to_string(),
        };
        assert!(err.to_string().contains("lockfileVersion"));
    }

    #[test]
    fn test_recoverable() {
        let network = CartonError::Network {
            message: "timed out".to_string(),
            source: None,
        };
        assert!(network.is_recoverable());

        let traversal = CartonError::PathTraversal {
            entry: "../../etc/passwd".to_string(),
        };
        assert!(!traversal.is_recoverable());
    }

    #[test]
    fn test_suggestions() {
        let err = CartonError::CorruptLockfile {
            reason: "packages missing".to_string(),
        };
        assert!(err.suggestion().unwrap().contains("carton.lock"));
        assert!(CartonError::MissingSource { id: "a@1".into() }
            .suggestion()
            .is_none());
    }
}
