use std::error::Error;
use std::fmt;
use std::sync::PoisonError;

#[derive(Debug)]
pub enum RustyKeysError {
    // Input errors
    ValidationError(String),

    // Lookup errors
    NotFound(String),

    // Write errors
    Conflict(String),

    // Storage errors
    StorageError(String),

    // Password hashing errors
    InvalidDigest(String),
    HashingError(String),

    // Login errors
    InvalidCredentials,

    // Configuration errors
    ConfigError(String),

    // Export errors
    SerializationError(String),
}

impl RustyKeysError {
    /// True for faults of the persistence backend, as opposed to
    /// rejections of the caller's input or credentials.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::StorageError(_))
    }
}

impl fmt::Display for RustyKeysError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::NotFound(what) => write!(f, "Not found: {}", what),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::StorageError(msg) => write!(f, "Storage error: {}", msg),
            Self::InvalidDigest(msg) => write!(f, "Invalid password digest: {}", msg),
            Self::HashingError(msg) => write!(f, "Password hashing error: {}", msg),
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl Error for RustyKeysError {}

// Poisoned locks only happen after a panic inside a storage operation
impl<T> From<PoisonError<T>> for RustyKeysError {
    fn from(err: PoisonError<T>) -> Self {
        RustyKeysError::StorageError(format!("Mutex poisoned: {}", err))
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for RustyKeysError {
    fn from(err: rusqlite::Error) -> Self {
        RustyKeysError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for RustyKeysError {
    fn from(err: serde_json::Error) -> Self {
        RustyKeysError::SerializationError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RustyKeysError {
    fn from(err: tokio::task::JoinError) -> Self {
        RustyKeysError::StorageError(format!("Storage task failed: {}", err))
    }
}

// Generic result type for RustyKeys
pub type Result<T> = std::result::Result<T, RustyKeysError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_credentials_message_is_generic() {
        let msg = RustyKeysError::InvalidCredentials.to_string();
        assert_eq!(msg, "Invalid credentials");
        assert!(!msg.contains("password"));
        assert!(!msg.contains("email"));
    }

    #[test]
    fn test_storage_errors_are_distinct() {
        assert!(RustyKeysError::StorageError("down".to_string()).is_storage());
        assert!(!RustyKeysError::InvalidCredentials.is_storage());
        assert!(!RustyKeysError::NotFound("user 1".to_string()).is_storage());
    }
}
