//! Error types for Halyard

use std::fmt;

/// Unified error type for all Halyard operations
#[derive(Debug)]
pub enum HalyardError {
    /// I/O error
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// Protocol error (malformed or state-illegal peer message)
    Protocol(String),

    /// Algorithm negotiation error (no common algorithm)
    Negotiation(String),

    /// Security error (signature verification, key material, etc.)
    Security(String),

    /// Other error
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for HalyardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HalyardError::Io(e) => write!(f, "IO error: {}", e),
            HalyardError::Config(msg) => write!(f, "Configuration error: {}", msg),
            HalyardError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            HalyardError::Negotiation(msg) => write!(f, "Negotiation error: {}", msg),
            HalyardError::Security(msg) => write!(f, "Security error: {}", msg),
            HalyardError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for HalyardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HalyardError::Io(e) => Some(e),
            HalyardError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for HalyardError {
    fn from(err: std::io::Error) -> Self {
        HalyardError::Io(err)
    }
}

/// Result type for Halyard operations
pub type HalyardResult<T> = Result<T, HalyardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HalyardError::Protocol("unexpected SSH_MSG_NEWKEYS".to_string());
        assert_eq!(
            err.to_string(),
            "Protocol error: unexpected SSH_MSG_NEWKEYS"
        );
    }

    #[test]
    fn test_negotiation_display() {
        let err = HalyardError::Negotiation("no common kex algorithm".to_string());
        assert!(err.to_string().starts_with("Negotiation error:"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let halyard_err: HalyardError = io_err.into();
        assert!(matches!(halyard_err, HalyardError::Io(_)));
    }

    #[test]
    fn test_result_type() {
        fn example() -> HalyardResult<i32> {
            Ok(42)
        }

        assert_eq!(example().unwrap(), 42);
    }
}
