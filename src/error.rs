//! Error types for the ipcc library

use std::fmt;

/// Result type alias for ipcc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ipcc operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// I/O errors
    Io(String),

    /// Malformed persisted range table (wrong size, unreadable contents)
    Format(String),

    /// Unparsable IP address
    InvalidAddress(String),

    /// Malformed country code or filter token
    InvalidCode(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
            Error::Format(msg) => write!(f, "Format error: {}", msg),
            Error::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            Error::InvalidCode(msg) => write!(f, "Invalid country code: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
