//! Error handling for the MEEG inverse toolkit
//!
//! One error type covers loading, simulation, inversion and rendering.
//! Every failure is fatal to a run, so variants carry enough context to be
//! reported once at the top level.

use core::fmt;

/// Result type alias for MEEG operations
pub type MeegResult<T> = Result<T, MeegError>;

/// Error type for all MEEG operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum MeegError {
    /// File could not be opened or read
    Io {
        /// Offending path
        path: String,
        /// Underlying I/O error text
        reason: String,
    },

    /// File contents do not follow the expected format
    Format {
        /// What was being parsed (file path or format name)
        source: String,
        /// 1-based line number when known
        line: Option<usize>,
        /// Description of the format issue
        reason: String,
    },

    /// Named entry missing from a keyed matrix container
    MissingKey {
        /// Requested key
        key: String,
        /// Keys present in the container
        available: Vec<String>,
    },

    /// Matrix/vector shapes are incompatible
    DimensionMismatch {
        /// Operation that detected the mismatch
        operation: &'static str,
        /// Expected length or dimension
        expected: usize,
        /// Length or dimension found
        found: usize,
    },

    /// Linear system has no unique solution
    SingularMatrix {
        /// Order of the system
        size: usize,
        /// Description of the failure
        reason: &'static str,
    },

    /// Index outside of a collection
    IndexOutOfRange {
        /// What is being indexed
        what: &'static str,
        /// Requested index
        index: usize,
        /// Collection length
        len: usize,
    },

    /// Configuration rejected by validation
    InvalidConfig {
        /// Description of the configuration error
        reason: String,
    },

    /// Forward simulation failure
    Simulation {
        /// Description of the failure
        message: String,
    },

    /// Rendering backend failure
    Render {
        /// Description of the failure
        reason: String,
    },
}

impl fmt::Display for MeegError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeegError::Io { path, reason } => {
                write!(f, "Cannot read {}: {}", path, reason)
            }
            MeegError::Format { source, line: Some(line), reason } => {
                write!(f, "Format error in {} (line {}): {}", source, line, reason)
            }
            MeegError::Format { source, line: None, reason } => {
                write!(f, "Format error in {}: {}", source, reason)
            }
            MeegError::MissingKey { key, available } => {
                write!(f, "Key '{}' not found, available keys: [{}]",
                       key, available.join(", "))
            }
            MeegError::DimensionMismatch { operation, expected, found } => {
                write!(f, "Dimension mismatch in {}: expected {}, found {}",
                       operation, expected, found)
            }
            MeegError::SingularMatrix { size, reason } => {
                write!(f, "Singular {}x{} system: {}", size, size, reason)
            }
            MeegError::IndexOutOfRange { what, index, len } => {
                write!(f, "{} index {} out of range (length {})", what, index, len)
            }
            MeegError::InvalidConfig { reason } => {
                write!(f, "Invalid configuration: {}", reason)
            }
            MeegError::Simulation { message } => {
                write!(f, "Simulation error: {}", message)
            }
            MeegError::Render { reason } => {
                write!(f, "Render error: {}", reason)
            }
        }
    }
}

impl std::error::Error for MeegError {}

/// Convenience macro for creating format errors
#[macro_export]
macro_rules! format_error {
    ($source:expr, $line:expr, $($arg:tt)+) => {
        $crate::error::MeegError::Format {
            source: ($source).to_string(),
            line: $line,
            reason: format!($($arg)+),
        }
    };
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        $crate::error::MeegError::InvalidConfig {
            reason: format!($($arg)+),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = MeegError::DimensionMismatch {
            operation: "minimum_norm",
            expected: 128,
            found: 64,
        };
        let display = format!("{}", error);
        assert!(display.contains("Dimension mismatch"));
        assert!(display.contains("128"));
        assert!(display.contains("64"));
    }

    #[test]
    fn test_format_error_macro() {
        let error = format_error!("cortex.tri", Some(3), "expected {} tokens", 6);
        assert_eq!(error.to_string(), "Format error in cortex.tri (line 3): expected 6 tokens");

        let error = format_error!("leadfield", None, "empty matrix");
        assert_eq!(error.to_string(), "Format error in leadfield: empty matrix");
    }

    #[test]
    fn test_missing_key_lists_available() {
        let error = MeegError::MissingKey {
            key: "linop".to_string(),
            available: vec!["G".to_string(), "H".to_string()],
        };
        assert!(error.to_string().contains("[G, H]"));
    }

    #[test]
    fn test_error_equality() {
        let error1 = config_error!("lambda must be >= 0, got {}", -1.0);
        let error2 = MeegError::InvalidConfig {
            reason: "lambda must be >= 0, got -1".to_string(),
        };
        assert_eq!(error1, error2);
    }
}
