use thiserror::Error;

/// Failures reported by a [`crate::UiDriver`] implementation.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Session not created: {0}")]
    SessionNotCreated(String),

    #[error("WebDriver error '{error}': {message}")]
    Protocol { error: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// How a driver failure is surfaced by a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The remote UI did not become ready in time.
    Timing,
    /// An expected UI element is absent; the remote interface likely changed shape.
    Structural,
    /// Anything else.
    Unclassified,
}

impl DriverError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DriverError::Timeout(_) => ErrorClass::Timing,
            DriverError::ElementNotFound(_) | DriverError::InvalidLocator(_) => {
                ErrorClass::Structural
            }
            _ => ErrorClass::Unclassified,
        }
    }
}

impl From<reqwest::Error> for DriverError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DriverError::Timeout(format!("HTTP request timed out: {e}"))
        } else {
            DriverError::Transport(e.to_string())
        }
    }
}

/// Contact Source failures. Reported to the operator as a file read error.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("File read error: {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Unsupported contact file format: {0} (expected .xlsx, .xls, .csv or .json)")]
    UnsupportedFormat(String),
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit log I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Audit log encoding error on {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: csv::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Fatal run errors. Everything else is recorded per contact.
#[derive(Error, Debug)]
pub enum CourierError {
    #[error("Session error: {0}")]
    Session(#[source] DriverError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),
}
