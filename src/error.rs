use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for kovri configuration operations
pub type KovriResult<T> = Result<T, KovriError>;

/// Error types for the startup configuration subsystem
#[derive(Error, Debug)]
pub enum KovriError {
    /// Bad or unknown command-line token
    #[error("Usage error: {0}")]
    Usage(String),

    /// A configuration file could not be read
    #[error("Could not open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid INI
    #[error("Could not parse {}: {message}", path.display())]
    Syntax { path: PathBuf, message: String },

    /// Option schema or resolved value errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required tunnel attribute is absent
    #[error("Tunnel '{tunnel}' in {}: missing required attribute '{field}'", file.display())]
    MissingField {
        tunnel: String,
        field: &'static str,
        file: PathBuf,
    },

    /// The tunnel `type` attribute names no known tunnel family
    #[error("Unknown tunnel type={kind} of {name} in {}", file.display())]
    UnknownTunnelType {
        name: String,
        kind: String,
        file: PathBuf,
    },

    /// A tunnel attribute could not be converted to its type
    #[error("Can't read tunnel '{tunnel}' attribute '{field}': {cause}")]
    FieldParse {
        tunnel: String,
        field: &'static str,
        cause: String,
    },

    /// Bad log-level input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Logging pipeline setup errors
    #[error("Logging error: {0}")]
    Logging(String),
}

impl From<clap::Error> for KovriError {
    fn from(err: clap::Error) -> Self {
        KovriError::Usage(err.to_string())
    }
}

impl From<tracing_appender::rolling::InitError> for KovriError {
    fn from(err: tracing_appender::rolling::InitError) -> Self {
        KovriError::Logging(err.to_string())
    }
}
