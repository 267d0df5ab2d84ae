// src/error.rs

//! Error types for supermarket-mirror

use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while fetching, comparing or transferring cookbooks
///
/// Per-cookbook upload failures are not errors: they are reported as a
/// [`TransferOutcome`](crate::transfer::TransferOutcome) and the run continues.
/// Anything that reaches the caller as an `Err` ends the run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    /// The remote answered 404
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Any other failure to talk to a remote site
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Malformed version '{version}': {reason}")]
    MalformedVersion { version: String, reason: String },

    #[error("Invalid version constraint '{constraint}': {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Fetching cookbook or version metadata failed for a reason other than 404
    #[error("Error during {cookbook} metadata request to {site}: {message}")]
    MetadataFetch {
        cookbook: String,
        site: String,
        message: String,
    },

    /// The upload request itself could not be delivered
    #[error("Error uploading cookbook {cookbook} ({version}) to the Supermarket at {site}: {message}")]
    UploadTransport {
        cookbook: String,
        version: String,
        site: String,
        message: String,
    },
}

impl Error {
    /// Shorthand for a [`Error::MalformedVersion`]
    pub fn malformed_version(version: &str, reason: impl Into<String>) -> Self {
        Self::MalformedVersion {
            version: version.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the remote reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFoundError(_))
    }
}
