//! Error types for ftpsync
//!
//! One error enum covers the whole crate: transport faults are always
//! wrapped with the remote path and attempted operation, and login errors
//! carry host, port and username but never the password.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::transport::TransportStatus;

/// Main error type for ftpsync operations
#[derive(Error, Debug)]
pub enum FtpSyncError {
    /// Transport-level connect failure; fatal to the session
    #[error("Unable to connect to host {host} on port {port}: {message}")]
    ConnectionFailed {
        /// Remote host name or address
        host: String,
        /// Remote port
        port: u16,
        /// Underlying failure description
        message: String,
    },

    /// Authentication failure after a successful connect
    #[error("Unable to login to {host}:{port} for user '{username}': {message}")]
    LoginFailed {
        /// Remote host name or address
        host: String,
        /// Remote port
        port: u16,
        /// Username the login was attempted with
        username: String,
        /// Underlying failure description
        message: String,
    },

    /// A referenced path does not exist where existence was required
    #[error("Path not found: {0}")]
    NotFound(String),

    /// Remote and local sizes disagree in a non-resumable way (remote
    /// smaller than local); the operation aborts rather than truncating
    /// or guessing intent
    #[error(
        "Inconsistent state for '{path}': remote is {remote_size} B but local is {local_size} B"
    )]
    InconsistentState {
        /// Remote path of the transfer
        path: String,
        /// Size reported by the remote side
        remote_size: u64,
        /// Size of the local file
        local_size: u64,
    },

    /// I/O failure during a copy, wrapping the underlying stream error
    #[error("Transfer failed for '{path}': {message}")]
    TransferFailed {
        /// Remote path of the transfer
        path: String,
        /// Underlying failure description
        message: String,
    },

    /// A directory listing could not be produced
    #[error("Unable to list files in directory '{path}': {message}")]
    ListingFailed {
        /// Directory that was being listed
        path: String,
        /// Underlying failure description
        message: String,
    },

    /// A distinguished transport reply surfaced where interpreting the raw
    /// status beats a generic failure
    #[error("Remote server returned {status} for '{path}': {detail}")]
    ProtocolStatus {
        /// Remote path of the failed operation
        path: String,
        /// Interpreted reply status
        status: TransportStatus,
        /// Underlying reply description
        detail: String,
    },

    /// Local filesystem I/O error
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// Local path the operation touched
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A path could not be interpreted
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Session configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FtpSyncError {
    /// Create a connection failure with host/port context
    pub fn connection(host: impl Into<String>, port: u16, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            host: host.into(),
            port,
            message: message.into(),
        }
    }

    /// Create a login failure; the password is deliberately not recorded
    pub fn login(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::LoginFailed {
            host: host.into(),
            port,
            username: username.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error for a remote or local path
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a transfer failure with remote path context
    pub fn transfer(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransferFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a listing failure with directory context
    pub fn listing(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ListingFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a local I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check whether this error means "the path does not exist"
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::ProtocolStatus { status, .. } => *status == TransportStatus::NotFound,
            Self::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<String> {
        match self {
            Self::NotFound(path)
            | Self::InconsistentState { path, .. }
            | Self::TransferFailed { path, .. }
            | Self::ListingFailed { path, .. }
            | Self::ProtocolStatus { path, .. }
            | Self::InvalidPath(path) => Some(path.clone()),
            Self::Io { path, .. } => Some(path.display().to_string()),
            _ => None,
        }
    }
}

/// Result type alias for ftpsync operations
pub type Result<T> = std::result::Result<T, FtpSyncError>;

/// Extension trait for adding path context to `std::io::Result`
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| FtpSyncError::io(path, e))
    }
}
