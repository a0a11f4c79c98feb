//! Transport abstraction
//!
//! [`TransportHandle`] is the minimum capability set the connection layer
//! needs from an authenticated protocol engine: directory navigation, raw
//! listings, metadata probes, offset-addressed byte streams and the handful
//! of mutating primitives. Two production adapters implement it —
//! [`FtpTransport`] over suppaftp and [`SftpTransport`] over ssh2 — plus an
//! in-memory double, [`MemoryTransport`], for tests and examples.
//!
//! All remote paths are forward-slash strings; mapping to the local
//! filesystem's separator happens only at the local boundary.

mod ftp;
mod memory;
mod sftp;

pub use ftp::FtpTransport;
pub use memory::MemoryTransport;
pub use sftp::SftpTransport;

use chrono::{DateTime, Utc};
use std::fmt;
use std::io::{Read, Write};

use crate::error::Result;

/// One raw directory-listing record as reported by a transport.
///
/// Carries no path information; the connection layer combines it with the
/// canonical directory it was listed in.
#[derive(Debug, Clone)]
pub struct TransportEntry {
    /// Entry name within its directory (may be `.` or `..`)
    pub name: String,
    /// Size in bytes (0 for directories on transports that report none)
    pub size: u64,
    /// Last modification time, second precision
    pub modified: DateTime<Utc>,
    /// Whether the entry is a directory
    pub is_directory: bool,
}

/// Metadata probe result for a regular file
#[derive(Debug, Clone, Copy)]
pub struct RemoteStat {
    /// Size in bytes
    pub size: u64,
    /// Last modification time, second precision
    pub modified: DateTime<Utc>,
}

/// Interpreted transport reply status.
///
/// Used only to tell a small set of distinguished conditions apart from
/// generic failures; everything else maps to [`TransportStatus::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    /// The referenced path does not exist (FTP 550, SFTP `NO_SUCH_FILE`)
    NotFound,
    /// The server refused the operation for permission reasons
    PermissionDenied,
    /// Any other non-success reply
    Other,
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportStatus::NotFound => write!(f, "not-found"),
            TransportStatus::PermissionDenied => write!(f, "permission-denied"),
            TransportStatus::Other => write!(f, "failure"),
        }
    }
}

/// An already-authenticated session for one protocol.
///
/// A handle owns one mutable working-directory cursor and is therefore not
/// safe for concurrent use; callers that need parallelism open one handle
/// per worker. The handle never times out on its own and is closed only by
/// [`disconnect`](TransportHandle::disconnect).
pub trait TransportHandle {
    /// Liveness probe for the underlying session
    fn is_connected(&mut self) -> bool;

    /// Close the underlying session
    fn disconnect(&mut self) -> Result<()>;

    /// Absolute path of the current working directory
    fn working_directory(&mut self) -> Result<String>;

    /// Change the working directory; fails with a not-found status when the
    /// path is absent or not a directory
    fn change_directory(&mut self, path: &str) -> Result<()>;

    /// List one directory level as raw entries.
    ///
    /// Transports that report `.`/`..` pseudo-entries pass them through
    /// unfiltered; skipping them is the connection layer's job.
    fn list(&mut self, path: &str) -> Result<Vec<TransportEntry>>;

    /// Metadata probe for the exact path.
    ///
    /// Returns `Ok(None)` when the path is absent *or* is not a regular
    /// file; errors are reserved for faults other than absence.
    fn stat_file(&mut self, path: &str) -> Result<Option<RemoteStat>>;

    /// Open a byte stream reading the remote file starting at `offset`.
    ///
    /// The stream borrows the handle; drop it, then call
    /// [`finalize_transfer`](TransportHandle::finalize_transfer).
    fn open_read_stream(&mut self, path: &str, offset: u64) -> Result<Box<dyn Read + '_>>;

    /// Open a byte stream writing the remote file.
    ///
    /// With `append` set the stream extends the existing file (the `offset`
    /// equals its current size); otherwise the file is created or truncated
    /// and written from `offset` 0.
    fn open_write_stream(
        &mut self,
        path: &str,
        offset: u64,
        append: bool,
    ) -> Result<Box<dyn Write + '_>>;

    /// Drain the protocol-level end-of-transfer acknowledgement, where the
    /// protocol has one. Must be called after the stream from
    /// `open_read_stream`/`open_write_stream` has been dropped.
    fn finalize_transfer(&mut self) -> Result<()>;

    /// Create a directory; fails with a not-found status when the parent
    /// is missing
    fn make_directory(&mut self, path: &str) -> Result<()>;

    /// Remove an empty directory
    fn remove_directory(&mut self, path: &str) -> Result<()>;

    /// Delete a regular file
    fn delete_file(&mut self, path: &str) -> Result<()>;

    /// Last modification time of a file, second precision
    fn modification_time(&mut self, path: &str) -> Result<DateTime<Utc>>;

    /// Stamp the last modification time of a remote file
    fn set_modification_time(&mut self, path: &str, mtime: DateTime<Utc>) -> Result<()>;

    /// Status interpreted from the most recent reply, used only to tell
    /// "not found" apart from other failures
    fn last_status(&self) -> Option<TransportStatus>;
}
