//! # ftpsync - Uniform FTP/FTPS/SFTP File Transfer
//!
//! ftpsync moves files between the local filesystem and remote servers
//! behind one protocol-independent [`Connection`](connection::Connection)
//! contract. Written in Rust for predictable resource use and explicit
//! error handling.
//!
//! ## Features
//!
//! - **One Contract, Three Protocols**: FTP, FTPS (`AUTH TLS`) and SFTP
//! - **Resumable Transfers**: FTP up/downloads continue at the partial size
//! - **Inconsistency Guard**: Oversized partial copies abort, never truncate
//! - **Change Detection**: Size plus second-granularity timestamp compare
//! - **Recursive Mirrors**: Directory trees up and down, skipping in-sync files
//! - **Listing Filters**: Name predicates applied to file entries only
//! - **Quantized Progress**: At most ~100 callbacks per transfer
//! - **In-Memory Transport**: Deterministic double for tests and examples
//!
//! ## Quick Start
//!
//! ```no_run
//! use ftpsync::client::Client;
//! use ftpsync::config::{Credentials, Protocol, SessionConfig};
//! use std::path::Path;
//!
//! let config = SessionConfig::new("ftp.example.com", Protocol::Ftp)
//!     .with_credentials(Credentials::new("alice", "secret"));
//!
//! let mut client = Client::connect(config).unwrap();
//! client.send_file(Path::new("report.csv"), "/inbox").unwrap();
//! client.close().unwrap();
//! ```
//!
//! ## Working with Connections Directly
//!
//! ```no_run
//! use ftpsync::client::create_connection;
//! use ftpsync::config::{Protocol, SessionConfig};
//! use ftpsync::filter::NameSuffixFilter;
//! use std::path::Path;
//!
//! let config = SessionConfig::new("sftp.example.com", Protocol::Sftp);
//! let mut conn = create_connection(&config).unwrap();
//!
//! let filter = NameSuffixFilter::new(".csv");
//! for entry in conn.list(Some("/data/in"), Some(&filter)).unwrap() {
//!     println!("{} ({} B)", entry.absolute_path, entry.size);
//! }
//!
//! let summary = conn
//!     .download_directory("/data/in", Path::new("mirror"), true, None)
//!     .unwrap();
//! println!(
//!     "{} files, {} bytes",
//!     summary.files_transferred, summary.bytes_transferred
//! );
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod filter;
pub mod transfer;
pub mod transport;

// Re-export commonly used types
pub use client::{create_connection, Client};
pub use config::{Credentials, Protocol, SessionConfig};
pub use connection::{Connection, RemoteEntry, SyncSummary, TransferOutcome};
pub use error::{FtpSyncError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use ftpsync::prelude::*;
    //! ```

    pub use crate::client::{create_connection, Client};
    pub use crate::config::{Credentials, Protocol, SessionConfig};
    pub use crate::connection::{
        Connection, FtpConnection, RemoteEntry, SftpConnection, SyncSummary, TransferOutcome,
    };
    pub use crate::error::{FtpSyncError, Result};
    pub use crate::filter::{NameEqualsFilter, NamePredicate, NamePrefixFilter, NameSuffixFilter};
    pub use crate::transport::{
        FtpTransport, MemoryTransport, SftpTransport, TransportHandle,
    };
}
