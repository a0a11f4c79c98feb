//! High-level client facade
//!
//! [`create_connection`] picks the protocol implementation for a
//! [`SessionConfig`]; [`Client`] wraps the resulting connection with the
//! common by-name conveniences (drop a file into a remote directory, fetch
//! one out of it) and can re-dial a dropped session from its config.

use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::{Protocol, SessionConfig};
use crate::connection::path::{base_name, join_remote};
use crate::connection::{Connection, FtpConnection, SftpConnection, TransferOutcome};
use crate::error::{FtpSyncError, Result};
use crate::filter::NamePredicate;

/// Open a connection for the protocol named in `config`
pub fn create_connection(config: &SessionConfig) -> Result<Box<dyn Connection>> {
    match config.protocol {
        Protocol::Ftp | Protocol::Ftps => Ok(Box::new(FtpConnection::connect(config)?)),
        Protocol::Sftp => Ok(Box::new(SftpConnection::connect(config)?)),
    }
}

/// A connection plus the configuration that opened it
pub struct Client {
    connection: Box<dyn Connection>,
    config: Option<SessionConfig>,
}

impl Client {
    /// Dial a new session per `config`
    pub fn connect(config: SessionConfig) -> Result<Self> {
        let connection = create_connection(&config)?;
        Ok(Self {
            connection,
            config: Some(config),
        })
    }

    /// Wrap an existing connection; such a client cannot re-dial
    pub fn from_connection(connection: Box<dyn Connection>) -> Self {
        Self {
            connection,
            config: None,
        }
    }

    /// The underlying connection
    pub fn connection(&mut self) -> &mut dyn Connection {
        self.connection.as_mut()
    }

    /// Verify the session is alive, re-dialing from the stored config when
    /// it is not
    pub fn ensure_connected(&mut self) -> Result<()> {
        if self.connection.is_available() {
            return Ok(());
        }
        let Some(config) = &self.config else {
            return Err(FtpSyncError::Config(
                "session lost and no configuration to re-dial with".to_string(),
            ));
        };
        warn!(address = %config.address(), "session lost, re-dialing");
        self.connection = create_connection(config)?;
        Ok(())
    }

    /// Upload a local file into a remote directory under its own name
    pub fn send_file(&mut self, local_path: &Path, remote_dir: &str) -> Result<TransferOutcome> {
        let name = local_path
            .file_name()
            .ok_or_else(|| FtpSyncError::InvalidPath(local_path.display().to_string()))?
            .to_string_lossy()
            .into_owned();
        let remote_path = join_remote(remote_dir, &name);
        self.connection.upload_file(local_path, &remote_path, None)
    }

    /// Download a remote file into a local directory under its own name,
    /// aligning timestamps on an already-complete copy
    pub fn fetch_file(&mut self, remote_path: &str, local_dir: &Path) -> Result<TransferOutcome> {
        let target: PathBuf = local_dir.join(base_name(remote_path));
        self.connection
            .download_file(remote_path, &target, true, None)
    }

    /// Names of the files in a remote directory, optionally filtered
    pub fn file_names(
        &mut self,
        path: Option<&str>,
        filter: Option<&dyn NamePredicate>,
    ) -> Result<Vec<String>> {
        let entries = self.connection.list(path, filter)?;
        Ok(entries
            .into_iter()
            .filter(|e| !e.is_directory)
            .map(|e| e.name)
            .collect())
    }

    /// Close the session
    pub fn close(mut self) -> Result<()> {
        self.connection.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::NameSuffixFilter;
    use crate::transport::MemoryTransport;
    use std::fs;
    use std::io::Write as _;

    fn client_with(remote: MemoryTransport) -> Client {
        Client::from_connection(Box::new(FtpConnection::from_transport(remote)))
    }

    #[test]
    fn test_send_and_fetch_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("report.csv");
        {
            let mut f = fs::File::create(&source).unwrap();
            f.write_all(b"a,b\n").unwrap();
        }

        let mut remote = MemoryTransport::new();
        remote.add_directory("/inbox");
        let mut client = client_with(remote);

        client.send_file(&source, "/inbox").unwrap();
        let names = client.file_names(Some("/inbox"), None).unwrap();
        assert_eq!(names, vec!["report.csv"]);

        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        client.fetch_file("/inbox/report.csv", &out).unwrap();
        assert_eq!(fs::read(out.join("report.csv")).unwrap(), b"a,b\n");
    }

    #[test]
    fn test_file_names_applies_filter() {
        let mut remote = MemoryTransport::new();
        remote.add_file("/data/a.csv", b"1", 0);
        remote.add_file("/data/b.txt", b"2", 0);
        remote.add_directory("/data/sub");
        let mut client = client_with(remote);

        let filter = NameSuffixFilter::new(".csv");
        let names = client.file_names(Some("/data"), Some(&filter)).unwrap();
        assert_eq!(names, vec!["a.csv"]);
    }

    #[test]
    fn test_ensure_connected_without_config_fails_after_close() {
        let mut client = client_with(MemoryTransport::new());
        client.connection().close().unwrap();
        let err = client.ensure_connected().unwrap_err();
        assert!(matches!(err, FtpSyncError::Config(_)));
    }
}
