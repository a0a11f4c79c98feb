//! SFTP transport adapter
//!
//! Wraps an ssh2 session and SFTP channel behind [`TransportHandle`].
//! SFTP has no working-directory concept on the wire, so the adapter keeps
//! its own cursor and resolves relative paths against it. File handles are
//! seekable, which makes offset-addressed streams trivial; there is no
//! end-of-transfer acknowledgement to drain.

use chrono::{DateTime, Utc};
use ssh2::{ErrorCode, FileStat, OpenFlags, OpenType, Session, Sftp};
use std::io::{Read, Seek, SeekFrom, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{RemoteStat, TransportEntry, TransportHandle, TransportStatus};
use crate::config::SessionConfig;
use crate::error::{FtpSyncError, Result};

// libssh2 SFTP status codes worth telling apart.
const SFTP_NO_SUCH_FILE: i32 = 2;
const SFTP_PERMISSION_DENIED: i32 = 3;
const SFTP_NO_SUCH_PATH: i32 = 10;

/// SFTP implementation of [`TransportHandle`] built on ssh2
pub struct SftpTransport {
    session: Session,
    sftp: Sftp,
    cwd: String,
    last_status: Option<TransportStatus>,
}

impl SftpTransport {
    /// Connect, perform the SSH handshake, authenticate with the configured
    /// password and open the SFTP channel.
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let addr = config.address();
        info!(address = %addr, protocol = %config.protocol, "connecting");

        let tcp = TcpStream::connect(&addr)
            .map_err(|e| FtpSyncError::connection(&config.host, config.port, e.to_string()))?;

        let mut session = Session::new()
            .map_err(|e| FtpSyncError::connection(&config.host, config.port, e.to_string()))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| FtpSyncError::connection(&config.host, config.port, e.to_string()))?;

        let username = config.credentials.username();
        session
            .userauth_password(username, config.credentials.password())
            .map_err(|e| {
                FtpSyncError::login(&config.host, config.port, username, e.to_string())
            })?;
        if !session.authenticated() {
            return Err(FtpSyncError::login(
                &config.host,
                config.port,
                username,
                "authentication failed",
            ));
        }

        let sftp = session
            .sftp()
            .map_err(|e| FtpSyncError::connection(&config.host, config.port, e.to_string()))?;
        let cwd = sftp
            .realpath(Path::new("."))
            .map_err(|e| FtpSyncError::connection(&config.host, config.port, e.to_string()))?
            .to_string_lossy()
            .into_owned();

        info!(address = %addr, user = %username, cwd = %cwd, "login succeeded");
        Ok(Self {
            session,
            sftp,
            cwd,
            last_status: None,
        })
    }

    /// Resolve a possibly relative remote path against the cursor
    fn resolve(&self, path: &str) -> PathBuf {
        if path.starts_with('/') {
            PathBuf::from(path)
        } else {
            Path::new(&self.cwd).join(path)
        }
    }

    /// Record the interpreted status of a failed operation and wrap it
    fn fail(&mut self, path: &str, error: ssh2::Error) -> FtpSyncError {
        let status = interpret(&error);
        self.last_status = Some(status);
        match status {
            TransportStatus::NotFound => FtpSyncError::not_found(path),
            _ => FtpSyncError::ProtocolStatus {
                path: path.to_string(),
                status,
                detail: error.to_string(),
            },
        }
    }

    fn clear_status(&mut self) {
        self.last_status = None;
    }
}

/// Map an ssh2 error to the distinguished status set
fn interpret(error: &ssh2::Error) -> TransportStatus {
    match error.code() {
        ErrorCode::SFTP(SFTP_NO_SUCH_FILE) | ErrorCode::SFTP(SFTP_NO_SUCH_PATH) => {
            TransportStatus::NotFound
        }
        ErrorCode::SFTP(SFTP_PERMISSION_DENIED) => TransportStatus::PermissionDenied,
        _ => TransportStatus::Other,
    }
}

/// Modification time from an SFTP stat, truncated to whole seconds
fn mtime_of(stat: &FileStat) -> DateTime<Utc> {
    DateTime::from_timestamp(stat.mtime.unwrap_or(0) as i64, 0).unwrap_or_default()
}

impl TransportHandle for SftpTransport {
    fn is_connected(&mut self) -> bool {
        self.session.authenticated()
    }

    fn disconnect(&mut self) -> Result<()> {
        debug!("disconnecting");
        self.session
            .disconnect(None, "closing session", None)
            .map_err(|e| FtpSyncError::transfer("<disconnect>", e.to_string()))
    }

    fn working_directory(&mut self) -> Result<String> {
        Ok(self.cwd.clone())
    }

    fn change_directory(&mut self, path: &str) -> Result<()> {
        self.clear_status();
        let resolved = self.resolve(path);
        let stat = match self.sftp.stat(&resolved) {
            Ok(stat) => stat,
            Err(e) => return Err(self.fail(path, e)),
        };
        if !stat.is_dir() {
            self.last_status = Some(TransportStatus::NotFound);
            return Err(FtpSyncError::not_found(path));
        }
        let canonical = self
            .sftp
            .realpath(&resolved)
            .map_err(|e| self.fail(path, e))?;
        self.cwd = canonical.to_string_lossy().into_owned();
        Ok(())
    }

    fn list(&mut self, path: &str) -> Result<Vec<TransportEntry>> {
        self.clear_status();
        let resolved = self.resolve(path);
        let raw = self
            .sftp
            .readdir(&resolved)
            .map_err(|e| self.fail(path, e))?;

        let entries = raw
            .into_iter()
            .filter_map(|(entry_path, stat)| {
                let name = entry_path.file_name()?.to_string_lossy().into_owned();
                Some(TransportEntry {
                    name,
                    size: stat.size.unwrap_or(0),
                    modified: mtime_of(&stat),
                    is_directory: stat.is_dir(),
                })
            })
            .collect();
        Ok(entries)
    }

    fn stat_file(&mut self, path: &str) -> Result<Option<RemoteStat>> {
        self.clear_status();
        let resolved = self.resolve(path);
        match self.sftp.stat(&resolved) {
            Ok(stat) if stat.is_file() => Ok(Some(RemoteStat {
                size: stat.size.unwrap_or(0),
                modified: mtime_of(&stat),
            })),
            Ok(_) => Ok(None),
            Err(e) if interpret(&e) == TransportStatus::NotFound => {
                self.last_status = Some(TransportStatus::NotFound);
                Ok(None)
            }
            Err(e) => Err(self.fail(path, e)),
        }
    }

    fn open_read_stream(&mut self, path: &str, offset: u64) -> Result<Box<dyn Read + '_>> {
        self.clear_status();
        let resolved = self.resolve(path);
        let mut file = match self.sftp.open(&resolved) {
            Ok(file) => file,
            Err(e) => return Err(self.fail(path, e)),
        };
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .map_err(|e| FtpSyncError::transfer(path, e.to_string()))?;
        }
        Ok(Box::new(file))
    }

    fn open_write_stream(
        &mut self,
        path: &str,
        offset: u64,
        append: bool,
    ) -> Result<Box<dyn Write + '_>> {
        self.clear_status();
        let resolved = self.resolve(path);
        let mut flags = OpenFlags::WRITE | OpenFlags::CREATE;
        if append {
            flags |= OpenFlags::APPEND;
        } else if offset == 0 {
            flags |= OpenFlags::TRUNCATE;
        }
        let mut file = match self.sftp.open_mode(&resolved, flags, 0o644, OpenType::File) {
            Ok(file) => file,
            Err(e) => return Err(self.fail(path, e)),
        };
        if !append && offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .map_err(|e| FtpSyncError::transfer(path, e.to_string()))?;
        }
        Ok(Box::new(file))
    }

    fn finalize_transfer(&mut self) -> Result<()> {
        // SFTP file handles close on drop; nothing to acknowledge.
        Ok(())
    }

    fn make_directory(&mut self, path: &str) -> Result<()> {
        self.clear_status();
        let resolved = self.resolve(path);
        self.sftp.mkdir(&resolved, 0o755).map_err(|e| self.fail(path, e))
    }

    fn remove_directory(&mut self, path: &str) -> Result<()> {
        self.clear_status();
        let resolved = self.resolve(path);
        self.sftp.rmdir(&resolved).map_err(|e| self.fail(path, e))
    }

    fn delete_file(&mut self, path: &str) -> Result<()> {
        self.clear_status();
        let resolved = self.resolve(path);
        self.sftp.unlink(&resolved).map_err(|e| self.fail(path, e))
    }

    fn modification_time(&mut self, path: &str) -> Result<DateTime<Utc>> {
        self.clear_status();
        let resolved = self.resolve(path);
        let stat = self.sftp.stat(&resolved).map_err(|e| self.fail(path, e))?;
        Ok(mtime_of(&stat))
    }

    fn set_modification_time(&mut self, path: &str, mtime: DateTime<Utc>) -> Result<()> {
        self.clear_status();
        let resolved = self.resolve(path);
        let seconds = mtime.timestamp().max(0) as u64;
        let stat = FileStat {
            size: None,
            uid: None,
            gid: None,
            perm: None,
            atime: Some(seconds),
            mtime: Some(seconds),
        };
        self.sftp
            .setstat(&resolved, stat)
            .map_err(|e| self.fail(path, e))
    }

    fn last_status(&self) -> Option<TransportStatus> {
        self.last_status
    }
}
