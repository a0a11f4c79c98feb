//! FTP/FTPS transport adapter
//!
//! Wraps a suppaftp stream behind [`TransportHandle`]. The control channel
//! carries navigation and metadata commands; transfers open a separate data
//! channel which must be drained with `finalize_transfer` after the stream
//! is dropped. FTPS is the same engine upgraded with an explicit `AUTH TLS`
//! at connect time.

use chrono::{DateTime, Utc};
use std::io::{self, Read, Write};
use suppaftp::list::File as ListEntry;
use suppaftp::native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{FtpError, NativeTlsConnector, NativeTlsFtpStream, Status};
use tracing::{debug, info, warn};

use super::{RemoteStat, TransportEntry, TransportHandle, TransportStatus};
use crate::config::{Protocol, SessionConfig};
use crate::error::{FtpSyncError, Result};

/// Direction of a data transfer awaiting its closing reply
enum Pending {
    Read,
    Write,
}

/// FTP/FTPS implementation of [`TransportHandle`] built on suppaftp
pub struct FtpTransport {
    stream: NativeTlsFtpStream,
    last_status: Option<TransportStatus>,
    pending: Option<Pending>,
}

impl FtpTransport {
    /// Connect and login according to `config`.
    ///
    /// Fails with [`FtpSyncError::ConnectionFailed`] on transport errors and
    /// [`FtpSyncError::LoginFailed`] when the server rejects the
    /// credentials; in the latter case the control connection is closed
    /// before returning.
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let addr = config.address();
        info!(address = %addr, protocol = %config.protocol, "connecting");

        let mut stream = NativeTlsFtpStream::connect(&addr)
            .map_err(|e| FtpSyncError::connection(&config.host, config.port, e.to_string()))?;

        if config.protocol == Protocol::Ftps {
            let connector = TlsConnector::new()
                .map_err(|e| FtpSyncError::connection(&config.host, config.port, e.to_string()))?;
            stream = stream
                .into_secure(NativeTlsConnector::from(connector), &config.host)
                .map_err(|e| FtpSyncError::connection(&config.host, config.port, e.to_string()))?;
        }

        let username = config.credentials.username().to_string();
        if let Err(e) = stream.login(username.as_str(), config.credentials.password()) {
            let _ = stream.quit();
            return Err(FtpSyncError::login(
                &config.host,
                config.port,
                username,
                e.to_string(),
            ));
        }

        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| FtpSyncError::connection(&config.host, config.port, e.to_string()))?;

        info!(address = %addr, user = %username, "login succeeded");
        Ok(Self {
            stream,
            last_status: None,
            pending: None,
        })
    }

    /// Record the interpreted status of a failed command and wrap it
    fn fail(&mut self, path: &str, error: FtpError) -> FtpSyncError {
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

/// Map a suppaftp error to the distinguished status set
fn interpret(error: &FtpError) -> TransportStatus {
    match error {
        FtpError::UnexpectedResponse(response) if response.status == Status::FileUnavailable => {
            TransportStatus::NotFound
        }
        _ => TransportStatus::Other,
    }
}

/// Last path segment of a forward-slash remote path
fn base_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

/// Translate one parsed LIST record
fn to_entry(parsed: &ListEntry) -> TransportEntry {
    TransportEntry {
        name: parsed.name().to_string(),
        size: parsed.size() as u64,
        modified: DateTime::<Utc>::from(parsed.modified()),
        is_directory: parsed.is_directory(),
    }
}

impl TransportHandle for FtpTransport {
    fn is_connected(&mut self) -> bool {
        self.stream.noop().is_ok()
    }

    fn disconnect(&mut self) -> Result<()> {
        debug!("disconnecting");
        self.stream
            .quit()
            .map_err(|e| FtpSyncError::transfer("<quit>", e.to_string()))
    }

    fn working_directory(&mut self) -> Result<String> {
        self.clear_status();
        self.stream.pwd().map_err(|e| self.fail(".", e))
    }

    fn change_directory(&mut self, path: &str) -> Result<()> {
        self.clear_status();
        self.stream.cwd(path).map_err(|e| self.fail(path, e))
    }

    fn list(&mut self, path: &str) -> Result<Vec<TransportEntry>> {
        self.clear_status();
        let lines = self
            .stream
            .list(Some(path))
            .map_err(|e| self.fail(path, e))?;

        let mut entries = Vec::with_capacity(lines.len());
        for line in &lines {
            match ListEntry::try_from(line.as_str()) {
                Ok(parsed) => entries.push(to_entry(&parsed)),
                // Non-standard listing formats vary by server; skip what we
                // cannot parse rather than failing the whole listing.
                Err(e) => warn!(line = %line, error = %e, "unparsable LIST line"),
            }
        }
        Ok(entries)
    }

    fn stat_file(&mut self, path: &str) -> Result<Option<RemoteStat>> {
        self.clear_status();
        let lines = match self.stream.list(Some(path)) {
            Ok(lines) => lines,
            Err(e) if interpret(&e) == TransportStatus::NotFound => {
                self.last_status = Some(TransportStatus::NotFound);
                return Ok(None);
            }
            Err(e) => return Err(self.fail(path, e)),
        };

        // A LIST of an exact file path yields a single record. A single
        // record that is a directory, or whose name does not match, means
        // we listed a directory's contents instead.
        if lines.len() != 1 {
            return Ok(None);
        }
        let parsed = match ListEntry::try_from(lines[0].as_str()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(line = %lines[0], error = %e, "unparsable LIST line");
                return Ok(None);
            }
        };
        if !parsed.is_file() {
            return Ok(None);
        }
        if parsed.name() != base_name(path) && parsed.name() != path {
            return Ok(None);
        }
        Ok(Some(RemoteStat {
            size: parsed.size() as u64,
            modified: DateTime::<Utc>::from(parsed.modified()),
        }))
    }

    fn open_read_stream(&mut self, path: &str, offset: u64) -> Result<Box<dyn Read + '_>> {
        self.clear_status();
        if offset > 0 {
            self.stream
                .resume_transfer(offset as usize)
                .map_err(|e| self.fail(path, e))?;
        }
        let data = self
            .stream
            .retr_as_stream(path)
            .map_err(|e| self.fail(path, e))?;
        self.pending = Some(Pending::Read);
        Ok(Box::new(data))
    }

    fn open_write_stream(
        &mut self,
        path: &str,
        offset: u64,
        append: bool,
    ) -> Result<Box<dyn Write + '_>> {
        self.clear_status();
        let data = if append {
            self.stream
                .append_with_stream(path)
                .map_err(|e| self.fail(path, e))?
        } else {
            if offset > 0 {
                self.stream
                    .resume_transfer(offset as usize)
                    .map_err(|e| self.fail(path, e))?;
            }
            self.stream
                .put_with_stream(path)
                .map_err(|e| self.fail(path, e))?
        };
        self.pending = Some(Pending::Write);
        Ok(Box::new(data))
    }

    fn finalize_transfer(&mut self) -> Result<()> {
        match self.pending.take() {
            Some(Pending::Read) => self
                .stream
                .finalize_retr_stream(io::empty())
                .map_err(|e| self.fail("<data stream>", e)),
            Some(Pending::Write) => self
                .stream
                .finalize_put_stream(io::sink())
                .map_err(|e| self.fail("<data stream>", e)),
            None => Ok(()),
        }
    }

    fn make_directory(&mut self, path: &str) -> Result<()> {
        self.clear_status();
        self.stream.mkdir(path).map_err(|e| self.fail(path, e))
    }

    fn remove_directory(&mut self, path: &str) -> Result<()> {
        self.clear_status();
        self.stream.rmdir(path).map_err(|e| self.fail(path, e))
    }

    fn delete_file(&mut self, path: &str) -> Result<()> {
        self.clear_status();
        self.stream.rm(path).map_err(|e| self.fail(path, e))
    }

    fn modification_time(&mut self, path: &str) -> Result<DateTime<Utc>> {
        self.clear_status();
        // MDTM returns yyyyMMddHHmmss in UTC, whole seconds only.
        self.stream
            .mdtm(path)
            .map(|naive| naive.and_utc())
            .map_err(|e| self.fail(path, e))
    }

    fn set_modification_time(&mut self, path: &str, mtime: DateTime<Utc>) -> Result<()> {
        self.clear_status();
        let command = format!("MFMT {} {}", mtime.format("%Y%m%d%H%M%S"), path);
        self.stream
            .custom_command(command, &[Status::File, Status::CommandOk])
            .map(|_| ())
            .map_err(|e| self.fail(path, e))
    }

    fn last_status(&self) -> Option<TransportStatus> {
        self.last_status
    }
}
