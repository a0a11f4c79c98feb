//! SFTP connection
//!
//! Implements the [`Connection`] contract over any [`TransportHandle`]
//! with SFTP semantics. Transfers are not resumed: an out-of-date
//! destination is rewritten from the start, and partial copies are simply
//! overwritten on the next run. Change detection and the directory helpers
//! are shared with the FTP side.

use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::{
    canonical_list, local_modified, local_size, needs_sync_with, probe_directory,
    remove_recursive, stamp_local_mtime, Connection, RemoteEntry, TransferOutcome,
};
use crate::config::{Protocol, SessionConfig};
use crate::error::{FtpSyncError, IoResultExt, Result};
use crate::filter::NamePredicate;
use crate::transfer::{copy_with_progress, ProgressFn};
use crate::transport::{SftpTransport, TransportHandle};

/// SFTP implementation of [`Connection`], generic over the transport
pub struct SftpConnection<T: TransportHandle> {
    transport: T,
}

impl SftpConnection<SftpTransport> {
    /// Connect and authenticate per `config`
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let transport = SftpTransport::connect(config)?;
        Ok(Self { transport })
    }
}

impl<T: TransportHandle> SftpConnection<T> {
    /// Wrap an already-authenticated transport
    pub fn from_transport(transport: T) -> Self {
        Self { transport }
    }

    /// Access the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: TransportHandle> Connection for SftpConnection<T> {
    fn protocol(&self) -> Protocol {
        Protocol::Sftp
    }

    fn is_available(&mut self) -> bool {
        self.transport.is_connected()
    }

    fn close(&mut self) -> Result<()> {
        self.transport.disconnect()
    }

    fn working_directory(&mut self) -> Result<String> {
        self.transport.working_directory()
    }

    fn change_directory(&mut self, path: &str) -> Result<()> {
        self.transport.change_directory(path)
    }

    fn list(
        &mut self,
        path: Option<&str>,
        filter: Option<&dyn NamePredicate>,
    ) -> Result<Vec<RemoteEntry>> {
        canonical_list(&mut self.transport, path, filter)
    }

    fn exists_file(&mut self, path: &str) -> Result<bool> {
        Ok(self.transport.stat_file(path)?.is_some())
    }

    fn exists_directory(&mut self, path: &str) -> Result<bool> {
        probe_directory(&mut self.transport, path)
    }

    fn needs_sync(&mut self, remote_path: &str, local_path: &Path) -> Result<bool> {
        needs_sync_with(&mut self.transport, remote_path, local_path)
    }

    fn create_directory(&mut self, path: &str) -> Result<()> {
        // mkdir each prefix in turn; SFTP has no recursive mkdir.
        let absolute = path.starts_with('/');
        let mut prefix = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if prefix.is_empty() {
                if absolute {
                    prefix.push('/');
                }
            } else {
                prefix.push('/');
            }
            prefix.push_str(segment);
            if !probe_directory(&mut self.transport, &prefix)? {
                self.transport.make_directory(&prefix)?;
            }
        }
        Ok(())
    }

    fn upload_file(
        &mut self,
        local_path: &Path,
        remote_path: &str,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<TransferOutcome> {
        let total = local_size(local_path)?
            .ok_or_else(|| FtpSyncError::not_found(local_path.display().to_string()))?;
        if total == 0 {
            debug!(local = %local_path.display(), "empty source, nothing to upload");
            return Ok(TransferOutcome::EmptySource);
        }

        let meta = fs::metadata(local_path).with_path(local_path)?;
        let local_mtime = local_modified(&meta, local_path)?;
        let remote = match self.transport.stat_file(remote_path)? {
            Some(stat) => stat.size,
            None => 0,
        };
        if remote == total {
            debug!(remote = %remote_path, size = total, "remote already complete");
            self.transport.set_modification_time(remote_path, local_mtime)?;
            return Ok(TransferOutcome::AlreadyUpToDate);
        }
        if remote > total {
            return Err(FtpSyncError::InconsistentState {
                path: remote_path.to_string(),
                remote_size: remote,
                local_size: total,
            });
        }

        info!(local = %local_path.display(), remote = %remote_path, total, "uploading");
        let mut file = fs::File::open(local_path).with_path(local_path)?;
        let mut stream = self.transport.open_write_stream(remote_path, 0, false)?;
        let result = copy_with_progress(&mut file, &mut stream, total, 0, progress);
        drop(stream);
        let copied = result.map_err(|e| FtpSyncError::transfer(remote_path, e.to_string()))?;
        self.transport.finalize_transfer()?;
        self.transport.set_modification_time(remote_path, local_mtime)?;
        Ok(TransferOutcome::Transferred {
            bytes: copied,
            resumed_from: 0,
        })
    }

    fn download_file(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        compare_timestamps: bool,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<TransferOutcome> {
        let stat = self
            .transport
            .stat_file(remote_path)?
            .ok_or_else(|| FtpSyncError::not_found(remote_path))?;
        if stat.size == 0 {
            debug!(remote = %remote_path, "empty source, nothing to download");
            return Ok(TransferOutcome::EmptySource);
        }

        let have = local_size(local_path)?.unwrap_or(0);
        if have == stat.size {
            debug!(local = %local_path.display(), size = have, "local already complete");
            if compare_timestamps {
                let remote_mtime = self.transport.modification_time(remote_path)?;
                let meta = fs::metadata(local_path).with_path(local_path)?;
                if remote_mtime.timestamp() != local_modified(&meta, local_path)?.timestamp() {
                    stamp_local_mtime(local_path, remote_mtime)?;
                }
            }
            return Ok(TransferOutcome::AlreadyUpToDate);
        }
        if have > stat.size {
            return Err(FtpSyncError::InconsistentState {
                path: remote_path.to_string(),
                remote_size: stat.size,
                local_size: have,
            });
        }

        if let Some(parent) = local_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_path(parent)?;
            }
        }
        info!(remote = %remote_path, local = %local_path.display(), total = stat.size, "downloading");
        let mut file = fs::File::create(local_path).with_path(local_path)?;
        let mut stream = self.transport.open_read_stream(remote_path, 0)?;
        let result = copy_with_progress(&mut stream, &mut file, stat.size, 0, progress);
        drop(stream);
        let copied = result.map_err(|e| FtpSyncError::transfer(remote_path, e.to_string()))?;
        self.transport.finalize_transfer()?;
        let mtime = self.transport.modification_time(remote_path)?;
        stamp_local_mtime(local_path, mtime)?;
        Ok(TransferOutcome::Transferred {
            bytes: copied,
            resumed_from: 0,
        })
    }

    fn remove_file_or_directory(&mut self, path: &str) -> Result<()> {
        remove_recursive(&mut self.transport, path)
    }
}
