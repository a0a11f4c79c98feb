//! FTP/FTPS connection
//!
//! Implements the [`Connection`] contract over any [`TransportHandle`]
//! with FTP semantics: resumable transfers via `REST`/`APPE`, directory
//! existence probed by a change-directory round trip, and recursive
//! directory creation driven by not-found replies.
//!
//! Resume decisions for a transfer of a file with `total` bytes against a
//! destination already holding `have` bytes:
//! - `total == 0`: nothing to do
//! - `have == total`: content assumed identical, only timestamps aligned
//! - `have > total`: abort as inconsistent, never truncate
//! - `have < total`: continue at offset `have`

use std::fs;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info};

use super::path;
use super::{
    canonical_list, local_modified, local_size, needs_sync_with, probe_directory,
    remove_recursive, stamp_local_mtime, Connection, RemoteEntry, TransferOutcome,
};
use crate::config::{Protocol, SessionConfig};
use crate::error::{FtpSyncError, IoResultExt, Result};
use crate::filter::NamePredicate;
use crate::transfer::{copy_with_progress, ProgressFn};
use crate::transport::{FtpTransport, TransportHandle};

/// FTP implementation of [`Connection`], generic over the transport
pub struct FtpConnection<T: TransportHandle> {
    transport: T,
    protocol: Protocol,
}

impl FtpConnection<FtpTransport> {
    /// Connect and login per `config` (plain FTP or FTPS)
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let transport = FtpTransport::connect(config)?;
        Ok(Self {
            transport,
            protocol: config.protocol,
        })
    }
}

impl<T: TransportHandle> FtpConnection<T> {
    /// Wrap an already-authenticated transport
    pub fn from_transport(transport: T) -> Self {
        Self {
            transport,
            protocol: Protocol::Ftp,
        }
    }

    /// Access the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: TransportHandle> Connection for FtpConnection<T> {
    fn protocol(&self) -> Protocol {
        self.protocol
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
        if probe_directory(&mut self.transport, path)? {
            return Ok(());
        }
        match self.transport.make_directory(path) {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                let Some(parent) = path::parent(path) else {
                    return Err(e);
                };
                let parent = parent.to_string();
                self.create_directory(&parent)?;
                self.transport.make_directory(path)
            }
            Err(e) => Err(e),
        }
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

        let remote = match self.transport.stat_file(remote_path)? {
            Some(stat) => stat.size,
            None => 0,
        };
        if remote == total {
            debug!(remote = %remote_path, size = total, "remote already complete");
            let meta = fs::metadata(local_path).with_path(local_path)?;
            let mtime = local_modified(&meta, local_path)?;
            self.transport.set_modification_time(remote_path, mtime)?;
            return Ok(TransferOutcome::AlreadyUpToDate);
        }
        if remote > total {
            return Err(FtpSyncError::InconsistentState {
                path: remote_path.to_string(),
                remote_size: remote,
                local_size: total,
            });
        }

        let offset = remote;
        info!(local = %local_path.display(), remote = %remote_path, offset, total, "uploading");
        let mut file = fs::File::open(local_path).with_path(local_path)?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).with_path(local_path)?;
        }
        let mut stream = self.transport.open_write_stream(remote_path, offset, offset > 0)?;
        let result = copy_with_progress(&mut file, &mut stream, total, offset, progress);
        drop(stream);
        match result {
            Ok(copied) => {
                self.transport.finalize_transfer()?;
                let meta = fs::metadata(local_path).with_path(local_path)?;
                let mtime = local_modified(&meta, local_path)?;
                self.transport.set_modification_time(remote_path, mtime)?;
                Ok(TransferOutcome::Transferred {
                    bytes: copied,
                    resumed_from: offset,
                })
            }
            Err(e) => {
                let _ = self.transport.finalize_transfer();
                Err(FtpSyncError::transfer(remote_path, e.to_string()))
            }
        }
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

        let offset = have;
        if let Some(parent) = local_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_path(parent)?;
            }
        }
        info!(remote = %remote_path, local = %local_path.display(), offset, total = stat.size, "downloading");
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(local_path)
            .with_path(local_path)?;
        let mut stream = self.transport.open_read_stream(remote_path, offset)?;
        let result = copy_with_progress(&mut stream, &mut file, stat.size, offset, progress);
        drop(stream);
        match result {
            Ok(copied) => {
                self.transport.finalize_transfer()?;
                let mtime = self.transport.modification_time(remote_path)?;
                stamp_local_mtime(local_path, mtime)?;
                Ok(TransferOutcome::Transferred {
                    bytes: copied,
                    resumed_from: offset,
                })
            }
            Err(e) => {
                let _ = self.transport.finalize_transfer();
                Err(FtpSyncError::transfer(remote_path, e.to_string()))
            }
        }
    }

    fn remove_file_or_directory(&mut self, path: &str) -> Result<()> {
        remove_recursive(&mut self.transport, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use chrono::DateTime;
    use std::fs;
    use std::io::Write as _;

    fn write_local(path: &Path, data: &[u8], mtime: i64) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(data).unwrap();
        drop(f);
        stamp_local_mtime(path, DateTime::from_timestamp(mtime, 0).unwrap()).unwrap();
    }

    fn connection() -> FtpConnection<MemoryTransport> {
        FtpConnection::from_transport(MemoryTransport::new())
    }

    #[test]
    fn test_upload_then_download_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.bin");
        write_local(&source, b"payload bytes", 1_700_000_000);

        let mut conn = connection();
        conn.create_directory("/data").unwrap();
        let outcome = conn.upload_file(&source, "/data/file.bin", None).unwrap();
        assert_eq!(
            outcome,
            TransferOutcome::Transferred {
                bytes: 13,
                resumed_from: 0
            }
        );
        assert_eq!(
            conn.transport().file_contents("/data/file.bin").unwrap(),
            b"payload bytes"
        );
        assert_eq!(
            conn.transport().file_mtime("/data/file.bin").unwrap(),
            1_700_000_000
        );

        let target = dir.path().join("copy.bin");
        let outcome = conn
            .download_file("/data/file.bin", &target, true, None)
            .unwrap();
        assert_eq!(outcome.bytes(), 13);
        assert_eq!(fs::read(&target).unwrap(), b"payload bytes");
        let mtime = fs::metadata(&target).unwrap().modified().unwrap();
        assert_eq!(
            chrono::DateTime::<chrono::Utc>::from(mtime).timestamp(),
            1_700_000_000
        );
    }

    #[test]
    fn test_upload_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.bin");
        write_local(&source, b"same bytes", 1_700_000_000);

        let mut conn = connection();
        conn.upload_file(&source, "/file.bin", None).unwrap();
        let second = conn.upload_file(&source, "/file.bin", None).unwrap();
        assert_eq!(second, TransferOutcome::AlreadyUpToDate);
        assert_eq!(conn.transport().file_contents("/file.bin").unwrap(), b"same bytes");
    }

    #[test]
    fn test_download_resumes_at_local_size() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("partial.bin");
        write_local(&target, b"0123", 1_600_000_000);

        let mut conn = connection();
        conn.transport.add_file("/partial.bin", b"0123456789", 1_700_000_000);

        let outcome = conn
            .download_file("/partial.bin", &target, true, None)
            .unwrap();
        assert_eq!(
            outcome,
            TransferOutcome::Transferred {
                bytes: 6,
                resumed_from: 4
            }
        );
        assert_eq!(fs::read(&target).unwrap(), b"0123456789");
        assert_eq!(
            conn.transport().read_opens(),
            &[("/partial.bin".to_string(), 4)]
        );
    }

    #[test]
    fn test_upload_resumes_at_remote_size() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.bin");
        write_local(&source, b"0123456789", 1_700_000_000);

        let mut conn = connection();
        conn.transport.add_file("/dest.bin", b"0123", 1_600_000_000);

        let outcome = conn.upload_file(&source, "/dest.bin", None).unwrap();
        assert_eq!(
            outcome,
            TransferOutcome::Transferred {
                bytes: 6,
                resumed_from: 4
            }
        );
        assert_eq!(conn.transport().file_contents("/dest.bin").unwrap(), b"0123456789");
        assert_eq!(conn.transport().file_mtime("/dest.bin").unwrap(), 1_700_000_000);
    }

    #[test]
    fn test_complete_local_copy_is_restamped_only_when_comparing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("f.bin");
        write_local(&target, b"hello", 1_600_000_000);

        let mut conn = connection();
        conn.transport.add_file("/f.bin", b"hello", 1_700_000_000);

        // Without timestamp comparison the drifted mtime is left alone.
        let outcome = conn.download_file("/f.bin", &target, false, None).unwrap();
        assert_eq!(outcome, TransferOutcome::AlreadyUpToDate);
        let mtime = fs::metadata(&target).unwrap().modified().unwrap();
        assert_eq!(
            chrono::DateTime::<chrono::Utc>::from(mtime).timestamp(),
            1_600_000_000
        );

        // With it, the local mtime is aligned to the remote one.
        let outcome = conn.download_file("/f.bin", &target, true, None).unwrap();
        assert_eq!(outcome, TransferOutcome::AlreadyUpToDate);
        let mtime = fs::metadata(&target).unwrap().modified().unwrap();
        assert_eq!(
            chrono::DateTime::<chrono::Utc>::from(mtime).timestamp(),
            1_700_000_000
        );
        assert!(conn.transport().read_opens().is_empty());
        assert!(!conn.needs_sync("/f.bin", &target).unwrap());
    }

    #[test]
    fn test_download_aborts_when_local_is_larger() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("big.bin");
        write_local(&target, b"local is longer", 1_600_000_000);

        let mut conn = connection();
        conn.transport.add_file("/big.bin", b"short", 1_700_000_000);

        let err = conn
            .download_file("/big.bin", &target, true, None)
            .unwrap_err();
        assert!(matches!(
            err,
            FtpSyncError::InconsistentState {
                remote_size: 5,
                local_size: 15,
                ..
            }
        ));
        // The oversized local file is left untouched.
        assert_eq!(fs::read(&target).unwrap(), b"local is longer");
    }

    #[test]
    fn test_download_of_empty_remote_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("empty.bin");

        let mut conn = connection();
        conn.transport.add_file("/empty.bin", b"", 1_700_000_000);

        let outcome = conn
            .download_file("/empty.bin", &target, true, None)
            .unwrap();
        assert_eq!(outcome, TransferOutcome::EmptySource);
        assert!(!target.exists());
    }

    #[test]
    fn test_download_missing_remote_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = connection();
        let err = conn
            .download_file("/missing", &dir.path().join("x"), true, None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_create_directory_builds_missing_parents() {
        let mut conn = connection();
        conn.create_directory("/a/b/c").unwrap();
        assert!(conn.transport().has_directory("/a/b/c"));
        // Idempotent on an existing directory.
        conn.create_directory("/a/b/c").unwrap();
    }

    #[test]
    fn test_directory_mirror_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("a/b")).unwrap();
        write_local(&tree.join("a/file1"), b"one", 1_700_000_001);
        write_local(&tree.join("a/b/file2"), b"two2", 1_700_000_002);

        let mut conn = connection();
        let summary = conn.upload_directory(&tree, "/mirror", None).unwrap();
        assert_eq!(summary.files_transferred, 2);
        assert_eq!(summary.bytes_transferred, 7);
        assert_eq!(conn.transport().file_contents("/mirror/a/file1").unwrap(), b"one");
        assert_eq!(
            conn.transport().file_contents("/mirror/a/b/file2").unwrap(),
            b"two2"
        );

        let back = dir.path().join("back");
        let summary = conn.download_directory("/mirror", &back, true, None).unwrap();
        assert_eq!(summary.files_transferred, 2);
        assert_eq!(fs::read(back.join("a/file1")).unwrap(), b"one");
        assert_eq!(fs::read(back.join("a/b/file2")).unwrap(), b"two2");

        // A second mirror moves nothing.
        let summary = conn.download_directory("/mirror", &back, true, None).unwrap();
        assert_eq!(summary.files_transferred, 0);
        assert_eq!(summary.files_skipped, 2);
    }

    #[test]
    fn test_progress_reports_are_quantized() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("f.bin");

        let mut conn = connection();
        let data: Vec<u8> = vec![7; 200];
        conn.transport.add_file("/f.bin", &data, 1_700_000_000);

        let mut reports = Vec::new();
        let mut callback = |done: u64| reports.push(done);
        conn.download_file("/f.bin", &target, true, Some(&mut callback))
            .unwrap();

        // 200 bytes arrive in one buffered read: a single report at the end.
        assert_eq!(reports, vec![200]);
    }

    #[test]
    fn test_remove_directory_tree() {
        let mut conn = connection();
        conn.transport.add_file("/old/a/x.bin", b"x", 0);
        conn.transport.add_file("/old/y.bin", b"y", 0);

        conn.remove_file_or_directory("/old").unwrap();
        assert!(!conn.transport().has_path("/old"));
    }

    #[test]
    fn test_exists_probes() {
        let mut conn = connection();
        conn.transport.add_file("/dir/f.bin", b"x", 0);

        assert!(conn.exists_file("/dir/f.bin").unwrap());
        assert!(!conn.exists_file("/dir").unwrap());
        assert!(conn.exists_directory("/dir").unwrap());
        assert!(!conn.exists_directory("/dir/f.bin").unwrap());
        assert!(!conn.exists_directory("/nope").unwrap());
    }
}
