//! Protocol-independent connection contract
//!
//! [`Connection`] is the uniform surface callers program against: listing,
//! existence probes, change detection, single-file transfers and recursive
//! mirrors, identical across FTP, FTPS and SFTP. The two implementations —
//! [`FtpConnection`] and [`SftpConnection`] — are generic over
//! [`TransportHandle`] so the same logic runs against a live server or the
//! in-memory transport in tests.
//!
//! Recoverable no-ops (nothing to transfer, already up to date) are values
//! of [`TransferOutcome`], not errors; errors are reserved for faults.

mod entry;
mod ftp;
pub mod path;
mod sftp;

pub use entry::RemoteEntry;
pub use ftp::FtpConnection;
pub use sftp::SftpConnection;

use chrono::{DateTime, Utc};
use filetime::FileTime;
use humansize::{format_size, BINARY};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Protocol;
use crate::error::{FtpSyncError, IoResultExt, Result};
use crate::filter::NamePredicate;
use crate::transfer::ProgressFn;
use crate::transport::TransportHandle;

use path::{join_remote, to_remote_relative};

/// Result of a single-file transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Bytes were moved; `resumed_from` is 0 for a fresh transfer
    Transferred {
        /// Bytes moved by this call, not counting any resumed prefix
        bytes: u64,
        /// Offset the transfer continued from
        resumed_from: u64,
    },
    /// Destination already holds the full file; nothing was moved
    AlreadyUpToDate,
    /// The source file is empty; nothing was moved
    EmptySource,
}

impl TransferOutcome {
    /// Bytes moved by the operation
    pub fn bytes(&self) -> u64 {
        match self {
            TransferOutcome::Transferred { bytes, .. } => *bytes,
            _ => 0,
        }
    }
}

/// Accumulated result of a recursive mirror
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Files that moved bytes
    pub files_transferred: u64,
    /// Files skipped as already up to date or empty
    pub files_skipped: u64,
    /// Total bytes moved
    pub bytes_transferred: u64,
}

impl SyncSummary {
    /// Fold one file outcome into the summary
    pub fn record(&mut self, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Transferred { bytes, .. } => {
                self.files_transferred += 1;
                self.bytes_transferred += bytes;
            }
            TransferOutcome::AlreadyUpToDate | TransferOutcome::EmptySource => {
                self.files_skipped += 1;
            }
        }
    }

    /// Fold a subtree summary into this one
    pub fn merge(&mut self, other: SyncSummary) {
        self.files_transferred += other.files_transferred;
        self.files_skipped += other.files_skipped;
        self.bytes_transferred += other.bytes_transferred;
    }
}

impl std::fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} transferred ({} files, {} skipped)",
            format_size(self.bytes_transferred, BINARY),
            self.files_transferred,
            self.files_skipped
        )
    }
}

/// Uniform remote-session surface shared by all protocols.
///
/// A connection wraps exactly one authenticated transport and, like it, is
/// single-threaded; parallel transfers use one connection per worker. The
/// recursive mirrors are default methods built entirely from the other
/// operations, so implementations only supply the protocol-specific parts.
pub trait Connection {
    /// Protocol this connection speaks
    fn protocol(&self) -> Protocol;

    /// Liveness probe for the underlying session
    fn is_available(&mut self) -> bool;

    /// Close the underlying session
    fn close(&mut self) -> Result<()>;

    /// Absolute path of the remote working directory
    fn working_directory(&mut self) -> Result<String>;

    /// Change the remote working directory
    fn change_directory(&mut self, path: &str) -> Result<()>;

    /// List a directory (the working directory when `path` is `None`).
    ///
    /// `.`/`..` pseudo-entries are dropped and every entry carries its
    /// absolute path. The filter applies to file entries only; directories
    /// always pass so recursive walks see the whole tree.
    fn list(
        &mut self,
        path: Option<&str>,
        filter: Option<&dyn NamePredicate>,
    ) -> Result<Vec<RemoteEntry>>;

    /// Whether `path` exists as a regular file
    fn exists_file(&mut self, path: &str) -> Result<bool>;

    /// Whether `path` exists as a directory
    fn exists_directory(&mut self, path: &str) -> Result<bool>;

    /// Whether the local copy differs from the remote file by size or
    /// second-granularity modification time. Both files must exist;
    /// a missing side fails with a not-found error.
    fn needs_sync(&mut self, remote_path: &str, local_path: &Path) -> Result<bool>;

    /// Create a remote directory, including missing parents
    fn create_directory(&mut self, path: &str) -> Result<()>;

    /// Upload one file, resuming a partial remote copy where the protocol
    /// allows it
    fn upload_file(
        &mut self,
        local_path: &Path,
        remote_path: &str,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<TransferOutcome>;

    /// Download one file, resuming a partial local copy where the protocol
    /// allows it.
    ///
    /// With `compare_timestamps` set, a size-complete local copy whose
    /// modification time drifted from the remote one is re-aligned;
    /// without it, equal sizes are accepted as-is.
    fn download_file(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        compare_timestamps: bool,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<TransferOutcome>;

    /// Delete a remote file, or a remote directory with everything in it
    fn remove_file_or_directory(&mut self, path: &str) -> Result<()>;

    /// Mirror a local directory tree to the remote side. The progress
    /// callback is shared by the per-file transfers.
    fn upload_directory(
        &mut self,
        local_dir: &Path,
        remote_dir: &str,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<SyncSummary> {
        self.create_directory(remote_dir)?;
        let mut summary = SyncSummary::default();
        // `&mut` is invariant over the trait object's lifetime, so the
        // callback cannot be reborrowed for each iteration directly; forward
        // through a fresh closure instead.
        let has_progress = progress.is_some();
        let mut forward = |sent: u64| {
            if let Some(cb) = progress.as_mut() {
                cb(sent);
            }
        };
        for entry in WalkDir::new(local_dir).min_depth(1) {
            let entry = entry.map_err(|e| {
                FtpSyncError::listing(local_dir.display().to_string(), e.to_string())
            })?;
            let relative = entry
                .path()
                .strip_prefix(local_dir)
                .map_err(|_| FtpSyncError::InvalidPath(entry.path().display().to_string()))?;
            let remote_path = join_remote(remote_dir, &to_remote_relative(relative)?);
            if entry.file_type().is_dir() {
                self.create_directory(&remote_path)?;
            } else if entry.file_type().is_file() {
                let progress_ref: Option<ProgressFn<'_>> = if has_progress {
                    Some(&mut forward)
                } else {
                    None
                };
                let outcome = self.upload_file(entry.path(), &remote_path, progress_ref)?;
                summary.record(&outcome);
            }
        }
        debug!(local = %local_dir.display(), remote = %remote_dir, %summary, "upload mirror done");
        Ok(summary)
    }

    /// Mirror a remote directory tree to the local side
    fn download_directory(
        &mut self,
        remote_dir: &str,
        local_dir: &Path,
        compare_timestamps: bool,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<SyncSummary> {
        fs::create_dir_all(local_dir).with_path(local_dir)?;
        let mut summary = SyncSummary::default();
        // Same reborrow workaround as in `upload_directory`.
        let has_progress = progress.is_some();
        let mut forward = |sent: u64| {
            if let Some(cb) = progress.as_mut() {
                cb(sent);
            }
        };
        for entry in self.list(Some(remote_dir), None)? {
            let target = local_dir.join(&entry.name);
            if entry.is_directory {
                let progress_ref: Option<ProgressFn<'_>> = if has_progress {
                    Some(&mut forward)
                } else {
                    None
                };
                summary.merge(self.download_directory(
                    &entry.absolute_path,
                    &target,
                    compare_timestamps,
                    progress_ref,
                )?);
            } else {
                let progress_ref: Option<ProgressFn<'_>> = if has_progress {
                    Some(&mut forward)
                } else {
                    None
                };
                let outcome = self.download_file(
                    &entry.absolute_path,
                    &target,
                    compare_timestamps,
                    progress_ref,
                )?;
                summary.record(&outcome);
            }
        }
        debug!(remote = %remote_dir, local = %local_dir.display(), %summary, "download mirror done");
        Ok(summary)
    }
}

/// List a directory through its canonical absolute path.
///
/// Changes into the directory to let the server canonicalize it, lists,
/// then restores the original working directory even when the listing
/// fails.
pub(crate) fn canonical_list<T>(
    transport: &mut T,
    path: Option<&str>,
    filter: Option<&dyn NamePredicate>,
) -> Result<Vec<RemoteEntry>>
where
    T: TransportHandle + ?Sized,
{
    let original = transport.working_directory()?;
    let canonical = match path {
        Some(p) => {
            transport.change_directory(p)?;
            transport.working_directory()?
        }
        None => original.clone(),
    };
    let raw = transport.list(&canonical);
    if canonical != original {
        transport.change_directory(&original)?;
    }
    let raw = raw?;

    Ok(raw
        .into_iter()
        .filter(|e| !RemoteEntry::is_self_or_parent(&e.name))
        .filter(|e| e.is_directory || filter.map_or(true, |f| f.accept(&e.name)))
        .map(|e| RemoteEntry::from_raw(e, &canonical))
        .collect())
}

/// Directory existence probe via a change-directory round trip.
///
/// The working directory is restored on success; a not-found reply means
/// "no" rather than an error.
pub(crate) fn probe_directory<T>(transport: &mut T, path: &str) -> Result<bool>
where
    T: TransportHandle + ?Sized,
{
    let original = transport.working_directory()?;
    match transport.change_directory(path) {
        Ok(()) => {
            transport.change_directory(&original)?;
            Ok(true)
        }
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Depth-first recursive removal of a file or directory tree
pub(crate) fn remove_recursive<T>(transport: &mut T, remote_path: &str) -> Result<()>
where
    T: TransportHandle + ?Sized,
{
    if transport.stat_file(remote_path)?.is_some() {
        return transport.delete_file(remote_path);
    }
    let entries = transport.list(remote_path)?;
    for entry in entries {
        if RemoteEntry::is_self_or_parent(&entry.name) {
            continue;
        }
        let child = join_remote(remote_path, &entry.name);
        if entry.is_directory {
            remove_recursive(transport, &child)?;
        } else {
            transport.delete_file(&child)?;
        }
    }
    transport.remove_directory(remote_path)
}

/// Shared change-detection rule: sizes first, then whole-second timestamps.
/// Both files must exist; a missing side is a not-found error, not "differs".
pub(crate) fn needs_sync_with<T>(
    transport: &mut T,
    remote_path: &str,
    local_path: &Path,
) -> Result<bool>
where
    T: TransportHandle + ?Sized,
{
    let stat = transport
        .stat_file(remote_path)?
        .ok_or_else(|| FtpSyncError::not_found(remote_path))?;

    let meta = fs::metadata(local_path).with_path(local_path)?;
    if stat.size != meta.len() {
        return Ok(true);
    }

    // Listing timestamps can be coarse; ask for the precise one.
    let remote_mtime = transport.modification_time(remote_path)?;
    let local_mtime = local_modified(&meta, local_path)?;
    Ok(remote_mtime.timestamp() != local_mtime.timestamp())
}

/// Size of a local file, `None` when it does not exist
pub(crate) fn local_size(path: &Path) -> Result<Option<u64>> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
        Ok(_) => Err(FtpSyncError::InvalidPath(path.display().to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FtpSyncError::io(path, e)),
    }
}

/// Modification time of local metadata as UTC
pub(crate) fn local_modified(meta: &fs::Metadata, path: &Path) -> Result<DateTime<Utc>> {
    let system = meta.modified().with_path(path)?;
    Ok(DateTime::<Utc>::from(system))
}

/// Stamp a local file's modification time, whole seconds
pub(crate) fn stamp_local_mtime(path: &Path, mtime: DateTime<Utc>) -> Result<()> {
    let ft = FileTime::from_unix_time(mtime.timestamp(), 0);
    filetime::set_file_mtime(path, ft).with_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use std::io::Write as _;

    #[test]
    fn test_probe_directory_restores_cwd() {
        let mut remote = MemoryTransport::new();
        remote.add_directory("/data/in");
        remote.change_directory("/data").unwrap();

        assert!(probe_directory(&mut remote, "/data/in").unwrap());
        assert_eq!(remote.working_directory().unwrap(), "/data");
        assert!(!probe_directory(&mut remote, "/data/out").unwrap());
        assert_eq!(remote.working_directory().unwrap(), "/data");
    }

    #[test]
    fn test_canonical_list_skips_dot_entries_and_filters_files_only() {
        let mut remote = MemoryTransport::new();
        remote.add_file("/dir/a.csv", b"a", 0);
        remote.add_file("/dir/b.txt", b"b", 0);
        remote.add_directory("/dir/sub");

        let filter = crate::filter::NameSuffixFilter::new(".csv");
        let entries = canonical_list(&mut remote, Some("/dir"), Some(&filter)).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        // b.txt is filtered out; the sub directory always passes.
        assert_eq!(names, vec!["a.csv", "sub"]);
        assert_eq!(entries[0].absolute_path, "/dir/a.csv");
        assert_eq!(remote.working_directory().unwrap(), "/");
    }

    #[test]
    fn test_canonical_list_restores_cwd_on_failure() {
        let mut remote = MemoryTransport::new();
        remote.add_directory("/data");
        remote.change_directory("/data").unwrap();

        let err = canonical_list(&mut remote, Some("/missing"), None).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(remote.working_directory().unwrap(), "/data");
    }

    #[test]
    fn test_remove_recursive() {
        let mut remote = MemoryTransport::new();
        remote.add_file("/tree/a/file1", b"1", 0);
        remote.add_file("/tree/a/b/file2", b"2", 0);
        remote.add_file("/tree/top", b"3", 0);

        remove_recursive(&mut remote, "/tree").unwrap();
        assert!(!remote.has_path("/tree"));
    }

    #[test]
    fn test_remove_recursive_single_file() {
        let mut remote = MemoryTransport::new();
        remote.add_file("/dir/only.txt", b"x", 0);

        remove_recursive(&mut remote, "/dir/only.txt").unwrap();
        assert!(!remote.has_path("/dir/only.txt"));
        assert!(remote.has_directory("/dir"));
    }

    #[test]
    fn test_needs_sync_cases() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("f.bin");

        let mut remote = MemoryTransport::new();
        remote.add_file("/f.bin", b"hello", 1_700_000_000);

        // A missing local file is not-found, not "differs".
        let err = needs_sync_with(&mut remote, "/f.bin", &local).unwrap_err();
        assert!(err.is_not_found());

        // Same size and timestamp: in sync.
        {
            let mut f = std::fs::File::create(&local).unwrap();
            f.write_all(b"hello").unwrap();
        }
        stamp_local_mtime(&local, DateTime::from_timestamp(1_700_000_000, 0).unwrap()).unwrap();
        assert!(!needs_sync_with(&mut remote, "/f.bin", &local).unwrap());

        // Timestamp drift alone forces a sync.
        stamp_local_mtime(&local, DateTime::from_timestamp(1_700_000_111, 0).unwrap()).unwrap();
        assert!(needs_sync_with(&mut remote, "/f.bin", &local).unwrap());

        // Missing remote file is an error, not "in sync".
        let err = needs_sync_with(&mut remote, "/missing", &local).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_sync_summary_display() {
        let summary = SyncSummary {
            files_transferred: 2,
            files_skipped: 1,
            bytes_transferred: 2048,
        };
        assert_eq!(summary.to_string(), "2 KiB transferred (2 files, 1 skipped)");
    }

    #[test]
    fn test_sync_summary_record() {
        let mut summary = SyncSummary::default();
        summary.record(&TransferOutcome::Transferred {
            bytes: 100,
            resumed_from: 0,
        });
        summary.record(&TransferOutcome::AlreadyUpToDate);
        summary.record(&TransferOutcome::EmptySource);
        assert_eq!(summary.files_transferred, 1);
        assert_eq!(summary.files_skipped, 2);
        assert_eq!(summary.bytes_transferred, 100);
    }
}
