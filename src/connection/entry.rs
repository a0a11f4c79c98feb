//! Remote directory entries as seen by callers

use chrono::{DateTime, Utc};

use super::path::join_remote;
use crate::transport::TransportEntry;

/// One entry of a remote directory listing.
///
/// Unlike the raw transport record this carries the absolute path of the
/// entry, formed from the canonical directory it was listed in, so callers
/// never have to track which directory a name came from.
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    /// Entry name within its directory
    pub name: String,
    /// Size in bytes (0 for directories on transports that report none)
    pub size: u64,
    /// Absolute remote path of the entry
    pub absolute_path: String,
    /// Last modification time, second precision
    pub last_modified: DateTime<Utc>,
    /// Whether the entry is a directory
    pub is_directory: bool,
}

impl RemoteEntry {
    /// Whether a raw name is one of the `.`/`..` pseudo-entries some
    /// servers include in listings
    pub fn is_self_or_parent(name: &str) -> bool {
        name == "." || name == ".."
    }

    pub(crate) fn from_raw(raw: TransportEntry, directory: &str) -> Self {
        let absolute_path = join_remote(directory, &raw.name);
        Self {
            name: raw.name,
            size: raw.size,
            absolute_path,
            last_modified: raw.modified,
            is_directory: raw.is_directory,
        }
    }
}
