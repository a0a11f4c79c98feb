//! In-memory transport
//!
//! A deterministic [`TransportHandle`] over an in-memory directory tree,
//! used by the test suite and usable as a stand-in remote in examples.
//! Listings include the `.`/`..` pseudo-entries the way an FTP server's do,
//! and every read-stream open is recorded with its offset so resume
//! behavior can be asserted on.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use super::{RemoteStat, TransportEntry, TransportHandle, TransportStatus};
use crate::error::{FtpSyncError, Result};

#[derive(Debug, Clone)]
enum Node {
    File { data: Vec<u8>, mtime: i64 },
    Dir(BTreeMap<String, Node>),
}

/// In-memory implementation of [`TransportHandle`]
pub struct MemoryTransport {
    root: Node,
    cwd: String,
    connected: bool,
    last_status: Option<TransportStatus>,
    read_opens: Vec<(String, u64)>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Create an empty tree rooted at `/`
    pub fn new() -> Self {
        Self {
            root: Node::Dir(BTreeMap::new()),
            cwd: "/".to_string(),
            connected: true,
            last_status: None,
            read_opens: Vec::new(),
        }
    }

    /// Create a directory and any missing parents (test setup helper)
    pub fn add_directory(&mut self, path: &str) {
        let segments = self.resolve(path);
        let mut current = &mut self.root;
        for segment in &segments {
            let Node::Dir(children) = current else {
                return;
            };
            current = children
                .entry(segment.clone())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
        }
    }

    /// Create a file with the given contents and mtime, creating missing
    /// parent directories (test setup helper)
    pub fn add_file(&mut self, path: &str, data: &[u8], mtime: i64) {
        let segments = self.resolve(path);
        let Some((name, parents)) = segments.split_last() else {
            return;
        };
        let mut current = &mut self.root;
        for segment in parents {
            let Node::Dir(children) = current else {
                return;
            };
            current = children
                .entry(segment.clone())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
        }
        if let Node::Dir(children) = current {
            children.insert(
                name.clone(),
                Node::File {
                    data: data.to_vec(),
                    mtime,
                },
            );
        }
    }

    /// Contents of a file, if it exists
    pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
        match self.node(path)? {
            Node::File { data, .. } => Some(data.clone()),
            Node::Dir(_) => None,
        }
    }

    /// Modification time of a file, if it exists
    pub fn file_mtime(&self, path: &str) -> Option<i64> {
        match self.node(path)? {
            Node::File { mtime, .. } => Some(*mtime),
            Node::Dir(_) => None,
        }
    }

    /// Whether a path exists as a directory
    pub fn has_directory(&self, path: &str) -> bool {
        matches!(self.node(path), Some(Node::Dir(_)))
    }

    /// Whether a path exists at all
    pub fn has_path(&self, path: &str) -> bool {
        self.node(path).is_some()
    }

    /// Every `(path, offset)` pair passed to `open_read_stream`
    pub fn read_opens(&self) -> &[(String, u64)] {
        &self.read_opens
    }

    fn resolve(&self, path: &str) -> Vec<String> {
        let mut segments: Vec<String> = if path.starts_with('/') {
            Vec::new()
        } else {
            self.cwd
                .split('/')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        };
        for part in path.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other.to_string()),
            }
        }
        segments
    }

    fn canonical(&self, path: &str) -> String {
        let segments = self.resolve(path);
        format!("/{}", segments.join("/"))
    }

    fn node(&self, path: &str) -> Option<&Node> {
        let segments = self.resolve(path);
        let mut current = &self.root;
        for segment in &segments {
            match current {
                Node::Dir(children) => current = children.get(segment)?,
                Node::File { .. } => return None,
            }
        }
        Some(current)
    }

    fn node_mut(&mut self, path: &str) -> Option<&mut Node> {
        let segments = self.resolve(path);
        let mut current = &mut self.root;
        for segment in &segments {
            match current {
                Node::Dir(children) => current = children.get_mut(segment)?,
                Node::File { .. } => return None,
            }
        }
        Some(current)
    }

    /// Parent directory map and final name for a path
    fn parent_mut(&mut self, path: &str) -> Option<(&mut BTreeMap<String, Node>, String)> {
        let segments = self.resolve(path);
        let (name, parents) = segments.split_last()?;
        let mut current = &mut self.root;
        for segment in parents {
            match current {
                Node::Dir(children) => current = children.get_mut(segment)?,
                Node::File { .. } => return None,
            }
        }
        match current {
            Node::Dir(children) => Some((children, name.clone())),
            Node::File { .. } => None,
        }
    }

    fn not_found(&mut self, path: &str) -> FtpSyncError {
        self.last_status = Some(TransportStatus::NotFound);
        FtpSyncError::not_found(path)
    }
}

struct NodeWriter<'a> {
    data: &'a mut Vec<u8>,
}

impl Write for NodeWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl TransportHandle for MemoryTransport {
    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn working_directory(&mut self) -> Result<String> {
        Ok(self.cwd.clone())
    }

    fn change_directory(&mut self, path: &str) -> Result<()> {
        self.last_status = None;
        match self.node(path) {
            Some(Node::Dir(_)) => {
                self.cwd = self.canonical(path);
                Ok(())
            }
            _ => Err(self.not_found(path)),
        }
    }

    fn list(&mut self, path: &str) -> Result<Vec<TransportEntry>> {
        self.last_status = None;
        let Some(Node::Dir(children)) = self.node(path) else {
            return Err(self.not_found(path));
        };

        let pseudo = |name: &str| TransportEntry {
            name: name.to_string(),
            size: 0,
            modified: DateTime::<Utc>::default(),
            is_directory: true,
        };
        let mut entries = vec![pseudo("."), pseudo("..")];
        for (name, node) in children {
            entries.push(match node {
                Node::File { data, mtime } => TransportEntry {
                    name: name.clone(),
                    size: data.len() as u64,
                    modified: DateTime::from_timestamp(*mtime, 0).unwrap_or_default(),
                    is_directory: false,
                },
                Node::Dir(_) => TransportEntry {
                    name: name.clone(),
                    size: 0,
                    modified: DateTime::<Utc>::default(),
                    is_directory: true,
                },
            });
        }
        Ok(entries)
    }

    fn stat_file(&mut self, path: &str) -> Result<Option<RemoteStat>> {
        self.last_status = None;
        match self.node(path) {
            Some(Node::File { data, mtime }) => Ok(Some(RemoteStat {
                size: data.len() as u64,
                modified: DateTime::from_timestamp(*mtime, 0).unwrap_or_default(),
            })),
            Some(Node::Dir(_)) => Ok(None),
            None => {
                self.last_status = Some(TransportStatus::NotFound);
                Ok(None)
            }
        }
    }

    fn open_read_stream(&mut self, path: &str, offset: u64) -> Result<Box<dyn Read + '_>> {
        self.last_status = None;
        let canonical = self.canonical(path);
        let Some(Node::File { data, .. }) = self.node(path) else {
            return Err(self.not_found(path));
        };
        if offset > data.len() as u64 {
            return Err(FtpSyncError::transfer(
                path,
                format!("offset {} beyond end of file ({} B)", offset, data.len()),
            ));
        }
        let remainder = data[offset as usize..].to_vec();
        self.read_opens.push((canonical, offset));
        Ok(Box::new(Cursor::new(remainder)))
    }

    fn open_write_stream(
        &mut self,
        path: &str,
        offset: u64,
        append: bool,
    ) -> Result<Box<dyn Write + '_>> {
        self.last_status = None;
        // Probe before taking the long-lived borrow the stream hangs on to,
        // so the failure paths are free to record status.
        if self.parent_mut(path).is_none() {
            return Err(self.not_found(path));
        }
        if matches!(self.node(path), Some(Node::Dir(_))) {
            return Err(FtpSyncError::transfer(path, "path is a directory"));
        }
        let Some((children, name)) = self.parent_mut(path) else {
            return Err(FtpSyncError::not_found(path));
        };
        let node = children.entry(name).or_insert_with(|| Node::File {
            data: Vec::new(),
            mtime: 0,
        });
        let Node::File { data, .. } = node else {
            return Err(FtpSyncError::transfer(path, "path is a directory"));
        };
        // Append continues at the current end; otherwise the file is cut
        // back to the offset before writing, as REST before STOR would.
        if !append {
            data.truncate(offset as usize);
        }
        Ok(Box::new(NodeWriter { data }))
    }

    fn finalize_transfer(&mut self) -> Result<()> {
        Ok(())
    }

    fn make_directory(&mut self, path: &str) -> Result<()> {
        self.last_status = None;
        let Some((children, name)) = self.parent_mut(path) else {
            return Err(self.not_found(path));
        };
        match children.get(&name) {
            Some(Node::File { .. }) => Err(FtpSyncError::ProtocolStatus {
                path: path.to_string(),
                status: TransportStatus::Other,
                detail: "a file with that name exists".to_string(),
            }),
            Some(Node::Dir(_)) => Ok(()),
            None => {
                children.insert(name, Node::Dir(BTreeMap::new()));
                Ok(())
            }
        }
    }

    fn remove_directory(&mut self, path: &str) -> Result<()> {
        self.last_status = None;
        match self.node(path) {
            Some(Node::Dir(children)) if children.is_empty() => {}
            Some(Node::Dir(_)) => {
                return Err(FtpSyncError::ProtocolStatus {
                    path: path.to_string(),
                    status: TransportStatus::Other,
                    detail: "directory not empty".to_string(),
                })
            }
            _ => return Err(self.not_found(path)),
        }
        if let Some((children, name)) = self.parent_mut(path) {
            children.remove(&name);
        }
        Ok(())
    }

    fn delete_file(&mut self, path: &str) -> Result<()> {
        self.last_status = None;
        match self.node(path) {
            Some(Node::File { .. }) => {}
            _ => return Err(self.not_found(path)),
        }
        if let Some((children, name)) = self.parent_mut(path) {
            children.remove(&name);
        }
        Ok(())
    }

    fn modification_time(&mut self, path: &str) -> Result<DateTime<Utc>> {
        self.last_status = None;
        match self.node(path) {
            Some(Node::File { mtime, .. }) => {
                Ok(DateTime::from_timestamp(*mtime, 0).unwrap_or_default())
            }
            _ => Err(self.not_found(path)),
        }
    }

    fn set_modification_time(&mut self, path: &str, mtime: DateTime<Utc>) -> Result<()> {
        self.last_status = None;
        let seconds = mtime.timestamp();
        match self.node_mut(path) {
            Some(Node::File { mtime: slot, .. }) => {
                *slot = seconds;
                Ok(())
            }
            _ => Err(self.not_found(path)),
        }
    }

    fn last_status(&self) -> Option<TransportStatus> {
        self.last_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_setup_and_stat() {
        let mut remote = MemoryTransport::new();
        remote.add_file("/data/in/report.csv", b"a,b,c\n", 1_700_000_000);

        let stat = remote.stat_file("/data/in/report.csv").unwrap().unwrap();
        assert_eq!(stat.size, 6);
        assert_eq!(stat.modified.timestamp(), 1_700_000_000);
        assert!(remote.stat_file("/data/in").unwrap().is_none());
        assert!(remote.stat_file("/data/missing").unwrap().is_none());
        assert_eq!(remote.last_status(), Some(TransportStatus::NotFound));
    }

    #[test]
    fn test_listing_includes_pseudo_entries() {
        let mut remote = MemoryTransport::new();
        remote.add_file("/dir/a.txt", b"a", 0);
        remote.add_directory("/dir/sub");

        let entries = remote.list("/dir").unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".", "..", "a.txt", "sub"]);
    }

    #[test]
    fn test_read_stream_records_offset() {
        let mut remote = MemoryTransport::new();
        remote.add_file("/f.bin", b"0123456789", 0);

        let mut out = Vec::new();
        {
            let mut stream = remote.open_read_stream("/f.bin", 4).unwrap();
            stream.read_to_end(&mut out).unwrap();
        }
        assert_eq!(out, b"456789");
        assert_eq!(remote.read_opens(), &[("/f.bin".to_string(), 4)]);
    }

    #[test]
    fn test_write_stream_append_and_truncate() {
        let mut remote = MemoryTransport::new();
        remote.add_file("/f.bin", b"01234", 0);

        {
            let mut stream = remote.open_write_stream("/f.bin", 5, true).unwrap();
            stream.write_all(b"56789").unwrap();
        }
        assert_eq!(remote.file_contents("/f.bin").unwrap(), b"0123456789");

        {
            let mut stream = remote.open_write_stream("/f.bin", 0, false).unwrap();
            stream.write_all(b"new").unwrap();
        }
        assert_eq!(remote.file_contents("/f.bin").unwrap(), b"new");
    }

    #[test]
    fn test_change_directory_and_relative_paths() {
        let mut remote = MemoryTransport::new();
        remote.add_file("/a/b/c.txt", b"x", 0);

        remote.change_directory("/a").unwrap();
        assert_eq!(remote.working_directory().unwrap(), "/a");
        assert!(remote.stat_file("b/c.txt").unwrap().is_some());

        let err = remote.change_directory("/a/b/c.txt").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(remote.last_status(), Some(TransportStatus::NotFound));
        assert_eq!(remote.working_directory().unwrap(), "/a");
    }

    #[test]
    fn test_make_directory_requires_parent() {
        let mut remote = MemoryTransport::new();
        let err = remote.make_directory("/deep/nested").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(remote.last_status(), Some(TransportStatus::NotFound));

        remote.make_directory("/deep").unwrap();
        remote.make_directory("/deep/nested").unwrap();
        assert!(remote.has_directory("/deep/nested"));
    }
}
