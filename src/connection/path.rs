//! Remote path helpers
//!
//! Remote paths are forward-slash strings regardless of the local platform;
//! these helpers keep the joining and splitting rules in one place.

use std::path::Path;

use crate::error::{FtpSyncError, Result};

/// Last segment of a remote path
pub fn base_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

/// Join a directory and an entry name with a single separator
pub fn join_remote(dir: &str, name: &str) -> String {
    let trimmed = dir.trim_end_matches('/');
    if trimmed.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", trimmed, name)
    }
}

/// Parent directory of a remote path, if it has one
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&trimmed[..idx]),
        None => None,
    }
}

/// Express a relative local path as a forward-slash remote path fragment.
///
/// Only plain name components are allowed; anything else (`..`, absolute
/// prefixes) is rejected.
pub fn to_remote_relative(path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            std::path::Component::Normal(part) => {
                parts.push(part.to_string_lossy().into_owned())
            }
            std::path::Component::CurDir => {}
            _ => {
                return Err(FtpSyncError::InvalidPath(
                    path.display().to_string(),
                ))
            }
        }
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("/outgoing/report.csv"), "report.csv");
        assert_eq!(base_name("/outgoing/"), "outgoing");
        assert_eq!(base_name("report.csv"), "report.csv");
    }

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote("/data", "a.txt"), "/data/a.txt");
        assert_eq!(join_remote("/data/", "a.txt"), "/data/a.txt");
        assert_eq!(join_remote("/", "a.txt"), "/a.txt");
        assert_eq!(join_remote("rel", "a.txt"), "rel/a.txt");
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("/data/in/report.csv"), Some("/data/in"));
        assert_eq!(parent("/data"), Some("/"));
        assert_eq!(parent("report.csv"), None);
    }

    #[test]
    fn test_to_remote_relative() {
        let path = PathBuf::from("a").join("b").join("c.txt");
        assert_eq!(to_remote_relative(&path).unwrap(), "a/b/c.txt");
        assert!(to_remote_relative(&PathBuf::from("../up")).is_err());
    }
}
