//! Path mapping for a chrooted server (§4.10 "Path mapping"): every
//! inbound path is POSIX-normalized and confined to the configured
//! root; every outbound path (`REALPATH`, `READLINK`) is reverse-mapped
//! back to the client's view.

use std::path::{Path, PathBuf};

use crate::error::{Result, SftpError};

/// Collapses `.`/`..` components of a POSIX-style virtual path without
/// touching the filesystem, refusing to climb above the virtual root.
/// Returns the normalized path with a leading `/` and no trailing slash
/// (except for the root itself, `"/"`).
pub fn normalize_virtual(path: &str) -> Option<String> {
    let mut stack: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                stack.pop()?;
            }
            other => stack.push(other),
        }
    }
    Some(format!("/{}", stack.join("/")))
}

/// As [`normalize_virtual`], but never fails: a `..` that would climb
/// above the root is simply dropped. REALPATH's contract (§4.10,
/// property 17) is to always hand back a canonical absolute path, never
/// an error, so over-eager `..` sequences clamp to `/` instead of
/// rejecting the request the way an actual file operation would.
pub fn normalize_virtual_clamped(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    format!("/{}", stack.join("/"))
}

pub struct ChrootMapper {
    root: PathBuf,
}

impl ChrootMapper {
    pub fn new(root: PathBuf) -> Self {
        ChrootMapper { root }
    }

    /// Virtual path (as the client sees it, always `/`-rooted) → real
    /// filesystem path under `root`.
    pub fn map_in(&self, virtual_path: &str) -> Result<PathBuf> {
        let normalized = normalize_virtual(virtual_path).ok_or_else(|| SftpError::from_status(
            sftp_proto::StatusCode::NoSuchFile,
            "path escapes chroot".into(),
        ))?;
        Ok(self.root.join(normalized.trim_start_matches('/')))
    }

    /// Real filesystem path → virtual path, erroring if it's outside the
    /// configured root (§4.10: "errors with SFTPNoSuchFile if outside").
    pub fn map_out(&self, real_path: &Path) -> Result<String> {
        let stripped = real_path.strip_prefix(&self.root).map_err(|_| {
            SftpError::from_status(sftp_proto::StatusCode::NoSuchFile, "path escapes chroot".into())
        })?;
        let s = stripped.to_string_lossy().replace('\\', "/");
        if s.is_empty() {
            Ok("/".to_string())
        } else {
            Ok(format!("/{s}"))
        }
    }

    /// REALPATH's canonicalization step (§4.10): clamp rather than
    /// reject a path that climbs above the root, then map it in as
    /// usual. Never returns an escaping path.
    pub fn map_in_for_realpath(&self, virtual_path: &str) -> PathBuf {
        let normalized = normalize_virtual_clamped(virtual_path);
        self.root.join(normalized.trim_start_matches('/'))
    }

    /// Whether an absolute symlink target, rewritten relative to the
    /// chroot, would still resolve inside it (§4.10: "Symlink creation
    /// preserves the symbolic target unchanged if it was absolute,
    /// otherwise is rewritten to stay inside the chroot iff the link
    /// would otherwise escape").
    pub fn confine_symlink_target(&self, target: &str, link_real_parent: &Path) -> String {
        if target.starts_with('/') {
            return target.to_string();
        }
        let resolved = link_real_parent.join(target);
        match self.map_out(&resolved) {
            Ok(_) => target.to_string(),
            Err(_) => {
                // Would escape: rewrite as the virtual absolute path the
                // target resolves to from the chroot root instead.
                normalize_virtual(target).unwrap_or_else(|| "/".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dot_and_dotdot() {
        assert_eq!(normalize_virtual("/a/./b/../c"), Some("/a/c".to_string()));
        assert_eq!(normalize_virtual("a/b"), Some("/a/b".to_string()));
    }

    #[test]
    fn normalize_rejects_escaping_dotdot() {
        assert_eq!(normalize_virtual("/../etc/passwd"), None);
        assert_eq!(normalize_virtual("../.."), None);
    }

    #[test]
    fn map_in_joins_under_root() {
        let mapper = ChrootMapper::new(PathBuf::from("/srv/sftp"));
        assert_eq!(mapper.map_in("/a/b").unwrap(), PathBuf::from("/srv/sftp/a/b"));
    }

    #[test]
    fn map_out_rejects_outside_root() {
        let mapper = ChrootMapper::new(PathBuf::from("/srv/sftp"));
        assert!(mapper.map_out(Path::new("/etc/passwd")).is_err());
        assert_eq!(mapper.map_out(Path::new("/srv/sftp/a")).unwrap(), "/a");
    }

    #[test]
    fn realpath_clamps_rather_than_rejects() {
        let mapper = ChrootMapper::new(PathBuf::from("/srv/sftp"));
        assert_eq!(mapper.map_in_for_realpath("../.."), PathBuf::from("/srv/sftp"));
        assert_eq!(mapper.map_in_for_realpath("/a/../../b"), PathBuf::from("/srv/sftp/b"));
    }
}
