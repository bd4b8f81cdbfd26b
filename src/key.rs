//! Session identity keys
//!
//! A capture session and its IPC objects are identified by the filesystem
//! path of the pseudo-terminal device being captured. Reader processes
//! derive the same names from the same path with no extra coordination:
//! `/dev/pts/5` becomes the shared memory object `/ttymirror.dev.pts.5`
//! and the message queues `/ttymirror.dev.pts.5.updated` and
//! `/ttymirror.dev.pts.5.input`.

use std::ffi::CString;
use std::path::Path;

use crate::error::{MirrorError, Result};
use crate::APP_NAME;

/// Identity of one capture session, derived from the PTY device path.
///
/// POSIX named objects want a single path component starting with `/`,
/// so the device path is flattened: the leading slash is dropped and the
/// remaining separators become dots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    stem: String,
}

impl SessionKey {
    /// Derives the key from a PTY device path.
    ///
    /// Fails if the path is empty or contains characters a POSIX object
    /// name cannot carry (interior NUL).
    pub fn from_pty_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = path.as_ref().to_string_lossy();
        let flattened = text.trim_start_matches('/').replace('/', ".");
        if flattened.is_empty() {
            return Err(MirrorError::Resource(
                "cannot derive a session key from an empty PTY path".into(),
            ));
        }
        let stem = format!("/{}.{}", APP_NAME, flattened);
        if stem.len() > 200 {
            return Err(MirrorError::Resource(format!(
                "PTY path too long for an IPC object name: {}",
                text
            )));
        }
        Ok(SessionKey { stem })
    }

    /// Name of the shared memory object holding the screen segment.
    pub fn segment_name(&self) -> &str {
        &self.stem
    }

    /// Name of the message queue carrying one message kind.
    pub fn queue_name(&self, suffix: &str) -> String {
        format!("{}.{}", self.stem, suffix)
    }

    /// Queue name as a `CString` for the mq_* calls.
    pub fn queue_cname(&self, suffix: &str) -> Result<CString> {
        CString::new(self.queue_name(suffix))
            .map_err(|_| MirrorError::Resource("queue name contains NUL".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_pts_path() {
        let key = SessionKey::from_pty_path("/dev/pts/5").unwrap();
        assert_eq!(key.segment_name(), "/ttymirror.dev.pts.5");
        assert_eq!(key.queue_name("updated"), "/ttymirror.dev.pts.5.updated");
        assert_eq!(key.queue_name("input"), "/ttymirror.dev.pts.5.input");
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = SessionKey::from_pty_path("/dev/pts/12").unwrap();
        let b = SessionKey::from_pty_path("/dev/pts/12").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_ptys_get_distinct_keys() {
        let a = SessionKey::from_pty_path("/dev/pts/1").unwrap();
        let b = SessionKey::from_pty_path("/dev/pts/2").unwrap();
        assert_ne!(a.segment_name(), b.segment_name());
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(SessionKey::from_pty_path("").is_err());
        assert!(SessionKey::from_pty_path("/").is_err());
    }
}
