//! Temporary session directory.
//!
//! Holds the generated `xorg.conf`, the Xorg log and the agent sockets. Every
//! tracked file and the directory itself are removed on cleanup, which also
//! runs on drop so early returns and panics leave nothing behind.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// A temporary directory plus the files to remove with it.
#[derive(Debug)]
pub struct Session {
    dir: Option<TempDir>,
    path: PathBuf,
    tracked: Vec<PathBuf>,
}

impl Session {
    /// Create `<tmp>/<prefix>XXXXXX`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionCreate`] if the directory cannot be made.
    pub fn create(prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .map_err(|source| Error::SessionCreate {
                prefix: prefix.to_string(),
                source,
            })?;
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "created session directory");
        Ok(Self {
            dir: Some(dir),
            path,
            tracked: Vec::new(),
        })
    }

    /// The session directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.path
    }

    /// A path named `name` inside the session directory.
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Register a file for removal at cleanup. The file may live anywhere.
    pub fn track(&mut self, file: impl Into<PathBuf>) {
        let file = file.into();
        if !self.tracked.contains(&file) {
            self.tracked.push(file);
        }
    }

    /// Files registered for removal.
    #[must_use]
    pub fn tracked(&self) -> &[PathBuf] {
        &self.tracked
    }

    /// Write `contents` to `name` inside the session and track it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileWrite`] if the file cannot be written.
    pub fn write_file(&mut self, name: &str, contents: &str) -> Result<PathBuf> {
        let file = self.path(name);
        std::fs::write(&file, contents).map_err(|source| Error::FileWrite {
            path: file.clone(),
            source,
        })?;
        self.track(file.clone());
        Ok(file)
    }

    /// Remove tracked files, then the directory. Safe to call repeatedly.
    pub fn cleanup(&mut self) {
        for file in self.tracked.drain(..) {
            match std::fs::remove_file(&file) {
                Ok(()) => debug!(path = %file.display(), "removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %file.display(), error = %e, "failed to remove"),
            }
        }
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                warn!(path = %self.path.display(), error = %e, "failed to remove session directory");
            }
        }
    }

    /// Whether [`cleanup`](Self::cleanup) has already run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.dir.is_none()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Remove a stale socket or file left behind by a previous run.
///
/// # Errors
///
/// Returns the I/O error if an existing file cannot be removed.
pub fn remove_stale(file: &Path) -> Result<()> {
    match std::fs::remove_file(file) {
        Ok(()) => {
            debug!(path = %file.display(), "removed stale file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_uses_prefix() {
        let session = Session::create("Xspice-").unwrap();
        let name = session.dir().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Xspice-"));
        assert!(session.dir().is_dir());
    }

    #[test]
    fn test_path_is_inside() {
        let session = Session::create("Xspice-").unwrap();
        assert_eq!(session.path("xorg.conf").parent(), Some(session.dir()));
    }

    #[test]
    fn test_write_file_tracks() {
        let mut session = Session::create("Xspice-").unwrap();
        let file = session.write_file("xorg.conf", "Section").unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "Section");
        assert_eq!(session.tracked(), &[file]);
    }

    #[test]
    fn test_track_deduplicates() {
        let mut session = Session::create("Xspice-").unwrap();
        session.track(session.path("a"));
        session.track(session.path("a"));
        assert_eq!(session.tracked().len(), 1);
    }

    #[test]
    fn test_cleanup_removes_everything() {
        let outside = tempfile::tempdir().unwrap();
        let outside_file = outside.path().join("vdagent.udcs");
        std::fs::write(&outside_file, "").unwrap();

        let mut session = Session::create("Xspice-").unwrap();
        let dir = session.dir().to_path_buf();
        session.write_file("xorg.log", "log").unwrap();
        session.track(outside_file.clone());
        // Never created; must not be an error
        session.track(session.path("vdagent.virtio"));

        session.cleanup();
        assert!(!dir.exists());
        assert!(!outside_file.exists());
        assert!(session.is_closed());

        // Second call is a no-op
        session.cleanup();
    }

    #[test]
    fn test_drop_cleans_up() {
        let dir = {
            let mut session = Session::create("Xspice-").unwrap();
            session.write_file("xorg.conf", "x").unwrap();
            session.dir().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_remove_stale() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stale.sock");
        std::fs::write(&file, "").unwrap();

        remove_stale(&file).unwrap();
        assert!(!file.exists());
        // Missing file is fine
        remove_stale(&file).unwrap();
    }
}
