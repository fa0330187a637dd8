//! Helpers shared by unit tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Install an executable file at `dir/name`.
///
/// The file is written and closed under a staging name and then renamed, so
/// no writable descriptor for the final path exists when it is executed.
pub fn executable(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    let staging = dir.join(format!(".{name}.partial"));
    std::fs::write(&staging, contents).unwrap();
    std::fs::set_permissions(&staging, std::fs::Permissions::from_mode(0o755)).unwrap();
    std::fs::rename(&staging, &path).unwrap();
    path
}

/// Install an `sh` script running `body` at `dir/name`.
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    executable(dir, name, &format!("#!/bin/sh\n{body}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_is_executable_and_unstaged() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "tool", "exit 0");

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(!dir.path().join(".tool.partial").exists());
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("#!/bin/sh\n"));
    }
}
