//! Linux-specific implementation for xspice
//!
//! This crate provides the few process-level primitives the launcher needs
//! that the standard library does not expose: delivering arbitrary signals to
//! child processes and reading the real user and group ids.

#![cfg(target_os = "linux")]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io;

/// Signals the launcher sends to its children or receives itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Polite termination request.
    Term,
    /// Interrupt, as from Ctrl-C.
    Int,
    /// Hangup.
    Hup,
}

impl Signal {
    fn as_raw(self) -> libc::c_int {
        match self {
            Self::Term => libc::SIGTERM,
            Self::Int => libc::SIGINT,
            Self::Hup => libc::SIGHUP,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Term => write!(f, "SIGTERM"),
            Self::Int => write!(f, "SIGINT"),
            Self::Hup => write!(f, "SIGHUP"),
        }
    }
}

/// Initialize Linux-specific components
///
/// # Errors
///
/// Returns an error if initialization fails
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    Ok(())
}

/// Get platform name
#[must_use]
pub fn platform_name() -> &'static str {
    "Linux"
}

fn to_pid(pid: u32) -> io::Result<libc::pid_t> {
    match libc::pid_t::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(raw),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid pid {pid}"),
        )),
    }
}

/// Send `signal` to the process `pid`.
///
/// # Errors
///
/// Returns the OS error if the signal could not be delivered, e.g. `ESRCH`
/// when the process no longer exists.
#[allow(unsafe_code)]
pub fn send_signal(pid: u32, signal: Signal) -> io::Result<()> {
    let raw = to_pid(pid)?;
    // SAFETY: kill(2) takes plain integers and touches no memory we own.
    let rc = unsafe { libc::kill(raw, signal.as_raw()) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Check whether a process with this pid exists and may be signalled.
#[must_use]
#[allow(unsafe_code)]
pub fn process_exists(pid: u32) -> bool {
    let Ok(raw) = to_pid(pid) else {
        return false;
    };
    // SAFETY: signal 0 performs the permission and existence check only.
    unsafe { libc::kill(raw, 0) == 0 }
}

/// Real user id of the calling process.
#[must_use]
#[allow(unsafe_code)]
pub fn real_uid() -> u32 {
    // SAFETY: getuid(2) always succeeds and has no side effects.
    unsafe { libc::getuid() }
}

/// Real group id of the calling process.
#[must_use]
#[allow(unsafe_code)]
pub fn real_gid() -> u32 {
    // SAFETY: getgid(2) always succeeds and has no side effects.
    unsafe { libc::getgid() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_platform_name() {
        assert_eq!(platform_name(), "Linux");
    }

    #[test]
    fn test_signal_display() {
        assert_eq!(Signal::Term.to_string(), "SIGTERM");
        assert_eq!(Signal::Int.to_string(), "SIGINT");
        assert_eq!(Signal::Hup.to_string(), "SIGHUP");
    }

    #[test]
    fn test_self_exists() {
        assert!(process_exists(std::process::id()));
    }

    #[test]
    fn test_zero_pid_rejected() {
        let err = send_signal(0, Signal::Term).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(!process_exists(0));
    }

    #[test]
    fn test_terminate_child() {
        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        send_signal(child.id(), Signal::Term).unwrap();
        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_ids_match_environment() {
        // Only sanity: ids are stable across calls.
        assert_eq!(real_uid(), real_uid());
        assert_eq!(real_gid(), real_gid());
    }
}
