//! SPICE guest agents.
//!
//! `spice-vdagentd` talks to the driver over a virtio-like socket and to
//! `spice-vdagent` over a unix domain socket; `spice-vdagent` injects input
//! through a uinput pipe. Only agents new enough to accept `-S` (explicit
//! socket path) can be pointed at the launcher's session directory.

use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cli::Cli;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::session::{remove_stale, Session};
use crate::supervisor::CommandSpec;

/// Default agent executable names.
pub const VDAGENT: &str = "spice-vdagent";
/// Default agent daemon executable name.
pub const VDAGENTD: &str = "spice-vdagentd";

const UDCS_SOCKET: &str = "vdagent.udcs";
const VIRTIO_SOCKET: &str = "vdagent.virtio";
const UINPUT_PIPE: &str = "vdagent.uinput";

/// How long `<agent> -h` may take.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Locate an executable.
///
/// Only regular files with an execute bit match. A path with a directory part
/// is checked as given. A bare name is tried in the working directory, and
/// returned as `./name` so that spawning it does not search `PATH` again,
/// then in each entry of `path_var` (a `PATH`-style list).
pub fn which(name: &Path, path_var: Option<&OsStr>) -> Option<PathBuf> {
    if name.as_os_str().is_empty() {
        return None;
    }
    let found = if name.is_absolute() || name.components().count() > 1 {
        is_executable(name).then(|| name.to_path_buf())
    } else if is_executable(name) {
        Some(Path::new(".").join(name))
    } else {
        path_var.and_then(|paths| {
            std::env::split_paths(paths)
                .map(|dir| dir.join(name))
                .find(|candidate| is_executable(candidate))
        })
    };
    if found.is_some() {
        return found;
    }
    warn!("failed to find executable {}", name.display());
    None
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Whether the agent at `exe` understands `-S <socket>`.
///
/// Runs `exe -h` and looks for the flag in its help text.
///
/// # Errors
///
/// Returns [`Error::Spawn`] if the executable cannot be run at all.
pub async fn supports_socket_flag(exe: &Path) -> Result<bool> {
    let output = tokio::process::Command::new(exe)
        .arg("-h")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(PROBE_TIMEOUT, output).await {
        Ok(result) => result.map_err(|e| Error::spawn(exe.display().to_string(), e))?,
        Err(_) => {
            warn!(exe = %exe.display(), "help probe timed out");
            return Ok(false);
        }
    };

    let help = [output.stdout, output.stderr].concat();
    let supported = String::from_utf8_lossy(&help).contains("-S");
    debug!(exe = %exe.display(), supported, "probed agent");
    Ok(supported)
}

/// Resolved agent executables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentExecutables {
    /// `spice-vdagent`.
    pub vdagent: PathBuf,
    /// `spice-vdagentd`.
    pub vdagentd: PathBuf,
}

impl AgentExecutables {
    /// Find and probe both agents.
    ///
    /// Flags win over settings, which win over the default names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentMissing`] or [`Error::AgentOutdated`].
    pub async fn resolve(cli: &Cli, settings: &Settings, path_var: Option<&OsStr>) -> Result<Self> {
        let vdagent = pick(cli.vdagent_exec.as_deref(), settings.binaries.vdagent.as_deref(), VDAGENT);
        let vdagentd = pick(
            cli.vdagentd_exec.as_deref(),
            settings.binaries.vdagentd.as_deref(),
            VDAGENTD,
        );

        let resolved = Self {
            vdagent: locate(&vdagent, path_var)?,
            vdagentd: locate(&vdagentd, path_var)?,
        };

        for exe in [&resolved.vdagent, &resolved.vdagentd] {
            if !supports_socket_flag(exe).await? {
                return Err(Error::AgentOutdated { path: exe.clone() });
            }
        }
        Ok(resolved)
    }
}

fn pick(flag: Option<&Path>, setting: Option<&Path>, default: &str) -> PathBuf {
    flag.or(setting)
        .map_or_else(|| PathBuf::from(default), Path::to_path_buf)
}

fn locate(name: &Path, path_var: Option<&OsStr>) -> Result<PathBuf> {
    which(name, path_var).ok_or_else(|| Error::AgentMissing {
        name: name.display().to_string(),
    })
}

/// Socket paths shared by the driver and the agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSockets {
    /// Unix domain socket between vdagent and vdagentd.
    pub udcs: PathBuf,
    /// Virtio-like socket between the driver and vdagentd.
    pub virtio: PathBuf,
    /// Uinput pipe between vdagent and the driver.
    pub uinput: PathBuf,
}

impl AgentSockets {
    /// Choose socket paths, defaulting into the session directory.
    #[must_use]
    pub fn choose(cli: &Cli, session: &Session) -> Self {
        Self {
            udcs: or_session(cli.vdagent_udcs_path.as_ref(), session, UDCS_SOCKET),
            virtio: or_session(cli.vdagent_virtio_path.as_ref(), session, VIRTIO_SOCKET),
            uinput: or_session(cli.vdagent_uinput_path.as_ref(), session, UINPUT_PIPE),
        }
    }

    /// Remove stale files at the chosen paths and track all three for cleanup.
    ///
    /// # Errors
    ///
    /// Returns an error if a stale file cannot be removed.
    pub fn prepare(&self, session: &mut Session) -> Result<()> {
        for file in [&self.udcs, &self.virtio, &self.uinput] {
            remove_stale(file)?;
            session.track(file.clone());
        }
        Ok(())
    }

    /// `vdagentd -f -x -S <udcs> -s <virtio> -u <uinput>`
    #[must_use]
    pub fn vdagentd_command(&self, exe: &Path) -> CommandSpec {
        CommandSpec::new(exe)
            .args(["-f", "-x"])
            .arg("-S")
            .arg(&self.udcs)
            .arg("-s")
            .arg(&self.virtio)
            .arg("-u")
            .arg(&self.uinput)
    }

    /// `vdagent -x -s <virtio> -S <udcs>`
    #[must_use]
    pub fn vdagent_command(&self, exe: &Path) -> CommandSpec {
        CommandSpec::new(exe)
            .arg("-x")
            .arg("-s")
            .arg(&self.virtio)
            .arg("-S")
            .arg(&self.udcs)
    }
}

fn or_session(flag: Option<&PathBuf>, session: &Session, name: &str) -> PathBuf {
    flag.cloned().unwrap_or_else(|| session.path(name))
}
