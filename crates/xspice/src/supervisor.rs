//! Child process supervision.
//!
//! The supervisor owns every long-running child (Xorg and the agents), knows
//! them by name, and tears them down in reverse start order: SIGTERM first,
//! SIGKILL once the grace period runs out.

use std::ffi::OsStr;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use serde::Serialize;
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, Signal as SignalStream, SignalKind};
use tracing::{debug, info, warn};

#[cfg(target_os = "linux")]
use xspice_linux as platform;

pub use platform::Signal;

use crate::error::{Error, Result};

/// A program and its arguments, kept printable for logs and `--dry-run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments, not including the program.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// A command with no arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Parse a shell-style command line such as `"startxfce4 --replace"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandLine`] for unbalanced quotes or an empty line.
    pub fn parse(line: &str) -> Result<Self> {
        let words = shlex::split(line).ok_or_else(|| Error::CommandLine(line.to_string()))?;
        let mut words = words.into_iter();
        let program = words
            .next()
            .ok_or_else(|| Error::CommandLine(line.to_string()))?;
        Ok(Self::new(program).args(words))
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|a| a.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Run this command under a wrapper, e.g. `gdb --args <self>`.
    #[must_use]
    pub fn wrapped_by(self, wrapper: impl Into<PathBuf>, wrapper_args: &[&str]) -> Self {
        Self::new(wrapper)
            .args(wrapper_args)
            .arg(&self.program)
            .args(self.args)
    }

    /// Program followed by arguments.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Build the tokio command. Children die with the launcher.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let argv = self.argv();
        match shlex::try_join(argv.iter().map(String::as_str)) {
            Ok(line) => f.write_str(&line),
            Err(_) => f.write_str(&argv.join(" ")),
        }
    }
}

#[derive(Debug)]
struct Supervised {
    name: String,
    pid: u32,
    child: Child,
}

/// Owns the launched children.
#[derive(Debug, Default)]
pub struct Supervisor {
    children: Vec<Supervised>,
}

impl Supervisor {
    /// Create an empty supervisor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `command` and track it as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the process cannot be started.
    pub fn spawn(&mut self, name: &str, mut command: Command) -> Result<u32> {
        let child = command
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::spawn(name, e))?;
        let pid = child.id().unwrap_or_default();
        info!(name, pid, "started");
        self.children.push(Supervised {
            name: name.to_string(),
            pid,
            child,
        });
        Ok(pid)
    }

    /// Start `command` without tracking it; it outlives the launcher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the process cannot be started.
    pub fn spawn_detached(name: &str, mut command: Command) -> Result<u32> {
        let child = command
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| Error::spawn(name, e))?;
        let pid = child.id().unwrap_or_default();
        info!(name, pid, "started (detached)");
        Ok(pid)
    }

    /// Number of tracked children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Names of tracked children, in start order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.name.as_str()).collect()
    }

    fn find(&mut self, name: &str) -> Result<&mut Supervised> {
        self.children
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::UnknownProcess(name.to_string()))
    }

    /// Give `name` up to `grace` to settle; report its status if it already
    /// exited in that time.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown name or a failed wait.
    pub async fn exited_early(&mut self, name: &str, grace: Duration) -> Result<Option<ExitStatus>> {
        let supervised = self.find(name)?;
        match tokio::time::timeout(grace, supervised.child.wait()).await {
            Ok(status) => {
                let status = status?;
                warn!(name, pid = supervised.pid, %status, "exited during startup");
                Ok(Some(status))
            }
            Err(_) => Ok(None),
        }
    }

    /// Wait for `name` to exit.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown name or a failed wait.
    pub async fn wait_for(&mut self, name: &str) -> Result<ExitStatus> {
        let supervised = self.find(name)?;
        let status = supervised.child.wait().await?;
        info!(name, pid = supervised.pid, %status, "exited");
        Ok(status)
    }

    /// Stop every child, newest first, and forget them.
    ///
    /// Each child gets SIGTERM and `timeout` to exit before SIGKILL.
    pub async fn terminate_all(&mut self, timeout: Duration) {
        while let Some(mut supervised) = self.children.pop() {
            terminate(&mut supervised, timeout).await;
        }
    }
}

async fn terminate(supervised: &mut Supervised, timeout: Duration) {
    let Supervised { name, pid, child } = supervised;

    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(name = %name, pid = *pid, %status, "already exited");
            return;
        }
        Ok(None) => {}
        Err(e) => warn!(name = %name, pid = *pid, error = %e, "failed to poll"),
    }

    if let Err(e) = platform::send_signal(*pid, Signal::Term) {
        debug!(name = %name, pid = *pid, error = %e, "SIGTERM not delivered");
    }

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => info!(name = %name, pid = *pid, %status, "terminated"),
        Ok(Err(e)) => warn!(name = %name, pid = *pid, error = %e, "failed to wait"),
        Err(_) => {
            warn!(name = %name, pid = *pid, "did not exit after SIGTERM, killing");
            if let Err(e) = child.kill().await {
                warn!(name = %name, pid = *pid, error = %e, "failed to kill");
            }
        }
    }
}

/// Termination signals aimed at the launcher itself.
#[derive(Debug)]
pub struct ShutdownSignals {
    terminate: SignalStream,
    interrupt: SignalStream,
    hangup: SignalStream,
}

impl ShutdownSignals {
    /// Install handlers for SIGTERM, SIGINT and SIGHUP.
    ///
    /// Install before spawning children so no signal is missed.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if a handler cannot be registered.
    pub fn install() -> Result<Self> {
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    /// Resolve once any of the signals arrives.
    pub async fn recv(&mut self) -> Signal {
        let received = tokio::select! {
            _ = self.terminate.recv() => Signal::Term,
            _ = self.interrupt.recv() => Signal::Int,
            _ = self.hangup.recv() => Signal::Hup,
        };
        info!(signal = %received, "received shutdown signal");
        received
    }
}
