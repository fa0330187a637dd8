//! Running a launch plan.
//!
//! Xorg starts first and gets a short grace period to fail. The agent daemon
//! and agent follow, then the X session. The launcher then waits for Xorg to
//! exit or for a termination signal; either way every supervised child is
//! stopped and the session directory removed.

use std::process::ExitStatus;

use tracing::{error, info};

use crate::agent::{VDAGENT, VDAGENTD};
use crate::cli::Cli;
use crate::config::Settings;
use crate::error::Result;
use crate::options::ProcessEnv;
use crate::plan::{LaunchPlan, XORG};
use crate::supervisor::{ShutdownSignals, Signal, Supervisor};

const XSESSION: &str = "xsession";

/// How a launch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Xorg ran and exited on its own.
    XorgExited(ExitStatus),
    /// Xorg exited during its startup grace period.
    XorgFailedToStart(ExitStatus),
    /// The launcher was asked to stop.
    Signalled(Signal),
}

impl Outcome {
    /// Process exit code for the launcher.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::XorgExited(status) => status
                .code()
                .and_then(|code| u8::try_from(code).ok())
                .unwrap_or(1),
            Self::XorgFailedToStart(_) => 1,
            Self::Signalled(_) => 0,
        }
    }
}

/// Resolve a plan against the real environment and `PATH`.
///
/// # Errors
///
/// Returns the first validation or lookup failure.
pub async fn prepare(cli: &Cli, settings: &Settings) -> Result<LaunchPlan> {
    let path_var = std::env::var_os("PATH");
    LaunchPlan::build(cli, settings, &ProcessEnv, path_var.as_deref()).await
}

/// Start everything in `plan` and supervise it until Xorg exits or a
/// signal arrives.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed, a generated file
/// cannot be written, or a child cannot be spawned. Children already started
/// are stopped before returning.
pub async fn execute(mut plan: LaunchPlan, settings: &Settings) -> Result<Outcome> {
    let mut signals = ShutdownSignals::install()?;
    let mut supervisor = Supervisor::new();

    let result = supervise(&mut plan, settings, &mut supervisor, &mut signals).await;
    if let Err(e) = &result {
        error!(error = %e, "launch failed");
    }

    supervisor.terminate_all(settings.terminate_timeout()).await;
    plan.cleanup();
    result
}

/// [`prepare`] then [`execute`].
///
/// # Errors
///
/// See [`prepare`] and [`execute`].
pub async fn run(cli: &Cli, settings: &Settings) -> Result<Outcome> {
    let plan = prepare(cli, settings).await?;
    execute(plan, settings).await
}

async fn supervise(
    plan: &mut LaunchPlan,
    settings: &Settings,
    supervisor: &mut Supervisor,
    signals: &mut ShutdownSignals,
) -> Result<Outcome> {
    plan.prepare()?;

    info!(display = %plan.display, command = %plan.xorg, "starting Xorg");
    supervisor.spawn(XORG, plan.command(&plan.xorg))?;

    tokio::select! {
        early = supervisor.exited_early(XORG, settings.xorg_startup_wait()) => {
            if let Some(status) = early? {
                error!(%status, "Xorg failed to start");
                return Ok(Outcome::XorgFailedToStart(status));
            }
        }
        signal = signals.recv() => return Ok(Outcome::Signalled(signal)),
    }

    if let Some(agents) = &plan.agents {
        supervisor.spawn(VDAGENTD, plan.command(&agents.vdagentd))?;
        tokio::select! {
            () = tokio::time::sleep(settings.vdagentd_startup_wait()) => {}
            signal = signals.recv() => return Ok(Outcome::Signalled(signal)),
        }
        supervisor.spawn(VDAGENT, plan.command(&agents.vdagent))?;
    }

    if let Some(xsession) = &plan.xsession {
        Supervisor::spawn_detached(XSESSION, plan.command(xsession))?;
    }

    tokio::select! {
        status = supervisor.wait_for(XORG) => Ok(Outcome::XorgExited(status?)),
        signal = signals.recv() => Ok(Outcome::Signalled(signal)),
    }
}
