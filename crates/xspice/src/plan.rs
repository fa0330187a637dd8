//! Resolving flags, settings and the environment into a launch plan.
//!
//! Building a plan validates everything that can be checked before a process
//! is started. The only side effect is creating the (still empty) session
//! directory, so `--dry-run` can show the real paths.

use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use tokio::process::Command;
use tracing::debug;

use crate::agent::{which, AgentExecutables, AgentSockets};
use crate::cli::Cli;
use crate::config::Settings;
use crate::driver_env::DriverEnv;
use crate::error::{Error, Result};
use crate::options::OptionSource;
use crate::session::Session;
use crate::supervisor::CommandSpec;
use crate::xorg_conf;

/// Default Xorg binary name.
pub const XORG: &str = "Xorg";

/// Variable that unlocks `--cgdb`.
pub const ENABLE_GDB_VAR: &str = "XSPICE_ENABLE_GDB";

const GENERATED_CONFIG: &str = "xorg.conf";
const GENERATED_LOG: &str = "xorg.log";

/// An `xorg.conf` the launcher writes itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedConfig {
    /// Where it will be written.
    pub path: PathBuf,
    /// File contents.
    pub contents: String,
}

/// Agent processes to start after Xorg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentLaunch {
    /// `spice-vdagentd` invocation.
    pub vdagentd: CommandSpec,
    /// `spice-vdagent` invocation.
    pub vdagent: CommandSpec,
}

/// Everything needed to start the X server and its companions.
#[derive(Debug, Serialize)]
pub struct LaunchPlan {
    /// Xorg invocation, possibly wrapped by a debugger.
    pub xorg: CommandSpec,
    /// `DISPLAY` for every child.
    pub display: String,
    /// Driver variables for every child.
    #[serde(serialize_with = "serialize_redacted")]
    pub env: DriverEnv,
    /// Config to write before starting Xorg (`--auto`).
    pub generated_config: Option<GeneratedConfig>,
    /// Agent sockets, when agents are enabled.
    pub agent_sockets: Option<AgentSockets>,
    /// Agents to start, when the launcher starts them.
    pub agents: Option<AgentLaunch>,
    /// X session program.
    pub xsession: Option<CommandSpec>,
    #[serde(skip)]
    session: Option<Session>,
}

fn serialize_redacted<S: Serializer>(env: &DriverEnv, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    env.redacted().serialize(serializer)
}

impl LaunchPlan {
    /// Validate the inputs and resolve the plan.
    ///
    /// `source` supplies inherited driver variables and `XSPICE_ENABLE_GDB`;
    /// `path_var` is the `PATH` used for executable lookup.
    ///
    /// # Errors
    ///
    /// Returns the first validation or lookup failure.
    pub async fn build(
        cli: &Cli,
        settings: &Settings,
        source: &impl OptionSource,
        path_var: Option<&OsStr>,
    ) -> Result<Self> {
        crate::options::validate_inherited(source, &DriverEnv::from_cli(cli, None))?;

        if cli.ipv4_only && cli.ipv6_only {
            return Err(Error::ConflictingFlags {
                first: "--ipv4-only",
                second: "--ipv6-only",
            });
        }
        if cli.port.is_none() && cli.tls_port == 0 {
            return Err(Error::PortMissing);
        }
        let display_name = cli.display().ok_or(Error::DisplayMissing)?.to_string();

        let xorg_name = cli
            .xorg
            .clone()
            .or_else(|| settings.binaries.xorg.clone())
            .unwrap_or_else(|| PathBuf::from(XORG));
        let xorg_bin = which(&xorg_name, path_var).ok_or(Error::XorgMissing)?;

        let debugger = if cli.cgdb {
            Some(find_debugger(source, path_var).ok_or(Error::DebuggerUnavailable)?)
        } else {
            None
        };

        let mut session = if cli.auto || cli.vdagent_enabled {
            Some(Session::create(&settings.session.temp_prefix)?)
        } else {
            None
        };

        let mut xorg_args = Vec::new();
        let (config_path, generated_config) = match session.as_mut() {
            Some(session) if cli.auto => {
                let log = session.path(GENERATED_LOG);
                session.track(log.clone());
                xorg_args.push("-logfile".to_string());
                xorg_args.push(log.display().to_string());
                let generated = GeneratedConfig {
                    path: session.path(GENERATED_CONFIG),
                    contents: xorg_conf::render(cli.audio_fifo_dir.as_deref()),
                };
                (generated.path.clone(), Some(generated))
            }
            _ => (cli.config.clone(), None),
        };
        xorg_args.extend(cli.xorg_args.iter().cloned());

        let agent_sockets = match (&session, cli.vdagent_enabled) {
            (Some(session), true) => Some(AgentSockets::choose(cli, session)),
            _ => None,
        };

        let agents = match &agent_sockets {
            Some(sockets) if cli.launches_agents() => {
                let executables = AgentExecutables::resolve(cli, settings, path_var).await?;
                Some(AgentLaunch {
                    vdagentd: sockets.vdagentd_command(&executables.vdagentd),
                    vdagent: sockets.vdagent_command(&executables.vdagent),
                })
            }
            _ => None,
        };

        let env = DriverEnv::from_cli(cli, agent_sockets.as_ref());

        let mut xorg = CommandSpec::new(xorg_bin)
            .arg("-config")
            .arg(&config_path)
            .args(&xorg_args);

        let xsession = match (&debugger, &cli.xsession) {
            (None, Some(line)) => Some(CommandSpec::parse(line)?),
            _ => None,
        };
        if let Some(debugger) = debugger {
            xorg = xorg.wrapped_by(debugger, &["--args"]);
        }

        debug!(xorg = %xorg, display = %display_name, "resolved launch plan");
        Ok(Self {
            xorg,
            display: display_name,
            env,
            generated_config,
            agent_sockets,
            agents,
            xsession,
            session,
        })
    }

    /// The session directory, if one was created.
    #[must_use]
    pub fn session_dir(&self) -> Option<&Path> {
        self.session.as_ref().map(Session::dir)
    }

    /// Write generated files and clear stale sockets.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written or removed.
    pub fn prepare(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if let Some(config) = &self.generated_config {
            session.write_file(GENERATED_CONFIG, &config.contents)?;
            debug!(path = %config.path.display(), "wrote xorg.conf");
        }
        if let Some(sockets) = &self.agent_sockets {
            sockets.prepare(session)?;
        }
        Ok(())
    }

    /// Build a tokio command for `spec` with the driver env and `DISPLAY`.
    #[must_use]
    pub fn command(&self, spec: &CommandSpec) -> Command {
        let mut command = spec.to_command();
        self.env.apply(&mut command);
        command.env("DISPLAY", &self.display);
        command
    }

    /// Remove the session directory and everything tracked in it.
    pub fn cleanup(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.cleanup();
        }
    }

    /// Human-readable plan for `--dry-run`. Secrets are masked.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Xorg:        {}", self.xorg);
        let _ = writeln!(out, "Display:     {}", self.display);
        if let Some(config) = &self.generated_config {
            let _ = writeln!(out, "Config:      {} (generated)", config.path.display());
        }
        if let Some(dir) = self.session_dir() {
            let _ = writeln!(out, "Session dir: {}", dir.display());
        }
        if let Some(agents) = &self.agents {
            let _ = writeln!(out, "vdagentd:    {}", agents.vdagentd);
            let _ = writeln!(out, "vdagent:     {}", agents.vdagent);
        }
        if let Some(session) = &self.xsession {
            let _ = writeln!(out, "X session:   {session}");
        }
        let _ = writeln!(out, "Environment:");
        for (name, value) in self.env.redacted().iter() {
            let _ = writeln!(out, "  {name}={value}");
        }
        out
    }

    /// JSON form of the plan for `--dry-run --json`. Secrets are masked.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn find_debugger(source: &impl OptionSource, path_var: Option<&OsStr>) -> Option<PathBuf> {
    source.get(ENABLE_GDB_VAR)?;
    which(Path::new("cgdb"), path_var).or_else(|| which(Path::new("gdb"), path_var))
}
