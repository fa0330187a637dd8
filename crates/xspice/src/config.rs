//! Launcher settings for xspice.
//!
//! These are tunables of the launcher itself (where to find binaries, how
//! long to wait for children), loaded with figment from defaults, a TOML file
//! and environment variables. They are unrelated to the `XSPICE_*` variables
//! read by the graphics driver, which is why the environment prefix differs.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default settings file name.
const CONFIG_FILE_NAME: &str = "launcher.toml";

/// Default settings directory name.
const CONFIG_DIR_NAME: &str = "xspice";

/// Environment prefix for launcher settings.
pub const ENV_PREFIX: &str = "XSPICE_LAUNCHER_";

/// Launcher settings.
///
/// Loaded from (in order of precedence, highest first):
/// 1. Environment variables prefixed with `XSPICE_LAUNCHER_`, sections
///    separated by `__` (e.g. `XSPICE_LAUNCHER_TIMING__XORG_STARTUP_WAIT_MS`)
/// 2. TOML file at `~/.config/xspice/launcher.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Executable locations.
    pub binaries: BinarySettings,
    /// Startup and shutdown timing.
    pub timing: TimingSettings,
    /// Temporary session directory.
    pub session: SessionSettings,
}

/// Executable overrides. Command-line flags win over these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarySettings {
    /// Path to the Xorg binary.
    pub xorg: Option<PathBuf>,
    /// Path to `spice-vdagent`.
    pub vdagent: Option<PathBuf>,
    /// Path to `spice-vdagentd`.
    pub vdagentd: Option<PathBuf>,
}

/// Timing knobs, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// How long to let Xorg start before checking it is still alive.
    pub xorg_startup_wait_ms: u64,
    /// How long to let vdagentd create its sockets before starting vdagent.
    pub vdagentd_startup_wait_ms: u64,
    /// How long a child gets to exit after SIGTERM before it is killed.
    pub terminate_timeout_ms: u64,
}

/// Session directory settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Name prefix for the temporary directory.
    pub temp_prefix: String,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            xorg_startup_wait_ms: 2000,
            vdagentd_startup_wait_ms: 1000,
            terminate_timeout_ms: 5000,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            temp_prefix: "Xspice-".to_string(),
        }
    }
}

impl Settings {
    /// Load settings with an optional custom file path.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Get the default settings file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is unusable.
    pub fn validate(&self) -> Result<()> {
        if self.timing.terminate_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "terminate_timeout_ms must be greater than 0".to_string(),
            });
        }

        let prefix = &self.session.temp_prefix;
        if prefix.is_empty() {
            return Err(Error::ConfigValidation {
                message: "temp_prefix must not be empty".to_string(),
            });
        }
        if prefix.contains('/') {
            return Err(Error::ConfigValidation {
                message: format!("temp_prefix must not contain '/': {prefix}"),
            });
        }

        Ok(())
    }

    /// Get the Xorg startup grace period.
    #[must_use]
    pub fn xorg_startup_wait(&self) -> Duration {
        Duration::from_millis(self.timing.xorg_startup_wait_ms)
    }

    /// Get the vdagentd startup grace period.
    #[must_use]
    pub fn vdagentd_startup_wait(&self) -> Duration {
        Duration::from_millis(self.timing.vdagentd_startup_wait_ms)
    }

    /// Get the SIGTERM-to-SIGKILL escalation timeout.
    #[must_use]
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.timing.terminate_timeout_ms)
    }
}
