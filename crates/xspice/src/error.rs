//! Error types for xspice.
//!
//! Every failure the launcher can report before or while starting its
//! children is a variant here; the binary prints them as `Xspice: <message>`.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for xspice operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Launch Validation Errors ===
    /// No usable Xorg binary was found.
    #[error("Xorg missing")]
    XorgMissing,

    /// No display argument (such as `:1`) was passed through to Xorg.
    #[error("missing display on line (i.e. :3)")]
    DisplayMissing,

    /// Neither a plain nor a TLS port was requested.
    #[error("one of --port or --tls-port must be given")]
    PortMissing,

    /// Two mutually exclusive flags were combined.
    #[error("{first} and {second} are mutually exclusive")]
    ConflictingFlags {
        /// The first flag.
        first: &'static str,
        /// The second flag.
        second: &'static str,
    },

    /// An `XSPICE_*` driver option carries a value the driver would reject.
    #[error("invalid {name}: {value}")]
    InvalidOption {
        /// Environment variable name.
        name: String,
        /// The offending value.
        value: String,
    },

    /// `--cgdb` was given but no debugger is available.
    #[error("--cgdb needs XSPICE_ENABLE_GDB set and cgdb or gdb in PATH")]
    DebuggerUnavailable,

    // === Agent Errors ===
    /// An agent executable could not be located.
    #[error("please specify path to vdagent/vdagentd executables ({name} not found)")]
    AgentMissing {
        /// The executable that was looked up.
        name: String,
    },

    /// An agent executable is too old to talk to the driver.
    #[error("vdagent is not new enough to support Xspice ({path})")]
    AgentOutdated {
        /// Path to the outdated executable.
        path: PathBuf,
    },

    // === Process Errors ===
    /// A child process could not be started.
    #[error("failed to launch {name}: {source}")]
    Spawn {
        /// Name the child is tracked under.
        name: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A child with this name is not being supervised.
    #[error("no supervised process named '{0}'")]
    UnknownProcess(String),

    /// A command line could not be split into arguments.
    #[error("cannot parse command line: {0}")]
    CommandLine(String),

    // === Configuration Errors ===
    /// Failed to load launcher settings.
    #[error("failed to load launcher settings: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Launcher settings validation failed.
    #[error("invalid launcher settings: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Session Errors ===
    /// Failed to create the temporary session directory.
    #[error("failed to create session directory with prefix {prefix}: {source}")]
    SessionCreate {
        /// Directory name prefix.
        prefix: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a generated file.
    #[error("failed to write {path}: {source}")]
    FileWrite {
        /// Path of the file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for xspice operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create an invalid driver option error.
    #[must_use]
    pub fn invalid_option(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidOption {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Create a spawn error.
    #[must_use]
    pub fn spawn(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            name: name.into(),
            source,
        }
    }

    /// Check if this error comes from validating the command line, as opposed
    /// to something failing at runtime.
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::XorgMissing
                | Self::DisplayMissing
                | Self::PortMissing
                | Self::ConflictingFlags { .. }
                | Self::DebuggerUnavailable
                | Self::InvalidOption { .. }
        )
    }
}
