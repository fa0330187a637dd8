//! Command-line interface for xspice.
//!
//! Only long options are declared so that Xorg's single-dash options and the
//! display argument pass through untouched (see [`split_args`]).

mod split;
mod values;

use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

pub use split::{split_args, SplitArgs};
pub use values::{ImageCompression, StreamingVideo, WanCompression};

/// Default Xorg configuration used when `--auto` is not given.
pub const DEFAULT_XORG_CONFIG: &str = "spiceqxl.xorg.conf";

/// X and Spice server.
///
/// Starts Xorg with the spiceqxl driver, configured through XSPICE_*
/// environment variables. Example: xspice --port 5900 --disable-ticketing :1.0
#[derive(Debug, Parser)]
#[command(name = "xspice")]
#[command(author, version, about, long_about = None)]
#[command(override_usage = "xspice [Xspice and Xorg options intermixed]")]
#[command(after_help = "Any option not parsed by Xspice gets passed to Xorg as is.")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    // === X server ===
    /// Path to the Xorg binary
    #[arg(long, value_name = "PATH", help_heading = "X server")]
    pub xorg: Option<PathBuf>,

    /// Path to the Xspice xorg.conf (ignored with --auto)
    #[arg(long, value_name = "FILE", default_value = DEFAULT_XORG_CONFIG, help_heading = "X server")]
    pub config: PathBuf,

    /// Generate a temporary xorg.conf and start the X server with it
    #[arg(long, help_heading = "X server")]
    pub auto: bool,

    /// Program to run once Xorg is up, such as x-session-manager
    #[arg(long, value_name = "COMMAND", help_heading = "X server")]
    pub xsession: Option<String>,

    // === Network and security ===
    /// Do not require a client password
    #[arg(long, help_heading = "Network and security")]
    pub disable_ticketing: bool,

    /// Password required to connect to the server
    #[arg(long, help_heading = "Network and security")]
    pub password: Option<String>,

    /// Use SASL to authenticate to the server
    #[arg(long, help_heading = "Network and security")]
    pub sasl: bool,

    /// Spice's regular unencrypted port
    #[arg(long, help_heading = "Network and security")]
    pub port: Option<u16>,

    /// TLS (encrypted) port; 0 disables TLS
    #[arg(long, default_value_t = 0, help_heading = "Network and security")]
    pub tls_port: u16,

    /// Directory searched for ca-cert.pem, server-key.pem and server-cert.pem
    #[arg(long, value_name = "DIR", help_heading = "Network and security")]
    pub x509_dir: Option<PathBuf>,

    /// CA certificate file for TLS
    #[arg(long, value_name = "FILE", help_heading = "Network and security")]
    pub cacert_file: Option<PathBuf>,

    /// Server key file for TLS
    #[arg(long, value_name = "FILE", help_heading = "Network and security")]
    pub x509_key_file: Option<PathBuf>,

    /// Password of the server key
    #[arg(long, help_heading = "Network and security")]
    pub x509_key_password: Option<String>,

    /// Server certificate file for TLS
    #[arg(long, value_name = "FILE", help_heading = "Network and security")]
    pub x509_cert_file: Option<PathBuf>,

    /// Server DH parameters file for TLS
    #[arg(long, value_name = "FILE", help_heading = "Network and security")]
    pub dh_file: Option<PathBuf>,

    /// TLS cipher preference order
    #[arg(long, help_heading = "Network and security")]
    pub tls_ciphers: Option<String>,

    /// Only accept IPv4 connections
    #[arg(long, help_heading = "Network and security")]
    pub ipv4_only: bool,

    /// Only accept IPv6 connections
    #[arg(long, help_heading = "Network and security")]
    pub ipv6_only: bool,

    /// Exit the X server when any client disconnects
    #[arg(long, help_heading = "Network and security")]
    pub exit_on_disconnect: bool,

    // === Compression and video ===
    /// JPEG WAN compression
    #[arg(long, value_enum, help_heading = "Compression")]
    pub jpeg_wan_compression: Option<WanCompression>,

    /// zlib-GLZ WAN compression
    #[arg(long, value_enum, help_heading = "Compression")]
    pub zlib_glz_wan_compression: Option<WanCompression>,

    /// Image compression
    #[arg(long, value_enum, help_heading = "Compression")]
    pub image_compression: Option<ImageCompression>,

    /// Render to the frame buffer and send changed areas at this rate
    #[arg(long, value_name = "FPS", help_heading = "Compression")]
    pub deferred_fps: Option<u32>,

    /// Streaming video detection method
    #[arg(long, value_enum, help_heading = "Compression")]
    pub streaming_video: Option<StreamingVideo>,

    /// Semicolon separated encoder:codec list, e.g. spice:mjpeg;gstreamer:h264
    #[arg(long, value_name = "LIST", help_heading = "Compression")]
    pub video_codecs: Option<String>,

    // === Agents ===
    /// Launch vdagent and vdagentd for clipboard and resolution automation
    #[arg(long = "vdagent", help_heading = "Agents")]
    pub vdagent_enabled: bool,

    /// Virtio socket path used by vdagentd
    #[arg(long, value_name = "PATH", help_heading = "Agents")]
    pub vdagent_virtio_path: Option<PathBuf>,

    /// Uinput socket path used by vdagent
    #[arg(long, value_name = "PATH", help_heading = "Agents")]
    pub vdagent_uinput_path: Option<PathBuf>,

    /// Unix domain socket path shared by vdagent and vdagentd
    #[arg(long, value_name = "PATH", help_heading = "Agents")]
    pub vdagent_udcs_path: Option<PathBuf>,

    /// Path to spice-vdagentd
    #[arg(long, value_name = "PATH", help_heading = "Agents")]
    pub vdagentd_exec: Option<PathBuf>,

    /// Path to spice-vdagent
    #[arg(long, value_name = "PATH", help_heading = "Agents")]
    pub vdagent_exec: Option<PathBuf>,

    /// Configure the agents but leave launching them to someone else
    #[arg(long, help_heading = "Agents")]
    pub vdagent_no_launch: bool,

    /// vdagent user id (defaults to the current user)
    #[arg(long, value_name = "UID", help_heading = "Agents")]
    pub vdagent_uid: Option<u32>,

    /// vdagent group id (defaults to the current group)
    #[arg(long, value_name = "GID", help_heading = "Agents")]
    pub vdagent_gid: Option<u32>,

    /// Directory whose files are read as audio for the client (PulseAudio module-pipe-sink)
    #[arg(long, value_name = "DIR", help_heading = "Agents")]
    pub audio_fifo_dir: Option<PathBuf>,

    // === Launcher ===
    /// Run Xorg under cgdb/gdb (needs XSPICE_ENABLE_GDB in the environment)
    #[arg(long, help_heading = "Launcher")]
    pub cgdb: bool,

    /// Print what would be launched and exit
    #[arg(long, help_heading = "Launcher")]
    pub dry_run: bool,

    /// With --dry-run, print the plan as JSON
    #[arg(long, requires = "dry_run", help_heading = "Launcher")]
    pub json: bool,

    /// Path to the launcher settings file
    #[arg(long, value_name = "FILE", help_heading = "Launcher")]
    pub launcher_config: Option<PathBuf>,

    /// Increase verbosity (--verbose for debug, twice for trace)
    #[arg(long, action = clap::ArgAction::Count, help_heading = "Launcher")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(long, help_heading = "Launcher")]
    pub quiet: bool,

    /// Arguments passed through to Xorg.
    #[arg(skip)]
    pub xorg_args: Vec<String>,
}

impl Cli {
    /// Parse the process command line.
    ///
    /// Exits with clap's usage error or help output when appropriate.
    #[must_use]
    pub fn parse_from_env() -> Self {
        Self::try_parse_os(std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    /// Parse OS arguments (including the program name).
    ///
    /// Arguments are passed to Xorg verbatim, so one that is not valid UTF-8
    /// is rejected instead of being altered.
    ///
    /// # Errors
    ///
    /// Returns clap's error for invalid launcher flags or a non-UTF-8 argument.
    pub fn try_parse_os<I>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = OsString>,
    {
        let argv = argv
            .into_iter()
            .map(|arg| {
                arg.into_string().map_err(|raw| {
                    Self::command().error(
                        ErrorKind::InvalidUtf8,
                        format!("argument is not valid UTF-8: {}", raw.to_string_lossy()),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::try_parse_mixed(argv)
    }

    /// Parse an explicit argument vector (including the program name).
    ///
    /// # Errors
    ///
    /// Returns clap's error for invalid launcher flags.
    pub fn try_parse_mixed<I, S>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let split = split_args(argv);
        let mut cli = Self::try_parse_from(split.launcher.into_iter().map(OsString::from))?;
        cli.xorg_args = split.xorg;
        Ok(cli)
    }

    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }

    /// The X display passed through to Xorg, e.g. `:1.0`.
    ///
    /// When several are given the last one wins, as it does for Xorg.
    #[must_use]
    pub fn display(&self) -> Option<&str> {
        self.xorg_args
            .iter()
            .rev()
            .find(|arg| arg.starts_with(':'))
            .map(String::as_str)
    }

    /// Whether agents should be started by the launcher.
    #[must_use]
    pub fn launches_agents(&self) -> bool {
        self.vdagent_enabled && !self.vdagent_no_launch
    }
}
