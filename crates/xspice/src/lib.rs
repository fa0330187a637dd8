//! `xspice` - launcher for an Xorg server running the spiceqxl driver
//!
//! This library turns command-line flags into the `XSPICE_*` environment the
//! driver reads, optionally generates a temporary `xorg.conf`, and supervises
//! Xorg together with the SPICE guest agents and an X session.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod agent;
pub mod cli;
pub mod config;
pub mod driver_env;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod options;
pub mod plan;
pub mod session;
pub mod supervisor;
pub mod xorg_conf;

#[cfg(test)]
mod test_support;

pub use cli::Cli;
pub use config::Settings;
pub use driver_env::DriverEnv;
pub use error::{Error, Result};
pub use launcher::Outcome;
pub use logging::init_logging;
pub use plan::LaunchPlan;
pub use session::Session;
pub use supervisor::{CommandSpec, Supervisor};
