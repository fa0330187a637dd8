//! `xspice` - X and Spice server launcher
//!
//! Starts Xorg with the spiceqxl driver and, on request, the SPICE guest
//! agents and an X session.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use tracing::debug;

use xspice::{init_logging, launcher, Cli, Settings};

// Platform-specific imports using conditional compilation
#[cfg(target_os = "linux")]
use xspice_linux as platform;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_from_env();
    init_logging(cli.verbosity());

    match run(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Xspice: {e:#}");
            if e
                .downcast_ref::<xspice::Error>()
                .is_some_and(xspice::Error::is_usage_error)
            {
                eprintln!("Try 'xspice --help' for more information.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<u8> {
    platform::init().map_err(|e| anyhow::anyhow!("platform init failed: {e}"))?;
    debug!(platform = platform::platform_name(), "initialised");

    let settings = Settings::load_from(cli.launcher_config.clone())
        .context("cannot load launcher settings")?;

    let mut plan = launcher::prepare(cli, &settings).await?;

    if cli.dry_run {
        if cli.json {
            println!("{}", plan.to_json()?);
        } else {
            print!("{}", plan.describe());
        }
        plan.cleanup();
        return Ok(0);
    }

    let outcome = launcher::execute(plan, &settings).await?;
    debug!(?outcome, "finished");
    Ok(outcome.exit_code())
}
