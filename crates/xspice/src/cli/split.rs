//! Separating launcher flags from Xorg arguments.
//!
//! Launcher and Xorg options are intermixed on one command line. Only
//! `--long` options that the launcher declares are taken; everything else is
//! handed to Xorg untouched and in its original order.

use std::collections::HashMap;

use clap::CommandFactory;

use super::Cli;

/// The two halves of a command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitArgs {
    /// Program name followed by the launcher's own flags, ready for clap.
    pub launcher: Vec<String>,
    /// Arguments destined for Xorg.
    pub xorg: Vec<String>,
}

/// Long option names of [`Cli`], mapped to whether they take a value.
fn known_options() -> HashMap<String, bool> {
    let command = Cli::command();
    let mut known: HashMap<String, bool> = command
        .get_arguments()
        .filter_map(|arg| {
            arg.get_long()
                .map(|long| (long.to_string(), arg.get_action().takes_values()))
        })
        .collect();
    // Generated by clap at build time, so not listed above
    known.insert("help".to_string(), false);
    known.insert("version".to_string(), false);
    known
}

/// Split `argv` (including the program name) into launcher and Xorg parts.
///
/// A value given as a separate argument is folded into `--name=value`, so a
/// value that itself starts with `-` survives clap parsing. A bare `--` sends
/// everything after it to Xorg.
pub fn split_args<I, S>(argv: I) -> SplitArgs
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let known = known_options();
    let mut args = argv.into_iter().map(Into::into);
    let mut split = SplitArgs::default();

    if let Some(program) = args.next() {
        split.launcher.push(program);
    }

    while let Some(arg) = args.next() {
        if arg == "--" {
            split.xorg.extend(args.by_ref());
            break;
        }

        let Some(body) = arg.strip_prefix("--") else {
            split.xorg.push(arg);
            continue;
        };

        let (name, inline_value) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };

        match known.get(name) {
            Some(true) if inline_value.is_none() => match args.next() {
                Some(value) => split.launcher.push(format!("--{name}={value}")),
                // Let clap report the missing value
                None => split.launcher.push(arg),
            },
            Some(_) => split.launcher.push(arg),
            None => split.xorg.push(arg),
        }
    }

    split
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(args: &[&str]) -> SplitArgs {
        split_args(args.iter().copied())
    }

    #[test]
    fn test_display_and_port() {
        let s = split(&["xspice", "--port", "5900", "--disable-ticketing", ":1.0"]);
        assert_eq!(
            s.launcher,
            vec!["xspice", "--port=5900", "--disable-ticketing"]
        );
        assert_eq!(s.xorg, vec![":1.0"]);
    }

    #[test]
    fn test_xorg_options_keep_order() {
        let s = split(&[
            "xspice", "-noreset", "--auto", "-ac", ":2", "--port=5902", "-nolisten", "tcp",
        ]);
        assert_eq!(s.launcher, vec!["xspice", "--auto", "--port=5902"]);
        assert_eq!(s.xorg, vec!["-noreset", "-ac", ":2", "-nolisten", "tcp"]);
    }

    #[test]
    fn test_unknown_long_option_goes_to_xorg() {
        let s = split(&["xspice", "--not-ours", ":1"]);
        assert_eq!(s.launcher, vec!["xspice"]);
        assert_eq!(s.xorg, vec!["--not-ours", ":1"]);
    }

    #[test]
    fn test_value_starting_with_dash() {
        let s = split(&["xspice", "--password", "-secret-", ":1"]);
        assert_eq!(s.launcher, vec!["xspice", "--password=-secret-"]);
        assert_eq!(s.xorg, vec![":1"]);
    }

    #[test]
    fn test_double_dash_ends_launcher_options() {
        let s = split(&["xspice", "--auto", "--", "--port", "1", ":3"]);
        assert_eq!(s.launcher, vec!["xspice", "--auto"]);
        assert_eq!(s.xorg, vec!["--port", "1", ":3"]);
    }

    #[test]
    fn test_trailing_option_without_value() {
        let s = split(&["xspice", ":1", "--port"]);
        assert_eq!(s.launcher, vec!["xspice", "--port"]);
        assert_eq!(s.xorg, vec![":1"]);
    }

    #[test]
    fn test_help_and_version_are_ours() {
        assert_eq!(split(&["xspice", "--help"]).launcher, vec!["xspice", "--help"]);
        assert_eq!(
            split(&["xspice", "--version"]).launcher,
            vec!["xspice", "--version"]
        );
    }

    #[test]
    fn test_counted_flag_takes_no_value() {
        let s = split(&["xspice", "--verbose", ":1", "--verbose"]);
        assert_eq!(s.launcher, vec!["xspice", "--verbose", "--verbose"]);
        assert_eq!(s.xorg, vec![":1"]);
    }

    #[test]
    fn test_empty_argv() {
        assert_eq!(split(&[]), SplitArgs::default());
    }
}
