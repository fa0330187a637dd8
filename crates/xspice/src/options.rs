//! Driver option resolution.
//!
//! The `spiceqxl` driver lets an `XSPICE_*` environment variable override the
//! matching `xorg.conf` option. The launcher mirrors those rules so it can
//! reject values the driver would abort on before Xorg is even started.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Boolean driver options, by environment name.
///
/// The driver aborts at startup if any of these holds an unrecognised value.
pub const BOOL_OPTIONS: &[&str] = &[
    "XSPICE_DISABLE_TICKETING",
    "XSPICE_EXIT_ON_DISCONNECT",
    "XSPICE_IPV4_ONLY",
    "XSPICE_IPV6_ONLY",
    "XSPICE_SASL",
    "XSPICE_VDAGENT_ENABLED",
];

/// Where option values come from.
pub trait OptionSource {
    /// Look up the raw value of `name`, if set.
    fn get(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl OptionSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl OptionSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

/// Parse a leading decimal integer the way C `atoi` does.
///
/// Leading whitespace and one sign are accepted; parsing stops at the first
/// non-digit and an empty or overflowing prefix yields 0.
#[must_use]
pub fn atoi(value: &str) -> i64 {
    let trimmed = value.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let magnitude: i64 = digits[..end].parse().unwrap_or(0);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Parse a driver boolean. `None` means the value is not recognised.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    const FALSE_WORDS: [&str; 3] = ["off", "false", "no"];
    const TRUE_WORDS: [&str; 3] = ["on", "true", "yes"];

    if value == "0" || FALSE_WORDS.iter().any(|w| value.eq_ignore_ascii_case(w)) {
        Some(false)
    } else if value == "1" || TRUE_WORDS.iter().any(|w| value.eq_ignore_ascii_case(w)) {
        Some(true)
    } else {
        None
    }
}

/// Resolve an integer option: the environment wins over `default`.
pub fn int_option(source: &impl OptionSource, name: &str, default: i64) -> i64 {
    source.get(name).map_or(default, |v| atoi(&v))
}

/// Resolve a string option: the environment wins over `default`.
pub fn str_option(source: &impl OptionSource, name: &str, default: Option<&str>) -> Option<String> {
    source.get(name).or_else(|| default.map(str::to_string))
}

/// Resolve a boolean option: the environment wins over `default`.
///
/// # Errors
///
/// Returns [`Error::InvalidOption`] if the variable is set to something other
/// than `0/off/false/no` or `1/on/true/yes`.
pub fn bool_option(source: &impl OptionSource, name: &str, default: bool) -> Result<bool> {
    match source.get(name) {
        None => Ok(default),
        Some(value) => parse_bool(&value).ok_or_else(|| Error::invalid_option(name, value)),
    }
}

/// Check every boolean driver option present in `source` that `exported`
/// does not replace.
///
/// # Errors
///
/// Returns the first invalid option found.
pub fn validate_inherited(source: &impl OptionSource, exported: &impl OptionSource) -> Result<()> {
    for name in BOOL_OPTIONS.iter().filter(|name| exported.get(name).is_none()) {
        bool_option(source, name, false)?;
    }
    Ok(())
}
