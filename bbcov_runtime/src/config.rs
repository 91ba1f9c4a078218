//! Runtime options, read once when the process-wide registry is first used.

use std::env;
use std::str::FromStr;

use tracing::warn;

/// Set to `1`/`true`/`yes`/`on` to hold an exclusive lock around each store merge.
pub const LOCK_ENV: &str = "BBCOV_LOCK";
/// `grow` (default) or `skip`; see [`MismatchPolicy`].
pub const MISMATCH_ENV: &str = "BBCOV_ON_MISMATCH";

/// What a merge does when this run saw more blocks for a function than the
/// existing store holds, which usually means the store was written by a
/// different build of the same source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MismatchPolicy {
    /// Grow the stored sequence and merge anyway.
    #[default]
    Grow,
    /// Leave that store untouched for this run.
    Skip,
}

impl FromStr for MismatchPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "grow" => Ok(MismatchPolicy::Grow),
            "skip" => Ok(MismatchPolicy::Skip),
            other => Err(format!("unknown mismatch policy '{other}', expected grow or skip")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Serialize merges of the same store across processes.
    pub lock: bool,
    pub mismatch: MismatchPolicy,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Unrecognized values
    /// fall back to the default for that option.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(LOCK_ENV) {
            match parse_switch(&value) {
                Some(enabled) => config.lock = enabled,
                None => warn!(variable = LOCK_ENV, value = %value, "Ignoring unrecognized value"),
            }
        }

        if let Some(value) = lookup(MISMATCH_ENV) {
            match value.parse() {
                Ok(policy) => config.mismatch = policy,
                Err(err) => warn!(variable = MISMATCH_ENV, error = %err, "Ignoring unrecognized value"),
            }
        }

        config
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn from_lookup__no_variables__then_defaults() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[]));

        assert_eq!(config, RuntimeConfig::default());
        assert!(!config.lock);
        assert_eq!(config.mismatch, MismatchPolicy::Grow);
    }

    #[test]
    fn from_lookup__lock_and_skip__then_both_applied() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            (LOCK_ENV, "1"),
            (MISMATCH_ENV, "Skip"),
        ]));

        assert!(config.lock);
        assert_eq!(config.mismatch, MismatchPolicy::Skip);
    }

    #[test]
    fn from_lookup__unrecognized_values__then_defaults_kept() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            (LOCK_ENV, "maybe"),
            (MISMATCH_ENV, "reject"),
        ]));

        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn mismatch_policy__parse__then_case_insensitive() {
        assert_eq!("GROW".parse::<MismatchPolicy>(), Ok(MismatchPolicy::Grow));
        assert_eq!(" skip ".parse::<MismatchPolicy>(), Ok(MismatchPolicy::Skip));
        assert!("other".parse::<MismatchPolicy>().is_err());
    }
}
