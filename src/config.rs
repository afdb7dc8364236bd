// src/config.rs
//! Env-driven configuration with an optional TOML tunables file.
//!
//! All missing required variables are collected into one startup error so a
//! misconfigured deploy fails loudly with the full list, not one var at a
//! time.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

pub const ENV_BOT_TOKEN: &str = "DEALWATCH_BOT_TOKEN";
pub const ENV_DESTINATIONS: &str = "DEALWATCH_DESTINATIONS";
pub const ENV_CHANNELS: &str = "DEALWATCH_CHANNELS";
pub const ENV_SEEN_FILE: &str = "DEALWATCH_SEEN_FILE";
pub const ENV_MATCH_LOG: &str = "DEALWATCH_MATCH_LOG";
pub const ENV_HEALTH_FILE: &str = "DEALWATCH_HEALTH_FILE";
pub const ENV_QUIET_WINDOW: &str = "DEALWATCH_QUIET_WINDOW_SECS";
pub const ENV_SEEN_CAPACITY: &str = "DEALWATCH_SEEN_CAPACITY";
pub const ENV_SNAPSHOT_INTERVAL: &str = "DEALWATCH_SNAPSHOT_INTERVAL_SECS";
pub const ENV_NOTIFY_TIMEOUT: &str = "DEALWATCH_NOTIFY_TIMEOUT_SECS";
pub const ENV_NOTIFY_RETRIES: &str = "DEALWATCH_NOTIFY_RETRIES";
pub const ENV_TUNABLES_PATH: &str = "DEALWATCH_CONFIG";

pub const DEFAULT_QUIET_WINDOW_SECS: u64 = 8;
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_NOTIFY_RETRIES: u8 = 3;

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    /// Destination chat ids for alerts.
    pub destinations: Vec<String>,
    /// Monitored channel labels; empty list means "accept everything".
    pub channels: Vec<String>,
    pub seen_file: PathBuf,
    pub match_log_file: PathBuf,
    pub health_file: PathBuf,
    pub quiet_window_secs: u64,
    pub seen_capacity: usize,
    pub snapshot_interval_secs: u64,
    pub notify_timeout_secs: u64,
    pub notify_retries: u8,
}

/// File-overridable tunables (`DEALWATCH_CONFIG` points at a TOML file);
/// env vars still win over the file.
#[derive(Debug, Default, Deserialize)]
struct Tunables {
    quiet_window_secs: Option<u64>,
    seen_capacity: Option<usize>,
    snapshot_interval_secs: Option<u64>,
    notify_timeout_secs: Option<u64>,
    notify_retries: Option<u8>,
}

impl Tunables {
    fn load() -> Result<Self> {
        let Ok(path) = std::env::var(ENV_TUNABLES_PATH) else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading tunables from {path}"))?;
        toml::from_str(&content).with_context(|| format!("parsing tunables {path}"))
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mut missing = Vec::new();

        let bot_token = env_nonempty(ENV_BOT_TOKEN).unwrap_or_else(|| {
            missing.push(ENV_BOT_TOKEN);
            String::new()
        });
        let destinations = split_csv(&env_nonempty(ENV_DESTINATIONS).unwrap_or_else(|| {
            missing.push(ENV_DESTINATIONS);
            String::new()
        }));

        if !missing.is_empty() {
            bail!("missing required env vars: {}", missing.join(", "));
        }

        let channels: Vec<String> = split_csv(&env_nonempty(ENV_CHANNELS).unwrap_or_default())
            .iter()
            .map(|c| norm_channel(c))
            .collect();

        let tunables = Tunables::load()?;
        let quiet_window_secs = parse_env(ENV_QUIET_WINDOW)?
            .or(tunables.quiet_window_secs)
            .unwrap_or(DEFAULT_QUIET_WINDOW_SECS);
        let seen_capacity = parse_env(ENV_SEEN_CAPACITY)?
            .or(tunables.seen_capacity)
            .unwrap_or(crate::dedup::DEFAULT_CAPACITY);
        let snapshot_interval_secs = parse_env(ENV_SNAPSHOT_INTERVAL)?
            .or(tunables.snapshot_interval_secs)
            .unwrap_or(DEFAULT_SNAPSHOT_INTERVAL_SECS);
        let notify_timeout_secs = parse_env(ENV_NOTIFY_TIMEOUT)?
            .or(tunables.notify_timeout_secs)
            .unwrap_or(DEFAULT_NOTIFY_TIMEOUT_SECS);
        let notify_retries = parse_env(ENV_NOTIFY_RETRIES)?
            .or(tunables.notify_retries)
            .unwrap_or(DEFAULT_NOTIFY_RETRIES);

        Ok(Self {
            bot_token,
            destinations,
            channels,
            seen_file: env_path(ENV_SEEN_FILE, "/tmp/dealwatch_seen.json"),
            match_log_file: env_path(ENV_MATCH_LOG, "/tmp/dealwatch_matches.log"),
            health_file: env_path(ENV_HEALTH_FILE, "/tmp/dealwatch_health"),
            quiet_window_secs,
            seen_capacity,
            snapshot_interval_secs,
            notify_timeout_secs,
            notify_retries,
        })
    }

    /// True if a fragment from `channel_label` should be processed.
    pub fn is_monitored(&self, channel_label: &str) -> bool {
        if self.channels.is_empty() {
            return true;
        }
        let label = norm_channel(channel_label);
        self.channels.iter().any(|c| c.eq_ignore_ascii_case(&label))
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_path(name: &str, default: &str) -> PathBuf {
    env_nonempty(name).map(PathBuf::from).unwrap_or_else(|| default.into())
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_nonempty(name) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse() {
            Ok(v) => Ok(Some(v)),
            Err(e) => bail!("invalid {name}={raw}: {e}"),
        },
    }
}

pub fn split_csv(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Channel label normalization: numeric chat ids pass through, usernames are
/// lowercased and `@`-prefixed.
pub fn norm_channel(raw: &str) -> String {
    let t = raw.trim();
    if t.is_empty() || is_chat_id(t) {
        return t.to_string();
    }
    let lower = t.to_lowercase();
    if lower.starts_with('@') {
        lower
    } else {
        format!("@{lower}")
    }
}

fn is_chat_id(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env() {
        for name in [
            ENV_BOT_TOKEN,
            ENV_DESTINATIONS,
            ENV_CHANNELS,
            ENV_SEEN_FILE,
            ENV_MATCH_LOG,
            ENV_HEALTH_FILE,
            ENV_QUIET_WINDOW,
            ENV_SEEN_CAPACITY,
            ENV_SNAPSHOT_INTERVAL,
            ENV_NOTIFY_TIMEOUT,
            ENV_NOTIFY_RETRIES,
            ENV_TUNABLES_PATH,
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn csv_split_trims_and_drops_empties() {
        assert_eq!(split_csv(" a , ,b,"), vec!["a".to_string(), "b".into()]);
        assert!(split_csv("").is_empty());
    }

    #[test]
    fn channel_normalization() {
        assert_eq!(norm_channel("Promos"), "@promos");
        assert_eq!(norm_channel("@OFERTAS"), "@ofertas");
        assert_eq!(norm_channel("-1001234"), "-1001234");
        assert_eq!(norm_channel("12345"), "12345");
    }

    #[serial]
    #[test]
    fn missing_required_envs_are_reported_together() {
        clear_env();
        let err = Config::from_env().unwrap_err().to_string();
        assert!(err.contains(ENV_BOT_TOKEN), "{err}");
        assert!(err.contains(ENV_DESTINATIONS), "{err}");
    }

    #[serial]
    #[test]
    fn loads_with_defaults() {
        clear_env();
        env::set_var(ENV_BOT_TOKEN, "123:abc");
        env::set_var(ENV_DESTINATIONS, "111, 222");
        env::set_var(ENV_CHANNELS, "Promos, @Hard2,  -100999");

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.destinations, vec!["111".to_string(), "222".into()]);
        assert_eq!(
            cfg.channels,
            vec!["@promos".to_string(), "@hard2".into(), "-100999".into()]
        );
        assert_eq!(cfg.quiet_window_secs, DEFAULT_QUIET_WINDOW_SECS);
        assert_eq!(cfg.seen_capacity, crate::dedup::DEFAULT_CAPACITY);
        assert_eq!(cfg.notify_timeout_secs, DEFAULT_NOTIFY_TIMEOUT_SECS);
        assert_eq!(cfg.notify_retries, DEFAULT_NOTIFY_RETRIES);

        assert!(cfg.is_monitored("promos"));
        assert!(cfg.is_monitored("@PROMOS"));
        assert!(!cfg.is_monitored("@outros"));
        clear_env();
    }

    #[serial]
    #[test]
    fn env_overrides_tunables_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dealwatch.toml");
        std::fs::write(
            &path,
            "quiet_window_secs = 12\nseen_capacity = 50\nnotify_retries = 5\n",
        )
        .unwrap();

        env::set_var(ENV_BOT_TOKEN, "123:abc");
        env::set_var(ENV_DESTINATIONS, "111");
        env::set_var(ENV_TUNABLES_PATH, path.display().to_string());
        env::set_var(ENV_QUIET_WINDOW, "5");

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.quiet_window_secs, 5); // env wins
        assert_eq!(cfg.seen_capacity, 50); // file fills the rest
        assert_eq!(cfg.notify_retries, 5);
        assert_eq!(cfg.notify_timeout_secs, DEFAULT_NOTIFY_TIMEOUT_SECS);
        clear_env();
    }

    #[serial]
    #[test]
    fn empty_channel_list_accepts_everything() {
        clear_env();
        env::set_var(ENV_BOT_TOKEN, "123:abc");
        env::set_var(ENV_DESTINATIONS, "111");
        let cfg = Config::from_env().unwrap();
        assert!(cfg.is_monitored("@whatever"));
        clear_env();
    }

    #[serial]
    #[test]
    fn bad_numeric_env_is_fatal() {
        clear_env();
        env::set_var(ENV_BOT_TOKEN, "123:abc");
        env::set_var(ENV_DESTINATIONS, "111");
        env::set_var(ENV_QUIET_WINDOW, "soon");
        assert!(Config::from_env().is_err());
        clear_env();
    }
}
