use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;

use crate::calendar::Calendar;

/// Startup configuration, read once from `ROOMLEDGER_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub calendar: Calendar,
    pub sweep_interval: Duration,
    pub compact_threshold: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={:?}: {}", self.var, self.value, self.reason)
    }
}

impl std::error::Error for ConfigError {}

fn parse<T: std::str::FromStr>(
    var: &'static str,
    value: Option<String>,
    default: T,
    reason: &'static str,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| ConfigError { var, value: v, reason }),
    }
}

/// `Z`, `UTC`, or `±HH:MM`.
pub fn parse_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match *s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (h, m) = rest.split_once(':')?;
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(h) || !two_digits(m) {
        return None;
    }
    let hours: i32 = h.parse().ok()?;
    let minutes: i32 = m.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = lookup("ROOMLEDGER_BIND").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse("ROOMLEDGER_PORT", lookup("ROOMLEDGER_PORT"), 8080u16, "not a port number")?;
        let data_dir = PathBuf::from(lookup("ROOMLEDGER_DATA_DIR").unwrap_or_else(|| "./data".into()));
        let metrics_port = match lookup("ROOMLEDGER_METRICS_PORT") {
            None => None,
            Some(v) => Some(v.trim().parse().map_err(|_| ConfigError {
                var: "ROOMLEDGER_METRICS_PORT",
                value: v,
                reason: "not a port number",
            })?),
        };
        let calendar = match lookup("ROOMLEDGER_UTC_OFFSET") {
            None => Calendar::host_local(),
            Some(v) => Calendar::new(parse_offset(&v).ok_or(ConfigError {
                var: "ROOMLEDGER_UTC_OFFSET",
                value: v,
                reason: "expected Z, UTC or ±HH:MM",
            })?),
        };
        let sweep_secs: u64 = parse(
            "ROOMLEDGER_SWEEP_INTERVAL_SECS",
            lookup("ROOMLEDGER_SWEEP_INTERVAL_SECS"),
            300,
            "not a number of seconds",
        )?;
        if sweep_secs == 0 {
            return Err(ConfigError {
                var: "ROOMLEDGER_SWEEP_INTERVAL_SECS",
                value: "0".into(),
                reason: "must be positive",
            });
        }
        let compact_threshold = parse(
            "ROOMLEDGER_COMPACT_THRESHOLD",
            lookup("ROOMLEDGER_COMPACT_THRESHOLD"),
            1000u64,
            "not a number",
        )?;

        Ok(Self {
            bind,
            port,
            data_dir,
            metrics_port,
            calendar,
            sweep_interval: Duration::from_secs(sweep_secs),
            compact_threshold,
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("roomledger.wal")
    }
}
