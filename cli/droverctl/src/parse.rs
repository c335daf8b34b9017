//! Argument and input-file parsing.
//!
//! Durations use the `XdYhZmWs` form (`90s`, `1h30m`, `7d`); each unit may
//! appear at most once, in that order.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use drover_id::JobKey;
use drover_sla::JobUptimeLimit;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid duration '{0}', expected the form XdYhZmWs (e.g. 1h30m)")]
    Duration(String),

    #[error("invalid percentage '{0}', must be a number in (0, 100]")]
    Percentage(String),

    #[error("invalid percentile '{0}', must be a number in (0, 100)")]
    Percentile(String),

    #[error("empty host list")]
    EmptyHosts,

    #[error("{path}:{line}: {reason}")]
    Override {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

const UNITS: [(char, u64); 4] = [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)];

pub fn parse_duration(input: &str) -> Result<Duration, ParseError> {
    let invalid = || ParseError::Duration(input.to_string());
    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u64 = 0;
    let mut next_unit = 0;

    while !rest.is_empty() {
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        let unit = rest[digits..].chars().next().ok_or_else(invalid)?;

        let offset = UNITS[next_unit..]
            .iter()
            .position(|(name, _)| *name == unit)
            .ok_or_else(invalid)?;
        let (_, secs) = UNITS[next_unit + offset];
        next_unit += offset + 1;

        total = value
            .checked_mul(secs)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(invalid)?;
        rest = &rest[digits + unit.len_utf8()..];
    }

    Ok(Duration::from_secs(total))
}

/// Render a duration in the `XdYhZmWs` form, omitting zero units.
pub fn format_duration(duration: Duration) -> String {
    let mut remaining = duration.as_secs();
    if remaining == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (name, secs) in UNITS {
        let value = remaining / secs;
        if value > 0 {
            out.push_str(&format!("{value}{name}"));
            remaining %= secs;
        }
    }
    out
}

pub fn parse_percentage(input: &str) -> Result<f64, ParseError> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| ParseError::Percentage(input.to_string()))?;
    if value > 0.0 && value <= 100.0 {
        Ok(value)
    } else {
        Err(ParseError::Percentage(input.to_string()))
    }
}

pub fn parse_percentile(input: &str) -> Result<f64, ParseError> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| ParseError::Percentile(input.to_string()))?;
    if value > 0.0 && value < 100.0 {
        Ok(value)
    } else {
        Err(ParseError::Percentile(input.to_string()))
    }
}

/// Parse a comma-separated host list.
pub fn parse_hosts(input: &str) -> Result<BTreeSet<String>, ParseError> {
    let hosts: BTreeSet<String> = input
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect();
    if hosts.is_empty() {
        return Err(ParseError::EmptyHosts);
    }
    Ok(hosts)
}

/// Read one host per line, ignoring blank lines.
pub fn read_hosts_file(path: &Path) -> Result<BTreeSet<String>, ParseError> {
    let contents = read(path)?;
    let hosts: BTreeSet<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if hosts.is_empty() {
        return Err(ParseError::EmptyHosts);
    }
    Ok(hosts)
}

/// Read per-job SLA overrides: `cluster/role/env/job percentage duration` per line.
pub fn read_override_file(path: &Path) -> Result<BTreeMap<JobKey, JobUptimeLimit>, ParseError> {
    let contents = read(path)?;
    parse_overrides(&path.display().to_string(), &contents)
}

pub fn parse_overrides(
    source: &str,
    contents: &str,
) -> Result<BTreeMap<JobKey, JobUptimeLimit>, ParseError> {
    let mut limits = BTreeMap::new();

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fail = |reason: String| ParseError::Override {
            path: source.to_string(),
            line: index + 1,
            reason,
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [job, percentage, duration] = fields[..] else {
            return Err(fail(format!(
                "expected 'cluster/role/env/job percentage duration', got '{line}'"
            )));
        };

        let job: JobKey = job.parse().map_err(|e| fail(format!("{e}")))?;
        let percentage = parse_percentage(percentage).map_err(|e| fail(e.to_string()))?;
        let duration = parse_duration(duration).map_err(|e| fail(e.to_string()))?;

        limits.insert(
            job.clone(),
            JobUptimeLimit {
                job,
                percentage,
                duration_secs: duration_secs(duration),
            },
        );
    }

    Ok(limits)
}

/// Whole seconds of `duration` as the signed type the SLA engine uses.
pub fn duration_secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

fn read(path: &Path) -> Result<String, ParseError> {
    fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })
}
