use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const ARG_SESSION_HOURS: &str = "session-hours";
pub const ARG_BAN_THRESHOLD: &str = "ban-threshold";
pub const ARG_BAN_WINDOW_MINUTES: &str = "ban-window-minutes";
pub const ARG_NOT_FOUND_DELAY_MS: &str = "not-found-delay-ms";

/// One year, in hours and in minutes.
const MAX_SESSION_HOURS: u64 = 365 * 24;
const MAX_BAN_WINDOW_MINUTES: u64 = 365 * 24 * 60;

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_HOURS)
                .long(ARG_SESSION_HOURS)
                .help("Idle lifetime of a web session, in hours")
                .env("PICCOLO_SESSION_HOURS")
                .default_value("6")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_SESSION_HOURS)),
        )
        .arg(
            Arg::new(ARG_BAN_THRESHOLD)
                .long(ARG_BAN_THRESHOLD)
                .help("Failed logins from one IP that trigger a ban")
                .env("PICCOLO_BAN_THRESHOLD")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_BAN_WINDOW_MINUTES)
                .long(ARG_BAN_WINDOW_MINUTES)
                .help("Minutes a failed login counts toward a ban")
                .env("PICCOLO_BAN_WINDOW_MINUTES")
                .default_value("20")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_BAN_WINDOW_MINUTES)),
        )
        .arg(
            Arg::new(ARG_NOT_FOUND_DELAY_MS)
                .long(ARG_NOT_FOUND_DELAY_MS)
                .help("Penalty delay before answering a request for a missing path, in milliseconds")
                .env("PICCOLO_NOT_FOUND_DELAY_MS")
                .default_value("4000")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub session_lifetime: Duration,
    pub ban_threshold: usize,
    pub ban_window: Duration,
    pub not_found_delay: Duration,
}

impl Options {
    /// # Errors
    /// Returns an error if a value is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let get = |name: &str| {
            matches
                .get_one::<u64>(name)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{name}"))
        };

        let threshold = matches
            .get_one::<u32>(ARG_BAN_THRESHOLD)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_BAN_THRESHOLD}"))?;
        let seconds = |value: u64, unit: u64, name: &str| {
            value
                .checked_mul(unit)
                .map(Duration::from_secs)
                .ok_or_else(|| anyhow::anyhow!("value of --{name} is too large"))
        };

        Ok(Self {
            session_lifetime: seconds(get(ARG_SESSION_HOURS)?, 60 * 60, ARG_SESSION_HOURS)?,
            ban_threshold: usize::try_from(threshold)?,
            ban_window: seconds(get(ARG_BAN_WINDOW_MINUTES)?, 60, ARG_BAN_WINDOW_MINUTES)?,
            not_found_delay: Duration::from_millis(get(ARG_NOT_FOUND_DELAY_MS)?),
        })
    }
}
