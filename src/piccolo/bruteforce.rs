//! In-memory brute-force protection for the login flow.
//!
//! Every failed login is appended under a random key; nothing is deduplicated. A ban is never
//! stored: `banned` drops the records that left the window and recounts the rest for the
//! queried IP, so a ban lifts by itself once old failures age out.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::{fmt::Write as _, sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::utils::random_id;

pub const DEFAULT_BAN_THRESHOLD: usize = 5;
pub const DEFAULT_BAN_WINDOW: Duration = Duration::from_secs(20 * 60);

const RECORD_KEY_LENGTH: usize = 10;

#[derive(Clone, Debug)]
struct FailedAccess {
    ip: String,
    timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct BruteForceGuard {
    failures: Arc<DashMap<String, FailedAccess>>,
    threshold: usize,
    window: TimeDelta,
}

impl Default for BruteForceGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl BruteForceGuard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            failures: Arc::new(DashMap::new()),
            threshold: DEFAULT_BAN_THRESHOLD,
            window: TimeDelta::minutes(20),
        }
    }

    /// Thresholds below one are raised to one.
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        if threshold == 0 {
            warn!("ban threshold 0 would ban every client, using 1");
        }
        self.threshold = threshold.max(1);
        self
    }

    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        match TimeDelta::from_std(window) {
            Ok(window) => self.window = window,
            Err(_) => warn!("ban window out of range, keeping {}", self.window),
        }
        self
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    #[must_use]
    pub fn window(&self) -> TimeDelta {
        self.window
    }

    pub fn record_failed_login(&self, ip: &str) {
        self.record_failed_login_at(ip, Utc::now());
    }

    fn record_failed_login_at(&self, ip: &str, timestamp: DateTime<Utc>) {
        self.failures.insert(
            random_id(RECORD_KEY_LENGTH),
            FailedAccess {
                ip: ip.to_string(),
                timestamp,
            },
        );
        debug!("failed login recorded for {ip}");
    }

    /// Whether `ip` reached the failure threshold inside the window.
    #[must_use]
    pub fn banned(&self, ip: &str) -> bool {
        self.banned_at(ip, Utc::now())
    }

    fn banned_at(&self, ip: &str, now: DateTime<Utc>) -> bool {
        let oldest = now - self.window;
        self.failures.retain(|_, access| access.timestamp >= oldest);

        let failures = self
            .failures
            .iter()
            .filter(|entry| entry.value().ip == ip)
            .count();
        failures >= self.threshold
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Printable dump of the failure log for trace logging.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut info = format!(
            "number of failed logins in the last {} minutes: {}\n",
            self.window.num_minutes(),
            self.failures.len()
        );
        for entry in self.failures.iter() {
            let _ = writeln!(
                info,
                "\tkey = {}\n\t\ttimestamp = {}\n\t\tip = {}",
                entry.key(),
                entry.value().timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.value().ip
            );
        }
        info
    }
}
