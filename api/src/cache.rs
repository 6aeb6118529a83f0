use crate::{CacheEntry, ScheduledMatch};
use chrono::Duration;
use std::fmt;

/// Freshness windows for cached round state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Used while any scheduled match is estimated to be in progress.
    pub short: Duration,
    pub normal: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self { short: Duration::minutes(3), normal: Duration::minutes(30) }
    }
}

/// Rough length of a series. Accepts `"3"` as well as `"bo3"`.
pub fn estimated_duration(best_of: &str) -> Duration {
    let best_of = best_of.trim().to_lowercase();
    match best_of.strip_prefix("bo").unwrap_or(&best_of) {
        "1" => Duration::minutes(90),
        "3" => Duration::hours(4),
        "5" => Duration::hours(6),
        _ => Duration::hours(3),
    }
}

/// Inclusive at both ends: `start <= now <= start + estimated_duration`.
pub fn is_ongoing(scheduled: &ScheduledMatch, now: i64) -> bool {
    let end = scheduled.start + estimated_duration(&scheduled.best_of).num_seconds();
    now >= scheduled.start && now <= end
}

impl CachePolicy {
    pub fn freshness_window(&self, schedule: &[ScheduledMatch], now: i64) -> Duration {
        if schedule.iter().any(|m| is_ongoing(m, now)) {
            self.short
        } else {
            self.normal
        }
    }

    /// Absolute expiry, in epoch seconds, for state computed at `now`.
    pub fn ttl_for(&self, schedule: &[ScheduledMatch], now: i64) -> i64 {
        now + self.freshness_window(schedule, now).num_seconds()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    Missing,
    Expired { ttl: i64 },
}

impl fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshReason::Missing => write!(f, "no cached results"),
            RefreshReason::Expired { ttl } => write!(f, "cached results expired at {ttl}"),
        }
    }
}

/// Why the cached entry has to be recomputed, if it does. The schedule is
/// already folded into `ttl` when the entry is written.
pub fn refresh_reason(entry: Option<&CacheEntry>, now: i64) -> Option<RefreshReason> {
    match entry {
        None => Some(RefreshReason::Missing),
        Some(entry) if entry.ttl < now => Some(RefreshReason::Expired { ttl: entry.ttl }),
        Some(_) => None,
    }
}

pub fn should_refresh(entry: Option<&CacheEntry>, now: i64) -> bool {
    refresh_reason(entry, now).is_some()
}
