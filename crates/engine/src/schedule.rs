//! Schedule expander: turns `5s-30s-120s` into `[5, 30, 120]`.
//!
//! Every offset is measured from the start of the run, not from the previous
//! reminder. Units are not interpreted: the trailing `s` is stripped and the
//! remainder is always read as seconds.

use std::time::Duration;

use thiserror::Error;

/// Separator between delay tokens.
pub const TOKEN_SEPARATOR: char = '-';

/// Unit suffix stripped from each token.
pub const UNIT_SUFFIX: char = 's';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid delay token '{token}' in schedule '{schedule}'")]
    InvalidToken { token: String, schedule: String },
}

/// Expand a schedule string into delay offsets in seconds, preserving order.
///
/// Fails on the first token that is not a non-negative integer once the unit
/// suffix is removed; no partial result is returned.
pub fn expand(schedule: &str) -> Result<Vec<u64>, ScheduleError> {
    schedule
        .split(TOKEN_SEPARATOR)
        .map(|token| {
            token
                .trim_end_matches(UNIT_SUFFIX)
                .parse::<u64>()
                .map_err(|_| ScheduleError::InvalidToken {
                    token: token.to_string(),
                    schedule: schedule.to_string(),
                })
        })
        .collect()
}

/// Offsets as sleepable durations.
pub fn as_durations(offsets: &[u64]) -> Vec<Duration> {
    offsets.iter().copied().map(Duration::from_secs).collect()
}
