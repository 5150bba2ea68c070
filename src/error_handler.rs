// bitwig-mcp
// Copyright (C) 2024  The bitwig-mcp authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Retry, health tracking and diagnostics for the OSC link.
//!
//! UDP gives no delivery guarantees, so the bridge tracks whether Bitwig is still answering.
//! Only timeouts accumulate: any other error or a success resets the consecutive-timeout
//! counter. The counter detects a stuck link, not a general error rate.

use crate::{
    error::{Error, Result},
    limits::{self, Policy},
};
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    sync::{Mutex, MutexGuard},
    thread,
    time::{Duration, Instant, SystemTime},
};

/// More consecutive timeouts than this mark the link unhealthy.
const MAX_CONSECUTIVE_TIMEOUTS: u32 = 3;

/// The link is unhealthy if the last success is older than this.
const SUCCESS_WINDOW: Duration = Duration::from_secs(10);

const MAX_RECENT_ERRORS: usize = 10;

/// The observed state of the connection to Bitwig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    /// Nothing has been recorded yet.
    Unknown,
    Healthy,
    Unhealthy,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Health::Unknown => "unknown",
            Health::Healthy => "healthy",
            Health::Unhealthy => "unhealthy",
        })
    }
}

/// Bounds for [`ErrorHandler::retry_with_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of attempts. Zero is treated as one.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Budget for all attempts combined.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Tracks errors, connection health and known Bitwig features.
///
/// One handler is owned by each [`Controller`](crate::controller::Controller). All methods take
/// `&self`, so the handler can be shared behind an [`Arc`](std::sync::Arc).
#[derive(Debug, Default)]
pub struct ErrorHandler {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    supported_features: BTreeSet<String>,
    unsupported_features: BTreeSet<String>,
    recent_errors: HashMap<String, RecordedError>,
    // Orders recent errors for eviction.
    error_counter: u64,
    last_success: Option<(Instant, SystemTime)>,
    consecutive_timeouts: u32,
    last_error: Option<Error>,
    successes: u64,
}

#[derive(Debug, Clone)]
struct RecordedError {
    order: u64,
    at: SystemTime,
    error: Error,
}

impl ErrorHandler {
    pub fn new() -> ErrorHandler {
        ErrorHandler::default()
    }

    /// Clears recent errors, the last error and the consecutive-timeout counter.
    pub fn clear_errors(&self) {
        let mut state = self.lock();
        state.recent_errors.clear();
        state.consecutive_timeouts = 0;
        state.last_error = None;
    }

    /// Records an error under a category such as `transport`, `track` or an operation name.
    ///
    /// Keeps the most recent error per category, evicting the oldest category beyond ten.
    pub fn record_error(&self, category: &str, error: Error) {
        log::error!("{}: {}", category, error);
        let mut state = self.lock();
        state.error_counter += 1;
        let recorded = RecordedError {
            order: state.error_counter,
            at: SystemTime::now(),
            error: error.clone(),
        };
        state.recent_errors.insert(category.to_owned(), recorded);

        if state.recent_errors.len() > MAX_RECENT_ERRORS {
            let oldest = state
                .recent_errors
                .iter()
                .min_by_key(|(_, recorded)| recorded.order)
                .map(|(category, _)| category.clone());
            if let Some(oldest) = oldest {
                state.recent_errors.remove(&oldest);
            }
        }

        if error.is_timeout() {
            state.consecutive_timeouts += 1;
        } else {
            state.consecutive_timeouts = 0;
        }
        state.last_error = Some(error);
    }

    pub fn record_success(&self) {
        let mut state = self.lock();
        state.last_success = Some((Instant::now(), SystemTime::now()));
        state.consecutive_timeouts = 0;
        state.successes += 1;
    }

    pub fn health(&self) -> Health {
        self.lock().health()
    }

    /// Returns false once the link looks stuck. A link with no history counts as healthy.
    pub fn check_connection_health(&self) -> bool {
        self.health() != Health::Unhealthy
    }

    pub fn consecutive_timeouts(&self) -> u32 {
        self.lock().consecutive_timeouts
    }

    pub fn last_error(&self) -> Option<Error> {
        self.lock().last_error.clone()
    }

    /// The number of successes recorded so far.
    pub fn successes(&self) -> u64 {
        self.lock().successes
    }

    /// The most recent error per category.
    pub fn recent_errors(&self) -> BTreeMap<String, Error> {
        self.lock()
            .recent_errors
            .iter()
            .map(|(category, recorded)| (category.clone(), recorded.error.clone()))
            .collect()
    }

    /// Validates a 1-based track index against `max_tracks`.
    pub fn validate_track_index(&self, track_index: i32, max_tracks: i32) -> Result<i32> {
        limits::TRACK_INDEX
            .with_max(f64::from(max_tracks))
            .index_value(track_index)
    }

    /// Validates a 1-based parameter index against `max_params`.
    pub fn validate_parameter_index(&self, param_index: i32, max_params: i32) -> Result<i32> {
        limits::PARAMETER_INDEX
            .with_max(f64::from(max_params))
            .index_value(param_index)
    }

    /// Clamps a value into `min..=max`, logging a warning when it had to be clamped.
    ///
    /// Only non-finite values are rejected. Callers needing strict bounds use
    /// [`Policy::Reject`] through [`limits::Limit`].
    pub fn validate_float_value(&self, name: &str, value: f64, min: f64, max: f64) -> Result<f64> {
        limits::clamp_value(name, value, min, max, Policy::Clamp)
    }

    /// Runs `operation` until it succeeds, the attempts run out or the timeout elapses.
    ///
    /// `operation` receives the time left in the budget. A success is recorded once. When every
    /// attempt fails the last error is recorded under `operation_name` and returned, or a
    /// [`Error::Timeout`] is returned instead if the budget ran out.
    pub fn retry_with_timeout<T, F>(
        &self,
        operation_name: &str,
        policy: RetryPolicy,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut(Duration) -> Result<T>,
    {
        let attempts = policy.max_retries.max(1);
        let start = Instant::now();

        for attempt in 1..=attempts {
            let elapsed = start.elapsed();
            let result = if elapsed > policy.timeout {
                Err(Error::timeout(operation_name, policy.timeout))
            } else {
                operation(policy.timeout - elapsed)
            };

            let err = match result {
                Ok(value) => {
                    self.record_success();
                    return Ok(value);
                }
                Err(err) => err,
            };
            log::warn!(
                "Attempt {}/{} for {} failed: {}",
                attempt,
                attempts,
                operation_name,
                err
            );

            if attempt == attempts {
                let err = if start.elapsed() > policy.timeout {
                    Error::timeout(operation_name, policy.timeout)
                } else {
                    err
                };
                self.record_error(operation_name, err.clone());
                return Err(err);
            }
            thread::sleep(policy.retry_delay);
        }

        unreachable!("at least one attempt is always made")
    }

    /// Returns whether a feature is known to be supported.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FeatureNotSupported`] if the feature is known to be unsupported.
    /// Unknown features return `Ok(false)`.
    pub fn check_feature_supported(&self, feature: &str, requirement: Option<&str>) -> Result<bool> {
        let state = self.lock();
        if state.supported_features.contains(feature) {
            return Ok(true);
        }
        if state.unsupported_features.contains(feature) {
            return Err(Error::FeatureNotSupported {
                feature: feature.to_owned(),
                requirement: requirement.map(str::to_owned),
            });
        }
        Ok(false)
    }

    pub fn mark_feature_supported(&self, feature: &str) {
        let mut state = self.lock();
        state.unsupported_features.remove(feature);
        state.supported_features.insert(feature.to_owned());
    }

    pub fn mark_feature_unsupported(&self, feature: &str) {
        let mut state = self.lock();
        state.supported_features.remove(feature);
        state.unsupported_features.insert(feature.to_owned());
    }

    pub fn diagnostic_info(&self) -> Diagnostics {
        let state = self.lock();
        let health = state.health();
        Diagnostics {
            connection_status: ConnectionStatus {
                last_successful_comm: state.last_success.map(|(_, at)| unix_seconds(at)),
                consecutive_timeouts: state.consecutive_timeouts,
                last_error: state.last_error.as_ref().map(Error::to_string),
                connection_healthy: health != Health::Unhealthy,
                health,
                successes: state.successes,
            },
            recent_errors: state
                .recent_errors
                .iter()
                .map(|(category, recorded)| {
                    let entry = RecentError {
                        timestamp: unix_seconds(recorded.at),
                        error: recorded.error.to_string(),
                    };
                    (category.clone(), entry)
                })
                .collect(),
            supported_features: state.supported_features.iter().cloned().collect(),
            unsupported_features: state.unsupported_features.iter().cloned().collect(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl State {
    fn health(&self) -> Health {
        if self.consecutive_timeouts > MAX_CONSECUTIVE_TIMEOUTS {
            return Health::Unhealthy;
        }
        match self.last_success {
            Some((at, _)) if at.elapsed() > SUCCESS_WINDOW => Health::Unhealthy,
            Some(_) => Health::Healthy,
            None if self.last_error.is_none() => Health::Unknown,
            None => Health::Healthy,
        }
    }
}

fn unix_seconds(at: SystemTime) -> f64 {
    at.duration_since(SystemTime::UNIX_EPOCH)
        .map(|since| since.as_secs_f64())
        .unwrap_or(0.0)
}

/// A serializable snapshot of an [`ErrorHandler`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub connection_status: ConnectionStatus,
    pub recent_errors: BTreeMap<String, RecentError>,
    pub supported_features: Vec<String>,
    pub unsupported_features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatus {
    /// Unix time in seconds.
    pub last_successful_comm: Option<f64>,
    pub consecutive_timeouts: u32,
    pub last_error: Option<String>,
    pub connection_healthy: bool,
    pub health: Health,
    pub successes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentError {
    /// Unix time in seconds.
    pub timestamp: f64,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            retry_delay: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }
    }

    fn timeout_error() -> Error {
        Error::timeout("ping", Duration::from_secs(1))
    }

    #[test]
    fn test_starts_unknown() {
        let handler = ErrorHandler::new();
        assert_eq!(handler.health(), Health::Unknown);
        assert!(handler.check_connection_health());
    }

    #[test]
    fn test_health_transitions() {
        let handler = ErrorHandler::new();
        for _ in 0..3 {
            handler.record_error("ping", timeout_error());
        }
        assert!(handler.check_connection_health());

        handler.record_error("ping", timeout_error());
        assert_eq!(handler.consecutive_timeouts(), 4);
        assert!(!handler.check_connection_health());
        assert_eq!(handler.health(), Health::Unhealthy);

        handler.record_success();
        assert!(handler.check_connection_health());
        assert_eq!(handler.health(), Health::Healthy);
    }

    #[test]
    fn test_old_success_is_unhealthy() {
        let handler = ErrorHandler::new();
        handler.record_success();
        let (at, wall) = match Instant::now().checked_sub(Duration::from_secs(11)) {
            Some(at) => (at, SystemTime::now() - Duration::from_secs(11)),
            // The monotonic clock started less than 11s ago.
            None => return,
        };
        handler.lock().last_success = Some((at, wall));
        assert_eq!(handler.consecutive_timeouts(), 0);
        assert_eq!(handler.health(), Health::Unhealthy);
        assert!(!handler.check_connection_health());

        handler.record_success();
        assert_eq!(handler.health(), Health::Healthy);
    }

    #[test]
    fn test_non_timeout_resets_counter() {
        let handler = ErrorHandler::new();
        handler.record_error("ping", timeout_error());
        handler.record_error("ping", timeout_error());
        handler.record_error("track", Error::not_found("Track", 1));
        assert_eq!(handler.consecutive_timeouts(), 0);
        assert_eq!(handler.last_error(), Some(Error::not_found("Track", 1)));
    }

    #[test]
    fn test_recent_errors_are_bounded() {
        let handler = ErrorHandler::new();
        for i in 0..12 {
            handler.record_error(&format!("category{}", i), Error::not_found("Track", i));
        }
        let recent = handler.recent_errors();
        assert_eq!(recent.len(), 10);
        assert!(!recent.contains_key("category0"));
        assert!(!recent.contains_key("category1"));
        assert!(recent.contains_key("category11"));
    }

    #[test]
    fn test_recent_errors_keep_latest_per_category() {
        let handler = ErrorHandler::new();
        handler.record_error("track", Error::not_found("Track", 1));
        handler.record_error("track", Error::not_found("Track", 2));
        assert_eq!(
            handler.recent_errors().get("track"),
            Some(&Error::not_found("Track", 2))
        );
    }

    #[test]
    fn test_clear_errors() {
        let handler = ErrorHandler::new();
        handler.record_error("ping", timeout_error());
        handler.clear_errors();
        assert!(handler.recent_errors().is_empty());
        assert_eq!(handler.consecutive_timeouts(), 0);
        assert_eq!(handler.last_error(), None);
    }

    #[test]
    fn test_retry_succeeds_after_failures() {
        let handler = ErrorHandler::new();
        let calls = Cell::new(0);
        let result = handler.retry_with_timeout("x", fast_policy(3), |_| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(Error::connection("flaky"))
            } else {
                Ok("done")
            }
        });
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.get(), 3);
        assert_eq!(handler.successes(), 1);
        assert!(handler.recent_errors().is_empty());
        assert_eq!(handler.last_error(), None);
    }

    #[test]
    fn test_retry_exhaustion_records_last_error() {
        let handler = ErrorHandler::new();
        let calls = Cell::new(0);
        let result: Result<()> = handler.retry_with_timeout("x", fast_policy(2), |_| {
            calls.set(calls.get() + 1);
            Err(Error::not_found("Track", calls.get()))
        });
        assert_eq!(result, Err(Error::not_found("Track", 2)));
        assert_eq!(calls.get(), 2);
        assert_eq!(
            handler.recent_errors().get("x"),
            Some(&Error::not_found("Track", 2))
        );
        assert_eq!(handler.successes(), 0);
    }

    #[test]
    fn test_retry_timeout_wins() {
        let handler = ErrorHandler::new();
        let policy = RetryPolicy {
            max_retries: 3,
            retry_delay: Duration::from_millis(30),
            timeout: Duration::from_millis(40),
        };
        let calls = Cell::new(0);
        let result: Result<()> = handler.retry_with_timeout("slow", policy, |remaining| {
            calls.set(calls.get() + 1);
            assert!(remaining <= policy.timeout);
            thread::sleep(Duration::from_millis(25));
            Err(Error::connection("flaky"))
        });
        assert_eq!(
            result,
            Err(Error::timeout("slow", Duration::from_millis(40)))
        );
        // Later attempts start after the budget is spent and never call the operation.
        assert_eq!(calls.get(), 1);
        assert_eq!(handler.consecutive_timeouts(), 1);
    }

    #[test]
    fn test_zero_retries_runs_once() {
        let handler = ErrorHandler::new();
        let calls = Cell::new(0);
        let result = handler.retry_with_timeout("x", fast_policy(0), |_| {
            calls.set(calls.get() + 1);
            Ok(1)
        });
        assert_eq!(result, Ok(1));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_validation() {
        let handler = ErrorHandler::new();
        assert_eq!(handler.validate_track_index(5, 128), Ok(5));
        assert!(handler.validate_track_index(0, 128).is_err());
        assert!(handler.validate_track_index(11, 10).is_err());
        assert_eq!(handler.validate_parameter_index(8, 8), Ok(8));
        assert!(handler.validate_parameter_index(9, 8).is_err());
        assert_eq!(handler.validate_float_value("volume", 200.0, 0.0, 128.0), Ok(128.0));
        assert_eq!(handler.validate_float_value("volume", -1.0, 0.0, 128.0), Ok(0.0));
        assert_eq!(handler.validate_float_value("volume", 64.0, 0.0, 128.0), Ok(64.0));
        assert!(handler
            .validate_float_value("volume", f64::NAN, 0.0, 128.0)
            .is_err());
    }

    #[test]
    fn test_feature_support() {
        let handler = ErrorHandler::new();
        assert_eq!(handler.check_feature_supported("layers", None), Ok(false));

        handler.mark_feature_supported("layers");
        assert_eq!(handler.check_feature_supported("layers", None), Ok(true));

        handler.mark_feature_unsupported("layers");
        assert_eq!(
            handler.check_feature_supported("layers", Some("a layered device")),
            Err(Error::FeatureNotSupported {
                feature: "layers".to_owned(),
                requirement: Some("a layered device".to_owned()),
            })
        );

        let diagnostics = handler.diagnostic_info();
        assert!(diagnostics.supported_features.is_empty());
        assert_eq!(diagnostics.unsupported_features, vec!["layers"]);
    }

    #[test]
    fn test_diagnostics() {
        let handler = ErrorHandler::new();
        handler.record_success();
        handler.record_error("ping", timeout_error());
        let diagnostics = handler.diagnostic_info();
        let status = &diagnostics.connection_status;
        assert!(status.last_successful_comm.is_some());
        assert_eq!(status.consecutive_timeouts, 1);
        assert_eq!(
            status.last_error.as_deref(),
            Some("Operation 'ping' timed out after 1 seconds")
        );
        assert!(status.connection_healthy);
        assert_eq!(status.successes, 1);
        assert!(diagnostics.recent_errors.contains_key("ping"));

        let json = serde_json::to_value(&diagnostics).unwrap();
        assert_eq!(json["connection_status"]["health"], "healthy");
    }
}
