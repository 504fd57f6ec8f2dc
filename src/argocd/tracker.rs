//! Waiting for asynchronous operations to finish
//!
//! Tracking is a poll loop around a pure transition function, [`step`]. The
//! loop only gathers observations (a fresh application snapshot, a transient
//! failure, the deadline, a cancellation) and feeds them through `step` until
//! it reaches [`TrackState::Finished`].
//!
//! Cancellation and timeout are client-side only: nothing is sent to the
//! cluster, and the controller keeps working on the operation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::config::TrackingConfig;
use crate::error::ArgoResult;
use crate::models::{Application, OperationPhase, OperationState};

use super::repository::ApplicationRepository;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Shorter poll intervals are raised to this
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Ignore operations that started at or before this instant
    ///
    /// Set it to the start time of the operation that was current before a
    /// new action was requested, so that operation's terminal state is not
    /// mistaken for the outcome of the new one.
    pub started_after: Option<DateTime<Utc>>,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            started_after: None,
        }
    }
}

impl From<&TrackingConfig> for TrackOptions {
    fn from(config: &TrackingConfig) -> Self {
        Self {
            timeout: config.timeout(),
            poll_interval: config.poll_interval().max(MIN_POLL_INTERVAL),
            started_after: None,
        }
    }
}

/// How tracking ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", content = "operation")]
pub enum OperationResult {
    Succeeded(OperationState),
    /// Phase `Failed` or `Error`
    Failed(OperationState),
    /// Deadline passed, the operation may still complete
    TimedOut,
    Cancelled,
}

impl OperationResult {
    /// Whether the controller reported a final phase
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            OperationResult::Succeeded(_) | OperationResult::Failed(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackState {
    Polling { polls: u32 },
    Finished(OperationResult),
}

/// One input to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Operation block from a fresh snapshot, `None` when absent
    Snapshot(Option<OperationState>),
    /// Snapshot could not be fetched, but the failure is transient
    Unavailable,
    DeadlineReached,
    Cancelled,
}

/// Advance tracking by one observation
///
/// `Finished` is absorbing. Terminal phases of stale operations (see
/// [`TrackOptions::started_after`]) count as "still waiting".
pub fn step(
    state: TrackState,
    observation: Observation,
    started_after: Option<DateTime<Utc>>,
) -> TrackState {
    let polls = match state {
        TrackState::Finished(_) => return state,
        TrackState::Polling { polls } => polls,
    };
    let waiting = TrackState::Polling {
        polls: polls.saturating_add(1),
    };

    match observation {
        Observation::Cancelled => TrackState::Finished(OperationResult::Cancelled),
        Observation::DeadlineReached => TrackState::Finished(OperationResult::TimedOut),
        Observation::Unavailable | Observation::Snapshot(None) => waiting,
        Observation::Snapshot(Some(op)) => {
            if is_stale(&op, started_after) {
                return waiting;
            }
            match op.phase {
                Some(OperationPhase::Succeeded) => {
                    TrackState::Finished(OperationResult::Succeeded(op))
                }
                Some(OperationPhase::Failed | OperationPhase::Error) => {
                    TrackState::Finished(OperationResult::Failed(op))
                }
                Some(OperationPhase::Running | OperationPhase::Terminating) | None => waiting,
            }
        }
    }
}

fn is_stale(op: &OperationState, started_after: Option<DateTime<Utc>>) -> bool {
    match (started_after, op.started_at) {
        (Some(baseline), Some(started)) => started <= baseline,
        _ => false,
    }
}

/// Polls applications until their current operation settles
pub struct OperationTracker {
    repository: Arc<ApplicationRepository>,
    defaults: TrackOptions,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Removes an application from the in-flight set when tracking ends
struct InFlightGuard {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

fn tracking_key(context: &str, app: &Application) -> String {
    format!("{}/{}/{}", context, app.namespace, app.name)
}

impl OperationTracker {
    pub fn new(repository: Arc<ApplicationRepository>, defaults: TrackOptions) -> Self {
        Self {
            repository,
            defaults,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Whether some caller is already tracking this application
    pub fn is_tracking(&self, context: &str, app: &Application) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&tracking_key(context, app))
    }

    /// Track with the default poll interval and no cancellation
    pub async fn track(
        &self,
        context: &str,
        app: &Application,
        timeout: Duration,
    ) -> ArgoResult<OperationResult> {
        let options = TrackOptions {
            timeout,
            ..self.defaults
        };
        self.track_with(context, app, options, CancellationToken::new())
            .await
    }

    /// Poll until the operation settles, the deadline passes or `cancel` fires
    ///
    /// A settled outcome drops the cached application list for the
    /// application's namespace, so the next list shows the new state. Network
    /// and timeout failures while polling are retried at the next tick; any
    /// other failure ends tracking with that error.
    pub async fn track_with(
        &self,
        context: &str,
        app: &Application,
        options: TrackOptions,
        cancel: CancellationToken,
    ) -> ArgoResult<OperationResult> {
        let _guard = self.register(context, app);
        let deadline = Instant::now() + options.timeout;
        let mut state = TrackState::Polling { polls: 0 };

        loop {
            let observation = tokio::select! {
                biased;
                _ = cancel.cancelled() => Observation::Cancelled,
                _ = sleep_until(deadline) => Observation::DeadlineReached,
                result = self.repository.get(context, &app.name, &app.namespace) => match result {
                    Ok(snapshot) => Observation::Snapshot(snapshot.last_operation),
                    Err(e) if e.is_retryable() => {
                        tracing::warn!(
                            context,
                            app = %app.qualified_name(),
                            kind = %e.kind(),
                            error = %e,
                            "Poll failed, retrying"
                        );
                        Observation::Unavailable
                    }
                    Err(e) => return Err(e),
                },
            };

            state = step(state, observation, options.started_after);
            match state {
                TrackState::Finished(result) => return Ok(self.finish(context, app, result)),
                TrackState::Polling { polls } => {
                    tracing::debug!(context, app = %app.qualified_name(), polls, "Operation still running");
                }
            }

            // Wait for the next tick, still honoring cancellation and the deadline
            let interrupted = tokio::select! {
                biased;
                _ = cancel.cancelled() => Some(Observation::Cancelled),
                _ = sleep_until(deadline) => Some(Observation::DeadlineReached),
                _ = sleep(options.poll_interval.max(MIN_POLL_INTERVAL)) => None,
            };
            if let Some(observation) = interrupted {
                state = step(state, observation, options.started_after);
                if let TrackState::Finished(result) = state {
                    return Ok(self.finish(context, app, result));
                }
            }
        }
    }

    fn register(&self, context: &str, app: &Application) -> InFlightGuard {
        let key = tracking_key(context, app);
        let newly_added = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        if !newly_added {
            tracing::warn!(
                context,
                app = %app.qualified_name(),
                "Application is already being tracked"
            );
        }
        InFlightGuard {
            key,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    fn finish(&self, context: &str, app: &Application, result: OperationResult) -> OperationResult {
        if result.is_settled() {
            self.repository.invalidate(context, &app.namespace);
        }

        match &result {
            OperationResult::Succeeded(_) => {
                tracing::info!(context, app = %app.qualified_name(), "Operation succeeded")
            }
            OperationResult::Failed(op) => tracing::info!(
                context,
                app = %app.qualified_name(),
                message = op.message.as_deref().unwrap_or(""),
                "Operation failed"
            ),
            OperationResult::TimedOut => {
                tracing::warn!(context, app = %app.qualified_name(), "Gave up waiting for operation")
            }
            OperationResult::Cancelled => {
                tracing::debug!(context, app = %app.qualified_name(), "Tracking cancelled")
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(phase: OperationPhase, started_at: Option<&str>) -> OperationState {
        OperationState {
            phase: Some(phase),
            message: None,
            started_at: started_at
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            finished_at: None,
            sync_revision: None,
        }
    }

    fn polling() -> TrackState {
        TrackState::Polling { polls: 0 }
    }

    #[test]
    fn test_running_keeps_polling() {
        let state = step(
            polling(),
            Observation::Snapshot(Some(op(OperationPhase::Running, None))),
            None,
        );
        assert_eq!(state, TrackState::Polling { polls: 1 });

        let state = step(state, Observation::Snapshot(None), None);
        assert_eq!(state, TrackState::Polling { polls: 2 });

        let state = step(state, Observation::Unavailable, None);
        assert_eq!(state, TrackState::Polling { polls: 3 });
    }

    #[test]
    fn test_terminating_keeps_polling() {
        let state = step(
            polling(),
            Observation::Snapshot(Some(op(OperationPhase::Running, None))),
            None,
        );
        let state = step(
            state,
            Observation::Snapshot(Some(op(OperationPhase::Terminating, None))),
            None,
        );
        assert_eq!(state, TrackState::Polling { polls: 2 });

        let done = op(OperationPhase::Succeeded, None);
        assert_eq!(
            step(state, Observation::Snapshot(Some(done.clone())), None),
            TrackState::Finished(OperationResult::Succeeded(done))
        );
    }

    #[test]
    fn test_terminal_phases_finish() {
        let done = op(OperationPhase::Succeeded, None);
        assert_eq!(
            step(polling(), Observation::Snapshot(Some(done.clone())), None),
            TrackState::Finished(OperationResult::Succeeded(done))
        );

        for phase in [OperationPhase::Failed, OperationPhase::Error] {
            let failed = op(phase, None);
            assert_eq!(
                step(polling(), Observation::Snapshot(Some(failed.clone())), None),
                TrackState::Finished(OperationResult::Failed(failed))
            );
        }
    }

    #[test]
    fn test_unknown_phase_keeps_polling() {
        let mut unknown = op(OperationPhase::Running, None);
        unknown.phase = None;
        assert_eq!(
            step(polling(), Observation::Snapshot(Some(unknown)), None),
            TrackState::Polling { polls: 1 }
        );
    }

    #[test]
    fn test_deadline_and_cancel() {
        assert_eq!(
            step(polling(), Observation::DeadlineReached, None),
            TrackState::Finished(OperationResult::TimedOut)
        );
        assert_eq!(
            step(polling(), Observation::Cancelled, None),
            TrackState::Finished(OperationResult::Cancelled)
        );
    }

    #[test]
    fn test_finished_is_absorbing() {
        let finished = TrackState::Finished(OperationResult::Cancelled);
        let state = step(
            finished.clone(),
            Observation::Snapshot(Some(op(OperationPhase::Succeeded, None))),
            None,
        );
        assert_eq!(state, finished);
    }

    #[test]
    fn test_stale_operation_is_ignored() {
        let baseline = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .map(|dt| dt.with_timezone(&Utc))
            .ok();

        let previous = op(OperationPhase::Succeeded, Some("2024-05-01T12:00:00Z"));
        assert_eq!(
            step(polling(), Observation::Snapshot(Some(previous)), baseline),
            TrackState::Polling { polls: 1 }
        );

        let current = op(OperationPhase::Succeeded, Some("2024-05-01T12:03:10Z"));
        assert!(matches!(
            step(polling(), Observation::Snapshot(Some(current)), baseline),
            TrackState::Finished(OperationResult::Succeeded(_))
        ));

        // Without a start time there is nothing to compare against
        let undated = op(OperationPhase::Failed, None);
        assert!(matches!(
            step(polling(), Observation::Snapshot(Some(undated)), baseline),
            TrackState::Finished(OperationResult::Failed(_))
        ));
    }

    #[test]
    fn test_options_from_config() {
        let config = TrackingConfig {
            poll_interval_millis: 500,
            timeout_seconds: 60,
        };
        let options = TrackOptions::from(&config);
        assert_eq!(options.poll_interval, Duration::from_millis(500));
        assert_eq!(options.timeout, Duration::from_secs(60));
        assert!(options.started_after.is_none());
    }

    #[test]
    fn test_zero_poll_interval_is_raised() {
        let config = TrackingConfig {
            poll_interval_millis: 0,
            timeout_seconds: 60,
        };
        assert_eq!(TrackOptions::from(&config).poll_interval, MIN_POLL_INTERVAL);
    }
}
