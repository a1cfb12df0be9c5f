use crate::config::ErrorRetryConfig;
use crate::logging::PlayerLogger;
use crate::models::{ErrorStatus, SongKey};
use log::info;
use std::time::Duration;

/// Delay before retry number `attempt`: `sqrt(attempt) * base`
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    base.mul_f64(f64::from(attempt).sqrt())
}

/// What the orchestrator must do after a playback failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorDecision {
    /// Song-scoped error count this decision was computed from
    pub attempt: u32,
    pub delay: Duration,
    /// Too many consecutive failures: stop trying until the user resumes
    pub pause: bool,
    /// Too many failures on this song: move on to the next one
    pub skip: bool,
}

impl ErrorDecision {
    pub fn message(&self) -> String {
        match (self.pause, self.skip) {
            (true, true) => "skipping song and pausing playback".to_string(),
            (true, false) => "pausing playback".to_string(),
            (false, true) => format!("skipping song, next attempt in {}ms", self.delay.as_millis()),
            (false, false) => format!("retrying in {}ms", self.delay.as_millis()),
        }
    }
}

/// Error counters and the retry policy applied to them
pub struct ErrorRecovery {
    status: ErrorStatus,
    policy: ErrorRetryConfig,
    logger: PlayerLogger,
}

impl ErrorRecovery {
    pub fn new(policy: ErrorRetryConfig, logger: PlayerLogger) -> Self {
        Self {
            status: ErrorStatus::default(),
            policy,
            logger,
        }
    }

    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    pub fn policy(&self) -> &ErrorRetryConfig {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: ErrorRetryConfig) {
        self.policy = policy;
    }

    /// Count a failure of `key` and decide how to proceed
    pub fn record_error(&mut self, key: &SongKey) -> ErrorDecision {
        self.status.total += 1;
        self.status.continuous += 1;

        let decision = ErrorDecision {
            attempt: self.status.total,
            delay: backoff_delay(self.status.total, self.policy.backoff_base()),
            pause: self.status.continuous >= self.policy.player_retries,
            skip: self.status.total >= self.policy.song_retries,
        };

        info!(
            "Error {} on {} ({} in a row): {}",
            self.status.total,
            key,
            self.status.continuous,
            decision.message()
        );
        if decision.skip {
            self.logger.log_track_skipped(&key.to_string(), self.status.total);
        }
        if decision.pause {
            self.logger.log_auto_paused(self.status.continuous);
        } else {
            self.logger.log_retry_scheduled(decision.attempt, decision.delay);
        }

        decision
    }

    /// A channel actually started playing
    pub fn record_playback_started(&mut self) {
        self.status.continuous = 0;
        if self.policy.reset_song_errors_on_success {
            self.status.total = 0;
        }
    }

    /// A different song became the playback target
    pub fn reset_song(&mut self) {
        self.status.total = 0;
    }

    pub fn reset(&mut self) {
        self.status = ErrorStatus::default();
    }
}
