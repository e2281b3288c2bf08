use std::time::Duration;

use crate::classifier::DEFAULT_OVERRIDE_THRESHOLD;
use crate::error::TrackerError;
use crate::settings::RunnerSettings;

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub max_attempts: u32,
    /// Sleep between status checks.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub clip_duration: Duration,
    /// Wait between cycles; may be zero.
    pub cycle_interval: Duration,
    /// Total wall-clock cap; unlimited when `None`.
    pub session_budget: Option<Duration>,
    pub poll: PollConfig,
    pub override_threshold: f64,
    pub live_classification: bool,
    /// How long `stop()` waits for the background task before reporting an
    /// unconfirmed stop.
    pub join_timeout: Duration,
    pub keep_clips: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            clip_duration: Duration::from_secs(5),
            cycle_interval: Duration::from_secs(30),
            session_budget: None,
            poll: PollConfig::default(),
            override_threshold: DEFAULT_OVERRIDE_THRESHOLD,
            live_classification: true,
            join_timeout: Duration::from_secs(10),
            keep_clips: false,
        }
    }
}

impl RunnerConfig {
    pub fn from_settings(settings: &RunnerSettings) -> Self {
        Self {
            clip_duration: Duration::from_secs(settings.clip_duration_secs),
            cycle_interval: Duration::from_secs(settings.cycle_interval_secs),
            session_budget: settings
                .session_minutes
                .map(|minutes| Duration::from_secs(minutes.saturating_mul(60))),
            poll: PollConfig {
                max_attempts: settings.poll_attempts,
                interval: Duration::from_secs(settings.poll_interval_secs),
            },
            override_threshold: settings.override_threshold,
            live_classification: settings.live_classification,
            join_timeout: Duration::from_secs(settings.join_timeout_secs),
            keep_clips: settings.keep_clips,
        }
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        let invalid = |msg: &str| Err(TrackerError::InvalidConfig(msg.to_string()));

        if self.clip_duration.is_zero() {
            return invalid("clip duration must be greater than zero");
        }
        if self.poll.max_attempts == 0 {
            return invalid("poll attempts must be at least one");
        }
        if self.poll.interval.is_zero() {
            return invalid("poll interval must be greater than zero");
        }
        if self.session_budget.is_some_and(|budget| budget.is_zero()) {
            return invalid("session budget must be greater than zero when set");
        }
        if !self.override_threshold.is_finite() || self.override_threshold < 0.0 {
            return invalid("override threshold must be a non-negative number");
        }
        Ok(())
    }
}
