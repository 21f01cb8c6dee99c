//! Layered failure escalation for the ingestion loop.
//!
//! Three nested levels, evaluated after every failed attempt on a pool id:
//!
//! 1. **Backoff**: retry the same id after `current_backoff`, which doubles on each failure.
//! 2. **Abandon**: after `max_retries` failures the id is given up and the loop moves on.
//! 3. **Cooldown**: a streak of `short_wait_threshold` failures (spanning ids) pauses the whole
//!    loop; `short_wait_max_count` short pauses are followed by one long pause.
//!
//! The per-id counter and the backoff delay reset on success and on abandonment. The failure
//! streak only resets on success or once a cooldown has been served, otherwise level 3 could never
//! be reached with `max_retries` below the escalation threshold.

use crate::settings::Settings;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub short_wait_threshold: u32,
    pub short_wait: Duration,
    pub short_wait_max_count: u32,
    pub long_wait: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        let r = &settings.retry;
        Self {
            max_retries: r.max_retries,
            initial_backoff: Duration::from_millis(r.initial_backoff_ms),
            short_wait_threshold: r.short_wait_threshold,
            short_wait: Duration::from_millis(r.short_wait_ms),
            short_wait_max_count: r.short_wait_max_count,
            long_wait: Duration::from_millis(r.long_wait_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// What to do with the current pool id after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Wait `delay`, then retry the same id on the next endpoint
    Retry { delay: Duration },
    /// Give up on the id and advance
    Abandon,
}

/// Loop-wide pause entered when the failure streak crosses the escalation threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cooldown {
    Short(Duration),
    Long(Duration),
}

impl Cooldown {
    pub fn duration(&self) -> Duration {
        match self {
            Cooldown::Short(d) | Cooldown::Long(d) => *d,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub action: FailureAction,
    pub cooldown: Option<Cooldown>,
}

/// Retry bookkeeping owned by the ingestion loop.
#[derive(Debug, Clone)]
pub struct RetryState {
    consecutive_failures: u32,
    current_backoff: Duration,
    short_cooldown_count: u32,
    failure_streak: u32,
    initial_backoff: Duration,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            consecutive_failures: 0,
            current_backoff: policy.initial_backoff,
            short_cooldown_count: 0,
            failure_streak: 0,
            initial_backoff: policy.initial_backoff,
        }
    }

    /// Failures of the current pool id.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn current_backoff(&self) -> Duration {
        self.current_backoff
    }

    pub fn short_cooldown_count(&self) -> u32 {
        self.short_cooldown_count
    }

    /// Failures since the last success or served cooldown, across pool ids.
    pub fn failure_streak(&self) -> u32 {
        self.failure_streak
    }

    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
        self.current_backoff = self.initial_backoff;
        self.short_cooldown_count = 0;
        self.failure_streak = 0;
    }

    pub fn on_failure(&mut self, policy: &RetryPolicy) -> FailureOutcome {
        self.consecutive_failures += 1;
        self.failure_streak += 1;

        let action = if self.consecutive_failures < policy.max_retries {
            let delay = self.current_backoff;
            self.current_backoff = self.current_backoff.saturating_mul(2);
            FailureAction::Retry { delay }
        } else {
            self.consecutive_failures = 0;
            self.current_backoff = self.initial_backoff;
            FailureAction::Abandon
        };

        let cooldown = if self.failure_streak >= policy.short_wait_threshold {
            self.failure_streak = 0;
            if self.short_cooldown_count < policy.short_wait_max_count {
                self.short_cooldown_count += 1;
                Some(Cooldown::Short(policy.short_wait))
            } else {
                self.short_cooldown_count = 0;
                Some(Cooldown::Long(policy.long_wait))
            }
        } else {
            None
        };

        FailureOutcome { action, cooldown }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            short_wait_threshold: 15,
            short_wait: Duration::from_secs(60),
            short_wait_max_count: 3,
            long_wait: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_backoff_doubles_then_abandons() {
        let p = policy();
        let mut state = RetryState::new(&p);
        let delays: Vec<FailureAction> = (0..5).map(|_| state.on_failure(&p).action).collect();
        assert_eq!(
            delays,
            vec![
                FailureAction::Retry { delay: Duration::from_millis(100) },
                FailureAction::Retry { delay: Duration::from_millis(200) },
                FailureAction::Retry { delay: Duration::from_millis(400) },
                FailureAction::Retry { delay: Duration::from_millis(800) },
                FailureAction::Abandon,
            ]
        );
        // Abandonment resets the per-id state
        assert_eq!(state.consecutive_failures(), 0);
        assert_eq!(state.current_backoff(), Duration::from_millis(100));
        assert_eq!(state.failure_streak(), 5);
    }

    #[test]
    fn test_success_resets_everything() {
        let p = policy();
        let mut state = RetryState::new(&p);
        state.on_failure(&p);
        state.on_failure(&p);
        assert_eq!(state.current_backoff(), Duration::from_millis(400));
        state.on_success();
        assert_eq!(state.consecutive_failures(), 0);
        assert_eq!(state.current_backoff(), Duration::from_millis(100));
        assert_eq!(state.failure_streak(), 0);
    }

    #[test]
    fn test_cooldown_escalation() {
        let p = policy();
        let mut state = RetryState::new(&p);
        let mut cooldowns = Vec::new();
        for _ in 0..(15 * 4) {
            if let Some(c) = state.on_failure(&p).cooldown {
                cooldowns.push(c);
            }
        }
        assert_eq!(
            cooldowns,
            vec![
                Cooldown::Short(Duration::from_secs(60)),
                Cooldown::Short(Duration::from_secs(60)),
                Cooldown::Short(Duration::from_secs(60)),
                Cooldown::Long(Duration::from_secs(300)),
            ]
        );
        // Long wait resets the short cooldown counter
        assert_eq!(state.short_cooldown_count(), 0);
    }

    #[test]
    fn test_cooldown_only_on_threshold_crossing() {
        let p = policy();
        let mut state = RetryState::new(&p);
        let outcomes: Vec<FailureOutcome> = (0..15).map(|_| state.on_failure(&p)).collect();
        assert!(outcomes[..14].iter().all(|o| o.cooldown.is_none()));
        assert_eq!(outcomes[14].cooldown, Some(Cooldown::Short(Duration::from_secs(60))));
        // The 15th failure is also the 5th of the third id
        assert_eq!(outcomes[14].action, FailureAction::Abandon);
    }
}
