//! Per-rule rate limiting
//!
//! Pages whose own scripts keep reverting a rewritten element can drive the
//! mutation observer without bound. Each `loop` rule is held to a minimum
//! spacing between modifications and a cap per counting window. `once` rules
//! are never throttled and never accrue state.
//!
//! All times are milliseconds on the host clock. The clock is expected to be
//! monotonic; a clock that steps backwards is treated as zero elapsed time.

use std::collections::HashMap;

use crate::rule::ModifyMode;

/// Minimum spacing between two counted modifications of one rule.
pub const MIN_INTERVAL_MS: u64 = 500;
/// Counted modifications allowed per window.
pub const MAX_MODIFY_PER_WINDOW: u32 = 30;
/// Length of the counting window.
pub const WINDOW_MS: u64 = 60_000;
/// Time after engine start during which every rule is allowed.
pub const INIT_GRACE_PERIOD_MS: u64 = 1000;

/// Throttle limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub min_interval_ms: u64,
    pub max_per_window: u32,
    pub window_ms: u64,
    pub grace_period_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: MIN_INTERVAL_MS,
            max_per_window: MAX_MODIFY_PER_WINDOW,
            window_ms: WINDOW_MS,
            grace_period_ms: INIT_GRACE_PERIOD_MS,
        }
    }
}

/// Rate limiter state for one rule id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleState {
    /// Time of the last counted modification, if any
    pub last_modify_time: Option<u64>,
    /// Modifications counted in the current window
    pub modify_count: u32,
    /// Start of the current window
    pub window_start: u64,
}

impl ThrottleState {
    fn new(now: u64) -> Self {
        Self {
            last_modify_time: None,
            modify_count: 0,
            window_start: now,
        }
    }
}

/// Why a modification was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    OnceMode,
    GracePeriod,
    WithinLimits,
}

/// Outcome of a throttle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allowed(AllowReason),
    /// Last modification was `since_last_ms` ago, under the minimum interval
    TooSoon { since_last_ms: u64 },
    /// Window cap reached; resets in `resets_in_ms`
    WindowExhausted { count: u32, resets_in_ms: u64 },
}

impl ThrottleDecision {
    #[inline]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }
}

/// Rate limiter state for every rule seen during this page's lifetime.
#[derive(Debug, Clone)]
pub struct ThrottleRegistry {
    started_at: u64,
    config: ThrottleConfig,
    states: HashMap<String, ThrottleState>,
}

impl ThrottleRegistry {
    /// Create a registry whose grace period starts at `started_at`.
    pub fn new(started_at: u64) -> Self {
        Self::with_config(started_at, ThrottleConfig::default())
    }

    pub fn with_config(started_at: u64, config: ThrottleConfig) -> Self {
        Self {
            started_at,
            config,
            states: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// True while `now` is inside the start-up grace period.
    pub fn in_grace_period(&self, now: u64) -> bool {
        now.saturating_sub(self.started_at) < self.config.grace_period_ms
    }

    /// Decide whether `rule_id` may be modified at `now`.
    ///
    /// Creates state lazily and rolls the counting window over once it has
    /// elapsed; a denial never changes the modification history.
    pub fn check(&mut self, rule_id: &str, mode: ModifyMode, now: u64) -> ThrottleDecision {
        if mode == ModifyMode::Once {
            return ThrottleDecision::Allowed(AllowReason::OnceMode);
        }

        if self.in_grace_period(now) {
            return ThrottleDecision::Allowed(AllowReason::GracePeriod);
        }

        let config = self.config;
        let state = self
            .states
            .entry(rule_id.to_string())
            .or_insert_with(|| ThrottleState::new(now));

        if let Some(last) = state.last_modify_time {
            let since_last = now.saturating_sub(last);
            if since_last < config.min_interval_ms {
                return ThrottleDecision::TooSoon { since_last_ms: since_last };
            }
        }

        if now.saturating_sub(state.window_start) >= config.window_ms {
            state.modify_count = 0;
            state.window_start = now;
        }

        if state.modify_count >= config.max_per_window {
            let resets_at = state.window_start + config.window_ms;
            return ThrottleDecision::WindowExhausted {
                count: state.modify_count,
                resets_in_ms: resets_at.saturating_sub(now),
            };
        }

        ThrottleDecision::Allowed(AllowReason::WithinLimits)
    }

    /// Boolean form of [`check`](Self::check).
    pub fn should_allow(&mut self, rule_id: &str, mode: ModifyMode, now: u64) -> bool {
        self.check(rule_id, mode, now).is_allowed()
    }

    /// Count a modification. Only `loop` rules accrue state.
    pub fn record(&mut self, rule_id: &str, mode: ModifyMode, now: u64) {
        if mode != ModifyMode::Loop {
            return;
        }
        let state = self
            .states
            .entry(rule_id.to_string())
            .or_insert_with(|| ThrottleState::new(now));
        state.last_modify_time = Some(now);
        state.modify_count += 1;

        log::debug!(
            "Rule {} modify count {}/{} in current window",
            rule_id,
            state.modify_count,
            self.config.max_per_window
        );
    }

    pub fn state(&self, rule_id: &str) -> Option<&ThrottleState> {
        self.states.get(rule_id)
    }
}
