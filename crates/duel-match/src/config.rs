//! Match timing and per-match rules.

use std::time::Duration;

use duel_protocol::{MatchOptions, MatchState};

// ---------------------------------------------------------------------------
// MatchTiming
// ---------------------------------------------------------------------------

/// Timer cadence shared by every match on a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTiming {
    /// Value the pre-round countdown starts from.
    pub countdown_from: u8,
    pub countdown_period: Duration,
    /// Selection timer period; each fire subtracts this from the budget.
    pub selection_period: Duration,
    /// Pause between `timeout` and `revealing`.
    pub timeout_delay: Duration,
    /// Pause between `revealing` and resolution.
    pub reveal_delay: Duration,
    /// How long an empty private match waits for someone to come back.
    pub empty_private_grace: Duration,
}

impl Default for MatchTiming {
    fn default() -> Self {
        Self {
            countdown_from: 3,
            countdown_period: Duration::from_secs(1),
            selection_period: Duration::from_millis(17),
            timeout_delay: Duration::from_secs(2),
            reveal_delay: Duration::from_secs(2),
            empty_private_grace: Duration::from_secs(10 * 60),
        }
    }
}

impl MatchTiming {
    pub fn with_countdown(mut self, from: u8, period: Duration) -> Self {
        self.countdown_from = from;
        self.countdown_period = period;
        self
    }

    pub fn with_selection_period(mut self, period: Duration) -> Self {
        self.selection_period = period;
        self
    }

    pub fn with_delays(mut self, timeout: Duration, reveal: Duration) -> Self {
        self.timeout_delay = timeout;
        self.reveal_delay = reveal;
        self
    }

    pub fn with_empty_private_grace(mut self, grace: Duration) -> Self {
        self.empty_private_grace = grace;
        self
    }
}

// ---------------------------------------------------------------------------
// MatchSettings
// ---------------------------------------------------------------------------

/// Rules fixed when a match is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSettings {
    pub is_private: bool,
    /// Always one of [`Self::ROUND_CHOICES`].
    pub max_rounds: u8,
    /// Selection budget per round, in seconds.
    pub wait_time: u32,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            is_private: true,
            max_rounds: 3,
            wait_time: 3,
        }
    }
}

impl MatchSettings {
    pub const ROUND_CHOICES: [u8; 3] = [3, 5, 7];
    pub const MIN_WAIT_TIME: u32 = 1;
    pub const MAX_WAIT_TIME: u32 = 30;
    pub const CAPACITY: usize = MatchState::CAPACITY;

    /// Fills gaps with defaults and clamps whatever the client sent.
    pub fn from_options(options: &MatchOptions) -> Self {
        let defaults = Self::default();
        Self {
            is_private: options.is_private.unwrap_or(defaults.is_private),
            max_rounds: options.max_rounds.unwrap_or(defaults.max_rounds),
            wait_time: options.wait_time.unwrap_or(defaults.wait_time),
        }
        .validated()
    }

    /// Clamps rounds up to the next allowed odd count and the wait time
    /// into range. Out-of-range values are logged.
    pub fn validated(mut self) -> Self {
        let rounds = Self::ROUND_CHOICES
            .into_iter()
            .find(|&allowed| self.max_rounds <= allowed)
            .unwrap_or(Self::ROUND_CHOICES[Self::ROUND_CHOICES.len() - 1]);
        if rounds != self.max_rounds {
            tracing::debug!(requested = self.max_rounds, rounds, "clamping round count");
            self.max_rounds = rounds;
        }

        let wait = self
            .wait_time
            .clamp(Self::MIN_WAIT_TIME, Self::MAX_WAIT_TIME);
        if wait != self.wait_time {
            tracing::debug!(requested = self.wait_time, wait, "clamping wait time");
            self.wait_time = wait;
        }
        self
    }
}
