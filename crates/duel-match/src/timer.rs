//! Timers polled inside a match actor's `tokio::select!` loop.
//!
//! A match has exactly one phase timer slot ([`PhaseTimer`]) and one
//! grace deadline ([`GraceTimer`]). Both pend forever while disarmed, so
//! the select loop can always include them:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         cmd = receiver.recv() => { /* commands */ }
//!         fired = phase_timer.wait() => { /* countdown, selection, delays */ }
//!         () = grace.wait() => { /* dispose if still empty */ }
//!     }
//! }
//! ```
//!
//! Waiting is cancel-safe: nothing changes until the sleep completes, so
//! losing a `select!` race never shifts a deadline.

use std::future;
use std::time::Duration;

use tokio::time::{self, Instant};

use crate::Deferred;

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Fixed-period ticker that skips missed periods instead of bursting.
///
/// When a tick wakes more than 10% late, the whole periods that were
/// missed are reported through the return value of [`Ticker::tick`] and
/// the next deadline is scheduled from now.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    next: Instant,
    count: u64,
}

impl Ticker {
    /// Shortest accepted period.
    pub const MIN_PERIOD: Duration = Duration::from_millis(1);

    /// First tick is one period from now.
    pub fn new(period: Duration) -> Self {
        let period = period.max(Self::MIN_PERIOD);
        Self {
            period,
            next: Instant::now() + period,
            count: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks fired so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Waits for the next tick and returns how many periods were skipped
    /// (0 in normal operation).
    pub async fn tick(&mut self) -> u64 {
        time::sleep_until(self.next).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(self.next);
        let mut skipped = 0;
        if late_by > self.period / 10 {
            skipped = (late_by.as_nanos() / self.period.as_nanos()) as u64;
            if skipped > 0 {
                tracing::warn!(
                    tick = self.count + 1,
                    skipped,
                    late_ms = late_by.as_secs_f64() * 1000.0,
                    "timer overrun, skipping ahead"
                );
            }
        }

        self.next = now + self.period;
        self.count += 1;
        skipped
    }
}

// ---------------------------------------------------------------------------
// PhaseTimer
// ---------------------------------------------------------------------------

/// What an armed phase timer drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Countdown,
    Selection,
    Deferred(Deferred),
}

/// One fire of the phase timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// Token handed out when the timer was armed.
    pub token: u64,
    pub kind: TimerKind,
    /// Time covered by this fire: one period (more if periods were
    /// skipped) or the one-shot delay.
    pub elapsed: Duration,
}

#[derive(Debug)]
enum Schedule {
    Periodic(Ticker),
    Once { deadline: Instant, delay: Duration },
}

#[derive(Debug)]
struct Armed {
    token: u64,
    kind: TimerKind,
    schedule: Schedule,
}

/// Single timer slot. Arming replaces whatever was armed; every arm or
/// cancel bumps the token, so a fire carrying an older token is stale.
#[derive(Debug, Default)]
pub struct PhaseTimer {
    generation: u64,
    armed: Option<Armed>,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a repeating timer. Returns its token.
    pub fn arm_periodic(&mut self, kind: TimerKind, period: Duration) -> u64 {
        self.arm(kind, Schedule::Periodic(Ticker::new(period)))
    }

    /// Arms a timer that fires once after `delay`, then disarms itself.
    pub fn arm_once(&mut self, kind: TimerKind, delay: Duration) -> u64 {
        let schedule = Schedule::Once {
            deadline: Instant::now() + delay,
            delay,
        };
        self.arm(kind, schedule)
    }

    fn arm(&mut self, kind: TimerKind, schedule: Schedule) -> u64 {
        self.generation += 1;
        self.armed = Some(Armed {
            token: self.generation,
            kind,
            schedule,
        });
        self.generation
    }

    pub fn cancel(&mut self) {
        if self.armed.take().is_some() {
            self.generation += 1;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn kind(&self) -> Option<TimerKind> {
        self.armed.as_ref().map(|a| a.kind)
    }

    /// Whether `token` belongs to the most recent arm.
    pub fn is_current(&self, token: u64) -> bool {
        token == self.generation
    }

    /// Waits for the armed timer. Pends forever while disarmed.
    pub async fn wait(&mut self) -> TimerFired {
        let Some(armed) = self.armed.as_mut() else {
            return future::pending().await;
        };
        let token = armed.token;
        let kind = armed.kind;

        let (elapsed, once) = match &mut armed.schedule {
            Schedule::Periodic(ticker) => {
                let skipped = ticker.tick().await;
                let periods = u32::try_from(skipped.saturating_add(1)).unwrap_or(u32::MAX);
                (ticker.period().saturating_mul(periods), false)
            }
            Schedule::Once { deadline, delay } => {
                time::sleep_until(*deadline).await;
                (*delay, true)
            }
        };

        if once {
            self.armed = None;
        }
        TimerFired {
            token,
            kind,
            elapsed,
        }
    }
}

// ---------------------------------------------------------------------------
// GraceTimer
// ---------------------------------------------------------------------------

/// Deadline for disposing an empty private match.
#[derive(Debug, Default)]
pub struct GraceTimer {
    deadline: Option<Instant>,
}

impl GraceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, after: Duration) {
        self.deadline = Some(Instant::now() + after);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves once at the deadline, then disarms. Pends while disarmed.
    pub async fn wait(&mut self) {
        match self.deadline {
            Some(deadline) => {
                time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => future::pending().await,
        }
    }
}
