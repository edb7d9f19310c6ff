//! Authoritative match coordination for Duel.
//!
//! Every match runs as one Tokio task (actor model). The task owns the
//! match state, its timers, and the outbound channels of the players
//! seated in it; nothing else can write to it.
//!
//! # Key types
//!
//! - [`MatchManager`]: creates matches, seats players, routes intents
//! - [`MatchHandle`]: send commands to a running match actor
//! - [`Referee`]: the synchronous phase state machine the actor drives
//! - [`MatchTiming`] / [`MatchSettings`]: timer cadence and per-match rules
//!
//! ```text
//! client intent → MatchManager → MatchHandle ─mpsc─► actor ─► Referee
//!                                                       │
//!                     snapshots ◄── MatchOutbound ◄─────┤
//!                     presence  ◄── DirectoryPublisher ◄┘
//! ```

mod config;
mod coordinator;
mod directory;
mod error;
mod manager;
mod referee;
mod replica;
mod timer;

pub use config::{MatchSettings, MatchTiming};
pub use coordinator::{MatchHandle, MatchInfo, MatchOutbound, MatchSender};
pub use error::MatchError;
pub use manager::MatchManager;
pub use referee::{Deferred, Effect, Intent, Referee};
pub use replica::Replica;
pub use timer::{GraceTimer, PhaseTimer, Ticker, TimerFired, TimerKind};
