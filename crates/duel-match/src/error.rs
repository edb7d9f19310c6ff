//! Error types for the match layer.

use duel_protocol::{MatchId, PlayerId};

/// Errors that can occur during match operations.
///
/// Only seat changes (join/leave) and routing report errors. Out-of-phase
/// intents are dropped inside the match, never surfaced here.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("match {0} not found")]
    NotFound(MatchId),

    #[error("match {0} is full")]
    Full(MatchId),

    /// The match is private and the supplied code doesn't match.
    #[error("access code rejected for match {0}")]
    AccessCodeMismatch(MatchId),

    #[error("player {0} already in match {1}")]
    AlreadyJoined(PlayerId, MatchId),

    /// One match per player: leave the current one first.
    #[error("player {0} is already seated in match {1}")]
    AlreadyInMatch(PlayerId, MatchId),

    #[error("player {0} not in match {1}")]
    NotInMatch(PlayerId, MatchId),

    #[error("player {0} is not in any match")]
    NotSeated(PlayerId),

    /// The match's command channel is closed: it was disposed.
    #[error("match {0} is unavailable")]
    Unavailable(MatchId),
}

impl MatchError {
    /// Status code reported to clients in a `join-rejected` message.
    pub fn code(&self) -> u16 {
        match self {
            Self::AccessCodeMismatch(_) => 403,
            Self::NotFound(_) | Self::NotSeated(_) | Self::NotInMatch(..) => 404,
            Self::Full(_) | Self::AlreadyJoined(..) | Self::AlreadyInMatch(..) => 409,
            Self::Unavailable(_) => 503,
        }
    }
}
