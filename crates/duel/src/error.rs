//! Unified error type for the Duel server.

use duel_lobby::LobbyError;
use duel_match::MatchError;
use duel_presence::PresenceError;
use duel_protocol::ProtocolError;

use crate::TransportError;

/// Top-level error that wraps every crate-specific error, so `?` works
/// across layers.
#[derive(Debug, thiserror::Error)]
pub enum DuelError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Presence(#[from] PresenceError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Lobby(#[from] LobbyError),
}
