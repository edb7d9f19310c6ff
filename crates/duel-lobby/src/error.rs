//! Error types for the lobby.

use duel_presence::PresenceError;

#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The lobby actor has stopped.
    #[error("lobby is unavailable")]
    Unavailable,

    /// Subscribing to the presence topics failed at startup.
    #[error(transparent)]
    Presence(#[from] PresenceError),
}
