use duel_protocol::ProtocolError;

/// Errors from the presence store.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// The backing store could not be reached or refused the operation.
    #[error("presence store unavailable: {0}")]
    Unavailable(String),

    /// A stored value did not hold what its key promises.
    #[error("malformed value at {key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error(transparent)]
    Codec(#[from] ProtocolError),
}
