//! Error types for the protocol layer.

/// Errors raised while turning frames into protocol values or back.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A value could not be serialized.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Inbound bytes were malformed, truncated, or carried an unknown tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but breaks a protocol rule, such as an unsupported
    /// handshake version or a non-text frame.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
