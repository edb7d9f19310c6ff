//! # Duel
//!
//! Authoritative server for two-player rock/paper/scissors matches.
//!
//! Clients connect over WebSocket, handshake for a session id, and then
//! talk to two services: the lobby (room listings and access-code lookup)
//! and the match they sit in. Every match runs as its own actor that owns
//! the phase timers and pushes full state snapshots to its players.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duel::prelude::*;
//!
//! # async fn run() -> Result<(), DuelError> {
//! let server = DuelServer::builder()
//!     .config(ServerConfig::from_env())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;
mod transport;

pub use config::{BIND_ADDR_ENV, ServerConfig};
pub use error::DuelError;
pub use server::{DuelServer, DuelServerBuilder, PROTOCOL_VERSION};
pub use transport::{ConnectionId, TransportError, WebSocketConnection, WebSocketListener};

/// Re-exports for server binaries and test clients.
pub mod prelude {
    pub use crate::{DuelError, DuelServer, DuelServerBuilder, PROTOCOL_VERSION, ServerConfig};

    pub use duel_match::{MatchSettings, MatchTiming};
    pub use duel_protocol::{
        AccessCode, Choice, Codec, DirectoryEntry, EndReason, Envelope, JsonCodec,
        LobbyMessage, MatchId, MatchMessage, MatchOptions, MatchState, Payload, Phase, PlayerId,
        SystemMessage, Winner,
    };
}
