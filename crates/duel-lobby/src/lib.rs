//! Lobby for Duel: match discovery and private-room lookup.
//!
//! The lobby keeps a local directory of live matches fed by two presence
//! topics: `match_created` announcements (inserted immediately) and the
//! periodic `rooms` listing (which replaces the directory wholesale).
//! Code lookups try the directory first and fall back to a deep scan of
//! the presence store, since the directory can lag behind reality.
//!
//! ```text
//! match actors ──► presence ──► LobbyCoordinator ──► lobby clients
//!                     ▲                │
//!                     └── deep scan ◄──┘ (directory miss)
//! ```

mod coordinator;
mod error;
mod search;

pub use coordinator::{LobbyHandle, LobbySender, create_room_info, spawn_lobby};
pub use error::LobbyError;
pub use search::deep_scan;
