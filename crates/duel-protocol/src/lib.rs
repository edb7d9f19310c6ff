//! Wire protocol for Duel.
//!
//! This crate defines everything that travels between a client, the
//! server, and the presence store:
//!
//! - **Envelope types** ([`Envelope`], [`Payload`], [`SystemMessage`]):
//!   the outer frame of every WebSocket message.
//! - **Lobby and match messages** ([`LobbyMessage`], [`MatchMessage`]):
//!   discovery requests and in-match intents.
//! - **Replicated match schema** ([`MatchState`], [`Player`],
//!   [`RoundResult`], [`Phase`], [`Choice`]): the state pushed to clients.
//! - **Directory types** ([`DirectoryEntry`], [`MatchMetadata`],
//!   [`ListingEntry`]): what matches publish for discovery.
//! - **Access codes** ([`AccessCode`]): short private-room codes.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, types out.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Lobby / Match coordinators
//! ```

mod access;
mod codec;
mod directory;
mod error;
mod messages;
mod state;
mod types;

pub use access::{AccessCode, ACCESS_CODE_ALPHABET, ACCESS_CODE_LEN};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use directory::{
    DirectoryEntry, ListingEntry, MatchCreated, MatchMetadata, PUBLIC_CODE,
};
pub use error::ProtocolError;
pub use messages::{LobbyMessage, MatchMessage, MatchOptions};
pub use state::{
    resolve, Animation, Choice, EndReason, MatchState, Outcome, Phase, Player,
    RoundResult, Winner,
};
pub use types::{
    Envelope, MatchId, Payload, PlayerId, SystemMessage,
};
