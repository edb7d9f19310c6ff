//! Process-wide presence for Duel.
//!
//! Matches announce themselves here and the lobby discovers them here.
//! The [`Presence`] trait is the seam: it offers topic pub/sub plus a
//! small set/hash key-value surface, the subset of a Redis-like store the
//! server needs. [`LocalPresence`] is the in-process implementation the
//! server ships with.
//!
//! # Layout
//!
//! ```text
//! set   matches              ids of every live match
//! hash  match:{id}           metadata (JSON), clients, maxClients
//! topic match_created        MatchCreated, published once per match
//! topic rooms                Vec<ListingEntry>, published periodically
//! ```

#![allow(async_fn_in_trait)]

mod error;
mod listing;
mod local;
pub mod store;

pub use error::PresenceError;
pub use listing::{snapshot_listing, spawn_listing_publisher};
pub use local::LocalPresence;

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::broadcast;

/// Set holding the id of every live match.
pub const MATCHES_KEY: &str = "matches";
/// Topic carrying one `MatchCreated` per new match.
pub const TOPIC_MATCH_CREATED: &str = "match_created";
/// Topic carrying periodic `Vec<ListingEntry>` snapshots.
pub const TOPIC_ROOMS: &str = "rooms";

pub const FIELD_METADATA: &str = "metadata";
pub const FIELD_CLIENTS: &str = "clients";
pub const FIELD_MAX_CLIENTS: &str = "maxClients";

/// Pub/sub plus key-value store shared by every match and the lobby.
///
/// Methods return `Send` futures so generic callers can drive them from
/// spawned tasks.
pub trait Presence: Send + Sync + 'static {
    /// Publishes `payload` to every current subscriber of `topic`.
    /// Publishing to a topic nobody listens on succeeds.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), PresenceError>> + Send;

    /// Subscribes to `topic`. Only messages published afterwards arrive.
    fn subscribe(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<Subscription, PresenceError>> + Send;

    fn sadd(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<(), PresenceError>> + Send;

    fn srem(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<(), PresenceError>> + Send;

    /// Members of the set at `key`; empty when the set doesn't exist.
    fn smembers(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Vec<String>, PresenceError>> + Send;

    fn hset(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), PresenceError>> + Send;

    /// All fields of the hash at `key`; empty when it doesn't exist.
    fn hgetall(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<HashMap<String, String>, PresenceError>> + Send;

    /// Deletes `key`, whatever it holds.
    fn del(&self, key: &str) -> impl Future<Output = Result<(), PresenceError>> + Send;
}

/// A live subscription to one topic.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    receiver: broadcast::Receiver<Vec<u8>>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, receiver: broadcast::Receiver<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            receiver,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next payload on the topic, or `None` once the topic is gone.
    ///
    /// A slow subscriber that falls behind loses the oldest payloads;
    /// that is logged and the subscription carries on.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
