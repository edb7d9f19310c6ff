//! In-process presence store.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::{Mutex, broadcast};

use crate::{Presence, PresenceError, Subscription};

/// Buffered payloads per topic before slow subscribers start lagging.
const TOPIC_CAPACITY: usize = 64;

#[derive(Default)]
struct Store {
    topics: HashMap<String, broadcast::Sender<Vec<u8>>>,
    sets: HashMap<String, BTreeSet<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
}

/// [`Presence`] backed by in-memory maps and broadcast channels.
///
/// Every operation takes one short lock; nothing is held across an await
/// outside the store itself.
#[derive(Default)]
pub struct LocalPresence {
    store: Mutex<Store>,
}

impl LocalPresence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Presence for LocalPresence {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PresenceError> {
        let store = self.store.lock().await;
        if let Some(sender) = store.topics.get(topic) {
            // No live receivers is not an error.
            let _ = sender.send(payload);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, PresenceError> {
        let mut store = self.store.lock().await;
        let sender = store
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0);
        Ok(Subscription::new(topic, sender.subscribe()))
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), PresenceError> {
        let mut store = self.store.lock().await;
        store
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), PresenceError> {
        let mut store = self.store.lock().await;
        if let Some(set) = store.sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                store.sets.remove(key);
            }
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, PresenceError> {
        let store = self.store.lock().await;
        Ok(store
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), PresenceError> {
        let mut store = self.store.lock().await;
        store
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, PresenceError> {
        let store = self.store.lock().await;
        Ok(store.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn del(&self, key: &str) -> Result<(), PresenceError> {
        let mut store = self.store.lock().await;
        store.sets.remove(key);
        store.hashes.remove(key);
        Ok(())
    }
}
