//! Periodic `rooms` snapshots.

use std::sync::Arc;
use std::time::Duration;

use duel_protocol::{Codec, JsonCodec, ListingEntry};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::{Presence, PresenceError, TOPIC_ROOMS, store};

/// Reads every registered match into listing rows, ordered by id.
pub async fn snapshot_listing<P: Presence>(
    presence: &P,
) -> Result<Vec<ListingEntry>, PresenceError> {
    let mut ids = store::match_ids(presence).await?;
    ids.sort();

    let mut listing = Vec::with_capacity(ids.len());
    for match_id in ids {
        match store::read_listing(presence, match_id).await {
            Ok(Some(entry)) => listing.push(entry),
            // Removed between smembers and hgetall.
            Ok(None) => {}
            Err(e) => tracing::warn!(%match_id, error = %e, "listing read failed, skipping"),
        }
    }
    Ok(listing)
}

/// Publishes a full listing on `rooms` every `period`, starting
/// immediately. Missed ticks are skipped rather than bunched.
///
/// The task runs until the returned handle is aborted.
pub fn spawn_listing_publisher<P: Presence>(
    presence: Arc<P>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if let Err(e) = publish_once(presence.as_ref()).await {
                tracing::warn!(error = %e, "listing publish failed");
            }
        }
    })
}

async fn publish_once<P: Presence>(presence: &P) -> Result<(), PresenceError> {
    let listing = snapshot_listing(presence).await?;
    let payload = JsonCodec.encode(&listing)?;
    tracing::trace!(rooms = listing.len(), "publishing listing");
    presence.publish(TOPIC_ROOMS, payload).await
}
