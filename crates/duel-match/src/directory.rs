//! Ordered presence writes for one match.
//!
//! The match actor never awaits the presence store. It queues updates on
//! this publisher, whose task applies them strictly in order, so a late
//! upsert can never resurrect a removed match.

use std::sync::Arc;

use duel_presence::{Presence, store};
use duel_protocol::{MatchCreated, MatchId, MatchMetadata, MatchState};
use tokio::sync::mpsc;

#[derive(Debug)]
enum DirectoryUpdate {
    Upsert(MatchMetadata),
    Announce(MatchCreated),
    Remove,
}

#[derive(Debug)]
pub(crate) struct DirectoryPublisher {
    sender: mpsc::UnboundedSender<DirectoryUpdate>,
}

impl DirectoryPublisher {
    pub(crate) fn spawn<P: Presence>(match_id: MatchId, presence: Arc<P>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run(match_id, presence, receiver));
        Self { sender }
    }

    pub(crate) fn upsert(&self, metadata: MatchMetadata) {
        self.push(DirectoryUpdate::Upsert(metadata));
    }

    pub(crate) fn announce(&self, created: MatchCreated) {
        self.push(DirectoryUpdate::Announce(created));
    }

    /// Final update; the publisher task exits after applying it.
    pub(crate) fn remove(&self) {
        self.push(DirectoryUpdate::Remove);
    }

    fn push(&self, update: DirectoryUpdate) {
        if self.sender.send(update).is_err() {
            tracing::debug!("directory publisher already stopped");
        }
    }
}

async fn run<P: Presence>(
    match_id: MatchId,
    presence: Arc<P>,
    mut receiver: mpsc::UnboundedReceiver<DirectoryUpdate>,
) {
    while let Some(update) = receiver.recv().await {
        let last = matches!(update, DirectoryUpdate::Remove);
        let result = match update {
            DirectoryUpdate::Upsert(metadata) => {
                store::write_match(
                    presence.as_ref(),
                    match_id,
                    &metadata,
                    MatchState::CAPACITY,
                )
                .await
            }
            DirectoryUpdate::Announce(created) => store::announce(presence.as_ref(), &created).await,
            DirectoryUpdate::Remove => store::remove_match(presence.as_ref(), match_id).await,
        };
        if let Err(e) = result {
            tracing::warn!(%match_id, error = %e, "presence update failed");
        }
        if last {
            break;
        }
    }
}
