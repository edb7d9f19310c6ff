//! Match manager: creates, tracks, and routes players to matches.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use duel_presence::Presence;
use duel_protocol::{AccessCode, MatchId, PlayerId};
use tokio::sync::mpsc;

use crate::coordinator::spawn_match;
use crate::{Intent, MatchError, MatchHandle, MatchInfo, MatchSender, MatchSettings, MatchTiming};

/// Counter for generating unique match IDs.
static NEXT_MATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Command channel size for match actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Owns every live match and the player → match index.
///
/// A player sits in at most one match at a time. Matches that dispose
/// themselves report back on a retire channel and are dropped from the
/// index by [`MatchManager::reap`], which every mutating call runs first.
pub struct MatchManager<P: Presence> {
    presence: Arc<P>,
    timing: MatchTiming,
    matches: HashMap<MatchId, MatchHandle>,
    player_matches: HashMap<PlayerId, MatchId>,
    retire_tx: mpsc::UnboundedSender<MatchId>,
    retire_rx: mpsc::UnboundedReceiver<MatchId>,
}

impl<P: Presence> MatchManager<P> {
    pub fn new(presence: Arc<P>, timing: MatchTiming) -> Self {
        let (retire_tx, retire_rx) = mpsc::unbounded_channel();
        Self {
            presence,
            timing,
            matches: HashMap::new(),
            player_matches: HashMap::new(),
            retire_tx,
            retire_rx,
        }
    }

    /// Spawns a new match. Private matches get an access code no other
    /// live match is using.
    pub fn create_match(&mut self, settings: MatchSettings) -> MatchId {
        self.reap();

        let match_id = MatchId(NEXT_MATCH_ID.fetch_add(1, Ordering::Relaxed));
        let access_code = settings.is_private.then(|| self.unused_code());
        let handle = spawn_match(
            match_id,
            access_code,
            settings,
            self.timing.clone(),
            Arc::clone(&self.presence),
            self.retire_tx.clone(),
            DEFAULT_CHANNEL_SIZE,
        );
        self.matches.insert(match_id, handle);

        tracing::info!(
            %match_id,
            private = settings.is_private,
            rounds = settings.max_rounds,
            wait_time = settings.wait_time,
            "match created"
        );
        match_id
    }

    /// Seats a player in an existing match.
    pub async fn join_match(
        &mut self,
        player_id: PlayerId,
        match_id: MatchId,
        access_code: Option<String>,
        name: Option<String>,
        sender: MatchSender,
    ) -> Result<(), MatchError> {
        self.reap();
        if let Some(current) = self.player_matches.get(&player_id) {
            return Err(MatchError::AlreadyInMatch(player_id, *current));
        }

        let handle = self
            .matches
            .get(&match_id)
            .ok_or(MatchError::NotFound(match_id))?;
        handle.join(player_id, access_code, name, sender).await?;

        self.player_matches.insert(player_id, match_id);
        Ok(())
    }

    /// Creates a match and seats its creator as host. The match is torn
    /// down again if the creator can't be seated.
    pub async fn create_and_join(
        &mut self,
        player_id: PlayerId,
        settings: MatchSettings,
        name: Option<String>,
        sender: MatchSender,
    ) -> Result<MatchId, MatchError> {
        self.reap();
        if let Some(current) = self.player_matches.get(&player_id) {
            return Err(MatchError::AlreadyInMatch(player_id, *current));
        }

        let match_id = self.create_match(settings);
        match self.join_match(player_id, match_id, None, name, sender).await {
            Ok(()) => Ok(match_id),
            Err(e) => {
                if let Some(handle) = self.matches.remove(&match_id) {
                    let _ = handle.shutdown().await;
                }
                Err(e)
            }
        }
    }

    /// Unseats a player from whatever match they are in.
    pub async fn leave_match(&mut self, player_id: PlayerId) -> Result<MatchId, MatchError> {
        let match_id = self
            .player_matches
            .remove(&player_id)
            .ok_or(MatchError::NotSeated(player_id))?;

        if let Some(handle) = self.matches.get(&match_id) {
            match handle.leave(player_id).await {
                // Already disposed: nothing left to leave.
                Ok(()) | Err(MatchError::Unavailable(_)) => {}
                Err(e) => return Err(e),
            }
        }

        self.reap();
        Ok(match_id)
    }

    /// Forwards an intent to the player's current match.
    pub async fn route_intent(&self, player_id: PlayerId, intent: Intent) -> Result<(), MatchError> {
        let match_id = self
            .player_matches
            .get(&player_id)
            .ok_or(MatchError::NotSeated(player_id))?;
        let handle = self
            .matches
            .get(match_id)
            .ok_or(MatchError::NotFound(*match_id))?;
        handle.send_intent(player_id, intent).await
    }

    /// Drops disposed matches from the index. Returns how many went.
    pub fn reap(&mut self) -> usize {
        let mut reaped = 0;
        while let Ok(match_id) = self.retire_rx.try_recv() {
            if self.matches.remove(&match_id).is_some() {
                reaped += 1;
            }
            self.player_matches.retain(|_, m| *m != match_id);
            tracing::debug!(%match_id, "match reaped");
        }
        reaped
    }

    pub async fn match_info(&self, match_id: MatchId) -> Result<MatchInfo, MatchError> {
        let handle = self
            .matches
            .get(&match_id)
            .ok_or(MatchError::NotFound(match_id))?;
        handle.get_info().await
    }

    pub fn handle(&self, match_id: MatchId) -> Option<MatchHandle> {
        self.matches.get(&match_id).cloned()
    }

    pub fn player_match(&self, player_id: &PlayerId) -> Option<MatchId> {
        self.player_matches.get(player_id).copied()
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn match_ids(&self) -> Vec<MatchId> {
        self.matches.keys().copied().collect()
    }

    /// Disposes every match, e.g. on server shutdown.
    pub async fn shutdown_all(&mut self) {
        for (_, handle) in self.matches.drain() {
            let _ = handle.shutdown().await;
        }
        self.player_matches.clear();
    }

    fn unused_code(&self) -> AccessCode {
        loop {
            let code = AccessCode::generate();
            let taken = self
                .matches
                .values()
                .any(|h| h.access_code() == Some(&code));
            if !taken {
                return code;
            }
        }
    }
}
