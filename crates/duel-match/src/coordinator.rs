//! Match actor: an isolated Tokio task that owns one match.
//!
//! The actor is the only writer of its match state. Commands arrive over
//! a bounded mpsc channel; the phase and grace timers are polled in the
//! same `select!` loop, so a timer fire and a player message can never
//! interleave mid-transition.

use std::collections::HashMap;
use std::sync::Arc;

use duel_presence::Presence;
use duel_protocol::{
    AccessCode, MatchCreated, MatchId, MatchMetadata, MatchState, Phase, PlayerId,
};
use tokio::sync::{mpsc, oneshot};

use crate::directory::DirectoryPublisher;
use crate::{
    Effect, GraceTimer, Intent, MatchError, MatchSettings, MatchTiming, PhaseTimer, Referee,
    TimerFired, TimerKind,
};

/// An outbound message from a match to a seated player's connection.
#[derive(Debug, Clone)]
pub enum MatchOutbound {
    /// Full snapshot after a change.
    State { version: u64, state: Arc<MatchState> },
    /// The match was disposed.
    Closed,
}

/// Channel sender for delivering outbound messages to a player.
pub type MatchSender = mpsc::UnboundedSender<MatchOutbound>;

pub(crate) enum MatchCommand {
    Join {
        player_id: PlayerId,
        access_code: Option<String>,
        name: Option<String>,
        sender: MatchSender,
        reply: oneshot::Sender<Result<(), MatchError>>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), MatchError>>,
    },
    Intent {
        player_id: PlayerId,
        intent: Intent,
    },
    GetInfo {
        reply: oneshot::Sender<MatchInfo>,
    },
    Snapshot {
        reply: oneshot::Sender<MatchState>,
    },
    Shutdown,
}

/// Summary of a running match (not the full state).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchInfo {
    pub match_id: MatchId,
    pub access_code: Option<AccessCode>,
    pub is_private: bool,
    pub phase: Phase,
    pub player_count: usize,
    pub capacity: usize,
    /// Version of the last published snapshot.
    pub version: u64,
}

/// Handle to a running match actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MatchHandle {
    match_id: MatchId,
    access_code: Option<AccessCode>,
    sender: mpsc::Sender<MatchCommand>,
}

impl MatchHandle {
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub fn access_code(&self) -> Option<&AccessCode> {
        self.access_code.as_ref()
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub async fn join(
        &self,
        player_id: PlayerId,
        access_code: Option<String>,
        name: Option<String>,
        sender: MatchSender,
    ) -> Result<(), MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Join {
            player_id,
            access_code,
            name,
            sender,
            reply,
        })
        .await?;
        rx.await.map_err(|_| MatchError::Unavailable(self.match_id))?
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<(), MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Leave { player_id, reply }).await?;
        rx.await.map_err(|_| MatchError::Unavailable(self.match_id))?
    }

    /// Fire-and-forget: intents that don't apply are dropped inside.
    pub async fn send_intent(&self, player_id: PlayerId, intent: Intent) -> Result<(), MatchError> {
        self.send(MatchCommand::Intent { player_id, intent }).await
    }

    pub async fn get_info(&self) -> Result<MatchInfo, MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::GetInfo { reply }).await?;
        rx.await.map_err(|_| MatchError::Unavailable(self.match_id))
    }

    pub async fn snapshot(&self) -> Result<MatchState, MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| MatchError::Unavailable(self.match_id))
    }

    /// Disposes the match regardless of who is seated.
    pub async fn shutdown(&self) -> Result<(), MatchError> {
        self.send(MatchCommand::Shutdown).await
    }

    async fn send(&self, cmd: MatchCommand) -> Result<(), MatchError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| MatchError::Unavailable(self.match_id))
    }
}

enum Event {
    Command(MatchCommand),
    Timer(TimerFired),
    Grace,
    /// Every handle was dropped.
    Orphaned,
}

struct MatchActor {
    match_id: MatchId,
    referee: Referee,
    senders: HashMap<PlayerId, MatchSender>,
    receiver: mpsc::Receiver<MatchCommand>,
    timer: PhaseTimer,
    grace: GraceTimer,
    directory: DirectoryPublisher,
    last_metadata: Option<MatchMetadata>,
    retire: mpsc::UnboundedSender<MatchId>,
}

impl MatchActor {
    async fn run(mut self) {
        tracing::info!(match_id = %self.match_id, "match actor started");

        loop {
            let event = tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => Event::Command(cmd),
                    None => Event::Orphaned,
                },
                fired = self.timer.wait() => Event::Timer(fired),
                () = self.grace.wait() => Event::Grace,
            };
            if self.handle(event) {
                break;
            }
        }

        tracing::info!(match_id = %self.match_id, "match actor stopped");
    }

    /// Processes one event. Returns `true` once the match is disposed.
    fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::Command(MatchCommand::Join {
                player_id,
                access_code,
                name,
                sender,
                reply,
            }) => {
                let (result, effects) =
                    match self.referee.join(player_id, access_code.as_deref(), name) {
                        Ok(effects) => {
                            self.senders.insert(player_id, sender);
                            tracing::info!(
                                match_id = %self.match_id,
                                %player_id,
                                players = self.referee.state().players.len(),
                                "player joined"
                            );
                            (Ok(()), effects)
                        }
                        Err(e) => {
                            tracing::debug!(
                                match_id = %self.match_id,
                                %player_id,
                                error = %e,
                                "join rejected"
                            );
                            (Err(e), Vec::new())
                        }
                    };
                let stopped = self.step(effects);
                let _ = reply.send(result);
                stopped
            }
            Event::Command(MatchCommand::Leave { player_id, reply }) => {
                let (result, effects) = match self.referee.leave(player_id) {
                    Ok(effects) => {
                        self.senders.remove(&player_id);
                        tracing::info!(
                            match_id = %self.match_id,
                            %player_id,
                            players = self.referee.state().players.len(),
                            "player left"
                        );
                        (Ok(()), effects)
                    }
                    Err(e) => (Err(e), Vec::new()),
                };
                let stopped = self.step(effects);
                let _ = reply.send(result);
                stopped
            }
            Event::Command(MatchCommand::Intent { player_id, intent }) => {
                let effects = self.referee.handle_intent(player_id, intent);
                self.step(effects)
            }
            Event::Command(MatchCommand::GetInfo { reply }) => {
                let _ = reply.send(self.info());
                false
            }
            Event::Command(MatchCommand::Snapshot { reply }) => {
                let _ = reply.send(self.referee.state().clone());
                false
            }
            Event::Command(MatchCommand::Shutdown) | Event::Orphaned => {
                self.step(vec![Effect::Dispose])
            }
            Event::Timer(fired) => {
                if !self.timer.is_current(fired.token) {
                    tracing::debug!(
                        match_id = %self.match_id,
                        token = fired.token,
                        fired = ?fired.kind,
                        armed = ?self.timer.kind(),
                        "stale timer token, ignoring"
                    );
                    return false;
                }
                let effects = match fired.kind {
                    TimerKind::Countdown => self.referee.countdown_tick(),
                    TimerKind::Selection => self.referee.selection_tick(fired.elapsed),
                    TimerKind::Deferred(kind) => self.referee.deferred(kind),
                };
                self.step(effects)
            }
            Event::Grace => {
                let effects = self.referee.grace_elapsed();
                self.step(effects)
            }
        }
    }

    /// Applies effects, publishes the change, and disposes if asked to.
    fn step(&mut self, effects: Vec<Effect>) -> bool {
        let dispose = self.apply(effects);
        self.sync();
        if dispose {
            self.dispose();
        }
        dispose
    }

    fn apply(&mut self, effects: Vec<Effect>) -> bool {
        let mut dispose = false;
        for effect in effects {
            match effect {
                Effect::StartCountdown(period) => {
                    self.timer.arm_periodic(TimerKind::Countdown, period);
                }
                Effect::StartSelection(period) => {
                    self.timer.arm_periodic(TimerKind::Selection, period);
                }
                Effect::Defer(kind, delay) => {
                    self.timer.arm_once(TimerKind::Deferred(kind), delay);
                }
                Effect::CancelTimers => self.timer.cancel(),
                Effect::StartGrace(after) => {
                    tracing::info!(
                        match_id = %self.match_id,
                        grace_secs = after.as_secs(),
                        "private match empty, holding it open"
                    );
                    self.grace.arm(after);
                }
                Effect::CancelGrace => self.grace.cancel(),
                Effect::Dispose => dispose = true,
            }
        }
        dispose
    }

    /// Pushes a snapshot to every seated player and republishes metadata
    /// when it changed.
    fn sync(&mut self) {
        let Some((version, state)) = self.referee.replica_mut().take_snapshot() else {
            return;
        };
        let metadata = MatchMetadata::from_state(&state);
        self.broadcast(MatchOutbound::State {
            version,
            state: Arc::new(state),
        });

        if self.last_metadata.as_ref() != Some(&metadata) {
            self.directory.upsert(metadata.clone());
            self.last_metadata = Some(metadata);
        }
    }

    fn broadcast(&self, msg: MatchOutbound) {
        for sender in self.senders.values() {
            // Receiver gone means the connection is already closing.
            let _ = sender.send(msg.clone());
        }
    }

    fn dispose(&mut self) {
        self.timer.cancel();
        self.grace.cancel();
        self.broadcast(MatchOutbound::Closed);
        self.senders.clear();
        self.directory.remove();
        let _ = self.retire.send(self.match_id);
        tracing::info!(match_id = %self.match_id, "match disposed");
    }

    fn info(&self) -> MatchInfo {
        let state = self.referee.state();
        MatchInfo {
            match_id: self.match_id,
            access_code: state.access_code.clone(),
            is_private: state.is_private,
            phase: state.phase,
            player_count: state.players.len(),
            capacity: MatchState::CAPACITY,
            version: self.referee.version(),
        }
    }
}

/// Spawns a match actor and registers the match with presence.
///
/// The initial metadata write and the `match_created` announcement are
/// queued before the actor starts, in that order.
pub(crate) fn spawn_match<P: Presence>(
    match_id: MatchId,
    access_code: Option<AccessCode>,
    settings: MatchSettings,
    timing: MatchTiming,
    presence: Arc<P>,
    retire: mpsc::UnboundedSender<MatchId>,
    channel_size: usize,
) -> MatchHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let created = MatchCreated {
        match_id,
        access_code: access_code.clone(),
        is_private: access_code.is_some(),
    };

    let mut actor = MatchActor {
        match_id,
        referee: Referee::new(match_id, access_code.clone(), settings, timing),
        senders: HashMap::new(),
        receiver: rx,
        timer: PhaseTimer::new(),
        grace: GraceTimer::new(),
        directory: DirectoryPublisher::spawn(match_id, presence),
        last_metadata: None,
        retire,
    };
    actor.sync();
    actor.directory.announce(created);

    tokio::spawn(actor.run());

    MatchHandle {
        match_id,
        access_code,
        sender: tx,
    }
}
