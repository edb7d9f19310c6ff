//! Lobby actor: owns the discovery directory and answers lookups.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use duel_match::MatchSettings;
use duel_presence::{Presence, Subscription, TOPIC_MATCH_CREATED, TOPIC_ROOMS};
use duel_protocol::{
    Codec, DirectoryEntry, JsonCodec, ListingEntry, LobbyMessage, MatchCreated, MatchId,
    MatchOptions, PlayerId,
};
use tokio::sync::{mpsc, oneshot};

use crate::{LobbyError, deep_scan};

/// Channel sender for lobby messages pushed to one client.
pub type LobbySender = mpsc::UnboundedSender<LobbyMessage>;

const CHANNEL_SIZE: usize = 64;

enum LobbyCommand {
    Join {
        player_id: PlayerId,
        sender: LobbySender,
    },
    Leave {
        player_id: PlayerId,
    },
    FindRoom {
        code: String,
        reply: oneshot::Sender<LobbyMessage>,
    },
    JoinById {
        match_id: MatchId,
        reply: oneshot::Sender<LobbyMessage>,
    },
    Directory {
        reply: oneshot::Sender<Vec<DirectoryEntry>>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to the lobby actor. Cheap to clone.
#[derive(Clone)]
pub struct LobbyHandle {
    sender: mpsc::Sender<LobbyCommand>,
}

impl LobbyHandle {
    /// Subscribes a client to directory updates. The client gets the
    /// current `rooms_list` right away.
    pub async fn join(&self, player_id: PlayerId, sender: LobbySender) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Join { player_id, sender }).await
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Leave { player_id }).await
    }

    /// Looks up a private match by access code. Answers `room_found` or
    /// `room_not_found`.
    pub async fn find_room(&self, code: impl Into<String>) -> Result<LobbyMessage, LobbyError> {
        let (reply, rx) = oneshot::channel();
        self.send(LobbyCommand::FindRoom {
            code: code.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| LobbyError::Unavailable)
    }

    /// Connection hints for a match picked from the list. Answers
    /// `room_info` or `room_not_found`.
    pub async fn join_by_id(&self, match_id: MatchId) -> Result<LobbyMessage, LobbyError> {
        let (reply, rx) = oneshot::channel();
        self.send(LobbyCommand::JoinById { match_id, reply }).await?;
        rx.await.map_err(|_| LobbyError::Unavailable)
    }

    /// The current directory, ordered by match id.
    pub async fn directory(&self) -> Result<Vec<DirectoryEntry>, LobbyError> {
        let (reply, rx) = oneshot::channel();
        self.send(LobbyCommand::Directory { reply }).await?;
        rx.await.map_err(|_| LobbyError::Unavailable)
    }

    /// Answers a client request. Returns `None` for messages that aren't
    /// requests (membership changes go through [`join`](Self::join) and
    /// [`leave`](Self::leave); server-to-client variants are ignored).
    pub async fn request(&self, message: LobbyMessage) -> Result<Option<LobbyMessage>, LobbyError> {
        let reply = match message {
            LobbyMessage::FindRoom { access_code } => self.find_room(access_code).await?,
            LobbyMessage::JoinRoomById { match_id } => self.join_by_id(match_id).await?,
            LobbyMessage::CreateRoom { options, username } => create_room_info(&options, username),
            _ => return Ok(None),
        };
        Ok(Some(reply))
    }

    pub async fn shutdown(&self) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Shutdown).await
    }

    async fn send(&self, cmd: LobbyCommand) -> Result<(), LobbyError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| LobbyError::Unavailable)
    }
}

/// Hand-off info for a client about to open a match. Missing options
/// fall back to a private best-of-3 with a 3 second selection window.
pub fn create_room_info(options: &MatchOptions, username: Option<String>) -> LobbyMessage {
    let settings = MatchSettings::from_options(options);
    LobbyMessage::CreateRoomInfo {
        is_private: settings.is_private,
        max_rounds: settings.max_rounds,
        wait_time: settings.wait_time,
        username,
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

enum Event {
    Command(LobbyCommand),
    Created(Vec<u8>),
    Listing(Vec<u8>),
    Stop,
}

struct LobbyActor<P: Presence> {
    presence: Arc<P>,
    directory: BTreeMap<MatchId, DirectoryEntry>,
    clients: HashMap<PlayerId, LobbySender>,
    receiver: mpsc::Receiver<LobbyCommand>,
    created: Option<Subscription>,
    rooms: Option<Subscription>,
}

impl<P: Presence> LobbyActor<P> {
    async fn run(mut self) {
        tracing::info!("lobby started");

        loop {
            let event = tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => Event::Command(cmd),
                    None => Event::Stop,
                },
                payload = next(&mut self.created) => match payload {
                    Some(payload) => Event::Created(payload),
                    None => {
                        if let Some(closed) = self.created.take() {
                            tracing::warn!(topic = closed.topic(), "subscription closed");
                        }
                        continue;
                    }
                },
                payload = next(&mut self.rooms) => match payload {
                    Some(payload) => Event::Listing(payload),
                    None => {
                        if let Some(closed) = self.rooms.take() {
                            tracing::warn!(topic = closed.topic(), "subscription closed");
                        }
                        continue;
                    }
                },
            };
            if !self.handle(event) {
                break;
            }
        }

        tracing::info!("lobby stopped");
    }

    /// Returns `false` once the lobby should stop.
    fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::Command(LobbyCommand::Join { player_id, sender }) => {
                let _ = sender.send(LobbyMessage::RoomsList {
                    rooms: self.directory.values().cloned().collect(),
                });
                self.clients.insert(player_id, sender);
                tracing::debug!(%player_id, clients = self.clients.len(), "joined lobby");
            }
            Event::Command(LobbyCommand::Leave { player_id }) => {
                if self.clients.remove(&player_id).is_some() {
                    tracing::debug!(%player_id, clients = self.clients.len(), "left lobby");
                }
            }
            Event::Command(LobbyCommand::FindRoom { code, reply }) => self.find_room(code, reply),
            Event::Command(LobbyCommand::JoinById { match_id, reply }) => {
                let answer = match self.directory.get(&match_id) {
                    Some(entry) => LobbyMessage::RoomInfo {
                        match_id,
                        access_code: entry.access_code.clone(),
                        is_private: entry.is_private,
                    },
                    None => LobbyMessage::RoomNotFound,
                };
                let _ = reply.send(answer);
            }
            Event::Command(LobbyCommand::Directory { reply }) => {
                let _ = reply.send(self.directory.values().cloned().collect());
            }
            Event::Command(LobbyCommand::Shutdown) | Event::Stop => return false,
            Event::Created(payload) => match JsonCodec.decode::<MatchCreated>(&payload) {
                Ok(created) => {
                    tracing::debug!(match_id = %created.match_id, "match announced");
                    self.directory
                        .insert(created.match_id, DirectoryEntry::announced(&created));
                    self.notify();
                }
                Err(e) => tracing::warn!(error = %e, "bad match_created payload"),
            },
            Event::Listing(payload) => match JsonCodec.decode::<Vec<ListingEntry>>(&payload) {
                Ok(listing) => {
                    let directory: BTreeMap<_, _> = listing
                        .iter()
                        .map(|l| (l.match_id, DirectoryEntry::from_listing(l)))
                        .collect();
                    if directory != self.directory {
                        self.directory = directory;
                        self.notify();
                    }
                }
                Err(e) => tracing::warn!(error = %e, "bad rooms payload"),
            },
        }
        true
    }

    /// Local directory first; on a miss the deep scan runs on its own
    /// task and answers the caller directly.
    fn find_room(&self, code: String, reply: oneshot::Sender<LobbyMessage>) {
        let code = code.trim().to_string();
        if code.is_empty() {
            let _ = reply.send(LobbyMessage::RoomNotFound);
            return;
        }

        if let Some(entry) = self.directory.values().find(|e| e.matches_code(&code)) {
            let _ = reply.send(LobbyMessage::RoomFound {
                match_id: entry.match_id,
                access_code: entry.access_code.clone(),
            });
            return;
        }

        let presence = Arc::clone(&self.presence);
        tokio::spawn(async move {
            let answer = match deep_scan(presence.as_ref(), &code).await {
                Some((match_id, access_code)) => LobbyMessage::RoomFound {
                    match_id,
                    access_code: access_code.to_string(),
                },
                None => LobbyMessage::RoomNotFound,
            };
            let _ = reply.send(answer);
        });
    }

    /// Tells every lobby client the directory changed.
    fn notify(&mut self) {
        let count = self.directory.len();
        self.clients
            .retain(|_, sender| sender.send(LobbyMessage::RoomsUpdated { count }).is_ok());
    }
}

/// Next payload from an optional subscription; pends forever once it's gone.
async fn next(subscription: &mut Option<Subscription>) -> Option<Vec<u8>> {
    match subscription {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

/// Subscribes to the directory topics and spawns the lobby actor.
pub async fn spawn_lobby<P: Presence>(presence: Arc<P>) -> Result<LobbyHandle, LobbyError> {
    let created = presence.subscribe(TOPIC_MATCH_CREATED).await?;
    let rooms = presence.subscribe(TOPIC_ROOMS).await?;
    let (tx, rx) = mpsc::channel(CHANNEL_SIZE);

    let actor = LobbyActor {
        presence,
        directory: BTreeMap::new(),
        clients: HashMap::new(),
        receiver: rx,
        created: Some(created),
        rooms: Some(rooms),
    };
    tokio::spawn(actor.run());

    Ok(LobbyHandle { sender: tx })
}
