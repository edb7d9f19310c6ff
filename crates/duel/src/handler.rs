//! Per-connection handler: handshake and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version
//!   2. Assign a session id → send HandshakeAck
//!   3. Loop: inbound frames → system / lobby / match handling, while
//!      match snapshots and lobby updates are forwarded out

use std::sync::Arc;
use std::time::Instant;

use duel_lobby::LobbySender;
use duel_match::{Intent, MatchError, MatchOutbound, MatchSender, MatchSettings};
use duel_presence::Presence;
use duel_protocol::{
    Codec, Envelope, LobbyMessage, MatchId, MatchMessage, Payload, PlayerId, ProtocolError,
    SystemMessage,
};
use tokio::sync::mpsc;
use tokio::time;

use crate::server::{PROTOCOL_VERSION, ServerState};
use crate::{DuelError, WebSocketConnection};

/// Drop guard that unseats a player from their match and the lobby when
/// the handler exits.
///
/// `Drop` is synchronous, so the async cleanup runs on a spawned task.
struct ConnectionGuard<P: Presence, C: Codec> {
    player_id: PlayerId,
    state: Arc<ServerState<P, C>>,
}

impl<P: Presence, C: Codec> Drop for ConnectionGuard<P, C> {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let left = state.matches.lock().await.leave_match(player_id).await;
            if let Ok(match_id) = left {
                tracing::info!(%player_id, %match_id, "left match on disconnect");
            }
            let _ = state.lobby.leave(player_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<P: Presence, C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<P, C>>,
) -> Result<(), DuelError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let start = Instant::now();
    let player_id = perform_handshake(&conn, &state, &start).await?;
    tracing::info!(%conn_id, %player_id, "player connected");

    let _guard = ConnectionGuard {
        player_id,
        state: Arc::clone(&state),
    };

    let (match_tx, mut match_rx) = mpsc::unbounded_channel();
    let (lobby_tx, mut lobby_rx) = mpsc::unbounded_channel();
    let mut session = Session {
        conn: &conn,
        state: state.as_ref(),
        player_id,
        seq: 1,
        start,
        match_tx,
        lobby_tx,
    };

    let idle_timeout = state.config.idle_timeout;
    let idle = time::sleep(idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            frame = conn.recv() => {
                let data = match frame {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%player_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%player_id, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(time::Instant::now() + idle_timeout);
                if session.handle_frame(&data).await? {
                    break;
                }
            }
            Some(out) = match_rx.recv() => {
                for out in coalesce(out, &mut match_rx) {
                    session.forward_match(out).await?;
                }
            }
            Some(msg) = lobby_rx.recv() => session.send(Payload::Lobby(msg)).await?,
            () = &mut idle => {
                tracing::info!(%player_id, "connection idle, dropping");
                break;
            }
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%player_id, error = %e, "close failed");
    }
    // _guard drops here → leave match and lobby.
    Ok(())
}

/// Receives the `Handshake`, checks the version, and acknowledges with a
/// fresh session id.
async fn perform_handshake<P: Presence, C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<P, C>>,
    start: &Instant,
) -> Result<PlayerId, DuelError> {
    let data = match time::timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope = state.codec.decode(&data)?;
    let version = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version }) => version,
        _ => {
            send_error(conn, &state.codec, 400, "expected Handshake", 0, start).await?;
            return Err(
                ProtocolError::InvalidMessage("first message must be Handshake".into()).into(),
            );
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            conn,
            &state.codec,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
            0,
            start,
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let session_id = state.next_session_id();
    let ack = Envelope::new(
        0,
        millis(start),
        Payload::System(SystemMessage::HandshakeAck {
            session_id,
            server_time: millis(start),
        }),
    );
    conn.send(&state.codec.encode(&ack)?).await?;

    Ok(session_id)
}

/// Everything one connected player's handler needs between frames.
struct Session<'a, P: Presence, C: Codec> {
    conn: &'a WebSocketConnection,
    state: &'a ServerState<P, C>,
    player_id: PlayerId,
    seq: u64,
    start: Instant,
    match_tx: MatchSender,
    lobby_tx: LobbySender,
}

impl<P: Presence, C: Codec> Session<'_, P, C> {
    /// Handles one inbound frame. Returns `true` if the connection should
    /// close. Frames that don't decode are dropped.
    async fn handle_frame(&mut self, data: &[u8]) -> Result<bool, DuelError> {
        let envelope: Envelope = match self.state.codec.decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(player_id = %self.player_id, error = %e, "undecodable frame");
                return Ok(false);
            }
        };

        match envelope.payload {
            Payload::System(msg) => return self.handle_system(msg).await,
            Payload::Lobby(msg) => self.handle_lobby(msg).await?,
            Payload::Match(msg) => self.handle_match(msg).await?,
        }
        Ok(false)
    }

    async fn handle_system(&mut self, msg: SystemMessage) -> Result<bool, DuelError> {
        match msg {
            SystemMessage::Heartbeat { client_time } => {
                let server_time = millis(&self.start);
                self.send(Payload::System(SystemMessage::HeartbeatAck {
                    client_time,
                    server_time,
                }))
                .await?;
            }
            SystemMessage::Disconnect { reason } => {
                tracing::info!(player_id = %self.player_id, %reason, "client disconnected");
                return Ok(true);
            }
            _ => {
                tracing::debug!(player_id = %self.player_id, "ignoring unexpected system message");
            }
        }
        Ok(false)
    }

    async fn handle_lobby(&mut self, msg: LobbyMessage) -> Result<(), DuelError> {
        let state = self.state;
        let lobby = &state.lobby;
        let result = match msg {
            LobbyMessage::JoinLobby => lobby.join(self.player_id, self.lobby_tx.clone()).await,
            LobbyMessage::LeaveLobby => lobby.leave(self.player_id).await,
            other => match lobby.request(other).await {
                Ok(Some(reply)) => return self.send(Payload::Lobby(reply)).await,
                Ok(None) => {
                    tracing::debug!(player_id = %self.player_id, "ignoring lobby message");
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };

        if let Err(e) = result {
            tracing::warn!(player_id = %self.player_id, error = %e, "lobby request failed");
            self.send_error(503, &e.to_string()).await?;
        }
        Ok(())
    }

    async fn handle_match(&mut self, msg: MatchMessage) -> Result<(), DuelError> {
        let player_id = self.player_id;
        match msg {
            MatchMessage::Create {
                options,
                display_name,
            } => {
                let settings = MatchSettings::from_options(&options);
                let result = {
                    let mut matches = self.state.matches.lock().await;
                    matches
                        .create_and_join(player_id, settings, display_name, self.match_tx.clone())
                        .await
                };
                self.reply_join(result).await
            }
            MatchMessage::Join {
                match_id,
                access_code,
                display_name,
            } => {
                let result = {
                    let mut matches = self.state.matches.lock().await;
                    matches
                        .join_match(
                            player_id,
                            match_id,
                            access_code,
                            display_name,
                            self.match_tx.clone(),
                        )
                        .await
                        .map(|()| match_id)
                };
                self.reply_join(result).await
            }
            MatchMessage::Leave => {
                let result = self.state.matches.lock().await.leave_match(player_id).await;
                match result {
                    Ok(match_id) => tracing::info!(%player_id, %match_id, "left match"),
                    Err(e) => tracing::debug!(%player_id, error = %e, "leave ignored"),
                }
                Ok(())
            }
            other => {
                let Some(intent) = Intent::from_message(other) else {
                    tracing::debug!(%player_id, "ignoring server-side match message");
                    return Ok(());
                };
                let result = self.state.matches.lock().await.route_intent(player_id, intent).await;
                if let Err(e) = result {
                    tracing::debug!(%player_id, error = %e, "intent dropped");
                }
                Ok(())
            }
        }
    }

    async fn reply_join(
        &mut self,
        result: Result<MatchId, MatchError>,
    ) -> Result<(), DuelError> {
        let msg = match result {
            Ok(match_id) => MatchMessage::Joined {
                match_id,
                session_id: self.player_id,
            },
            Err(e) => MatchMessage::JoinRejected {
                code: e.code(),
                reason: e.to_string(),
            },
        };
        self.send(Payload::Match(msg)).await
    }

    async fn forward_match(&mut self, out: MatchOutbound) -> Result<(), DuelError> {
        let msg = match out {
            MatchOutbound::State { version, state } => MatchMessage::State {
                version,
                state: state.as_ref().clone(),
            },
            MatchOutbound::Closed => MatchMessage::Closed,
        };
        self.send(Payload::Match(msg)).await
    }

    async fn send(&mut self, payload: Payload) -> Result<(), DuelError> {
        let envelope = Envelope::new(next_seq(&mut self.seq), millis(&self.start), payload);
        let bytes = self.state.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn send_error(&mut self, code: u16, message: &str) -> Result<(), DuelError> {
        let seq = next_seq(&mut self.seq);
        send_error(self.conn, &self.state.codec, code, message, seq, &self.start).await
    }
}

/// Sends a `SystemMessage::Error` envelope to the client.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
    seq: u64,
    start: &Instant,
) -> Result<(), DuelError> {
    let envelope = Envelope::new(
        seq,
        millis(start),
        Payload::System(SystemMessage::Error {
            code,
            message: message.to_string(),
        }),
    );
    let bytes = codec.encode(&envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

fn millis(start: &Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Collapses a burst of queued match output into what is worth sending:
/// the newest snapshot, then `closed` if one was queued. Anything behind a
/// `closed` belongs to a later match and stays queued.
fn coalesce(
    first: MatchOutbound,
    rx: &mut mpsc::UnboundedReceiver<MatchOutbound>,
) -> Vec<MatchOutbound> {
    let mut latest = match first {
        MatchOutbound::Closed => return vec![MatchOutbound::Closed],
        state @ MatchOutbound::State { .. } => state,
    };
    while let Ok(next) = rx.try_recv() {
        match next {
            MatchOutbound::Closed => return vec![latest, MatchOutbound::Closed],
            state @ MatchOutbound::State { .. } => latest = state,
        }
    }
    vec![latest]
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_protocol::MatchState;

    fn snapshot(version: u64) -> MatchOutbound {
        MatchOutbound::State {
            version,
            state: Arc::new(MatchState::new(MatchId(1), None, 3, 3)),
        }
    }

    fn versions(out: &[MatchOutbound]) -> Vec<Option<u64>> {
        out.iter()
            .map(|o| match o {
                MatchOutbound::State { version, .. } => Some(*version),
                MatchOutbound::Closed => None,
            })
            .collect()
    }

    #[test]
    fn test_coalesce_keeps_only_newest_snapshot() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for v in 2..=60 {
            tx.send(snapshot(v)).unwrap();
        }

        let out = coalesce(snapshot(1), &mut rx);

        assert_eq!(versions(&out), vec![Some(60)]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_coalesce_never_drops_closed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(snapshot(2)).unwrap();
        tx.send(MatchOutbound::Closed).unwrap();
        tx.send(snapshot(1)).unwrap();

        let out = coalesce(snapshot(1), &mut rx);

        assert_eq!(versions(&out), vec![Some(2), None]);
        assert!(matches!(rx.try_recv(), Ok(MatchOutbound::State { version: 1, .. })));
    }

    #[test]
    fn test_coalesce_closed_first_sends_it_alone() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(snapshot(1)).unwrap();

        let out = coalesce(MatchOutbound::Closed, &mut rx);

        assert_eq!(versions(&out), vec![None]);
        assert!(rx.try_recv().is_ok());
    }
}
