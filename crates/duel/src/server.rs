//! `DuelServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → lobby / match
//! coordinators, all sharing one presence store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use duel_lobby::{LobbyHandle, spawn_lobby};
use duel_match::MatchManager;
use duel_presence::{LocalPresence, Presence, spawn_listing_publisher};
use duel_protocol::{Codec, JsonCodec, PlayerId};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::handler::handle_connection;
use crate::{DuelError, ServerConfig, WebSocketListener};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<P: Presence, C: Codec> {
    pub(crate) matches: Mutex<MatchManager<P>>,
    pub(crate) lobby: LobbyHandle,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
    next_session: AtomicU64,
}

impl<P: Presence, C: Codec> ServerState<P, C> {
    /// Hands out the next session id. Ids are never reused.
    pub(crate) fn next_session_id(&self) -> PlayerId {
        PlayerId(self.next_session.fetch_add(1, Ordering::Relaxed))
    }
}

/// Builder for configuring and starting a Duel server.
///
/// ```rust,no_run
/// use duel::prelude::*;
///
/// # async fn run() -> Result<(), DuelError> {
/// let server = DuelServer::builder().bind("0.0.0.0:8080").build().await?;
/// server.run().await
/// # }
/// ```
pub struct DuelServerBuilder {
    config: ServerConfig,
}

impl DuelServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Replaces the whole configuration, bind address included.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the server on an in-process presence store.
    pub async fn build(self) -> Result<DuelServer<LocalPresence, JsonCodec>, DuelError> {
        self.build_with(Arc::new(LocalPresence::new())).await
    }

    /// Builds the server on the given presence store. Binds the listener,
    /// starts the lobby, and starts publishing the room listing.
    pub async fn build_with<P: Presence>(
        self,
        presence: Arc<P>,
    ) -> Result<DuelServer<P, JsonCodec>, DuelError> {
        let listener = WebSocketListener::bind(&self.config.bind_addr).await?;
        let lobby = spawn_lobby(Arc::clone(&presence)).await?;
        let publisher =
            spawn_listing_publisher(Arc::clone(&presence), self.config.listing_interval);

        let state = Arc::new(ServerState {
            matches: Mutex::new(MatchManager::new(presence, self.config.timing.clone())),
            lobby,
            codec: JsonCodec,
            config: self.config,
            next_session: AtomicU64::new(1),
        });

        Ok(DuelServer {
            listener,
            state,
            publisher,
        })
    }
}

impl Default for DuelServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Duel server. Call [`run()`](Self::run) to start accepting
/// connections.
pub struct DuelServer<P: Presence, C: Codec> {
    listener: WebSocketListener,
    state: Arc<ServerState<P, C>>,
    publisher: JoinHandle<()>,
}

impl DuelServer<LocalPresence, JsonCodec> {
    pub fn builder() -> DuelServerBuilder {
        DuelServerBuilder::new()
    }
}

impl<P: Presence, C: Codec> DuelServer<P, C> {
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections and spawns a handler task for each. Runs until
    /// the task is dropped or aborted.
    pub async fn run(self) -> Result<(), DuelError> {
        self.run_until(std::future::pending()).await
    }

    /// Like [`run()`](Self::run), but stops accepting once `shutdown`
    /// resolves, then closes every match and the lobby. Seated players
    /// receive `closed` before their connections wind down.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), DuelError> {
        tracing::info!("Duel server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => break,
            }
        }

        tracing::info!("Duel server shutting down");
        self.state.matches.lock().await.shutdown_all().await;
        if let Err(e) = self.state.lobby.shutdown().await {
            tracing::debug!(error = %e, "lobby already stopped");
        }
        Ok(())
    }
}

impl<P: Presence, C: Codec> Drop for DuelServer<P, C> {
    fn drop(&mut self) {
        self.publisher.abort();
    }
}
