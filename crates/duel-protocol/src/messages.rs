//! Lobby and match message sets.
//!
//! Both enums are internally tagged on `"type"`. Lobby tags are
//! snake_case (`find_room`), match tags are kebab-case (`make-choice`),
//! and every field is camelCase (`accessCode`, `matchId`), which is what
//! existing clients send.

use serde::{Deserialize, Serialize};

use crate::{DirectoryEntry, MatchId, MatchState, PlayerId};
use crate::state::Choice;

/// Options a client may pass when opening a match. Missing fields take
/// server defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOptions {
    #[serde(default)]
    pub is_private: Option<bool>,
    #[serde(default)]
    pub max_rounds: Option<u8>,
    /// Seconds per selection window.
    #[serde(default)]
    pub wait_time: Option<u32>,
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LobbyMessage {
    // Client → Server
    JoinLobby,
    LeaveLobby,
    CreateRoom {
        #[serde(default)]
        options: MatchOptions,
        #[serde(default)]
        username: Option<String>,
    },
    FindRoom {
        access_code: String,
    },
    JoinRoomById {
        match_id: MatchId,
    },

    // Server → Client
    /// Resolved creation settings; the client opens the match with them.
    CreateRoomInfo {
        is_private: bool,
        max_rounds: u8,
        wait_time: u32,
        username: Option<String>,
    },
    RoomFound {
        match_id: MatchId,
        access_code: String,
    },
    RoomNotFound,
    /// Connection hints for a match picked from the list. Not validated.
    RoomInfo {
        match_id: MatchId,
        access_code: String,
        is_private: bool,
    },
    RoomsList {
        rooms: Vec<DirectoryEntry>,
    },
    RoomsUpdated {
        count: usize,
    },
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum MatchMessage {
    // Client → Server
    Create {
        #[serde(default)]
        options: MatchOptions,
        #[serde(default)]
        display_name: Option<String>,
    },
    Join {
        match_id: MatchId,
        #[serde(default)]
        access_code: Option<String>,
        #[serde(default)]
        display_name: Option<String>,
    },
    MakeChoice {
        choice: Choice,
    },
    PlayerReady,
    UpdateName {
        name: String,
    },
    NextRound,
    RestartGame,
    Leave,

    // Server → Client
    Joined {
        match_id: MatchId,
        session_id: PlayerId,
    },
    /// `code` is 403 for a wrong access code, 404 unknown match, 409 full
    /// or already seated.
    JoinRejected {
        code: u16,
        reason: String,
    },
    /// Full snapshot pushed after every change. `version` increases
    /// strictly per match.
    State {
        version: u64,
        state: MatchState,
    },
    /// The match was disposed.
    Closed,
}
