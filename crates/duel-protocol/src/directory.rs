//! What matches publish about themselves, and what the lobby shows.
//!
//! A match writes [`MatchMetadata`] into the presence store on every
//! change. The listing publisher bundles those into [`ListingEntry`]
//! snapshots; the lobby turns snapshots and [`MatchCreated`] announcements
//! into [`DirectoryEntry`] rows for clients.

use serde::{Deserialize, Serialize};

use crate::{AccessCode, EndReason, MatchId, MatchState, Phase};

/// Access-code sentinel shown for public matches.
pub const PUBLIC_CODE: &str = "PUBLIC";

/// Full metadata a match writes on every change. Last write wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchMetadata {
    pub access_code: Option<AccessCode>,
    pub is_private: bool,
    pub phase: Phase,
    pub game_started: bool,
    pub player_count: usize,
    pub is_full: bool,
    pub is_empty: bool,
    /// Winner's display name, or `"draw"`.
    #[serde(default)]
    pub game_winner: Option<String>,
    #[serde(default)]
    pub end_reason: Option<EndReason>,
}

impl MatchMetadata {
    pub fn from_state(state: &MatchState) -> Self {
        Self {
            access_code: state.access_code.clone(),
            is_private: state.is_private,
            phase: state.phase,
            game_started: state.game_started,
            player_count: state.players.len(),
            is_full: state.is_full(),
            is_empty: state.is_empty(),
            game_winner: state.match_winner.map(|w| state.winner_label(w)),
            end_reason: state.end_reason,
        }
    }
}

/// Announcement published on `match_created` when a match opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCreated {
    pub match_id: MatchId,
    pub access_code: Option<AccessCode>,
    pub is_private: bool,
}

/// One match in a periodic `rooms` snapshot.
///
/// `metadata` is `None` when the match has not written any yet or wrote
/// something unparseable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    pub match_id: MatchId,
    pub clients: usize,
    pub max_clients: usize,
    pub metadata: Option<MatchMetadata>,
}

/// Discovery row as lobby clients see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub match_id: MatchId,
    /// The real code for private matches, [`PUBLIC_CODE`] otherwise.
    pub access_code: String,
    pub is_private: bool,
    pub player_count: usize,
    pub capacity: usize,
    pub phase: Phase,
    pub game_started: bool,
}

impl DirectoryEntry {
    /// Row inserted straight from a creation announcement: one player,
    /// waiting.
    pub fn announced(created: &MatchCreated) -> Self {
        Self {
            match_id: created.match_id,
            access_code: code_or_public(created.access_code.as_ref()),
            is_private: created.is_private,
            player_count: 1,
            capacity: MatchState::CAPACITY,
            phase: Phase::Waiting,
            game_started: false,
        }
    }

    pub fn from_listing(listing: &ListingEntry) -> Self {
        let meta = listing.metadata.as_ref();
        Self {
            match_id: listing.match_id,
            access_code: code_or_public(meta.and_then(|m| m.access_code.as_ref())),
            is_private: meta.is_some_and(|m| m.is_private),
            player_count: listing.clients,
            capacity: listing.max_clients,
            phase: meta.map(|m| m.phase).unwrap_or_default(),
            game_started: meta.is_some_and(|m| m.game_started),
        }
    }

    /// Private entries only; public ones never answer a code lookup.
    pub fn matches_code(&self, code: &str) -> bool {
        self.is_private && self.access_code.eq_ignore_ascii_case(code.trim())
    }
}

fn code_or_public(code: Option<&AccessCode>) -> String {
    code.map(|c| c.as_str().to_string())
        .unwrap_or_else(|| PUBLIC_CODE.to_string())
}
