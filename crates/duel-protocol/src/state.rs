//! The replicated match schema.
//!
//! [`MatchState`] is what every attached client receives after each
//! change. Only the match coordinator mutates it; this module holds the
//! shape plus the pieces of game logic that are pure functions of it
//! (move dominance, phase ordering).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AccessCode, MatchId, PlayerId};

// ---------------------------------------------------------------------------
// Choice / Animation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Rock,
    Paper,
    Scissors,
}

impl Choice {
    pub const ALL: [Choice; 3] = [Choice::Rock, Choice::Paper, Choice::Scissors];

    /// Cyclic dominance: rock > scissors > paper > rock.
    pub fn beats(self, other: Choice) -> bool {
        matches!(
            (self, other),
            (Choice::Rock, Choice::Scissors)
                | (Choice::Scissors, Choice::Paper)
                | (Choice::Paper, Choice::Rock)
        )
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Choice::Rock => "rock",
            Choice::Paper => "paper",
            Choice::Scissors => "scissors",
        };
        f.write_str(s)
    }
}

/// Animation tag clients play for a player's hand. Mirrors the choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Animation {
    #[default]
    Idle,
    Rock,
    Paper,
    Scissors,
}

impl From<Choice> for Animation {
    fn from(choice: Choice) -> Self {
        match choice {
            Choice::Rock => Animation::Rock,
            Choice::Paper => Animation::Paper,
            Choice::Scissors => Animation::Scissors,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Result of one throw, from the first player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    FirstWins,
    SecondWins,
    Draw,
}

/// Resolves a single throw between the first and second roster entries.
pub fn resolve(first: Choice, second: Choice) -> Outcome {
    if first == second {
        Outcome::Draw
    } else if first.beats(second) {
        Outcome::FirstWins
    } else {
        Outcome::SecondWins
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Waiting,
    Countdown,
    Playing,
    Timeout,
    Revealing,
    Result,
    Finished,
}

impl Phase {
    /// Phases during which a departure ends the match as `opponent-left`.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            Phase::Countdown
                | Phase::Playing
                | Phase::Timeout
                | Phase::Revealing
                | Phase::Result
        )
    }

    /// Whether `self -> next` is an edge of the match state machine.
    ///
    /// Any in-progress phase may jump to `Finished` when a player leaves.
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (Waiting, Countdown)
            | (Countdown, Playing)
            | (Playing, Revealing)
            | (Playing, Timeout)
            | (Timeout, Revealing)
            | (Revealing, Result)
            | (Revealing, Finished)
            | (Result, Countdown)
            | (Finished, Waiting) => true,
            (from, Finished) => from.is_in_progress(),
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Waiting => "waiting",
            Phase::Countdown => "countdown",
            Phase::Playing => "playing",
            Phase::Timeout => "timeout",
            Phase::Revealing => "revealing",
            Phase::Result => "result",
            Phase::Finished => "finished",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Winners and end reasons
// ---------------------------------------------------------------------------

/// Winner of a round or of the whole match.
///
/// Serialized as `{"player": 3}` or `"draw"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Player(PlayerId),
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    Completed,
    OpponentLeft,
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_ready: bool,
    pub score: u32,
    pub choice: Option<Choice>,
    pub animation: Animation,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_ready: false,
            score: 0,
            choice: None,
            animation: Animation::Idle,
        }
    }

    /// Clears the per-round fields. Called at the start of every round.
    pub fn clear_choice(&mut self) {
        self.choice = None;
        self.animation = Animation::Idle;
    }

    /// Clears everything a restart resets: score, readiness, and choice.
    pub fn reset(&mut self) {
        self.clear_choice();
        self.score = 0;
        self.is_ready = false;
    }
}

/// Immutable record of one resolved round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub round: u8,
    /// `None` when the round was aborted before resolving.
    pub winner: Option<Winner>,
    /// First and second roster entries at resolution time.
    pub players: [PlayerId; 2],
    pub choices: [Choice; 2],
}

// ---------------------------------------------------------------------------
// MatchState
// ---------------------------------------------------------------------------

/// Authoritative state of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    pub match_id: MatchId,
    /// Present iff the match is private.
    pub access_code: Option<AccessCode>,
    pub is_private: bool,
    pub max_rounds: u8,
    /// Decision-time budget per round, in seconds.
    pub wait_time: u32,

    /// Insertion ordered. The first entry is "player A" for resolution.
    pub players: Vec<Player>,
    pub host_id: Option<PlayerId>,

    pub phase: Phase,
    pub current_round: u8,
    pub countdown: u8,
    pub time_remaining_ms: u64,
    pub game_started: bool,

    pub history: Vec<RoundResult>,
    pub round_winner: Option<Winner>,
    pub match_winner: Option<Winner>,
    pub end_reason: Option<EndReason>,
}

impl MatchState {
    /// Players a match can hold.
    pub const CAPACITY: usize = 2;

    pub fn new(
        match_id: MatchId,
        access_code: Option<AccessCode>,
        max_rounds: u8,
        wait_time: u32,
    ) -> Self {
        Self {
            match_id,
            is_private: access_code.is_some(),
            access_code,
            max_rounds,
            wait_time,
            players: Vec::with_capacity(Self::CAPACITY),
            host_id: None,
            phase: Phase::Waiting,
            current_round: 1,
            countdown: 0,
            time_remaining_ms: 0,
            game_started: false,
            history: Vec::new(),
            round_winner: None,
            match_winner: None,
            end_reason: None,
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.player(id).is_some()
    }

    pub fn is_host(&self, id: PlayerId) -> bool {
        self.host_id == Some(id)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= Self::CAPACITY
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Display name for a winner, as the directory metadata carries it.
    pub fn winner_label(&self, winner: Winner) -> String {
        match winner {
            Winner::Draw => "draw".to_string(),
            Winner::Player(id) => self
                .player(id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| id.to_string()),
        }
    }
}
