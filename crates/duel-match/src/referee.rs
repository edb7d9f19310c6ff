//! The match phase state machine.
//!
//! [`Referee`] is synchronous and owns no timers. Each operation mutates
//! the replicated state and returns the [`Effect`]s the owning actor must
//! carry out: arm or cancel a timer, start the empty-match grace window,
//! or dispose of the match. Keeping I/O and time out of here lets the
//! whole rule set be tested without a runtime.

use std::time::Duration;

use duel_protocol::{
    AccessCode, Choice, EndReason, MatchId, MatchMessage, MatchState, Outcome, Phase, Player,
    PlayerId, RoundResult, Winner, resolve,
};

use crate::{MatchError, MatchSettings, MatchTiming, Replica};

/// One-shot follow-ups scheduled on the phase timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// `timeout` → `revealing`.
    Reveal,
    /// Resolve the revealed round.
    Resolve,
}

/// Side effects requested by a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Arm the phase timer as a periodic countdown tick.
    StartCountdown(Duration),
    /// Arm the phase timer as the periodic selection tick.
    StartSelection(Duration),
    /// Arm the phase timer to fire once.
    Defer(Deferred, Duration),
    /// Disarm the phase timer.
    CancelTimers,
    StartGrace(Duration),
    CancelGrace,
    /// The match is over for good: stop the actor.
    Dispose,
}

/// Player intents routed into a running match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    MakeChoice(Choice),
    Ready,
    Rename(String),
    NextRound,
    Restart,
}

impl Intent {
    /// Picks the in-match intent out of a client message. Seat changes
    /// (`create`, `join`, `leave`) and server-bound variants return `None`.
    pub fn from_message(msg: MatchMessage) -> Option<Self> {
        match msg {
            MatchMessage::MakeChoice { choice } => Some(Self::MakeChoice(choice)),
            MatchMessage::PlayerReady => Some(Self::Ready),
            MatchMessage::UpdateName { name } => Some(Self::Rename(name)),
            MatchMessage::NextRound => Some(Self::NextRound),
            MatchMessage::RestartGame => Some(Self::Restart),
            _ => None,
        }
    }
}

pub struct Referee {
    replica: Replica,
    timing: MatchTiming,
    grace_armed: bool,
}

impl Referee {
    pub fn new(
        match_id: MatchId,
        access_code: Option<AccessCode>,
        settings: MatchSettings,
        timing: MatchTiming,
    ) -> Self {
        let state = MatchState::new(
            match_id,
            access_code,
            settings.max_rounds,
            settings.wait_time,
        );
        Self {
            replica: Replica::new(state),
            timing,
            grace_armed: false,
        }
    }

    pub fn state(&self) -> &MatchState {
        self.replica.state()
    }

    pub fn replica_mut(&mut self) -> &mut Replica {
        &mut self.replica
    }

    pub fn match_id(&self) -> MatchId {
        self.replica.state().match_id
    }

    /// Version of the last snapshot taken from the replica.
    pub fn version(&self) -> u64 {
        self.replica.version()
    }

    // -----------------------------------------------------------------------
    // Seats
    // -----------------------------------------------------------------------

    /// Seats a player.
    ///
    /// The first joiner of an empty match is never asked for the code.
    /// A lone joiner is marked ready so the second player's ready starts
    /// the game.
    pub fn join(
        &mut self,
        player_id: PlayerId,
        access_code: Option<&str>,
        name: Option<String>,
    ) -> Result<Vec<Effect>, MatchError> {
        let state = self.replica.state();
        let match_id = state.match_id;

        if state.contains(player_id) {
            return Err(MatchError::AlreadyJoined(player_id, match_id));
        }
        if state.is_full() {
            return Err(MatchError::Full(match_id));
        }
        if let Some(code) = &state.access_code {
            let accepted = state.is_empty() || access_code.is_some_and(|c| code.matches(c));
            if !accepted {
                return Err(MatchError::AccessCodeMismatch(match_id));
            }
        }

        let name = clean_name(name)
            .unwrap_or_else(|| format!("Player {}", state.players.len() + 1));

        let state = self.replica.state_mut();
        let mut player = Player::new(player_id, name);
        player.is_ready = state.players.is_empty();
        state.players.push(player);
        if state.host_id.is_none() {
            state.host_id = Some(player_id);
        }

        let mut effects = Vec::new();
        if std::mem::take(&mut self.grace_armed) {
            effects.push(Effect::CancelGrace);
        }
        Ok(effects)
    }

    /// Unseats a player. Leaving mid-game ends the match as
    /// `opponent-left`; the host seat passes to whoever has been seated
    /// longest.
    pub fn leave(&mut self, player_id: PlayerId) -> Result<Vec<Effect>, MatchError> {
        let state = self.replica.state();
        if !state.contains(player_id) {
            return Err(MatchError::NotInMatch(player_id, state.match_id));
        }
        let phase = state.phase;

        let mut effects = Vec::new();
        let state = self.replica.state_mut();

        if phase.is_in_progress() {
            record_aborted_round(state);
            enter(state, Phase::Finished);
            state.end_reason = Some(EndReason::OpponentLeft);
            effects.push(Effect::CancelTimers);
            tracing::info!(
                match_id = %state.match_id,
                %player_id,
                %phase,
                "player left mid-game, match ended"
            );
        }

        state.players.retain(|p| p.id != player_id);
        if state.host_id == Some(player_id) {
            state.host_id = state.players.first().map(|p| p.id);
        }

        if state.players.is_empty() {
            if state.is_private {
                self.grace_armed = true;
                effects.push(Effect::StartGrace(self.timing.empty_private_grace));
            } else {
                effects.push(Effect::Dispose);
            }
        }
        Ok(effects)
    }

    /// The empty-private grace window ran out.
    pub fn grace_elapsed(&mut self) -> Vec<Effect> {
        if !std::mem::take(&mut self.grace_armed) {
            return Vec::new();
        }
        if self.replica.state().is_empty() {
            vec![Effect::Dispose]
        } else {
            Vec::new()
        }
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    pub fn handle_intent(&mut self, player_id: PlayerId, intent: Intent) -> Vec<Effect> {
        if !self.replica.state().contains(player_id) {
            self.ignore(player_id, "intent from non-member");
            return Vec::new();
        }
        match intent {
            Intent::MakeChoice(choice) => self.submit_choice(player_id, choice),
            Intent::Ready => self.set_ready(player_id),
            Intent::Rename(name) => self.update_name(player_id, name),
            Intent::NextRound => self.request_advance(player_id),
            Intent::Restart => self.request_restart(player_id),
        }
    }

    /// Records a throw. The second throw of a round cancels the
    /// selection timer and moves straight to `revealing`.
    pub fn submit_choice(&mut self, player_id: PlayerId, choice: Choice) -> Vec<Effect> {
        let state = self.replica.state();
        if state.phase != Phase::Playing {
            self.ignore(player_id, "choice outside playing");
            return Vec::new();
        }
        if !state.player(player_id).is_some_and(|p| p.choice.is_none()) {
            self.ignore(player_id, "second choice in one round");
            return Vec::new();
        }

        let state = self.replica.state_mut();
        if let Some(player) = state.player_mut(player_id) {
            player.choice = Some(choice);
            player.animation = choice.into();
        }

        let all_chose = state.players.len() == MatchState::CAPACITY
            && state.players.iter().all(|p| p.choice.is_some());
        if !all_chose {
            return Vec::new();
        }

        enter(state, Phase::Revealing);
        vec![
            Effect::CancelTimers,
            Effect::Defer(Deferred::Resolve, self.timing.reveal_delay),
        ]
    }

    /// Marks a player ready in any phase. Only a full, all-ready roster in
    /// `waiting` starts the countdown.
    pub fn set_ready(&mut self, player_id: PlayerId) -> Vec<Effect> {
        let already = self
            .replica
            .state()
            .player(player_id)
            .is_some_and(|p| p.is_ready);
        if !already {
            if let Some(player) = self.replica.state_mut().player_mut(player_id) {
                player.is_ready = true;
            }
        }

        let state = self.replica.state();
        let can_start = state.phase == Phase::Waiting
            && state.players.len() == MatchState::CAPACITY
            && state.players.iter().all(|p| p.is_ready);
        if can_start {
            self.start_countdown()
        } else {
            Vec::new()
        }
    }

    pub fn update_name(&mut self, player_id: PlayerId, name: String) -> Vec<Effect> {
        let Some(name) = clean_name(Some(name)) else {
            self.ignore(player_id, "blank name");
            return Vec::new();
        };
        let unchanged = self
            .replica
            .state()
            .player(player_id)
            .is_none_or(|p| p.name == name);
        if !unchanged {
            if let Some(player) = self.replica.state_mut().player_mut(player_id) {
                player.name = name;
            }
        }
        Vec::new()
    }

    /// Host only, from `result`: next round's countdown.
    pub fn request_advance(&mut self, player_id: PlayerId) -> Vec<Effect> {
        let state = self.replica.state();
        if !state.is_host(player_id) || state.phase != Phase::Result {
            self.ignore(player_id, "next-round rejected");
            return Vec::new();
        }
        if state.current_round >= state.max_rounds {
            return Vec::new();
        }
        self.replica.state_mut().current_round += 1;
        self.start_countdown()
    }

    /// Host only, from `finished` with both seats filled: back to
    /// `waiting` with every score, flag and record cleared.
    pub fn request_restart(&mut self, player_id: PlayerId) -> Vec<Effect> {
        let state = self.replica.state();
        if !state.is_host(player_id)
            || state.phase != Phase::Finished
            || state.players.len() != MatchState::CAPACITY
        {
            self.ignore(player_id, "restart rejected");
            return Vec::new();
        }

        let state = self.replica.state_mut();
        for player in &mut state.players {
            player.reset();
        }
        enter(state, Phase::Waiting);
        state.current_round = 1;
        state.countdown = 0;
        state.time_remaining_ms = 0;
        state.game_started = false;
        state.history.clear();
        state.round_winner = None;
        state.match_winner = None;
        state.end_reason = None;

        tracing::info!(match_id = %state.match_id, "match restarted");
        vec![Effect::CancelTimers]
    }

    // -----------------------------------------------------------------------
    // Timer callbacks
    // -----------------------------------------------------------------------

    /// One countdown period elapsed. At zero the round starts.
    pub fn countdown_tick(&mut self) -> Vec<Effect> {
        if self.replica.state().phase != Phase::Countdown {
            self.stale("countdown");
            return Vec::new();
        }
        let state = self.replica.state_mut();
        state.countdown = state.countdown.saturating_sub(1);
        if state.countdown > 0 {
            return Vec::new();
        }
        self.start_playing()
    }

    /// `elapsed` of the selection budget was used up. At zero the round
    /// times out.
    pub fn selection_tick(&mut self, elapsed: Duration) -> Vec<Effect> {
        if self.replica.state().phase != Phase::Playing {
            self.stale("selection");
            return Vec::new();
        }
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let state = self.replica.state_mut();
        state.time_remaining_ms = state.time_remaining_ms.saturating_sub(elapsed_ms);
        if state.time_remaining_ms > 0 {
            return Vec::new();
        }
        self.enter_timeout()
    }

    pub fn deferred(&mut self, kind: Deferred) -> Vec<Effect> {
        match (kind, self.replica.state().phase) {
            (Deferred::Reveal, Phase::Timeout) => {
                enter(self.replica.state_mut(), Phase::Revealing);
                vec![Effect::Defer(Deferred::Resolve, self.timing.reveal_delay)]
            }
            (Deferred::Resolve, Phase::Revealing) => self.resolve_round(),
            _ => {
                self.stale("deferred");
                Vec::new()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn start_countdown(&mut self) -> Vec<Effect> {
        let from = self.timing.countdown_from;
        let state = self.replica.state_mut();
        for player in &mut state.players {
            player.clear_choice();
        }
        enter(state, Phase::Countdown);
        state.countdown = from;
        state.time_remaining_ms = 0;
        state.round_winner = None;
        state.game_started = true;

        tracing::debug!(
            match_id = %state.match_id,
            round = state.current_round,
            "countdown started"
        );
        vec![Effect::StartCountdown(self.timing.countdown_period)]
    }

    fn start_playing(&mut self) -> Vec<Effect> {
        let state = self.replica.state_mut();
        enter(state, Phase::Playing);
        state.time_remaining_ms = u64::from(state.wait_time) * 1000;
        vec![Effect::StartSelection(self.timing.selection_period)]
    }

    /// Players who never chose throw rock.
    fn enter_timeout(&mut self) -> Vec<Effect> {
        let state = self.replica.state_mut();
        enter(state, Phase::Timeout);
        for player in state.players.iter_mut().filter(|p| p.choice.is_none()) {
            player.choice = Some(Choice::Rock);
            player.animation = Choice::Rock.into();
        }
        vec![Effect::Defer(Deferred::Reveal, self.timing.timeout_delay)]
    }

    fn resolve_round(&mut self) -> Vec<Effect> {
        let Some((first, second)) = thrown_pair(self.replica.state()) else {
            self.stale("resolve without two throws");
            return Vec::new();
        };

        let winner = match resolve(first.1, second.1) {
            Outcome::FirstWins => Winner::Player(first.0),
            Outcome::SecondWins => Winner::Player(second.0),
            Outcome::Draw => Winner::Draw,
        };

        let state = self.replica.state_mut();
        if let Winner::Player(id) = winner {
            if let Some(player) = state.player_mut(id) {
                player.score += 1;
            }
        }
        state.history.push(RoundResult {
            round: state.current_round,
            winner: Some(winner),
            players: [first.0, second.0],
            choices: [first.1, second.1],
        });
        state.round_winner = Some(winner);

        if state.current_round < state.max_rounds {
            enter(state, Phase::Result);
            return Vec::new();
        }

        let score = |id| state.player(id).map_or(0, |p| p.score);
        let match_winner = match score(first.0).cmp(&score(second.0)) {
            std::cmp::Ordering::Greater => Winner::Player(first.0),
            std::cmp::Ordering::Less => Winner::Player(second.0),
            std::cmp::Ordering::Equal => Winner::Draw,
        };
        state.match_winner = Some(match_winner);
        enter(state, Phase::Finished);
        state.end_reason = Some(EndReason::Completed);

        tracing::info!(
            match_id = %state.match_id,
            winner = %state.winner_label(match_winner),
            "match finished"
        );
        Vec::new()
    }

    fn ignore(&self, player_id: PlayerId, reason: &'static str) {
        tracing::debug!(
            match_id = %self.match_id(),
            %player_id,
            phase = %self.replica.state().phase,
            reason,
            "intent ignored"
        );
    }

    fn stale(&self, timer: &'static str) {
        tracing::debug!(
            match_id = %self.match_id(),
            phase = %self.replica.state().phase,
            timer,
            "timer fired out of phase, ignoring"
        );
    }
}

/// The only place the phase is written. Every move must be an edge of
/// the state machine.
fn enter(state: &mut MatchState, to: Phase) {
    let from = state.phase;
    debug_assert!(
        from.can_transition_to(to),
        "illegal phase transition {from} -> {to}"
    );
    state.phase = to;
    tracing::trace!(match_id = %state.match_id, %from, %to, "phase changed");
}

/// First and second roster entries with their throws, if both threw.
fn thrown_pair(state: &MatchState) -> Option<((PlayerId, Choice), (PlayerId, Choice))> {
    match state.players.as_slice() {
        [a, b] => Some(((a.id, a.choice?), (b.id, b.choice?))),
        _ => None,
    }
}

/// A round cut short after both throws were locked in is still recorded,
/// with no winner.
fn record_aborted_round(state: &mut MatchState) {
    if !matches!(state.phase, Phase::Timeout | Phase::Revealing) {
        return;
    }
    if let Some((first, second)) = thrown_pair(state) {
        state.history.push(RoundResult {
            round: state.current_round,
            winner: None,
            players: [first.0, second.0],
            choices: [first.1, second.1],
        });
    }
}

fn clean_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const A: PlayerId = PlayerId(1);
    const B: PlayerId = PlayerId(2);

    fn public_referee(rounds: u8) -> Referee {
        Referee::new(
            MatchId(1),
            None,
            MatchSettings {
                is_private: false,
                max_rounds: rounds,
                wait_time: 3,
            },
            MatchTiming::default(),
        )
    }

    fn private_referee() -> Referee {
        Referee::new(
            MatchId(2),
            Some(AccessCode::parse("ABC234")),
            MatchSettings::default(),
            MatchTiming::default(),
        )
    }

    /// Both seated and ready, countdown running.
    fn started(rounds: u8) -> Referee {
        let mut referee = public_referee(rounds);
        referee.join(A, None, None).unwrap();
        referee.join(B, None, None).unwrap();
        referee.set_ready(B);
        referee
    }

    /// Countdown run down to `playing`.
    fn playing(rounds: u8) -> Referee {
        let mut referee = started(rounds);
        for _ in 0..3 {
            referee.countdown_tick();
        }
        assert_eq!(referee.state().phase, Phase::Playing);
        referee
    }

    fn play_round(referee: &mut Referee, a: Choice, b: Choice) {
        referee.submit_choice(A, a);
        referee.submit_choice(B, b);
        referee.deferred(Deferred::Resolve);
    }

    // -- join ---------------------------------------------------------------

    #[test]
    fn test_join_first_player_is_host_and_ready() {
        let mut referee = public_referee(3);
        let effects = referee.join(A, None, None).unwrap();

        assert!(effects.is_empty());
        let state = referee.state();
        assert_eq!(state.host_id, Some(A));
        assert!(state.players[0].is_ready);
        assert_eq!(state.players[0].name, "Player 1");
    }

    #[test]
    fn test_join_second_player_not_ready_and_named() {
        let mut referee = public_referee(3);
        referee.join(A, None, None).unwrap();
        referee.join(B, None, Some("  bob ".into())).unwrap();

        let state = referee.state();
        assert!(!state.players[1].is_ready);
        assert_eq!(state.players[1].name, "bob");
        assert_eq!(state.phase, Phase::Waiting);
    }

    #[test]
    fn test_join_full_match_rejected() {
        let mut referee = started(3);
        let err = referee.join(PlayerId(3), None, None).unwrap_err();
        assert!(matches!(err, MatchError::Full(_)));
    }

    #[test]
    fn test_join_twice_rejected() {
        let mut referee = public_referee(3);
        referee.join(A, None, None).unwrap();
        let err = referee.join(A, None, None).unwrap_err();
        assert!(matches!(err, MatchError::AlreadyJoined(..)));
    }

    #[test]
    fn test_join_private_first_joiner_not_challenged() {
        let mut referee = private_referee();
        referee.join(A, Some("WRONG1"), None).unwrap();
        assert_eq!(referee.state().players.len(), 1);
    }

    #[test]
    fn test_join_private_wrong_code_rejected() {
        let mut referee = private_referee();
        referee.join(A, None, None).unwrap();

        let err = referee.join(B, Some("ZZZ999"), None).unwrap_err();
        assert!(matches!(err, MatchError::AccessCodeMismatch(_)));
        let err = referee.join(B, None, None).unwrap_err();
        assert!(matches!(err, MatchError::AccessCodeMismatch(_)));
        assert_eq!(referee.state().players.len(), 1);
    }

    #[test]
    fn test_join_private_code_case_insensitive() {
        let mut referee = private_referee();
        referee.join(A, None, None).unwrap();
        referee.join(B, Some("abc234"), None).unwrap();
        assert_eq!(referee.state().players.len(), 2);
    }

    // -- ready / countdown ----------------------------------------------------

    #[test]
    fn test_set_ready_starts_countdown_when_both_ready() {
        let mut referee = public_referee(3);
        referee.join(A, None, None).unwrap();
        referee.join(B, None, None).unwrap();

        let effects = referee.set_ready(B);

        assert_eq!(
            effects,
            vec![Effect::StartCountdown(Duration::from_secs(1))]
        );
        let state = referee.state();
        assert_eq!(state.phase, Phase::Countdown);
        assert_eq!(state.countdown, 3);
        assert!(state.game_started);
    }

    #[test]
    fn test_set_ready_alone_does_not_start() {
        let mut referee = public_referee(3);
        referee.join(A, None, None).unwrap();
        assert!(referee.set_ready(A).is_empty());
        assert_eq!(referee.state().phase, Phase::Waiting);
    }

    #[test]
    fn test_set_ready_outside_waiting_only_marks_flag() {
        let mut referee = playing(3);
        assert!(referee.set_ready(A).is_empty());
        assert_eq!(referee.state().phase, Phase::Playing);
    }

    #[test]
    fn test_countdown_reaches_zero_starts_playing() {
        let mut referee = started(3);
        assert!(referee.countdown_tick().is_empty());
        assert!(referee.countdown_tick().is_empty());
        let effects = referee.countdown_tick();

        assert_eq!(
            effects,
            vec![Effect::StartSelection(Duration::from_millis(17))]
        );
        let state = referee.state();
        assert_eq!(state.phase, Phase::Playing);
        assert_eq!(state.countdown, 0);
        assert_eq!(state.time_remaining_ms, 3000);
    }

    // -- choices --------------------------------------------------------------

    #[test]
    fn test_choice_outside_playing_ignored() {
        let mut referee = started(3);
        referee.submit_choice(A, Choice::Paper);
        assert_eq!(referee.state().players[0].choice, None);
    }

    #[test]
    fn test_choice_only_once_per_round() {
        let mut referee = playing(3);
        referee.submit_choice(A, Choice::Paper);
        referee.submit_choice(A, Choice::Scissors);

        let player = &referee.state().players[0];
        assert_eq!(player.choice, Some(Choice::Paper));
        assert_eq!(player.animation, duel_protocol::Animation::Paper);
    }

    #[test]
    fn test_both_chose_goes_to_revealing() {
        let mut referee = playing(3);
        assert!(referee.submit_choice(A, Choice::Rock).is_empty());
        let effects = referee.submit_choice(B, Choice::Paper);

        assert_eq!(
            effects,
            vec![
                Effect::CancelTimers,
                Effect::Defer(Deferred::Resolve, Duration::from_secs(2)),
            ]
        );
        assert_eq!(referee.state().phase, Phase::Revealing);
    }

    #[test]
    fn test_selection_expiry_after_both_chose_is_noop() {
        let mut referee = playing(3);
        referee.submit_choice(A, Choice::Rock);
        referee.submit_choice(B, Choice::Paper);

        assert!(referee.selection_tick(Duration::from_secs(10)).is_empty());
        assert_eq!(referee.state().phase, Phase::Revealing);
    }

    #[test]
    fn test_selection_timeout_assigns_rock() {
        let mut referee = playing(3);
        referee.submit_choice(B, Choice::Scissors);

        assert!(referee.selection_tick(Duration::from_millis(2990)).is_empty());
        let effects = referee.selection_tick(Duration::from_millis(17));

        assert_eq!(
            effects,
            vec![Effect::Defer(Deferred::Reveal, Duration::from_secs(2))]
        );
        let state = referee.state();
        assert_eq!(state.phase, Phase::Timeout);
        assert_eq!(state.time_remaining_ms, 0);
        assert_eq!(state.players[0].choice, Some(Choice::Rock));
        assert_eq!(state.players[1].choice, Some(Choice::Scissors));
    }

    #[test]
    fn test_choice_during_timeout_ignored() {
        let mut referee = playing(3);
        referee.selection_tick(Duration::from_secs(3));
        referee.submit_choice(A, Choice::Paper);
        assert_eq!(referee.state().players[0].choice, Some(Choice::Rock));
    }

    #[test]
    fn test_timeout_then_reveal_then_resolve() {
        let mut referee = playing(3);
        referee.selection_tick(Duration::from_secs(3));

        let effects = referee.deferred(Deferred::Reveal);
        assert_eq!(
            effects,
            vec![Effect::Defer(Deferred::Resolve, Duration::from_secs(2))]
        );
        assert_eq!(referee.state().phase, Phase::Revealing);

        referee.deferred(Deferred::Resolve);
        let state = referee.state();
        assert_eq!(state.phase, Phase::Result);
        assert_eq!(state.round_winner, Some(Winner::Draw));
    }

    #[test]
    fn test_stale_deferred_is_noop() {
        let mut referee = playing(3);
        assert!(referee.deferred(Deferred::Resolve).is_empty());
        assert!(referee.deferred(Deferred::Reveal).is_empty());
        assert_eq!(referee.state().phase, Phase::Playing);
    }

    // -- resolution -----------------------------------------------------------

    #[test]
    fn test_resolve_scores_winner_and_records_history() {
        let mut referee = playing(3);
        play_round(&mut referee, Choice::Rock, Choice::Scissors);

        let state = referee.state();
        assert_eq!(state.phase, Phase::Result);
        assert_eq!(state.players[0].score, 1);
        assert_eq!(state.players[1].score, 0);
        assert_eq!(state.round_winner, Some(Winner::Player(A)));
        assert_eq!(
            state.history,
            vec![RoundResult {
                round: 1,
                winner: Some(Winner::Player(A)),
                players: [A, B],
                choices: [Choice::Rock, Choice::Scissors],
            }]
        );
    }

    #[test]
    fn test_full_match_scores_sum_to_decisive_rounds() {
        let mut referee = playing(5);
        let rounds = [
            (Choice::Rock, Choice::Scissors),
            (Choice::Paper, Choice::Paper),
            (Choice::Scissors, Choice::Rock),
            (Choice::Paper, Choice::Rock),
            (Choice::Rock, Choice::Rock),
        ];
        for (i, (a, b)) in rounds.into_iter().enumerate() {
            if i > 0 {
                referee.request_advance(A);
                for _ in 0..3 {
                    referee.countdown_tick();
                }
            }
            play_round(&mut referee, a, b);
        }

        let state = referee.state();
        assert_eq!(state.history.len(), 5);
        let decisive = state
            .history
            .iter()
            .filter(|r| matches!(r.winner, Some(Winner::Player(_))))
            .count() as u32;
        assert_eq!(state.players[0].score + state.players[1].score, decisive);
        assert_eq!(state.players[0].score, 2);
        assert_eq!(state.players[1].score, 1);
        assert_eq!(state.match_winner, Some(Winner::Player(A)));
        assert_eq!(state.phase, Phase::Finished);
        assert_eq!(state.end_reason, Some(EndReason::Completed));
    }

    #[test]
    fn test_no_finish_before_last_round() {
        let mut referee = playing(3);
        play_round(&mut referee, Choice::Rock, Choice::Scissors);
        referee.request_advance(A);
        for _ in 0..3 {
            referee.countdown_tick();
        }
        play_round(&mut referee, Choice::Rock, Choice::Scissors);

        let state = referee.state();
        assert_eq!(state.players[0].score, 2);
        assert_eq!(state.phase, Phase::Result);
        assert_eq!(state.match_winner, None);
    }

    #[test]
    fn test_match_winner_draw_on_equal_scores() {
        let mut referee = playing(3);
        let rounds = [
            (Choice::Rock, Choice::Scissors),
            (Choice::Rock, Choice::Paper),
            (Choice::Paper, Choice::Paper),
        ];
        for (i, (a, b)) in rounds.into_iter().enumerate() {
            if i > 0 {
                referee.request_advance(A);
                for _ in 0..3 {
                    referee.countdown_tick();
                }
            }
            play_round(&mut referee, a, b);
        }
        assert_eq!(referee.state().match_winner, Some(Winner::Draw));
    }

    // -- host gates -------------------------------------------------------------

    #[test]
    fn test_advance_requires_host() {
        let mut referee = playing(3);
        play_round(&mut referee, Choice::Rock, Choice::Paper);

        assert!(referee.request_advance(B).is_empty());
        assert_eq!(referee.state().phase, Phase::Result);

        let effects = referee.request_advance(A);
        assert_eq!(effects, vec![Effect::StartCountdown(Duration::from_secs(1))]);
        let state = referee.state();
        assert_eq!(state.current_round, 2);
        assert!(state.players.iter().all(|p| p.choice.is_none()));
    }

    #[test]
    fn test_restart_resets_everything() {
        let mut referee = playing(3);
        for i in 0..3 {
            if i > 0 {
                referee.request_advance(A);
                for _ in 0..3 {
                    referee.countdown_tick();
                }
            }
            play_round(&mut referee, Choice::Paper, Choice::Rock);
        }
        assert_eq!(referee.state().phase, Phase::Finished);

        assert!(referee.request_restart(B).is_empty());
        assert_eq!(referee.request_restart(A), vec![Effect::CancelTimers]);

        let state = referee.state();
        assert_eq!(state.phase, Phase::Waiting);
        assert_eq!(state.current_round, 1);
        assert!(state.history.is_empty());
        assert_eq!(state.match_winner, None);
        assert_eq!(state.end_reason, None);
        assert!(!state.game_started);
        assert!(state.players.iter().all(|p| p.score == 0 && !p.is_ready));
    }

    // -- leave -----------------------------------------------------------------

    #[test]
    fn test_leave_mid_playing_ends_match() {
        let mut referee = playing(3);
        referee.submit_choice(A, Choice::Rock);

        let effects = referee.leave(B).unwrap();

        assert_eq!(effects, vec![Effect::CancelTimers]);
        let state = referee.state();
        assert_eq!(state.phase, Phase::Finished);
        assert_eq!(state.end_reason, Some(EndReason::OpponentLeft));
        assert_eq!(state.players.len(), 1);
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_leave_during_reveal_records_aborted_round() {
        let mut referee = playing(3);
        referee.submit_choice(A, Choice::Rock);
        referee.submit_choice(B, Choice::Paper);

        referee.leave(A).unwrap();

        let state = referee.state();
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].winner, None);
        assert_eq!(state.players[0].score, 0);
    }

    #[test]
    fn test_leave_then_restart_rejected_with_one_player() {
        let mut referee = playing(3);
        referee.leave(B).unwrap();
        assert!(referee.request_restart(A).is_empty());
        assert_eq!(referee.state().phase, Phase::Finished);
    }

    #[test]
    fn test_leave_then_new_joiner_enables_host_restart() {
        const C: PlayerId = PlayerId(3);
        let mut referee = playing(3);
        play_round(&mut referee, Choice::Paper, Choice::Rock);
        referee.leave(B).unwrap();
        assert_eq!(referee.state().end_reason, Some(EndReason::OpponentLeft));

        referee.join(C, None, Some("cleo".into())).unwrap();
        assert_eq!(referee.state().phase, Phase::Finished);

        assert!(referee.request_restart(C).is_empty());
        assert_eq!(referee.state().phase, Phase::Finished);
        assert_eq!(referee.state().history.len(), 1);

        assert_eq!(referee.request_restart(A), vec![Effect::CancelTimers]);
        let state = referee.state();
        assert_eq!(state.phase, Phase::Waiting);
        assert_eq!(state.host_id, Some(A));
        assert_eq!(state.current_round, 1);
        assert!(state.history.is_empty());
        assert_eq!(state.round_winner, None);
        assert_eq!(state.end_reason, None);
        assert!(!state.game_started);
        assert!(state.players.iter().all(|p| p.score == 0 && !p.is_ready));
        assert!(state.players.iter().all(|p| p.choice.is_none()));
    }

    #[test]
    fn test_leave_host_reassigns_to_remaining() {
        let mut referee = public_referee(3);
        referee.join(A, None, None).unwrap();
        referee.join(B, None, None).unwrap();

        referee.leave(A).unwrap();

        assert_eq!(referee.state().host_id, Some(B));
        assert_eq!(referee.state().phase, Phase::Waiting);
    }

    #[test]
    fn test_leave_unknown_player_errors() {
        let mut referee = public_referee(3);
        let err = referee.leave(A).unwrap_err();
        assert!(matches!(err, MatchError::NotInMatch(..)));
    }

    #[test]
    fn test_last_leave_public_disposes() {
        let mut referee = public_referee(3);
        referee.join(A, None, None).unwrap();
        assert_eq!(referee.leave(A).unwrap(), vec![Effect::Dispose]);
        assert_eq!(referee.state().host_id, None);
    }

    #[test]
    fn test_last_leave_private_starts_grace() {
        let mut referee = private_referee();
        referee.join(A, None, None).unwrap();

        let effects = referee.leave(A).unwrap();
        assert_eq!(effects, vec![Effect::StartGrace(Duration::from_secs(600))]);
        assert_eq!(referee.grace_elapsed(), vec![Effect::Dispose]);
    }

    #[test]
    fn test_rejoin_during_grace_cancels_it() {
        let mut referee = private_referee();
        referee.join(A, None, None).unwrap();
        referee.leave(A).unwrap();

        let effects = referee.join(B, None, None).unwrap();
        assert_eq!(effects, vec![Effect::CancelGrace]);
        assert!(referee.grace_elapsed().is_empty());
    }

    // -- intents ---------------------------------------------------------------

    #[test]
    fn test_intent_from_non_member_ignored() {
        let mut referee = playing(3);
        let effects = referee.handle_intent(PlayerId(9), Intent::MakeChoice(Choice::Rock));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_rename_updates_name() {
        let mut referee = public_referee(3);
        referee.join(A, None, None).unwrap();
        referee.handle_intent(A, Intent::Rename("ada".into()));
        assert_eq!(referee.state().players[0].name, "ada");

        referee.handle_intent(A, Intent::Rename("   ".into()));
        assert_eq!(referee.state().players[0].name, "ada");
    }

    #[test]
    fn test_intent_from_message_filters_seat_changes() {
        assert_eq!(Intent::from_message(MatchMessage::Leave), None);
        assert_eq!(
            Intent::from_message(MatchMessage::PlayerReady),
            Some(Intent::Ready)
        );
    }

    // -- phase guard -------------------------------------------------------------

    #[test]
    fn test_enter_follows_state_machine_edges() {
        let mut state = MatchState::new(MatchId(1), None, 3, 3);
        for to in [
            Phase::Countdown,
            Phase::Playing,
            Phase::Timeout,
            Phase::Revealing,
            Phase::Result,
            Phase::Countdown,
            Phase::Playing,
            Phase::Finished,
            Phase::Waiting,
        ] {
            enter(&mut state, to);
            assert_eq!(state.phase, to);
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "illegal phase transition")]
    fn test_enter_rejects_skipped_phase() {
        let mut state = MatchState::new(MatchId(1), None, 3, 3);
        enter(&mut state, Phase::Playing);
    }
}
