//! Versioned, change-tracked match state.

use duel_protocol::MatchState;

/// Holds the authoritative state plus a version that bumps once per
/// published change.
///
/// Writers go through [`Replica::state_mut`], which marks the state
/// dirty. [`Replica::take_snapshot`] then yields at most one snapshot per
/// batch of edits, however many fields changed.
#[derive(Debug)]
pub struct Replica {
    state: MatchState,
    version: u64,
    dirty: bool,
}

impl Replica {
    /// Starts dirty so the first sync publishes the initial state.
    pub fn new(state: MatchState) -> Self {
        Self {
            state,
            version: 0,
            dirty: true,
        }
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MatchState {
        self.dirty = true;
        &mut self.state
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clones the state under a new version if anything changed since
    /// the last call.
    pub fn take_snapshot(&mut self) -> Option<(u64, MatchState)> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        self.version += 1;
        Some((self.version, self.state.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_protocol::MatchId;

    #[test]
    fn test_take_snapshot_only_after_changes() {
        let mut replica = Replica::new(MatchState::new(MatchId(1), None, 3, 3));

        let (v1, _) = replica.take_snapshot().unwrap();
        assert_eq!(v1, 1);
        assert!(replica.take_snapshot().is_none());

        replica.state_mut().countdown = 3;
        replica.state_mut().countdown = 2;
        let (v2, state) = replica.take_snapshot().unwrap();
        assert_eq!(v2, 2);
        assert_eq!(state.countdown, 2);
        assert!(replica.take_snapshot().is_none());
    }

    #[test]
    fn test_read_access_does_not_mark_dirty() {
        let mut replica = Replica::new(MatchState::new(MatchId(1), None, 3, 3));
        replica.take_snapshot();
        let _ = replica.state().phase;
        assert!(!replica.is_dirty());
    }
}
