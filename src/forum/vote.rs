//! Vote ledger: one member's vote per content item and the resulting tally.
//!
//! Transitions follow the vote buttons: clicking the active direction clears
//! the vote, clicking the other direction flips it. The tally only ever
//! moves by the delta of an applied transition.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Requested vote direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

/// A member's current vote on one content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteState {
    #[default]
    None,
    Up,
    Down,
}

impl VoteState {
    /// Contribution of this state to the tally.
    pub fn weight(self) -> i64 {
        match self {
            VoteState::None => 0,
            VoteState::Up => 1,
            VoteState::Down => -1,
        }
    }

    /// Next state and score delta for a click on `input`.
    pub fn transition(self, input: VoteType) -> (VoteState, i64) {
        let next = match (self, input) {
            (VoteState::Up, VoteType::Up) | (VoteState::Down, VoteType::Down) => VoteState::None,
            (_, VoteType::Up) => VoteState::Up,
            (_, VoteType::Down) => VoteState::Down,
        };
        (next, next.weight() - self.weight())
    }
}

/// Result of a vote operation as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub content_id: String,
    pub score: i64,
    pub user_vote: VoteState,
}

/// Applied request ids remembered per (member, content).
pub const RECEIPTS_PER_VOTE: usize = 32;

type VoteKey = (String, String);

fn key(user_id: &str, content_id: &str) -> VoteKey {
    (user_id.to_string(), content_id.to_string())
}

/// Per-member votes and per-content tallies.
#[derive(Debug, Clone, Default)]
pub struct VoteLedger {
    tallies: HashMap<String, i64>,
    votes: HashMap<VoteKey, VoteState>,
    receipts: HashMap<VoteKey, VecDeque<Uuid>>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the baseline tally from an authoritative snapshot.
    pub fn seed(&mut self, content_id: &str, score: i64) {
        self.tallies.insert(content_id.to_string(), score);
    }

    /// Records a member's vote from a snapshot without moving the tally.
    pub fn seed_vote(&mut self, user_id: &str, content_id: &str, state: VoteState) {
        if state == VoteState::None {
            self.votes.remove(&key(user_id, content_id));
        } else {
            self.votes.insert(key(user_id, content_id), state);
        }
    }

    pub fn score(&self, content_id: &str) -> i64 {
        self.tallies.get(content_id).copied().unwrap_or(0)
    }

    pub fn vote_of(&self, user_id: &str, content_id: &str) -> VoteState {
        self.votes
            .get(&key(user_id, content_id))
            .copied()
            .unwrap_or_default()
    }

    /// Applies one click.
    pub fn cast(&mut self, user_id: &str, content_id: &str, input: VoteType) -> VoteOutcome {
        let (next, delta) = self.vote_of(user_id, content_id).transition(input);
        self.apply(user_id, content_id, next, delta)
    }

    /// Moves the member's vote to `target`. Setting the current state is a no-op.
    pub fn set(&mut self, user_id: &str, content_id: &str, target: VoteState) -> VoteOutcome {
        let delta = target.weight() - self.vote_of(user_id, content_id).weight();
        self.apply(user_id, content_id, target, delta)
    }

    /// Like [`cast`](Self::cast), but a `request_id` that was already applied
    /// returns the current vote and tally instead of toggling again.
    pub fn cast_once(
        &mut self,
        user_id: &str,
        content_id: &str,
        input: VoteType,
        request_id: Uuid,
    ) -> VoteOutcome {
        if let Some(outcome) = self.replayed(user_id, content_id, request_id) {
            return outcome;
        }
        let outcome = self.cast(user_id, content_id, input);
        self.remember(user_id, content_id, request_id);
        outcome
    }

    /// Like [`set`](Self::set), with the same receipt handling as [`cast_once`](Self::cast_once).
    pub fn set_once(
        &mut self,
        user_id: &str,
        content_id: &str,
        target: VoteState,
        request_id: Uuid,
    ) -> VoteOutcome {
        if let Some(outcome) = self.replayed(user_id, content_id, request_id) {
            return outcome;
        }
        let outcome = self.set(user_id, content_id, target);
        self.remember(user_id, content_id, request_id);
        outcome
    }

    fn replayed(&self, user_id: &str, content_id: &str, request_id: Uuid) -> Option<VoteOutcome> {
        let applied = self.receipts.get(&key(user_id, content_id))?;
        if !applied.contains(&request_id) {
            return None;
        }
        // Later transitions, with or without an id, define what the retry sees.
        Some(VoteOutcome {
            content_id: content_id.to_string(),
            score: self.score(content_id),
            user_vote: self.vote_of(user_id, content_id),
        })
    }

    fn remember(&mut self, user_id: &str, content_id: &str, request_id: Uuid) {
        let applied = self.receipts.entry(key(user_id, content_id)).or_default();
        if applied.len() == RECEIPTS_PER_VOTE {
            applied.pop_front();
        }
        applied.push_back(request_id);
    }

    fn apply(&mut self, user_id: &str, content_id: &str, next: VoteState, delta: i64) -> VoteOutcome {
        let tally = self.tallies.entry(content_id.to_string()).or_insert(0);
        *tally += delta;
        let score = *tally;
        self.seed_vote(user_id, content_id, next);
        tracing::debug!(user_id, content_id, ?next, delta, score, "vote applied");
        VoteOutcome {
            content_id: content_id.to_string(),
            score,
            user_vote: next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_transition_table() {
        use VoteState as S;
        use VoteType as T;
        let table = [
            (S::None, T::Up, S::Up, 1),
            (S::None, T::Down, S::Down, -1),
            (S::Up, T::Up, S::None, -1),
            (S::Up, T::Down, S::Down, -2),
            (S::Down, T::Down, S::None, 1),
            (S::Down, T::Up, S::Up, 2),
        ];
        for (current, input, next, delta) in table {
            assert_eq!(current.transition(input), (next, delta), "{:?} + {:?}", current, input);
        }
    }

    #[test]
    fn test_upvote_switch_then_clear() {
        let mut ledger = VoteLedger::new();

        let outcome = ledger.cast("u1", "topic", VoteType::Up);
        assert_eq!((outcome.score, outcome.user_vote), (1, VoteState::Up));

        let outcome = ledger.cast("u1", "topic", VoteType::Down);
        assert_eq!((outcome.score, outcome.user_vote), (-1, VoteState::Down));

        let outcome = ledger.cast("u1", "topic", VoteType::Down);
        assert_eq!((outcome.score, outcome.user_vote), (0, VoteState::None));
    }

    #[test]
    fn test_members_accumulate_independently() {
        let mut ledger = VoteLedger::new();
        ledger.cast("u1", "c", VoteType::Up);
        ledger.cast("u2", "c", VoteType::Up);
        ledger.cast("u3", "c", VoteType::Down);
        assert_eq!(ledger.score("c"), 1);

        ledger.cast("u1", "c", VoteType::Up);
        assert_eq!(ledger.score("c"), 0);
        assert_eq!(ledger.vote_of("u2", "c"), VoteState::Up);
        assert_eq!(ledger.vote_of("u1", "c"), VoteState::None);
    }

    #[test]
    fn test_cast_once_ignores_retry() {
        let mut ledger = VoteLedger::new();
        let request = Uuid::new_v4();

        let first = ledger.cast_once("u1", "c", VoteType::Up, request);
        let retry = ledger.cast_once("u1", "c", VoteType::Up, request);

        assert_eq!(first, retry);
        assert_eq!(ledger.score("c"), 1);
        assert_eq!(ledger.vote_of("u1", "c"), VoteState::Up);

        let fresh = ledger.cast_once("u1", "c", VoteType::Up, Uuid::new_v4());
        assert_eq!((fresh.score, fresh.user_vote), (0, VoteState::None));
    }

    #[test]
    fn test_set_is_idempotent_and_inverts() {
        let mut ledger = VoteLedger::new();
        ledger.seed("c", 41);

        ledger.set("u1", "c", VoteState::Up);
        ledger.set("u1", "c", VoteState::Up);
        assert_eq!(ledger.score("c"), 42);

        ledger.set("u1", "c", VoteState::Down);
        assert_eq!(ledger.score("c"), 40);

        ledger.set("u1", "c", VoteState::None);
        assert_eq!(ledger.score("c"), 41);
    }

    #[test]
    fn test_seed_vote_keeps_tally() {
        let mut ledger = VoteLedger::new();
        ledger.seed("c", 18);
        ledger.seed_vote("u1", "c", VoteState::Up);
        assert_eq!(ledger.score("c"), 18);

        // Clicking up again removes the recorded vote.
        let outcome = ledger.cast("u1", "c", VoteType::Up);
        assert_eq!((outcome.score, outcome.user_vote), (17, VoteState::None));
    }

    #[test]
    fn test_late_retry_after_newer_request() {
        let mut ledger = VoteLedger::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        ledger.cast_once("u1", "c", VoteType::Up, a);
        ledger.cast_once("u1", "c", VoteType::Down, b);
        let late = ledger.cast_once("u1", "c", VoteType::Up, a);

        assert_eq!((late.score, late.user_vote), (-1, VoteState::Down));
        assert_eq!(ledger.score("c"), -1);
        assert_eq!(ledger.vote_of("u1", "c"), VoteState::Down);
    }

    #[test]
    fn test_retry_reports_current_vote() {
        let mut ledger = VoteLedger::new();
        let request = Uuid::new_v4();

        ledger.cast_once("u1", "c", VoteType::Up, request);
        ledger.cast("u1", "c", VoteType::Up);
        let retry = ledger.set_once("u1", "c", VoteState::Up, request);

        assert_eq!((retry.score, retry.user_vote), (0, VoteState::None));
    }

    #[test]
    fn test_oldest_receipts_are_dropped() {
        let mut ledger = VoteLedger::new();
        let first = Uuid::new_v4();
        ledger.set_once("u1", "c", VoteState::Up, first);
        for _ in 0..RECEIPTS_PER_VOTE {
            ledger.set_once("u1", "c", VoteState::Up, Uuid::new_v4());
        }
        ledger.set("u1", "c", VoteState::None);

        // Too old to be recognised, so it applies again.
        let outcome = ledger.set_once("u1", "c", VoteState::Up, first);
        assert_eq!((outcome.score, outcome.user_vote), (1, VoteState::Up));
    }

    fn vote_type() -> impl Strategy<Value = VoteType> {
        prop_oneof![Just(VoteType::Up), Just(VoteType::Down)]
    }

    proptest! {
        #[test]
        fn score_is_sum_of_table_deltas(inputs in proptest::collection::vec(vote_type(), 0..64)) {
            let mut ledger = VoteLedger::new();
            let mut expected_state = VoteState::None;
            let mut expected_score = 0i64;

            for input in inputs {
                let (next, delta) = expected_state.transition(input);
                expected_state = next;
                expected_score += delta;

                let outcome = ledger.cast("u1", "c", input);
                prop_assert_eq!(outcome.user_vote, expected_state);
                prop_assert_eq!(outcome.score, expected_score);
            }

            prop_assert_eq!(ledger.score("c"), expected_score);
            prop_assert_eq!(ledger.vote_of("u1", "c"), expected_state);
            prop_assert!(ledger.score("c").abs() <= 1);
        }

        #[test]
        fn tally_equals_sum_of_member_weights(
            clicks in proptest::collection::vec((0usize..4, vote_type()), 0..128)
        ) {
            let members = ["a", "b", "c", "d"];
            let mut ledger = VoteLedger::new();
            for (member, input) in clicks {
                ledger.cast(members[member], "c", input);
            }
            let sum: i64 = members.iter().map(|m| ledger.vote_of(m, "c").weight()).sum();
            prop_assert_eq!(ledger.score("c"), sum);
        }
    }
}
