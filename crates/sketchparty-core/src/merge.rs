//! Reconciles a peer-broadcast snapshot with the locally held session.
//!
//! The protocol assumes a single logical writer at a time: whichever device
//! resolved the last mutating intent broadcasts immediately, and everyone
//! else adopts that snapshot wholesale (last-writer-wins). There is no
//! per-field diffing and no causal ordering; concurrent writers race and one
//! of them loses at each peer.

use crate::game::{round_signal, Answer, GameSession, RoundSignal};

/// What an inbound merge changed, used to drive the round timer and to
/// surface fresh joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The inbound snapshot carried a different `GameState`.
    pub state_changed: bool,
    /// Timer action implied by the state change, if any.
    pub signal: Option<RoundSignal>,
    /// Ids of players present in the inbound snapshot but previously unknown
    /// locally.
    pub joined: Vec<String>,
}

impl<A: Answer> GameSession<A> {
    /// Apply an authoritative snapshot from a peer.
    ///
    /// Player sets are unioned; scores of players known on both sides are
    /// overwritten by the inbound values (the sender is the one that
    /// resolved the scoring intent). Everything else -- guesses, state,
    /// answer bank, round count, mode -- is adopted from the snapshot. The
    /// single-shot `correct_guesser` marker never survives a merge.
    pub fn merge_from(&mut self, inbound: &GameSession<A>) -> MergeOutcome {
        self.clear_correct_guesser();

        let mut joined = Vec::new();
        for theirs in inbound.players() {
            if let Some(pos) = self.players().iter().position(|mine| mine.id == theirs.id) {
                self.players_mut()[pos].points = theirs.points;
            } else {
                joined.push(theirs.id.clone());
                self.players_mut().push(theirs.clone());
            }
        }

        let before = self.state().clone();
        let state_changed = self.replace_from(inbound);
        let signal = round_signal(&before, self.state(), self.game_mode());

        MergeOutcome {
            state_changed,
            signal,
            joined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameMode, GameState};
    use crate::player::{Guess, Role};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn words(names: &[&str]) -> Vec<String> {
        names.iter().map(|w| w.to_string()).collect()
    }

    fn lobby_session(names: &[&str]) -> GameSession<String> {
        let mut session = GameSession::new(words(&["cat", "dog", "fish"]));
        for name in names {
            session.add_player(*name, Role::Spectator).unwrap();
        }
        session
    }

    fn started(mut session: GameSession<String>, rng: &mut StdRng) -> GameSession<String> {
        session
            .create_game(Some(3), GameMode::Pictionary, rng)
            .unwrap();
        session.begin_round().unwrap();
        session
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut local = started(lobby_session(&["Alice", "Bob", "Carol"]), &mut rng);
        let inbound = local.clone();

        let outcome = local.merge_from(&inbound);

        assert!(!outcome.state_changed);
        assert!(outcome.signal.is_none());
        assert!(outcome.joined.is_empty());
        assert_eq!(local.state(), inbound.state());
        assert_eq!(local.players(), inbound.players());
        assert_eq!(local.guesses(), inbound.guesses());
        assert_eq!(local.answer_bank(), inbound.answer_bank());
        assert_eq!(local.number_of_rounds(), inbound.number_of_rounds());
        assert_eq!(local.game_mode(), inbound.game_mode());
    }

    #[test]
    fn test_merge_appends_unknown_players() {
        let mut local = lobby_session(&["Alice"]);
        let inbound = lobby_session(&["Alice", "Bob", "Carol"]);

        let outcome = local.merge_from(&inbound);

        assert_eq!(outcome.joined, vec!["Bob".to_string(), "Carol".to_string()]);
        assert_eq!(local.players().len(), 3);
    }

    #[test]
    fn test_merge_overwrites_scores_last_writer_wins() {
        let mut local = lobby_session(&["Alice", "Bob"]);
        local.players_mut()[0].points = 99;
        let mut inbound = lobby_session(&["Alice", "Bob"]);
        inbound.players_mut()[0].points = 5;
        inbound.players_mut()[1].points = 10;

        local.merge_from(&inbound);

        assert_eq!(local.player("Alice").unwrap().points, 5);
        assert_eq!(local.player("Bob").unwrap().points, 10);
    }

    #[test]
    fn test_merge_adopts_inbound_state_and_guesses() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut local = lobby_session(&["Alice", "Bob", "Carol"]);
        let mut inbound = started(local.clone(), &mut rng);
        let guesser = inbound
            .players()
            .iter()
            .find(|p| p.is_guesser())
            .cloned()
            .unwrap();
        inbound
            .submit_guess(Guess::new(guesser, "not it".into()), &mut rng)
            .unwrap();

        let outcome = local.merge_from(&inbound);

        assert!(outcome.state_changed);
        assert!(matches!(local.state(), GameState::Playing { .. }));
        assert_eq!(local.guesses().len(), 1);
        assert_eq!(local.answer_bank(), inbound.answer_bank());
        assert_eq!(local.number_of_rounds(), inbound.number_of_rounds());
    }

    #[test]
    fn test_merge_emits_timer_signal_on_round_entry() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut local = lobby_session(&["Alice", "Bob", "Carol"]);
        let inbound = started(local.clone(), &mut rng);

        let outcome = local.merge_from(&inbound);

        assert_eq!(outcome.signal, Some(crate::game::RoundSignal::Start));
    }

    #[test]
    fn test_merge_assigns_roles_for_dealt_round() {
        let mut rng = StdRng::seed_from_u64(5);
        // Local peer is still a lobby full of spectators; the sender has
        // already dealt round 1.
        let mut local = lobby_session(&["Alice", "Bob", "Carol"]);
        let mut inbound = lobby_session(&["Alice", "Bob", "Carol"]);
        inbound
            .create_game(Some(3), GameMode::Pictionary, &mut rng)
            .unwrap();

        local.merge_from(&inbound);

        let drawers = local.players().iter().filter(|p| p.is_drawer()).count();
        assert_eq!(drawers, 1);
        let guessers = local.players().iter().filter(|p| p.is_guesser()).count();
        assert_eq!(guessers, 2);
        assert_eq!(
            local.current_drawer().map(|d| d.id.clone()),
            inbound.current_drawer().map(|d| d.id.clone())
        );

        // Committing the round keeps exactly one drawer.
        local.begin_round().unwrap();
        assert!(matches!(local.state(), GameState::Playing { .. }));
        let drawers = local.players().iter().filter(|p| p.is_drawer()).count();
        assert_eq!(drawers, 1);
    }

    #[test]
    fn test_merge_clears_correct_guesser() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut local = started(lobby_session(&["Alice", "Bob", "Carol"]), &mut rng);
        let answer = local.current_answer().unwrap().clone();
        let guesser = local
            .players()
            .iter()
            .find(|p| p.is_guesser())
            .cloned()
            .unwrap();
        local
            .submit_guess(Guess::new(guesser, answer), &mut rng)
            .unwrap();
        assert!(local.correct_guesser().is_some());

        let inbound = local.clone();
        local.merge_from(&inbound);

        assert!(local.correct_guesser().is_none());
    }
}
