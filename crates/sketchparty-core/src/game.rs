use rand::Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::pick;
use crate::player::{Guess, Player, Role};

pub const DEFAULT_ROUNDS: u32 = 5;
pub const DEFAULT_POINTS_PER_CORRECT_ANSWER: u32 = 5;
pub const DEFAULT_ROUND_SECONDS: u32 = 45;
pub const MIN_ROUND_SECONDS: u32 = 10;
pub const MAX_ROUND_SECONDS: u32 = 90;

/// Anything that can serve as a round's hidden answer. Guess matching is
/// exact equality unless the payload type overrides it.
pub trait Answer: Clone + PartialEq + std::fmt::Debug + Serialize + DeserializeOwned {
    fn matches(&self, guess: &Self) -> bool {
        self == guess
    }
}

impl Answer for String {
    /// Word answers tolerate surrounding whitespace and any casing.
    fn matches(&self, guess: &Self) -> bool {
        self.trim().to_lowercase() == guess.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    Pictionary,
    FreeDraw,
}

/// Match progress. `Transition` holds the already-dealt next round so every
/// peer can show the interstitial screen before anyone commits it; the
/// nested state is always `Playing` and never nests further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameState<A> {
    WaitingToBegin,
    FreeDraw,
    Playing {
        round: u32,
        answer: A,
        drawer: Player,
    },
    Transition {
        prev_answer: Option<A>,
        next: Box<GameState<A>>,
    },
    GameOver {
        prev_answer: Option<A>,
    },
    Finished,
}

/// Emitted to the timer coordinator when a state change enters or leaves an
/// active round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundSignal {
    Start,
    Stop,
}

/// Timer signal for a state change, derived purely from the before/after
/// pair. FreeDraw matches are untimed.
pub fn round_signal<A: Answer>(
    before: &GameState<A>,
    after: &GameState<A>,
    mode: GameMode,
) -> Option<RoundSignal> {
    if before == after {
        return None;
    }
    match after {
        GameState::Playing { .. } if mode != GameMode::FreeDraw => Some(RoundSignal::Start),
        GameState::Transition { .. } if mode != GameMode::FreeDraw => Some(RoundSignal::Stop),
        GameState::GameOver { .. } | GameState::Finished => Some(RoundSignal::Stop),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("operation not valid in the current game state")]
    InvalidTransition,
    #[error("player '{0}' already exists")]
    DuplicatePlayer(String),
    #[error("no player with id '{0}'")]
    UnknownPlayer(String),
    #[error("at least one player is required")]
    NoPlayers,
    #[error("the answer bank is empty")]
    EmptyAnswerBank,
    #[error("no eligible drawer or answer left for the next round")]
    RoundExhausted,
    #[error("the only remaining guesser cannot forfeit")]
    SoleGuesserCannotForfeit,
}

/// The authoritative match state held by each device. All mutation goes
/// through the intent methods below; every intent either moves the machine
/// forward or returns an error and leaves the state untouched. Errors are
/// local diagnostics, never propagated to peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession<A> {
    state: GameState<A>,
    players: Vec<Player>,
    guesses: Vec<Guess<A>>,
    answer_bank: Vec<A>,
    number_of_rounds: u32,
    points_per_correct_answer: u32,
    game_mode: GameMode,
    prev_answer: Option<A>,
    correct_guesser: Option<String>,
}

impl<A: Answer> GameSession<A> {
    pub fn new(answer_bank: Vec<A>) -> Self {
        Self::with_config(
            answer_bank,
            DEFAULT_ROUNDS,
            DEFAULT_POINTS_PER_CORRECT_ANSWER,
            GameMode::Pictionary,
        )
    }

    /// `number_of_rounds` is capped at the bank size so a match can never
    /// need more answers than exist.
    pub fn with_config(
        answer_bank: Vec<A>,
        number_of_rounds: u32,
        points_per_correct_answer: u32,
        game_mode: GameMode,
    ) -> Self {
        let number_of_rounds = number_of_rounds.min(answer_bank.len() as u32);
        Self {
            state: GameState::WaitingToBegin,
            players: Vec::new(),
            guesses: Vec::new(),
            answer_bank,
            number_of_rounds,
            points_per_correct_answer,
            game_mode,
            prev_answer: None,
            correct_guesser: None,
        }
    }

    // -- Accessors --

    pub fn state(&self) -> &GameState<A> {
        &self.state
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn guesses(&self) -> &[Guess<A>] {
        &self.guesses
    }

    pub fn answer_bank(&self) -> &[A] {
        &self.answer_bank
    }

    pub fn number_of_rounds(&self) -> u32 {
        self.number_of_rounds
    }

    pub fn points_per_correct_answer(&self) -> u32 {
        self.points_per_correct_answer
    }

    pub fn game_mode(&self) -> GameMode {
        self.game_mode
    }

    pub fn correct_guesser(&self) -> Option<&str> {
        self.correct_guesser.as_deref()
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// The drawer of the active round, or of the round pending in a
    /// transition.
    pub fn current_drawer(&self) -> Option<&Player> {
        match &self.state {
            GameState::Playing { drawer, .. } => Some(drawer),
            GameState::Transition { next, .. } => match next.as_ref() {
                GameState::Playing { drawer, .. } => Some(drawer),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn round_number(&self) -> Option<u32> {
        match &self.state {
            GameState::Playing { round, .. } => Some(*round),
            GameState::Transition { next, .. } => match next.as_ref() {
                GameState::Playing { round, .. } => Some(*round),
                _ => None,
            },
            _ => None,
        }
    }

    /// The hidden answer, only available while a round is active.
    pub fn current_answer(&self) -> Option<&A> {
        match &self.state {
            GameState::Playing { answer, .. } => Some(answer),
            _ => None,
        }
    }

    /// The answer revealed on the interstitial or game-over screen.
    pub fn prev_answer(&self) -> Option<&A> {
        match &self.state {
            GameState::Transition { prev_answer, .. } => prev_answer.as_ref(),
            GameState::GameOver { prev_answer } => prev_answer.as_ref(),
            _ => None,
        }
    }

    /// Players ordered by points, highest first.
    pub fn sorted_players(&self) -> Vec<&Player> {
        let mut sorted: Vec<&Player> = self.players.iter().collect();
        sorted.sort_by(|a, b| b.points.cmp(&a.points));
        sorted
    }

    /// Names of every player tied at the highest score.
    pub fn top_scorers(&self) -> Vec<&str> {
        let high = self.players.iter().map(|p| p.points).max().unwrap_or(0);
        self.players
            .iter()
            .filter(|p| p.points == high)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// A guesser may forfeit only while at least one other guesser remains.
    pub fn can_forfeit(&self, id: &str) -> bool {
        self.players.len() > 2 && self.player(id).map(|p| p.is_guesser()).unwrap_or(false)
    }

    // -- Intents --

    /// Deal the first round (or switch to free-draw). Valid only from the
    /// lobby or a fully finished match.
    pub fn create_game(
        &mut self,
        rounds: Option<u32>,
        mode: GameMode,
        rng: &mut impl Rng,
    ) -> Result<(), GameError> {
        if !matches!(
            self.state,
            GameState::WaitingToBegin | GameState::Finished
        ) {
            return Err(GameError::InvalidTransition);
        }
        if self.players.is_empty() {
            return Err(GameError::NoPlayers);
        }
        if self.answer_bank.is_empty() {
            return Err(GameError::EmptyAnswerBank);
        }
        self.game_mode = mode;
        if mode == GameMode::FreeDraw {
            for p in &mut self.players {
                p.role = Role::Spectator;
            }
            self.set_state(GameState::FreeDraw);
            return Ok(());
        }
        if let Some(rounds) = rounds {
            self.number_of_rounds = rounds.min(self.answer_bank.len() as u32);
        }
        self.deal_first_round(rng)
    }

    /// Commit the round pending in a transition.
    pub fn begin_round(&mut self) -> Result<(), GameError> {
        match &self.state {
            GameState::Transition { next, .. } => {
                let next = (**next).clone();
                self.set_state(next);
                Ok(())
            }
            _ => Err(GameError::InvalidTransition),
        }
    }

    pub fn add_player(&mut self, name: impl Into<String>, role: Role) -> Result<(), GameError> {
        self.add_player_value(Player::new(name, role))
    }

    pub fn add_player_value(&mut self, player: Player) -> Result<(), GameError> {
        if self.players.iter().any(|p| p.id == player.id) {
            return Err(GameError::DuplicatePlayer(player.id));
        }
        self.players.push(player);
        Ok(())
    }

    /// Remove a participant. When the current drawer leaves mid-match the
    /// round is re-dealt; failure to re-deal (bank or players exhausted) does
    /// not undo the removal.
    pub fn remove_player(&mut self, id: &str, rng: &mut impl Rng) -> Result<(), GameError> {
        let Some(pos) = self.players.iter().position(|p| p.id == id) else {
            return Err(GameError::UnknownPlayer(id.to_string()));
        };
        let was_drawer = self.current_drawer().map(|d| d.id == id).unwrap_or(false);
        self.players.remove(pos);
        if was_drawer {
            let _ = self.drawer_quit(rng);
        }
        Ok(())
    }

    /// The drawer may skip the round outright; a guesser may only forfeit
    /// (demote to spectator), and only while another guesser remains.
    pub fn request_skip(&mut self, player_id: &str, rng: &mut impl Rng) -> Result<(), GameError> {
        let GameState::Playing { round, .. } = &self.state else {
            return Err(GameError::InvalidTransition);
        };
        let round = *round;
        if self.player(player_id).is_none() {
            return Err(GameError::UnknownPlayer(player_id.to_string()));
        }
        let is_drawer = self
            .current_drawer()
            .map(|d| d.id == player_id)
            .unwrap_or(false);
        if is_drawer {
            return self.advance_or_end(round, rng);
        }
        if self.players.len() <= 2 {
            return Err(GameError::SoleGuesserCannotForfeit);
        }
        if let Some(p) = self.players.iter_mut().find(|p| p.id == player_id) {
            p.role = Role::Spectator;
        }
        Ok(())
    }

    /// Record a guess (most recent first). A correct guess scores for its
    /// owner and advances the match.
    pub fn submit_guess(&mut self, guess: Guess<A>, rng: &mut impl Rng) -> Result<(), GameError> {
        let GameState::Playing { round, answer, .. } = &self.state else {
            return Err(GameError::InvalidTransition);
        };
        let round = *round;
        let answer = answer.clone();
        let correct = answer.matches(&guess.value);
        let owner_id = guess.owner.id.clone();
        let owner_name = guess.owner.name.clone();
        self.guesses.insert(0, guess);
        if correct {
            self.award_points(&owner_id);
            self.correct_guesser = Some(owner_name);
            self.advance_or_end(round, rng)?;
        }
        Ok(())
    }

    /// The current drawer left. Mid-transition the match is re-dealt from
    /// scratch; mid-round the same round number is re-dealt with a fresh
    /// drawer and answer; on the final round the game ends.
    pub fn drawer_quit(&mut self, rng: &mut impl Rng) -> Result<(), GameError> {
        match &self.state {
            GameState::Transition { .. } => self.deal_first_round(rng),
            GameState::Playing { round, .. } => {
                let round = *round;
                if round < self.number_of_rounds {
                    self.move_to_next_round(true, rng)
                } else {
                    self.end_game()
                }
            }
            _ => Err(GameError::InvalidTransition),
        }
    }

    /// Swap in a new answer pool, re-capping the round count at its size.
    pub fn set_answer_bank(&mut self, answer_bank: Vec<A>) {
        self.number_of_rounds = DEFAULT_ROUNDS.min(answer_bank.len() as u32);
        self.answer_bank = answer_bank;
    }

    /// No one guessed in time; advance without demoting anyone.
    pub fn time_expired(&mut self, rng: &mut impl Rng) -> Result<(), GameError> {
        let GameState::Playing { round, .. } = &self.state else {
            return Err(GameError::InvalidTransition);
        };
        let round = *round;
        self.advance_or_end(round, rng)
    }

    pub fn end_game(&mut self) -> Result<(), GameError> {
        match &self.state {
            GameState::Playing { answer, .. } => {
                let answer = answer.clone();
                self.set_state(GameState::GameOver {
                    prev_answer: Some(answer),
                });
                self.guesses.clear();
                Ok(())
            }
            GameState::FreeDraw => {
                self.set_state(GameState::Finished);
                Ok(())
            }
            _ => Err(GameError::InvalidTransition),
        }
    }

    /// Reset to a fully finished match: no guesses, all scores zeroed,
    /// everyone back to spectator.
    pub fn finish_game(&mut self) {
        self.set_state(GameState::Finished);
        self.guesses.clear();
        self.prev_answer = None;
        for p in &mut self.players {
            p.points = 0;
            p.role = Role::Spectator;
        }
    }

    // -- Internal --

    /// Pick an initial drawer/answer and park the match in a transition
    /// ahead of round 1. Requires at least one player and one answer.
    fn deal_first_round(&mut self, rng: &mut impl Rng) -> Result<(), GameError> {
        let answer = pick::choose(&self.answer_bank, rng)
            .cloned()
            .ok_or(GameError::EmptyAnswerBank)?;
        let drawer = pick::choose(&self.players, rng)
            .cloned()
            .ok_or(GameError::NoPlayers)?;
        self.set_state(GameState::Transition {
            prev_answer: None,
            next: Box::new(GameState::Playing {
                round: 1,
                answer,
                drawer,
            }),
        });
        Ok(())
    }

    fn advance_or_end(&mut self, round: u32, rng: &mut impl Rng) -> Result<(), GameError> {
        if round < self.number_of_rounds {
            self.move_to_next_round(false, rng)
        } else {
            self.end_game()
        }
    }

    /// Deal the next round (or re-deal the current one after a drawer quit).
    /// The just-used answer leaves the pool first, so it can never repeat,
    /// even if the deal then fails for lack of a drawer or answer. On such a
    /// failure the state is left as-is; callers guarantee >=2 players and a
    /// non-empty bank to avoid it.
    fn move_to_next_round(
        &mut self,
        restart_existing_round: bool,
        rng: &mut impl Rng,
    ) -> Result<(), GameError> {
        let GameState::Playing {
            round,
            answer,
            drawer,
        } = &self.state
        else {
            return Err(GameError::InvalidTransition);
        };
        let round = *round;
        let answer = answer.clone();
        let drawer = drawer.clone();
        self.answer_bank.retain(|a| a != &answer);

        let new_drawer = pick::choose_excluding(&self.players, &drawer, rng)
            .cloned()
            .ok_or(GameError::RoundExhausted)?;
        let new_answer = pick::choose(&self.answer_bank, rng)
            .cloned()
            .ok_or(GameError::RoundExhausted)?;

        let new_round = if restart_existing_round {
            round
        } else {
            round + 1
        };
        self.prev_answer = Some(answer.clone());
        self.set_state(GameState::Transition {
            prev_answer: Some(answer),
            next: Box::new(GameState::Playing {
                round: new_round,
                answer: new_answer,
                drawer: new_drawer,
            }),
        });
        self.guesses.clear();
        Ok(())
    }

    /// Every state change funnels through here so the role table stays in
    /// step with the machine: once a transition carries a pending round, its
    /// drawer is the sole `Drawer` and everyone else guesses.
    fn set_state(&mut self, next: GameState<A>) {
        if let GameState::Transition { next: pending, .. } = &next {
            if let GameState::Playing { drawer, .. } = pending.as_ref() {
                let drawer_id = drawer.id.clone();
                for p in &mut self.players {
                    p.role = if p.id == drawer_id {
                        Role::Drawer
                    } else {
                        Role::Guesser
                    };
                }
            }
        }
        self.state = next;
    }

    fn award_points(&mut self, player_id: &str) {
        if let Some(p) = self.players.iter_mut().find(|p| p.id == player_id) {
            p.points += self.points_per_correct_answer;
        }
    }

    pub(crate) fn players_mut(&mut self) -> &mut Vec<Player> {
        &mut self.players
    }

    pub(crate) fn replace_from(&mut self, other: &Self) -> bool {
        self.guesses = other.guesses.clone();
        self.answer_bank = other.answer_bank.clone();
        self.number_of_rounds = other.number_of_rounds;
        self.game_mode = other.game_mode;
        self.prev_answer = other.prev_answer.clone();
        if self.state != other.state {
            // Through set_state so the role table is recomputed when the
            // adopted state carries a dealt round.
            self.set_state(other.state.clone());
            true
        } else {
            false
        }
    }

    pub(crate) fn clear_correct_guesser(&mut self) {
        self.correct_guesser = None;
    }
}
