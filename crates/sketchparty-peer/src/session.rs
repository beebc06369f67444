use bytes::Bytes;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;

use sketchparty_core::game::{
    round_signal, GameMode, GameSession, GameState, RoundSignal, DEFAULT_ROUND_SECONDS,
    MAX_ROUND_SECONDS, MIN_ROUND_SECONDS,
};
use sketchparty_core::player::{Guess, Role};
use sketchparty_core::snapshot::Snapshot;
use sketchparty_core::words::{WordBank, WordLookup};

use crate::timer::RoundTimer;

/// Outbound side of the transport: hands the serialized snapshot to every
/// connected peer. Implementations must not block.
pub trait Broadcast: Send {
    fn broadcast(&self, blob: Bytes, reliable: bool);
}

/// Everything that may mutate session state arrives here, including timer
/// expiries, so all mutation is serialized onto the one actor task.
#[derive(Debug)]
pub enum Command {
    CreateGame { rounds: Option<u32>, mode: GameMode },
    BeginRound,
    SubmitGuess { value: String },
    Skip,
    EndGame,
    FinishGame,
    SetCategory { name: String },
    SetRoundSeconds { secs: u32 },
    SnapshotReceived { blob: Bytes, from: String },
    PeerConnected { name: String },
    PeerDisconnected { name: String },
    TimerElapsed { generation: u64 },
    Report,
    Shutdown,
}

pub struct SessionConfig {
    pub display_name: String,
    pub round_seconds: u32,
    pub seed: Option<u64>,
}

/// The single logical owner of the game state on this device. Runs as one
/// sequential task; peers interact only through snapshots, local actors only
/// through [`Command`]s.
pub struct Session {
    game: GameSession<String>,
    bank: WordBank,
    lookup: Box<dyn WordLookup>,
    broadcast: Box<dyn Broadcast>,
    timer: RoundTimer,
    display_name: String,
    connected_peers: Vec<String>,
    round_seconds: u32,
    rng: StdRng,
    self_tx: mpsc::Sender<Command>,
}

pub fn command_channel() -> (mpsc::Sender<Command>, mpsc::Receiver<Command>) {
    mpsc::channel(64)
}

impl Session {
    pub fn new(
        config: SessionConfig,
        game: GameSession<String>,
        bank: WordBank,
        lookup: Box<dyn WordLookup>,
        broadcast: Box<dyn Broadcast>,
        self_tx: mpsc::Sender<Command>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            game,
            bank,
            lookup,
            broadcast,
            timer: RoundTimer::new(),
            display_name: config.display_name,
            connected_peers: Vec::new(),
            round_seconds: config
                .round_seconds
                .clamp(MIN_ROUND_SECONDS, MAX_ROUND_SECONDS),
            rng,
            self_tx,
        }
    }

    pub fn game(&self) -> &GameSession<String> {
        &self.game
    }

    pub fn round_seconds(&self) -> u32 {
        self.round_seconds
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(cmd) = rx.recv().await {
            if matches!(cmd, Command::Shutdown) {
                self.timer.cancel();
                break;
            }
            self.handle(cmd).await;
        }
        tracing::info!("session stopped");
    }

    pub async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::CreateGame { rounds, mode } => self.create_game(rounds, mode),
            Command::BeginRound => {
                self.apply_intent("begin round", |game, _| game.begin_round());
            }
            Command::SubmitGuess { value } => self.submit_guess(value),
            Command::Skip => {
                let me = self.display_name.clone();
                self.apply_intent("skip", |game, rng| game.request_skip(&me, rng));
            }
            Command::EndGame => {
                self.apply_intent("end game", |game, _| game.end_game());
            }
            Command::FinishGame => {
                self.apply_intent("finish game", |game, _| {
                    game.finish_game();
                    Ok(())
                });
            }
            Command::SetCategory { name } => self.set_category(name).await,
            Command::SetRoundSeconds { secs } => {
                self.round_seconds = secs.clamp(MIN_ROUND_SECONDS, MAX_ROUND_SECONDS);
                self.send_snapshot(Some(self.round_seconds));
            }
            Command::SnapshotReceived { blob, from } => self.snapshot_received(blob, &from),
            Command::PeerConnected { name } => self.peer_connected(name),
            Command::PeerDisconnected { name } => self.peer_disconnected(&name),
            Command::TimerElapsed { generation } => self.timer_elapsed(generation),
            Command::Report => self.report(),
            Command::Shutdown => {}
        }
    }

    // -- Local intents --

    fn create_game(&mut self, rounds: Option<u32>, mode: GameMode) {
        // First start from the lobby seats this device and every connected
        // peer; a rematch from Finished keeps the existing roster.
        if matches!(self.game.state(), GameState::WaitingToBegin) {
            let names: Vec<String> = std::iter::once(self.display_name.clone())
                .chain(self.connected_peers.iter().cloned())
                .collect();
            for name in names {
                if let Err(e) = self.game.add_player(name, Role::Spectator) {
                    tracing::debug!("seating player: {}", e);
                }
            }
        }
        let before = self.game.state().clone();
        match self.game.create_game(rounds, mode, &mut self.rng) {
            Ok(()) => {
                self.drive_timer(&before);
                self.send_snapshot(Some(self.round_seconds));
            }
            Err(e) => tracing::warn!("create game rejected: {}", e),
        }
    }

    fn submit_guess(&mut self, value: String) {
        let Some(me) = self.game.player(&self.display_name).cloned() else {
            tracing::warn!("guess from a device that is not seated");
            return;
        };
        self.apply_intent("guess", move |game, rng| {
            game.submit_guess(Guess::new(me, value), rng)
        });
    }

    async fn set_category(&mut self, name: String) {
        match self.bank.resolve_or_fetch(&name, self.lookup.as_ref()).await {
            Ok(category) => {
                if category.words.is_empty() {
                    tracing::warn!("category '{}' has no words", name);
                }
                self.game.set_answer_bank(category.words);
                self.send_snapshot(None);
            }
            Err(e) => tracing::warn!("category lookup for '{}' failed: {}", name, e),
        }
    }

    fn timer_elapsed(&mut self, generation: u64) {
        // An expiry queued before a cancellation is stale; ignore it.
        if !self.timer.is_current(generation) {
            tracing::debug!("ignoring stale timer expiry");
            return;
        }
        self.apply_intent("round timeout", |game, rng| game.time_expired(rng));
    }

    // -- Peer events --

    fn peer_connected(&mut self, name: String) {
        if !self.connected_peers.contains(&name) {
            self.connected_peers.push(name.clone());
        }
        tracing::info!("peer '{}' connected", name);
        match self.game.state() {
            GameState::WaitingToBegin => {}
            GameState::FreeDraw => self.send_snapshot(None),
            _ => {
                // Mid-match joins spectate until the next deal.
                if let Err(e) = self.game.add_player(name, Role::Spectator) {
                    tracing::debug!("seating joining peer: {}", e);
                }
                self.send_snapshot(None);
            }
        }
    }

    fn peer_disconnected(&mut self, name: &str) {
        self.connected_peers.retain(|n| n != name);
        tracing::info!("peer '{}' disconnected", name);
        let before = self.game.state().clone();
        if let Err(e) = self.game.remove_player(name, &mut self.rng) {
            tracing::debug!("removing departed peer: {}", e);
            return;
        }
        // A match cannot continue with fewer than two participants. End it
        // from wherever it stands; states with no score screen reset fully.
        if self.game.players().len() < 2
            && !matches!(
                self.game.state(),
                GameState::WaitingToBegin | GameState::GameOver { .. } | GameState::Finished
            )
            && self.game.end_game().is_err()
        {
            self.game.finish_game();
        }
        self.drive_timer(&before);
        self.send_snapshot(None);
    }

    fn snapshot_received(&mut self, blob: Bytes, from: &str) {
        let snapshot = match Snapshot::<String>::decode(&blob) {
            Ok(s) => s,
            Err(e) => {
                // Undecodable snapshots are dropped without touching state.
                tracing::warn!("dropping snapshot from '{}': {}", from, e);
                return;
            }
        };
        if let Some(secs) = snapshot.round_seconds {
            self.round_seconds = secs.clamp(MIN_ROUND_SECONDS, MAX_ROUND_SECONDS);
        }
        let outcome = self.game.merge_from(&snapshot.game);
        tracing::debug!(
            "merged snapshot from '{}' (state changed: {}, joined: {:?})",
            from,
            outcome.state_changed,
            outcome.joined
        );
        self.apply_signal(outcome.signal);
    }

    // -- Internal --

    /// Run a mutating intent, then drive the timer and broadcast the new
    /// snapshot. Rejected intents leave state untouched and are only logged.
    fn apply_intent<F>(&mut self, what: &str, intent: F)
    where
        F: FnOnce(
            &mut GameSession<String>,
            &mut StdRng,
        ) -> Result<(), sketchparty_core::game::GameError>,
    {
        let before = self.game.state().clone();
        match intent(&mut self.game, &mut self.rng) {
            Ok(()) => {
                self.drive_timer(&before);
                self.send_snapshot(None);
            }
            Err(e) => tracing::warn!("{} rejected: {}", what, e),
        }
    }

    fn drive_timer(&mut self, before: &GameState<String>) {
        let signal = round_signal(before, self.game.state(), self.game.game_mode());
        self.apply_signal(signal);
    }

    fn apply_signal(&mut self, signal: Option<RoundSignal>) {
        match signal {
            Some(RoundSignal::Start) => {
                self.timer.start(self.round_seconds, self.self_tx.clone());
            }
            Some(RoundSignal::Stop) => self.timer.cancel(),
            None => {}
        }
    }

    fn report(&self) {
        let state = match self.game.state() {
            GameState::WaitingToBegin => "waiting to begin".to_string(),
            GameState::FreeDraw => "free draw".to_string(),
            GameState::Playing { round, drawer, .. } => format!(
                "round {} of {}, {} draws",
                round,
                self.game.number_of_rounds(),
                drawer.name
            ),
            GameState::Transition { .. } => format!(
                "between rounds (next: {})",
                self.game.round_number().unwrap_or(0)
            ),
            GameState::GameOver { .. } => "game over".to_string(),
            GameState::Finished => "finished".to_string(),
        };
        tracing::info!("state: {}", state);
        for p in self.game.sorted_players() {
            tracing::info!("  {} - {} pts ({:?})", p.name, p.points, p.role);
        }
    }

    fn send_snapshot(&mut self, round_seconds: Option<u32>) {
        match Snapshot::new(self.game.clone(), round_seconds).encode() {
            Ok(blob) => self.broadcast.broadcast(blob, true),
            Err(e) => tracing::error!("snapshot encode failed, not broadcast: {}", e),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name: "host".to_string(),
            round_seconds: DEFAULT_ROUND_SECONDS,
            seed: None,
        }
    }
}
