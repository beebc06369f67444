use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use sketchparty_core::game::{GameMode, GameSession, DEFAULT_ROUND_SECONDS};
use sketchparty_core::words::{CacheStore, WordBank, WordLookup};
use sketchparty_peer::net::{run_host, MeshBroadcast, PeerRegistry};
use sketchparty_peer::session::{command_channel, Command, Session, SessionConfig};

/// sketchparty host - runs a drawing-game session peers can join by address
#[derive(Parser, Debug)]
#[command(name = "sketchparty-peer", version, about)]
struct Args {
    /// Address to host the session on
    #[arg(short, long, default_value = "0.0.0.0:7878")]
    bind: String,

    /// Display name of the hosting player
    #[arg(short, long, default_value = "host")]
    name: String,

    /// Word category for the match
    #[arg(short, long, default_value = "Objects")]
    category: String,

    /// Number of rounds
    #[arg(short, long, default_value_t = 5)]
    rounds: u32,

    /// Seconds per round
    #[arg(short = 's', long, default_value_t = DEFAULT_ROUND_SECONDS)]
    round_seconds: u32,

    /// Directory for the custom-category cache
    #[arg(long, default_value = ".sketchparty")]
    cache_dir: PathBuf,

    /// Fixed RNG seed (reproducible drawer/answer selection)
    #[arg(long)]
    seed: Option<u64>,
}

/// One file per key under the cache directory.
struct FileStore {
    dir: PathBuf,
}

impl CacheStore for FileStore {
    fn load(&self, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.dir.join(key)).ok()
    }

    fn store(&mut self, key: &str, value: &[u8]) {
        if let Err(e) = std::fs::create_dir_all(&self.dir)
            .and_then(|_| std::fs::write(self.dir.join(key), value))
        {
            tracing::warn!("failed to persist category cache: {}", e);
        }
    }
}

/// The host binary ships without a lookup collaborator; unknown categories
/// must be built-in or already cached.
struct NoLookup;

#[async_trait]
impl WordLookup for NoLookup {
    async fn lookup_words(&self, category: &str) -> anyhow::Result<Vec<String>> {
        anyhow::bail!("no word-lookup collaborator configured for '{}'", category)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketchparty_peer=info,sketchparty_core=info".into()),
        )
        .init();

    let args = Args::parse();
    let addr: SocketAddr = args.bind.parse()?;

    let bank = WordBank::new(Box::new(FileStore {
        dir: args.cache_dir.clone(),
    }));
    let category = bank
        .resolve(&args.category)
        .ok_or_else(|| anyhow::anyhow!("unknown category '{}'", args.category))?
        .clone();

    let game = GameSession::with_config(
        category.words,
        args.rounds,
        sketchparty_core::game::DEFAULT_POINTS_PER_CORRECT_ANSWER,
        GameMode::Pictionary,
    );

    let registry = Arc::new(PeerRegistry::default());
    let (tx, rx) = command_channel();
    let session = Session::new(
        SessionConfig {
            display_name: args.name.clone(),
            round_seconds: args.round_seconds,
            seed: args.seed,
        },
        game,
        bank,
        Box::new(NoLookup),
        Box::new(MeshBroadcast::new(registry.clone())),
        tx.clone(),
    );

    tracing::info!(
        "hosting '{}' as {} ({} rounds of {}s, category {})",
        addr,
        args.name,
        args.rounds,
        args.round_seconds,
        args.category
    );

    tokio::spawn(session.run(rx));
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = run_host(addr, tx, registry).await {
                tracing::error!("host networking failed: {}", e);
            }
        });
    }

    run_console(tx, args.rounds).await
}

/// Minimal operator console; each line becomes one session command.
async fn run_console(tx: tokio::sync::mpsc::Sender<Command>, rounds: u32) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("commands: create [freedraw] | begin | guess <word> | skip | end | finish | category <name> | seconds <n> | status | quit");

    while let Some(line) = lines.next_line().await? {
        let mut parts = line.trim().splitn(2, ' ');
        let cmd = match (parts.next().unwrap_or(""), parts.next()) {
            ("create", mode) => Command::CreateGame {
                rounds: Some(rounds),
                mode: if mode == Some("freedraw") {
                    GameMode::FreeDraw
                } else {
                    GameMode::Pictionary
                },
            },
            ("begin", _) => Command::BeginRound,
            ("guess", Some(word)) => Command::SubmitGuess {
                value: word.to_string(),
            },
            ("skip", _) => Command::Skip,
            ("end", _) => Command::EndGame,
            ("finish", _) => Command::FinishGame,
            ("category", Some(name)) => Command::SetCategory {
                name: name.to_string(),
            },
            ("seconds", Some(n)) => match n.parse() {
                Ok(secs) => Command::SetRoundSeconds { secs },
                Err(_) => {
                    println!("seconds takes a number");
                    continue;
                }
            },
            ("status", _) => Command::Report,
            ("quit", _) => {
                let _ = tx.send(Command::Shutdown).await;
                break;
            }
            ("", _) => continue,
            (other, _) => {
                println!("unknown command '{}'", other);
                continue;
            }
        };
        if tx.send(cmd).await.is_err() {
            break;
        }
    }
    Ok(())
}
