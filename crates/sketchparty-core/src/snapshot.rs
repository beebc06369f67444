use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::game::{Answer, GameSession};

/// Bump when the wire layout of [`Snapshot`] changes incompatibly. Decoding
/// rejects snapshots from a different version; the caller drops them.
pub const SNAPSHOT_VERSION: u16 = 1;

/// The full state bundle broadcast to peers after every mutating intent.
///
/// `round_seconds` is the sender's user-set round duration and is only
/// attached on game creation and periodic config syncs; receivers fall back
/// to the default duration when it is absent, including when decoding
/// snapshots from senders that never wrote the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<A> {
    pub version: u16,
    pub game: GameSession<A>,
    #[serde(default)]
    pub round_seconds: Option<u32>,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("unsupported snapshot version {got} (expected {SNAPSHOT_VERSION})")]
    Version { got: u16 },
}

impl<A: Answer> Snapshot<A> {
    pub fn new(game: GameSession<A>, round_seconds: Option<u32>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            game,
            round_seconds,
            sent_at: Utc::now(),
        }
    }

    pub fn encode(&self) -> Result<Bytes, SnapshotError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(data: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_slice(data)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                got: snapshot.version,
            });
        }
        Ok(snapshot)
    }
}

// -- Framing --

pub type Transport = Framed<TcpStream, LengthDelimitedCodec>;

pub fn framed_transport(stream: TcpStream) -> Transport {
    LengthDelimitedCodec::builder()
        .max_frame_length(256 * 1024)
        .new_framed(stream)
}

pub async fn send_frame(transport: &mut Transport, bytes: Bytes) -> anyhow::Result<()> {
    transport
        .send(bytes)
        .await
        .map_err(|e| anyhow::anyhow!("send error: {}", e))
}

pub async fn recv_frame(transport: &mut Transport) -> anyhow::Result<Option<Bytes>> {
    match transport.next().await {
        Some(Ok(frame)) => Ok(Some(frame.freeze())),
        Some(Err(e)) => Err(anyhow::anyhow!("recv error: {}", e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameMode, GameState};
    use crate::player::{Guess, Role};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn session() -> GameSession<String> {
        let mut s = GameSession::new(vec![
            "cat".to_string(),
            "dog".to_string(),
            "fish".to_string(),
        ]);
        s.add_player("Alice", Role::Spectator).unwrap();
        s.add_player("Bob", Role::Spectator).unwrap();
        s.add_player("Carol", Role::Spectator).unwrap();
        s
    }

    #[test]
    fn test_round_trip_lobby() {
        let snap = Snapshot::new(session(), Some(60));
        let bytes = snap.encode().unwrap();
        let decoded: Snapshot<String> = Snapshot::decode(&bytes).unwrap();

        assert_eq!(decoded.version, SNAPSHOT_VERSION);
        assert_eq!(decoded.round_seconds, Some(60));
        assert!(matches!(decoded.game.state(), GameState::WaitingToBegin));
        assert_eq!(decoded.game.players().len(), 3);
    }

    #[test]
    fn test_round_trip_nested_transition() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut s = session();
        s.create_game(Some(3), GameMode::Pictionary, &mut rng)
            .unwrap();

        let bytes = Snapshot::new(s.clone(), None).encode().unwrap();
        let decoded: Snapshot<String> = Snapshot::decode(&bytes).unwrap();

        match decoded.game.state() {
            GameState::Transition { prev_answer, next } => {
                assert!(prev_answer.is_none());
                assert!(matches!(next.as_ref(), GameState::Playing { round: 1, .. }));
            }
            other => panic!("expected transition, got {:?}", other),
        }
        assert_eq!(decoded.game.current_drawer(), s.current_drawer());
    }

    #[test]
    fn test_round_trip_mid_round_with_guesses() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut s = session();
        s.create_game(Some(3), GameMode::Pictionary, &mut rng)
            .unwrap();
        s.begin_round().unwrap();
        let guesser = s
            .players()
            .iter()
            .find(|p| p.is_guesser())
            .cloned()
            .unwrap();
        s.submit_guess(Guess::new(guesser, "nope".into()), &mut rng)
            .unwrap();

        let bytes = Snapshot::new(s.clone(), None).encode().unwrap();
        let decoded: Snapshot<String> = Snapshot::decode(&bytes).unwrap();

        assert_eq!(decoded.game.guesses().len(), 1);
        assert_eq!(decoded.game.guesses()[0].id, s.guesses()[0].id);
        assert_eq!(decoded.game.current_answer(), s.current_answer());
    }

    #[test]
    fn test_round_trip_game_over_payload() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut s = session();
        s.create_game(Some(1), GameMode::Pictionary, &mut rng)
            .unwrap();
        s.begin_round().unwrap();
        s.time_expired(&mut rng).unwrap();
        assert!(matches!(s.state(), GameState::GameOver { .. }));

        let bytes = Snapshot::new(s.clone(), None).encode().unwrap();
        let decoded: Snapshot<String> = Snapshot::decode(&bytes).unwrap();
        assert_eq!(decoded.game.prev_answer(), s.prev_answer());
    }

    #[test]
    fn test_missing_round_seconds_defaults_to_none() {
        // A sender that never wrote the optional field.
        let bytes = Snapshot::new(session(), None).encode().unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value.as_object_mut().unwrap().remove("round_seconds");
        let stripped = serde_json::to_vec(&value).unwrap();

        let decoded: Snapshot<String> = Snapshot::decode(&stripped).unwrap();
        assert_eq!(decoded.round_seconds, None);
    }

    #[test]
    fn test_wrong_version_rejected() {
        let mut snap = Snapshot::new(session(), None);
        snap.version = SNAPSHOT_VERSION + 1;
        let bytes = snap.encode().unwrap();
        assert!(matches!(
            Snapshot::<String>::decode(&bytes),
            Err(SnapshotError::Version { .. })
        ));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(matches!(
            Snapshot::<String>::decode(b"not a snapshot"),
            Err(SnapshotError::Codec(_))
        ));
    }
}
