//! TCP wiring for a hosted session: peers connect to the host by address,
//! introduce themselves with a `Hello` frame, then exchange opaque snapshot
//! frames. The host merges every inbound snapshot into its own session and
//! relays the raw blob to the other peers. Peer discovery is out of scope;
//! participants are expected to know the host's address.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use sketchparty_core::snapshot::{framed_transport, recv_frame};

use crate::session::{Broadcast, Command};

/// First frame a connecting peer sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    pub name: String,
}

/// Outbound channels of all connected peers, keyed by display name.
#[derive(Default)]
pub struct PeerRegistry {
    peers: Mutex<HashMap<String, mpsc::Sender<Bytes>>>,
}

impl PeerRegistry {
    /// Register a peer's outbound channel. Returns false if the name is
    /// already taken (display names double as identity keys).
    fn register(&self, name: &str, tx: mpsc::Sender<Bytes>) -> bool {
        let mut peers = self.peers.lock().unwrap();
        if peers.contains_key(name) {
            return false;
        }
        peers.insert(name.to_string(), tx);
        true
    }

    fn unregister(&self, name: &str) {
        self.peers.lock().unwrap().remove(name);
    }

    /// Forward a blob from one peer to every other peer.
    pub fn relay_from(&self, sender: &str, blob: &Bytes) {
        let peers = self.peers.lock().unwrap();
        for (name, tx) in peers.iter() {
            if name == sender {
                continue;
            }
            if tx.try_send(blob.clone()).is_err() {
                tracing::warn!("outbound queue full, dropping frame for '{}'", name);
            }
        }
    }

    fn send_to_all(&self, blob: &Bytes) {
        let peers = self.peers.lock().unwrap();
        for (name, tx) in peers.iter() {
            if tx.try_send(blob.clone()).is_err() {
                tracing::warn!("outbound queue full, dropping frame for '{}'", name);
            }
        }
    }
}

/// Broadcast capability backed by the peer registry. TCP only has the
/// reliable flavor; the flag is accepted for interface compatibility.
pub struct MeshBroadcast {
    registry: Arc<PeerRegistry>,
}

impl MeshBroadcast {
    pub fn new(registry: Arc<PeerRegistry>) -> Self {
        Self { registry }
    }
}

impl Broadcast for MeshBroadcast {
    fn broadcast(&self, blob: Bytes, _reliable: bool) {
        self.registry.send_to_all(&blob);
    }
}

pub async fn run_host(
    addr: SocketAddr,
    session_tx: mpsc::Sender<Command>,
    registry: Arc<PeerRegistry>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("hosting on {}", addr);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        tracing::info!("incoming connection from {}", peer_addr);
        let session_tx = session_tx.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_peer(stream, session_tx, registry).await {
                tracing::warn!("peer connection from {} ended: {}", peer_addr, e);
            }
        });
    }
}

async fn handle_peer(
    stream: TcpStream,
    session_tx: mpsc::Sender<Command>,
    registry: Arc<PeerRegistry>,
) -> anyhow::Result<()> {
    let mut transport = framed_transport(stream);

    let hello: Hello = match recv_frame(&mut transport).await? {
        Some(frame) => serde_json::from_slice(&frame)?,
        None => return Ok(()),
    };
    let name = hello.name;

    let (tx, mut rx) = mpsc::channel::<Bytes>(64);
    if !registry.register(&name, tx) {
        tracing::warn!("rejecting duplicate peer name '{}'", name);
        return Ok(());
    }
    tracing::info!("peer '{}' joined", name);
    session_tx
        .send(Command::PeerConnected { name: name.clone() })
        .await?;

    let (mut sink, mut frames) = transport.split();

    let write_task = tokio::spawn(async move {
        while let Some(blob) = rx.recv().await {
            if sink.send(blob).await.is_err() {
                break;
            }
        }
    });

    loop {
        match frames.next().await {
            Some(Ok(frame)) => {
                let blob = frame.freeze();
                // Everyone else sees the peer's snapshot too; the host is a
                // relay, not a gatekeeper.
                registry.relay_from(&name, &blob);
                session_tx
                    .send(Command::SnapshotReceived {
                        blob,
                        from: name.clone(),
                    })
                    .await?;
            }
            Some(Err(e)) => {
                tracing::warn!("read error from '{}': {}", name, e);
                break;
            }
            None => break,
        }
    }

    tracing::info!("peer '{}' left", name);
    registry.unregister(&name);
    let _ = session_tx
        .send(Command::PeerDisconnected { name })
        .await;
    write_task.abort();
    Ok(())
}
