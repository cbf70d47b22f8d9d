//! # Scripted Match Demo
//!
//! Shows how to implement the [`Transport`] trait with a simple in-process
//! loopback channel, then drives a complete game against a scripted
//! "server". This is useful for:
//!
//! - **Testing** — exercise your game UI without a real server
//! - **Custom backends** — adapt any I/O layer (TCP, QUIC, WebRTC data channels)
//!
//! ## Running
//!
//! ```sh
//! cargo run --example scripted_match
//! ```

use async_trait::async_trait;
use poison_grape_client::protocol::{ClientMessage, ServerMessage};
use poison_grape_client::{
    GrapeClient, GrapeClientConfig, GrapeClientError, GrapeEvent, Transport,
};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: Define a channel-based "loopback" transport
// ─────────────────────────────────────────────────────────────────────

/// A loopback transport that shuttles messages through in-process channels.
///
/// The **client half** (`LoopbackTransport`) implements [`Transport`] and is
/// handed to `GrapeClient::start`; the **server half** (`LoopbackServer`)
/// lets this demo play the authoritative side of the protocol.
struct LoopbackTransport {
    /// Messages the client sends go here (server reads from the other end).
    tx: mpsc::UnboundedSender<String>,
    /// Messages the server sends arrive here (client reads them).
    rx: mpsc::UnboundedReceiver<String>,
}

/// The "server side" of the loopback — use this to drive the conversation.
struct LoopbackServer {
    /// Read what the client sent.
    rx: mpsc::UnboundedReceiver<String>,
    /// Send messages to the client (as if they came from a server).
    tx: mpsc::UnboundedSender<String>,
}

/// Create a connected `(transport, server)` pair.
fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    // Client → Server channel
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    // Server → Client channel
    let (server_tx, client_rx) = mpsc::unbounded_channel();

    let transport = LoopbackTransport {
        tx: client_tx,
        rx: client_rx,
    };
    let server = LoopbackServer {
        rx: server_rx,
        tx: server_tx,
    };
    (transport, server)
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), GrapeClientError> {
        self.tx
            .send(message)
            .map_err(|e| GrapeClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, GrapeClientError>> {
        // `mpsc::Receiver::recv` is cancel-safe, as `Transport` requires.
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), GrapeClientError> {
        self.rx.close();
        Ok(())
    }
}

impl LoopbackServer {
    fn send(&self, msg: &ServerMessage) {
        if let Ok(json) = serde_json::to_string(msg) {
            let _ = self.tx.send(json);
        }
    }

    async fn recv(&mut self) -> Option<ClientMessage> {
        let json = self.rx.recv().await?;
        serde_json::from_str(&json).ok()
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Script the authoritative side of a whole game
// ─────────────────────────────────────────────────────────────────────

async fn run_server(mut server: LoopbackServer) {
    // A tiny 3×3 board keeps the transcript readable.
    let cells = 9;

    server.send(&ServerMessage::Welcome {
        player_id: 0,
        num_players: 2,
    });
    server.send(&ServerMessage::InitialSetup {});

    // Wait for the local player's poison choice; player 2's happens "elsewhere".
    let Some(ClientMessage::PoisonSelect { index, .. }) = server.recv().await else {
        return;
    };
    tracing::info!("[server] player 1 poisoned cell {index}");
    server.send(&ServerMessage::PoisonSelectionUpdate {
        selected_index: None,
        selector_id: Some(1),
        poisons_set_count: Some(2),
        total_players_needed: Some(2),
    });

    // Opponent secretly poisoned cell 4.
    server.send(&ServerMessage::StartGame {
        poison_indices: vec![index, 4],
        turn: 0,
        taken: vec![false; cells],
    });

    // One local pick…
    let Some(ClientMessage::PickSelect { index: picked, .. }) = server.recv().await else {
        return;
    };
    tracing::info!("[server] player 1 picked cell {picked}");
    let mut taken = vec![false; cells];
    taken[picked] = true;
    server.send(&ServerMessage::Update {
        turn: 1,
        taken,
        last_pick_index: Some(picked),
        last_player_id: Some(0),
    });

    // …then the opponent blunders into player 1's poison.
    server.send(&ServerMessage::GameOver {
        loser_ids: vec![1],
        poison_indices: vec![index, 4],
        poison_index_picked: Some(index),
    });
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Run the client against it
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (transport, server) = loopback_pair();
    tokio::spawn(run_server(server));

    let config = GrapeClientConfig::new().with_grid_size(3);
    let (mut client, mut events) = GrapeClient::start(transport, config);

    while let Some(event) = events.recv().await {
        match event {
            GrapeEvent::Welcome { player_id, .. } => {
                tracing::info!("Welcome! You are player {}", player_id + 1);
            }
            GrapeEvent::PoisonSelectionStarted => {
                tracing::info!("Poisoning cell 7");
                client.choose_poison(7).await?;
            }
            GrapeEvent::GameStarted { .. } | GrapeEvent::BoardUpdated { .. } => {
                if let Some(session) = client.session().await {
                    if session.is_local_turn() && session.pending().is_none() {
                        if let Some(index) =
                            (0..session.board().len()).find(|&i| session.is_cell_selectable(i))
                        {
                            tracing::info!("Picking cell {index}");
                            client.pick_cell(index).await?;
                        }
                    }
                }
            }
            GrapeEvent::GameEnded { outcome } => {
                if let Some(view) = client.board_view().await {
                    tracing::info!("{}", view.status);
                }
                tracing::info!("Outcome: {outcome:?}");
                break;
            }
            GrapeEvent::Disconnected { reason } => {
                tracing::warn!("Disconnected: {reason:?}");
                break;
            }
            other => tracing::debug!("Event: {other:?}"),
        }
    }

    client.quit().await;
    Ok(())
}
