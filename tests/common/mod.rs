#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for Poison Grape Client integration tests.
//!
//! Provides a channel-based [`MockTransport`] and helper functions for
//! constructing common server message JSON strings.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use poison_grape_client::protocol::{CellIndex, PlayerId, ServerMessage};
use poison_grape_client::{GrapeClientError, Transport};

// ── MockTransport ───────────────────────────────────────────────────

/// A channel-based mock transport for integration testing.
///
/// Scripted server responses are consumed in order by `recv()`.
/// All messages sent by the client are recorded in `sent`.
pub struct MockTransport {
    /// Scripted server responses (consumed in order by `recv`).
    incoming: VecDeque<Option<Result<String, GrapeClientError>>>,
    /// Recorded outgoing messages from the client.
    pub sent: Arc<StdMutex<Vec<String>>>,
    /// Whether `close()` has been called.
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a new mock transport with the given scripted incoming messages.
    ///
    /// Returns the transport plus shared handles for inspecting sent messages
    /// and whether close was called.
    pub fn new(
        incoming: Vec<Option<Result<String, GrapeClientError>>>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), GrapeClientError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, GrapeClientError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // No more scripted messages — hang forever so the transport loop
            // stays alive until quit is called.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), GrapeClientError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── JSON helper functions ───────────────────────────────────────────

/// Returns the JSON string for a `welcome` server message.
pub fn welcome_json(player_id: PlayerId, num_players: u32) -> String {
    serde_json::to_string(&ServerMessage::Welcome {
        player_id,
        num_players,
    })
    .expect("welcome_json serialization")
}

/// Returns the JSON string for an `initial_setup` server message.
pub fn initial_setup_json() -> String {
    serde_json::to_string(&ServerMessage::InitialSetup {})
        .expect("initial_setup_json serialization")
}

/// Returns the JSON string for a `poison_selection_update` server message.
pub fn poison_selection_update_json(
    selector_id: PlayerId,
    poisons_set_count: u32,
    total_players_needed: u32,
) -> String {
    serde_json::to_string(&ServerMessage::PoisonSelectionUpdate {
        selected_index: None,
        selector_id: Some(selector_id),
        poisons_set_count: Some(poisons_set_count),
        total_players_needed: Some(total_players_needed),
    })
    .expect("poison_selection_update_json serialization")
}

/// Returns the JSON string for a `start_game` server message on a board of
/// 100 cells with nothing taken.
pub fn start_game_json(poison_indices: &[CellIndex], turn: PlayerId) -> String {
    serde_json::to_string(&ServerMessage::StartGame {
        poison_indices: poison_indices.to_vec(),
        turn,
        taken: vec![false; 100],
    })
    .expect("start_game_json serialization")
}

/// Returns the JSON string for an `update` server message with the given
/// cells taken on a 100-cell board.
pub fn update_json(
    turn: PlayerId,
    taken_indices: &[CellIndex],
    last_pick: Option<(PlayerId, CellIndex)>,
) -> String {
    let mut taken = vec![false; 100];
    for &i in taken_indices {
        taken[i] = true;
    }
    serde_json::to_string(&ServerMessage::Update {
        turn,
        taken,
        last_pick_index: last_pick.map(|(_, index)| index),
        last_player_id: last_pick.map(|(player, _)| player),
    })
    .expect("update_json serialization")
}

/// Returns the JSON string for a `game_over` server message.
pub fn game_over_json(loser_ids: &[PlayerId], poison_indices: &[CellIndex]) -> String {
    serde_json::to_string(&ServerMessage::GameOver {
        loser_ids: loser_ids.to_vec(),
        poison_indices: poison_indices.to_vec(),
        poison_index_picked: None,
    })
    .expect("game_over_json serialization")
}

/// Returns the JSON string for a `draw` server message.
pub fn draw_json() -> String {
    serde_json::to_string(&ServerMessage::Draw {}).expect("draw_json serialization")
}

/// Returns the JSON string for a `player_disconnected` server message.
pub fn player_disconnected_json(disconnected_player_id: PlayerId) -> String {
    serde_json::to_string(&ServerMessage::PlayerDisconnected {
        disconnected_player_id,
    })
    .expect("player_disconnected_json serialization")
}

/// Returns the JSON string for a server `error` message.
pub fn error_json(message: &str) -> String {
    serde_json::to_string(&ServerMessage::Error {
        message: message.into(),
    })
    .expect("error_json serialization")
}
