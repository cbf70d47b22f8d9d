#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration-style client tests for the Poison Grape Client.
//!
//! Uses the shared `MockTransport` from `tests/common` to script server
//! responses and verify that `GrapeClient` processes them correctly:
//! phase transitions, optimistic input locking, outbound message
//! generation, and event delivery across whole games.

mod common;

use poison_grape_client::protocol::ClientMessage;
use poison_grape_client::{
    ActionError, CellState, GameOutcome, GrapeClient, GrapeClientConfig, GrapeClientError,
    GrapeEvent, Phase, StatusLine,
};

use common::{
    draw_json, error_json, game_over_json, initial_setup_json, player_disconnected_json,
    poison_selection_update_json, start_game_json, update_json, welcome_json, MockTransport,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

/// Start a client with the given scripted server responses.
#[allow(clippy::type_complexity)]
fn start_client(
    incoming: Vec<Option<Result<String, GrapeClientError>>>,
) -> (
    GrapeClient,
    tokio::sync::mpsc::Receiver<GrapeEvent>,
    std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    std::sync::Arc<std::sync::atomic::AtomicBool>,
) {
    let (transport, sent, closed) = MockTransport::new(incoming);
    let (client, events) = GrapeClient::start(transport, GrapeClientConfig::new());
    (client, events, sent, closed)
}

/// Consume events up to and including the `Welcome` event.
async fn drain_until_welcome(rx: &mut tokio::sync::mpsc::Receiver<GrapeEvent>) {
    let ev = rx.recv().await.expect("expected Connected event");
    assert!(
        matches!(ev, GrapeEvent::Connected),
        "first event should be Connected, got {ev:?}"
    );
    let ev = rx.recv().await.expect("expected Welcome event");
    assert!(
        matches!(ev, GrapeEvent::Welcome { .. }),
        "second event should be Welcome, got {ev:?}"
    );
}

// ════════════════════════════════════════════════════════════════════
// Full game: poison selection → play → win
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn full_game_flow_to_win() {
    let (mut client, mut events, sent, _closed) = start_client(vec![
        Some(Ok(welcome_json(0, 2))),
        Some(Ok(initial_setup_json())),
        Some(Ok(poison_selection_update_json(1, 1, 2))),
        Some(Ok(start_game_json(&[5, 47], 0))),
        Some(Ok(update_json(1, &[3], Some((0, 3))))),
        Some(Ok(game_over_json(&[1], &[5, 47]))),
    ]);

    drain_until_welcome(&mut events).await;

    let ev = events.recv().await.expect("event");
    assert_eq!(ev, GrapeEvent::PoisonSelectionStarted);

    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GrapeEvent::PoisonSelectionProgress {
            chosen_count: 1,
            required_count: 2
        }
    );

    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GrapeEvent::GameStarted {
            current_turn: 0,
            poison_count: 2
        }
    );

    let ev = events.recv().await.expect("event");
    assert!(matches!(ev, GrapeEvent::BoardUpdated { current_turn: 1, .. }));

    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GrapeEvent::GameEnded {
            outcome: GameOutcome::Won { loser_ids: vec![1] }
        }
    );

    // Terminal state: poison revealed, nothing selectable.
    let session = client.session().await.expect("session");
    assert_eq!(session.phase(), Phase::Terminal);
    assert_eq!(session.board().cell(5), Some(CellState::PoisonRevealed));
    assert_eq!(session.board().cell(47), Some(CellState::PoisonRevealed));

    let view = client.board_view().await.expect("view");
    assert!(view.cells.iter().all(|c| !c.enabled));
    assert_eq!(
        view.status,
        StatusLine::GameOver {
            outcome: GameOutcome::Won { loser_ids: vec![1] }
        }
    );

    // The client never sent anything unprompted.
    assert!(sent.lock().unwrap().is_empty());

    client.quit().await;
}

// ════════════════════════════════════════════════════════════════════
// Draw and abort endings
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn draw_ends_game_without_reveal() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(welcome_json(0, 2))),
        Some(Ok(initial_setup_json())),
        Some(Ok(start_game_json(&[5, 47], 0))),
        Some(Ok(draw_json())),
    ]);

    drain_until_welcome(&mut events).await;
    let _ = events.recv().await; // PoisonSelectionStarted
    let _ = events.recv().await; // GameStarted

    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GrapeEvent::GameEnded {
            outcome: GameOutcome::Draw
        }
    );

    let session = client.session().await.expect("session");
    assert_eq!(session.phase(), Phase::Terminal);
    // A draw reveals nothing.
    assert!(session
        .board()
        .iter()
        .all(|c| c != CellState::PoisonRevealed));

    client.quit().await;
}

#[tokio::test]
async fn opponent_disconnect_aborts_in_lobby() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(welcome_json(0, 2))),
        Some(Ok(player_disconnected_json(1))),
    ]);

    drain_until_welcome(&mut events).await;

    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GrapeEvent::GameEnded {
            outcome: GameOutcome::Aborted {
                disconnected_player_id: 1
            }
        }
    );
    assert_eq!(client.phase().await, Some(Phase::Terminal));

    client.quit().await;
}

// ════════════════════════════════════════════════════════════════════
// Server errors leave the phase unchanged
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn server_error_is_surfaced_without_phase_change() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(welcome_json(0, 2))),
        Some(Ok(initial_setup_json())),
        Some(Ok(error_json("cell already poisoned"))),
    ]);

    drain_until_welcome(&mut events).await;
    let _ = events.recv().await; // PoisonSelectionStarted

    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GrapeEvent::ServerError {
            message: "cell already poisoned".into()
        }
    );
    assert_eq!(client.phase().await, Some(Phase::PoisonSelection));

    client.quit().await;
}

// ════════════════════════════════════════════════════════════════════
// Protocol violations are ignored
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn out_of_phase_messages_are_ignored() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(welcome_json(0, 2))),
        // update in Lobby is not in the transition table.
        Some(Ok(update_json(0, &[1, 2], None))),
        // Neither is start_game (it must not skip PoisonSelection).
        Some(Ok(start_game_json(&[5], 0))),
        Some(Ok(initial_setup_json())),
    ]);

    drain_until_welcome(&mut events).await;

    // The next event is PoisonSelectionStarted — the two violating
    // messages produced nothing.
    let ev = events.recv().await.expect("event");
    assert_eq!(ev, GrapeEvent::PoisonSelectionStarted);

    let session = client.session().await.expect("session");
    assert_eq!(session.phase(), Phase::PoisonSelection);
    assert!(session.board().iter().all(|c| c == CellState::Free));

    client.quit().await;
}

#[tokio::test]
async fn messages_before_welcome_are_ignored() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(initial_setup_json())),
        Some(Ok(welcome_json(0, 2))),
    ]);

    // Connected, then Welcome — the premature initial_setup was dropped.
    drain_until_welcome(&mut events).await;
    assert_eq!(client.phase().await, Some(Phase::Lobby));

    client.quit().await;
}

// ════════════════════════════════════════════════════════════════════
// Optimistic locking across the wire
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn poison_choice_is_sent_once_and_confirmed_by_start_game() {
    let (transport, sent, _closed) = MockTransport::new(vec![
        Some(Ok(welcome_json(0, 2))),
        Some(Ok(initial_setup_json())),
    ]);
    let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

    drain_until_welcome(&mut events).await;
    let _ = events.recv().await; // PoisonSelectionStarted

    client.choose_poison(5).await.expect("choose_poison");

    // Property: after the local choice, no further poison_select can be
    // produced for the remainder of the phase.
    for index in [5, 6, 7] {
        let err = client.choose_poison(index).await.unwrap_err();
        assert!(matches!(
            err,
            GrapeClientError::Rejected(ActionError::AwaitingServer)
        ));
    }

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    {
        let messages = sent.lock().unwrap();
        assert_eq!(messages.len(), 1, "exactly one outbound poison_select");
        let msg: ClientMessage = serde_json::from_str(&messages[0]).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::PoisonSelect {
                player_id: 0,
                index: 5
            }
        ));
    }

    client.quit().await;
}

#[tokio::test]
async fn pick_is_locked_until_next_update() {
    let (transport, sent, _closed) = MockTransport::new(vec![
        Some(Ok(welcome_json(0, 2))),
        Some(Ok(initial_setup_json())),
        Some(Ok(start_game_json(&[5, 47], 0))),
    ]);
    let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

    drain_until_welcome(&mut events).await;
    let _ = events.recv().await; // PoisonSelectionStarted
    let _ = events.recv().await; // GameStarted

    client.pick_cell(3).await.expect("pick_cell");
    let err = client.pick_cell(4).await.unwrap_err();
    assert!(matches!(
        err,
        GrapeClientError::Rejected(ActionError::AwaitingServer)
    ));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    {
        let messages = sent.lock().unwrap();
        assert_eq!(messages.len(), 1);
        let msg: ClientMessage = serde_json::from_str(&messages[0]).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::PickSelect {
                player_id: 0,
                index: 3
            }
        ));
    }

    // The pick was not applied locally — cell 3 is still free.
    let session = client.session().await.expect("session");
    assert_eq!(session.board().cell(3), Some(CellState::Free));

    client.quit().await;
}

#[tokio::test]
async fn pick_preconditions_never_send_for_taken_or_off_turn() {
    let (transport, sent, _closed) = MockTransport::new(vec![
        Some(Ok(welcome_json(0, 2))),
        Some(Ok(initial_setup_json())),
        Some(Ok(start_game_json(&[5], 1))),
        Some(Ok(update_json(0, &[3], Some((1, 3))))),
    ]);
    let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

    drain_until_welcome(&mut events).await;
    let _ = events.recv().await; // PoisonSelectionStarted
    let _ = events.recv().await; // GameStarted (opponent's turn)
    let _ = events.recv().await; // BoardUpdated (our turn, cell 3 taken)

    // Taken cell → rejected locally.
    let err = client.pick_cell(3).await.unwrap_err();
    assert!(matches!(
        err,
        GrapeClientError::Rejected(ActionError::CellTaken(3))
    ));
    // Known poison → rejected locally.
    let err = client.pick_cell(5).await.unwrap_err();
    assert!(matches!(
        err,
        GrapeClientError::Rejected(ActionError::CellPoisoned(5))
    ));

    assert!(sent.lock().unwrap().is_empty());

    client.quit().await;
}

// ════════════════════════════════════════════════════════════════════
// Board mirroring across multiple updates
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn board_always_equals_last_server_taken_array() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(welcome_json(0, 2))),
        Some(Ok(initial_setup_json())),
        Some(Ok(start_game_json(&[5, 47], 0))),
        Some(Ok(update_json(1, &[0], Some((0, 0))))),
        Some(Ok(update_json(0, &[0, 9], Some((1, 9))))),
    ]);

    drain_until_welcome(&mut events).await;
    let _ = events.recv().await; // PoisonSelectionStarted
    let _ = events.recv().await; // GameStarted
    let _ = events.recv().await; // BoardUpdated
    let ev = events.recv().await.expect("event"); // BoardUpdated
    assert!(matches!(ev, GrapeEvent::BoardUpdated { current_turn: 0, .. }));

    let session = client.session().await.expect("session");
    assert_eq!(session.board().cell(0), Some(CellState::Taken));
    assert_eq!(session.board().cell(9), Some(CellState::Taken));
    assert_eq!(session.board().cell(1), Some(CellState::Free));
    assert!(session.is_local_turn());

    client.quit().await;
}

// ════════════════════════════════════════════════════════════════════
// Quit and disconnect
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn quit_closes_transport_and_delivers_final_disconnected() {
    let (mut client, mut events, _sent, closed) =
        start_client(vec![Some(Ok(welcome_json(0, 2)))]);

    drain_until_welcome(&mut events).await;

    client.quit().await;

    let ev = events.recv().await.expect("event");
    assert!(matches!(ev, GrapeEvent::Disconnected { .. }));
    assert!(closed.load(std::sync::atomic::Ordering::Relaxed));
    assert!(!client.is_connected());
    assert!(client.session().await.is_none());
}

#[tokio::test]
async fn server_close_mid_game_destroys_session() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(welcome_json(0, 2))),
        Some(Ok(initial_setup_json())),
        None, // server closes the connection
    ]);

    drain_until_welcome(&mut events).await;
    let _ = events.recv().await; // PoisonSelectionStarted

    let ev = events.recv().await.expect("event");
    assert!(matches!(ev, GrapeEvent::Disconnected { reason: None }));
    assert!(!client.is_connected());
    assert!(client.session().await.is_none());

    // Actions after disconnect fail fast, fire-and-forget style.
    let err = client.choose_poison(1).await.unwrap_err();
    assert!(matches!(err, GrapeClientError::NotConnected));

    client.quit().await;
}
