#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the Poison Grape protocol.
//!
//! Verifies round-trip serialization of every `ClientMessage` and
//! `ServerMessage` variant, the flat snake_case `"type"` tag format, the
//! draft-schema field aliases, and JSON fixtures matching real server
//! output.

use poison_grape_client::protocol::{ClientMessage, ServerMessage};

// ════════════════════════════════════════════════════════════════════
// Helper
// ════════════════════════════════════════════════════════════════════

/// Serialize `val` to JSON, then deserialize back to `T` and return it.
fn round_trip<T: serde::Serialize + serde::de::DeserializeOwned>(val: &T) -> T {
    let json = serde_json::to_string(val).expect("serialize");
    serde_json::from_str(&json).expect("deserialize")
}

// ════════════════════════════════════════════════════════════════════
// ClientMessage round-trip tests
// ════════════════════════════════════════════════════════════════════

#[test]
fn client_message_poison_select_round_trip() {
    let msg = ClientMessage::PoisonSelect {
        player_id: 0,
        index: 5,
    };
    let deser = round_trip(&msg);
    if let ClientMessage::PoisonSelect { player_id, index } = deser {
        assert_eq!(player_id, 0);
        assert_eq!(index, 5);
    } else {
        panic!("expected PoisonSelect variant");
    }
}

#[test]
fn client_message_pick_select_round_trip() {
    let msg = ClientMessage::PickSelect {
        player_id: 1,
        index: 42,
    };
    let deser = round_trip(&msg);
    if let ClientMessage::PickSelect { player_id, index } = deser {
        assert_eq!(player_id, 1);
        assert_eq!(index, 42);
    } else {
        panic!("expected PickSelect variant");
    }
}

// ════════════════════════════════════════════════════════════════════
// ServerMessage round-trip tests
// ════════════════════════════════════════════════════════════════════

#[test]
fn server_message_welcome_round_trip() {
    let msg = ServerMessage::Welcome {
        player_id: 2,
        num_players: 4,
    };
    let deser = round_trip(&msg);
    if let ServerMessage::Welcome {
        player_id,
        num_players,
    } = deser
    {
        assert_eq!(player_id, 2);
        assert_eq!(num_players, 4);
    } else {
        panic!("expected Welcome variant");
    }
}

#[test]
fn server_message_initial_setup_round_trip() {
    let msg = ServerMessage::InitialSetup {};
    let deser = round_trip(&msg);
    assert!(matches!(deser, ServerMessage::InitialSetup {}));
}

#[test]
fn server_message_poison_selection_update_round_trip() {
    let msg = ServerMessage::PoisonSelectionUpdate {
        selected_index: Some(9),
        selector_id: Some(1),
        poisons_set_count: Some(1),
        total_players_needed: Some(2),
    };
    let deser = round_trip(&msg);
    if let ServerMessage::PoisonSelectionUpdate {
        selected_index,
        selector_id,
        poisons_set_count,
        total_players_needed,
    } = deser
    {
        assert_eq!(selected_index, Some(9));
        assert_eq!(selector_id, Some(1));
        assert_eq!(poisons_set_count, Some(1));
        assert_eq!(total_players_needed, Some(2));
    } else {
        panic!("expected PoisonSelectionUpdate variant");
    }
}

#[test]
fn server_message_start_game_round_trip() {
    let msg = ServerMessage::StartGame {
        poison_indices: vec![3, 47],
        turn: 0,
        taken: vec![false, true, false],
    };
    let deser = round_trip(&msg);
    if let ServerMessage::StartGame {
        poison_indices,
        turn,
        taken,
    } = deser
    {
        assert_eq!(poison_indices, vec![3, 47]);
        assert_eq!(turn, 0);
        assert_eq!(taken, vec![false, true, false]);
    } else {
        panic!("expected StartGame variant");
    }
}

#[test]
fn server_message_update_round_trip() {
    let msg = ServerMessage::Update {
        turn: 1,
        taken: vec![true, false],
        last_pick_index: Some(0),
        last_player_id: Some(0),
    };
    let deser = round_trip(&msg);
    if let ServerMessage::Update {
        turn,
        taken,
        last_pick_index,
        last_player_id,
    } = deser
    {
        assert_eq!(turn, 1);
        assert_eq!(taken, vec![true, false]);
        assert_eq!(last_pick_index, Some(0));
        assert_eq!(last_player_id, Some(0));
    } else {
        panic!("expected Update variant");
    }
}

#[test]
fn server_message_game_over_round_trip() {
    let msg = ServerMessage::GameOver {
        loser_ids: vec![1],
        poison_indices: vec![3, 47],
        poison_index_picked: Some(47),
    };
    let deser = round_trip(&msg);
    if let ServerMessage::GameOver {
        loser_ids,
        poison_indices,
        poison_index_picked,
    } = deser
    {
        assert_eq!(loser_ids, vec![1]);
        assert_eq!(poison_indices, vec![3, 47]);
        assert_eq!(poison_index_picked, Some(47));
    } else {
        panic!("expected GameOver variant");
    }
}

#[test]
fn server_message_draw_round_trip() {
    let msg = ServerMessage::Draw {};
    let deser = round_trip(&msg);
    assert!(matches!(deser, ServerMessage::Draw {}));
}

#[test]
fn server_message_player_disconnected_round_trip() {
    let msg = ServerMessage::PlayerDisconnected {
        disconnected_player_id: 1,
    };
    let deser = round_trip(&msg);
    if let ServerMessage::PlayerDisconnected {
        disconnected_player_id,
    } = deser
    {
        assert_eq!(disconnected_player_id, 1);
    } else {
        panic!("expected PlayerDisconnected variant");
    }
}

#[test]
fn server_message_error_round_trip() {
    let msg = ServerMessage::Error {
        message: "not your turn".into(),
    };
    let deser = round_trip(&msg);
    if let ServerMessage::Error { message } = deser {
        assert_eq!(message, "not your turn");
    } else {
        panic!("expected Error variant");
    }
}

// ════════════════════════════════════════════════════════════════════
// Tag format verification (flat objects, snake_case type tags)
// ════════════════════════════════════════════════════════════════════

#[test]
fn client_message_uses_flat_snake_case_tag() {
    let msg = ClientMessage::PoisonSelect {
        player_id: 0,
        index: 5,
    };
    let json = serde_json::to_string(&msg).expect("serialize");
    let val: serde_json::Value = serde_json::from_str(&json).expect("parse");
    assert_eq!(val["type"], "poison_select");
    // Fields are inline next to the tag — there is no "data" wrapper.
    assert!(val.get("data").is_none());
    assert_eq!(val["player_id"], 0);
    assert_eq!(val["index"], 5);
}

#[test]
fn server_message_uses_flat_snake_case_tag() {
    let msg = ServerMessage::Welcome {
        player_id: 0,
        num_players: 2,
    };
    let json = serde_json::to_string(&msg).expect("serialize");
    let val: serde_json::Value = serde_json::from_str(&json).expect("parse");
    assert_eq!(val["type"], "welcome");
    assert!(val.get("data").is_none());
    assert_eq!(val["player_id"], 0);
    assert_eq!(val["num_players"], 2);
}

#[test]
fn empty_messages_serialize_to_bare_tag() {
    let json = serde_json::to_string(&ServerMessage::InitialSetup {}).expect("serialize");
    assert_eq!(json, r#"{"type":"initial_setup"}"#);

    let json = serde_json::to_string(&ServerMessage::Draw {}).expect("serialize");
    assert_eq!(json, r#"{"type":"draw"}"#);
}

// ════════════════════════════════════════════════════════════════════
// Server JSON fixtures (simulate real server output)
// ════════════════════════════════════════════════════════════════════

#[test]
fn fixture_welcome_from_server() {
    let json = r#"{"type": "welcome", "player_id": 0, "num_players": 2}"#;
    let msg: ServerMessage = serde_json::from_str(json).expect("deserialize");
    if let ServerMessage::Welcome {
        player_id,
        num_players,
    } = msg
    {
        assert_eq!(player_id, 0);
        assert_eq!(num_players, 2);
    } else {
        panic!("expected welcome");
    }
}

#[test]
fn fixture_initial_setup_with_draft_flag() {
    // One draft schema carried a boolean flag here; it must be ignored.
    let json = r#"{"type": "initial_setup", "poison_selection_phase": true}"#;
    let msg: ServerMessage = serde_json::from_str(json).expect("deserialize");
    assert!(matches!(msg, ServerMessage::InitialSetup {}));
}

#[test]
fn fixture_poison_selection_update_minimal() {
    // Servers may disclose nothing beyond the fact that selection advanced.
    let json = r#"{"type": "poison_selection_update"}"#;
    let msg: ServerMessage = serde_json::from_str(json).expect("deserialize");
    if let ServerMessage::PoisonSelectionUpdate {
        selected_index,
        selector_id,
        poisons_set_count,
        total_players_needed,
    } = msg
    {
        assert!(selected_index.is_none());
        assert!(selector_id.is_none());
        assert!(poisons_set_count.is_none());
        assert!(total_players_needed.is_none());
    } else {
        panic!("expected poison_selection_update");
    }
}

#[test]
fn fixture_poison_selection_update_draft_selector_field() {
    // Draft name `player_who_chose` maps onto the canonical `selector_id`.
    let json = r#"{
        "type": "poison_selection_update",
        "player_who_chose": 1,
        "poisons_set_count": 1,
        "total_players_needed": 2
    }"#;
    let msg: ServerMessage = serde_json::from_str(json).expect("deserialize");
    if let ServerMessage::PoisonSelectionUpdate {
        selector_id,
        poisons_set_count,
        ..
    } = msg
    {
        assert_eq!(selector_id, Some(1));
        assert_eq!(poisons_set_count, Some(1));
    } else {
        panic!("expected poison_selection_update");
    }
}

#[test]
fn fixture_start_game_from_server() {
    let json = r#"{
        "type": "start_game",
        "poison_indices": [5, 47],
        "turn": 1,
        "taken": [false, false, true]
    }"#;
    let msg: ServerMessage = serde_json::from_str(json).expect("deserialize");
    if let ServerMessage::StartGame {
        poison_indices,
        turn,
        taken,
    } = msg
    {
        assert_eq!(poison_indices, vec![5, 47]);
        assert_eq!(turn, 1);
        assert_eq!(taken, vec![false, false, true]);
    } else {
        panic!("expected start_game");
    }
}

#[test]
fn fixture_update_without_last_pick() {
    let json = r#"{"type": "update", "turn": 0, "taken": [true, false]}"#;
    let msg: ServerMessage = serde_json::from_str(json).expect("deserialize");
    if let ServerMessage::Update {
        turn,
        last_pick_index,
        last_player_id,
        ..
    } = msg
    {
        assert_eq!(turn, 0);
        assert!(last_pick_index.is_none());
        assert!(last_player_id.is_none());
    } else {
        panic!("expected update");
    }
}

#[test]
fn fixture_game_over_from_server() {
    let json = r#"{
        "type": "game_over",
        "loser_ids": [1],
        "poison_indices": [3, 47],
        "poison_index_picked": 47
    }"#;
    let msg: ServerMessage = serde_json::from_str(json).expect("deserialize");
    if let ServerMessage::GameOver {
        loser_ids,
        poison_indices,
        poison_index_picked,
    } = msg
    {
        assert_eq!(loser_ids, vec![1]);
        assert_eq!(poison_indices, vec![3, 47]);
        assert_eq!(poison_index_picked, Some(47));
    } else {
        panic!("expected game_over");
    }
}

#[test]
fn fixture_game_over_draft_poison_field() {
    // Draft name `all_poison_indices` maps onto the canonical `poison_indices`.
    let json = r#"{
        "type": "game_over",
        "loser_ids": [0, 2],
        "all_poison_indices": [10, 20, 30]
    }"#;
    let msg: ServerMessage = serde_json::from_str(json).expect("deserialize");
    if let ServerMessage::GameOver {
        loser_ids,
        poison_indices,
        poison_index_picked,
    } = msg
    {
        assert_eq!(loser_ids, vec![0, 2]);
        assert_eq!(poison_indices, vec![10, 20, 30]);
        assert!(poison_index_picked.is_none());
    } else {
        panic!("expected game_over");
    }
}

#[test]
fn fixture_player_disconnected_from_server() {
    let json = r#"{"type": "player_disconnected", "disconnected_player_id": 1}"#;
    let msg: ServerMessage = serde_json::from_str(json).expect("deserialize");
    assert!(matches!(
        msg,
        ServerMessage::PlayerDisconnected {
            disconnected_player_id: 1
        }
    ));
}

#[test]
fn fixture_error_from_server() {
    let json = r#"{"type": "error", "message": "It's not your turn."}"#;
    let msg: ServerMessage = serde_json::from_str(json).expect("deserialize");
    if let ServerMessage::Error { message } = msg {
        assert_eq!(message, "It's not your turn.");
    } else {
        panic!("expected error");
    }
}

#[test]
fn fixture_unknown_type_fails_to_parse() {
    // An unknown message type is a deserialization error; the client logs
    // and skips the frame rather than inventing a variant.
    let json = r#"{"type": "telemetry", "payload": 1}"#;
    let result = serde_json::from_str::<ServerMessage>(json);
    assert!(result.is_err());
}

// ════════════════════════════════════════════════════════════════════
// Outbound fixtures (what the server will read from this client)
// ════════════════════════════════════════════════════════════════════

#[test]
fn outbound_poison_select_matches_server_expectation() {
    let msg = ClientMessage::PoisonSelect {
        player_id: 0,
        index: 5,
    };
    let val: serde_json::Value =
        serde_json::from_str(&serde_json::to_string(&msg).expect("serialize")).expect("parse");
    assert_eq!(
        val,
        serde_json::json!({"type": "poison_select", "player_id": 0, "index": 5})
    );
}

#[test]
fn outbound_pick_select_matches_server_expectation() {
    let msg = ClientMessage::PickSelect {
        player_id: 1,
        index: 99,
    };
    let val: serde_json::Value =
        serde_json::from_str(&serde_json::to_string(&msg).expect("serialize")).expect("parse");
    assert_eq!(
        val,
        serde_json::json!({"type": "pick_select", "player_id": 1, "index": 99})
    );
}
