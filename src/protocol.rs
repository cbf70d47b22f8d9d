//! Wire types for the Poison Grape game protocol.
//!
//! Messages travel as JSON text, one message per transport frame. Every
//! message is a flat object tagged by a snake_case `"type"` field, e.g.
//! `{"type":"welcome","player_id":0,"num_players":2}`.
//!
//! The protocol went through several draft schemas before this crate; where
//! a draft used a different field name for the same shape
//! (`all_poison_indices`, `player_who_chose`) the canonical types accept it
//! as a serde alias. Unknown fields are ignored, so drafts that carried
//! extra flags (e.g. in `initial_setup`) still decode.

use serde::{Deserialize, Serialize};

// ── Type aliases ────────────────────────────────────────────────────

/// Player identifier assigned by the server in `welcome`.
///
/// Player ids are small non-negative integers; display layers conventionally
/// render them 1-based ("Player 1").
pub type PlayerId = u32;

/// Index of a cell on the board, row-major from the top-left corner.
pub type CellIndex = usize;

// ── Messages ────────────────────────────────────────────────────────

/// Message types sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Designate a cell as this player's poison during Poison Selection.
    PoisonSelect {
        player_id: PlayerId,
        index: CellIndex,
    },
    /// Pick a cell during Play, on this player's turn.
    PickSelect {
        player_id: PlayerId,
        index: CellIndex,
    },
}

/// Message types sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message after connecting: identity and table size.
    Welcome {
        player_id: PlayerId,
        num_players: u32,
    },
    /// Poison Selection begins. Drafts carried an extra boolean flag here;
    /// any additional fields are ignored.
    InitialSetup {},
    /// Progress notification while players choose their poison cells.
    ///
    /// All fields are optional on the wire; servers differ in how much they
    /// disclose. `selected_index` (when present) lets clients pre-check
    /// that a cell is already claimed.
    PoisonSelectionUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selected_index: Option<CellIndex>,
        #[serde(
            default,
            alias = "player_who_chose",
            skip_serializing_if = "Option::is_none"
        )]
        selector_id: Option<PlayerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        poisons_set_count: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_players_needed: Option<u32>,
    },
    /// All poisons are set; Play begins.
    StartGame {
        poison_indices: Vec<CellIndex>,
        turn: PlayerId,
        taken: Vec<bool>,
    },
    /// Authoritative turn/board update during Play.
    Update {
        turn: PlayerId,
        taken: Vec<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_pick_index: Option<CellIndex>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_player_id: Option<PlayerId>,
    },
    /// A player picked poison; the game is over and all poisons are revealed.
    GameOver {
        loser_ids: Vec<PlayerId>,
        #[serde(alias = "all_poison_indices")]
        poison_indices: Vec<CellIndex>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        poison_index_picked: Option<CellIndex>,
    },
    /// Every safe cell has been picked; nobody loses.
    Draw {},
    /// A participant dropped; the session is aborted.
    PlayerDisconnected { disconnected_player_id: PlayerId },
    /// Server-reported error. Informational; does not change the game phase.
    Error { message: String },
}
