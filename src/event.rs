//! Typed events emitted by the client to the UI layer.
//!
//! Events arrive on the bounded channel returned from
//! [`GrapeClient::start`](crate::client::GrapeClient::start). Most are
//! produced by [`Session`](crate::session::Session) transitions;
//! `Connected`, `ActionTimedOut` and `Disconnected` are synthesized by the
//! transport loop.

use crate::protocol::{CellIndex, PlayerId};
use crate::session::{GameOutcome, PendingAction};

/// The most recent pick reported in an `update` message, for turn logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastPick {
    /// Player who made the pick.
    pub player_id: PlayerId,
    /// Cell that was picked.
    pub index: CellIndex,
}

/// Events emitted by [`GrapeClient`](crate::client::GrapeClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrapeEvent {
    /// The transport is up. Always the first event.
    Connected,
    /// The server assigned this client an identity; the session now exists.
    Welcome {
        player_id: PlayerId,
        num_players: u32,
    },
    /// Poison Selection began: pick a cell to poison.
    PoisonSelectionStarted,
    /// Another step of Poison Selection completed.
    PoisonSelectionProgress {
        chosen_count: u32,
        required_count: u32,
    },
    /// All poisons are set; Play began.
    GameStarted {
        current_turn: PlayerId,
        poison_count: usize,
    },
    /// Authoritative board/turn update during Play.
    BoardUpdated {
        current_turn: PlayerId,
        /// Present when the server reported who picked what.
        last_pick: Option<LastPick>,
    },
    /// The session reached the Terminal phase.
    GameEnded { outcome: GameOutcome },
    /// The server reported an error; the game phase is unchanged.
    ServerError { message: String },
    /// A sent action was never confirmed within the configured timeout.
    /// The optimistic input lock has been released; the action may be retried.
    ActionTimedOut { action: PendingAction },
    /// The transport closed. Always the last event.
    Disconnected { reason: Option<String> },
}
