//! Error types for the Poison Grape client.

use thiserror::Error;

use crate::protocol::CellIndex;
use crate::session::Phase;

/// Errors that can occur when using the Poison Grape client.
#[derive(Debug, Error)]
pub enum GrapeClientError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires an active connection, but the client is not connected.
    #[error("not connected to server")]
    NotConnected,

    /// Attempted a game action before the server's `welcome` created a session.
    #[error("no active game session")]
    NoSession,

    /// The server reported an error message.
    #[error("server error: {message}")]
    ServerError {
        /// Human-readable error message from the server.
        message: String,
    },

    /// A local action failed its precondition check; nothing was sent.
    #[error("action rejected: {0}")]
    Rejected(#[from] ActionError),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Precondition violations for the local actions `choose_poison` and
/// `pick_cell`.
///
/// These are optimistic pre-checks of server-side rules: a rejected action
/// sends nothing over the wire, and the server remains the authority for
/// anything the client cannot see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The action is not available in the current game phase.
    #[error("action is not available in the {0:?} phase")]
    WrongPhase(Phase),

    /// A previous action is still awaiting server confirmation.
    #[error("still waiting for the server to confirm the previous action")]
    AwaitingServer,

    /// This client has already chosen its poison cell.
    #[error("poison cell already chosen")]
    PoisonAlreadyChosen,

    /// It is another player's turn.
    #[error("it is not your turn")]
    NotYourTurn,

    /// The cell index is outside the board.
    #[error("cell {0} is out of bounds")]
    OutOfBounds(CellIndex),

    /// The cell has already been taken.
    #[error("cell {0} is already taken")]
    CellTaken(CellIndex),

    /// Another player already claimed the cell as their poison.
    #[error("cell {0} is already claimed as poison")]
    CellClaimed(CellIndex),

    /// The cell is a known poison cell and cannot be picked.
    #[error("cell {0} is poisoned")]
    CellPoisoned(CellIndex),
}

/// A specialized [`Result`] type for Poison Grape client operations.
pub type Result<T> = std::result::Result<T, GrapeClientError>;
