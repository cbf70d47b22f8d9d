//! # Poison Grape Client
//!
//! Transport-agnostic Rust client for the Poison Grape turn-based
//! multiplayer game protocol.
//!
//! This crate provides a high-level async client that communicates with an
//! authoritative game server using JSON text messages over any bidirectional
//! transport, and a headless session state machine that mirrors the game
//! phase (Lobby → Poison Selection → Play → Terminal) exactly as the server
//! reports it.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] trait for any backend
//! - **WebSocket built-in** — default `transport-websocket` feature provides [`WebSocketTransport`]
//! - **Event-driven** — receive typed [`GrapeEvent`]s via a channel
//! - **Headless core** — session, board, and presentation projection are
//!   pure data, testable without a server or a UI
//! - **Optimistic-lock timeout** — a sent action that goes unanswered
//!   releases the input lock instead of freezing the UI forever
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use poison_grape_client::{GrapeClient, GrapeClientConfig, GrapeEvent, WebSocketTransport};
//!
//! let transport = WebSocketTransport::connect("ws://localhost:5000").await?;
//! let (client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         GrapeEvent::PoisonSelectionStarted => client.choose_poison(5).await?,
//!         GrapeEvent::GameEnded { outcome } => println!("{outcome:?}"),
//!         GrapeEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

pub mod board;
pub mod error;
pub mod event;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod view;

// The client runs its transport loop on a tokio runtime; the headless
// modules above stay available without one (e.g. for fuzzing the protocol).
#[cfg(feature = "tokio-runtime")]
pub mod client;

#[cfg(feature = "transport-websocket")]
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use board::{Board, CellState};
#[cfg(feature = "tokio-runtime")]
pub use client::{GrapeClient, GrapeClientConfig};
pub use error::{ActionError, GrapeClientError};
pub use event::GrapeEvent;
pub use protocol::{CellIndex, ClientMessage, PlayerId, ServerMessage};
pub use session::{GameOutcome, PendingAction, Phase, PoisonSelectionProgress, Session};
pub use transport::Transport;
pub use view::{BoardView, CellHighlight, CellView, StatusLine};

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
