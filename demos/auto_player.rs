//! # Auto Player Demo
//!
//! Demonstrates a complete Poison Grape client lifecycle:
//!
//! 1. Connect to a game server via WebSocket
//! 2. Wait for the `welcome` that assigns this client a player id
//! 3. Choose a poison cell when Poison Selection begins
//! 4. Pick the first selectable cell on every turn
//! 5. Report the outcome and shut down on game end or Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! # Start a Poison Grape server on localhost:5000, then:
//! cargo run --example auto_player
//!
//! # Override the server URL:
//! POISON_GRAPE_URL=ws://my-server:5000 cargo run --example auto_player
//! ```

use poison_grape_client::{
    GrapeClient, GrapeClientConfig, GrapeEvent, Session, WebSocketTransport,
};

/// Default server URL when `POISON_GRAPE_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:5000";

/// First cell the session currently allows us to click, if any.
fn first_selectable(session: &Session) -> Option<usize> {
    (0..session.board().len()).find(|&i| session.is_cell_selectable(i))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("POISON_GRAPE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    tracing::info!("Connecting to {url}");

    // ── Connect ─────────────────────────────────────────────────────
    let transport = WebSocketTransport::connect(&url).await?;
    let (mut client, mut event_rx) =
        GrapeClient::start(transport, GrapeClientConfig::new());

    // ── Event loop ──────────────────────────────────────────────────
    // Use `tokio::select!` to listen for both server events and Ctrl+C.
    loop {
        tokio::select! {
            // Branch 1: Incoming event from the server (or transport layer).
            event = event_rx.recv() => {
                let Some(event) = event else {
                    // Channel closed — transport loop exited.
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    // ── Synthetic: transport connected ───────────────
                    GrapeEvent::Connected => {
                        tracing::info!("Transport connected, awaiting welcome…");
                    }

                    GrapeEvent::Welcome { player_id, num_players } => {
                        tracing::info!(
                            "You are player {} of {num_players}. Waiting for the game…",
                            player_id + 1
                        );
                    }

                    // ── Poison selection ─────────────────────────────
                    GrapeEvent::PoisonSelectionStarted => {
                        if let Some(session) = client.session().await {
                            if let Some(index) = first_selectable(&session) {
                                tracing::info!("Choosing cell {index} as poison");
                                client.choose_poison(index).await?;
                            }
                        }
                    }

                    GrapeEvent::PoisonSelectionProgress { chosen_count, required_count } => {
                        tracing::info!("Poisons set: {chosen_count}/{required_count}");
                    }

                    // ── Play ─────────────────────────────────────────
                    GrapeEvent::GameStarted { current_turn, poison_count } => {
                        tracing::info!(
                            "Game started with {poison_count} poison cell(s); \
                             player {} goes first",
                            current_turn + 1
                        );
                        try_pick(&client).await?;
                    }

                    GrapeEvent::BoardUpdated { current_turn, last_pick } => {
                        if let Some(pick) = last_pick {
                            tracing::info!(
                                "Player {} picked cell {}",
                                pick.player_id + 1,
                                pick.index
                            );
                        }
                        tracing::info!("Player {}'s turn", current_turn + 1);
                        try_pick(&client).await?;
                    }

                    // ── Endings ──────────────────────────────────────
                    GrapeEvent::GameEnded { outcome } => {
                        if let Some(view) = client.board_view().await {
                            tracing::info!("{}", view.status);
                        } else {
                            tracing::info!("Game ended: {outcome:?}");
                        }
                        break;
                    }

                    GrapeEvent::ServerError { message } => {
                        tracing::error!("Server error: {message}");
                    }

                    GrapeEvent::ActionTimedOut { action } => {
                        tracing::warn!("No answer for {action:?}; input unlocked, retrying");
                        try_pick(&client).await?;
                    }

                    GrapeEvent::Disconnected { reason } => {
                        tracing::warn!("Disconnected: {}", reason.as_deref().unwrap_or("unknown"));
                        break;
                    }
                }
            }

            // Branch 2: Ctrl+C — quit gracefully.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, quitting…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.quit().await;
    tracing::info!("Client shut down. Goodbye!");
    Ok(())
}

/// Pick the first selectable cell if the session allows it right now.
async fn try_pick(client: &GrapeClient) -> Result<(), Box<dyn std::error::Error>> {
    let Some(session) = client.session().await else {
        return Ok(());
    };
    if !session.is_local_turn() || session.pending().is_some() {
        return Ok(());
    }
    if let Some(index) = first_selectable(&session) {
        tracing::info!("Picking cell {index}");
        client.pick_cell(index).await?;
    }
    Ok(())
}
