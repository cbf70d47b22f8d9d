//! Async client for the Poison Grape game protocol.
//!
//! [`GrapeClient`] is a thin handle that communicates with a background
//! transport loop task via an unbounded MPSC channel. Events are emitted on
//! a bounded channel ([`tokio::sync::mpsc::Receiver<GrapeEvent>`]) returned
//! from [`GrapeClient::start`]. The session state machine lives behind a
//! shared lock: the loop applies inbound messages run-to-completion, and the
//! handle's action methods validate against the same state before queueing
//! anything outbound.
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = WebSocketTransport::connect("ws://localhost:5000").await?;
//! let (client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         GrapeEvent::PoisonSelectionStarted => client.choose_poison(5).await?,
//!         GrapeEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::error::{GrapeClientError, Result};
use crate::event::GrapeEvent;
use crate::protocol::{CellIndex, ClientMessage, ServerMessage};
use crate::session::{Phase, Session};
use crate::transport::Transport;
use crate::view::BoardView;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default time to wait for the server to answer a sent action before the
/// optimistic input lock is released.
const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(10);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`GrapeClient`] connection.
///
/// All fields have sensible defaults; construct with [`GrapeClientConfig::new`]
/// and override with the builder methods.
///
/// # Example
///
/// ```
/// use poison_grape_client::client::GrapeClientConfig;
/// use std::time::Duration;
///
/// let config = GrapeClientConfig::new()
///     .with_grid_size(8)
///     .with_action_timeout(Some(Duration::from_secs(5)));
/// assert_eq!(config.grid_size, 8);
/// ```
#[derive(Debug, Clone)]
pub struct GrapeClientConfig {
    /// Side length of the board grid. The board has `grid_size²` cells.
    ///
    /// Defaults to **10** (100 cells), matching the reference server.
    pub grid_size: usize,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up with incoming server messages,
    /// events are dropped (with a warning logged) to avoid blocking the
    /// transport loop. The `Disconnected` event is always delivered
    /// regardless of capacity.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`GrapeClient::quit`] is called, the background transport loop
    /// is given this much time to close the transport and emit a final
    /// `Disconnected` event. If the timeout expires the task is aborted.
    ///
    /// Defaults to **1 second**. A zero timeout aborts the transport loop
    /// immediately without waiting for graceful shutdown.
    pub shutdown_timeout: Duration,
    /// How long a sent action may go unanswered before the optimistic input
    /// lock is released and [`GrapeEvent::ActionTimedOut`] is emitted.
    ///
    /// `None` disables the timeout, reproducing the original client's
    /// lock-forever behavior. Defaults to **10 seconds**.
    pub action_timeout: Option<Duration>,
}

impl GrapeClientConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            grid_size: crate::board::DEFAULT_GRID_SIZE,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            action_timeout: Some(DEFAULT_ACTION_TIMEOUT),
        }
    }

    /// Set the board grid side length.
    #[must_use]
    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    /// Set the capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set (or disable) the action confirmation timeout.
    #[must_use]
    pub fn with_action_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.action_timeout = timeout;
        self
    }
}

impl Default for GrapeClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// Internal shared state between the client handle and the transport loop.
struct ClientState {
    connected: AtomicBool,
    /// `None` until the server's `welcome` message creates the session.
    session: Mutex<Option<Session>>,
}

impl ClientState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            session: Mutex::new(None),
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for the Poison Grape game protocol.
///
/// Created via [`GrapeClient::start`], which spawns a background transport
/// loop and returns this handle together with an event receiver.
///
/// The action methods validate against the local session state machine
/// before anything is sent: a rejected action returns a typed error and no
/// message leaves the client. Accepted actions are queued to the transport
/// loop and return immediately (no round-trip await).
pub struct GrapeClient {
    /// Sender half of the command channel to the transport loop.
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    /// Shared state updated by the transport loop.
    state: Arc<ClientState>,
    /// Handle to the background transport loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the transport loop to shut down gracefully.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
}

impl GrapeClient {
    /// Start the client transport loop and return a handle plus event receiver.
    ///
    /// The server speaks first: the loop waits for `welcome` and creates the
    /// session from it.
    ///
    /// # Arguments
    ///
    /// * `transport` — A connected [`Transport`] implementation.
    /// * `config` — Client configuration.
    ///
    /// # Returns
    ///
    /// A tuple of `(client_handle, event_receiver)`. The event receiver
    /// yields [`GrapeEvent`]s until the transport closes or the client quits.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: GrapeClientConfig,
    ) -> (Self, mpsc::Receiver<GrapeEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientMessage>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<GrapeEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let state = Arc::new(ClientState::new());
        let loop_state = Arc::clone(&state);

        let task = tokio::spawn(transport_loop(
            transport,
            cmd_rx,
            event_tx,
            loop_state,
            shutdown_rx,
            config.grid_size,
            config.action_timeout,
        ));

        let client = Self {
            cmd_tx,
            state,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Public API methods ──────────────────────────────────────────

    /// Designate a cell as this player's poison during Poison Selection.
    ///
    /// On success exactly one `poison_select` message is queued and all
    /// further poison-selection input is locked until the server advances
    /// the phase (or the action times out).
    ///
    /// # Errors
    ///
    /// Returns [`GrapeClientError::NotConnected`] if the transport has
    /// closed, [`GrapeClientError::NoSession`] before `welcome`, or
    /// [`GrapeClientError::Rejected`] when the local precondition check
    /// fails — in which case nothing is sent.
    pub async fn choose_poison(&self, index: CellIndex) -> Result<()> {
        if !self.state.connected.load(Ordering::Acquire) {
            return Err(GrapeClientError::NotConnected);
        }
        let msg = {
            let mut guard = self.state.session.lock().await;
            let session = guard.as_mut().ok_or(GrapeClientError::NoSession)?;
            session.choose_poison(index)?
        };
        self.send(msg)
    }

    /// Pick a cell during Play, on this player's turn.
    ///
    /// On success a `pick_select` message is queued and all board input is
    /// locked until the next authoritative server message. The client never
    /// applies the pick locally.
    ///
    /// # Errors
    ///
    /// Returns [`GrapeClientError::NotConnected`] if the transport has
    /// closed, [`GrapeClientError::NoSession`] before `welcome`, or
    /// [`GrapeClientError::Rejected`] when the local precondition check
    /// fails — in which case nothing is sent.
    pub async fn pick_cell(&self, index: CellIndex) -> Result<()> {
        if !self.state.connected.load(Ordering::Acquire) {
            return Err(GrapeClientError::NotConnected);
        }
        let msg = {
            let mut guard = self.state.session.lock().await;
            let session = guard.as_mut().ok_or(GrapeClientError::NoSession)?;
            session.pick_cell(index)?
        };
        self.send(msg)
    }

    /// Quit the game, closing the transport and stopping the background task.
    ///
    /// This is the deliberate, user-triggered close: the transport performs
    /// a normal-closure handshake and a final `Disconnected` event is
    /// emitted. After calling this method, the event receiver will yield
    /// `None` once the transport loop exits.
    pub async fn quit(&mut self) {
        debug!("GrapeClient: quit requested");

        // Signal the transport loop to shut down gracefully.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the transport loop with a timeout. If it doesn't exit in time,
        // abort it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
        // The session dies with the connection.
        *self.state.session.lock().await = None;
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` if the transport is believed to be connected.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// A snapshot of the current session, if `welcome` has arrived.
    pub async fn session(&self) -> Option<Session> {
        self.state.session.lock().await.clone()
    }

    /// The current game phase, if a session exists.
    pub async fn phase(&self) -> Option<Phase> {
        self.state.session.lock().await.as_ref().map(Session::phase)
    }

    /// A renderable projection of the current session state.
    pub async fn board_view(&self) -> Option<BoardView> {
        self.state
            .session
            .lock()
            .await
            .as_ref()
            .map(crate::view::project)
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Queue a `ClientMessage` to the transport loop.
    fn send(&self, msg: ClientMessage) -> Result<()> {
        self.cmd_tx
            .send(msg)
            .map_err(|_| GrapeClientError::NotConnected)
    }
}

impl std::fmt::Debug for GrapeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrapeClient")
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for GrapeClient {
    fn drop(&mut self) {
        // `Drop` is synchronous so we cannot await a graceful shutdown.
        // The only safe action is to abort the spawned task, which causes
        // the transport loop future to be dropped immediately.  The
        // `shutdown_tx` oneshot is intentionally *not* sent here: sending
        // it would trigger a graceful path that calls async `transport.close()`,
        // but there is no executor context to drive it inside `Drop`.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Returns `true` for messages that authoritatively answer an in-flight
/// local action, disarming the action timeout.
fn clears_pending(msg: &ServerMessage) -> bool {
    matches!(
        msg,
        ServerMessage::StartGame { .. }
            | ServerMessage::Update { .. }
            | ServerMessage::GameOver { .. }
            | ServerMessage::Draw {}
            | ServerMessage::PlayerDisconnected { .. }
    )
}

/// Background transport loop that multiplexes send/receive via `tokio::select!`.
///
/// Exits when:
/// - The command channel closes (client handle dropped or quit called)
/// - The transport returns `None` (server closed connection)
/// - A transport error occurs
async fn transport_loop(
    mut transport: impl Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    event_tx: mpsc::Sender<GrapeEvent>,
    state: Arc<ClientState>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    grid_size: usize,
    action_timeout: Option<Duration>,
) {
    debug!("transport loop started");

    // Armed when an action message is sent; cleared by the next
    // authoritative server message.
    let mut action_deadline: Option<tokio::time::Instant> = None;

    // Emit the synthetic Connected event before entering the select loop.
    emit_event(&event_tx, GrapeEvent::Connected).await;

    loop {
        tokio::select! {
            // Branch 1: outgoing action from the client handle
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(msg) => {
                        debug!("sending client message: {:?}", std::mem::discriminant(&msg));
                        match serde_json::to_string(&msg) {
                            Ok(json) => {
                                if let Err(e) = transport.send(json).await {
                                    error!("transport send error: {e}");
                                    emit_disconnected(
                                        &event_tx,
                                        &state,
                                        Some(format!("transport send error: {e}")),
                                    ).await;
                                    break;
                                }
                                if let Some(timeout) = action_timeout {
                                    action_deadline =
                                        Some(tokio::time::Instant::now() + timeout);
                                }
                            }
                            Err(e) => {
                                error!("failed to serialize ClientMessage: {e}");
                                // Serialization errors are programming bugs; don't kill the loop.
                            }
                        }
                    }
                    // Command channel closed — client handle dropped.
                    None => {
                        debug!("command channel closed, shutting down transport loop");
                        let _ = transport.close().await;
                        emit_disconnected(&event_tx, &state, Some("client quit".into())).await;
                        break;
                    }
                }
            }

            // Branch 2: shutdown signal (quit)
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                emit_disconnected(&event_tx, &state, Some("client quit".into())).await;
                break;
            }

            // Branch 3: incoming message from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(server_msg) => {
                                if clears_pending(&server_msg) {
                                    action_deadline = None;
                                }
                                let events =
                                    dispatch_message(&state, &server_msg, grid_size).await;
                                for event in events {
                                    emit_event(&event_tx, event).await;
                                }
                            }
                            Err(e) => {
                                warn!("failed to deserialize server message: {e} — raw: {text}");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        emit_disconnected(
                            &event_tx,
                            &state,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    // Transport closed cleanly.
                    None => {
                        debug!("transport closed by server");
                        emit_disconnected(&event_tx, &state, None).await;
                        break;
                    }
                }
            }

            // Branch 4: a sent action went unanswered too long
            () = async {
                match action_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            } => {
                action_deadline = None;
                let expired = {
                    let mut guard = state.session.lock().await;
                    guard.as_mut().and_then(Session::expire_pending)
                };
                if let Some(action) = expired {
                    emit_event(&event_tx, GrapeEvent::ActionTimedOut { action }).await;
                }
            }
        }
    }

    debug!("transport loop exited");
}

/// Route one inbound [`ServerMessage`] into the session state machine,
/// run-to-completion under the session lock.
///
/// `welcome` creates the session; everything else is applied to it. A
/// message arriving before `welcome`, or a second `welcome`, is a protocol
/// violation: logged and ignored.
async fn dispatch_message(
    state: &ClientState,
    msg: &ServerMessage,
    grid_size: usize,
) -> Vec<GrapeEvent> {
    let mut guard = state.session.lock().await;
    match (guard.as_mut(), msg) {
        (
            None,
            ServerMessage::Welcome {
                player_id,
                num_players,
            },
        ) => {
            debug!(player_id, num_players, "welcome received, session created");
            *guard = Some(Session::new(*player_id, *num_players, grid_size));
            vec![GrapeEvent::Welcome {
                player_id: *player_id,
                num_players: *num_players,
            }]
        }
        (Some(_), ServerMessage::Welcome { .. }) => {
            warn!("ignoring welcome for an already-active session");
            Vec::new()
        }
        (Some(session), msg) => session.apply(msg),
        (None, msg) => {
            warn!(
                msg = ?std::mem::discriminant(msg),
                "ignoring message received before welcome"
            );
            Vec::new()
        }
    }
}

/// Emit an event to the event channel. If the channel is full, log a warning
/// and drop the event to avoid blocking the transport loop.
async fn emit_event(event_tx: &mpsc::Sender<GrapeEvent>, event: GrapeEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit a [`Disconnected`](GrapeEvent::Disconnected) event and tear the
/// session down.
///
/// Uses `send().await` (blocking) instead of `try_send` because
/// `Disconnected` is always the last event on the channel and must never be
/// silently dropped.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<GrapeEvent>,
    state: &ClientState,
    reason: Option<String>,
) {
    state.connected.store(false, Ordering::Release);
    *state.session.lock().await = None;
    let event = GrapeEvent::Disconnected { reason };
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::error::ActionError;
    use crate::session::PendingAction;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// A mock transport that records sent messages and replays scripted responses.
    struct MockTransport {
        /// Messages that `recv()` will yield in order.
        incoming: VecDeque<Option<std::result::Result<String, GrapeClientError>>>,
        /// Recorded outgoing messages.
        sent: Arc<StdMutex<Vec<String>>>,
        /// Whether `close()` was called.
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, GrapeClientError>>>,
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
        async fn send(&mut self, message: String) -> std::result::Result<(), GrapeClientError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, GrapeClientError>> {
            if let Some(item) = self.incoming.pop_front() {
                // An explicit `None` entry signals a clean transport close;
                // `Some(result)` delivers the scripted message or error.
                item
            } else {
                // All scripted messages have been delivered — hang forever
                // so the transport loop stays alive until quit.
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), GrapeClientError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn welcome_json() -> String {
        serde_json::to_string(&ServerMessage::Welcome {
            player_id: 0,
            num_players: 2,
        })
        .unwrap()
    }

    fn initial_setup_json() -> String {
        serde_json::to_string(&ServerMessage::InitialSetup {}).unwrap()
    }

    fn start_game_json(turn: u32) -> String {
        serde_json::to_string(&ServerMessage::StartGame {
            poison_indices: vec![5, 47],
            turn,
            taken: vec![false; 100],
        })
        .unwrap()
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn connected_is_first_event() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(welcome_json()))]);

        let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

        let first = events.recv().await.unwrap();
        assert!(
            matches!(first, GrapeEvent::Connected),
            "expected Connected as first event, got {first:?}"
        );

        client.quit().await;
    }

    #[tokio::test]
    async fn welcome_creates_session_in_lobby() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(welcome_json()))]);

        let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

        let _ = events.recv().await; // Connected
        let ev = events.recv().await.unwrap();
        assert_eq!(
            ev,
            GrapeEvent::Welcome {
                player_id: 0,
                num_players: 2
            }
        );

        assert_eq!(client.phase().await, Some(Phase::Lobby));
        let session = client.session().await.unwrap();
        assert_eq!(session.local_player_id(), 0);
        assert_eq!(session.board().len(), 100);

        client.quit().await;
    }

    #[tokio::test]
    async fn action_before_welcome_returns_no_session() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);

        let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());
        let _ = events.recv().await; // Connected

        let result = client.choose_poison(5).await;
        assert!(matches!(result, Err(GrapeClientError::NoSession)));
        assert!(sent.lock().unwrap().is_empty());

        client.quit().await;
    }

    #[tokio::test]
    async fn choose_poison_sends_exactly_one_message() {
        let (transport, sent, _closed) = MockTransport::new(vec![
            Some(Ok(welcome_json())),
            Some(Ok(initial_setup_json())),
        ]);

        let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Welcome
        let _ = events.recv().await; // PoisonSelectionStarted

        client.choose_poison(5).await.unwrap();

        // A second attempt is locked out locally.
        let result = client.choose_poison(6).await;
        assert!(matches!(
            result,
            Err(GrapeClientError::Rejected(ActionError::AwaitingServer))
        ));

        // Give the loop a moment to process.
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            assert_eq!(messages.len(), 1);
            let msg: ClientMessage = serde_json::from_str(&messages[0]).unwrap();
            assert!(matches!(
                msg,
                ClientMessage::PoisonSelect {
                    player_id: 0,
                    index: 5
                }
            ));
        }

        // Everything is disabled while awaiting the server.
        let view = client.board_view().await.unwrap();
        assert!(view.cells.iter().all(|c| !c.enabled));

        client.quit().await;
    }

    #[tokio::test]
    async fn pick_cell_sends_and_disables_board() {
        // Scripted messages are consumed as soon as the loop starts, so the
        // session is already in Play by the time we act.
        let (transport, sent, _closed) = MockTransport::new(vec![
            Some(Ok(welcome_json())),
            Some(Ok(initial_setup_json())),
            Some(Ok(start_game_json(0))),
        ]);
        let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Welcome
        let _ = events.recv().await; // PoisonSelectionStarted
        let ev = events.recv().await.unwrap(); // GameStarted
        assert_eq!(
            ev,
            GrapeEvent::GameStarted {
                current_turn: 0,
                poison_count: 2
            }
        );

        client.pick_cell(3).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let last: ClientMessage = serde_json::from_str(messages.last().unwrap()).unwrap();
            assert!(matches!(
                last,
                ClientMessage::PickSelect {
                    player_id: 0,
                    index: 3
                }
            ));
        }

        let view = client.board_view().await.unwrap();
        assert!(view.cells.iter().all(|c| !c.enabled));

        client.quit().await;
    }

    #[tokio::test]
    async fn rejected_pick_sends_nothing() {
        let (transport, sent, _closed) = MockTransport::new(vec![
            Some(Ok(welcome_json())),
            Some(Ok(initial_setup_json())),
            Some(Ok(start_game_json(1))), // opponent's turn
        ]);

        let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Welcome
        let _ = events.recv().await; // PoisonSelectionStarted
        let _ = events.recv().await; // GameStarted

        let result = client.pick_cell(3).await;
        assert!(matches!(
            result,
            Err(GrapeClientError::Rejected(ActionError::NotYourTurn))
        ));
        assert!(sent.lock().unwrap().is_empty());

        client.quit().await;
    }

    #[tokio::test]
    async fn action_timeout_releases_lock_and_allows_retry() {
        let (transport, sent, _closed) = MockTransport::new(vec![
            Some(Ok(welcome_json())),
            Some(Ok(initial_setup_json())),
            // The server never confirms the poison selection.
        ]);

        let config =
            GrapeClientConfig::new().with_action_timeout(Some(Duration::from_millis(50)));
        let (mut client, mut events) = GrapeClient::start(transport, config);

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Welcome
        let _ = events.recv().await; // PoisonSelectionStarted

        client.choose_poison(5).await.unwrap();

        let ev = events.recv().await.unwrap();
        assert_eq!(
            ev,
            GrapeEvent::ActionTimedOut {
                action: PendingAction::PoisonSelect
            }
        );

        // The lock is released: a retry produces a second poison_select.
        client.choose_poison(6).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sent.lock().unwrap().len(), 2);

        client.quit().await;
    }

    #[tokio::test]
    async fn disconnected_on_transport_close_destroys_session() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok(welcome_json())),
            // Explicit None signals clean transport close.
            None,
        ]);

        let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Welcome
        let event = events.recv().await.unwrap(); // Disconnected
        assert!(matches!(event, GrapeEvent::Disconnected { .. }));

        assert!(!client.is_connected());
        assert!(client.session().await.is_none());

        client.quit().await;
    }

    #[tokio::test]
    async fn not_connected_error_after_quit() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(welcome_json()))]);

        let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Welcome

        client.quit().await;

        let result = client.choose_poison(5).await;
        assert!(matches!(result, Err(GrapeClientError::NotConnected)));
    }

    #[tokio::test]
    async fn quit_emits_disconnected_and_closes_transport() {
        let (transport, _sent, closed) = MockTransport::new(vec![Some(Ok(welcome_json()))]);

        let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Welcome

        client.quit().await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event, GrapeEvent::Disconnected { .. }));
        if let GrapeEvent::Disconnected { reason } = event {
            assert_eq!(reason.as_deref(), Some("client quit"));
        }

        assert!(closed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn double_quit_does_not_panic() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(welcome_json()))]);

        let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Welcome

        client.quit().await;
        client.quit().await; // should not panic
    }

    #[tokio::test]
    async fn drop_without_explicit_quit() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(welcome_json()))]);

        let (client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Welcome

        // Drop the client without calling quit.
        drop(client);

        // The transport loop should eventually exit; the event channel
        // will close. We just verify we don't hang or panic.
        while let Some(_event) = events.recv().await {}
    }

    #[tokio::test]
    async fn malformed_server_message_is_skipped() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok("this is not json".to_string())),
            Some(Ok(welcome_json())),
        ]);

        let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

        let _ = events.recv().await; // Connected
        // The malformed frame is logged and skipped; welcome still arrives.
        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, GrapeEvent::Welcome { .. }));

        client.quit().await;
    }

    #[tokio::test]
    async fn transport_recv_error_emits_disconnected() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Err(
            GrapeClientError::TransportReceive("boom".into()),
        ))]);

        let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

        let _ = events.recv().await; // Connected
        let event = events.recv().await.unwrap();
        assert!(matches!(event, GrapeEvent::Disconnected { .. }));
        if let GrapeEvent::Disconnected { reason } = event {
            assert!(reason.unwrap().contains("boom"));
        }

        client.quit().await;
    }

    #[tokio::test]
    async fn event_channel_backpressure_does_not_block() {
        // Script more messages than the event channel can hold.
        let mut incoming: Vec<Option<std::result::Result<String, GrapeClientError>>> = Vec::new();
        incoming.push(Some(Ok(welcome_json())));
        let error_json = serde_json::to_string(&ServerMessage::Error {
            message: "spam".into(),
        })
        .unwrap();
        for _ in 0..20 {
            incoming.push(Some(Ok(error_json.clone())));
        }
        incoming.push(None);

        let (transport, _sent, _closed) = MockTransport::new(incoming);

        let config = GrapeClientConfig::new().with_event_channel_capacity(1);
        let (mut client, mut events) = GrapeClient::start(transport, config);

        // Let the channel fill up and events get dropped.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut count = 0;
        while let Some(_event) = events.recv().await {
            count += 1;
        }
        // At minimum Connected (first try_send succeeds) and Disconnected
        // (always delivered via blocking send) arrive; spam may be dropped.
        assert!(count >= 2, "expected at least 2 events, got {count}");
        assert!(
            count < 22,
            "expected backpressure to drop some events, but got all {count}"
        );

        client.quit().await;
    }

    #[tokio::test]
    async fn config_defaults() {
        let config = GrapeClientConfig::new();
        assert_eq!(config.grid_size, 10);
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.action_timeout, Some(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn config_builder_methods() {
        let config = GrapeClientConfig::new()
            .with_grid_size(4)
            .with_event_channel_capacity(512)
            .with_shutdown_timeout(Duration::from_secs(5))
            .with_action_timeout(None);
        assert_eq!(config.grid_size, 4);
        assert_eq!(config.event_channel_capacity, 512);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert!(config.action_timeout.is_none());
    }

    #[tokio::test]
    async fn event_channel_capacity_is_clamped_to_one() {
        let config = GrapeClientConfig::new().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[tokio::test]
    async fn custom_grid_size_shapes_the_board() {
        let welcome = serde_json::to_string(&ServerMessage::Welcome {
            player_id: 1,
            num_players: 3,
        })
        .unwrap();
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(welcome))]);

        let config = GrapeClientConfig::new().with_grid_size(4);
        let (mut client, mut events) = GrapeClient::start(transport, config);

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Welcome

        let session = client.session().await.unwrap();
        assert_eq!(session.board().len(), 16);
        assert_eq!(session.local_player_id(), 1);
        assert_eq!(session.player_count(), 3);

        client.quit().await;
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(welcome_json()))]);

        let (mut client, mut events) = GrapeClient::start(transport, GrapeClientConfig::new());

        let _ = events.recv().await; // Connected

        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("GrapeClient"));
        assert!(debug_str.contains("connected"));

        client.quit().await;
    }
}
