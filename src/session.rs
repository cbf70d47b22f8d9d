//! Client-side session state machine for the Poison Grape protocol.
//!
//! A [`Session`] is created when the server's `welcome` message arrives and
//! is driven purely by subsequent inbound messages via [`Session::apply`].
//! It is fully synchronous and owns no I/O, so the whole game flow can be
//! tested headlessly.
//!
//! Phases advance monotonically:
//!
//! ```text
//! Lobby ──initial_setup──▶ PoisonSelection ──start_game──▶ Play ──▶ Terminal
//! ```
//!
//! Terminal is absorbing. A message that does not fit the current phase is a
//! protocol violation: it is logged and ignored, never a crash and never a
//! transition.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::board::{Board, CellState};
use crate::error::ActionError;
use crate::event::{GrapeEvent, LastPick};
use crate::protocol::{CellIndex, ClientMessage, PlayerId, ServerMessage};

/// Game phase as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Session exists; waiting for the table to fill.
    Lobby,
    /// Each player privately designates one poison cell.
    PoisonSelection,
    /// Turn-based picking.
    Play,
    /// Game over, aborted, or drawn. Absorbing.
    Terminal,
}

/// The single in-flight local action awaiting server confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    /// A `poison_select` was sent during Poison Selection.
    PoisonSelect,
    /// A `pick_select` was sent during Play.
    CellPick,
}

/// How the game ended, from the local player's perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOutcome {
    /// Somebody else picked poison.
    Won { loser_ids: Vec<PlayerId> },
    /// The local player picked poison.
    Lost { loser_ids: Vec<PlayerId> },
    /// All safe cells were exhausted.
    Draw,
    /// A participant disconnected before the game finished.
    Aborted { disconnected_player_id: PlayerId },
}

/// Progress through the Poison Selection phase.
///
/// Exists only while the session is in [`Phase::PoisonSelection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoisonSelectionProgress {
    /// Whether this client has already sent its `poison_select`.
    pub has_local_player_chosen: bool,
    /// How many players have chosen, as far as the server disclosed.
    pub chosen_count: u32,
    /// How many choices are needed before Play can begin.
    pub required_count: u32,
}

/// Client-side mirror of one game session.
#[derive(Debug, Clone)]
pub struct Session {
    local_player_id: PlayerId,
    player_count: u32,
    phase: Phase,
    current_turn: Option<PlayerId>,
    board: Board,
    /// Known poison locations. Populated by `start_game`; re-confirmed and
    /// revealed on the board by `game_over`.
    poison_indices: BTreeSet<CellIndex>,
    /// Cells other players announced as their poison during selection.
    /// Used only for the local legality pre-check, never rendered.
    claimed_poison: BTreeSet<CellIndex>,
    progress: Option<PoisonSelectionProgress>,
    pending: Option<PendingAction>,
    outcome: Option<GameOutcome>,
}

impl Session {
    /// Create a session from the server's `welcome` message.
    ///
    /// The session starts in [`Phase::Lobby`] with an all-free board of
    /// `grid_size` × `grid_size` cells.
    pub fn new(local_player_id: PlayerId, player_count: u32, grid_size: usize) -> Self {
        Self {
            local_player_id,
            player_count,
            phase: Phase::Lobby,
            current_turn: None,
            board: Board::new(grid_size),
            poison_indices: BTreeSet::new(),
            claimed_poison: BTreeSet::new(),
            progress: None,
            pending: None,
            outcome: None,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// This client's player id.
    pub fn local_player_id(&self) -> PlayerId {
        self.local_player_id
    }

    /// Number of players in the game.
    pub fn player_count(&self) -> u32 {
        self.player_count
    }

    /// Current game phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The player whose turn it is. `Some` only in [`Phase::Play`].
    pub fn current_turn(&self) -> Option<PlayerId> {
        self.current_turn
    }

    /// Returns `true` if it is the local player's turn.
    pub fn is_local_turn(&self) -> bool {
        self.current_turn == Some(self.local_player_id)
    }

    /// The board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Known poison locations, in index order.
    pub fn poison_indices(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.poison_indices.iter().copied()
    }

    /// Poison Selection progress; `Some` only in [`Phase::PoisonSelection`].
    pub fn progress(&self) -> Option<&PoisonSelectionProgress> {
        self.progress.as_ref()
    }

    /// The in-flight local action, if any.
    pub fn pending(&self) -> Option<PendingAction> {
        self.pending
    }

    /// How the game ended; `Some` only in [`Phase::Terminal`].
    pub fn outcome(&self) -> Option<&GameOutcome> {
        self.outcome.as_ref()
    }

    /// Whether the cell at `index` accepts local input right now.
    ///
    /// This is the single legality rule both action methods and the
    /// presentation layer derive from: a function of phase, pending state,
    /// taken-state, and poison/claimed membership.
    pub fn is_cell_selectable(&self, index: CellIndex) -> bool {
        if self.pending.is_some() {
            return false;
        }
        match self.phase {
            Phase::PoisonSelection => {
                let chosen = self
                    .progress
                    .is_some_and(|p| p.has_local_player_chosen);
                !chosen && self.board.is_free(index) && !self.claimed_poison.contains(&index)
            }
            Phase::Play => {
                self.is_local_turn()
                    && self.board.is_free(index)
                    && !self.poison_indices.contains(&index)
            }
            Phase::Lobby | Phase::Terminal => false,
        }
    }

    // ── Local actions ───────────────────────────────────────────────

    /// Designate `index` as this player's poison cell.
    ///
    /// On success the outbound [`ClientMessage::PoisonSelect`] is returned
    /// and all further poison-selection input is locked until the server
    /// advances the phase (or the action times out).
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] when the precondition check fails; nothing
    /// is sent in that case.
    pub fn choose_poison(&mut self, index: CellIndex) -> Result<ClientMessage, ActionError> {
        if self.phase != Phase::PoisonSelection {
            return Err(ActionError::WrongPhase(self.phase));
        }
        if self.pending.is_some() {
            return Err(ActionError::AwaitingServer);
        }
        if self.progress.is_some_and(|p| p.has_local_player_chosen) {
            return Err(ActionError::PoisonAlreadyChosen);
        }
        match self.board.cell(index) {
            None => return Err(ActionError::OutOfBounds(index)),
            Some(CellState::Free) => {}
            Some(_) => return Err(ActionError::CellTaken(index)),
        }
        if self.claimed_poison.contains(&index) {
            return Err(ActionError::CellClaimed(index));
        }

        if let Some(progress) = self.progress.as_mut() {
            progress.has_local_player_chosen = true;
        }
        self.pending = Some(PendingAction::PoisonSelect);
        debug!(index, "poison selected, awaiting server");
        Ok(ClientMessage::PoisonSelect {
            player_id: self.local_player_id,
            index,
        })
    }

    /// Pick the cell at `index` on this player's turn.
    ///
    /// On success the outbound [`ClientMessage::PickSelect`] is returned and
    /// all board input is locked until the next authoritative message. The
    /// client never predicts the outcome of its own pick: no local board
    /// mutation happens here.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] when the precondition check fails; nothing
    /// is sent in that case.
    pub fn pick_cell(&mut self, index: CellIndex) -> Result<ClientMessage, ActionError> {
        if self.phase != Phase::Play {
            return Err(ActionError::WrongPhase(self.phase));
        }
        if self.pending.is_some() {
            return Err(ActionError::AwaitingServer);
        }
        if !self.is_local_turn() {
            return Err(ActionError::NotYourTurn);
        }
        match self.board.cell(index) {
            None => return Err(ActionError::OutOfBounds(index)),
            Some(CellState::Free) => {}
            Some(_) => return Err(ActionError::CellTaken(index)),
        }
        if self.poison_indices.contains(&index) {
            return Err(ActionError::CellPoisoned(index));
        }

        self.pending = Some(PendingAction::CellPick);
        debug!(index, "cell picked, awaiting server");
        Ok(ClientMessage::PickSelect {
            player_id: self.local_player_id,
            index,
        })
    }

    /// Release the optimistic lock after an action went unanswered.
    ///
    /// Returns the expired action, or `None` if nothing was pending. An
    /// expired poison selection also resets `has_local_player_chosen` so the
    /// user can choose again.
    pub(crate) fn expire_pending(&mut self) -> Option<PendingAction> {
        let expired = self.pending.take()?;
        if expired == PendingAction::PoisonSelect {
            if let Some(progress) = self.progress.as_mut() {
                progress.has_local_player_chosen = false;
            }
        }
        warn!(?expired, "pending action expired without confirmation");
        Some(expired)
    }

    // ── Inbound message handling ────────────────────────────────────

    /// Apply one inbound server message, run-to-completion.
    ///
    /// Returns the events the transition produced, in order. A message that
    /// does not fit the current phase produces no events and no state change.
    pub fn apply(&mut self, msg: &ServerMessage) -> Vec<GrapeEvent> {
        match (self.phase, msg) {
            (_, ServerMessage::Error { message }) => {
                warn!(message = %message, "server reported an error");
                vec![GrapeEvent::ServerError {
                    message: message.clone(),
                }]
            }

            (Phase::Lobby, ServerMessage::InitialSetup {}) => {
                self.phase = Phase::PoisonSelection;
                self.progress = Some(PoisonSelectionProgress {
                    has_local_player_chosen: false,
                    chosen_count: 0,
                    required_count: self.player_count,
                });
                self.claimed_poison.clear();
                debug!("poison selection started");
                vec![GrapeEvent::PoisonSelectionStarted]
            }

            (
                Phase::PoisonSelection,
                ServerMessage::PoisonSelectionUpdate {
                    selected_index,
                    selector_id,
                    poisons_set_count,
                    total_players_needed,
                },
            ) => {
                if let Some(index) = selected_index {
                    self.claimed_poison.insert(*index);
                }
                let Some(progress) = self.progress.as_mut() else {
                    return Vec::new();
                };
                if let Some(needed) = total_players_needed {
                    progress.required_count = *needed;
                }
                if let Some(count) = poisons_set_count {
                    progress.chosen_count = *count;
                } else if selector_id.is_some() || selected_index.is_some() {
                    progress.chosen_count =
                        progress.chosen_count.saturating_add(1).min(progress.required_count);
                }
                vec![GrapeEvent::PoisonSelectionProgress {
                    chosen_count: progress.chosen_count,
                    required_count: progress.required_count,
                }]
            }

            (
                Phase::PoisonSelection,
                ServerMessage::StartGame {
                    poison_indices,
                    turn,
                    taken,
                },
            ) => {
                self.poison_indices = poison_indices.iter().copied().collect();
                self.board.mirror_taken(taken);
                self.current_turn = Some(*turn);
                self.phase = Phase::Play;
                self.progress = None;
                self.pending = None;
                debug!(
                    poisons = self.poison_indices.len(),
                    turn, "game started"
                );
                vec![GrapeEvent::GameStarted {
                    current_turn: *turn,
                    poison_count: self.poison_indices.len(),
                }]
            }

            (
                Phase::Play,
                ServerMessage::Update {
                    turn,
                    taken,
                    last_pick_index,
                    last_player_id,
                },
            ) => {
                self.board.mirror_taken(taken);
                self.current_turn = Some(*turn);
                self.pending = None;
                let last_pick = match (last_player_id, last_pick_index) {
                    (Some(player_id), Some(index)) => Some(LastPick {
                        player_id: *player_id,
                        index: *index,
                    }),
                    _ => None,
                };
                vec![GrapeEvent::BoardUpdated {
                    current_turn: *turn,
                    last_pick,
                }]
            }

            (
                Phase::Play,
                ServerMessage::GameOver {
                    loser_ids,
                    poison_indices,
                    poison_index_picked: _,
                },
            ) => {
                self.poison_indices = poison_indices.iter().copied().collect();
                self.board.reveal_poison(poison_indices);
                let outcome = if loser_ids.contains(&self.local_player_id) {
                    GameOutcome::Lost {
                        loser_ids: loser_ids.clone(),
                    }
                } else {
                    GameOutcome::Won {
                        loser_ids: loser_ids.clone(),
                    }
                };
                self.enter_terminal(outcome.clone());
                vec![GrapeEvent::GameEnded { outcome }]
            }

            (Phase::Play, ServerMessage::Draw {}) => {
                self.enter_terminal(GameOutcome::Draw);
                vec![GrapeEvent::GameEnded {
                    outcome: GameOutcome::Draw,
                }]
            }

            (
                Phase::Lobby | Phase::PoisonSelection | Phase::Play,
                ServerMessage::PlayerDisconnected {
                    disconnected_player_id,
                },
            ) => {
                let outcome = GameOutcome::Aborted {
                    disconnected_player_id: *disconnected_player_id,
                };
                self.enter_terminal(outcome.clone());
                vec![GrapeEvent::GameEnded { outcome }]
            }

            (phase, msg) => {
                warn!(
                    ?phase,
                    msg = ?std::mem::discriminant(msg),
                    "ignoring message that does not fit the current phase"
                );
                Vec::new()
            }
        }
    }

    fn enter_terminal(&mut self, outcome: GameOutcome) {
        debug!(?outcome, "session reached terminal phase");
        self.phase = Phase::Terminal;
        self.current_turn = None;
        self.progress = None;
        self.pending = None;
        self.outcome = Some(outcome);
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

    fn two_player_session() -> Session {
        Session::new(0, 2, 10)
    }

    fn in_selection() -> Session {
        let mut session = two_player_session();
        session.apply(&ServerMessage::InitialSetup {});
        session
    }

    fn in_play(turn: PlayerId) -> Session {
        let mut session = in_selection();
        session.choose_poison(5).unwrap();
        session.apply(&ServerMessage::StartGame {
            poison_indices: vec![5, 47],
            turn,
            taken: vec![false; 100],
        });
        session
    }

    fn taken_with(indices: &[usize]) -> Vec<bool> {
        let mut taken = vec![false; 100];
        for &i in indices {
            taken[i] = true;
        }
        taken
    }

    // ── Phase transitions ───────────────────────────────────────────

    #[test]
    fn welcome_initializes_lobby_with_free_board() {
        let session = two_player_session();
        assert_eq!(session.phase(), Phase::Lobby);
        assert_eq!(session.local_player_id(), 0);
        assert_eq!(session.player_count(), 2);
        assert_eq!(session.board().len(), 100);
        assert!(session.board().iter().all(|c| c == CellState::Free));
        assert!(session.current_turn().is_none());
    }

    #[test]
    fn initial_setup_enters_poison_selection() {
        let session = in_selection();
        assert_eq!(session.phase(), Phase::PoisonSelection);
        let progress = session.progress().unwrap();
        assert!(!progress.has_local_player_chosen);
        assert_eq!(progress.chosen_count, 0);
        assert_eq!(progress.required_count, 2);
    }

    #[test]
    fn start_game_enters_play() {
        let session = in_play(1);
        assert_eq!(session.phase(), Phase::Play);
        assert_eq!(session.current_turn(), Some(1));
        assert!(!session.is_local_turn());
        assert!(session.progress().is_none());
        assert!(session.pending().is_none());
        assert_eq!(session.poison_indices().collect::<Vec<_>>(), vec![5, 47]);
    }

    #[test]
    fn phases_are_monotonic_and_never_skip_poison_selection() {
        // start_game in Lobby must not jump straight to Play.
        let mut session = two_player_session();
        let events = session.apply(&ServerMessage::StartGame {
            poison_indices: vec![1, 2],
            turn: 0,
            taken: vec![false; 100],
        });
        assert!(events.is_empty());
        assert_eq!(session.phase(), Phase::Lobby);
    }

    #[test]
    fn terminal_is_absorbing() {
        let mut session = in_play(0);
        session.apply(&ServerMessage::Draw {});
        assert_eq!(session.phase(), Phase::Terminal);

        let events = session.apply(&ServerMessage::Update {
            turn: 0,
            taken: vec![true; 100],
            last_pick_index: None,
            last_player_id: None,
        });
        assert!(events.is_empty());
        assert_eq!(session.phase(), Phase::Terminal);
        // The board must not have been touched.
        assert!(session.board().iter().all(|c| c != CellState::Taken));

        let events = session.apply(&ServerMessage::PlayerDisconnected {
            disconnected_player_id: 1,
        });
        assert!(events.is_empty());
        assert_eq!(session.outcome(), Some(&GameOutcome::Draw));
    }

    // ── Board mirroring (property 1) ────────────────────────────────

    #[test]
    fn update_mirrors_server_taken_array_exactly() {
        let mut session = in_play(0);
        let taken = taken_with(&[2, 7, 11]);
        session.apply(&ServerMessage::Update {
            turn: 1,
            taken: taken.clone(),
            last_pick_index: Some(11),
            last_player_id: Some(0),
        });
        for (i, &is_taken) in taken.iter().enumerate() {
            let expected = if is_taken {
                CellState::Taken
            } else {
                CellState::Free
            };
            assert_eq!(session.board().cell(i), Some(expected), "cell {i}");
        }
        assert_eq!(session.current_turn(), Some(1));
    }

    #[test]
    fn update_emits_last_pick_for_turn_log() {
        let mut session = in_play(0);
        let events = session.apply(&ServerMessage::Update {
            turn: 1,
            taken: taken_with(&[3]),
            last_pick_index: Some(3),
            last_player_id: Some(0),
        });
        assert_eq!(
            events,
            vec![GrapeEvent::BoardUpdated {
                current_turn: 1,
                last_pick: Some(LastPick {
                    player_id: 0,
                    index: 3
                }),
            }]
        );
    }

    // ── choose_poison (properties 3 and 5) ──────────────────────────

    #[test]
    fn choose_poison_sends_once_and_locks_input() {
        let mut session = in_selection();

        let msg = session.choose_poison(5).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::PoisonSelect {
                player_id: 0,
                index: 5
            }
        ));
        assert!(session.progress().unwrap().has_local_player_chosen);
        assert_eq!(session.pending(), Some(PendingAction::PoisonSelect));

        // All cells are locked while awaiting the server.
        assert!(!session.is_cell_selectable(6));

        // No second poison_select can ever be produced this phase.
        assert_eq!(
            session.choose_poison(6),
            Err(ActionError::AwaitingServer)
        );
    }

    #[test]
    fn choose_poison_requires_selection_phase() {
        let mut session = two_player_session();
        assert_eq!(
            session.choose_poison(5),
            Err(ActionError::WrongPhase(Phase::Lobby))
        );
    }

    #[test]
    fn choose_poison_rejects_taken_and_claimed_cells() {
        let mut session = in_selection();
        // Another player claimed cell 4.
        session.apply(&ServerMessage::PoisonSelectionUpdate {
            selected_index: Some(4),
            selector_id: Some(1),
            poisons_set_count: Some(1),
            total_players_needed: None,
        });
        assert_eq!(session.choose_poison(4), Err(ActionError::CellClaimed(4)));
        assert_eq!(
            session.choose_poison(200),
            Err(ActionError::OutOfBounds(200))
        );
        // A rejection leaves the lock untouched.
        assert!(!session.progress().unwrap().has_local_player_chosen);
        assert!(session.pending().is_none());
    }

    #[test]
    fn poison_selection_update_tracks_progress() {
        let mut session = in_selection();
        let events = session.apply(&ServerMessage::PoisonSelectionUpdate {
            selected_index: None,
            selector_id: Some(1),
            poisons_set_count: None,
            total_players_needed: None,
        });
        assert_eq!(
            events,
            vec![GrapeEvent::PoisonSelectionProgress {
                chosen_count: 1,
                required_count: 2
            }]
        );
        assert_eq!(session.phase(), Phase::PoisonSelection);
    }

    // ── pick_cell (properties 2 and 6) ──────────────────────────────

    #[test]
    fn pick_cell_sends_and_locks_board() {
        let mut session = in_play(0);
        let msg = session.pick_cell(3).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::PickSelect {
                player_id: 0,
                index: 3
            }
        ));
        assert_eq!(session.pending(), Some(PendingAction::CellPick));
        // Everything is disabled pending the server response.
        assert!(!session.is_cell_selectable(4));
        // The pick is NOT applied locally.
        assert_eq!(session.board().cell(3), Some(CellState::Free));
    }

    #[test]
    fn pick_cell_never_sends_for_taken_cell_or_off_turn() {
        let mut session = in_play(1);
        assert_eq!(session.pick_cell(3), Err(ActionError::NotYourTurn));

        let mut session = in_play(0);
        session.apply(&ServerMessage::Update {
            turn: 0,
            taken: taken_with(&[3]),
            last_pick_index: None,
            last_player_id: None,
        });
        assert_eq!(session.pick_cell(3), Err(ActionError::CellTaken(3)));
    }

    #[test]
    fn pick_cell_rejects_known_poison() {
        let mut session = in_play(0);
        assert_eq!(session.pick_cell(47), Err(ActionError::CellPoisoned(47)));
    }

    #[test]
    fn pick_cell_requires_play_phase() {
        let mut session = in_selection();
        assert_eq!(
            session.pick_cell(3),
            Err(ActionError::WrongPhase(Phase::PoisonSelection))
        );
    }

    // ── Terminal transitions (properties 7 and 8) ───────────────────

    #[test]
    fn game_over_reveals_poison_and_reports_win() {
        let mut session = in_play(0);
        let events = session.apply(&ServerMessage::GameOver {
            loser_ids: vec![1],
            poison_indices: vec![3, 47],
            poison_index_picked: Some(47),
        });
        assert_eq!(session.phase(), Phase::Terminal);
        assert_eq!(session.board().cell(3), Some(CellState::PoisonRevealed));
        assert_eq!(session.board().cell(47), Some(CellState::PoisonRevealed));
        assert_eq!(
            events,
            vec![GrapeEvent::GameEnded {
                outcome: GameOutcome::Won { loser_ids: vec![1] }
            }]
        );
        assert!(session.current_turn().is_none());
    }

    #[test]
    fn game_over_reports_loss_when_local_player_lost() {
        let mut session = in_play(0);
        session.apply(&ServerMessage::GameOver {
            loser_ids: vec![0],
            poison_indices: vec![5],
            poison_index_picked: Some(5),
        });
        assert_eq!(
            session.outcome(),
            Some(&GameOutcome::Lost { loser_ids: vec![0] })
        );
    }

    #[test]
    fn draw_ends_without_reveal_or_winner() {
        let mut session = in_play(0);
        let events = session.apply(&ServerMessage::Draw {});
        assert_eq!(session.phase(), Phase::Terminal);
        assert_eq!(
            events,
            vec![GrapeEvent::GameEnded {
                outcome: GameOutcome::Draw
            }]
        );
        // No poison reveal on a draw.
        assert!(session
            .board()
            .iter()
            .all(|c| c != CellState::PoisonRevealed));
    }

    #[test]
    fn player_disconnected_aborts_from_any_phase() {
        for session in [two_player_session(), in_selection(), in_play(0)] {
            let mut session = session;
            let events = session.apply(&ServerMessage::PlayerDisconnected {
                disconnected_player_id: 1,
            });
            assert_eq!(session.phase(), Phase::Terminal);
            assert_eq!(
                events,
                vec![GrapeEvent::GameEnded {
                    outcome: GameOutcome::Aborted {
                        disconnected_player_id: 1
                    }
                }]
            );
        }
    }

    #[test]
    fn server_error_changes_nothing_but_is_surfaced() {
        let mut session = in_play(0);
        let events = session.apply(&ServerMessage::Error {
            message: "not your turn".into(),
        });
        assert_eq!(
            events,
            vec![GrapeEvent::ServerError {
                message: "not your turn".into()
            }]
        );
        assert_eq!(session.phase(), Phase::Play);
        assert_eq!(session.current_turn(), Some(0));
    }

    // ── Optimistic-lock expiry ──────────────────────────────────────

    #[test]
    fn expired_poison_selection_can_be_retried() {
        let mut session = in_selection();
        session.choose_poison(5).unwrap();

        assert_eq!(session.expire_pending(), Some(PendingAction::PoisonSelect));
        assert!(session.pending().is_none());
        assert!(!session.progress().unwrap().has_local_player_chosen);

        // Retry produces a second, fresh poison_select.
        let msg = session.choose_poison(6).unwrap();
        assert!(matches!(msg, ClientMessage::PoisonSelect { index: 6, .. }));
    }

    #[test]
    fn expired_pick_unlocks_the_board() {
        let mut session = in_play(0);
        session.pick_cell(3).unwrap();
        assert!(!session.is_cell_selectable(4));

        assert_eq!(session.expire_pending(), Some(PendingAction::CellPick));
        assert!(session.is_cell_selectable(4));
    }

    #[test]
    fn expire_pending_is_a_no_op_when_nothing_is_pending() {
        let mut session = in_play(0);
        assert_eq!(session.expire_pending(), None);
    }

    // ── Selectability ───────────────────────────────────────────────

    #[test]
    fn selectability_during_poison_selection() {
        let mut session = in_selection();
        assert!(session.is_cell_selectable(0));

        session.apply(&ServerMessage::PoisonSelectionUpdate {
            selected_index: Some(9),
            selector_id: Some(1),
            poisons_set_count: None,
            total_players_needed: None,
        });
        assert!(!session.is_cell_selectable(9));

        session.choose_poison(5).unwrap();
        assert!(!session.is_cell_selectable(0));
    }

    #[test]
    fn selectability_during_play() {
        let mut session = in_play(0);
        assert!(session.is_cell_selectable(0));
        assert!(!session.is_cell_selectable(47)); // poison
        let mut off_turn = in_play(1);
        assert!(!off_turn.is_cell_selectable(0));
        off_turn.apply(&ServerMessage::Update {
            turn: 0,
            taken: vec![false; 100],
            last_pick_index: None,
            last_player_id: None,
        });
        assert!(off_turn.is_cell_selectable(0));
    }

    #[test]
    fn nothing_is_selectable_in_lobby_or_terminal() {
        let session = two_player_session();
        assert!(!session.is_cell_selectable(0));

        let mut session = in_play(0);
        session.apply(&ServerMessage::Draw {});
        assert!(!session.is_cell_selectable(0));
    }
}
