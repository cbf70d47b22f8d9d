//! Presentation adapter: a pure projection of session state into
//! renderable view data.
//!
//! Nothing in this module performs I/O or mutates the session. A UI layer
//! (terminal, egui, web) calls [`project`] after every event and renders the
//! result; the state machine itself stays headless and testable.

use std::fmt;

use crate::board::CellState;
use crate::protocol::PlayerId;
use crate::session::{GameOutcome, Phase, Session};

/// Visual treatment of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellHighlight {
    /// Plain free cell, not currently clickable.
    None,
    /// Already picked by some player.
    Taken,
    /// Revealed as poison at game end.
    PoisonRevealed,
    /// Clickable right now as a poison choice.
    SelectableForPoison,
    /// Clickable right now as a turn pick.
    SelectableForPick,
}

/// Renderable state of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellView {
    /// Whether the cell accepts input right now.
    pub enabled: bool,
    pub highlight: CellHighlight,
}

/// One-line summary of what the player should be doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    WaitingForPlayers,
    ChooseYourPoison,
    WaitingForPoisons,
    YourTurn,
    OpponentTurn { player_id: PlayerId },
    AwaitingServer,
    GameOver { outcome: GameOutcome },
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForPlayers => write!(f, "Waiting for other players..."),
            Self::ChooseYourPoison => write!(f, "Poison selection: pick a cell to poison."),
            Self::WaitingForPoisons => {
                write!(f, "Poison selection: waiting for others to choose...")
            }
            Self::YourTurn => write!(f, "Your turn! Pick a cell."),
            // Player ids are displayed 1-based.
            Self::OpponentTurn { player_id } => write!(f, "Player {}'s turn.", player_id + 1),
            Self::AwaitingServer => write!(f, "Waiting for the server..."),
            Self::GameOver { outcome } => match outcome {
                GameOutcome::Won { loser_ids } => {
                    let losers = loser_ids
                        .iter()
                        .map(|id| (id + 1).to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    write!(f, "Game over: player(s) {losers} picked poison. You win!")
                }
                GameOutcome::Lost { .. } => {
                    write!(f, "Game over: you picked a poisoned cell. You lose.")
                }
                GameOutcome::Draw => write!(f, "Game over: all safe cells picked. Draw!"),
                GameOutcome::Aborted {
                    disconnected_player_id,
                } => write!(
                    f,
                    "Game over: player {} disconnected.",
                    disconnected_player_id + 1
                ),
            },
        }
    }
}

/// Full renderable snapshot of the board and status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    /// One entry per board cell, in index order.
    pub cells: Vec<CellView>,
    pub status: StatusLine,
}

/// Project a session into renderable view state.
pub fn project(session: &Session) -> BoardView {
    let cells = (0..session.board().len())
        .map(|index| cell_view(session, index))
        .collect();
    BoardView {
        cells,
        status: status_line(session),
    }
}

fn cell_view(session: &Session, index: usize) -> CellView {
    let selectable = session.is_cell_selectable(index);
    let highlight = match session.board().cell(index) {
        Some(CellState::Taken) => CellHighlight::Taken,
        Some(CellState::PoisonRevealed) => CellHighlight::PoisonRevealed,
        Some(CellState::Free) if selectable => match session.phase() {
            Phase::PoisonSelection => CellHighlight::SelectableForPoison,
            _ => CellHighlight::SelectableForPick,
        },
        _ => CellHighlight::None,
    };
    CellView {
        enabled: selectable,
        highlight,
    }
}

fn status_line(session: &Session) -> StatusLine {
    if let Some(outcome) = session.outcome() {
        return StatusLine::GameOver {
            outcome: outcome.clone(),
        };
    }
    if session.pending().is_some() {
        return StatusLine::AwaitingServer;
    }
    match session.phase() {
        Phase::Lobby => StatusLine::WaitingForPlayers,
        Phase::PoisonSelection => {
            let chosen = session
                .progress()
                .is_some_and(|p| p.has_local_player_chosen);
            if chosen {
                StatusLine::WaitingForPoisons
            } else {
                StatusLine::ChooseYourPoison
            }
        }
        Phase::Play => match session.current_turn() {
            Some(_) if session.is_local_turn() => StatusLine::YourTurn,
            Some(turn) => StatusLine::OpponentTurn { player_id: turn },
            None => StatusLine::AwaitingServer,
        },
        Phase::Terminal => StatusLine::AwaitingServer,
    }
}

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
    use crate::protocol::ServerMessage;

    fn session_in_play(turn: PlayerId) -> Session {
        let mut session = Session::new(0, 2, 10);
        session.apply(&ServerMessage::InitialSetup {});
        session.choose_poison(5).unwrap();
        session.apply(&ServerMessage::StartGame {
            poison_indices: vec![5, 47],
            turn,
            taken: vec![false; 100],
        });
        session
    }

    #[test]
    fn lobby_disables_everything() {
        let session = Session::new(0, 2, 10);
        let view = project(&session);
        assert_eq!(view.status, StatusLine::WaitingForPlayers);
        assert!(view.cells.iter().all(|c| !c.enabled));
        assert!(view
            .cells
            .iter()
            .all(|c| c.highlight == CellHighlight::None));
    }

    #[test]
    fn poison_selection_highlights_free_cells() {
        let mut session = Session::new(0, 2, 10);
        session.apply(&ServerMessage::InitialSetup {});
        let view = project(&session);
        assert_eq!(view.status, StatusLine::ChooseYourPoison);
        assert!(view.cells.iter().all(|c| c.enabled));
        assert_eq!(view.cells[0].highlight, CellHighlight::SelectableForPoison);
    }

    #[test]
    fn awaiting_server_after_poison_choice() {
        let mut session = Session::new(0, 2, 10);
        session.apply(&ServerMessage::InitialSetup {});
        session.choose_poison(5).unwrap();
        let view = project(&session);
        assert_eq!(view.status, StatusLine::AwaitingServer);
        assert!(view.cells.iter().all(|c| !c.enabled));
    }

    #[test]
    fn play_view_reflects_turn_and_poison() {
        let session = session_in_play(0);
        let view = project(&session);
        assert_eq!(view.status, StatusLine::YourTurn);
        assert_eq!(view.cells[0].highlight, CellHighlight::SelectableForPick);
        // Known poison cells are never clickable.
        assert!(!view.cells[47].enabled);
        assert_eq!(view.cells[47].highlight, CellHighlight::None);

        let view = project(&session_in_play(1));
        assert_eq!(view.status, StatusLine::OpponentTurn { player_id: 1 });
        assert!(view.cells.iter().all(|c| !c.enabled));
    }

    #[test]
    fn taken_cells_render_taken() {
        let mut session = session_in_play(0);
        let mut taken = vec![false; 100];
        taken[3] = true;
        session.apply(&ServerMessage::Update {
            turn: 0,
            taken,
            last_pick_index: Some(3),
            last_player_id: Some(1),
        });
        let view = project(&session);
        assert_eq!(view.cells[3].highlight, CellHighlight::Taken);
        assert!(!view.cells[3].enabled);
    }

    #[test]
    fn terminal_view_reveals_poison_and_reports_outcome() {
        let mut session = session_in_play(0);
        session.apply(&ServerMessage::GameOver {
            loser_ids: vec![1],
            poison_indices: vec![5, 47],
            poison_index_picked: Some(47),
        });
        let view = project(&session);
        assert_eq!(view.cells[5].highlight, CellHighlight::PoisonRevealed);
        assert_eq!(view.cells[47].highlight, CellHighlight::PoisonRevealed);
        assert!(view.cells.iter().all(|c| !c.enabled));
        assert_eq!(
            view.status,
            StatusLine::GameOver {
                outcome: GameOutcome::Won { loser_ids: vec![1] }
            }
        );
    }

    #[test]
    fn status_lines_render_one_based_player_numbers() {
        assert_eq!(
            StatusLine::OpponentTurn { player_id: 1 }.to_string(),
            "Player 2's turn."
        );
        assert_eq!(
            StatusLine::GameOver {
                outcome: GameOutcome::Won { loser_ids: vec![1] }
            }
            .to_string(),
            "Game over: player(s) 2 picked poison. You win!"
        );
        assert_eq!(
            StatusLine::GameOver {
                outcome: GameOutcome::Aborted {
                    disconnected_player_id: 0
                }
            }
            .to_string(),
            "Game over: player 1 disconnected."
        );
    }
}
