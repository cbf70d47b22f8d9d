//! Board model: a fixed-size grid of cell states.
//!
//! The board is a pure derived structure. It is mutated only by
//! [`Session`](crate::session::Session) transitions, which mirror
//! server-supplied state exactly — there is no client-side reconciliation
//! logic, so the board can never diverge from what the server last said.

use tracing::warn;

use crate::protocol::CellIndex;

/// Grid side length used when the config does not override it.
pub const DEFAULT_GRID_SIZE: usize = 10;

/// State of a single board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// Not yet picked by anyone.
    Free,
    /// Picked by some player during Play.
    Taken,
    /// Revealed as a poison cell at game end.
    PoisonRevealed,
}

/// A square grid of [`CellState`]s, indexed row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    grid_size: usize,
    cells: Vec<CellState>,
}

impl Board {
    /// Create a board of `grid_size` × `grid_size` free cells.
    pub fn new(grid_size: usize) -> Self {
        Self {
            grid_size,
            cells: vec![CellState::Free; grid_size * grid_size],
        }
    }

    /// Side length of the grid.
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the board has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// State of the cell at `index`, or `None` if out of bounds.
    pub fn cell(&self, index: CellIndex) -> Option<CellState> {
        self.cells.get(index).copied()
    }

    /// Returns `true` if `index` is in bounds and the cell is free.
    pub fn is_free(&self, index: CellIndex) -> bool {
        matches!(self.cell(index), Some(CellState::Free))
    }

    /// Iterate over all cell states in index order.
    pub fn iter(&self) -> impl Iterator<Item = CellState> + '_ {
        self.cells.iter().copied()
    }

    /// Overwrite the taken-state with the server-supplied array, exactly.
    ///
    /// The server is authoritative: `true` becomes [`CellState::Taken`] and
    /// `false` becomes [`CellState::Free`]. A taken cell reverting to free
    /// and a length mismatch are both protocol anomalies; they are logged
    /// and the overlapping prefix is still mirrored.
    pub(crate) fn mirror_taken(&mut self, taken: &[bool]) {
        if taken.len() != self.cells.len() {
            warn!(
                expected = self.cells.len(),
                got = taken.len(),
                "taken array length does not match board size"
            );
        }
        for (index, (cell, &is_taken)) in self.cells.iter_mut().zip(taken).enumerate() {
            let next = if is_taken {
                CellState::Taken
            } else {
                CellState::Free
            };
            if *cell == CellState::Taken && next == CellState::Free {
                warn!(index, "server reverted a taken cell to free");
            }
            *cell = next;
        }
    }

    /// Mark the given indices as revealed poison cells.
    ///
    /// Out-of-bounds indices are logged and skipped.
    pub(crate) fn reveal_poison(&mut self, indices: &[CellIndex]) {
        for &index in indices {
            match self.cells.get_mut(index) {
                Some(cell) => *cell = CellState::PoisonRevealed,
                None => warn!(index, "poison index out of bounds, skipping"),
            }
        }
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

    #[test]
    fn new_board_is_all_free() {
        let board = Board::new(10);
        assert_eq!(board.len(), 100);
        assert_eq!(board.grid_size(), 10);
        assert!(board.iter().all(|c| c == CellState::Free));
    }

    #[test]
    fn mirror_taken_matches_server_array_exactly() {
        let mut board = Board::new(3);
        let mut taken = vec![false; 9];
        taken[0] = true;
        taken[4] = true;
        board.mirror_taken(&taken);

        for i in 0..9 {
            let expected = if taken[i] {
                CellState::Taken
            } else {
                CellState::Free
            };
            assert_eq!(board.cell(i), Some(expected), "cell {i}");
        }
    }

    #[test]
    fn mirror_taken_is_not_reconciled_locally() {
        // A taken cell reverting to free is an anomaly but the server array
        // still wins — the board mirrors it exactly.
        let mut board = Board::new(2);
        board.mirror_taken(&[true, false, false, false]);
        board.mirror_taken(&[false, false, false, false]);
        assert_eq!(board.cell(0), Some(CellState::Free));
    }

    #[test]
    fn mirror_taken_tolerates_short_array() {
        let mut board = Board::new(2);
        board.mirror_taken(&[true, true]);
        assert_eq!(board.cell(0), Some(CellState::Taken));
        assert_eq!(board.cell(1), Some(CellState::Taken));
        assert_eq!(board.cell(2), Some(CellState::Free));
    }

    #[test]
    fn reveal_poison_marks_cells() {
        let mut board = Board::new(10);
        board.reveal_poison(&[3, 47]);
        assert_eq!(board.cell(3), Some(CellState::PoisonRevealed));
        assert_eq!(board.cell(47), Some(CellState::PoisonRevealed));
        assert_eq!(board.cell(4), Some(CellState::Free));
    }

    #[test]
    fn reveal_poison_skips_out_of_bounds() {
        let mut board = Board::new(2);
        board.reveal_poison(&[1, 99]);
        assert_eq!(board.cell(1), Some(CellState::PoisonRevealed));
        assert_eq!(board.len(), 4);
    }

    #[test]
    fn cell_out_of_bounds_is_none() {
        let board = Board::new(2);
        assert!(board.cell(4).is_none());
        assert!(!board.is_free(4));
    }
}
