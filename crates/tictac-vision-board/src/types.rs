use serde::{Deserialize, Serialize};
use tictac_vision_core::CELL_COUNT;

/// The two marker kinds, told apart by colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerKind {
    A,
    B,
}

impl MarkerKind {
    pub fn other(self) -> Self {
        match self {
            MarkerKind::A => MarkerKind::B,
            MarkerKind::B => MarkerKind::A,
        }
    }
}

/// Reading of one cell in one frame. `Occupied(None)` means the owner is not
/// (yet) known.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellState {
    #[default]
    Empty,
    Occupied(Option<MarkerKind>),
}

impl CellState {
    #[inline]
    pub fn is_empty(self) -> bool {
        matches!(self, CellState::Empty)
    }

    #[inline]
    pub fn is_occupied(self) -> bool {
        !self.is_empty()
    }

    #[inline]
    pub fn owner(self) -> Option<MarkerKind> {
        match self {
            CellState::Empty => None,
            CellState::Occupied(owner) => owner,
        }
    }
}

/// All nine cell states plus the frame counter they were observed at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub cells: [CellState; CELL_COUNT],
    pub frame: u64,
}

impl BoardSnapshot {
    /// Indices of occupied cells, ascending.
    pub fn occupied(&self) -> Vec<usize> {
        (0..CELL_COUNT)
            .filter(|&i| self.cells[i].is_occupied())
            .collect()
    }

    /// Compact text form, one row per line: `.` empty, `?` unknown owner.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(12);
        for (i, state) in self.cells.iter().enumerate() {
            out.push(match state {
                CellState::Empty => '.',
                CellState::Occupied(None) => '?',
                CellState::Occupied(Some(MarkerKind::A)) => 'A',
                CellState::Occupied(Some(MarkerKind::B)) => 'B',
            });
            if i % 3 == 2 && i + 1 < CELL_COUNT {
                out.push('\n');
            }
        }
        out
    }
}
