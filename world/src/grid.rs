//! Dense cell storage shared by the terrain grid and the play surface.

use portal_grid_core::{Cell, Direction, Position, WorldSize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Flattens a field whose dimensions were already validated against `size`.
    pub(crate) fn from_field(size: WorldSize, field: &[Vec<Cell>]) -> Self {
        Self {
            width: size.width,
            height: size.height,
            cells: field.iter().flatten().copied().collect(),
        }
    }

    pub(crate) fn size(&self) -> WorldSize {
        WorldSize {
            width: self.width,
            height: self.height,
        }
    }

    pub(crate) fn contains(&self, position: Position) -> bool {
        position.x() < self.width && position.y() < self.height
    }

    pub(crate) fn get(&self, position: Position) -> Option<Cell> {
        self.index(position)
            .and_then(|index| self.cells.get(index).copied())
    }

    /// Writes `cell` at `position`; out-of-bounds writes are ignored.
    pub(crate) fn set(&mut self, position: Position, cell: Cell) {
        if let Some(index) = self.index(position) {
            if let Some(slot) = self.cells.get_mut(index) {
                *slot = cell;
            }
        }
    }

    /// In-bounds neighbour of `position` in `direction`.
    pub(crate) fn neighbor(&self, position: Position, direction: Direction) -> Option<Position> {
        position
            .step(direction)
            .filter(|candidate| self.contains(*candidate))
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        let width = usize::try_from(self.width).unwrap_or(usize::MAX).max(1);
        self.cells.chunks(width)
    }

    fn index(&self, position: Position) -> Option<usize> {
        if self.contains(position) {
            let row = usize::try_from(position.y()).ok()?;
            let column = usize::try_from(position.x()).ok()?;
            let width = usize::try_from(self.width).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}
