//! Edit-mode state: a two-version scheme with one committed snapshot and
//! the working grid. Every mutator is a no-op while edit mode is off.

use crate::cell::CellValue;
use crate::grid::Grid;

#[derive(Debug, Clone, Default)]
pub struct EditSession {
    is_edit_mode: bool,
    has_unsaved_changes: bool,
    /// Snapshot taken on entering edit mode; refreshed on commit or
    /// re-entry, restored by `cancel`.
    original: Grid,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_edit_mode(&self) -> bool {
        self.is_edit_mode
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    /// Enter edit mode, snapshotting the current grid. Never mutates data;
    /// entering while already active just refreshes the snapshot.
    pub fn enter(&mut self, grid: &Grid) {
        self.original = grid.clone();
        self.is_edit_mode = true;
    }

    /// Replace a single cell. Row 0 is the header; callers pass row >= 1
    /// by convention. Returns whether the mutation was applied.
    pub fn update_cell(
        &mut self,
        grid: &mut Grid,
        row: usize,
        col: usize,
        value: CellValue,
    ) -> bool {
        if !self.is_edit_mode {
            return false;
        }
        grid.set_cell(row, col, value);
        self.has_unsaved_changes = true;
        true
    }

    /// Insert a row of empty cells, header-width wide, after `after` (or at
    /// the end). Returns the insertion index when applied.
    pub fn add_row(&mut self, grid: &mut Grid, after: Option<usize>) -> Option<usize> {
        if !self.is_edit_mode {
            return None;
        }
        let index = after
            .map(|i| i + 1)
            .unwrap_or_else(|| grid.row_count())
            .min(grid.row_count());
        let row = vec![CellValue::Empty; grid.width()];
        grid.insert_row(index, row);
        self.has_unsaved_changes = true;
        Some(index)
    }

    /// Remove a data row. The header (row 0) is protected; deleting it is
    /// a no-op. Returns whether a row was removed.
    pub fn delete_row(&mut self, grid: &mut Grid, row: usize) -> bool {
        if !self.is_edit_mode || row == 0 {
            return false;
        }
        if grid.remove_row(row).is_none() {
            return false;
        }
        self.has_unsaved_changes = true;
        true
    }

    /// Accept the working grid as the new committed version. Returns true
    /// when there were changes to commit (the caller persists in that
    /// case); a clean session is a no-op.
    pub fn commit(&mut self, grid: &Grid) -> bool {
        if !self.has_unsaved_changes {
            return false;
        }
        self.original = grid.clone();
        self.has_unsaved_changes = false;
        true
    }

    /// Leave edit mode. A dirty session restores the grid from the
    /// snapshot first; a clean one just exits.
    pub fn cancel(&mut self, grid: &mut Grid) {
        if self.has_unsaved_changes {
            *grid = self.original.clone();
            self.has_unsaved_changes = false;
        }
        self.is_edit_mode = false;
    }
}
