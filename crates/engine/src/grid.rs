use serde::{Deserialize, Serialize};

use crate::cell::CellValue;

pub type Row = Vec<CellValue>;

const EMPTY_CELL: CellValue = CellValue::Empty;

/// The canonical in-memory table: row 0 is the header, rows 1..N are data.
///
/// Width is derived from the header; short rows read as `Empty` at missing
/// trailing positions rather than storing padding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    rows: Vec<Row>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        Grid { rows }
    }

    /// Build a grid from freshly extracted rows: drop trailing rows that
    /// are fully empty per the canonical rule, then truncate every row to
    /// the highest column index that is non-empty in any surviving row.
    /// Interior empty rows and columns are preserved.
    pub fn trimmed(mut rows: Vec<Row>) -> Self {
        let last_non_empty = rows
            .iter()
            .rposition(|row| row.iter().any(CellValue::is_non_empty));
        let Some(last) = last_non_empty else {
            return Grid::default();
        };
        rows.truncate(last + 1);

        let mut width = 0usize;
        for row in &rows {
            if let Some(idx) = row.iter().rposition(CellValue::is_non_empty) {
                width = width.max(idx + 1);
            }
        }
        for row in &mut rows {
            row.truncate(width);
        }

        Grid { rows }
    }

    /// Canonicalize every cell. Typically the last step of loading.
    pub fn normalized(self) -> Self {
        Grid {
            rows: self
                .rows
                .into_iter()
                .map(|row| row.into_iter().map(CellValue::normalize).collect())
                .collect(),
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total row count, header included.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The header row, or an empty slice when the grid has no rows.
    pub fn headers(&self) -> &[CellValue] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Derived column count (header length).
    pub fn width(&self) -> usize {
        self.headers().len()
    }

    /// Data rows only (everything after the header).
    pub fn data_rows(&self) -> &[Row] {
        if self.rows.len() > 1 {
            &self.rows[1..]
        } else {
            &[]
        }
    }

    /// Cell access with out-of-range reads yielding `Empty`.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Replace a single cell, growing the target row (and the row list)
    /// with empty cells as needed.
    pub fn set_cell(&mut self, row: usize, col: usize, value: CellValue) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let target = &mut self.rows[row];
        if target.len() <= col {
            target.resize(col + 1, CellValue::Empty);
        }
        target[col] = value;
    }

    pub fn insert_row(&mut self, index: usize, row: Row) {
        let index = index.min(self.rows.len());
        self.rows.insert(index, row);
    }

    pub fn remove_row(&mut self, index: usize) -> Option<Row> {
        if index < self.rows.len() {
            Some(self.rows.remove(index))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_trim_drops_trailing_empty_rows_only() {
        let rows = vec![
            vec![text("Name"), text("Amt")],
            vec![CellValue::Empty, CellValue::Empty],
            vec![text("A"), text("10")],
            vec![CellValue::Empty, text("")],
            vec![text("null"), text("N/A")],
        ];
        let grid = Grid::trimmed(rows);
        // Rows after the last non-empty row are dropped; the interior
        // empty row at index 1 survives.
        assert_eq!(grid.row_count(), 3);
        assert_eq!(grid.cell(2, 0), &text("A"));
    }

    #[test]
    fn test_trim_truncates_tail_columns() {
        let rows = vec![
            vec![text("Name"), text("Amt"), CellValue::Empty, text("n/a")],
            vec![text("A"), text("10"), CellValue::Empty, CellValue::Empty],
        ];
        let grid = Grid::trimmed(rows);
        assert_eq!(grid.headers().len(), 2);
        assert_eq!(grid.rows()[1].len(), 2);
    }

    #[test]
    fn test_trim_preserves_interior_empty_columns() {
        let rows = vec![
            vec![text("A"), CellValue::Empty, text("C")],
            vec![text("1"), CellValue::Empty, text("3")],
        ];
        let grid = Grid::trimmed(rows);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.cell(1, 1), &CellValue::Empty);
    }

    #[test]
    fn test_trim_all_empty_yields_empty_grid() {
        let rows = vec![
            vec![CellValue::Empty, text("  ")],
            vec![text("null"), text("#N/A")],
        ];
        assert!(Grid::trimmed(rows).is_empty());
    }

    #[test]
    fn test_cell_out_of_range_reads_empty() {
        let grid = Grid::from_rows(vec![vec![text("H")]]);
        assert_eq!(grid.cell(0, 5), &CellValue::Empty);
        assert_eq!(grid.cell(9, 0), &CellValue::Empty);
    }

    #[test]
    fn test_set_cell_pads_short_rows() {
        let mut grid = Grid::from_rows(vec![vec![text("H1"), text("H2")], vec![text("a")]]);
        grid.set_cell(1, 3, text("x"));
        assert_eq!(grid.rows()[1].len(), 4);
        assert_eq!(grid.cell(1, 1), &CellValue::Empty);
        assert_eq!(grid.cell(1, 3), &text("x"));
    }

    #[test]
    fn test_headers_of_empty_grid() {
        let grid = Grid::new();
        assert!(grid.headers().is_empty());
        assert_eq!(grid.width(), 0);
        assert!(grid.data_rows().is_empty());
    }
}
