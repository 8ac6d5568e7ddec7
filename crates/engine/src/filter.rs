//! Free-text search and per-column value filters.
//!
//! Filters are keyed by column index and hold the accepted display strings
//! for that column. An empty accepted set is equivalent to an absent key:
//! neither restricts the column. Derivation is pure; the session layer
//! caches results on input identity so unchanged state re-renders cheaply.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::cell::CellValue;
use crate::grid::{Grid, Row};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    columns: HashMap<usize, HashSet<String>>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no column restricts anything (absent keys and empty sets
    /// alike).
    pub fn is_empty(&self) -> bool {
        self.columns.values().all(|set| set.is_empty())
    }

    /// Add `value` to the column's accepted set if absent, else remove it.
    /// Removing the last value leaves an empty set behind; that key only
    /// disappears via `clear_column`.
    pub fn toggle(&mut self, col: usize, value: impl Into<String>) {
        let set = self.columns.entry(col).or_default();
        let value = value.into();
        if !set.remove(&value) {
            set.insert(value);
        }
    }

    pub fn clear_column(&mut self, col: usize) {
        self.columns.remove(&col);
    }

    pub fn clear(&mut self) {
        self.columns.clear();
    }

    pub fn accepted(&self, col: usize) -> Option<&HashSet<String>> {
        self.columns.get(&col)
    }

    /// A row passes when, for every column with a non-empty accepted set,
    /// the row's display string at that column is a member.
    pub fn matches_row(&self, row: &[CellValue]) -> bool {
        for (&col, accepted) in &self.columns {
            if accepted.is_empty() {
                continue;
            }
            let value = row
                .get(col)
                .map(CellValue::to_display_string)
                .unwrap_or_default();
            if !accepted.contains(&value) {
                return false;
            }
        }
        true
    }
}

/// Case-insensitive substring match over every cell of the row. An empty
/// term matches everything.
pub fn row_matches_search(row: &[CellValue], lowered_term: &str) -> bool {
    if lowered_term.is_empty() {
        return true;
    }
    row.iter()
        .any(|cell| cell.to_display_string().to_lowercase().contains(lowered_term))
}

/// Derive the visible data rows (header excluded) for the current search
/// term and column filters.
pub fn visible_data_rows(grid: &Grid, search_term: &str, filters: &FilterState) -> Vec<Row> {
    let lowered = search_term.to_lowercase();
    grid.data_rows()
        .iter()
        .filter(|row| row_matches_search(row, &lowered) && filters.matches_row(row))
        .cloned()
        .collect()
}

/// Distinct display strings per column over the data rows, in first-seen
/// order. Missing cells contribute the empty string. Feeds filter menus.
pub fn unique_values_by_column(grid: &Grid) -> HashMap<usize, Vec<String>> {
    let width = grid
        .data_rows()
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(0)
        .max(grid.width());

    let mut map = HashMap::new();
    for col in 0..width {
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for row in grid.data_rows() {
            let value = row
                .get(col)
                .map(CellValue::to_display_string)
                .unwrap_or_default();
            if seen.insert(value.clone()) {
                values.push(value);
            }
        }
        map.insert(col, values);
    }
    map
}
