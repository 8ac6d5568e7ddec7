//! The session hub.
//!
//! Owns the grid, file identity, search/filter/edit state, and the loading
//! flag; persists itself to the durable store under one fixed key and
//! broadcasts typed change events. All mutation is synchronous; the only
//! asynchronous collaborators are file parsing and the store itself.
//!
//! Cross-context reconciliation is last-writer-wins: whichever context
//! persisted most recently owns the durable record, and `refresh_from_store`
//! replaces local state wholesale. There is no merge or conflict detection.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use gridhub_engine::cell::CellValue;
use gridhub_engine::edit::EditSession;
use gridhub_engine::filter::{self, FilterState};
use gridhub_engine::grid::{Grid, Row};
use gridhub_io::error::{ExportError, LoadError};
use gridhub_io::export::{self, ExportFormat};
use gridhub_io::import::{self, LoadedSheet};

use crate::events::{DataChangedEvent, EventCallback, StoreEvent};
use crate::kv::KvStore;
use crate::notice::{Notice, NoticeSink};

/// The single fixed key holding the persisted session.
pub const STORAGE_KEY: &str = "gridhub:last_data";

/// Durable record shape. Field names are camelCase on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub rows: Grid,
    pub file_name: String,
    pub updated_at: i64,
}

/// What a successful load reports (feeds the upload notification).
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    pub file_name: String,
    pub sheet_name: String,
    pub sheet_count: usize,
    pub data_rows: usize,
}

impl std::fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} data rows loaded from {} (sheet: {})",
            self.data_rows, self.file_name, self.sheet_name
        )?;
        if self.sheet_count > 1 {
            write!(f, " • {} sheets available", self.sheet_count)?;
        }
        Ok(())
    }
}

pub struct SessionState {
    grid: Grid,
    file_name: String,
    search_term: String,
    filters: FilterState,
    edit: EditSession,
    is_loading: bool,
    store: Option<KvStore>,
    data_listeners: Vec<EventCallback>,
    storage_listeners: Vec<EventCallback>,
    notifier: Option<Box<dyn NoticeSink>>,
    /// Cached visible data rows; dropped whenever grid, search term, or
    /// filters change so unchanged inputs return a stable slice.
    visible_cache: Option<Vec<Row>>,
}

impl SessionState {
    pub fn new(store: Option<KvStore>) -> Self {
        Self {
            grid: Grid::new(),
            file_name: String::new(),
            search_term: String::new(),
            filters: FilterState::new(),
            edit: EditSession::new(),
            is_loading: false,
            store,
            data_listeners: Vec::new(),
            storage_listeners: Vec::new(),
            notifier: None,
            visible_cache: None,
        }
    }

    /// A session with no durable store: everything works, nothing persists.
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn with_notifier(mut self, sink: Box<dyn NoticeSink>) -> Self {
        self.notifier = Some(sink);
        self
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn headers(&self) -> &[CellValue] {
        self.grid.headers()
    }

    pub fn is_edit_mode(&self) -> bool {
        self.edit.is_edit_mode()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.edit.has_unsaved_changes()
    }

    // -------------------------------------------------------------------
    // Event channels
    // -------------------------------------------------------------------

    /// Subscribe to in-memory grid replacements (every replacement,
    /// including uncommitted edit mutations).
    pub fn subscribe_data(&mut self, callback: EventCallback) {
        self.data_listeners.push(callback);
    }

    /// Subscribe to durable-store writes and deletes.
    pub fn subscribe_storage(&mut self, callback: EventCallback) {
        self.storage_listeners.push(callback);
    }

    fn emit_data(&mut self, event: &StoreEvent) {
        for callback in &mut self.data_listeners {
            callback(event);
        }
    }

    fn emit_storage(&mut self, event: &StoreEvent) {
        for callback in &mut self.storage_listeners {
            callback(event);
        }
    }

    fn data_payload(&self) -> DataChangedEvent {
        DataChangedEvent {
            rows: self.grid.clone(),
            file_name: self.file_name.clone(),
            updated_at: Utc::now().timestamp_millis(),
        }
    }

    fn notify(&mut self, notice: Notice) {
        if let Some(sink) = &mut self.notifier {
            sink.notify(notice);
        }
    }

    // -------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------

    /// Restore grid and file name from the durable store, if a record
    /// exists. Storage failures are logged and swallowed.
    pub fn hydrate(&mut self) {
        let Some(record) = self.read_record() else {
            return;
        };
        self.grid = record.rows;
        self.file_name = record.file_name;
        self.visible_cache = None;
    }

    fn read_record(&self) -> Option<StoredRecord> {
        let store = self.store.as_ref()?;
        let raw = match store.get(STORAGE_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!("durable store read failed: {err}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!("discarding malformed stored record: {err}");
                None
            }
        }
    }

    /// Serialize the current grid under the fixed key and broadcast. A
    /// storage failure degrades to in-memory operation: logged, not
    /// surfaced, and the data channel still fires.
    pub fn persist(&mut self) {
        let record = StoredRecord {
            rows: self.grid.clone(),
            file_name: self.file_name.clone(),
            updated_at: Utc::now().timestamp_millis(),
        };
        let payload = DataChangedEvent {
            rows: record.rows.clone(),
            file_name: record.file_name.clone(),
            updated_at: record.updated_at,
        };

        let written = match serde_json::to_string(&record) {
            Ok(json) => match self.store.as_ref().map(|s| s.put(STORAGE_KEY, &json)) {
                Some(Ok(())) => true,
                Some(Err(err)) => {
                    tracing::warn!("durable store write failed; continuing in memory: {err}");
                    false
                }
                None => false,
            },
            Err(err) => {
                tracing::warn!("failed to serialize stored record: {err}");
                false
            }
        };

        if written {
            self.emit_storage(&StoreEvent::DataReplaced(payload.clone()));
        }
        self.emit_data(&StoreEvent::DataReplaced(payload));
    }

    /// Cross-context sync: re-read the durable entry and replace local
    /// state wholesale (clearing it when the record is gone). Last writer
    /// wins.
    pub fn refresh_from_store(&mut self) {
        match self.read_record() {
            Some(record) => {
                self.grid = record.rows;
                self.file_name = record.file_name;
            }
            None => {
                self.grid = Grid::new();
                self.file_name.clear();
            }
        }
        self.visible_cache = None;
        let payload = self.data_payload();
        self.emit_data(&StoreEvent::DataReplaced(payload));
    }

    /// Reset grid, file name, search, filters, and edit state; delete the
    /// durable entry and broadcast the deletion.
    pub fn clear(&mut self) {
        self.grid = Grid::new();
        self.file_name.clear();
        self.search_term.clear();
        self.filters = FilterState::new();
        self.edit = EditSession::new();
        self.visible_cache = None;

        let deleted = match self.store.as_ref().map(|s| s.delete(STORAGE_KEY)) {
            Some(Ok(())) => true,
            Some(Err(err)) => {
                tracing::warn!("durable store delete failed: {err}");
                false
            }
            None => false,
        };
        if deleted {
            self.emit_storage(&StoreEvent::DataCleared);
        }
        self.emit_data(&StoreEvent::DataCleared);
        self.notify(Notice::success("Data cleared", "Ready for a new file upload."));
    }

    // -------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------

    /// Load a file and replace the grid wholesale. The loading flag guards
    /// re-entry and clears on every path out; on failure the previous grid
    /// is untouched.
    pub fn load_file(&mut self, path: &Path) -> Result<LoadSummary, LoadError> {
        if self.is_loading {
            tracing::warn!("upload already in flight; ignoring {}", path.display());
            return Err(LoadError::Io("another upload is in progress".to_string()));
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        self.is_loading = true;
        let result = import::load_path(path);
        self.is_loading = false;

        match result {
            Ok(loaded) => {
                let LoadedSheet {
                    grid,
                    sheet_name,
                    sheet_count,
                } = loaded;
                let summary = LoadSummary {
                    file_name: file_name.clone(),
                    sheet_name,
                    sheet_count,
                    data_rows: grid.data_rows().len(),
                };
                self.replace_grid(grid, file_name);
                self.notify(Notice::success("File uploaded", summary.to_string()));
                Ok(summary)
            }
            Err(err) => {
                self.notify(Notice::error("Failed to read file", err.to_string()));
                Err(err)
            }
        }
    }

    /// Install an already-loaded grid (the load path minus file IO):
    /// replaces state, persists, broadcasts.
    pub fn replace_grid(&mut self, grid: Grid, file_name: impl Into<String>) {
        self.grid = grid;
        self.file_name = file_name.into();
        self.visible_cache = None;
        self.persist();
    }

    // -------------------------------------------------------------------
    // Search and filters
    // -------------------------------------------------------------------

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
        self.visible_cache = None;
    }

    pub fn toggle_column_filter(&mut self, col: usize, value: impl Into<String>) {
        self.filters.toggle(col, value);
        self.visible_cache = None;
    }

    pub fn clear_column_filter(&mut self, col: usize) {
        self.filters.clear_column(col);
        self.visible_cache = None;
    }

    /// Visible data rows under the current search and filters. The result
    /// is cached until one of the three inputs changes.
    pub fn visible_data_rows(&mut self) -> &[Row] {
        let grid = &self.grid;
        let term = &self.search_term;
        let filters = &self.filters;
        self.visible_cache
            .get_or_insert_with(|| filter::visible_data_rows(grid, term, filters))
    }

    /// Header (when present) followed by the visible data rows.
    pub fn filtered_rows(&mut self) -> Vec<Row> {
        let header = self.headers().to_vec();
        let data = self.visible_data_rows().to_vec();
        if header.is_empty() {
            data
        } else {
            let mut rows = Vec::with_capacity(data.len() + 1);
            rows.push(header);
            rows.extend(data);
            rows
        }
    }

    pub fn unique_values_by_column(&self) -> std::collections::HashMap<usize, Vec<String>> {
        filter::unique_values_by_column(&self.grid)
    }

    // -------------------------------------------------------------------
    // Editing
    // -------------------------------------------------------------------

    pub fn enter_edit_mode(&mut self) {
        self.edit.enter(&self.grid);
    }

    pub fn update_cell(&mut self, row: usize, col: usize, value: CellValue) -> bool {
        if !self.edit.update_cell(&mut self.grid, row, col, value) {
            return false;
        }
        self.after_edit_mutation();
        true
    }

    pub fn add_row(&mut self, after: Option<usize>) -> Option<usize> {
        let index = self.edit.add_row(&mut self.grid, after)?;
        self.after_edit_mutation();
        self.notify(Notice::success(
            "Row added",
            format!("New row added at position {}", index + 1),
        ));
        Some(index)
    }

    pub fn delete_row(&mut self, row: usize) -> bool {
        if !self.edit.delete_row(&mut self.grid, row) {
            return false;
        }
        self.after_edit_mutation();
        self.notify(Notice::success(
            "Row deleted",
            format!("Row {} has been deleted", row + 1),
        ));
        true
    }

    /// Edit mutations broadcast the full updated grid on the data channel
    /// without persisting; the durable copy changes only on save.
    fn after_edit_mutation(&mut self) {
        self.visible_cache = None;
        let payload = self.data_payload();
        self.emit_data(&StoreEvent::DataReplaced(payload));
    }

    /// Commit pending edits: persist and refresh the snapshot. Returns
    /// false when there was nothing to save.
    pub fn save_changes(&mut self) -> bool {
        if !self.edit.commit(&self.grid) {
            return false;
        }
        self.persist();
        self.notify(Notice::success(
            "Changes saved",
            "Your modifications have been saved.",
        ));
        true
    }

    /// Roll back pending edits (when dirty) and leave edit mode.
    pub fn cancel_changes(&mut self) {
        let was_dirty = self.edit.has_unsaved_changes();
        self.edit.cancel(&mut self.grid);
        if was_dirty {
            self.visible_cache = None;
            let payload = self.data_payload();
            self.emit_data(&StoreEvent::DataReplaced(payload));
            self.notify(Notice::success(
                "Changes cancelled",
                "All modifications have been reverted.",
            ));
        }
    }

    // -------------------------------------------------------------------
    // Export
    // -------------------------------------------------------------------

    /// Export header + visible data rows into `out_dir`, deriving the file
    /// name from the uploaded name. Exports always reflect active
    /// filters and search.
    pub fn export(&mut self, format: ExportFormat, out_dir: &Path) -> Result<PathBuf, ExportError> {
        if self.grid.is_empty() {
            self.notify(Notice::error("No data to export", "Please upload a file first."));
            return Err(ExportError::NoData);
        }

        let header = self.headers().to_vec();
        let data = self.visible_data_rows().to_vec();
        let mut rows = Vec::with_capacity(data.len() + 1);
        if !header.is_empty() {
            rows.push(header);
        }
        rows.extend(data);

        let name = export::export_file_name(&self.file_name, format);
        let path = out_dir.join(name);
        match export::export_rows(&rows, format, &path) {
            Ok(()) => {
                self.notify(Notice::success(
                    "File exported",
                    format!("Data saved as {}", path.display()),
                ));
                Ok(path)
            }
            Err(err) => {
                self.notify(Notice::error("Export failed", err.to_string()));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventCollector;
    use crate::notice::{NoticeCollector, NoticeKind};
    use tempfile::tempdir;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn sample_grid() -> Grid {
        Grid::from_rows(vec![
            vec![text("Name"), text("Amt")],
            vec![text("A"), text("10")],
            vec![text("B"), text("20")],
            vec![text("A"), text("5")],
        ])
    }

    #[test]
    fn test_persist_and_hydrate_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");

        let mut session = SessionState::new(Some(KvStore::open(&path).unwrap()));
        session.replace_grid(sample_grid(), "report.xlsx");

        let mut restored = SessionState::new(Some(KvStore::open(&path).unwrap()));
        restored.hydrate();
        assert_eq!(restored.grid(), &sample_grid());
        assert_eq!(restored.file_name(), "report.xlsx");
    }

    #[test]
    fn test_clear_deletes_durable_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");

        let mut session = SessionState::new(Some(KvStore::open(&path).unwrap()));
        session.replace_grid(sample_grid(), "report.xlsx");
        session.set_search_term("a");
        session.toggle_column_filter(0, "A");
        session.clear();

        assert!(session.grid().is_empty());
        assert_eq!(session.file_name(), "");
        assert_eq!(session.search_term(), "");
        assert!(session.filters().is_empty());

        let mut restored = SessionState::new(Some(KvStore::open(&path).unwrap()));
        restored.hydrate();
        assert!(restored.grid().is_empty());
    }

    #[test]
    fn test_persist_fires_both_channels() {
        let data = EventCollector::new();
        let storage = EventCollector::new();

        let mut session = SessionState::new(Some(KvStore::open_in_memory().unwrap()));
        session.subscribe_data(data.callback());
        session.subscribe_storage(storage.callback());

        session.replace_grid(sample_grid(), "report.xlsx");

        assert_eq!(data.replaced().len(), 1);
        assert_eq!(storage.replaced().len(), 1);
        let payload = &data.replaced()[0];
        assert_eq!(payload.file_name, "report.xlsx");
        assert_eq!(&payload.rows, &sample_grid());
    }

    #[test]
    fn test_in_memory_session_skips_storage_channel() {
        let data = EventCollector::new();
        let storage = EventCollector::new();

        let mut session = SessionState::in_memory();
        session.subscribe_data(data.callback());
        session.subscribe_storage(storage.callback());

        session.replace_grid(sample_grid(), "report.xlsx");

        assert_eq!(data.replaced().len(), 1);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_edit_mutations_broadcast_without_persisting() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");

        let data = EventCollector::new();
        let mut session = SessionState::new(Some(KvStore::open(&path).unwrap()));
        session.replace_grid(sample_grid(), "report.xlsx");
        session.subscribe_data(data.callback());

        session.enter_edit_mode();
        assert!(session.update_cell(1, 0, text("Z")));
        assert!(session.has_unsaved_changes());

        // The event carries the full updated grid.
        let events = data.replaced();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].rows.cell(1, 0), &text("Z"));

        // The durable copy still has the committed value.
        let mut other = SessionState::new(Some(KvStore::open(&path).unwrap()));
        other.hydrate();
        assert_eq!(other.grid().cell(1, 0), &text("A"));

        // Saving persists it.
        assert!(session.save_changes());
        other.refresh_from_store();
        assert_eq!(other.grid().cell(1, 0), &text("Z"));
    }

    #[test]
    fn test_cancel_restores_and_broadcasts() {
        let data = EventCollector::new();
        let mut session = SessionState::in_memory();
        session.replace_grid(sample_grid(), "report.xlsx");
        session.subscribe_data(data.callback());

        session.enter_edit_mode();
        session.update_cell(1, 0, text("Z"));
        session.cancel_changes();

        assert_eq!(session.grid(), &sample_grid());
        assert!(!session.is_edit_mode());
        // One event for the mutation, one for the rollback.
        assert_eq!(data.replaced().len(), 2);
    }

    #[test]
    fn test_mutations_ignored_outside_edit_mode() {
        let mut session = SessionState::in_memory();
        session.replace_grid(sample_grid(), "report.xlsx");

        assert!(!session.update_cell(1, 0, text("Z")));
        assert!(session.add_row(None).is_none());
        assert!(!session.delete_row(1));
        assert_eq!(session.grid(), &sample_grid());
    }

    #[test]
    fn test_visible_rows_cached_until_inputs_change() {
        let mut session = SessionState::in_memory();
        session.replace_grid(sample_grid(), "report.xlsx");

        let first = session.visible_data_rows().as_ptr();
        let second = session.visible_data_rows().as_ptr();
        assert_eq!(first, second, "unchanged inputs should reuse the cache");

        session.set_search_term("b");
        assert_eq!(session.visible_data_rows().len(), 1);

        session.set_search_term("");
        session.toggle_column_filter(0, "A");
        assert_eq!(session.visible_data_rows().len(), 2);
    }

    #[test]
    fn test_filtered_rows_reattach_header() {
        let mut session = SessionState::in_memory();
        session.replace_grid(sample_grid(), "report.xlsx");
        session.set_search_term("b");

        let rows = session.filtered_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![text("Name"), text("Amt")]);
        assert_eq!(rows[1], vec![text("B"), text("20")]);
    }

    #[test]
    fn test_refresh_from_store_clears_when_record_gone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");

        let mut writer = SessionState::new(Some(KvStore::open(&path).unwrap()));
        writer.replace_grid(sample_grid(), "report.xlsx");

        let mut reader = SessionState::new(Some(KvStore::open(&path).unwrap()));
        reader.hydrate();
        assert!(!reader.grid().is_empty());

        writer.clear();
        reader.refresh_from_store();
        assert!(reader.grid().is_empty());
        assert_eq!(reader.file_name(), "");
    }

    #[test]
    fn test_export_reflects_filters() {
        let dir = tempdir().unwrap();
        let mut session = SessionState::in_memory();
        session.replace_grid(sample_grid(), "report.xlsx");
        session.toggle_column_filter(0, "B");

        let path = session.export(ExportFormat::Csv, dir.path()).unwrap();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("report_export.csv")
        );
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Name,Amt"));
        assert!(content.contains("B,20"));
        assert!(!content.contains("A,10"));
    }

    #[test]
    fn test_export_empty_notifies_error() {
        let dir = tempdir().unwrap();
        let notices = NoticeCollector::new();
        let mut session = SessionState::in_memory().with_notifier(notices.sink());

        assert!(matches!(
            session.export(ExportFormat::Csv, dir.path()),
            Err(ExportError::NoData)
        ));
        let seen = notices.notices();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, NoticeKind::Error);
    }

    #[test]
    fn test_load_failure_leaves_previous_grid() {
        let dir = tempdir().unwrap();
        let notices = NoticeCollector::new();
        let mut session = SessionState::in_memory().with_notifier(notices.sink());
        session.replace_grid(sample_grid(), "report.xlsx");

        let bogus = dir.path().join("data.txt");
        std::fs::write(&bogus, "nope").unwrap();
        assert!(matches!(
            session.load_file(&bogus),
            Err(LoadError::InvalidFileType { .. })
        ));

        assert_eq!(session.grid(), &sample_grid());
        assert_eq!(session.file_name(), "report.xlsx");
        assert!(!session.is_loading());
        assert!(notices
            .notices()
            .iter()
            .any(|n| n.kind == NoticeKind::Error));
    }
}
