//! The editor session: one owner for every store.
//!
//! [`Session`] holds the source grid, the destination schema, the column
//! mapping, the selection engine and the latest validation result. Every
//! public method is one user intent. Stores are kept behind [`Arc`] and
//! mutated through [`Arc::make_mut`], so a [`SessionSnapshot`] taken before
//! an intent keeps seeing the old data while the session moves on.
//!
//! Validation is recomputed in full at the end of every intent that changed
//! data, schema, or mapping. Intents that only move focus leave it alone.

use std::{fmt, sync::Arc};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    config::{DEFAULT_TITLE, SessionConfig},
    error::ConfigError,
    grid::{CellPosition, Grid, HeaderPasteOutcome},
    mapping::{ColumnMapping, MappingSummary, mapping_summary},
    paste::{is_multi_cell, parse_clipboard, parse_picklist_lines},
    schema::{ColumnDefinition, ColumnType, Schema, ValidationConstraints},
    selection::{GridBounds, KeyOutcome, NavKey, SelectionEngine, SelectionPhase, SelectionState},
    validation::{ValidationError, ValidationResult, validate_grid},
};

/// What pointer and keyboard input means right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    #[default]
    Edit,
    View,
    Delete,
    Configure,
    Map,
}

impl EditorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditorMode::Edit => "edit",
            EditorMode::View => "view",
            EditorMode::Delete => "delete",
            EditorMode::Configure => "configure",
            EditorMode::Map => "map",
        }
    }
}

impl fmt::Display for EditorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cheap, immutable view of a session at one point in time.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub title: String,
    pub mode: EditorMode,
    pub grid: Arc<Grid>,
    pub destination: Arc<Schema>,
    pub mapping: Arc<ColumnMapping>,
    pub selection: SelectionState,
    pub validation: Arc<ValidationResult>,
}

#[derive(Debug, Clone)]
pub struct Session {
    title: String,
    mode: EditorMode,
    grid: Arc<Grid>,
    destination: Arc<Schema>,
    mapping: Arc<ColumnMapping>,
    selection: SelectionEngine,
    validation: Arc<ValidationResult>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(
            Grid::default(),
            Schema::default_destination(),
            ColumnMapping::new(),
        )
    }
}

impl Session {
    pub fn new(grid: Grid, destination: Schema, mapping: ColumnMapping) -> Self {
        let mut session = Self {
            title: DEFAULT_TITLE.to_string(),
            mode: EditorMode::default(),
            grid: Arc::new(grid),
            destination: Arc::new(destination),
            mapping: Arc::new(mapping),
            selection: SelectionEngine::new(),
            validation: Arc::default(),
        };
        session.revalidate();
        session
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
        config.check()?;
        let grid = Grid::new(config.source_schema(), config.row_count());
        let mut session = Self::new(grid, config.destination_schema(), config.column_mapping());
        session.set_title(&config.title);
        Ok(session)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn source_schema(&self) -> &Schema {
        self.grid.schema()
    }

    pub fn destination(&self) -> &Schema {
        &self.destination
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    pub fn selection_state(&self) -> SelectionState {
        self.selection.state()
    }

    pub fn selection_phase(&self) -> SelectionPhase {
        self.selection.phase()
    }

    pub fn validation(&self) -> &ValidationResult {
        &self.validation
    }

    pub fn errors_for_cell(&self, row: usize, dest_key: &str) -> Vec<&ValidationError> {
        self.validation.errors_for_cell(row, dest_key)
    }

    pub fn mapping_summary(&self) -> MappingSummary {
        mapping_summary(&self.destination, &self.mapping)
    }

    pub fn bounds(&self) -> GridBounds {
        GridBounds::new(self.grid.row_count(), self.grid.column_count())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            title: self.title.clone(),
            mode: self.mode,
            grid: Arc::clone(&self.grid),
            destination: Arc::clone(&self.destination),
            mapping: Arc::clone(&self.mapping),
            selection: self.selection.state(),
            validation: Arc::clone(&self.validation),
        }
    }

    /// Recomputes every validation error from the current stores.
    pub fn revalidate(&mut self) {
        self.validation = Arc::new(validate_grid(
            &self.grid,
            &self.destination,
            &self.mapping,
        ));
    }

    fn grid_mut(&mut self) -> &mut Grid {
        Arc::make_mut(&mut self.grid)
    }

    fn destination_mut(&mut self) -> &mut Schema {
        Arc::make_mut(&mut self.destination)
    }

    fn mapping_mut(&mut self) -> &mut ColumnMapping {
        Arc::make_mut(&mut self.mapping)
    }

    fn committed(&mut self, changed: bool) -> bool {
        if changed {
            self.revalidate();
        }
        changed
    }

    /// Blank titles fall back to the default title.
    pub fn set_title(&mut self, title: &str) {
        let trimmed = title.trim();
        self.title = if trimmed.is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            trimmed.to_string()
        };
    }

    pub fn focus_title(&mut self) {
        self.selection.reset();
    }

    pub fn set_mode(&mut self, mode: EditorMode) {
        if self.mode != mode {
            debug!("Switching mode {} -> {}", self.mode, mode);
        }
        self.mode = mode;
        self.selection.reset();
    }

    pub fn set_cell(&mut self, row: usize, column_key: &str, value: &str) -> bool {
        if row >= self.grid.row_count() || !self.grid.schema().contains_key(column_key) {
            debug!("Ignoring edit at row {row}, column '{column_key}'");
            return false;
        }
        let changed = self.grid_mut().set_cell(row, column_key, value);
        self.committed(changed)
    }

    pub fn set_cell_at(&mut self, position: CellPosition, value: &str) -> bool {
        match self.grid.column_key(position.col).map(str::to_string) {
            Some(key) => self.set_cell(position.row, &key, value),
            None => false,
        }
    }

    pub fn paste_block(&mut self, start_row: usize, start_col: usize, cells: &[Vec<String>]) -> usize {
        if !self.bounds().contains(CellPosition::new(start_row, start_col)) {
            return 0;
        }
        let written = self.grid_mut().paste_block(start_row, start_col, cells);
        self.committed(written > 0);
        written
    }

    /// Clipboard text pasted onto a cell: tabular text spreads across the
    /// grid, a single value replaces the cell.
    pub fn paste_text(&mut self, position: CellPosition, text: &str) -> usize {
        if is_multi_cell(text) {
            let cells = parse_clipboard(text);
            self.paste_block(position.row, position.col, &cells)
        } else {
            usize::from(self.set_cell_at(position, text))
        }
    }

    /// A block pasted onto a header: the first row relabels columns, the
    /// rest is pasted as data from row 0.
    pub fn paste_header_block(&mut self, col: usize, cells: &[Vec<String>]) -> HeaderPasteOutcome {
        if col >= self.grid.column_count() {
            return HeaderPasteOutcome::default();
        }
        let outcome = self.grid_mut().paste_headers(col, cells);
        self.committed(outcome.renamed > 0 || outcome.written > 0);
        outcome
    }

    pub fn paste_header_text(&mut self, col: usize, text: &str) -> HeaderPasteOutcome {
        let cells = parse_clipboard(text);
        self.paste_header_block(col, &cells)
    }

    pub fn add_row(&mut self) -> usize {
        let index = self.grid_mut().add_row();
        self.revalidate();
        index
    }

    /// Appends blank rows until the grid holds at least `count` rows.
    /// Returns how many were added.
    pub fn ensure_rows(&mut self, count: usize) -> usize {
        let missing = count.saturating_sub(self.grid.row_count());
        if missing == 0 {
            return 0;
        }
        let grid = self.grid_mut();
        for _ in 0..missing {
            grid.add_row();
        }
        self.revalidate();
        missing
    }

    pub fn delete_row(&mut self, index: usize) -> bool {
        if self.grid.row_count() <= 1 || index >= self.grid.row_count() {
            debug!("Ignoring row removal at {index}");
            return false;
        }
        self.grid_mut().delete_row(index);
        self.selection.clamp_to(self.bounds());
        self.committed(true)
    }

    pub fn add_column(&mut self) -> usize {
        let index = self.grid_mut().add_column();
        self.revalidate();
        index
    }

    /// Removes a source column together with every mapping that reads it.
    pub fn delete_column(&mut self, index: usize) -> Option<ColumnDefinition> {
        if self.grid.column_count() <= 1 || index >= self.grid.column_count() {
            debug!("Ignoring source column removal at {index}");
            return None;
        }
        let removed = self.grid_mut().delete_column(index)?;
        let unmapped = self.mapping_mut().remove_source(&removed.key);
        if unmapped > 0 {
            debug!(
                "Dropped {unmapped} mapping(s) that read column '{}'",
                removed.key
            );
        }
        self.selection.clamp_to(self.bounds());
        self.revalidate();
        Some(removed)
    }

    pub fn reorder_columns(&mut self, from: usize, to: usize) -> bool {
        let cols = self.grid.column_count();
        if from >= cols || to >= cols {
            return false;
        }
        let changed = self.grid_mut().reorder_columns(from, to);
        self.selection.clamp_to(self.bounds());
        self.committed(changed)
    }

    pub fn resize_column(&mut self, column_key: &str, proposed_width: i64) -> Option<u32> {
        if !self.grid.schema().contains_key(column_key) {
            return None;
        }
        self.grid_mut().resize_column(column_key, proposed_width)
    }

    pub fn rename_column(&mut self, index: usize, label: &str) -> bool {
        if index >= self.grid.column_count() {
            return false;
        }
        let changed = self.grid_mut().rename_column(index, label);
        self.committed(changed)
    }

    pub fn change_column_type(&mut self, index: usize, column_type: ColumnType) -> bool {
        if index >= self.grid.column_count() {
            return false;
        }
        let changed = self.grid_mut().change_column_type(index, column_type);
        self.committed(changed)
    }

    pub fn add_destination_column(&mut self, column_type: ColumnType) -> usize {
        let index = self.destination_mut().push_generated(Some(column_type));
        self.revalidate();
        index
    }

    /// Removes a destination column and its mapping entry. The last column stays.
    pub fn delete_destination_column(&mut self, index: usize) -> Option<ColumnDefinition> {
        if self.destination.len() <= 1 || index >= self.destination.len() {
            debug!("Ignoring destination column removal at {index}");
            return None;
        }
        let removed = self.destination_mut().remove(index)?;
        let destination = Arc::clone(&self.destination);
        self.mapping_mut().retain_destinations(&destination);
        self.revalidate();
        Some(removed)
    }

    pub fn rename_destination_column(&mut self, index: usize, label: &str) -> bool {
        if index >= self.destination.len() {
            return false;
        }
        let changed = self.destination_mut().rename(index, label);
        self.committed(changed)
    }

    pub fn set_destination_type(&mut self, index: usize, column_type: ColumnType) -> bool {
        if index >= self.destination.len() {
            return false;
        }
        let changed = self.destination_mut().set_type(index, column_type);
        self.committed(changed)
    }

    pub fn set_destination_optional(&mut self, index: usize, optional: bool) -> bool {
        if index >= self.destination.len() {
            return false;
        }
        let changed = self.destination_mut().set_optional(index, optional);
        self.committed(changed)
    }

    pub fn update_destination_constraints<F>(&mut self, index: usize, update: F) -> bool
    where
        F: FnOnce(&mut ValidationConstraints),
    {
        if index >= self.destination.len() {
            return false;
        }
        let changed = self.destination_mut().update_constraints(index, update);
        self.committed(changed)
    }

    pub fn set_picklist_values<I, S>(&mut self, index: usize, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if index >= self.destination.len() {
            return false;
        }
        let changed = self.destination_mut().set_picklist_values(index, values);
        self.committed(changed)
    }

    /// Appends one picklist value per pasted line.
    pub fn paste_picklist_values(&mut self, index: usize, text: &str) -> bool {
        let values = parse_picklist_lines(text);
        if values.is_empty() || index >= self.destination.len() {
            return false;
        }
        let changed = self.destination_mut().extend_picklist_values(index, values);
        self.committed(changed)
    }

    /// Maps a destination column to a source column; both keys must exist.
    pub fn set_mapping(&mut self, dest_key: &str, source_key: &str) -> bool {
        if !self.destination.contains_key(dest_key) || !self.grid.schema().contains_key(source_key) {
            debug!("Ignoring mapping {dest_key} -> {source_key}: unknown column");
            return false;
        }
        if self.mapping.source_for(dest_key) == Some(source_key) {
            return true;
        }
        self.mapping_mut().set_mapping(dest_key, source_key);
        self.committed(true)
    }

    pub fn clear_mapping(&mut self, dest_key: &str) -> bool {
        if !self.mapping.is_mapped(dest_key) {
            return false;
        }
        self.mapping_mut().clear_mapping(dest_key);
        self.committed(true)
    }

    /// Pointer-down on a cell. Edit mode opens the editor on the cell,
    /// delete mode drives the range selection, other modes ignore it.
    pub fn pointer_down(&mut self, position: CellPosition) -> SelectionPhase {
        let bounds = self.bounds();
        match self.mode {
            EditorMode::Edit => {
                self.selection.click_cell(position, bounds);
            }
            EditorMode::Delete => {
                self.selection.pointer_down(position, bounds);
            }
            EditorMode::View | EditorMode::Configure | EditorMode::Map => {}
        }
        self.selection.phase()
    }

    pub fn pointer_enter(&mut self, position: CellPosition) {
        if self.mode == EditorMode::Delete {
            let bounds = self.bounds();
            self.selection.pointer_enter(position, bounds);
        }
    }

    pub fn pointer_up(&mut self) {
        self.selection.pointer_up();
    }

    pub fn click_header(&mut self, col: usize) -> bool {
        if self.mode != EditorMode::Edit {
            return false;
        }
        let bounds = self.bounds();
        self.selection.focus_header(col, bounds)
    }

    pub fn begin_edit(&mut self) -> bool {
        self.mode == EditorMode::Edit && self.selection.begin_edit()
    }

    pub fn end_edit(&mut self) {
        self.selection.end_edit();
    }

    pub fn cancel_selection(&mut self) {
        self.selection.cancel_range();
    }

    /// Blanks every cell of the committed rectangle and returns to `Idle`.
    /// Returns the number of cells cleared; zero unless a rectangle is selected.
    pub fn delete_selection(&mut self) -> usize {
        let Some(range) = self.selection.take_selected_range() else {
            return 0;
        };
        let positions: Vec<CellPosition> = range.cells().collect();
        let cleared = self.grid_mut().clear_cells(&positions);
        info!("Cleared {cleared} cell(s) in rows {}..={}", range.start_row, range.end_row);
        self.committed(cleared > 0);
        cleared
    }

    /// Navigation and typing only apply in edit mode; delete mode takes
    /// Delete to commit the range and Escape to cancel it.
    pub fn handle_key(&mut self, key: NavKey) -> KeyOutcome {
        match (self.mode, key) {
            (EditorMode::Edit, _) => {}
            (EditorMode::Delete, NavKey::Delete) => {
                return if self.delete_selection() > 0 {
                    KeyOutcome::Handled
                } else {
                    KeyOutcome::Ignored
                };
            }
            (EditorMode::Delete, NavKey::Escape) => {}
            _ => return KeyOutcome::Ignored,
        }
        let bounds = self.bounds();
        let outcome = self.selection.handle_key(key, bounds);
        if let KeyOutcome::Seed { position, ch } = outcome {
            self.set_cell_at(position, &ch.to_string());
        }
        outcome
    }
}
