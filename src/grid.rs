//! Row storage for the source table.
//!
//! [`Grid`] owns the source [`Schema`], the rows (each a key → text map) and
//! the pixel widths of resized columns. Every row holds an entry for every
//! source column key; column additions and removals rewrite all rows in the
//! same call so the shape never drifts.
//!
//! Operations addressing a row or column that does not exist are ignored and
//! report that nothing changed. Nothing here validates cell contents; see
//! [`crate::validation`].

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::schema::{ColumnDefinition, ColumnType, Schema};

pub const DEFAULT_COLUMN_WIDTH: u32 = 150;
pub const MIN_COLUMN_WIDTH: u32 = 80;
pub const MAX_COLUMN_WIDTH: u32 = 450;
pub const DEFAULT_ROW_COUNT: usize = 5;

pub type RowData = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPosition {
    pub row: usize,
    pub col: usize,
}

impl CellPosition {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn within(&self, row_count: usize, col_count: usize) -> bool {
        self.row < row_count && self.col < col_count
    }
}

/// Result of pasting a block whose first row carries column labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderPasteOutcome {
    pub renamed: usize,
    pub written: usize,
}

#[derive(Debug, Clone)]
pub struct Grid {
    schema: Schema,
    rows: Vec<RowData>,
    widths: BTreeMap<String, u32>,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(Schema::default_source(), DEFAULT_ROW_COUNT)
    }
}

impl Grid {
    pub fn new(schema: Schema, row_count: usize) -> Self {
        let rows = (0..row_count).map(|_| empty_row(&schema)).collect();
        Self {
            schema,
            rows,
            widths: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[RowData] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&RowData> {
        self.rows.get(index)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    pub fn column_key(&self, col: usize) -> Option<&str> {
        self.schema.column(col).map(|column| column.key.as_str())
    }

    pub fn cell(&self, row: usize, column_key: &str) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|data| data.get(column_key))
            .map(String::as_str)
    }

    pub fn cell_at(&self, position: CellPosition) -> Option<&str> {
        let key = self.column_key(position.col)?;
        self.cell(position.row, key)
    }

    /// Cell values of one row in current column order.
    pub fn row_values(&self, index: usize) -> Option<Vec<&str>> {
        let row = self.rows.get(index)?;
        Some(
            self.schema
                .columns()
                .iter()
                .map(|column| row.get(&column.key).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }

    pub fn is_blank_row(&self, index: usize) -> bool {
        self.rows
            .get(index)
            .is_some_and(|row| row.values().all(|value| value.trim().is_empty()))
    }

    pub fn set_cell(&mut self, row: usize, column_key: &str, value: &str) -> bool {
        if !self.schema.contains_key(column_key) {
            debug!("Ignoring edit for unknown column '{column_key}'");
            return false;
        }
        match self.rows.get_mut(row) {
            Some(data) => {
                data.insert(column_key.to_string(), value.to_string());
                true
            }
            None => {
                debug!(
                    "Ignoring edit at row {row} ({} row(s) present)",
                    self.rows.len()
                );
                false
            }
        }
    }

    pub fn set_cell_at(&mut self, position: CellPosition, value: &str) -> bool {
        match self.column_key(position.col).map(str::to_string) {
            Some(key) => self.set_cell(position.row, &key, value),
            None => false,
        }
    }

    /// Blanks every listed cell; returns the number of cells touched.
    pub fn clear_cells<'a, I>(&mut self, positions: I) -> usize
    where
        I: IntoIterator<Item = &'a CellPosition>,
    {
        positions
            .into_iter()
            .filter(|position| self.set_cell_at(**position, ""))
            .count()
    }

    /// Writes `cells[r][c]` to `(start_row + r, start_col + c)`, dropping
    /// anything that falls outside the grid. Returns the number of cells written.
    pub fn paste_block(&mut self, start_row: usize, start_col: usize, cells: &[Vec<String>]) -> usize {
        let keys = self.schema.keys();
        let mut written = 0;
        for (offset_row, values) in cells.iter().enumerate() {
            let Some(row) = start_row
                .checked_add(offset_row)
                .and_then(|index| self.rows.get_mut(index))
            else {
                break;
            };
            for (key, value) in keys.iter().skip(start_col).zip(values) {
                row.insert(key.clone(), value.clone());
                written += 1;
            }
        }
        debug!(
            "Pasted {written} cell(s) at ({start_row}, {start_col}) from a {}-row block",
            cells.len()
        );
        written
    }

    /// Pastes into the header row: the first block row relabels columns from
    /// `start_col` onward (keys and types are kept) and the remaining rows
    /// are pasted as data starting at row 0.
    pub fn paste_headers(&mut self, start_col: usize, cells: &[Vec<String>]) -> HeaderPasteOutcome {
        let Some((labels, data)) = cells.split_first() else {
            return HeaderPasteOutcome::default();
        };
        let renamed = labels
            .iter()
            .enumerate()
            .filter(|(offset, label)| {
                start_col
                    .checked_add(*offset)
                    .is_some_and(|col| self.schema.rename(col, label))
            })
            .count();
        let written = self.paste_block(0, start_col, data);
        HeaderPasteOutcome { renamed, written }
    }

    pub fn add_row(&mut self) -> usize {
        self.rows.push(empty_row(&self.schema));
        self.rows.len() - 1
    }

    /// Removes a row; the last remaining row is kept.
    pub fn delete_row(&mut self, index: usize) -> Option<RowData> {
        if self.rows.len() <= 1 || index >= self.rows.len() {
            debug!("Ignoring row removal at {index}");
            return None;
        }
        Some(self.rows.remove(index))
    }

    /// Appends a source column with a generated key, backfilling every row.
    pub fn add_column(&mut self) -> usize {
        let index = self.schema.push_generated(None);
        if let Some(key) = self.column_key(index).map(str::to_string) {
            for row in &mut self.rows {
                row.insert(key.clone(), String::new());
            }
        }
        index
    }

    /// Removes a column and its values from every row. Refused when only
    /// one column remains.
    pub fn delete_column(&mut self, index: usize) -> Option<ColumnDefinition> {
        let removed = self.schema.remove(index)?;
        for row in &mut self.rows {
            row.remove(&removed.key);
        }
        self.widths.remove(&removed.key);
        Some(removed)
    }

    pub fn reorder_columns(&mut self, from: usize, to: usize) -> bool {
        self.schema.move_column(from, to)
    }

    pub fn rename_column(&mut self, index: usize, label: &str) -> bool {
        self.schema.rename(index, label)
    }

    pub fn change_column_type(&mut self, index: usize, column_type: ColumnType) -> bool {
        self.schema.set_type(index, column_type)
    }

    /// Stores a clamped width for the column and returns it.
    pub fn resize_column(&mut self, column_key: &str, proposed_width: i64) -> Option<u32> {
        if !self.schema.contains_key(column_key) {
            return None;
        }
        let width = proposed_width.clamp(MIN_COLUMN_WIDTH as i64, MAX_COLUMN_WIDTH as i64) as u32;
        self.widths.insert(column_key.to_string(), width);
        Some(width)
    }

    pub fn column_width(&self, column_key: &str) -> u32 {
        self.widths
            .get(column_key)
            .copied()
            .unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    pub fn total_width(&self) -> u32 {
        self.schema
            .columns()
            .iter()
            .map(|column| self.column_width(&column.key))
            .sum()
    }
}

fn empty_row(schema: &Schema) -> RowData {
    schema
        .columns()
        .iter()
        .map(|column| (column.key.clone(), String::new()))
        .collect()
}
