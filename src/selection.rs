//! Focus, edit mode, and range selection.
//!
//! The engine tracks three things: which cell or header has focus (and
//! whether the focused cell is being edited), the click-to-start /
//! click-to-complete rectangular range used for bulk clearing, and whether a
//! pointer button is held. It never touches cell data; callers apply the
//! effects it reports (a seeded keystroke, a committed range) to the grid.
//!
//! Grid dimensions are passed in on every call, so a stale position is
//! clamped or dropped instead of being trusted.

use std::collections::BTreeSet;

use itertools::iproduct;
use log::debug;
use serde::Serialize;

use crate::grid::CellPosition;

/// Row and column counts of the grid being navigated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    pub rows: usize,
    pub cols: usize,
}

impl GridBounds {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub fn contains(&self, position: CellPosition) -> bool {
        position.within(self.rows, self.cols)
    }

    fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }
}

/// Inclusive rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellRange {
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

impl CellRange {
    /// Normalizes two corners so start <= end.
    pub fn new(a: CellPosition, b: CellPosition) -> Self {
        Self {
            start_row: a.row.min(b.row),
            start_col: a.col.min(b.col),
            end_row: a.row.max(b.row),
            end_col: a.col.max(b.col),
        }
    }

    pub fn single(position: CellPosition) -> Self {
        Self::new(position, position)
    }

    pub fn contains(&self, position: CellPosition) -> bool {
        (self.start_row..=self.end_row).contains(&position.row)
            && (self.start_col..=self.end_col).contains(&position.col)
    }

    pub fn cell_count(&self) -> usize {
        (self.end_row - self.start_row + 1) * (self.end_col - self.start_col + 1)
    }

    /// Row-major iteration.
    pub fn cells(&self) -> impl Iterator<Item = CellPosition> + use<> {
        iproduct!(self.start_row..=self.end_row, self.start_col..=self.end_col)
            .map(|(row, col)| CellPosition::new(row, col))
    }

    fn fits(&self, bounds: GridBounds) -> bool {
        self.end_row < bounds.rows && self.end_col < bounds.cols
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectionPhase {
    Idle,
    CellFocused,
    CellEditing,
    HeaderFocused,
    RangeAnchored,
    RangeSelected,
}

/// Flattened view of the engine for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionState {
    pub focused_cell: Option<CellPosition>,
    pub focused_header: Option<usize>,
    pub is_editing: bool,
    pub multi_selection: BTreeSet<CellPosition>,
    pub range_anchor: Option<CellPosition>,
    pub is_dragging: bool,
}

/// Already-decoded keyboard intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Up,
    Down,
    Left,
    Right,
    Tab,
    Enter,
    Escape,
    /// Delete/Backspace outside an open editor.
    Delete,
    /// A single printable character typed without modifiers.
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Handled,
    /// Edit mode opened on `position`; its value must become `ch`.
    Seed { position: CellPosition, ch: char },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Focus {
    #[default]
    None,
    Cell {
        position: CellPosition,
        editing: bool,
    },
    Header(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum RangeSelection {
    #[default]
    None,
    Anchored {
        anchor: CellPosition,
        preview: CellRange,
    },
    Selected {
        anchor: CellPosition,
        range: CellRange,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionEngine {
    focus: Focus,
    range: RangeSelection,
    dragging: bool,
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SelectionPhase {
        match (self.range, self.focus) {
            (RangeSelection::Anchored { .. }, _) => SelectionPhase::RangeAnchored,
            (RangeSelection::Selected { .. }, _) => SelectionPhase::RangeSelected,
            (RangeSelection::None, Focus::None) => SelectionPhase::Idle,
            (RangeSelection::None, Focus::Cell { editing: false, .. }) => {
                SelectionPhase::CellFocused
            }
            (RangeSelection::None, Focus::Cell { editing: true, .. }) => {
                SelectionPhase::CellEditing
            }
            (RangeSelection::None, Focus::Header(_)) => SelectionPhase::HeaderFocused,
        }
    }

    pub fn state(&self) -> SelectionState {
        let (focused_cell, is_editing) = match self.focus {
            Focus::Cell { position, editing } => (Some(position), editing),
            _ => (None, false),
        };
        let focused_header = match self.focus {
            Focus::Header(col) => Some(col),
            _ => None,
        };
        let (multi_selection, range_anchor) = match self.range {
            RangeSelection::None => (BTreeSet::new(), None),
            RangeSelection::Anchored { anchor, preview } => {
                (preview.cells().collect(), Some(anchor))
            }
            RangeSelection::Selected { anchor, range } => (range.cells().collect(), Some(anchor)),
        };
        SelectionState {
            focused_cell,
            focused_header,
            is_editing,
            multi_selection,
            range_anchor,
            is_dragging: self.dragging,
        }
    }

    pub fn focused_cell(&self) -> Option<CellPosition> {
        match self.focus {
            Focus::Cell { position, .. } => Some(position),
            _ => None,
        }
    }

    pub fn focused_header(&self) -> Option<usize> {
        match self.focus {
            Focus::Header(col) => Some(col),
            _ => None,
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.focus, Focus::Cell { editing: true, .. })
    }

    /// The committed rectangle, if one is selected.
    pub fn selected_range(&self) -> Option<CellRange> {
        match self.range {
            RangeSelection::Selected { range, .. } => Some(range),
            _ => None,
        }
    }

    pub fn is_selected(&self, position: CellPosition) -> bool {
        match self.range {
            RangeSelection::None => false,
            RangeSelection::Anchored { preview, .. } => preview.contains(position),
            RangeSelection::Selected { range, .. } => range.contains(position),
        }
    }

    /// Back to `Idle`: no focus, no edit, no range.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Focuses a cell, optionally opening edit mode. Out-of-bounds targets are ignored.
    pub fn focus_cell(&mut self, position: CellPosition, editing: bool, bounds: GridBounds) -> bool {
        if !bounds.contains(position) {
            return false;
        }
        self.focus = Focus::Cell { position, editing };
        self.range = RangeSelection::None;
        true
    }

    pub fn focus_header(&mut self, col: usize, bounds: GridBounds) -> bool {
        if col >= bounds.cols {
            return false;
        }
        self.focus = Focus::Header(col);
        self.range = RangeSelection::None;
        true
    }

    /// A click on a cell while editing is allowed: focus and open the editor.
    pub fn click_cell(&mut self, position: CellPosition, bounds: GridBounds) -> bool {
        self.focus_cell(position, true, bounds)
    }

    pub fn begin_edit(&mut self) -> bool {
        match &mut self.focus {
            Focus::Cell { editing, .. } => {
                *editing = true;
                true
            }
            _ => false,
        }
    }

    pub fn end_edit(&mut self) {
        if let Focus::Cell { editing, .. } = &mut self.focus {
            *editing = false;
        }
    }

    /// Range mode pointer-down: the first click anchors, the second fixes the rectangle.
    pub fn pointer_down(&mut self, position: CellPosition, bounds: GridBounds) -> SelectionPhase {
        if !bounds.contains(position) {
            debug!("Ignoring pointer-down outside grid at {position:?}");
            return self.phase();
        }
        self.focus = Focus::None;
        self.dragging = true;
        self.range = match self.range {
            RangeSelection::Anchored { anchor, .. } => RangeSelection::Selected {
                anchor,
                range: CellRange::new(anchor, position),
            },
            RangeSelection::None | RangeSelection::Selected { .. } => RangeSelection::Anchored {
                anchor: position,
                preview: CellRange::single(position),
            },
        };
        self.phase()
    }

    /// Hover while anchored previews the rectangle without committing it.
    pub fn pointer_enter(&mut self, position: CellPosition, bounds: GridBounds) {
        if !bounds.contains(position) {
            return;
        }
        if let RangeSelection::Anchored { anchor, preview } = &mut self.range {
            *preview = CellRange::new(*anchor, position);
        }
    }

    pub fn pointer_up(&mut self) {
        self.dragging = false;
    }

    pub fn cancel_range(&mut self) {
        self.range = RangeSelection::None;
        self.dragging = false;
    }

    /// Consumes a committed rectangle, returning the engine to `Idle`. Does
    /// nothing unless a rectangle is selected.
    pub fn take_selected_range(&mut self) -> Option<CellRange> {
        let range = self.selected_range()?;
        self.reset();
        Some(range)
    }

    /// Pulls focus and range back inside `bounds` after the grid shrinks.
    pub fn clamp_to(&mut self, bounds: GridBounds) {
        if bounds.is_empty() {
            self.reset();
            return;
        }
        match &mut self.focus {
            Focus::Cell { position, .. } => {
                position.row = position.row.min(bounds.rows - 1);
                position.col = position.col.min(bounds.cols - 1);
            }
            Focus::Header(col) => *col = (*col).min(bounds.cols - 1),
            Focus::None => {}
        }
        let stale = match self.range {
            RangeSelection::None => false,
            RangeSelection::Anchored { anchor, preview } => {
                !bounds.contains(anchor) || !preview.fits(bounds)
            }
            RangeSelection::Selected { range, .. } => !range.fits(bounds),
        };
        if stale {
            debug!("Dropping range selection outside {bounds:?}");
            self.cancel_range();
        }
    }

    pub fn handle_key(&mut self, key: NavKey, bounds: GridBounds) -> KeyOutcome {
        self.clamp_to(bounds);
        match self.focus {
            Focus::Header(col) => self.handle_header_key(col, key, bounds),
            Focus::Cell { position, editing } => {
                self.handle_cell_key(position, editing, key, bounds)
            }
            Focus::None => {
                if key == NavKey::Escape && self.range != RangeSelection::None {
                    self.cancel_range();
                    KeyOutcome::Handled
                } else {
                    KeyOutcome::Ignored
                }
            }
        }
    }

    fn handle_header_key(&mut self, col: usize, key: NavKey, bounds: GridBounds) -> KeyOutcome {
        let moved = match key {
            NavKey::Up => {
                self.focus_cell(CellPosition::new(bounds.rows - 1, col), false, bounds)
            }
            NavKey::Down => self.focus_cell(CellPosition::new(0, col), true, bounds),
            NavKey::Left if col > 0 => self.focus_header(col - 1, bounds),
            NavKey::Right => self.focus_header(col + 1, bounds),
            NavKey::Tab => {
                if col + 1 < bounds.cols {
                    self.focus_header(col + 1, bounds)
                } else {
                    self.focus_cell(CellPosition::new(0, 0), true, bounds)
                }
            }
            NavKey::Enter => self.focus_cell(CellPosition::new(0, col), true, bounds),
            _ => false,
        };
        if moved {
            KeyOutcome::Handled
        } else {
            KeyOutcome::Ignored
        }
    }

    fn handle_cell_key(
        &mut self,
        position: CellPosition,
        editing: bool,
        key: NavKey,
        bounds: GridBounds,
    ) -> KeyOutcome {
        let CellPosition { row, col } = position;
        if matches!(key, NavKey::Tab | NavKey::Enter) && !editing {
            self.begin_edit();
            return KeyOutcome::Handled;
        }
        let target = match key {
            NavKey::Up if row == 0 => {
                self.focus_header(col, bounds);
                return KeyOutcome::Handled;
            }
            NavKey::Up => CellPosition::new(row - 1, col),
            NavKey::Down => CellPosition::new((row + 1).min(bounds.rows - 1), col),
            NavKey::Left => CellPosition::new(row, col.saturating_sub(1)),
            NavKey::Right => CellPosition::new(row, (col + 1).min(bounds.cols - 1)),
            NavKey::Tab => {
                if col + 1 < bounds.cols {
                    CellPosition::new(row, col + 1)
                } else if row + 1 < bounds.rows {
                    CellPosition::new(row + 1, 0)
                } else {
                    CellPosition::new(0, 0)
                }
            }
            NavKey::Enter => {
                if row + 1 < bounds.rows {
                    CellPosition::new(row + 1, col)
                } else {
                    CellPosition::new(0, col)
                }
            }
            NavKey::Escape => {
                if editing {
                    self.end_edit();
                } else {
                    self.cancel_range();
                }
                return KeyOutcome::Handled;
            }
            NavKey::Delete => return KeyOutcome::Ignored,
            NavKey::Char(ch) => {
                if editing || ch.is_control() {
                    return KeyOutcome::Ignored;
                }
                self.focus = Focus::Cell {
                    position,
                    editing: true,
                };
                return KeyOutcome::Seed { position, ch };
            }
        };
        // Tab/Enter only get here with the editor open; it reopens on arrival.
        self.focus_cell(target, editing, bounds);
        KeyOutcome::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: GridBounds = GridBounds::new(3, 3);

    fn pos(row: usize, col: usize) -> CellPosition {
        CellPosition::new(row, col)
    }

    #[test]
    fn second_click_fixes_rectangle() {
        let mut engine = SelectionEngine::new();
        assert_eq!(
            engine.pointer_down(pos(0, 0), BOUNDS),
            SelectionPhase::RangeAnchored
        );
        assert_eq!(engine.state().multi_selection.len(), 1);
        assert_eq!(
            engine.pointer_down(pos(2, 1), BOUNDS),
            SelectionPhase::RangeSelected
        );
        let selected: Vec<_> = engine.state().multi_selection.into_iter().collect();
        assert_eq!(
            selected,
            vec![
                pos(0, 0),
                pos(0, 1),
                pos(1, 0),
                pos(1, 1),
                pos(2, 0),
                pos(2, 1)
            ]
        );
    }

    #[test]
    fn reversed_corners_normalize() {
        let range = CellRange::new(pos(2, 2), pos(1, 0));
        assert_eq!(range.start_row, 1);
        assert_eq!(range.start_col, 0);
        assert_eq!(range.cell_count(), 6);
        assert!(range.contains(pos(2, 1)));
        assert!(!range.contains(pos(0, 1)));
    }

    #[test]
    fn hover_previews_without_committing() {
        let mut engine = SelectionEngine::new();
        engine.pointer_down(pos(0, 0), BOUNDS);
        engine.pointer_enter(pos(1, 1), BOUNDS);
        assert_eq!(engine.phase(), SelectionPhase::RangeAnchored);
        assert_eq!(engine.state().multi_selection.len(), 4);
        assert!(engine.selected_range().is_none());

        engine.pointer_enter(pos(0, 1), BOUNDS);
        assert_eq!(engine.state().multi_selection.len(), 2);
    }

    #[test]
    fn hover_is_ignored_outside_anchored_phase() {
        let mut engine = SelectionEngine::new();
        engine.pointer_enter(pos(1, 1), BOUNDS);
        assert_eq!(engine.phase(), SelectionPhase::Idle);
        assert!(engine.state().multi_selection.is_empty());
    }

    #[test]
    fn click_after_selection_starts_new_anchor() {
        let mut engine = SelectionEngine::new();
        engine.pointer_down(pos(0, 0), BOUNDS);
        engine.pointer_down(pos(1, 1), BOUNDS);
        engine.pointer_down(pos(2, 2), BOUNDS);
        assert_eq!(engine.phase(), SelectionPhase::RangeAnchored);
        assert_eq!(engine.state().range_anchor, Some(pos(2, 2)));
    }

    #[test]
    fn dragging_tracks_pointer_buttons() {
        let mut engine = SelectionEngine::new();
        engine.pointer_down(pos(0, 0), BOUNDS);
        assert!(engine.state().is_dragging);
        engine.pointer_up();
        assert!(!engine.state().is_dragging);
    }

    #[test]
    fn escape_cancels_range() {
        let mut engine = SelectionEngine::new();
        engine.pointer_down(pos(0, 0), BOUNDS);
        engine.pointer_down(pos(1, 1), BOUNDS);
        assert_eq!(engine.handle_key(NavKey::Escape, BOUNDS), KeyOutcome::Handled);
        assert_eq!(engine.phase(), SelectionPhase::Idle);
        assert_eq!(engine.state(), SelectionState::default());
    }

    #[test]
    fn take_selected_range_requires_committed_rectangle() {
        let mut engine = SelectionEngine::new();
        engine.pointer_down(pos(0, 0), BOUNDS);
        assert!(engine.take_selected_range().is_none());
        engine.pointer_down(pos(0, 2), BOUNDS);
        let range = engine.take_selected_range().expect("committed range");
        assert_eq!(range.cell_count(), 3);
        assert_eq!(engine.phase(), SelectionPhase::Idle);
    }

    #[test]
    fn arrows_clamp_to_bounds() {
        let mut engine = SelectionEngine::new();
        engine.focus_cell(pos(2, 2), false, BOUNDS);
        engine.handle_key(NavKey::Down, BOUNDS);
        engine.handle_key(NavKey::Right, BOUNDS);
        assert_eq!(engine.focused_cell(), Some(pos(2, 2)));
        engine.handle_key(NavKey::Left, BOUNDS);
        engine.handle_key(NavKey::Up, BOUNDS);
        assert_eq!(engine.focused_cell(), Some(pos(1, 1)));
    }

    #[test]
    fn up_from_first_row_focuses_header_and_down_returns() {
        let mut engine = SelectionEngine::new();
        engine.focus_cell(pos(0, 1), false, BOUNDS);
        engine.handle_key(NavKey::Up, BOUNDS);
        assert_eq!(engine.phase(), SelectionPhase::HeaderFocused);
        assert_eq!(engine.focused_header(), Some(1));
        engine.handle_key(NavKey::Down, BOUNDS);
        assert_eq!(engine.focused_cell(), Some(pos(0, 1)));
        assert_eq!(engine.phase(), SelectionPhase::CellEditing);
    }

    #[test]
    fn up_from_header_jumps_to_last_row() {
        let mut engine = SelectionEngine::new();
        engine.focus_header(1, BOUNDS);
        assert_eq!(engine.handle_key(NavKey::Up, BOUNDS), KeyOutcome::Handled);
        assert_eq!(engine.focused_cell(), Some(pos(2, 1)));
        assert_eq!(engine.phase(), SelectionPhase::CellFocused);
    }

    #[test]
    fn tab_and_enter_open_editor_in_place_when_closed() {
        let mut engine = SelectionEngine::new();
        engine.focus_cell(pos(1, 1), false, BOUNDS);
        assert_eq!(engine.handle_key(NavKey::Tab, BOUNDS), KeyOutcome::Handled);
        assert_eq!(engine.focused_cell(), Some(pos(1, 1)));
        assert_eq!(engine.phase(), SelectionPhase::CellEditing);

        engine.end_edit();
        assert_eq!(engine.handle_key(NavKey::Enter, BOUNDS), KeyOutcome::Handled);
        assert_eq!(engine.focused_cell(), Some(pos(1, 1)));
        assert_eq!(engine.phase(), SelectionPhase::CellEditing);
    }

    #[test]
    fn header_left_right_clamp() {
        let mut engine = SelectionEngine::new();
        engine.focus_header(0, BOUNDS);
        assert_eq!(engine.handle_key(NavKey::Left, BOUNDS), KeyOutcome::Ignored);
        engine.handle_key(NavKey::Right, BOUNDS);
        engine.handle_key(NavKey::Right, BOUNDS);
        engine.handle_key(NavKey::Right, BOUNDS);
        assert_eq!(engine.focused_header(), Some(2));
    }

    #[test]
    fn tab_on_last_header_enters_first_cell_editing() {
        let mut engine = SelectionEngine::new();
        engine.focus_header(2, BOUNDS);
        engine.handle_key(NavKey::Tab, BOUNDS);
        assert_eq!(engine.focused_cell(), Some(pos(0, 0)));
        assert!(engine.is_editing());
    }

    #[test]
    fn tab_wraps_rows_and_grid() {
        let mut engine = SelectionEngine::new();
        engine.focus_cell(pos(0, 2), true, BOUNDS);
        engine.handle_key(NavKey::Tab, BOUNDS);
        assert_eq!(engine.focused_cell(), Some(pos(1, 0)));
        assert!(engine.is_editing());

        engine.focus_cell(pos(2, 2), true, BOUNDS);
        engine.handle_key(NavKey::Tab, BOUNDS);
        assert_eq!(engine.focused_cell(), Some(pos(0, 0)));
        assert!(engine.is_editing());
    }

    #[test]
    fn enter_advances_rows_and_wraps_to_top() {
        let mut engine = SelectionEngine::new();
        engine.focus_cell(pos(1, 1), true, BOUNDS);
        engine.handle_key(NavKey::Enter, BOUNDS);
        assert_eq!(engine.focused_cell(), Some(pos(2, 1)));
        engine.handle_key(NavKey::Enter, BOUNDS);
        assert_eq!(engine.focused_cell(), Some(pos(0, 1)));
        assert!(engine.is_editing());
    }

    #[test]
    fn printable_key_opens_editor_with_seed() {
        let mut engine = SelectionEngine::new();
        engine.focus_cell(pos(1, 0), false, BOUNDS);
        assert_eq!(
            engine.handle_key(NavKey::Char('x'), BOUNDS),
            KeyOutcome::Seed {
                position: pos(1, 0),
                ch: 'x'
            }
        );
        assert_eq!(engine.phase(), SelectionPhase::CellEditing);
        assert_eq!(engine.handle_key(NavKey::Char('y'), BOUNDS), KeyOutcome::Ignored);
    }

    #[test]
    fn escape_closes_editor_but_keeps_focus() {
        let mut engine = SelectionEngine::new();
        engine.click_cell(pos(1, 1), BOUNDS);
        engine.handle_key(NavKey::Escape, BOUNDS);
        assert_eq!(engine.phase(), SelectionPhase::CellFocused);
        assert_eq!(engine.focused_cell(), Some(pos(1, 1)));
    }

    #[test]
    fn focus_and_header_are_exclusive() {
        let mut engine = SelectionEngine::new();
        engine.click_cell(pos(1, 1), BOUNDS);
        engine.focus_header(0, BOUNDS);
        let state = engine.state();
        assert_eq!(state.focused_cell, None);
        assert_eq!(state.focused_header, Some(0));
        assert!(!state.is_editing);
        assert!(!engine.begin_edit());
    }

    #[test]
    fn clamp_pulls_focus_back_and_drops_stale_range() {
        let mut engine = SelectionEngine::new();
        engine.focus_cell(pos(2, 2), true, BOUNDS);
        engine.clamp_to(GridBounds::new(2, 2));
        assert_eq!(engine.focused_cell(), Some(pos(1, 1)));

        engine.pointer_down(pos(0, 0), BOUNDS);
        engine.pointer_down(pos(2, 2), BOUNDS);
        engine.clamp_to(GridBounds::new(2, 3));
        assert_eq!(engine.phase(), SelectionPhase::Idle);
    }

    #[test]
    fn out_of_bounds_targets_are_ignored() {
        let mut engine = SelectionEngine::new();
        assert!(!engine.focus_cell(pos(5, 0), false, BOUNDS));
        assert_eq!(
            engine.pointer_down(pos(0, 7), BOUNDS),
            SelectionPhase::Idle
        );
        assert_eq!(engine.handle_key(NavKey::Down, BOUNDS), KeyOutcome::Ignored);
    }
}
