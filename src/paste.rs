//! Clipboard text to cell blocks.
//!
//! Pasted text is split into rows on `\n` / `\r\n` and into columns on `\t`.
//! A single trailing line break (as spreadsheets append when copying) does
//! not produce an extra empty row.

pub type CellBlock = Vec<Vec<String>>;

pub fn parse_clipboard(text: &str) -> CellBlock {
    if text.is_empty() {
        return Vec::new();
    }
    let body = text
        .strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text);
    body.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

/// True when pasted text spans more than one cell and should be spread
/// across the grid rather than typed into the focused cell.
pub fn is_multi_cell(text: &str) -> bool {
    text.contains(['\n', '\t'])
}

/// One picklist value per non-blank line.
pub fn parse_picklist_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
