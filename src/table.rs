//! Plain-text tables for terminal output.

use std::{borrow::Cow, fmt::Write as _};

use crate::{
    mapping::ColumnMapping,
    schema::{ColumnDefinition, Schema, ValidationConstraints},
    validation::ValidationResult,
};

const COLUMN_GAP: &str = "  ";

#[derive(Debug, Clone, Default)]
pub struct TextTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Rows shorter than the header are padded; extra cells are ignored.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let widths = self.widths();
        let mut output = String::new();
        let _ = writeln!(output, "{}", pad_line(&self.headers, &widths));
        let rules = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
        let _ = writeln!(output, "{}", pad_line(&rules, &widths));
        for row in &self.rows {
            let _ = writeln!(output, "{}", pad_line(row, &widths));
        }
        output
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths = self
            .headers
            .iter()
            .map(|h| visible_width(h).max(3))
            .collect::<Vec<_>>();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(visible_width(&flatten(cell)));
            }
        }
        widths
    }
}

fn pad_line(values: &[String], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = flatten(value);
            let padding = width.saturating_sub(visible_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    line.truncate(line.trim_end().len());
    line
}

/// Character count, skipping ANSI colour sequences.
fn visible_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn flatten(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

/// Short human summary of a column's rules, e.g. `required, unique, 0..120`.
pub fn describe_constraints(rules: &ValidationConstraints) -> String {
    let mut parts = Vec::new();
    if rules.requires_value() {
        parts.push("required".to_string());
    }
    if rules.requires_unique() {
        parts.push("unique".to_string());
    }
    match (rules.min_length, rules.max_length) {
        (Some(min), Some(max)) => parts.push(format!("length {min}..{max}")),
        (Some(min), None) => parts.push(format!("length >= {min}")),
        (None, Some(max)) => parts.push(format!("length <= {max}")),
        (None, None) => {}
    }
    if let Some(pattern) = rules.pattern.as_deref().filter(|p| !p.is_empty()) {
        parts.push(format!("/{pattern}/"));
    }
    match (rules.min, rules.max) {
        (Some(min), Some(max)) => parts.push(format!("{min}..{max}")),
        (Some(min), None) => parts.push(format!(">= {min}")),
        (None, Some(max)) => parts.push(format!("<= {max}")),
        (None, None) => {}
    }
    if let Some(format) = rules.date_format.as_deref() {
        parts.push(format.to_string());
    }
    if let Some(values) = rules.picklist_values.as_deref().filter(|v| !v.is_empty()) {
        parts.push(format!("one of {}", values.join("|")));
    }
    parts.join(", ")
}

pub fn column_table(schema: &Schema, mapping: Option<&ColumnMapping>) -> TextTable {
    let mut headers = vec!["#", "Key", "Label", "Type", "Optional", "Rules"];
    if mapping.is_some() {
        headers.push("Source");
    }
    let mut table = TextTable::new(headers);
    for (idx, column) in schema.columns().iter().enumerate() {
        let mut row = vec![
            (idx + 1).to_string(),
            column.key.clone(),
            column.label.clone(),
            column.type_name().to_string(),
            if column.optional { "yes" } else { "no" }.to_string(),
            describe_constraints(&column.validation),
        ];
        if let Some(mapping) = mapping {
            row.push(mapping.source_for(&column.key).unwrap_or("-").to_string());
        }
        table.push_row(row);
    }
    table
}

/// One line per error: 1-based row, destination column label, kind, message.
pub fn error_table(result: &ValidationResult, destination: &Schema) -> TextTable {
    let mut table = TextTable::new(["Row", "Column", "Kind", "Message"]);
    for error in result.errors() {
        let label = destination
            .column_by_key(&error.column_key)
            .map(|column: &ColumnDefinition| column.label.clone())
            .unwrap_or_else(|| error.column_key.clone());
        table.push_row(vec![
            (error.row + 1).to_string(),
            label,
            error.kind.as_str().to_string(),
            error.message.clone(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    #[test]
    fn render_aligns_columns_and_trims_trailing_space() {
        let mut table = TextTable::new(["Key", "Value"]);
        table.push_row(vec!["a".into(), "first\tline".into()]);
        table.push_row(vec!["longer".into()]);
        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Key     Value");
        assert_eq!(lines[1], "------  ----------");
        assert_eq!(lines[2], "a       first line");
        assert_eq!(lines[3], "longer");
    }

    #[test]
    fn visible_width_ignores_ansi_sequences() {
        assert_eq!(visible_width("\u{1b}[31mred\u{1b}[0m"), 3);
    }

    #[test]
    fn constraints_are_summarised() {
        let rules = ValidationConstraints {
            nullable: Some(false),
            min: Some(0.0),
            max: Some(120.0),
            ..ValidationConstraints::default()
        };
        assert_eq!(describe_constraints(&rules), "required, 0..120");
        assert_eq!(describe_constraints(&ValidationConstraints::default()), "");
    }

    #[test]
    fn column_table_lists_mapping_sources() {
        let schema = Schema::new(
            "field",
            vec![ColumnDefinition::new("email", "Email", ColumnType::String)],
        );
        let mut mapping = ColumnMapping::new();
        mapping.set_mapping("email", "col1");
        let rendered = column_table(&schema, Some(&mapping)).render();
        assert!(rendered.contains("Source"));
        assert!(rendered.lines().nth(2).is_some_and(|line| line.ends_with("col1")));
    }
}
