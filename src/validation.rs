//! Constraint validation over the whole grid.
//!
//! [`validate`] is a pure function of the rows, the destination schema and
//! the column mapping. It is re-run from scratch after every change; nothing
//! is patched incrementally, so the reported errors can never lag behind the
//! data.
//!
//! ## Per-cell order
//!
//! 1. Resolve the source key through the mapping (unmapped columns are skipped).
//! 2. Blank values: report `nullable` when the column forbids blanks and the
//!    row holds other data; otherwise skip. Untouched trailing rows stay clean.
//! 3. Type rules: numbers and dates must parse, and a failure stops all
//!    further checks on that cell. Strings check length and pattern;
//!    picklists check membership.
//! 4. `unique`: a value already used by an earlier row is reported on the
//!    later row, naming the first row that holds it.
//!
//! Malformed regex patterns and date formats are logged and treated as if the
//! constraint were absent.

use std::collections::{BTreeSet, HashMap};

use log::{debug, warn};
use regex::Regex;
use serde::Serialize;

use crate::{
    data::{DateFormat, NumberCheck, check_number},
    grid::{Grid, RowData},
    mapping::ColumnMapping,
    schema::{ColumnDefinition, ColumnType, Schema},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Nullable,
    Unique,
    MinLength,
    MaxLength,
    Min,
    Max,
    Pattern,
    Type,
    DateFormat,
    Decimal,
    Picklist,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Nullable => "nullable",
            ErrorKind::Unique => "unique",
            ErrorKind::MinLength => "minLength",
            ErrorKind::MaxLength => "maxLength",
            ErrorKind::Min => "min",
            ErrorKind::Max => "max",
            ErrorKind::Pattern => "pattern",
            ErrorKind::Type => "type",
            ErrorKind::DateFormat => "dateFormat",
            ErrorKind::Decimal => "decimal",
            ErrorKind::Picklist => "picklist",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub row: usize,
    /// Destination column key.
    pub column_key: String,
    pub message: String,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationStats {
    pub total_errors: usize,
    pub rows_with_errors: usize,
    pub columns_with_errors: usize,
    pub is_valid: bool,
}

/// Errors in row-major, then destination-column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors_for_cell(&self, row: usize, column_key: &str) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|error| error.row == row && error.column_key == column_key)
            .collect()
    }

    pub fn has_row_errors(&self, row: usize) -> bool {
        self.errors.iter().any(|error| error.row == row)
    }

    pub fn has_column_errors(&self, column_key: &str) -> bool {
        self.errors.iter().any(|error| error.column_key == column_key)
    }

    pub fn stats(&self) -> ValidationStats {
        let rows: BTreeSet<usize> = self.errors.iter().map(|e| e.row).collect();
        let columns: BTreeSet<&str> = self.errors.iter().map(|e| e.column_key.as_str()).collect();
        ValidationStats {
            total_errors: self.errors.len(),
            rows_with_errors: rows.len(),
            columns_with_errors: columns.len(),
            is_valid: self.is_valid(),
        }
    }
}

/// Rules for one mapped destination column, compiled once per pass.
struct ColumnRules<'a> {
    column: &'a ColumnDefinition,
    source_key: &'a str,
    column_type: ColumnType,
    pattern: Option<Regex>,
    date_format: Option<DateFormat>,
    first_seen: Option<HashMap<&'a str, usize>>,
}

impl<'a> ColumnRules<'a> {
    fn prepare(column: &'a ColumnDefinition, source_key: &'a str, rows: &'a [RowData]) -> Self {
        let column_type = column.column_type.unwrap_or(ColumnType::String);
        let constraints = &column.validation;

        let pattern = match (column_type, constraints.pattern.as_deref()) {
            (ColumnType::String, Some(raw)) if !raw.is_empty() => match Regex::new(raw) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    warn!(
                        "Column '{}': ignoring invalid pattern '{raw}': {err}",
                        column.key
                    );
                    None
                }
            },
            _ => None,
        };

        let date_format = match column_type {
            ColumnType::Date => match DateFormat::compile(constraints.date_format()) {
                Ok(format) => Some(format),
                Err(err) => {
                    warn!("Column '{}': ignoring date format: {err}", column.key);
                    None
                }
            },
            _ => None,
        };

        let first_seen = constraints.requires_unique().then(|| {
            let mut seen = HashMap::new();
            for (row_idx, row) in rows.iter().enumerate() {
                if let Some(value) = row.get(source_key)
                    && !value.trim().is_empty()
                {
                    seen.entry(value.as_str()).or_insert(row_idx);
                }
            }
            seen
        });

        Self {
            column,
            source_key,
            column_type,
            pattern,
            date_format,
            first_seen,
        }
    }

    fn check(&self, row_idx: usize, value: &str, row_has_data: bool, out: &mut Vec<ValidationError>) {
        let constraints = &self.column.validation;
        let mut push = |kind: ErrorKind, message: String| {
            out.push(ValidationError {
                row: row_idx,
                column_key: self.column.key.clone(),
                message,
                kind,
            });
        };

        if value.trim().is_empty() {
            if constraints.requires_value() && row_has_data {
                push(ErrorKind::Nullable, format!("{} is required", self.column.label));
            }
            return;
        }

        match self.column_type {
            ColumnType::Number => match check_number(value) {
                NumberCheck::NotNumber => {
                    push(ErrorKind::Type, "Value must be a number".to_string());
                    return;
                }
                NumberCheck::NotDecimal => {
                    push(
                        ErrorKind::Decimal,
                        "Value must be a plain decimal number".to_string(),
                    );
                    return;
                }
                NumberCheck::Valid(number) => {
                    if let Some(min) = constraints.min
                        && number < min
                    {
                        push(ErrorKind::Min, format!("Value must be at least {min}"));
                    }
                    if let Some(max) = constraints.max
                        && number > max
                    {
                        push(ErrorKind::Max, format!("Value must be at most {max}"));
                    }
                }
            },
            ColumnType::Date => {
                if let Some(format) = &self.date_format
                    && format.parse(value).is_none()
                {
                    push(
                        ErrorKind::DateFormat,
                        format!("Value must be a valid date in format {}", format.pattern()),
                    );
                    return;
                }
            }
            ColumnType::String => {
                let length = value.chars().count();
                if let Some(min_length) = constraints.min_length
                    && length < min_length
                {
                    push(
                        ErrorKind::MinLength,
                        format!("Value must be at least {min_length} characters"),
                    );
                }
                if let Some(max_length) = constraints.max_length
                    && length > max_length
                {
                    push(
                        ErrorKind::MaxLength,
                        format!("Value must be at most {max_length} characters"),
                    );
                }
                if let Some(pattern) = &self.pattern
                    && !pattern.is_match(value)
                {
                    push(
                        ErrorKind::Pattern,
                        format!("Value must match pattern {}", pattern.as_str()),
                    );
                }
            }
            ColumnType::Picklist => {
                if let Some(allowed) = constraints
                    .picklist_values
                    .as_deref()
                    .filter(|values| !values.is_empty())
                    && !picklist_contains(allowed, value.trim(), constraints.is_case_sensitive())
                {
                    push(
                        ErrorKind::Picklist,
                        format!("Value must be one of: {}", allowed.join(", ")),
                    );
                }
            }
        }

        if let Some(first_seen) = &self.first_seen
            && let Some(&first) = first_seen.get(value)
            && first < row_idx
        {
            push(
                ErrorKind::Unique,
                format!("Value must be unique; duplicate of row {}", first + 1),
            );
        }
    }
}

fn picklist_contains(allowed: &[String], value: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        allowed.iter().any(|candidate| candidate == value)
    } else {
        let lowered = value.to_lowercase();
        allowed
            .iter()
            .any(|candidate| candidate.to_lowercase() == lowered)
    }
}

pub fn validate(rows: &[RowData], destination: &Schema, mapping: &ColumnMapping) -> ValidationResult {
    let rules: Vec<ColumnRules<'_>> = destination
        .columns()
        .iter()
        .filter_map(|column| {
            mapping
                .source_for(&column.key)
                .map(|source_key| ColumnRules::prepare(column, source_key, rows))
        })
        .collect();

    let mut errors = Vec::new();
    for (row_idx, row) in rows.iter().enumerate() {
        let row_has_data = row.values().any(|value| !value.trim().is_empty());
        for rule in &rules {
            let Some(value) = row.get(rule.source_key) else {
                continue;
            };
            rule.check(row_idx, value, row_has_data, &mut errors);
        }
    }
    debug!(
        "Validated {} row(s) across {} mapped column(s): {} error(s)",
        rows.len(),
        rules.len(),
        errors.len()
    );
    ValidationResult { errors }
}

pub fn validate_grid(grid: &Grid, destination: &Schema, mapping: &ColumnMapping) -> ValidationResult {
    validate(grid.rows(), destination, mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DESTINATION_KEY_PREFIX, ValidationConstraints};

    fn rows(data: &[&[(&str, &str)]]) -> Vec<RowData> {
        data.iter()
            .map(|row| {
                row.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .collect()
    }

    fn single(column: ColumnDefinition, source: &str) -> (Schema, ColumnMapping) {
        let mut mapping = ColumnMapping::new();
        mapping.set_mapping(&column.key, source);
        (Schema::new(DESTINATION_KEY_PREFIX, vec![column]), mapping)
    }

    fn kinds(result: &ValidationResult) -> Vec<ErrorKind> {
        result.errors().iter().map(|e| e.kind).collect()
    }

    #[test]
    fn nullable_skips_fully_blank_rows() {
        let column = ColumnDefinition::new("Age", "Age", ColumnType::Number).with_validation(
            ValidationConstraints {
                nullable: Some(false),
                ..ValidationConstraints::default()
            },
        );
        let (schema, mapping) = single(column, "age");

        let blank = rows(&[&[("age", "")]]);
        assert!(validate(&blank, &schema, &mapping).is_valid());

        let partial = rows(&[&[("name", "x"), ("age", "")]]);
        let result = validate(&partial, &schema, &mapping);
        assert_eq!(kinds(&result), vec![ErrorKind::Nullable]);
        assert_eq!(result.errors()[0].row, 0);
        assert_eq!(result.errors()[0].column_key, "Age");
    }

    #[test]
    fn whitespace_counts_as_blank() {
        let column = ColumnDefinition::new("name", "Name", ColumnType::String).with_validation(
            ValidationConstraints {
                nullable: Some(false),
                min_length: Some(3),
                ..ValidationConstraints::default()
            },
        );
        let (schema, mapping) = single(column, "name");
        let data = rows(&[&[("name", "   "), ("other", "y")]]);
        assert_eq!(
            kinds(&validate(&data, &schema, &mapping)),
            vec![ErrorKind::Nullable]
        );
    }

    #[test]
    fn unique_flags_only_later_duplicate() {
        let column = ColumnDefinition::new("Email", "Email", ColumnType::String).with_validation(
            ValidationConstraints {
                unique: Some(true),
                ..ValidationConstraints::default()
            },
        );
        let (schema, mapping) = single(column, "email");
        let data = rows(&[
            &[("email", "a@x.com")],
            &[("email", "a@x.com")],
            &[("email", "b@x.com")],
            &[("email", "a@x.com")],
        ]);
        let result = validate(&data, &schema, &mapping);
        assert_eq!(result.len(), 2);
        assert_eq!(result.errors()[0].row, 1);
        assert_eq!(result.errors()[0].kind, ErrorKind::Unique);
        assert!(result.errors()[0].message.contains("row 1"));
        assert_eq!(result.errors()[1].row, 3);
    }

    #[test]
    fn number_failures_short_circuit_other_checks() {
        let column = ColumnDefinition::new("qty", "Qty", ColumnType::Number).with_validation(
            ValidationConstraints {
                unique: Some(true),
                min: Some(10.0),
                ..ValidationConstraints::default()
            },
        );
        let (schema, mapping) = single(column, "q");
        let data = rows(&[
            &[("q", "abc")],
            &[("q", "abc")],
            &[("q", "1e3")],
            &[("q", "5")],
            &[("q", "12.5")],
        ]);
        let result = validate(&data, &schema, &mapping);
        assert_eq!(
            kinds(&result),
            vec![ErrorKind::Type, ErrorKind::Type, ErrorKind::Decimal, ErrorKind::Min]
        );
    }

    #[test]
    fn number_range_reports_min_and_max() {
        let column = ColumnDefinition::new("age", "Age", ColumnType::Number).with_validation(
            ValidationConstraints {
                min: Some(0.0),
                max: Some(120.0),
                ..ValidationConstraints::default()
            },
        );
        let (schema, mapping) = single(column, "age");
        let data = rows(&[&[("age", "-1")], &[("age", "121")], &[("age", "120")]]);
        let result = validate(&data, &schema, &mapping);
        assert_eq!(kinds(&result), vec![ErrorKind::Min, ErrorKind::Max]);
    }

    #[test]
    fn date_format_rejects_impossible_dates() {
        let column = ColumnDefinition::new("born", "Born", ColumnType::Date).with_validation(
            ValidationConstraints {
                date_format: Some("yyyy/MM/dd".to_string()),
                ..ValidationConstraints::default()
            },
        );
        let (schema, mapping) = single(column, "born");
        let bad = rows(&[&[("born", "2024-13-40")]]);
        assert_eq!(
            kinds(&validate(&bad, &schema, &mapping)),
            vec![ErrorKind::DateFormat]
        );
        let good = rows(&[&[("born", "2024/01/15")]]);
        assert!(validate(&good, &schema, &mapping).is_valid());
    }

    #[test]
    fn malformed_date_format_disables_check() {
        let column = ColumnDefinition::new("born", "Born", ColumnType::Date).with_validation(
            ValidationConstraints {
                date_format: Some("YYYY-QQ".to_string()),
                ..ValidationConstraints::default()
            },
        );
        let (schema, mapping) = single(column, "born");
        let data = rows(&[&[("born", "whenever")]]);
        assert!(validate(&data, &schema, &mapping).is_valid());
    }

    #[test]
    fn string_constraints_and_invalid_pattern() {
        let column = ColumnDefinition::new("code", "Code", ColumnType::String).with_validation(
            ValidationConstraints {
                min_length: Some(2),
                max_length: Some(4),
                pattern: Some("^[A-Z]+$".to_string()),
                ..ValidationConstraints::default()
            },
        );
        let (schema, mapping) = single(column, "c");
        let data = rows(&[&[("c", "a")], &[("c", "ABCDE")], &[("c", "AB")]]);
        let result = validate(&data, &schema, &mapping);
        assert_eq!(
            kinds(&result),
            vec![
                ErrorKind::MinLength,
                ErrorKind::Pattern,
                ErrorKind::MaxLength
            ]
        );

        let broken = ColumnDefinition::new("code", "Code", ColumnType::String).with_validation(
            ValidationConstraints {
                pattern: Some("([unclosed".to_string()),
                ..ValidationConstraints::default()
            },
        );
        let (schema, mapping) = single(broken, "c");
        assert!(validate(&data, &schema, &mapping).is_valid());
    }

    #[test]
    fn picklist_respects_case_sensitivity() {
        let mut constraints = ValidationConstraints {
            picklist_values: Some(vec!["Red".to_string(), "Blue".to_string()]),
            ..ValidationConstraints::default()
        };
        let column = ColumnDefinition::new("color", "Color", ColumnType::Picklist)
            .with_validation(constraints.clone());
        let (schema, mapping) = single(column, "c");
        let data = rows(&[&[("c", "red")], &[("c", "Green")]]);
        assert_eq!(
            kinds(&validate(&data, &schema, &mapping)),
            vec![ErrorKind::Picklist]
        );

        constraints.case_sensitive = Some(true);
        let column = ColumnDefinition::new("color", "Color", ColumnType::Picklist)
            .with_validation(constraints);
        let (schema, mapping) = single(column, "c");
        assert_eq!(validate(&data, &schema, &mapping).len(), 2);
    }

    #[test]
    fn unmapped_columns_are_not_validated() {
        let column = ColumnDefinition::new("age", "Age", ColumnType::Number);
        let schema = Schema::new(DESTINATION_KEY_PREFIX, vec![column]);
        let data = rows(&[&[("age", "abc")]]);
        assert!(validate(&data, &schema, &ColumnMapping::new()).is_valid());
    }

    #[test]
    fn errors_are_row_major_then_column_order() {
        let schema = Schema::new(
            DESTINATION_KEY_PREFIX,
            vec![
                ColumnDefinition::new("b", "B", ColumnType::Number),
                ColumnDefinition::new("a", "A", ColumnType::Number),
            ],
        );
        let mut mapping = ColumnMapping::new();
        mapping.set_mapping("a", "x");
        mapping.set_mapping("b", "y");
        let data = rows(&[
            &[("x", "bad"), ("y", "bad")],
            &[("x", "bad"), ("y", "1")],
        ]);
        let result = validate(&data, &schema, &mapping);
        let order: Vec<(usize, &str)> = result
            .errors()
            .iter()
            .map(|e| (e.row, e.column_key.as_str()))
            .collect();
        assert_eq!(order, vec![(0, "b"), (0, "a"), (1, "a")]);
        assert_eq!(validate(&data, &schema, &mapping), result);
    }

    #[test]
    fn result_queries_and_stats() {
        let schema = Schema::new(
            DESTINATION_KEY_PREFIX,
            vec![ColumnDefinition::new("n", "N", ColumnType::Number)],
        );
        let mut mapping = ColumnMapping::new();
        mapping.set_mapping("n", "n");
        let data = rows(&[&[("n", "x")], &[("n", "1")], &[("n", "y")]]);
        let result = validate(&data, &schema, &mapping);
        assert_eq!(result.errors_for_cell(0, "n").len(), 1);
        assert!(result.errors_for_cell(1, "n").is_empty());
        assert!(result.has_row_errors(2));
        assert!(!result.has_row_errors(1));
        assert!(result.has_column_errors("n"));
        assert_eq!(
            result.stats(),
            ValidationStats {
                total_errors: 2,
                rows_with_errors: 2,
                columns_with_errors: 1,
                is_valid: false,
            }
        );
    }
}
