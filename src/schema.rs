//! Column definitions for the source grid and the destination schema.
//!
//! A [`Schema`] is an ordered list of [`ColumnDefinition`]s. The same type
//! backs both the raw "source" table (whose column types are optional hints)
//! and the destination/configuration schema (where every column carries a
//! declared [`ColumnType`] and [`ValidationConstraints`]).
//!
//! ## Invariants
//!
//! - Column keys are unique within a schema and never change once created;
//!   labels are free to change.
//! - Generated keys come from a monotonically increasing counter, so a key
//!   removed by a delete is never handed out again.

use std::{collections::HashSet, fmt, str::FromStr};

use anyhow::{Result, anyhow};
use heck::ToSnakeCase;
use log::debug;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DATE_FORMAT: &str = "yyyy/MM/dd";
pub const SOURCE_KEY_PREFIX: &str = "col";
pub const DESTINATION_KEY_PREFIX: &str = "field";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Date,
    Picklist,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::Picklist => "picklist",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["string", "number", "date", "picklist"]
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" | "text" => Ok(ColumnType::String),
            "number" | "numeric" | "decimal" => Ok(ColumnType::Number),
            "date" => Ok(ColumnType::Date),
            "picklist" | "list" => Ok(ColumnType::Picklist),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

/// Per-column rules. Every field is independent; `None` disables that rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "minLength")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "maxLength")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "dateFormat")]
    pub date_format: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "picklistValues"
    )]
    pub picklist_values: Option<Vec<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "caseSensitive"
    )]
    pub case_sensitive: Option<bool>,
}

impl ValidationConstraints {
    pub fn requires_value(&self) -> bool {
        self.nullable == Some(false)
    }

    pub fn requires_unique(&self) -> bool {
        self.unique == Some(true)
    }

    pub fn date_format(&self) -> &str {
        self.date_format
            .as_deref()
            .filter(|format| !format.trim().is_empty())
            .unwrap_or(DEFAULT_DATE_FORMAT)
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub key: String,
    pub label: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub column_type: Option<ColumnType>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub validation: ValidationConstraints,
}

impl ColumnDefinition {
    pub fn new(key: impl Into<String>, label: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            column_type: Some(column_type),
            optional: false,
            validation: ValidationConstraints::default(),
        }
    }

    /// Column without a declared type; only meaningful on the source side.
    pub fn untyped(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            column_type: None,
            optional: false,
            validation: ValidationConstraints::default(),
        }
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_validation(mut self, validation: ValidationConstraints) -> Self {
        self.validation = validation;
        self
    }

    /// Snake-case key derived from a display label, e.g. "First Name" -> "first_name".
    pub fn key_from_label(label: &str) -> String {
        label.trim().to_snake_case()
    }

    pub fn type_name(&self) -> &'static str {
        self.column_type.map(|ty| ty.as_str()).unwrap_or("-")
    }
}

/// Ordered column list with a key generator.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<ColumnDefinition>,
    key_prefix: String,
    next_key: usize,
}

impl Schema {
    pub fn new(key_prefix: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        let next_key = columns.len() + 1;
        Self {
            columns,
            key_prefix: key_prefix.into(),
            next_key,
        }
    }

    pub fn default_source() -> Self {
        Self::new(
            SOURCE_KEY_PREFIX,
            vec![
                ColumnDefinition::new("name", "Name", ColumnType::String),
                ColumnDefinition::new("age", "Age", ColumnType::Number),
                ColumnDefinition::new("birthdate", "Birthdate", ColumnType::Date),
            ],
        )
    }

    pub fn default_destination() -> Self {
        Self::new(
            DESTINATION_KEY_PREFIX,
            vec![
                ColumnDefinition::new("name", "Name", ColumnType::String).with_validation(
                    ValidationConstraints {
                        nullable: Some(false),
                        ..ValidationConstraints::default()
                    },
                ),
                ColumnDefinition::new("age", "Age", ColumnType::Number)
                    .with_optional(true)
                    .with_validation(ValidationConstraints {
                        min: Some(0.0),
                        ..ValidationConstraints::default()
                    }),
                ColumnDefinition::new("birthdate", "Birthdate", ColumnType::Date)
                    .with_optional(true)
                    .with_validation(ValidationConstraints {
                        date_format: Some(DEFAULT_DATE_FORMAT.to_string()),
                        ..ValidationConstraints::default()
                    }),
            ],
        )
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnDefinition> {
        self.columns.get(index)
    }

    pub fn column_by_key(&self, key: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| column.key == key)
    }

    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.key == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.column_index(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.key.clone()).collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.label.clone()).collect()
    }

    /// Appends a column with a freshly generated key and returns its index.
    pub fn push_generated(&mut self, column_type: Option<ColumnType>) -> usize {
        let key = self.generate_key();
        let label = format!("Column {}", self.columns.len() + 1);
        debug!("Adding column '{key}' ({label})");
        self.columns.push(ColumnDefinition {
            key,
            label,
            column_type,
            optional: false,
            validation: ValidationConstraints::default(),
        });
        self.columns.len() - 1
    }

    fn generate_key(&mut self) -> String {
        let existing: HashSet<&str> = self.columns.iter().map(|c| c.key.as_str()).collect();
        let mut counter = self.next_key;
        let key = loop {
            let candidate = format!("{}{}", self.key_prefix, counter);
            counter += 1;
            if !existing.contains(candidate.as_str()) {
                break candidate;
            }
        };
        self.next_key = counter;
        key
    }

    /// Removes the column at `index`. The last remaining column is never removed.
    pub fn remove(&mut self, index: usize) -> Option<ColumnDefinition> {
        if self.columns.len() <= 1 || index >= self.columns.len() {
            debug!(
                "Ignoring column removal at {index} ({} column(s) defined)",
                self.columns.len()
            );
            return None;
        }
        Some(self.columns.remove(index))
    }

    pub fn move_column(&mut self, from: usize, to: usize) -> bool {
        if from >= self.columns.len() || to >= self.columns.len() {
            debug!("Ignoring column move {from} -> {to}");
            return false;
        }
        if from != to {
            let column = self.columns.remove(from);
            self.columns.insert(to, column);
        }
        true
    }

    pub fn rename(&mut self, index: usize, label: &str) -> bool {
        match self.columns.get_mut(index) {
            Some(column) => {
                column.label = label.to_string();
                true
            }
            None => false,
        }
    }

    pub fn set_type(&mut self, index: usize, column_type: ColumnType) -> bool {
        match self.columns.get_mut(index) {
            Some(column) => {
                column.column_type = Some(column_type);
                true
            }
            None => false,
        }
    }

    pub fn set_optional(&mut self, index: usize, optional: bool) -> bool {
        match self.columns.get_mut(index) {
            Some(column) => {
                column.optional = optional;
                true
            }
            None => false,
        }
    }

    /// Applies a partial edit to a column's constraints.
    pub fn update_constraints<F>(&mut self, index: usize, update: F) -> bool
    where
        F: FnOnce(&mut ValidationConstraints),
    {
        match self.columns.get_mut(index) {
            Some(column) => {
                update(&mut column.validation);
                true
            }
            None => false,
        }
    }

    /// Replaces the picklist for a column, trimming entries and dropping
    /// blanks and repeats while keeping first-seen order.
    pub fn set_picklist_values<I, S>(&mut self, index: usize, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values = dedup_picklist(values);
        self.update_constraints(index, |constraints| {
            constraints.picklist_values = Some(values);
        })
    }

    /// Appends values to a column's picklist under the same rules as
    /// [`Schema::set_picklist_values`].
    pub fn extend_picklist_values<I, S>(&mut self, index: usize, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(column) = self.columns.get(index) else {
            return false;
        };
        let existing = column
            .validation
            .picklist_values
            .clone()
            .unwrap_or_default();
        let merged = existing
            .into_iter()
            .chain(values.into_iter().map(|v| v.as_ref().to_string()));
        self.set_picklist_values(index, merged)
    }
}

fn dedup_picklist<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            out.push(trimmed.to_string());
        }
    }
    out
}
