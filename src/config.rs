//! YAML session files.
//!
//! A session file seeds the editor: title, number of blank rows, the source
//! and destination column lists, and the destination → source mapping.
//! Every field is optional and falls back to the built-in default session;
//! an omitted mapping leaves every destination column unmapped.
//!
//! ```yaml
//! title: Customer import
//! rows: 10
//! destination_columns:
//!   - label: Email Address        # key derived as email_address
//!     type: string
//!     validation: { unique: true, pattern: "^.+@.+$" }
//! mapping:
//!   email_address: name
//! ```

use std::{
    collections::{BTreeMap, HashSet},
    fs::File,
    io::BufReader,
    path::Path,
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    grid::DEFAULT_ROW_COUNT,
    mapping::ColumnMapping,
    schema::{
        ColumnDefinition, ColumnType, DESTINATION_KEY_PREFIX, SOURCE_KEY_PREFIX, Schema,
        ValidationConstraints,
    },
};

pub const DEFAULT_TITLE: &str = "Untitled Spreadsheet";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub label: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub column_type: Option<ColumnType>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub validation: ValidationConstraints,
}

impl ColumnConfig {
    /// The explicit key, or the label in snake case when none is given.
    pub fn resolved_key(&self) -> String {
        match self.key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => ColumnDefinition::key_from_label(&self.label),
        }
    }

    fn to_definition(&self) -> ColumnDefinition {
        ColumnDefinition {
            key: self.resolved_key(),
            label: self.label.clone(),
            column_type: self.column_type,
            optional: self.optional,
            validation: self.validation.clone(),
        }
    }
}

impl From<&ColumnDefinition> for ColumnConfig {
    fn from(column: &ColumnDefinition) -> Self {
        Self {
            key: Some(column.key.clone()),
            label: column.label.clone(),
            column_type: column.column_type,
            optional: column.optional,
            validation: column.validation.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub title: String,
    pub rows: usize,
    pub source_columns: Vec<ColumnConfig>,
    pub destination_columns: Vec<ColumnConfig>,
    pub mapping: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let source = Schema::default_source();
        let destination = Schema::default_destination();
        Self {
            title: DEFAULT_TITLE.to_string(),
            rows: DEFAULT_ROW_COUNT,
            source_columns: source.columns().iter().map(ColumnConfig::from).collect(),
            destination_columns: destination
                .columns()
                .iter()
                .map(ColumnConfig::from)
                .collect(),
            mapping: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SessionConfig = serde_yaml::from_reader(BufReader::new(file))?;
        config.check()?;
        debug!(
            "Loaded session {path:?}: {} source / {} destination column(s)",
            config.source_columns.len(),
            config.destination_columns.len()
        );
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_yaml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(ConfigError::Serialize)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = self.to_yaml_string()?;
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Structural checks: non-empty column lists, unique non-empty keys,
    /// typed destination columns, and a mapping that only names known keys.
    pub fn check(&self) -> Result<(), ConfigError> {
        let source_keys = check_columns("source", &self.source_columns)?;
        let destination_keys = check_columns("destination", &self.destination_columns)?;
        if let Some(column) = self
            .destination_columns
            .iter()
            .find(|column| column.column_type.is_none())
        {
            return Err(ConfigError::MissingType {
                key: column.resolved_key(),
            });
        }
        for (destination, source) in &self.mapping {
            if !destination_keys.contains(destination) {
                return Err(ConfigError::UnknownDestination {
                    key: destination.clone(),
                });
            }
            if !source_keys.contains(source) {
                return Err(ConfigError::UnknownSource {
                    destination: destination.clone(),
                    source_key: source.clone(),
                });
            }
        }
        Ok(())
    }

    /// At least one row; the grid never drops its last row.
    pub fn row_count(&self) -> usize {
        self.rows.max(1)
    }

    pub fn source_schema(&self) -> Schema {
        Schema::new(
            SOURCE_KEY_PREFIX,
            self.source_columns
                .iter()
                .map(ColumnConfig::to_definition)
                .collect(),
        )
    }

    pub fn destination_schema(&self) -> Schema {
        Schema::new(
            DESTINATION_KEY_PREFIX,
            self.destination_columns
                .iter()
                .map(ColumnConfig::to_definition)
                .collect(),
        )
    }

    pub fn column_mapping(&self) -> ColumnMapping {
        let mut mapping = ColumnMapping::new();
        for (destination, source) in &self.mapping {
            mapping.set_mapping(destination, source);
        }
        mapping
    }
}

fn check_columns(
    schema: &'static str,
    columns: &[ColumnConfig],
) -> Result<HashSet<String>, ConfigError> {
    if columns.is_empty() {
        return Err(ConfigError::NoColumns { schema });
    }
    let mut keys = HashSet::new();
    for column in columns {
        let key = column.resolved_key();
        if key.is_empty() {
            return Err(ConfigError::EmptyKey {
                schema,
                label: column.label.clone(),
            });
        }
        if !keys.insert(key.clone()) {
            return Err(ConfigError::DuplicateKey { schema, key });
        }
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_consistent() {
        let config = SessionConfig::default();
        config.check().expect("default session is consistent");
        assert_eq!(config.title, DEFAULT_TITLE);
        assert_eq!(config.row_count(), DEFAULT_ROW_COUNT);
        assert!(config.column_mapping().is_empty());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = SessionConfig::from_yaml_str("title: Payroll\n").expect("parse");
        assert_eq!(config.title, "Payroll");
        assert_eq!(config.source_columns.len(), 3);
        assert_eq!(config.destination_columns.len(), 3);

        let mapped = SessionConfig::from_yaml_str("mapping:\n  age: age\n").expect("parse");
        assert_eq!(mapped.column_mapping().source_for("age"), Some("age"));
    }

    #[test]
    fn keys_are_derived_from_labels() {
        let yaml = r#"
destination_columns:
  - label: Email Address
    type: string
    validation:
      unique: true
      minLength: 3
mapping:
  email_address: name
"#;
        let config = SessionConfig::from_yaml_str(yaml).expect("parse");
        let schema = config.destination_schema();
        let column = schema.column(0).expect("column");
        assert_eq!(column.key, "email_address");
        assert_eq!(column.validation.min_length, Some(3));
        assert!(column.validation.requires_unique());
    }

    #[test]
    fn structural_problems_are_reported() {
        let duplicate = r#"
source_columns:
  - { key: a, label: A }
  - { key: a, label: Again }
"#;
        assert!(matches!(
            SessionConfig::from_yaml_str(duplicate),
            Err(ConfigError::DuplicateKey { schema: "source", .. })
        ));

        let untyped = "destination_columns:\n  - { key: x, label: X }\n";
        assert!(matches!(
            SessionConfig::from_yaml_str(untyped),
            Err(ConfigError::MissingType { .. })
        ));

        let bad_mapping = "mapping:\n  name: nowhere\n";
        assert!(matches!(
            SessionConfig::from_yaml_str(bad_mapping),
            Err(ConfigError::UnknownSource { .. })
        ));

        assert!(matches!(
            SessionConfig::from_yaml_str("source_columns: []\n"),
            Err(ConfigError::NoColumns { schema: "source" })
        ));
    }

    #[test]
    fn yaml_round_trip_preserves_session() {
        let config = SessionConfig::default();
        let text = config.to_yaml_string().expect("serialize");
        let parsed = SessionConfig::from_yaml_str(&text).expect("parse");
        assert_eq!(parsed, config);
    }
}
