//! Destination-to-source column association.
//!
//! Each destination column maps to at most one source column; several
//! destination columns may share a source. The table only holds keys, so it
//! stays valid while source columns are relabelled or reordered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnDefinition, Schema};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    entries: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingSummary {
    pub is_valid: bool,
    pub unmapped_columns: Vec<ColumnDefinition>,
    pub total_dest_columns: usize,
    pub required_columns: usize,
    pub mapped_columns: usize,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mapping(&mut self, dest_key: &str, source_key: &str) {
        self.entries
            .insert(dest_key.to_string(), source_key.to_string());
    }

    pub fn clear_mapping(&mut self, dest_key: &str) -> Option<String> {
        self.entries.remove(dest_key)
    }

    pub fn source_for(&self, dest_key: &str) -> Option<&str> {
        self.entries.get(dest_key).map(String::as_str)
    }

    pub fn is_mapped(&self, dest_key: &str) -> bool {
        self.entries.contains_key(dest_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(dest, source)| (dest.as_str(), source.as_str()))
    }

    /// Drops every entry that points at `source_key`; returns how many were removed.
    pub fn remove_source(&mut self, source_key: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, source| source != source_key);
        before - self.entries.len()
    }

    /// Drops entries whose destination column no longer exists.
    pub fn retain_destinations(&mut self, destination: &Schema) {
        self.entries
            .retain(|dest, _| destination.contains_key(dest));
    }
}

pub fn unmapped_required_columns(
    destination: &Schema,
    mapping: &ColumnMapping,
) -> Vec<ColumnDefinition> {
    destination
        .columns()
        .iter()
        .filter(|column| !column.optional && !mapping.is_mapped(&column.key))
        .cloned()
        .collect()
}

pub fn mapping_summary(destination: &Schema, mapping: &ColumnMapping) -> MappingSummary {
    let unmapped_columns = unmapped_required_columns(destination, mapping);
    let required_columns = destination
        .columns()
        .iter()
        .filter(|column| !column.optional)
        .count();
    let mapped_columns = destination
        .columns()
        .iter()
        .filter(|column| mapping.is_mapped(&column.key))
        .count();
    MappingSummary {
        is_valid: unmapped_columns.is_empty(),
        unmapped_columns,
        total_dest_columns: destination.len(),
        required_columns,
        mapped_columns,
    }
}
