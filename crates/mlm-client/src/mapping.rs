//! Declarative projection of server records onto stable field names.
//!
//! Different server versions name the same field differently. A
//! [`FieldMappingTable`] maps each internal field name to a [`FieldRule`]
//! saying where to find it; [`apply`] fills in every internal field the
//! record does not already carry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where to find the value of an internal field.
///
/// Deserializes from a string, a list of strings or a list of string lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldRule {
    /// A single top-level server field.
    Field(String),
    /// Alternative top-level server fields; the first present wins.
    Alternatives(Vec<String>),
    /// Alternative nested paths; the first that resolves wins.
    NestedPaths(Vec<Vec<String>>),
}

impl FieldRule {
    /// Rule for a single top-level field.
    pub fn field(name: impl Into<String>) -> Self {
        FieldRule::Field(name.into())
    }

    /// Rule trying each top-level field in order.
    pub fn alternatives<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldRule::Alternatives(names.into_iter().map(Into::into).collect())
    }

    /// Rule trying each dotted path in order, e.g. `"os.family"`.
    pub fn dotted<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        FieldRule::NestedPaths(
            paths
                .into_iter()
                .map(|p| p.split('.').map(str::to_string).collect())
                .collect(),
        )
    }

    /// Resolve the rule against a record. Null values count as absent.
    pub fn resolve<'a>(&self, record: &'a Map<String, Value>) -> Option<&'a Value> {
        match self {
            FieldRule::Field(name) => present(record.get(name)),
            FieldRule::Alternatives(names) => names.iter().find_map(|n| present(record.get(n))),
            FieldRule::NestedPaths(paths) => paths.iter().find_map(|p| lookup_path(record, p)),
        }
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn lookup_path<'a>(record: &'a Map<String, Value>, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = record.get(first)?;
    for key in rest {
        current = current.as_object()?.get(key)?;
    }
    present(Some(current))
}

/// Internal field name to rule.
pub type FieldMappingTable = BTreeMap<String, FieldRule>;

/// Fill in every internal field absent from `record`.
///
/// Fields already present are never touched, so applying the same table
/// again is a no-op. Rules may refer to fields filled earlier in the same
/// pass; the table is applied until nothing changes.
pub fn apply(record: &mut Map<String, Value>, table: &FieldMappingTable) {
    loop {
        let mut changed = false;
        for (internal, rule) in table {
            if record.contains_key(internal) {
                continue;
            }
            if let Some(value) = rule.resolve(record).cloned() {
                record.insert(internal.clone(), value);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Mapping tables keyed by entity type, e.g. `system`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMappings(BTreeMap<String, FieldMappingTable>);

impl Default for FieldMappings {
    fn default() -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(SYSTEM_ENTITY.to_string(), default_system_table());
        Self(tables)
    }
}

/// Entity name of managed systems.
pub const SYSTEM_ENTITY: &str = "system";

impl FieldMappings {
    /// No tables at all.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Table for an entity type.
    pub fn table(&self, entity: &str) -> Option<&FieldMappingTable> {
        self.0.get(entity)
    }

    /// Replace the table for an entity type.
    pub fn with_table(mut self, entity: impl Into<String>, table: FieldMappingTable) -> Self {
        self.0.insert(entity.into(), table);
        self
    }

    /// Apply the entity's table to a record. Entities without a table are left alone.
    pub fn apply(&self, entity: &str, record: &mut Map<String, Value>) {
        if let Some(table) = self.table(entity) {
            apply(record, table);
        }
    }
}

fn default_system_table() -> FieldMappingTable {
    let mut table = FieldMappingTable::new();
    table.insert("id".into(), FieldRule::field("id"));
    table.insert("name".into(), FieldRule::field("name"));
    table.insert("hostname".into(), FieldRule::field("hostname"));
    table.insert("active".into(), FieldRule::field("active"));
    table.insert(
        "registration_date".into(),
        FieldRule::alternatives(["created", "registered", "registrationDate"]),
    );
    table.insert("last_checkin".into(), FieldRule::field("lastCheckin"));
    table.insert("last_boot".into(), FieldRule::field("lastBoot"));
    table
}
