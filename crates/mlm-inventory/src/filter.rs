//! System filters applied before building the inventory.
//!
//! Every configured filter must match for a system to be kept. A filter set
//! to `all` is ignored.

use mlm_client::PatchStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Filter on the system's `active` flag. Systems without the flag count as
/// active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    Active,
    Inactive,
    All,
}

impl StatusFilter {
    fn matches(&self, system: &Map<String, Value>) -> bool {
        let active = system.get("active").map(truthy).unwrap_or(true);
        match self {
            StatusFilter::Active => active,
            StatusFilter::Inactive => !active,
            StatusFilter::All => true,
        }
    }
}

/// Filter on the derived `patch_status` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchStatusFilter {
    #[default]
    All,
    UpToDate,
    NeedsPatches,
    NeedsReboot,
}

impl PatchStatusFilter {
    fn wanted(&self) -> Option<PatchStatus> {
        match self {
            PatchStatusFilter::All => None,
            PatchStatusFilter::UpToDate => Some(PatchStatus::UpToDate),
            PatchStatusFilter::NeedsPatches => Some(PatchStatus::NeedsPatches),
            PatchStatusFilter::NeedsReboot => Some(PatchStatus::NeedsReboot),
        }
    }

    fn matches(&self, system: &Map<String, Value>) -> bool {
        match self.wanted() {
            None => true,
            Some(wanted) => {
                system.get("patch_status").and_then(Value::as_str) == Some(wanted.as_str())
            }
        }
    }
}

impl From<PatchStatus> for PatchStatusFilter {
    fn from(status: PatchStatus) -> Self {
        match status {
            PatchStatus::UpToDate => PatchStatusFilter::UpToDate,
            PatchStatus::NeedsPatches => PatchStatusFilter::NeedsPatches,
            PatchStatus::NeedsReboot => PatchStatusFilter::NeedsReboot,
        }
    }
}

/// Group names accepted either as a single string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum GroupNames {
    One(String),
    Many(Vec<String>),
}

impl From<GroupNames> for Vec<String> {
    fn from(names: GroupNames) -> Self {
        match names {
            GroupNames::One(name) => vec![name],
            GroupNames::Many(names) => names,
        }
    }
}

fn deserialize_groups<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<GroupNames>::deserialize(deserializer)?.map(Vec::from))
}

/// The full filter set.
///
/// ```
/// use mlm_inventory::{InventoryFilters, StatusFilter};
///
/// let filters: InventoryFilters =
///     serde_yaml::from_str("status: all\nsystem_groups: [web]").unwrap();
/// assert_eq!(filters.status, StatusFilter::All);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryFilters {
    pub status: StatusFilter,
    pub patch_status: PatchStatusFilter,
    /// Keep systems in any of these groups, compared case-insensitively.
    /// `None` or `["all"]` disables the filter.
    #[serde(
        deserialize_with = "deserialize_groups",
        skip_serializing_if = "Option::is_none"
    )]
    pub system_groups: Option<Vec<String>>,
}

impl InventoryFilters {
    /// Filters that keep every system.
    pub fn all() -> Self {
        Self {
            status: StatusFilter::All,
            patch_status: PatchStatusFilter::All,
            system_groups: None,
        }
    }

    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn with_patch_status(mut self, patch_status: impl Into<PatchStatusFilter>) -> Self {
        self.patch_status = patch_status.into();
        self
    }

    pub fn with_system_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.system_groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    /// Whether a system passes every filter.
    pub fn matches(&self, system: &Map<String, Value>) -> bool {
        self.status.matches(system)
            && self.patch_status.matches(system)
            && self.groups_match(system)
    }

    /// Filters not set to `all`, as `name_value` pairs sorted by name and
    /// joined with `_`. Empty when nothing is filtered.
    pub fn cache_key(&self) -> String {
        let mut parts = Vec::new();
        if self.patch_status != PatchStatusFilter::All {
            parts.push(format!("patch_status_{}", variant_name(&self.patch_status)));
        }
        if self.status != StatusFilter::All {
            parts.push(format!("status_{}", variant_name(&self.status)));
        }
        if let Some(groups) = &self.system_groups {
            if !(groups.len() == 1 && groups[0] == "all") {
                parts.push(format!("system_groups_{}", groups.join(",")));
            }
        }
        parts.join("_")
    }

    /// Keep only the systems that pass every filter.
    pub fn apply(&self, systems: Vec<Map<String, Value>>) -> Vec<Map<String, Value>> {
        systems.into_iter().filter(|s| self.matches(s)).collect()
    }

    fn groups_match(&self, system: &Map<String, Value>) -> bool {
        let wanted = match &self.system_groups {
            None => return true,
            Some(groups) if groups.len() == 1 && groups[0] == "all" => return true,
            Some(groups) => groups,
        };

        let groups: Vec<String> = match system.get("groups") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(value_text).collect(),
            Some(other) => vec![value_text(other)],
        };

        if groups.is_empty() {
            return false;
        }
        if wanted.is_empty() {
            return true;
        }

        groups.iter().any(|group| {
            wanted
                .iter()
                .any(|w| w.to_lowercase() == group.to_lowercase())
        })
    }
}

fn variant_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(name)) => name,
        _ => String::new(),
    }
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
