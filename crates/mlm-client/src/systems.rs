//! Managed-system queries used by the inventory.
//!
//! The per-system helpers are best-effort: a failure is logged and reported
//! as "nothing known" so one bad system does not sink a whole listing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::client::MlmClient;
use crate::error::{Error, ErrorKind, Result};
use crate::mapping::SYSTEM_ENTITY;
use crate::request::ApiCall;
use crate::response::{NormalizedResponse, Shape};

/// Prefix some servers put in front of system group names.
const GROUP_NAME_PREFIX: &str = "system_group_";

/// Patch state of a system, derived from its errata and reboot flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchStatus {
    UpToDate,
    NeedsPatches,
    NeedsReboot,
}

impl PatchStatus {
    /// Derive the status. A pending reboot outranks pending patches.
    pub fn derive(errata_count: usize, needs_reboot: bool) -> Self {
        if needs_reboot {
            PatchStatus::NeedsReboot
        } else if errata_count > 0 {
            PatchStatus::NeedsPatches
        } else {
            PatchStatus::UpToDate
        }
    }

    /// Snake-case name, e.g. `needs_reboot`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchStatus::UpToDate => "up_to_date",
            PatchStatus::NeedsPatches => "needs_patches",
            PatchStatus::NeedsReboot => "needs_reboot",
        }
    }
}

impl std::fmt::Display for PatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PatchStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "up_to_date" => Ok(PatchStatus::UpToDate),
            "needs_patches" => Ok(PatchStatus::NeedsPatches),
            "needs_reboot" => Ok(PatchStatus::NeedsReboot),
            other => Err(format!("unknown patch status '{}'", other)),
        }
    }
}

impl MlmClient {
    /// List every managed system.
    pub fn list_systems(&mut self) -> Result<Vec<Value>> {
        let path = self.config.endpoints().systems.clone();
        Ok(self.send(ApiCall::get(path).expect(Shape::List))?.into_records())
    }

    /// Number of errata relevant to a system. 0 on any failure.
    pub fn relevant_errata_count(&mut self, sid: i64) -> usize {
        let path = self.config.endpoints().relevant_errata.clone();
        match self.send(ApiCall::get(path).param("sid", sid).expect(Shape::List)) {
            Ok(resp) => resp.into_records().len(),
            Err(e) => {
                debug!(sid, error = %e, "Could not count relevant errata");
                0
            }
        }
    }

    /// Registration date of a system. `None` on any failure.
    pub fn registration_date(&mut self, sid: i64) -> Option<Value> {
        let path = self.config.endpoints().registration_date.clone();
        match self.send(ApiCall::get(path).param("sid", sid)) {
            Ok(NormalizedResponse::Scalar(value)) if is_truthy(&value) => Some(value),
            Ok(_) => None,
            Err(e) => {
                debug!(sid, error = %e, "Could not fetch registration date");
                None
            }
        }
    }

    /// Names of the groups a system is subscribed to. Empty on any failure.
    pub fn system_groups(&mut self, sid: i64) -> Vec<String> {
        let path = self.config.endpoints().system_groups.clone();
        match self.send(ApiCall::get(path).param("sid", sid).expect(Shape::List)) {
            Ok(resp) => resp.into_records().iter().filter_map(group_name).collect(),
            Err(e) => {
                debug!(sid, error = %e, "Could not list system groups");
                Vec::new()
            }
        }
    }

    /// Ids of systems waiting for a reboot. Empty on any failure.
    pub fn systems_requiring_reboot(&mut self) -> Vec<i64> {
        let path = self.config.endpoints().systems_reboot.clone();
        match self.send(ApiCall::get(path).expect(Shape::List)) {
            Ok(resp) => resp
                .into_records()
                .iter()
                .filter_map(|s| s.get("id").and_then(Value::as_i64))
                .filter(|id| *id != 0)
                .collect(),
            Err(e) => {
                warn!(error = %e, "Could not list systems requiring reboot");
                Vec::new()
            }
        }
    }

    /// Every system, enriched with `errata_count`, `patch_status`,
    /// `registration_date` and `groups`, then projected through the
    /// `system` field mapping table.
    ///
    /// Fails if a session held at the start is dropped along the way, since
    /// every later call would go out without the cookie.
    #[instrument(skip(self))]
    pub fn systems_with_patch_status(&mut self) -> Result<Vec<Map<String, Value>>> {
        let had_session = self.is_authenticated();
        let systems = self.list_systems()?;
        let reboot_ids = self.systems_requiring_reboot();
        self.check_session(had_session, "listing systems requiring reboot")?;

        let mut enriched = Vec::with_capacity(systems.len());
        for system in systems {
            let mut system = match system {
                Value::Object(map) => map,
                other => {
                    warn!(record = %other, "Skipping system record that is not an object");
                    continue;
                }
            };

            match system.get("id").and_then(Value::as_i64) {
                Some(sid) => {
                    let step = format!("enriching system {}", sid);
                    let errata_count = self.relevant_errata_count(sid);
                    self.check_session(had_session, &step)?;
                    let status = PatchStatus::derive(errata_count, reboot_ids.contains(&sid));
                    system.insert("errata_count".into(), errata_count.into());
                    system.insert("patch_status".into(), status.as_str().into());

                    let date = self.registration_date(sid);
                    self.check_session(had_session, &step)?;
                    if let Some(date) = date {
                        system.insert("registration_date".into(), date);
                    }

                    let groups = self.system_groups(sid);
                    self.check_session(had_session, &step)?;
                    system.insert("groups".into(), groups.into());
                }
                None => {
                    system.insert("errata_count".into(), 0.into());
                    system.insert("patch_status".into(), PatchStatus::UpToDate.as_str().into());
                    system.insert("groups".into(), Value::Array(Vec::new()));
                }
            }

            system.remove("errata_counts");
            self.config.field_mappings().apply(SYSTEM_ENTITY, &mut system);
            enriched.push(system);
        }

        debug!(count = enriched.len(), "Systems enriched with patch status");
        Ok(enriched)
    }

    fn check_session(&self, had_session: bool, step: &str) -> Result<()> {
        if had_session && !self.is_authenticated() {
            warn!(step, "Session lost, stopping the system listing");
            return Err(Error::new(ErrorKind::Authentication(format!(
                "Session lost while {}",
                step
            ))));
        }
        Ok(())
    }
}

fn group_name(group: &Value) -> Option<String> {
    match group {
        Value::String(name) => Some(name.clone()),
        Value::Object(map) => {
            let subscribed = map.get("subscribed").and_then(Value::as_i64) == Some(1);
            match (subscribed, map.get("system_group_name").and_then(Value::as_str)) {
                (true, Some(name)) => {
                    Some(name.strip_prefix(GROUP_NAME_PREFIX).unwrap_or(name).to_string())
                }
                _ => map.get("name").and_then(Value::as_str).map(str::to_string),
            }
        }
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
