//! Ansible dynamic inventory document.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use mlm_client::{MlmClient, PatchStatus};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::cache::SystemCache;
use crate::compose::Expression;
use crate::error::{Error, ErrorKind, Result};
use crate::filter::{truthy, value_text, InventoryFilters};

/// Group holding every inventory host.
pub const ALL_SYSTEMS_GROUP: &str = "mlm_systems";

/// `group_by` key that creates `patch_status_<status>` groups.
pub const GROUP_BY_PATCH_STATUS: &str = "patch_status";

/// Fields tried, in order, for the `registration_date` host variable.
const REGISTRATION_DATE_FIELDS: &[&str] =
    &["registration_date", "created", "registered", "registrationDate"];

/// Default cache lifetime in seconds.
pub const DEFAULT_CACHE_TIMEOUT: u64 = 3600;

/// Default cache key prefix.
pub const DEFAULT_CACHE_PREFIX: &str = "mlm";

/// Inventory options: which systems to keep, how to group them, extra host
/// variables and result caching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryOptions {
    pub filters: InventoryFilters,
    pub group_by: Vec<String>,
    /// Host variable name to expression, see [`Expression`].
    pub compose: BTreeMap<String, String>,
    /// Reuse the filtered system list from an earlier run.
    pub cache: bool,
    /// Seconds a cached list stays valid. 0 never expires.
    pub cache_timeout: u64,
    pub cache_prefix: String,
    /// Cache directory. Defaults to `~/.ansible/tmp/ansible_mlm_inventory`.
    pub cache_connection: Option<PathBuf>,
}

impl Default for InventoryOptions {
    fn default() -> Self {
        Self {
            filters: InventoryFilters::default(),
            group_by: vec![GROUP_BY_PATCH_STATUS.to_string()],
            compose: BTreeMap::new(),
            cache: false,
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            cache_connection: None,
        }
    }
}

impl InventoryOptions {
    /// Load options from a YAML file. Unknown keys are ignored.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn with_filters(mut self, filters: InventoryFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_group_by<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_compose(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.compose.insert(name.into(), expression.into());
        self
    }

    /// Enable the result cache in `dir`.
    pub fn with_cache(mut self, dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        self.cache = true;
        self.cache_connection = Some(dir.into());
        self.cache_timeout = timeout.as_secs();
        self
    }

    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    /// Cache key: the prefix plus every filter not set to `all`, so that
    /// different filters never share an entry.
    pub fn cache_key(&self) -> String {
        let filter_key = self.filters.cache_key();
        if filter_key.is_empty() {
            self.cache_prefix.clone()
        } else {
            format!("{}_{}", self.cache_prefix, filter_key)
        }
    }

    fn system_cache(&self) -> Option<SystemCache> {
        if !self.cache {
            return None;
        }
        let dir = self.cache_connection.clone().or_else(SystemCache::default_dir);
        if dir.is_none() {
            warn!("No cache directory available, inventory cache disabled");
        }
        dir.map(|dir| SystemCache::new(dir, Duration::from_secs(self.cache_timeout)))
    }

    fn compose_expressions(&self) -> Result<Vec<(String, Expression)>> {
        self.compose
            .iter()
            .map(|(name, source)| {
                Expression::parse(source)
                    .map(|expr| (name.clone(), expr))
                    .map_err(|e| {
                        Error::new(ErrorKind::Options(format!(
                            "invalid compose expression for '{}': {}",
                            name, e
                        )))
                    })
            })
            .collect()
    }
}

/// Hosts, their variables and their groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    groups: BTreeMap<String, BTreeSet<String>>,
    hostvars: BTreeMap<String, Map<String, Value>>,
}

impl Inventory {
    /// Build an inventory from enriched system records.
    ///
    /// Systems without a host name (`hostname`, then `name`) or without an
    /// `id` are skipped.
    pub fn from_systems<I, S>(systems: I, group_by: &[S]) -> Self
    where
        I: IntoIterator<Item = Map<String, Value>>,
        S: AsRef<str>,
    {
        let by_patch_status = group_by.iter().any(|k| k.as_ref() == GROUP_BY_PATCH_STATUS);

        let mut inventory = Inventory::default();
        inventory.groups.insert(ALL_SYSTEMS_GROUP.to_string(), BTreeSet::new());

        for mut system in systems {
            let host = match inventory_hostname(&system) {
                Some(host) if system.get("id").is_some_and(truthy) => host,
                _ => {
                    debug!("Skipping system without host name or id");
                    continue;
                }
            };

            system
                .entry("patch_status")
                .or_insert_with(|| PatchStatus::UpToDate.as_str().into());

            inventory.add_host(&host, ALL_SYSTEMS_GROUP);
            inventory.set_host_variables(&host, &system);

            if by_patch_status {
                let status = system
                    .get("patch_status")
                    .map(value_text)
                    .unwrap_or_else(|| PatchStatus::UpToDate.to_string());
                inventory.add_host(&host, &format!("patch_status_{}", status));
            }

            if let Some(Value::Array(groups)) = system.get("groups") {
                for group in groups {
                    let name = value_text(group);
                    if !name.is_empty() {
                        inventory.add_host(&host, &name);
                    }
                }
            }
        }

        inventory
    }

    /// Fetch systems, filter them and build the inventory.
    ///
    /// With caching on, a fresh cached list for the same filters is used
    /// without contacting the server, and a live list is written back.
    #[instrument(skip(client, options))]
    pub fn collect(client: &mut MlmClient, options: &InventoryOptions) -> Result<Self> {
        let compose = options.compose_expressions()?;
        let cache = options.system_cache();
        let key = options.cache_key();

        let cached = cache.as_ref().and_then(|c| c.load(&key));
        let systems = match cached {
            Some(systems) => {
                info!(count = systems.len(), key = %key, "Systems loaded from inventory cache");
                systems
            }
            None => {
                let systems = client.with_session(|c| c.systems_with_patch_status())?;
                let total = systems.len();
                let systems = options.filters.apply(systems);
                info!(total, kept = systems.len(), "Systems fetched for inventory");
                if let Some(cache) = &cache {
                    cache.store(&key, &systems);
                }
                systems
            }
        };

        let mut inventory = Self::from_systems(systems, &options.group_by);
        inventory.compose(&compose);
        Ok(inventory)
    }

    /// Add composed variables to every host. Each expression sees the host
    /// variables as they were before composing; one that does not resolve
    /// is skipped.
    pub fn compose(&mut self, expressions: &[(String, Expression)]) {
        for (host, vars) in self.hostvars.iter_mut() {
            let snapshot = vars.clone();
            for (name, expr) in expressions {
                match expr.eval(&snapshot) {
                    Some(value) => {
                        vars.insert(name.clone(), value);
                    }
                    None => debug!(host = %host, variable = %name, "Composed variable left unset"),
                }
            }
        }
    }

    /// Inventory host names, sorted.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hostvars.keys().map(String::as_str)
    }

    /// Hosts in a group, sorted. `None` if the group does not exist.
    pub fn group(&self, name: &str) -> Option<impl Iterator<Item = &str>> {
        self.groups.get(name).map(|hosts| hosts.iter().map(String::as_str))
    }

    /// Group names, sorted.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Variables of one host.
    pub fn host_vars(&self, host: &str) -> Option<&Map<String, Value>> {
        self.hostvars.get(host)
    }

    /// Variables of one host, as the JSON object `--host` prints.
    pub fn host_json(&self, host: &str) -> Result<Value> {
        self.host_vars(host)
            .map(|vars| Value::Object(vars.clone()))
            .ok_or_else(|| Error::new(ErrorKind::UnknownHost(host.to_string())))
    }

    /// The whole inventory, as the JSON object `--list` prints.
    pub fn to_json(&self) -> Value {
        let mut doc = Map::new();
        for (name, hosts) in &self.groups {
            doc.insert(name.clone(), json!({ "hosts": hosts }));
        }
        doc.insert(
            "all".to_string(),
            json!({ "children": self.groups.keys().collect::<Vec<_>>() }),
        );
        doc.insert("_meta".to_string(), json!({ "hostvars": self.hostvars }));
        Value::Object(doc)
    }

    fn add_host(&mut self, host: &str, group: &str) {
        self.hostvars.entry(host.to_string()).or_default();
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(host.to_string());
    }

    fn set_host_variables(&mut self, host: &str, system: &Map<String, Value>) {
        let vars = self.hostvars.entry(host.to_string()).or_default();

        for (key, value) in system {
            match key.as_str() {
                // `name` is reserved in Ansible
                "name" => {
                    vars.insert("system_name".into(), value.clone());
                }
                "errata_counts" => {}
                _ => {
                    vars.insert(key.clone(), value.clone());
                }
            }
        }

        if let Some(date) = REGISTRATION_DATE_FIELDS.iter().find_map(|f| system.get(*f)) {
            vars.insert("registration_date".into(), value_text(date).into());
        }

        let present = |key: &str| system.get(key).filter(|v| truthy(v));
        let ansible_host = if let Some(ip) = present("ip") {
            Some(ip.clone())
        } else if let Some(ip) = present("ipAddress") {
            vars.insert("ip".into(), ip.clone());
            Some(ip.clone())
        } else if let Some(hostname) = present("hostname") {
            Some(hostname.clone())
        } else {
            system.get("name").filter(|v| truthy(v)).cloned()
        };
        if let Some(address) = ansible_host {
            vars.insert("ansible_host".into(), address);
        }

        match system.get("os") {
            Some(Value::Object(os)) => {
                for (os_key, var) in [
                    ("name", "os_name"),
                    ("version", "os_version"),
                    ("family", "os_family"),
                ] {
                    if let Some(value) = os.get(os_key) {
                        if !system.contains_key(var) {
                            vars.insert(var.into(), value.clone());
                        }
                    }
                }
            }
            Some(Value::String(os)) if !system.contains_key("os_name") => {
                vars.insert("os_name".into(), os.clone().into());
            }
            Some(_) | None => {}
        }
    }
}

fn inventory_hostname(system: &Map<String, Value>) -> Option<String> {
    let name = ["hostname", "name"]
        .iter()
        .filter_map(|key| system.get(*key))
        .find(|v| truthy(v))?;
    match name {
        Value::String(s) => Some(s.clone()),
        other => {
            warn!(name = %other, "System name is not a string");
            Some(other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlm_client::{ConfigOverrides, ConnectionConfig, RetryConfig, ScriptedTransport};
    use std::collections::HashMap;

    fn system(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test system must be an object"),
        }
    }

    fn sample() -> Vec<Map<String, Value>> {
        vec![
            system(json!({
                "id": 1000010000,
                "name": "web01",
                "hostname": "web01.example.com",
                "ip": "10.0.0.5",
                "patch_status": "needs_patches",
                "groups": ["web", "Production"],
                "os": {"name": "SLES", "version": "15.5", "family": "Suse"},
                "created": "2023-01-01",
                "errata_counts": {"security": 2},
            })),
            system(json!({
                "id": 1000010001,
                "name": "db01",
                "ipAddress": "10.0.0.6",
                "os": "openSUSE Leap",
                "groups": [],
            })),
            system(json!({"name": "no-id"})),
            system(json!({"id": 5})),
        ]
    }

    #[test]
    fn test_hosts_and_skips() {
        let inventory = Inventory::from_systems(sample(), &[GROUP_BY_PATCH_STATUS]);
        let hosts: Vec<_> = inventory.hosts().collect();
        assert_eq!(hosts, vec!["db01", "web01.example.com"]);

        let all: Vec<_> = inventory.group(ALL_SYSTEMS_GROUP).unwrap().collect();
        assert_eq!(all, vec!["db01", "web01.example.com"]);
    }

    #[test]
    fn test_patch_status_groups() {
        let inventory = Inventory::from_systems(sample(), &[GROUP_BY_PATCH_STATUS]);
        let needs: Vec<_> = inventory.group("patch_status_needs_patches").unwrap().collect();
        assert_eq!(needs, vec!["web01.example.com"]);
        let current: Vec<_> = inventory.group("patch_status_up_to_date").unwrap().collect();
        assert_eq!(current, vec!["db01"]);

        let ungrouped = Inventory::from_systems(sample(), &[] as &[&str]);
        assert!(ungrouped.group("patch_status_up_to_date").is_none());
        // defaulted even without grouping
        assert_eq!(ungrouped.host_vars("db01").unwrap()["patch_status"], json!("up_to_date"));
    }

    #[test]
    fn test_system_groups_keep_returned_names() {
        let inventory = Inventory::from_systems(sample(), &[] as &[&str]);
        assert!(inventory.group("web").is_some());
        assert!(inventory.group("Production").is_some());
    }

    #[test]
    fn test_host_variables() {
        let inventory = Inventory::from_systems(sample(), &[GROUP_BY_PATCH_STATUS]);

        let web = inventory.host_vars("web01.example.com").unwrap();
        assert_eq!(web["system_name"], json!("web01"));
        assert!(!web.contains_key("name"));
        assert!(!web.contains_key("errata_counts"));
        assert_eq!(web["ansible_host"], json!("10.0.0.5"));
        assert_eq!(web["registration_date"], json!("2023-01-01"));
        assert_eq!(web["os_name"], json!("SLES"));
        assert_eq!(web["os_version"], json!("15.5"));
        assert_eq!(web["os_family"], json!("Suse"));

        let db = inventory.host_vars("db01").unwrap();
        assert_eq!(db["ansible_host"], json!("10.0.0.6"));
        assert_eq!(db["ip"], json!("10.0.0.6"));
        assert_eq!(db["os_name"], json!("openSUSE Leap"));
        assert!(!db.contains_key("registration_date"));
    }

    #[test]
    fn test_ansible_host_falls_back_to_name() {
        let systems = vec![system(json!({"id": 7, "name": "bare", "hostname": ""}))];
        let inventory = Inventory::from_systems(systems, &[] as &[&str]);
        assert_eq!(inventory.host_vars("bare").unwrap()["ansible_host"], json!("bare"));
    }

    #[test]
    fn test_explicit_os_fields_win() {
        let systems = vec![system(json!({
            "id": 7,
            "name": "h",
            "os_name": "Custom",
            "os": {"name": "SLES", "version": "15"}
        }))];
        let inventory = Inventory::from_systems(systems, &[] as &[&str]);
        let vars = inventory.host_vars("h").unwrap();
        assert_eq!(vars["os_name"], json!("Custom"));
        assert_eq!(vars["os_version"], json!("15"));
    }

    #[test]
    fn test_list_document() {
        let inventory = Inventory::from_systems(sample(), &[GROUP_BY_PATCH_STATUS]);
        let doc = inventory.to_json();

        assert_eq!(doc["mlm_systems"]["hosts"], json!(["db01", "web01.example.com"]));
        assert_eq!(doc["web"]["hosts"], json!(["web01.example.com"]));
        assert!(doc["all"]["children"]
            .as_array()
            .unwrap()
            .contains(&json!("mlm_systems")));
        assert_eq!(
            doc["_meta"]["hostvars"]["db01"]["system_name"],
            json!("db01")
        );
    }

    #[test]
    fn test_host_json_unknown_host() {
        let inventory = Inventory::from_systems(sample(), &[] as &[&str]);
        assert!(inventory.host_json("db01").is_ok());
        let err = inventory.host_json("nope").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnknownHost(ref h) if h == "nope"));
    }

    #[test]
    fn test_options_from_yaml() {
        let options = InventoryOptions::from_yaml(
            "filters:\n  status: all\n  patch_status: needs_reboot\ngroup_by: []\nplugin: mlm\n",
        )
        .unwrap();
        assert_eq!(options.filters.status, crate::StatusFilter::All);
        assert!(options.group_by.is_empty());

        assert_eq!(InventoryOptions::from_yaml("").unwrap(), InventoryOptions::default());
        assert!(!options.cache);

        let cached = InventoryOptions::from_yaml(
            "cache: true\ncache_timeout: 60\ncache_prefix: lab\ncache_connection: /var/cache/mlm\ncompose:\n  needs_reboot: \"patch_status == 'needs_reboot'\"\n",
        )
        .unwrap();
        assert!(cached.cache);
        assert_eq!(cached.cache_timeout, 60);
        assert_eq!(cached.cache_key(), "lab_status_active");
        assert_eq!(cached.cache_connection, Some(PathBuf::from("/var/cache/mlm")));
        assert_eq!(cached.compose.len(), 1);
        assert!(InventoryOptions::from_yaml("filters: [").is_err());
    }

    #[test]
    fn test_options_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mlm.yml");
        std::fs::write(&path, "filters:\n  system_groups: [web]\n").unwrap();

        let options = InventoryOptions::from_file(&path).unwrap();
        assert_eq!(options.filters.system_groups, Some(vec!["web".to_string()]));
        assert_eq!(options.group_by, vec![GROUP_BY_PATCH_STATUS.to_string()]);

        let err = InventoryOptions::from_file(dir.path().join("missing.yml")).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Options(_)));
    }

    fn scripted_client(transport: &ScriptedTransport) -> MlmClient {
        let overrides = ConfigOverrides::new()
            .with_url("https://mlm.example.com")
            .with_username("admin")
            .with_password("secret")
            .without_profile_store()
            .with_retry(RetryConfig::default().with_unit(Duration::from_millis(1)));
        let config =
            ConnectionConfig::resolve_with_env(&overrides, HashMap::<String, String>::new())
                .unwrap();
        MlmClient::with_transport(config, transport.clone())
    }

    /// Login, two systems (one inactive), their details and logout.
    fn script_two_systems(transport: &ScriptedTransport) {
        transport
            .push(
                mlm_client::HttpResponse::new(200)
                    .with_header("set-cookie", "pxt-session-cookie=abc; Path=/")
                    .with_json(&json!({"success": true})),
            )
            .push_json(200, json!({"result": [
                {"id": 1, "name": "web01", "ip": "10.0.0.5"},
                {"id": 2, "name": "old01", "active": false}
            ]}))
            .push_json(200, json!({"result": []}))
            // web01
            .push_json(200, json!({"result": []}))
            .push_json(200, json!({"result": null}))
            .push_json(200, json!({"result": []}))
            // old01
            .push_json(200, json!({"result": [{"advisory": "SUSE-1"}]}))
            .push_json(200, json!({"result": null}))
            .push_json(200, json!({"result": []}))
            .push_json(200, json!({"result": 1}));
    }

    #[test]
    fn test_collect_filters_and_logs_out() {
        let transport = ScriptedTransport::new();
        script_two_systems(&transport);
        let mut client = scripted_client(&transport);

        let inventory = Inventory::collect(&mut client, &InventoryOptions::default()).unwrap();
        let hosts: Vec<_> = inventory.hosts().collect();
        assert_eq!(hosts, vec!["web01"]);
        assert!(inventory.group("patch_status_up_to_date").is_some());

        assert_eq!(transport.remaining(), 0);
        assert!(transport.requests().last().unwrap().url().ends_with("/auth/logout"));
        assert!(!client.is_authenticated());
    }

    #[test]
    fn test_cache_hit_skips_the_server() {
        let dir = tempfile::tempdir().unwrap();
        let options = InventoryOptions::default()
            .with_cache(dir.path(), Duration::from_secs(3600))
            .with_compose("needs_reboot", "patch_status == 'needs_reboot'");

        let transport = ScriptedTransport::new();
        script_two_systems(&transport);
        let mut client = scripted_client(&transport);
        let live = Inventory::collect(&mut client, &options).unwrap();
        assert_eq!(transport.remaining(), 0);
        assert!(dir.path().join("mlm_status_active").exists());

        let idle = ScriptedTransport::new();
        let mut client = scripted_client(&idle);
        let cached = Inventory::collect(&mut client, &options).unwrap();

        assert_eq!(idle.request_count(), 0);
        assert_eq!(cached, live);
        assert_eq!(cached.host_vars("web01").unwrap()["needs_reboot"], json!(false));
    }

    #[test]
    fn test_cache_is_keyed_by_filters() {
        let dir = tempfile::tempdir().unwrap();
        let cached = InventoryOptions::default().with_cache(dir.path(), Duration::ZERO);

        let transport = ScriptedTransport::new();
        script_two_systems(&transport);
        Inventory::collect(&mut scripted_client(&transport), &cached).unwrap();

        let every_system = cached.clone().with_filters(InventoryFilters::all());
        assert_eq!(every_system.cache_key(), "mlm");

        let transport = ScriptedTransport::new();
        script_two_systems(&transport);
        let inventory = Inventory::collect(&mut scripted_client(&transport), &every_system).unwrap();
        assert_eq!(transport.remaining(), 0);
        assert_eq!(inventory.hosts().count(), 2);
    }

    #[test]
    fn test_collect_composes_variables() {
        let options = InventoryOptions::default()
            .with_compose("address", "ip | string")
            .with_compose("mac", "network.mac");

        let transport = ScriptedTransport::new();
        script_two_systems(&transport);
        let inventory = Inventory::collect(&mut scripted_client(&transport), &options).unwrap();

        let vars = inventory.host_vars("web01").unwrap();
        assert_eq!(vars["address"], json!("10.0.0.5"));
        assert!(!vars.contains_key("mac"));
    }

    #[test]
    fn test_invalid_compose_fails_before_fetch() {
        let options = InventoryOptions::default().with_compose("x", "a = b");
        let transport = ScriptedTransport::new();

        let err = Inventory::collect(&mut scripted_client(&transport), &options).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Options(_)));
        assert!(err.to_string().contains("'x'"));
        assert_eq!(transport.request_count(), 0);
    }
}
