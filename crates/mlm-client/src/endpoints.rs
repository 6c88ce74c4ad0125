//! API endpoint paths, relative to the configured base URL.

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// Paths of the API calls this client makes on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointTable {
    pub login: String,
    pub logout: String,
    pub systems: String,
    pub relevant_errata: String,
    pub registration_date: String,
    pub system_groups: String,
    pub org_list: String,
    pub org_details: String,
    pub systems_reboot: String,
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            logout: "/auth/logout".to_string(),
            systems: "/system/listSystems".to_string(),
            relevant_errata: "/system/getRelevantErrata".to_string(),
            registration_date: "/system/getRegistrationDate".to_string(),
            system_groups: "/system/listGroups".to_string(),
            org_list: "/org/listOrgs".to_string(),
            org_details: "/org/getDetails".to_string(),
            systems_reboot: "/system/listSuggestedReboot".to_string(),
        }
    }
}

impl EndpointTable {
    /// Names of every endpoint in the table.
    pub const NAMES: [&'static str; 9] = [
        "login",
        "logout",
        "systems",
        "relevant_errata",
        "registration_date",
        "system_groups",
        "org_list",
        "org_details",
        "systems_reboot",
    ];

    /// Look up an endpoint by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        let path = match name {
            "login" => &self.login,
            "logout" => &self.logout,
            "systems" => &self.systems,
            "relevant_errata" => &self.relevant_errata,
            "registration_date" => &self.registration_date,
            "system_groups" => &self.system_groups,
            "org_list" => &self.org_list,
            "org_details" => &self.org_details,
            "systems_reboot" => &self.systems_reboot,
            _ => return None,
        };
        Some(path.as_str())
    }

    /// Replace the path of one endpoint. Unknown names are a configuration error.
    pub fn set(&mut self, name: &str, path: impl Into<String>) -> Result<()> {
        let slot = match name {
            "login" => &mut self.login,
            "logout" => &mut self.logout,
            "systems" => &mut self.systems,
            "relevant_errata" => &mut self.relevant_errata,
            "registration_date" => &mut self.registration_date,
            "system_groups" => &mut self.system_groups,
            "org_list" => &mut self.org_list,
            "org_details" => &mut self.org_details,
            "systems_reboot" => &mut self.systems_reboot,
            _ => {
                return Err(Error::new(ErrorKind::Configuration(format!(
                    "Unknown API endpoint '{}'",
                    name
                )))
                .with_parameter("api_endpoints"))
            }
        };

        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        *slot = path;
        Ok(())
    }

    /// Apply a set of `(name, path)` overrides.
    pub fn with_overrides<'a, I>(mut self, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (name, path) in overrides {
            self.set(name, path.as_str())?;
        }
        Ok(self)
    }
}
