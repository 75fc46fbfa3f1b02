use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Home directory not found")]
    HomeNotFound,
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// One tenant of the report: where its tasks live in ClickUp and, when the
/// Toggl sync is enabled, which Toggl workspace receives its entries.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Client {
    pub name: String,
    pub team_id: String,
    pub list_id: String,
    pub contract_included: f64,
    #[serde(default)]
    pub toggl_sync_enabled: bool,
    #[serde(default)]
    pub toggl_workspace_id: Option<String>,
}

/// Per-developer billing divisor. Lower coefficient means more billed hours
/// per hour logged; unknown usernames count at 1.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CoefficientTable(HashMap<String, f64>);

impl CoefficientTable {
    pub fn get(&self, username: &str) -> f64 {
        self.0.get(username).copied().unwrap_or(1.0)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (username, coefficient) in &self.0 {
            if !coefficient.is_finite() || *coefficient <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "coefficient for {username} must be a positive number, got {coefficient}"
                )));
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, f64)> for CoefficientTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub developer_coefficients: CoefficientTable,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path().ok_or(ConfigError::HomeNotFound)?;
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.clients.is_empty() {
            return Err(ConfigError::Invalid("no clients configured".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for client in &self.clients {
            if !seen.insert(client.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate client name: {}",
                    client.name
                )));
            }
            if client.toggl_sync_enabled && client.toggl_workspace_id.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "client {} has toggl_sync_enabled but no toggl_workspace_id",
                    client.name
                )));
            }
            if let Some(workspace_id) = &client.toggl_workspace_id {
                if workspace_id.parse::<u64>().is_err() {
                    return Err(ConfigError::Invalid(format!(
                        "client {} has non-numeric toggl_workspace_id: {workspace_id}",
                        client.name
                    )));
                }
            }
        }
        self.developer_coefficients.validate()
    }
}

pub fn read_clickup_token() -> Option<String> {
    read_token("CLICKUP_API_TOKEN", ".clickup2invoice-token")
}

pub fn read_toggl_token() -> Option<String> {
    read_token("TOGGL_API_TOKEN", ".clickup2invoice-toggl-token")
}

fn read_token(env_var: &str, file_name: &str) -> Option<String> {
    if let Ok(value) = env::var(env_var) {
        if !value.trim().is_empty() {
            return Some(value.trim().to_string());
        }
    }

    let mut path = dirs::home_dir()?;
    path.push(file_name);
    fs::read_to_string(path)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn config_path() -> Option<PathBuf> {
    let mut path = dirs::home_dir()?;
    path.push(".clickup2invoice.json");
    Some(path)
}
