//! Shell configuration: table names, column names, parameters, landing rules.
//!
//! Every field has a default, so an empty JSON object is a valid override
//! file.

use rowshell_model::{AuthSchema, ComponentSchema};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One entry of the role priority list: holders of `role` land on `page_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingRule {
    pub role: String,
    pub page_id: String,
    /// Label of the role-space shortcut in the identity widget.
    pub label: String,
}

impl LandingRule {
    pub fn new(role: &str, page_id: &str, label: &str) -> Self {
        Self {
            role: role.to_string(),
            page_id: page_id.to_string(),
            label: label.to_string(),
        }
    }
}

/// Tables read by the UI Config Loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiTables {
    pub config: String,
    pub links: String,
}

impl Default for UiTables {
    fn default() -> Self {
        Self {
            config: "Application_Config".to_string(),
            links: "Application_Liens".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub components_table: String,
    pub auth_table: String,
    pub ui_tables: UiTables,
    pub components: ComponentSchema,
    pub auth: AuthSchema,
    /// Query parameter carrying the access grant; stripped on logout.
    pub token_param: String,
    /// Inbound page parameters, in lookup order.
    pub page_params: Vec<String>,
    pub login_page: String,
    /// Landing priority, highest first.
    pub landing: Vec<LandingRule>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            components_table: "Application_Composants".to_string(),
            auth_table: "AuthLink".to_string(),
            ui_tables: UiTables::default(),
            components: ComponentSchema::default(),
            auth: AuthSchema::default(),
            token_param: "Token_".to_string(),
            page_params: vec!["id".to_string(), "page".to_string(), "component".to_string()],
            login_page: "login".to_string(),
            landing: vec![
                LandingRule::new("repondant", "espace-repondant", "Espace répondant"),
                LandingRule::new("beneficiaire", "espace-beneficiaire", "Espace bénéficiaire"),
                LandingRule::new("acheteur", "espace-acheteur", "Espace acheteur"),
            ],
        }
    }
}

impl ShellConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}
