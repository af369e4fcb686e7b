//! UI Config Loader: header and footer chrome from two optional tables.
//!
//! Any fault falls back to defaults. Chrome is an optional enhancement and
//! never blocks boot.

use crate::config::UiTables;
use rowshell_host::HostDocument;
use rowshell_model::row::cell_string;
use rowshell_model::Row;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HEADER_TITLE: &str = "Application";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Header,
    Footer,
}

impl Placement {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "header" => Some(Self::Header),
            "footer" => Some(Self::Footer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromeLink {
    pub label: String,
    pub href: String,
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiConfig {
    pub header_title: String,
    pub header_tagline: String,
    pub footer_text: String,
    pub links: Vec<ChromeLink>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            header_title: DEFAULT_HEADER_TITLE.to_string(),
            header_tagline: String::new(),
            footer_text: String::new(),
            links: Vec::new(),
        }
    }
}

impl UiConfig {
    /// Build from `key`/`value` rows and `label`/`href`/`placement` rows.
    /// Unknown keys, blank values and malformed links are ignored.
    pub fn from_rows(config_rows: &[Row], link_rows: &[Row]) -> Self {
        let mut config = Self::default();
        for row in config_rows {
            let (Some(key), Some(value)) = (cell_string(row.get("key")), cell_string(row.get("value")))
            else {
                continue;
            };
            match key.as_str() {
                "header_title" => config.header_title = value,
                "header_tagline" => config.header_tagline = value,
                "footer_text" => config.footer_text = value,
                _ => {}
            }
        }
        config.links = link_rows
            .iter()
            .filter_map(|row| {
                Some(ChromeLink {
                    label: cell_string(row.get("label"))?,
                    href: cell_string(row.get("href"))?,
                    placement: Placement::parse(&cell_string(row.get("placement"))?)?,
                })
            })
            .collect();
        config
    }

    pub fn links_at(&self, placement: Placement) -> impl Iterator<Item = &ChromeLink> {
        self.links.iter().filter(move |l| l.placement == placement)
    }
}

/// Load chrome configuration. A missing or failing table contributes
/// nothing; the other one still applies.
pub async fn load_ui_config(document: &dyn HostDocument, tables: &UiTables) -> UiConfig {
    let config_rows = rows_or_empty(document, &tables.config).await;
    let link_rows = rows_or_empty(document, &tables.links).await;
    UiConfig::from_rows(&config_rows, &link_rows)
}

async fn rows_or_empty(document: &dyn HostDocument, table: &str) -> Vec<Row> {
    match document.fetch_rows(table).await {
        Ok(rows) => rows,
        Err(err) => {
            tracing::warn!(table = %table, error = %err, "ui config unavailable, using defaults");
            Vec::new()
        }
    }
}
