//! Component records: one row per page or shared module.

use crate::row::{cell_i64, cell_string, row_id_of, to_bool, Row, RowId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Sort key used when a record has no explicit navigation order.
pub const DEFAULT_NAV_ORDER: i64 = 9999;

/// Whether a record is a navigable page or an importable shared module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Page,
    Component,
}

impl ComponentKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "page" => Some(Self::Page),
            "component" | "module" | "shared" => Some(Self::Component),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Component => "component",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column ids of the components table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentSchema {
    pub id: String,
    pub name: String,
    pub source_code: String,
    pub source_type: String,
    pub kind: String,
    pub show_in_nav: String,
    pub nav_order: String,
    pub is_default: String,
    pub requires_auth: String,
}

impl Default for ComponentSchema {
    fn default() -> Self {
        Self {
            id: "template_id".to_string(),
            name: "template_name".to_string(),
            source_code: "component_code".to_string(),
            source_type: "component_type".to_string(),
            kind: "component_kind".to_string(),
            show_in_nav: "show_in_nav".to_string(),
            nav_order: "nav_order".to_string(),
            is_default: "default_component".to_string(),
            requires_auth: "requires_auth".to_string(),
        }
    }
}

impl ComponentSchema {
    /// Every column the editor writes back on save.
    pub fn editable_fields(&self) -> [&str; 9] {
        [
            self.id.as_str(),
            self.name.as_str(),
            self.source_code.as_str(),
            self.source_type.as_str(),
            self.kind.as_str(),
            self.show_in_nav.as_str(),
            self.nav_order.as_str(),
            self.is_default.as_str(),
            self.requires_auth.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("invalid component (missing {field}): {id}")]
    MissingField { id: String, field: &'static str },
    #[error("invalid component kind `{kind}` for {id} (expected page|component)")]
    UnknownKind { id: String, kind: String },
}

/// A validated component record with sanitized source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub row_id: Option<RowId>,
    pub id: String,
    pub name: String,
    pub kind: ComponentKind,
    pub source_code: String,
    pub source_type: String,
    pub show_in_nav: bool,
    pub nav_order: i64,
    pub is_default: bool,
    pub requires_auth: bool,
}

impl ComponentRecord {
    /// Validate a raw row against `schema`.
    ///
    /// `id`, `name` and `sourceCode` are required; a source that is blank
    /// after sanitization counts as missing.
    pub fn from_row(row: &Row, schema: &ComponentSchema) -> Result<Self, RecordError> {
        let id = cell_string(row.get(&schema.id));
        let shown_id = id.clone().unwrap_or_else(|| "(no id)".to_string());
        let missing = |field: &'static str| RecordError::MissingField {
            id: shown_id.clone(),
            field,
        };

        let id = id.ok_or_else(|| missing("id"))?;
        let name = cell_string(row.get(&schema.name)).ok_or_else(|| missing("name"))?;
        let source_code = cell_string(row.get(&schema.source_code))
            .map(|code| sanitize_source(&code))
            .filter(|code| !code.is_empty())
            .ok_or_else(|| missing("sourceCode"))?;

        let raw_kind = cell_string(row.get(&schema.kind)).unwrap_or_default();
        let kind = ComponentKind::parse(&raw_kind).ok_or_else(|| RecordError::UnknownKind {
            id: id.clone(),
            kind: raw_kind.clone(),
        })?;

        let flag = |col: &str| row.get(col).map(to_bool).unwrap_or(false);

        Ok(Self {
            row_id: row_id_of(row),
            kind,
            source_type: cell_string(row.get(&schema.source_type))
                .unwrap_or_else(|| "react".to_string()),
            show_in_nav: flag(&schema.show_in_nav),
            nav_order: cell_i64(row.get(&schema.nav_order), DEFAULT_NAV_ORDER),
            is_default: flag(&schema.is_default),
            requires_auth: flag(&schema.requires_auth),
            id,
            name,
            source_code,
        })
    }

    pub fn is_page(&self) -> bool {
        self.kind == ComponentKind::Page
    }
}

/// Normalize stored source: CRLF to LF, strip control characters other than
/// tab and newline, trim.
pub fn sanitize_source(code: &str) -> String {
    code.replace("\r\n", "\n")
        .chars()
        .filter(|c| *c >= ' ' || *c == '\t' || *c == '\n')
        .collect::<String>()
        .trim()
        .to_string()
}
