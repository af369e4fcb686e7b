//! The authenticated identity derived from the authorization table.

use crate::row::{cell_ref, cell_string, choice_list, Row, RowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Column ids of the authorization table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSchema {
    pub email: String,
    pub token: String,
    pub expires_at: String,
    pub beneficiary: String,
    pub respondent: String,
    pub buyer: String,
    pub roles: String,
}

impl Default for AuthSchema {
    fn default() -> Self {
        Self {
            email: "Email".to_string(),
            token: "Token".to_string(),
            expires_at: "Expire_le".to_string(),
            beneficiary: "Beneficiaire".to_string(),
            respondent: "Repondant".to_string(),
            buyer: "Acheteur".to_string(),
            roles: "Roles".to_string(),
        }
    }
}

/// Role tags held by a session.
pub type RoleSet = BTreeSet<String>;

/// A signed-in identity. Credential metadata is passed through untouched;
/// expiry is stored, never enforced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub email: Option<String>,
    pub token: Option<String>,
    pub expires_at: Option<Value>,
    pub beneficiary_id: Option<RowId>,
    pub respondent_id: Option<RowId>,
    pub buyer_id: Option<RowId>,
    pub roles: RoleSet,
}

impl Session {
    /// Derive the session from every authorization row visible to the caller.
    ///
    /// Only a single visible row yields a session. Zero rows and several rows
    /// both mean anonymous.
    pub fn from_visible_rows(rows: &[Row], schema: &AuthSchema) -> Option<Self> {
        match rows {
            [row] => Some(Self::from_row(row, schema)),
            _ => None,
        }
    }

    pub fn from_row(row: &Row, schema: &AuthSchema) -> Self {
        let expires_at = row
            .get(&schema.expires_at)
            .filter(|v| !v.is_null())
            .cloned();
        Self {
            email: cell_string(row.get(&schema.email)),
            token: cell_string(row.get(&schema.token)),
            expires_at,
            beneficiary_id: cell_ref(row.get(&schema.beneficiary)),
            respondent_id: cell_ref(row.get(&schema.respondent)),
            buyer_id: cell_ref(row.get(&schema.buyer)),
            roles: choice_list(row.get(&schema.roles)).into_iter().collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Session slot plus the readiness flag set after the first auth load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub auth: Option<Session>,
    pub ready: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }
}
