//! Session Store: the single authenticated identity, or none.
//!
//! Auth faults are never surfaced: a failed fetch is an anonymous visitor.

use crate::config::ShellConfig;
use parking_lot::RwLock;
use rowshell_host::HostDocument;
use rowshell_model::{AuthSchema, Session, SessionState};
use std::sync::Arc;
use url::Url;

/// What the embedding page must do after a logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadDirective {
    /// Load this URL in the top-level window.
    Navigate(String),
    /// Plain reload of the current location.
    Reload,
}

#[derive(Clone)]
pub struct SessionStore {
    state: Arc<RwLock<SessionState>>,
    document: Arc<dyn HostDocument>,
    table: String,
    schema: AuthSchema,
}

impl SessionStore {
    pub fn new(document: Arc<dyn HostDocument>, config: &ShellConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::default())),
            document,
            table: config.auth_table.clone(),
            schema: config.auth.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn auth(&self) -> Option<Session> {
        self.state.read().auth.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().is_authenticated()
    }

    pub fn is_ready(&self) -> bool {
        self.state.read().ready
    }

    /// Fetch the authorization table and derive the session.
    ///
    /// Exactly one visible row gives a session; zero rows, several rows and
    /// fetch faults all leave the visitor anonymous. Always marks ready.
    pub async fn load_auth(&self) -> Option<Session> {
        let auth = match self.document.fetch_rows(&self.table).await {
            Ok(rows) => {
                if rows.len() > 1 {
                    tracing::warn!(
                        table = %self.table,
                        rows = rows.len(),
                        "several authorization rows visible, treating as anonymous"
                    );
                }
                Session::from_visible_rows(&rows, &self.schema)
            }
            Err(err) => {
                tracing::warn!(table = %self.table, error = %err, "auth load failed");
                None
            }
        };

        let mut state = self.state.write();
        state.auth = auth.clone();
        state.ready = true;
        auth
    }

    /// Forget the in-memory identity.
    pub fn clear(&self) {
        self.state.write().auth = None;
    }
}

/// Reload target after logout: `top_url` without the access-token parameter.
///
/// Falls back to a plain reload when the URL cannot be rewritten.
pub fn logout_directive(top_url: Option<&str>, token_param: &str) -> ReloadDirective {
    let Some(mut url) = top_url.and_then(|u| Url::parse(u).ok()) else {
        return ReloadDirective::Reload;
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != token_param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    ReloadDirective::Navigate(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowshell_host::MemoryDocument;
    use serde_json::{json, Value};

    fn row(value: Value) -> rowshell_model::Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn store(doc: MemoryDocument) -> SessionStore {
        SessionStore::new(Arc::new(doc), &ShellConfig::default())
    }

    #[tokio::test]
    async fn single_row_populates_session() {
        let doc = MemoryDocument::new().with_rows(
            "AuthLink",
            vec![row(json!({
                "Email": "a@b.fr",
                "Token": "t",
                "Expire_le": 1_700_000_000,
                "Beneficiaire": 0,
                "Repondant": 4,
                "Acheteur": null,
                "Roles": ["L", "repondant"]
            }))],
        );
        let store = store(doc);
        let auth = store.load_auth().await.unwrap();

        assert_eq!(auth.email.as_deref(), Some("a@b.fr"));
        assert_eq!(auth.token.as_deref(), Some("t"));
        assert_eq!(auth.expires_at, Some(json!(1_700_000_000)));
        assert_eq!(auth.beneficiary_id, None);
        assert_eq!(auth.respondent_id, Some(4));
        assert_eq!(auth.buyer_id, None);
        assert!(auth.has_role("repondant"));
        assert!(store.is_ready());
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn zero_or_two_rows_are_anonymous() {
        let empty = store(MemoryDocument::new().with_rows("AuthLink", vec![]));
        assert_eq!(empty.load_auth().await, None);
        assert!(empty.is_ready());

        let two = store(MemoryDocument::new().with_rows(
            "AuthLink",
            vec![row(json!({"Email": "a"})), row(json!({"Email": "b"}))],
        ));
        assert_eq!(two.load_auth().await, None);
        assert!(two.is_ready());
    }

    #[tokio::test]
    async fn fetch_fault_is_anonymous() {
        let doc = MemoryDocument::new().with_rows("AuthLink", vec![row(json!({"Email": "a"}))]);
        doc.fail_table("AuthLink");
        let store = store(doc);
        assert_eq!(store.load_auth().await, None);
        assert!(store.is_ready());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn logout_strips_only_the_token() {
        assert_eq!(
            logout_directive(Some("https://app.example/w?Token_=abc&page=home"), "Token_"),
            ReloadDirective::Navigate("https://app.example/w?page=home".to_string())
        );
        assert_eq!(
            logout_directive(Some("https://app.example/w?Token_=abc"), "Token_"),
            ReloadDirective::Navigate("https://app.example/w".to_string())
        );
    }

    #[test]
    fn unparsable_url_falls_back_to_reload() {
        assert_eq!(logout_directive(Some("not a url"), "Token_"), ReloadDirective::Reload);
        assert_eq!(logout_directive(None, "Token_"), ReloadDirective::Reload);
    }
}
