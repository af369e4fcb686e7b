//! Navigation Resolver: the ordered navigable page set and the chrome built
//! from it (nav bar, mobile nav, identity widget).
//!
//! Every view here is rebuilt from scratch on each call, so rendering twice
//! with the same inputs yields equal values and nothing accumulates.

use crate::config::LandingRule;
use rowshell_model::{ComponentRecord, Session};
use serde::{Deserialize, Serialize};

/// Label shown for a signed-in identity without an email.
pub const ACCOUNT_FALLBACK_LABEL: &str = "Compte";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavEntry {
    pub id: String,
    pub name: String,
    pub nav_order: i64,
}

/// Pages shown in navigation, ascending by `nav_order`, ties kept in load
/// order. Auth-gated pages only appear for a signed-in visitor.
pub fn nav_entries<'a>(
    pages: impl IntoIterator<Item = &'a ComponentRecord>,
    authenticated: bool,
) -> Vec<NavEntry> {
    let mut entries: Vec<NavEntry> = pages
        .into_iter()
        .filter(|p| p.is_page() && p.show_in_nav && (!p.requires_auth || authenticated))
        .map(|p| NavEntry {
            id: p.id.clone(),
            name: p.name.clone(),
            nav_order: p.nav_order,
        })
        .collect();
    // Vec::sort_by_key is stable.
    entries.sort_by_key(|e| e.nav_order);
    entries
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavLink {
    pub id: String,
    pub name: String,
    pub active: bool,
}

impl NavLink {
    /// Value of the link's `aria-current` attribute.
    pub fn aria_current(&self) -> &'static str {
        if self.active {
            "page"
        } else {
            "false"
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavView {
    pub links: Vec<NavLink>,
}

impl NavView {
    pub fn render(entries: &[NavEntry], active: Option<&str>) -> Self {
        let links = entries
            .iter()
            .map(|e| NavLink {
                id: e.id.clone(),
                name: e.name.clone(),
                active: Some(e.id.as_str()) == active,
            })
            .collect();
        Self { links }
    }

    pub fn mark_active(&mut self, id: &str) {
        for link in &mut self.links {
            link.active = link.id == id;
        }
    }

    pub fn clear_active(&mut self) {
        for link in &mut self.links {
            link.active = false;
        }
    }

    pub fn active(&self) -> Vec<&str> {
        self.links
            .iter()
            .filter(|l| l.active)
            .map(|l| l.id.as_str())
            .collect()
    }
}

/// Actions offered by the identity widget and the mobile nav. Each one is a
/// `data-nav` style target routed back through the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NavAction {
    Login { page_id: String },
    Space { page_id: String, label: String },
    Separator,
    Logout,
}

/// Role-space shortcuts: rules whose role is held and whose page exists,
/// in rule order.
pub fn space_shortcuts<'r>(
    session: &Session,
    rules: &'r [LandingRule],
    has_page: impl Fn(&str) -> bool,
) -> Vec<&'r LandingRule> {
    rules
        .iter()
        .filter(|r| session.has_role(&r.role) && has_page(&r.page_id))
        .collect()
}

fn auth_actions(
    session: Option<&Session>,
    rules: &[LandingRule],
    has_page: impl Fn(&str) -> bool,
    login_page: &str,
) -> Vec<NavAction> {
    let Some(session) = session else {
        return vec![NavAction::Login {
            page_id: login_page.to_string(),
        }];
    };

    let mut actions: Vec<NavAction> = space_shortcuts(session, rules, has_page)
        .into_iter()
        .map(|r| NavAction::Space {
            page_id: r.page_id.clone(),
            label: r.label.clone(),
        })
        .collect();
    if !actions.is_empty() {
        actions.push(NavAction::Separator);
    }
    actions.push(NavAction::Logout);
    actions
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityWidget {
    /// `None` for anonymous visitors.
    pub account_label: Option<String>,
    pub actions: Vec<NavAction>,
}

impl IdentityWidget {
    pub fn render(
        session: Option<&Session>,
        rules: &[LandingRule],
        has_page: impl Fn(&str) -> bool,
        login_page: &str,
    ) -> Self {
        let account_label = session.map(|s| {
            s.email
                .clone()
                .unwrap_or_else(|| ACCOUNT_FALLBACK_LABEL.to_string())
        });
        Self {
            account_label,
            actions: auth_actions(session, rules, has_page, login_page),
        }
    }
}

/// Secondary navigation surface for narrow screens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileNav {
    pub links: Vec<NavLink>,
    pub actions: Vec<NavAction>,
}

impl MobileNav {
    pub fn render(
        nav: &NavView,
        session: Option<&Session>,
        rules: &[LandingRule],
        has_page: impl Fn(&str) -> bool,
        login_page: &str,
    ) -> Self {
        Self {
            links: nav.links.clone(),
            actions: auth_actions(session, rules, has_page, login_page),
        }
    }

    pub fn mark_active(&mut self, id: &str) {
        for link in &mut self.links {
            link.active = link.id == id;
        }
    }

    pub fn clear_active(&mut self) {
        for link in &mut self.links {
            link.active = false;
        }
    }
}
