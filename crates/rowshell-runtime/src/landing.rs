//! Landing Resolver: role set → the one page a signed-in identity lands on.

use crate::config::LandingRule;
use rowshell_model::Session;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LandingError {
    #[error("no landing page `{page_id}` registered for role `{role}`")]
    MissingPage { role: String, page_id: String },
    #[error("no recognized role to pick a landing page")]
    UnrecognizedRole,
}

/// Scan `rules` in priority order and return the first one whose role the
/// session holds.
///
/// - no session: `Ok(None)`, the caller falls back to the public default
/// - first held role whose page is not registered: `MissingPage`
/// - no held role in the list: `UnrecognizedRole`
pub fn pick_landing_component<'r>(
    session: Option<&Session>,
    rules: &'r [LandingRule],
    has_page: impl Fn(&str) -> bool,
) -> Result<Option<&'r LandingRule>, LandingError> {
    let Some(session) = session else {
        return Ok(None);
    };

    let rule = rules
        .iter()
        .find(|rule| session.has_role(&rule.role))
        .ok_or(LandingError::UnrecognizedRole)?;

    if !has_page(&rule.page_id) {
        return Err(LandingError::MissingPage {
            role: rule.role.clone(),
            page_id: rule.page_id.clone(),
        });
    }
    Ok(Some(rule))
}
