//! Inbound query parameters, merged across the widget's own location, the
//! enclosing frame and the referring page.

use std::collections::BTreeMap;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundLocation {
    pub current: Option<String>,
    pub frame: Option<String>,
    pub referrer: Option<String>,
}

fn query_of(url: Option<&str>) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    let Some(url) = url.and_then(|u| Url::parse(u).ok()) else {
        return params;
    };
    for (key, value) in url.query_pairs() {
        params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    params
}

impl InboundLocation {
    pub fn from_current(url: &str) -> Self {
        Self {
            current: Some(url.to_string()),
            ..Self::default()
        }
    }

    /// Referrer, then frame, then current: later sources win on collision.
    pub fn merged_params(&self) -> BTreeMap<String, String> {
        let mut merged = query_of(self.referrer.as_deref());
        merged.extend(query_of(self.frame.as_deref()));
        merged.extend(query_of(self.current.as_deref()));
        merged
    }

    /// Value of the first parameter in `names` that is present and non-empty.
    pub fn requested_page(&self, names: &[String]) -> Option<String> {
        let params = self.merged_params();
        names
            .iter()
            .filter_map(|name| params.get(name))
            .find(|value| !value.trim().is_empty())
            .map(|value| value.trim().to_string())
    }

    /// URL of the top-level window: the frame when embedded, else current.
    pub fn top_url(&self) -> Option<&str> {
        self.frame.as_deref().or(self.current.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["id".to_string(), "page".to_string(), "component".to_string()]
    }

    #[test]
    fn current_overrides_frame_and_referrer() {
        let location = InboundLocation {
            current: Some("https://w.example/?page=current".to_string()),
            frame: Some("https://doc.example/?page=frame&extra=1".to_string()),
            referrer: Some("https://ref.example/?page=ref&other=2".to_string()),
        };
        let params = location.merged_params();
        assert_eq!(params["page"], "current");
        assert_eq!(params["extra"], "1");
        assert_eq!(params["other"], "2");
    }

    #[test]
    fn first_parameter_name_wins() {
        let location = InboundLocation::from_current("https://w.example/?component=c&id=i");
        assert_eq!(location.requested_page(&names()), Some("i".to_string()));

        let location = InboundLocation::from_current("https://w.example/?component=c&id=");
        assert_eq!(location.requested_page(&names()), Some("c".to_string()));
    }

    #[test]
    fn bad_urls_are_ignored() {
        let location = InboundLocation {
            current: Some("::::".to_string()),
            frame: None,
            referrer: Some("https://ref.example/?page=home".to_string()),
        };
        assert_eq!(location.requested_page(&names()), Some("home".to_string()));
        assert_eq!(InboundLocation::default().requested_page(&names()), None);
    }
}
