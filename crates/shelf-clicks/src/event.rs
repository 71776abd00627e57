//! Click events and per-key statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelf_core::ProductKey;

/// Stored affiliate URLs are cut to this many characters.
pub const MAX_AFFILIATE_URL_CHARS: usize = 256;

/// Stored user agents are cut to this many characters.
pub const MAX_USER_AGENT_CHARS: usize = 200;

/// User agents in recent-click listings are cut further.
pub const DISPLAY_USER_AGENT_CHARS: usize = 100;

/// One outbound affiliate click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub product_key: ProductKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_item_id: Option<String>,
    pub affiliate_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ClickEvent {
    pub fn new(
        product_key: ProductKey,
        affiliate_url: impl AsRef<str>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            product_key,
            offer_item_id: None,
            affiliate_url: truncate_chars(affiliate_url.as_ref(), MAX_AFFILIATE_URL_CHARS),
            client_ip: None,
            user_agent: None,
            timestamp,
        }
    }

    pub fn with_offer_item(mut self, item_id: impl Into<String>) -> Self {
        self.offer_item_id = Some(item_id.into()).filter(|id: &String| !id.is_empty());
        self
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into()).filter(|ip: &String| !ip.is_empty());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl AsRef<str>) -> Self {
        let ua = truncate_chars(user_agent.as_ref(), MAX_USER_AGENT_CHARS);
        self.user_agent = Some(ua).filter(|ua| !ua.is_empty());
        self
    }

    /// Copy for listings, with the shorter user agent.
    pub fn for_display(&self) -> Self {
        let mut shown = self.clone();
        shown.user_agent = self
            .user_agent
            .as_deref()
            .map(|ua| truncate_chars(ua, DISPLAY_USER_AGENT_CHARS));
        shown
    }
}

/// Counter and recent clicks for one product, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickStats {
    pub count: u64,
    pub recent_clicks: Vec<ClickEvent>,
    /// Read from the fallback store rather than the actor.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl ClickStats {
    pub(crate) fn new(count: u64, clicks: &[ClickEvent], fallback: bool) -> Self {
        Self {
            count,
            recent_clicks: clicks.iter().map(ClickEvent::for_display).collect(),
            fallback,
        }
    }
}

/// Outcome of recording a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickReceipt {
    pub new_count: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ProductKey {
        ProductKey::parse("8901030895555").unwrap()
    }

    #[test]
    fn test_truncation_limits() {
        let event = ClickEvent::new(key(), "u".repeat(300), Utc::now())
            .with_user_agent("é".repeat(250))
            .with_offer_item("v1|123|0");

        assert_eq!(event.affiliate_url.chars().count(), MAX_AFFILIATE_URL_CHARS);
        assert_eq!(
            event.user_agent.as_deref().map(|ua| ua.chars().count()),
            Some(MAX_USER_AGENT_CHARS)
        );
        let shown = event.for_display();
        assert_eq!(
            shown.user_agent.as_deref().map(|ua| ua.chars().count()),
            Some(DISPLAY_USER_AGENT_CHARS)
        );
        assert_eq!(shown.affiliate_url, event.affiliate_url);
    }

    #[test]
    fn test_blank_optionals_are_dropped() {
        let event = ClickEvent::new(key(), "https://x", Utc::now())
            .with_client_ip("")
            .with_user_agent("");
        assert_eq!(event.client_ip, None);
        assert_eq!(event.user_agent, None);
    }

    #[test]
    fn test_wire_shapes() {
        let receipt = ClickReceipt {
            new_count: 3,
            fallback: false,
        };
        assert_eq!(serde_json::to_string(&receipt).unwrap(), r#"{"newCount":3}"#);

        let stats = ClickStats {
            count: 1,
            recent_clicks: vec![],
            fallback: true,
        };
        assert_eq!(
            serde_json::to_value(&stats).unwrap(),
            serde_json::json!({"count": 1, "recentClicks": [], "fallback": true})
        );
    }
}
