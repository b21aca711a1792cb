use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ─── Session & Events ───────────────────────────────────────────────────

/// Per-tab record aggregating this visit's events and counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub page_views: u64,
    /// Insertion order is chronological order. Unbounded.
    pub events: Vec<TrackedEvent>,
}

impl Session {
    /// Synthesize a fresh session starting at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            start_time: now,
            page_views: 0,
            events: Vec::new(),
        }
    }

    /// Timestamp of the most recent event, if any.
    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(TrackedEvent::timestamp)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> SessionStats {
        SessionStats {
            session_id: self.session_id.clone(),
            duration_ms: (now - self.start_time).num_milliseconds().max(0),
            page_views: self.page_views,
            total_events: self.events.len() as u64,
        }
    }
}

/// A single tracked event. Closed set; consumers match exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackedEvent {
    ContentView {
        content_type: String,
        entry_id: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variant: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Interaction {
        action: String,
        element: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
        timestamp: DateTime<Utc>,
    },
    Personalization {
        experience_id: String,
        variant_id: String,
        converted: bool,
        timestamp: DateTime<Utc>,
    },
}

impl TrackedEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TrackedEvent::ContentView { timestamp, .. }
            | TrackedEvent::Interaction { timestamp, .. }
            | TrackedEvent::Personalization { timestamp, .. } => *timestamp,
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TrackedEvent::ContentView { .. } => "content_view",
            TrackedEvent::Interaction { .. } => "interaction",
            TrackedEvent::Personalization { .. } => "personalization",
        }
    }
}

/// Pure projection of a session at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub duration_ms: i64,
    pub page_views: u64,
    pub total_events: u64,
}

// ─── User Attributes ────────────────────────────────────────────────────

/// Scalar or list attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Flag(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(value: Vec<String>) -> Self {
        AttributeValue::List(value)
    }
}

/// Attribute name to value mapping driving variant selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserAttributes(BTreeMap<String, AttributeValue>);

impl UserAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Shallow merge; keys in `other` overwrite keys of the same name.
    pub fn merge(&mut self, other: UserAttributes) {
        self.0.extend(other.0);
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(AttributeValue::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, AttributeValue)> for UserAttributes {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_tracked_event_tagging() {
        let event = TrackedEvent::Personalization {
            experience_id: "hero_banner".into(),
            variant_id: "variant_eu".into(),
            converted: false,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "personalization");
        assert_eq!(json["experience_id"], "hero_banner");
        assert_eq!(event.kind(), "personalization");
    }

    #[test]
    fn test_session_restores_from_json() {
        let mut session = Session::new(Utc::now());
        session.page_views = 1;
        session.events.push(TrackedEvent::ContentView {
            content_type: "blog_post".into(),
            entry_id: "blt01".into(),
            title: "Launch".into(),
            variant: None,
            timestamp: Utc::now(),
        });
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("variant"));
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn test_stats_projection() {
        let start = Utc::now();
        let session = Session::new(start);
        let stats = session.stats(start + Duration::seconds(5));
        assert_eq!(stats.duration_ms, 5000);
        assert_eq!(stats.page_views, 0);
        assert_eq!(stats.total_events, 0);

        // Clock skew never yields a negative duration.
        assert_eq!(session.stats(start - Duration::seconds(1)).duration_ms, 0);
    }

    #[test]
    fn test_attribute_merge_last_write_wins() {
        let mut attrs = UserAttributes::new()
            .with("userType", "new")
            .with("locale", "en-US");
        attrs.merge(UserAttributes::new().with("userType", "returning").with("vip", true));

        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs.get_str("userType"), Some("returning"));
        assert_eq!(attrs.get_str("locale"), Some("en-US"));
        assert_eq!(attrs.get("vip"), Some(&AttributeValue::Flag(true)));
        assert_eq!(attrs.get_str("vip"), None);
    }

    #[test]
    fn test_attribute_values_untagged() {
        let attrs: UserAttributes = serde_json::from_value(serde_json::json!({
            "deviceType": "mobile",
            "visits": 3.0,
            "beta": false,
            "interests": ["cms", "analytics"],
        }))
        .unwrap();
        assert_eq!(attrs.get_str("deviceType"), Some("mobile"));
        assert_eq!(attrs.get("visits"), Some(&AttributeValue::Number(3.0)));
        assert_eq!(attrs.get("beta"), Some(&AttributeValue::Flag(false)));
        assert_eq!(
            attrs.get("interests"),
            Some(&AttributeValue::List(vec!["cms".into(), "analytics".into()]))
        );
    }
}
