//! Attribute auto-detection from the client environment.
//!
//! Detection also flips the per-browser "visited before" marker, so the
//! first detection ever reports `userType = "new"` and every later one
//! reports `"returning"`, whether or not the caller uses the result.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use showcase_core::config::VisitorConfig;
use showcase_core::storage::KeyValueStore;
use showcase_core::types::UserAttributes;

/// Platform signals available at detection time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientEnvironment {
    pub user_agent: String,
    pub locale: Option<String>,
    /// IANA zone name, e.g. `Europe/Berlin`.
    pub timezone: Option<String>,
    /// Local hour of day, 0-23.
    pub local_hour: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        let android_tablet = ua.contains("android") && !ua.contains("mobile");
        if ua.contains("ipad") || ua.contains("tablet") || android_tablet {
            DeviceClass::Tablet
        } else if ua.contains("mobi") || ua.contains("iphone") || ua.contains("android") {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
        }
    }
}

/// Bucket an hour of day into a coarse visit time.
pub fn visit_time(hour: u32) -> &'static str {
    match hour {
        5..=11 => "morning",
        12..=16 => "afternoon",
        17..=20 => "evening",
        _ => "night",
    }
}

/// Coarse region derived from an IANA timezone.
pub fn region_for_timezone(timezone: &str) -> Option<&'static str> {
    match timezone.split('/').next()? {
        "Europe" => Some("EU"),
        "America" => Some("NA"),
        "Asia" | "Australia" => Some("APAC"),
        _ => None,
    }
}

/// Derives [`UserAttributes`] from a [`ClientEnvironment`] and the
/// per-browser visitor marker.
pub struct AttributeDetector {
    store: Arc<dyn KeyValueStore>,
    marker_key: String,
}

impl AttributeDetector {
    pub fn new(store: Arc<dyn KeyValueStore>, marker_key: impl Into<String>) -> Self {
        Self {
            store,
            marker_key: marker_key.into(),
        }
    }

    pub fn from_config(config: &VisitorConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, config.returning_marker_key.clone())
    }

    pub fn detect(&self, env: &ClientEnvironment) -> UserAttributes {
        let returning = self.check_and_mark();

        let mut attributes = UserAttributes::new()
            .with("deviceType", DeviceClass::from_user_agent(&env.user_agent).as_str())
            .with("visitTime", visit_time(env.local_hour))
            .with("userType", if returning { "returning" } else { "new" });

        if let Some(locale) = env.locale.as_deref().filter(|l| !l.is_empty()) {
            attributes.insert("locale", locale);
        }
        if let Some(timezone) = env.timezone.as_deref().filter(|t| !t.is_empty()) {
            attributes.insert("timezone", timezone);
            if let Some(region) = region_for_timezone(timezone) {
                attributes.insert("location", region);
            }
        }

        debug!(count = attributes.len(), returning, "user attributes detected");
        attributes
    }

    /// Read the marker, then set it unconditionally.
    fn check_and_mark(&self) -> bool {
        let returning = match self.store.get(&self.marker_key) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!(key = %self.marker_key, error = %e, "failed to read visitor marker");
                false
            }
        };
        if let Err(e) = self.store.set(&self.marker_key, "true") {
            warn!(key = %self.marker_key, error = %e, "failed to write visitor marker");
        }
        returning
    }
}
