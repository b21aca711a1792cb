//! Variant resolution for personalization experiences.
//!
//! The first resolution of an experience key is cached for the lifetime of
//! the resolver, so repeated lookups within a session always agree.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use showcase_core::config::PersonalizationConfig;
use showcase_core::event_bus::{noop_sink, EventSink, SinkEvent};
use showcase_core::types::UserAttributes;
use showcase_core::ShowcaseResult;

/// Returned when resolution fails. Never cached.
pub const FALLBACK_VARIANT: &str = "default";

pub const VARIANT_RETURNING: &str = "variant_returning";
pub const VARIANT_EU: &str = "variant_eu";
pub const VARIANT_DEFAULT: &str = "variant_default";

/// Chooses a variant for an experience from the current attributes.
pub trait VariantRule: Send + Sync {
    fn resolve(&self, experience_key: &str, attributes: &UserAttributes) -> ShowcaseResult<String>;
}

/// Priority rule, first match wins:
/// returning visitors, then EU visitors, then everyone else.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeRule;

impl VariantRule for AttributeRule {
    fn resolve(
        &self,
        _experience_key: &str,
        attributes: &UserAttributes,
    ) -> ShowcaseResult<String> {
        let variant = if attributes.get_str("userType") == Some("returning") {
            VARIANT_RETURNING
        } else if attributes.get_str("location") == Some("EU") {
            VARIANT_EU
        } else {
            VARIANT_DEFAULT
        };
        Ok(variant.to_string())
    }
}

/// Resolves and caches experience variants. One instance per application.
pub struct PersonalizationResolver {
    project_id: OnceLock<String>,
    attributes: RwLock<UserAttributes>,
    cache: DashMap<String, String>,
    rule: Arc<dyn VariantRule>,
    event_sink: Arc<dyn EventSink>,
}

impl Default for PersonalizationResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PersonalizationResolver {
    pub fn new() -> Self {
        Self {
            project_id: OnceLock::new(),
            attributes: RwLock::new(UserAttributes::new()),
            cache: DashMap::new(),
            rule: Arc::new(AttributeRule),
            event_sink: noop_sink(),
        }
    }

    /// Build a resolver, initializing it when a project id is configured.
    pub fn from_config(config: &PersonalizationConfig) -> Self {
        let resolver = Self::new();
        if let Some(project_id) = &config.project_id {
            resolver.init(project_id);
        }
        resolver
    }

    /// Attach an event sink for `trigger_event` notifications.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Replace the selection rule.
    pub fn with_rule(mut self, rule: Arc<dyn VariantRule>) -> Self {
        self.rule = rule;
        self
    }

    /// Set the project id. Returns `false` if already initialized.
    pub fn init(&self, project_id: &str) -> bool {
        match self.project_id.set(project_id.to_string()) {
            Ok(()) => {
                info!(project_id = %project_id, "personalization initialized");
                true
            }
            Err(_) => {
                debug!("personalization already initialized");
                false
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.project_id.get().is_some()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.get().map(String::as_str)
    }

    /// Shallow merge, last write wins per key.
    pub fn set_user_attributes(&self, attributes: UserAttributes) {
        let mut current = self.attributes.write();
        current.merge(attributes);
        debug!(count = current.len(), "user attributes updated");
    }

    /// Owned copy; mutating it does not affect the resolver.
    pub fn user_attributes(&self) -> UserAttributes {
        self.attributes.read().clone()
    }

    /// Resolve the variant for an experience, caching the first result.
    /// Falls back to [`FALLBACK_VARIANT`] if the rule fails.
    pub fn get_variant(&self, experience_key: &str) -> String {
        if let Some(cached) = self.cache.get(experience_key) {
            metrics::counter!("personalization.cache_hits").increment(1);
            return cached.value().clone();
        }

        let attributes = self.attributes.read().clone();
        match self.rule.resolve(experience_key, &attributes) {
            Ok(variant) => {
                let assigned = self
                    .cache
                    .entry(experience_key.to_string())
                    .or_insert(variant)
                    .value()
                    .clone();
                debug!(experience = %experience_key, variant = %assigned, "variant assigned");
                assigned
            }
            Err(e) => {
                metrics::counter!("personalization.fallbacks").increment(1);
                warn!(
                    experience = %experience_key,
                    error = %e,
                    "variant resolution failed, using fallback"
                );
                FALLBACK_VARIANT.to_string()
            }
        }
    }

    /// Fire-and-forget notification to the analytics sink.
    pub fn trigger_event(&self, name: &str, data: Option<serde_json::Value>) {
        let event = SinkEvent::Custom {
            name: name.to_string(),
            data,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.event_sink.emit(event) {
            warn!(name = %name, error = %e, "failed to trigger personalization event");
        }
    }

    /// Forget every cached assignment.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use showcase_core::event_bus::capture_sink;
    use showcase_core::ShowcaseError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRule {
        calls: AtomicUsize,
    }

    impl VariantRule for CountingRule {
        fn resolve(&self, key: &str, attrs: &UserAttributes) -> ShowcaseResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            AttributeRule.resolve(key, attrs)
        }
    }

    struct FailingRule;

    impl VariantRule for FailingRule {
        fn resolve(&self, _key: &str, _attrs: &UserAttributes) -> ShowcaseResult<String> {
            Err(ShowcaseError::Personalization("upstream unavailable".into()))
        }
    }

    #[test]
    fn test_returning_wins_over_location() {
        let resolver = PersonalizationResolver::new();
        resolver.set_user_attributes(
            UserAttributes::new()
                .with("userType", "returning")
                .with("location", "EU")
                .with("deviceType", "mobile"),
        );
        assert_eq!(resolver.get_variant("hero_banner"), VARIANT_RETURNING);
        assert_eq!(resolver.get_variant("pricing_table"), VARIANT_RETURNING);
    }

    #[test]
    fn test_eu_variant() {
        let resolver = PersonalizationResolver::new();
        resolver.set_user_attributes(UserAttributes::new().with("location", "EU"));
        assert_eq!(resolver.get_variant("hero_banner"), VARIANT_EU);

        let resolver = PersonalizationResolver::new();
        resolver.set_user_attributes(
            UserAttributes::new()
                .with("location", "EU")
                .with("userType", "new"),
        );
        assert_eq!(resolver.get_variant("hero_banner"), VARIANT_EU);
    }

    #[test]
    fn test_default_variant() {
        let resolver = PersonalizationResolver::new();
        assert_eq!(resolver.get_variant("hero_banner"), VARIANT_DEFAULT);

        resolver.clear_cache();
        resolver.set_user_attributes(
            UserAttributes::new()
                .with("location", "NA")
                .with("userType", "new"),
        );
        assert_eq!(resolver.get_variant("hero_banner"), VARIANT_DEFAULT);
    }

    #[test]
    fn test_cache_hit_skips_rule() {
        let rule = Arc::new(CountingRule {
            calls: AtomicUsize::new(0),
        });
        let resolver = PersonalizationResolver::new().with_rule(rule.clone());

        let first = resolver.get_variant("hero_banner");
        let second = resolver.get_variant("hero_banner");
        assert_eq!(first, second);
        assert_eq!(rule.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached_count(), 1);
    }

    #[test]
    fn test_assignment_sticks_after_attribute_change() {
        let resolver = PersonalizationResolver::new();
        assert_eq!(resolver.get_variant("hero_banner"), VARIANT_DEFAULT);

        resolver.set_user_attributes(UserAttributes::new().with("userType", "returning"));
        assert_eq!(resolver.get_variant("hero_banner"), VARIANT_DEFAULT);
        assert_eq!(resolver.get_variant("other"), VARIANT_RETURNING);

        resolver.clear_cache();
        assert_eq!(resolver.cached_count(), 0);
        assert_eq!(resolver.get_variant("hero_banner"), VARIANT_RETURNING);
    }

    #[test]
    fn test_failing_rule_falls_back_uncached() {
        let resolver = PersonalizationResolver::new().with_rule(Arc::new(FailingRule));
        assert_eq!(resolver.get_variant("hero_banner"), FALLBACK_VARIANT);
        assert_eq!(resolver.cached_count(), 0);
    }

    #[test]
    fn test_init_is_idempotent() {
        let resolver = PersonalizationResolver::new();
        assert!(!resolver.is_initialized());
        assert!(resolver.init("proj-1"));
        assert!(!resolver.init("proj-2"));
        assert_eq!(resolver.project_id(), Some("proj-1"));

        let configured = PersonalizationResolver::from_config(&PersonalizationConfig {
            project_id: Some("proj-9".into()),
        });
        assert_eq!(configured.project_id(), Some("proj-9"));
    }

    #[test]
    fn test_user_attributes_are_copied() {
        let resolver = PersonalizationResolver::new();
        resolver.set_user_attributes(UserAttributes::new().with("locale", "de-DE"));

        let mut copy = resolver.user_attributes();
        copy.insert("userType", "returning");
        copy.insert("locale", "fr-FR");

        let current = resolver.user_attributes();
        assert_eq!(current.len(), 1);
        assert_eq!(current.get_str("locale"), Some("de-DE"));
        assert_eq!(resolver.get_variant("hero_banner"), VARIANT_DEFAULT);
    }

    #[test]
    fn test_trigger_event() {
        let sink = capture_sink();
        let resolver = PersonalizationResolver::new().with_event_sink(sink.clone());
        resolver.trigger_event("demo_requested", Some(serde_json::json!({ "plan": "pro" })));
        assert_eq!(sink.custom_names(), vec!["demo_requested".to_string()]);

        // Sink failures are swallowed.
        sink.set_failing(true);
        resolver.trigger_event("ignored", None);
        assert_eq!(sink.count(), 1);
    }
}
