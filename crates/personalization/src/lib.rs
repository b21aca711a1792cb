//! Personalization — deterministic variant resolution over user attributes,
//! plus auto-detection of those attributes from the client environment.

pub mod detection;
pub mod resolver;

pub use detection::{AttributeDetector, ClientEnvironment};
pub use resolver::{AttributeRule, PersonalizationResolver, VariantRule, FALLBACK_VARIANT};
