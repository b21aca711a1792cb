pub mod config;
pub mod error;
pub mod event_bus;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use error::{ShowcaseError, ShowcaseResult};
