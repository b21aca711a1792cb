//! Showcase — content platform demo: personalization, session analytics,
//! workflow automation and content delivery.
//!
//! Main entry point that assembles every store and drives one page visit.

mod app;

use std::sync::Arc;

use chrono::Timelike;
use clap::Parser;
use showcase_automation::Workflow;
use showcase_core::config::AppConfig;
use showcase_core::event_bus::TracingSink;
use showcase_personalization::ClientEnvironment;
use tracing::info;

use crate::app::{Showcase, Visit};

#[derive(Parser, Debug)]
#[command(name = "showcase")]
#[command(about = "Content platform demo: personalization, analytics, automation and delivery")]
#[command(version)]
struct Cli {
    /// Content type to load entries for
    #[arg(long, default_value = "blog_post")]
    content_type: String,

    /// Personalization experience to resolve
    #[arg(long, default_value = "hero_banner")]
    experience: String,

    /// Directory for durable session and visitor storage (overrides config)
    #[arg(long, env = "SHOWCASE__STORAGE__DIR")]
    storage_dir: Option<String>,

    /// Delivery environment (overrides config)
    #[arg(long, env = "SHOWCASE__DELIVERY__ENVIRONMENT")]
    environment: Option<String>,

    /// User agent reported to attribute detection
    #[arg(long, default_value = "Mozilla/5.0 (X11; Linux x86_64)")]
    user_agent: String,

    /// IANA timezone reported to attribute detection
    #[arg(long)]
    timezone: Option<String>,

    /// Locale reported to attribute detection
    #[arg(long, env = "LANG")]
    locale: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "showcase=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Showcase starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(dir) = cli.storage_dir {
        config.storage.dir = Some(dir);
    }
    if let Some(environment) = cli.environment {
        config.delivery.environment = environment;
    }

    info!(
        environment = %config.delivery.environment,
        credentials = config.delivery.has_credentials(),
        storage = config.storage.dir.as_deref().unwrap_or("memory"),
        "Configuration loaded"
    );

    let app = Showcase::build(&config, Arc::new(TracingSink))?;

    let visit = Visit {
        content_type: cli.content_type,
        experience: cli.experience,
        environment: ClientEnvironment {
            user_agent: cli.user_agent,
            locale: cli.locale,
            timezone: cli.timezone,
            local_hour: chrono::Local::now().hour(),
        },
        workflow: Workflow::content_publish(),
    };

    let report = tokio::select! {
        report = app.run_visit(&visit) => Some(report),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            None
        }
    };

    if let Some(report) = report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let flushed = app.shutdown().await;
    info!(flushed, "Showcase stopped");
    Ok(())
}
