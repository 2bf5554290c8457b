//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Resolve the log filter from the environment or configuration
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured filter
//! - Human-readable `fmt` output on stdout

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the config set one.
pub const DEFAULT_FILTER: &str = "unit_router=info,tower_http=info";

/// Resolve the effective filter directive.
pub fn filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(configured.unwrap_or(DEFAULT_FILTER))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    })
}

/// Install the global subscriber. Returns false if one was already installed.
pub fn init(configured: Option<&str>) -> bool {
    tracing_subscriber::registry()
        .with(filter(configured))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
