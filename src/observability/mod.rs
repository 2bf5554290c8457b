//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! routing / rpc / sessions produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Metrics are cheap (atomic increments)
//! - Log filter comes from `RUST_LOG` when set, otherwise from config

pub mod logging;
pub mod metrics;
