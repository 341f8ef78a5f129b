//! # secnews
//!
//! Collects security advisories and news from a configured set of RSS and
//! scraper sources, keeps them in a deduplicating store and serves them to a
//! dashboard.
//!
//! ## Architecture
//!
//! ```text
//! Registry → Fetcher → Parser → Store
//!                 ↑                 ↓
//!   Scheduler → Aggregator         API
//! ```
//!
//! Every refresh cycle visits all sources concurrently with a bounded number
//! of workers. A failing source is recorded in the cycle report and never
//! affects the others. Items are keyed by their link, so re-fetching the same
//! entry updates it in place.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run one refresh and print the report
//! secnews refresh
//!
//! # Show what was collected
//! secnews list --limit 20
//!
//! # Refresh on a schedule and serve the HTTP API
//! secnews serve --bind 127.0.0.1:8000
//! ```

/// Refresh cycles: fetch, parse and store every source.
pub mod aggregator;

/// HTTP routes over the store, the registry and the scheduler.
///
/// - `GET /api/news`, `GET /api/sources`, `GET /api/status`
/// - `POST /api/refresh`
/// - `GET /health`
pub mod api;

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// registry, fetcher, store and aggregator.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// TOML configuration with defaults.
pub mod config;

/// Core domain models.
///
/// - [`Source`](domain::Source): a configured feed
/// - [`Item`](domain::Item): a stored entry keyed by its link
/// - [`CycleReport`](domain::CycleReport): per-source outcome of one refresh
pub mod domain;

/// Transport: retrieving raw source bodies over HTTP.
pub mod fetcher;

/// RSS/Atom parsing and the scraper extension point.
pub mod parser;

/// The validated, atomically reloadable set of sources.
pub mod registry;

/// Periodic and on-demand refresh scheduling.
pub mod scheduler;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
