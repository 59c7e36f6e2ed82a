//! # dlog - Interactive Container Log Viewer
//!
//! A terminal viewer for container runtime logs: it lists the daemon's
//! containers, streams one container's stdout/stderr into an in-memory byte
//! file, and presents a scrollable, searchable, filterable view with live
//! follow and historical back-fill.
//!
//! ## Architecture
//!
//! Data flows `ByteFile` ⇐ `LogEngine` ⇒ `Fetcher` ⇒ `Viewer`; control flows
//! the other way (searches and filters hit the fetcher, container switches
//! restart the engine).
//!
//! - [`buffer`] - in-memory byte file with offset-stable prepending
//! - [`source`] - abstract container-log transport and the Docker impl
//! - [`engine`] - follow-from-tail plus back-fill pagination
//! - [`fetcher`] - filtered, ANSI-decoded line view over the byte file
//! - [`filter`] - composable intersect/union/exclude/highlight filters
//! - [`ui`] - event loop, scroll buffer, infobar, rendering
//! - [`error`] - centralized error types

pub mod ansi;
pub mod app;
pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod source;
pub mod ui;

#[cfg(test)]
mod testutil;

pub use app::Application;
pub use buffer::ByteFile;
pub use config::Config;
pub use engine::LogEngine;
pub use error::{DlogError, Result};
pub use fetcher::Fetcher;
pub use source::{DockerSource, LogSource};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
