//! # CodeRelay
//!
//! Code execution relay with provider fallback and sandboxed HTML previews.
//!
//! ## Features
//!
//! - **Provider Dispatch:** Hosted judge first, local substitutes for known exercises,
//!   fallback compiler when a program outgrows the judge's limits
//! - **Security Pre-Filter:** Deny-list of dangerous patterns checked before any provider call
//! - **HTML Preview:** Self-contained documents with a console bridge and a debounced renderer
//! - **Web Engine:** Screenshots and DOM of rendered pages from a remote headless browser

pub mod config;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod preview;
pub mod providers;
pub mod security;
pub mod server;
pub mod web_engine;

pub use config::Config;
pub use error::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
