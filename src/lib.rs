//! # ADS Harvest
//!
//! A client for bulk, paginated retrieval from the NASA Astrophysics Data
//! System (ADS) search API.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Queries, page requests, documents and run outcomes
//! - [`client`]: Request execution, pagination, identifier batches and the [`AdsClient`] facade
//! - [`analysis`]: Text cleaning, word frequencies and keyword selection
//! - [`utils`]: Retry, aggregation, checkpoints, catalogue input and progress events
//! - [`config`]: Configuration management
//! - [`ui`]: Terminal tables and progress bars for the CLI

pub mod analysis;
pub mod client;
pub mod config;
pub mod models;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use client::{AdsClient, AdsError, ApiToken};
pub use models::{Document, Harvest, Query};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
