//! rki-states - COVID-19 statistics for the German federal states.
//!
//! # Overview
//!
//! Queries the Robert Koch-Institut's public ArcGIS feature services and
//! normalizes the answers into per-state records. Every result is wrapped in
//! a [`model::ResponseEnvelope`] carrying the provider's as-of timestamp.
//!
//! When the primary source's `Datenstand` is stale, the history and
//! event-count operations re-issue their query once against an alternate
//! source (see [`data_sources::fallback`]).
//!
//! # Modules
//!
//! - [`retriever`]: The retrieval operations
//! - [`data_sources`]: Query building, response decoding and transports
//! - [`model`]: Output records and the response envelope
//! - [`regions`]: The sixteen federal states
//! - [`dates`]: Provider date parsing
//! - [`error`]: The error taxonomy
//! - [`config`]: Environment configuration
//! - [`api`]: HTTP API handlers

pub mod api;
pub mod config;
pub mod data_sources;
pub mod dates;
pub mod error;
pub mod model;
pub mod regions;
pub mod retriever;

pub use error::FetchError;
pub use retriever::StatesRetriever;
