//! Turns SpecViT experiment results into the JSON documents the web demos load.
//!
//! ```text
//!  dataset store ──► sampler ──► spectra ──► spectra_examples.json
//!  prediction CSVs ──► metrics ──────────► predictions.json
//!                        └───────────────► stellar_type_metrics.json
//! ```
//!
//! [`pipeline::run`] drives the three stages; [`config::ExtractConfig`]
//! holds every path and constant.

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod sampler;
pub mod spectra;
