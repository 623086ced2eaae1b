//! Pipeline module.
//!
//! The preparation sequence and its stages: enrichment, threshold
//! computation and alert flagging.

mod alerts;
mod builder;
mod enrich;
mod thresholds;

pub use alerts::AlertFlagger;
pub use builder::{Pipeline, PipelineBuilder};
pub use enrich::Enricher;
pub use thresholds::ThresholdCalculator;
