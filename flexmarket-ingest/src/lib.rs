pub mod charts;
pub mod config;
pub mod metrics_export;
pub mod observability;
pub mod pipeline;
pub mod report;
pub mod sinks;
pub mod sources;
pub mod transform;

pub use pipeline::{Envelope, Pipeline, RunSummary};
