//! Batch ingestion pipeline: swath product to published tiled asset.

pub mod pipeline;

pub use pipeline::{run_pipeline, PipelineOptions, PipelineSummary};
