//! Swath product reading and quality filtering.
//!
//! A swath product carries per-pixel satellite measurements on an irregular
//! scan-line geometry: parallel `rows x cols` arrays of latitude, longitude,
//! measurement value and quality flag, plus ancillary per-pixel fields.
//! This crate reads the product container and turns it into the unordered
//! list of quality-good [`SwathSample`]s consumed by the regridder.

pub mod ingest;
pub mod product;

pub use ingest::{filter_samples, ingest_product, IngestOptions, QualityFlag, SwathSample};
pub use product::{SwathLayout, SwathProduct, SwathProductWriter};

use thiserror::Error;

/// Errors raised while reading or filtering a swath product.
///
/// Any of these is fatal to the ingestion run; nothing is published.
#[derive(Debug, Error)]
pub enum SwathError {
    #[error("failed to read swath product {0}: {1}")]
    Io(String, #[source] std::io::Error),

    #[error("invalid swath product: {0}")]
    Format(String),

    #[error("variable not found in product: {0}")]
    MissingVariable(String),

    #[error("no valid samples survived quality filtering")]
    NoValidSamples,
}

pub type Result<T> = std::result::Result<T, SwathError>;
