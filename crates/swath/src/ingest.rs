//! Quality filtering of swath pixels into valid samples.

use crate::product::{SwathLayout, SwathProduct};
use crate::{Result, SwathError};
use std::path::Path;
use tracing::{debug, info};

/// Quality flag of one swath pixel, typed at the ingestion boundary.
///
/// The instrument encodes this as a float with NaN for missing; only a raw
/// value of exactly 0 marks a usable pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityFlag {
    /// Flag present and zero: pixel is usable.
    Good,
    /// Flag present but nonzero.
    Degraded(i32),
    /// Flag missing (NaN in the raw array).
    Missing,
}

impl QualityFlag {
    pub fn from_raw(raw: f32) -> Self {
        if raw.is_nan() {
            QualityFlag::Missing
        } else if raw == 0.0 {
            QualityFlag::Good
        } else {
            QualityFlag::Degraded(raw as i32)
        }
    }

    pub fn is_good(&self) -> bool {
        matches!(self, QualityFlag::Good)
    }
}

/// One retained swath measurement.
///
/// Ancillary fields are carried through from the product but never
/// interpolated; only `value` feeds the regridder.
#[derive(Debug, Clone, Copy)]
pub struct SwathSample {
    pub lat: f64,
    pub lon: f64,
    pub value: f32,
    pub terrain_height: Option<f32>,
    pub surface_pressure: Option<f32>,
}

/// Options controlling swath filtering.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Downsampling stride applied independently along both swath axes.
    pub stride: usize,
    /// Values below this floor are instrument fill, not measurements.
    pub fill_floor: f32,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            stride: 1,
            fill_floor: -1e10,
        }
    }
}

/// Parallel per-pixel arrays extracted from a product.
pub struct SwathArrays {
    pub rows: usize,
    pub cols: usize,
    pub latitude: Vec<f32>,
    pub longitude: Vec<f32>,
    pub values: Vec<f32>,
    pub quality: Vec<f32>,
    pub terrain_height: Option<Vec<f32>>,
    pub surface_pressure: Option<Vec<f32>>,
}

/// Filter swath pixels down to valid samples.
///
/// A pixel is retained iff its quality flag is [`QualityFlag::Good`], its
/// value is finite and not below the fill floor, and both coordinates are
/// finite. Returns an error if nothing survives; the caller must not publish.
pub fn filter_samples(arrays: &SwathArrays, opts: &IngestOptions) -> Result<Vec<SwathSample>> {
    let stride = opts.stride.max(1);
    let mut samples = Vec::new();
    let mut rejected_quality = 0usize;
    let mut rejected_value = 0usize;

    for row in (0..arrays.rows).step_by(stride) {
        for col in (0..arrays.cols).step_by(stride) {
            let idx = row * arrays.cols + col;

            let flag = QualityFlag::from_raw(arrays.quality[idx]);
            if !flag.is_good() {
                rejected_quality += 1;
                continue;
            }

            let value = arrays.values[idx];
            if !value.is_finite() || value < opts.fill_floor {
                rejected_value += 1;
                continue;
            }

            let lat = arrays.latitude[idx] as f64;
            let lon = arrays.longitude[idx] as f64;
            if !lat.is_finite() || !lon.is_finite() {
                rejected_value += 1;
                continue;
            }

            samples.push(SwathSample {
                lat,
                lon,
                value,
                terrain_height: arrays.terrain_height.as_ref().map(|v| v[idx]),
                surface_pressure: arrays.surface_pressure.as_ref().map(|v| v[idx]),
            });
        }
    }

    debug!(
        retained = samples.len(),
        rejected_quality, rejected_value, stride, "swath filtering complete"
    );

    if samples.is_empty() {
        return Err(SwathError::NoValidSamples);
    }
    Ok(samples)
}

/// Find the main pollutant variable in a product.
///
/// Prefers variables whose name mentions NO2, otherwise takes the first
/// product variable.
pub fn find_pollutant_variable(product: &SwathProduct) -> Result<String> {
    let names = product.variable_names();
    for name in &names {
        let lower = name.to_lowercase();
        if lower.contains("no2") || lower.contains("nitrogendioxide") {
            return Ok(name.clone());
        }
    }
    names
        .into_iter()
        .find(|n| !matches!(n.as_str(), "latitude" | "longitude" | "time" | "main_data_quality_flag"))
        .ok_or_else(|| SwathError::MissingVariable("no data variable in product".to_string()))
}

/// Open a product, extract the standard variables and filter them.
///
/// Returns the retained samples, the name of the interpolated variable and
/// which header layout the product used.
pub fn ingest_product(
    path: &Path,
    variable: Option<&str>,
    opts: &IngestOptions,
) -> Result<(Vec<SwathSample>, String, SwathLayout)> {
    let product = SwathProduct::open(path)?;
    let layout = product.layout();

    let varname = match variable {
        Some(name) => name.to_string(),
        None => find_pollutant_variable(&product)?,
    };

    info!(
        path = %path.display(),
        variable = %varname,
        layout = ?layout,
        rows = product.rows(),
        cols = product.cols(),
        "opened swath product"
    );

    let arrays = SwathArrays {
        rows: product.rows(),
        cols: product.cols(),
        latitude: product.read_variable("geolocation", "latitude")?,
        longitude: product.read_variable("geolocation", "longitude")?,
        values: product.read_variable("product", &varname)?,
        quality: product.read_variable("product", "main_data_quality_flag")?,
        terrain_height: product.read_variable("support_data", "terrain_height").ok(),
        surface_pressure: product
            .read_variable("support_data", "surface_pressure")
            .ok(),
    };

    let expected = arrays.rows * arrays.cols;
    for (name, len) in [
        ("latitude", arrays.latitude.len()),
        ("longitude", arrays.longitude.len()),
        ("values", arrays.values.len()),
        ("quality", arrays.quality.len()),
    ] {
        if len != expected {
            return Err(SwathError::Format(format!(
                "variable {} has {} elements, expected {}",
                name, len, expected
            )));
        }
    }

    let samples = filter_samples(&arrays, opts)?;
    Ok((samples, varname, layout))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrays_2x2(quality: Vec<f32>, values: Vec<f32>) -> SwathArrays {
        SwathArrays {
            rows: 2,
            cols: 2,
            latitude: vec![30.0, 30.0, 31.0, 31.0],
            longitude: vec![-100.0, -99.0, -100.0, -99.0],
            values,
            quality,
            terrain_height: None,
            surface_pressure: None,
        }
    }

    #[test]
    fn test_quality_flag_typing() {
        assert_eq!(QualityFlag::from_raw(0.0), QualityFlag::Good);
        assert_eq!(QualityFlag::from_raw(2.0), QualityFlag::Degraded(2));
        assert_eq!(QualityFlag::from_raw(f32::NAN), QualityFlag::Missing);
    }

    #[test]
    fn test_filter_keeps_only_good_pixels() {
        let arrays = arrays_2x2(vec![0.0, 1.0, f32::NAN, 0.0], vec![1.0, 2.0, 3.0, 4.0]);
        let samples = filter_samples(&arrays, &IngestOptions::default()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].value, 1.0);
        assert_eq!(samples[1].value, 4.0);
    }

    #[test]
    fn test_fill_floor_and_nonfinite_rejected() {
        let arrays = arrays_2x2(
            vec![0.0, 0.0, 0.0, 0.0],
            vec![1.0, -2e10, f32::NAN, f32::INFINITY],
        );
        let samples = filter_samples(&arrays, &IngestOptions::default()).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 1.0);
    }

    #[test]
    fn test_nonfinite_coordinates_rejected() {
        let mut arrays = arrays_2x2(vec![0.0; 4], vec![1.0, 2.0, 3.0, 4.0]);
        arrays.latitude[1] = f32::NAN;
        arrays.longitude[2] = f32::INFINITY;
        let samples = filter_samples(&arrays, &IngestOptions::default()).unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_stride_subsamples_both_axes() {
        let rows = 4;
        let cols = 4;
        let n = rows * cols;
        let arrays = SwathArrays {
            rows,
            cols,
            latitude: vec![30.0; n],
            longitude: vec![-100.0; n],
            values: (0..n).map(|v| v as f32).collect(),
            quality: vec![0.0; n],
            terrain_height: None,
            surface_pressure: None,
        };
        let opts = IngestOptions {
            stride: 2,
            ..Default::default()
        };
        let samples = filter_samples(&arrays, &opts).unwrap();
        assert_eq!(samples.len(), 4);
    }

    #[test]
    fn test_zero_survivors_is_an_error() {
        let arrays = arrays_2x2(vec![1.0, 1.0, 1.0, 1.0], vec![1.0, 2.0, 3.0, 4.0]);
        assert!(matches!(
            filter_samples(&arrays, &IngestOptions::default()),
            Err(SwathError::NoValidSamples)
        ));
    }
}
