//! Built-in colour and edge histogram embedding
//!
//! Layout of the 160-dim vector:
//! - `[0, 96)`    RGB colour histogram, 32 bins per channel
//! - `[96, 128)`  gradient orientation, 8 orientations per cell of a 2x2 grid,
//!   weighted by gradient magnitude
//! - `[128, 160)` gradient magnitude histogram
//!
//! Each block is L1-normalized and the concatenation is L2-normalized.

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, RgbImage};

use crate::error::ExtractionError;
use crate::index::l2_normalize;

use super::traits::EmbeddingProvider;

pub const HISTOGRAM_DIMENSIONS: usize = COLOR_BINS + ORIENTATION_BINS + MAGNITUDE_BINS;

const COLOR_BINS_PER_CHANNEL: usize = 32;
const COLOR_BINS: usize = 3 * COLOR_BINS_PER_CHANNEL;
const ORIENTATIONS: usize = 8;
const GRID: usize = 2;
const ORIENTATION_BINS: usize = ORIENTATIONS * GRID * GRID;
const MAGNITUDE_BINS: usize = 32;

/// Largest central-difference gradient magnitude for 8-bit luma: 255 * sqrt(2)
const MAX_MAGNITUDE: f32 = 360.625;

/// Longest side images are reduced to before computing features
const MAX_SIDE: u32 = 256;

/// Deterministic feature extractor that needs no model
#[derive(Debug, Default, Clone, Copy)]
pub struct HistogramEmbedding;

impl HistogramEmbedding {
    pub fn new() -> Self {
        Self
    }

    /// Compute the feature vector of a decoded image
    pub fn features(image: &DynamicImage) -> Vec<f32> {
        let image = if image.width().max(image.height()) > MAX_SIDE {
            image.thumbnail(MAX_SIDE, MAX_SIDE)
        } else {
            image.clone()
        };

        let mut features = Vec::with_capacity(HISTOGRAM_DIMENSIONS);
        features.extend(l1_normalized(color_histogram(&image.to_rgb8())));

        let (orientation, magnitude) = gradient_histograms(&image.to_luma8());
        features.extend(l1_normalized(orientation));
        features.extend(l1_normalized(magnitude));

        // the colour block always has mass, so this cannot fail for a decoded image
        l2_normalize(&mut features);
        features
    }
}

fn l1_normalized(mut block: Vec<f32>) -> Vec<f32> {
    let sum: f32 = block.iter().sum();
    if sum > 0.0 {
        block.iter_mut().for_each(|x| *x /= sum);
    }
    block
}

fn color_histogram(rgb: &RgbImage) -> Vec<f32> {
    let mut hist = vec![0.0f32; COLOR_BINS];
    let shift = 8 - COLOR_BINS_PER_CHANNEL.trailing_zeros();
    for pixel in rgb.pixels() {
        for (channel, value) in pixel.0.iter().enumerate() {
            let bin = (*value >> shift) as usize;
            hist[channel * COLOR_BINS_PER_CHANNEL + bin] += 1.0;
        }
    }
    hist
}

/// Orientation (per grid cell, magnitude weighted) and magnitude histograms
/// from central differences over interior pixels.
fn gradient_histograms(gray: &GrayImage) -> (Vec<f32>, Vec<f32>) {
    let mut orientation = vec![0.0f32; ORIENTATION_BINS];
    let mut magnitude = vec![0.0f32; MAGNITUDE_BINS];
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return (orientation, magnitude);
    }

    let at = |x: u32, y: u32| gray.get_pixel(x, y).0[0] as f32;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = at(x + 1, y) - at(x - 1, y);
            let gy = at(x, y + 1) - at(x, y - 1);
            let mag = (gx * gx + gy * gy).sqrt();

            let mag_bin = ((mag / MAX_MAGNITUDE) * MAGNITUDE_BINS as f32) as usize;
            magnitude[mag_bin.min(MAGNITUDE_BINS - 1)] += 1.0;

            if mag > 0.0 {
                let angle = gy.atan2(gx) + PI; // [0, 2pi]
                let o = ((angle / (2.0 * PI)) * ORIENTATIONS as f32) as usize;
                let o = o.min(ORIENTATIONS - 1);
                let cx = ((x as usize * GRID) / w as usize).min(GRID - 1);
                let cy = ((y as usize * GRID) / h as usize).min(GRID - 1);
                orientation[(cy * GRID + cx) * ORIENTATIONS + o] += mag;
            }
        }
    }
    (orientation, magnitude)
}

fn load(path: &Path) -> Result<DynamicImage, ExtractionError> {
    image::open(path).map_err(|e| match e {
        image::ImageError::IoError(source) => ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        },
        source => ExtractionError::Decode {
            path: path.to_path_buf(),
            source,
        },
    })
}

#[async_trait]
impl EmbeddingProvider for HistogramEmbedding {
    fn name(&self) -> String {
        "histogram".to_string()
    }

    fn dimensions(&self) -> usize {
        HISTOGRAM_DIMENSIONS
    }

    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>, ExtractionError> {
        let owned: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || load(&owned).map(|img| Self::features(&img)))
            .await
            .map_err(|e| ExtractionError::Tool {
                tool: "histogram".to_string(),
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
    }
}
