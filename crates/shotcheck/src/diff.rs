//! Pixel-level comparison of a candidate against a baseline.
//!
//! A pixel counts as different when the sum of its absolute R, G and B deltas
//! exceeds the engine's noise threshold (alpha is ignored). The difference
//! percentage is `differing / total * 100`; the overlay is a copy of the
//! candidate with every differing pixel painted in the highlight colour.
//!
//! Images of different size are never aligned or scaled. They always yield a
//! non-matching result at 100% with an overlay covering the larger extent of
//! both, where everything outside the overlap is flagged.
//!
//! Large images are scanned in parallel by row; the per-row counts are summed
//! afterwards, so results are identical to a sequential scan.

use crate::comparison::{ComparisonResult, Tolerance};
use crate::raster::{RasterBuffer, CHANNELS};
use crate::region::Rect;
use crate::result::ShotResult;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// Per-pixel channel delta sum at or below which pixels count as equal.
/// Absorbs anti-aliasing and rendering jitter.
pub const DEFAULT_NOISE_THRESHOLD: u32 = 10;

/// Colour painted over differing pixels in the overlay
pub const DEFAULT_HIGHLIGHT: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Images with more pixels than this are scanned with rayon
pub const PARALLEL_PIXEL_THRESHOLD: u64 = 256 * 256;

/// Pixel comparison engine
///
/// Settings are fixed at construction; only the tolerance varies per call.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    noise_threshold: u32,
    highlight: Rgba<u8>,
    always_render_overlay: bool,
    parallel: bool,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self {
            noise_threshold: DEFAULT_NOISE_THRESHOLD,
            highlight: DEFAULT_HIGHLIGHT,
            always_render_overlay: false,
            parallel: true,
        }
    }
}

impl DiffEngine {
    /// Create an engine with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-pixel noise threshold (sum of R/G/B deltas, 0-765)
    #[must_use]
    pub const fn with_noise_threshold(mut self, threshold: u32) -> Self {
        self.noise_threshold = threshold;
        self
    }

    /// Set the highlight colour used in overlays
    #[must_use]
    pub const fn with_highlight(mut self, color: Rgba<u8>) -> Self {
        self.highlight = color;
        self
    }

    /// Produce an overlay even when nothing differs
    #[must_use]
    pub const fn with_always_render_overlay(mut self, enabled: bool) -> Self {
        self.always_render_overlay = enabled;
        self
    }

    /// Allow row-parallel scanning of large images
    #[must_use]
    pub const fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Noise threshold in use
    #[must_use]
    pub const fn noise_threshold(&self) -> u32 {
        self.noise_threshold
    }

    /// Highlight colour in use
    #[must_use]
    pub const fn highlight(&self) -> Rgba<u8> {
        self.highlight
    }

    /// Compare a candidate against a baseline.
    ///
    /// Pure and deterministic: identical inputs always give identical output.
    #[must_use]
    pub fn compare(
        &self,
        baseline: &RasterBuffer,
        candidate: &RasterBuffer,
        tolerance: Tolerance,
    ) -> ComparisonResult {
        let dimensions_match = baseline.dimensions() == candidate.dimensions();
        let width = baseline.width().max(candidate.width());
        let height = baseline.height().max(candidate.height());
        let total_pixels = u64::from(width) * u64::from(height);

        let mut overlay = RgbaImage::new(width, height);
        let stride = width as usize * CHANNELS;
        let scan = |(y, row): (usize, &mut [u8])| self.scan_row(baseline, candidate, y as u32, row);

        let stats = if self.parallel && total_pixels > PARALLEL_PIXEL_THRESHOLD {
            overlay
                .par_chunks_mut(stride)
                .enumerate()
                .map(scan)
                .reduce(DiffStats::default, DiffStats::merge)
        } else {
            overlay
                .chunks_mut(stride)
                .enumerate()
                .map(scan)
                .fold(DiffStats::default(), DiffStats::merge)
        };

        let difference_percentage = if dimensions_match {
            stats.count as f64 / total_pixels as f64 * 100.0
        } else {
            100.0
        };
        let matches = dimensions_match && tolerance.allows(difference_percentage);
        let diff_image = (stats.count > 0 || self.always_render_overlay)
            .then(|| RasterBuffer::from_valid(overlay));

        ComparisonResult {
            matches,
            difference_percentage,
            diff_pixel_count: stats.count,
            total_pixels,
            changed_region: stats.bounds,
            max_channel_delta: stats.max_delta,
            dimensions_match,
            tolerance,
            diff_image,
        }
    }

    /// Decode two encoded images and compare them
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::Decode`](crate::ShotError::Decode) if either image
    /// cannot be decoded.
    pub fn compare_encoded(
        &self,
        baseline: &[u8],
        candidate: &[u8],
        tolerance: Tolerance,
    ) -> ShotResult<ComparisonResult> {
        let baseline = RasterBuffer::from_encoded(baseline)?;
        let candidate = RasterBuffer::from_encoded(candidate)?;
        Ok(self.compare(&baseline, &candidate, tolerance))
    }

    /// Compare many independent `(baseline, candidate)` pairs in parallel.
    ///
    /// Output order matches input order.
    #[must_use]
    pub fn compare_many(
        &self,
        pairs: &[(RasterBuffer, RasterBuffer)],
        tolerance: Tolerance,
    ) -> Vec<ComparisonResult> {
        pairs
            .par_iter()
            .map(|(baseline, candidate)| self.compare(baseline, candidate, tolerance))
            .collect()
    }

    /// Fill one overlay row and report its differences
    fn scan_row(
        &self,
        baseline: &RasterBuffer,
        candidate: &RasterBuffer,
        y: u32,
        out: &mut [u8],
    ) -> DiffStats {
        let base_row = (y < baseline.height()).then(|| baseline.row(y));
        let cand_row = (y < candidate.height()).then(|| candidate.row(y));
        let mut stats = DiffStats::default();

        for (x, px) in out.chunks_exact_mut(CHANNELS).enumerate() {
            let base = base_row.and_then(|r| r.get(x * CHANNELS..(x + 1) * CHANNELS));
            let cand = cand_row.and_then(|r| r.get(x * CHANNELS..(x + 1) * CHANNELS));

            let differs = match (base, cand) {
                (Some(b), Some(c)) => {
                    let delta = channel_delta(b, c);
                    stats.max_delta = stats.max_delta.max(delta);
                    if delta > self.noise_threshold {
                        true
                    } else {
                        px.copy_from_slice(c);
                        false
                    }
                }
                // Outside the overlap of mismatched sizes
                _ => true,
            };

            if differs {
                px.copy_from_slice(&self.highlight.0);
                stats.record(x as u32, y);
            }
        }
        stats
    }
}

/// Sum of absolute R, G and B deltas between two RGBA8 pixels
fn channel_delta(a: &[u8], b: &[u8]) -> u32 {
    a.iter()
        .zip(b)
        .take(3)
        .map(|(&p, &q)| u32::from(p.abs_diff(q)))
        .sum()
}

/// Partial result of scanning some rows
#[derive(Debug, Clone, Copy, Default)]
struct DiffStats {
    count: u64,
    bounds: Option<Rect>,
    max_delta: u32,
}

impl DiffStats {
    fn record(&mut self, x: u32, y: u32) {
        let pixel = Rect::new(x, y, 1, 1);
        self.count += 1;
        self.bounds = Some(self.bounds.map_or(pixel, |b| b.union(&pixel)));
    }

    fn merge(self, other: Self) -> Self {
        let bounds = match (self.bounds, other.bounds) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, b) => a.or(b),
        };
        Self {
            count: self.count + other.count,
            bounds,
            max_delta: self.max_delta.max(other.max_delta),
        }
    }
}
