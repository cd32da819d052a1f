//! Comparison verdicts and the tolerance policy that decides them.

use crate::raster::RasterBuffer;
use crate::region::Rect;
use crate::result::{ShotError, ShotResult};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Maximum percentage of differing pixels still considered a match
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct Tolerance(f64);

impl Tolerance {
    /// Exact match required
    pub const EXACT: Self = Self(0.0);

    /// Tolerance as a percentage in `0.0..=100.0`
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::InvalidTolerance`] for negative, non-finite or
    /// greater-than-100 values.
    pub fn percent(value: f64) -> ShotResult<Self> {
        if value.is_finite() && (0.0..=100.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ShotError::InvalidTolerance { value })
        }
    }

    /// Percentage value
    #[must_use]
    pub const fn as_percent(self) -> f64 {
        self.0
    }

    /// Whether a difference percentage passes
    #[must_use]
    pub fn allows(self, difference_percentage: f64) -> bool {
        difference_percentage <= self.0
    }
}

impl<'de> Deserialize<'de> for Tolerance {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Self::percent(value).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<f64> for Tolerance {
    type Error = ShotError;

    fn try_from(value: f64) -> ShotResult<Self> {
        Self::percent(value)
    }
}

/// Result of comparing a candidate against a baseline
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    /// Whether the difference is within tolerance
    pub matches: bool,
    /// Percentage of pixels that differ (0.0-100.0)
    pub difference_percentage: f64,
    /// Number of pixels that differ
    pub diff_pixel_count: u64,
    /// Total number of pixels compared
    pub total_pixels: u64,
    /// Bounding box of every differing pixel
    pub changed_region: Option<Rect>,
    /// Largest per-pixel channel delta sum seen
    pub max_channel_delta: u32,
    /// Whether baseline and candidate had the same dimensions
    pub dimensions_match: bool,
    /// Tolerance the verdict was made with
    pub tolerance: Tolerance,
    /// Candidate copy with differing pixels highlighted
    pub diff_image: Option<RasterBuffer>,
}

impl ComparisonResult {
    /// Check if images are identical (no differences)
    #[must_use]
    pub const fn is_identical(&self) -> bool {
        self.diff_pixel_count == 0 && self.dimensions_match
    }

    /// Re-evaluate the verdict at another tolerance
    #[must_use]
    pub fn within(&self, tolerance: Tolerance) -> bool {
        self.dimensions_match && tolerance.allows(self.difference_percentage)
    }

    /// Diff overlay encoded as PNG
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::Encode`] if encoding fails.
    pub fn diff_png(&self) -> ShotResult<Option<Vec<u8>>> {
        self.diff_image.as_ref().map(RasterBuffer::to_png).transpose()
    }

    /// Diff overlay as a `data:` URI for self-contained reports
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::Encode`] if encoding fails.
    pub fn diff_data_uri(&self) -> ShotResult<Option<String>> {
        Ok(self.diff_png()?.map(|png| {
            format!(
                "data:image/png;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(png)
            )
        }))
    }

    /// Serializable summary without pixel data
    #[must_use]
    pub fn summary(&self) -> ComparisonSummary {
        ComparisonSummary {
            matches: self.matches,
            difference_percentage: self.difference_percentage,
            diff_pixel_count: self.diff_pixel_count,
            total_pixels: self.total_pixels,
            changed_region: self.changed_region,
            max_channel_delta: self.max_channel_delta,
            dimensions_match: self.dimensions_match,
            tolerance: self.tolerance.as_percent(),
            diff_dimensions: self.diff_image.as_ref().map(RasterBuffer::dimensions),
        }
    }
}

/// Pixel-free view of a [`ComparisonResult`] for reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    /// Whether the difference is within tolerance
    pub matches: bool,
    /// Percentage of pixels that differ
    pub difference_percentage: f64,
    /// Number of pixels that differ
    pub diff_pixel_count: u64,
    /// Total number of pixels compared
    pub total_pixels: u64,
    /// Bounding box of every differing pixel
    pub changed_region: Option<Rect>,
    /// Largest per-pixel channel delta sum seen
    pub max_channel_delta: u32,
    /// Whether dimensions matched
    pub dimensions_match: bool,
    /// Tolerance percentage used
    pub tolerance: f64,
    /// Size of the diff overlay, if one was produced
    pub diff_dimensions: Option<(u32, u32)>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use image::Rgba;

    fn result(pct: f64, overlay: bool) -> ComparisonResult {
        ComparisonResult {
            matches: pct == 0.0,
            difference_percentage: pct,
            diff_pixel_count: (pct * 100.0) as u64,
            total_pixels: 10_000,
            changed_region: None,
            max_channel_delta: 0,
            dimensions_match: true,
            tolerance: Tolerance::EXACT,
            diff_image: overlay
                .then(|| RasterBuffer::filled(2, 2, Rgba([255, 0, 0, 255])).unwrap()),
        }
    }

    mod tolerance_tests {
        use super::*;

        #[test]
        fn test_default_is_exact() {
            assert_eq!(Tolerance::default(), Tolerance::EXACT);
            assert!(Tolerance::EXACT.allows(0.0));
            assert!(!Tolerance::EXACT.allows(0.0001));
        }

        #[test]
        fn test_percent_bounds() {
            assert!(Tolerance::percent(0.0).is_ok());
            assert!(Tolerance::percent(100.0).is_ok());
            assert!(Tolerance::percent(-0.1).is_err());
            assert!(Tolerance::percent(100.1).is_err());
            assert!(Tolerance::percent(f64::NAN).is_err());
            assert!(Tolerance::percent(f64::INFINITY).is_err());
        }

        #[test]
        fn test_deserialize_validates() {
            let ok: Tolerance = serde_json::from_str("2.5").unwrap();
            assert_eq!(ok.as_percent(), 2.5);
            assert!(serde_json::from_str::<Tolerance>("250").is_err());
        }
    }

    mod result_tests {
        use super::*;

        #[test]
        fn test_is_identical() {
            assert!(result(0.0, false).is_identical());
            assert!(!result(5.0, true).is_identical());
        }

        #[test]
        fn test_within() {
            let r = result(25.0, true);
            assert!(!r.within(Tolerance::EXACT));
            assert!(r.within(Tolerance::percent(30.0).unwrap()));
            assert!(r.within(Tolerance::percent(25.0).unwrap()));
        }

        #[test]
        fn test_within_never_passes_dimension_mismatch() {
            let mut r = result(100.0, true);
            r.dimensions_match = false;
            assert!(!r.within(Tolerance::percent(100.0).unwrap()));
        }

        #[test]
        fn test_diff_png_absent_without_overlay() {
            assert!(result(0.0, false).diff_png().unwrap().is_none());
            assert!(result(0.0, false).diff_data_uri().unwrap().is_none());
        }

        #[test]
        fn test_diff_data_uri() {
            let uri = result(10.0, true).diff_data_uri().unwrap().unwrap();
            assert!(uri.starts_with("data:image/png;base64,iVBOR"));
        }

        #[test]
        fn test_summary_serializes() {
            let summary = result(10.0, true).summary();
            assert_eq!(summary.diff_dimensions, Some((2, 2)));
            let json = serde_json::to_value(&summary).unwrap();
            assert_eq!(json["difference_percentage"], 10.0);
            assert_eq!(json["matches"], false);
        }
    }
}
