//! Comparison orchestration: baseline lookup, capture, crop, mask, diff.
//!
//! [`Comparator`] composes the pure engine pieces with the two external
//! collaborators: a [`BaselineStore`] it owns and a [`CaptureAdapter`] the
//! caller lends for each call. The only timeout applied is around the adapter
//! call; the diff itself never blocks.

use crate::baseline::BaselineStore;
use crate::capture::CaptureAdapter;
use crate::comparison::{ComparisonResult, Tolerance};
use crate::diff::DiffEngine;
use crate::mask::{mask, DEFAULT_MASK_FILL};
use crate::raster::RasterBuffer;
use crate::region::{extract, Rect};
use crate::result::{ShotError, ShotResult};
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bound on a single capture (navigation + readiness + screenshot)
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(90);

/// Per-comparison options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    /// Scope the comparison to the element matching this selector
    #[serde(alias = "selector")]
    pub element_selector: Option<String>,
    /// Regions to blank in both images before diffing, in the coordinates of
    /// the compared (post-crop) images
    #[serde(alias = "mask")]
    pub mask_regions: Vec<Rect>,
    /// Maximum allowed difference percentage
    pub tolerance: f64,
}

impl CompareOptions {
    /// Full-viewport comparison at zero tolerance
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope to one element
    #[must_use]
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.element_selector = Some(selector.into());
        self
    }

    /// Add a region to blank
    #[must_use]
    pub fn with_mask(mut self, rect: Rect) -> Self {
        self.mask_regions.push(rect);
        self
    }

    /// Set the tolerance percentage
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Runs comparisons against baselines held in a store
#[derive(Debug)]
pub struct Comparator<S: BaselineStore> {
    engine: DiffEngine,
    store: S,
    capture_timeout: Duration,
    mask_fill: Rgba<u8>,
}

impl<S: BaselineStore> Comparator<S> {
    /// Comparator with the default engine over `store`
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            engine: DiffEngine::default(),
            store,
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
            mask_fill: DEFAULT_MASK_FILL,
        }
    }

    /// Use a configured engine
    #[must_use]
    pub fn with_engine(mut self, engine: DiffEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Bound each capture call
    #[must_use]
    pub const fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    /// Fill colour for masked regions
    #[must_use]
    pub const fn with_mask_fill(mut self, fill: Rgba<u8>) -> Self {
        self.mask_fill = fill;
        self
    }

    /// Diff engine in use
    #[must_use]
    pub const fn engine(&self) -> &DiffEngine {
        &self.engine
    }

    /// Baseline store in use
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Compare a live capture of `url` against the baseline `name`.
    ///
    /// The baseline is loaded before anything is captured. A visual mismatch
    /// is an `Ok` result; capture problems surface as errors and never as a
    /// 100% difference.
    ///
    /// # Errors
    ///
    /// - [`ShotError::InvalidTolerance`] for a tolerance outside 0..=100
    /// - [`ShotError::BaselineMissing`] if the store has no such baseline
    /// - [`ShotError::CaptureUnavailable`] on timeout or undecodable capture
    /// - adapter errors ([`ShotError::NavigationError`],
    ///   [`ShotError::ElementNotFound`], ...) unchanged
    /// - [`ShotError::InvalidRegion`] if the element or a mask does not fit
    pub async fn compare<A>(
        &self,
        adapter: &mut A,
        name: &str,
        url: &str,
        options: &CompareOptions,
    ) -> ShotResult<ComparisonResult>
    where
        A: CaptureAdapter + ?Sized,
    {
        let tolerance = Tolerance::percent(options.tolerance)?;
        let baseline = RasterBuffer::from_encoded(&self.store.load(name)?)?;
        debug!(name, width = baseline.width(), height = baseline.height(), "baseline loaded");

        let (candidate, element) = self
            .acquire(adapter, url, options.element_selector.as_deref())
            .await?;

        let result = self.evaluate(&baseline, &candidate, element, &options.mask_regions, tolerance)?;
        info!(
            name,
            url,
            matches = result.matches,
            difference = result.difference_percentage,
            tolerance = tolerance.as_percent(),
            "comparison finished"
        );
        Ok(result)
    }

    /// Run the crop/mask/diff pipeline on already decoded buffers.
    ///
    /// `options.element_selector` is ignored; use
    /// [`compare_buffers_in`](Self::compare_buffers_in) to scope to a region.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::InvalidTolerance`] or [`ShotError::InvalidRegion`].
    pub fn compare_buffers(
        &self,
        baseline: &RasterBuffer,
        candidate: &RasterBuffer,
        options: &CompareOptions,
    ) -> ShotResult<ComparisonResult> {
        let tolerance = Tolerance::percent(options.tolerance)?;
        self.evaluate(baseline, candidate, None, &options.mask_regions, tolerance)
    }

    /// Like [`compare_buffers`](Self::compare_buffers), scoped to `region`
    /// of the candidate.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::InvalidTolerance`] or [`ShotError::InvalidRegion`].
    pub fn compare_buffers_in(
        &self,
        baseline: &RasterBuffer,
        candidate: &RasterBuffer,
        region: Rect,
        options: &CompareOptions,
    ) -> ShotResult<ComparisonResult> {
        let tolerance = Tolerance::percent(options.tolerance)?;
        self.evaluate(baseline, candidate, Some(region), &options.mask_regions, tolerance)
    }

    /// Capture `url` and store it as baseline `name`, replacing any existing
    /// one. With a selector the stored image is the element crop.
    ///
    /// # Errors
    ///
    /// Capture errors as for [`compare`](Self::compare), plus store errors.
    pub async fn approve<A>(
        &self,
        adapter: &mut A,
        name: &str,
        url: &str,
        options: &CompareOptions,
    ) -> ShotResult<RasterBuffer>
    where
        A: CaptureAdapter + ?Sized,
    {
        let (candidate, element) = self
            .acquire(adapter, url, options.element_selector.as_deref())
            .await?;
        let approved = match element {
            Some(rect) => extract(&candidate, rect)?,
            None => candidate,
        };
        self.store.save(name, &approved.to_png()?)?;
        info!(name, url, width = approved.width(), height = approved.height(), "baseline approved");
        Ok(approved)
    }

    /// Capture and decode, bounded by the capture timeout
    async fn acquire<A>(
        &self,
        adapter: &mut A,
        url: &str,
        selector: Option<&str>,
    ) -> ShotResult<(RasterBuffer, Option<Rect>)>
    where
        A: CaptureAdapter + ?Sized,
    {
        let captured = match selector {
            Some(selector) => {
                tokio::time::timeout(self.capture_timeout, adapter.capture_region(url, selector))
                    .await
                    .map(|r| r.map(|(bytes, rect)| (bytes, Some(rect))))
            }
            None => tokio::time::timeout(self.capture_timeout, adapter.capture(url))
                .await
                .map(|r| r.map(|bytes| (bytes, None))),
        };

        let (bytes, element) = match captured {
            Ok(Ok(capture)) => capture,
            Ok(Err(e)) => {
                warn!(url, error = %e, "capture failed");
                return Err(e);
            }
            Err(_) => {
                warn!(url, timeout = ?self.capture_timeout, "capture timed out");
                return Err(ShotError::capture_unavailable(format!(
                    "capture of {url} exceeded {:?}",
                    self.capture_timeout
                )));
            }
        };

        let candidate = RasterBuffer::from_encoded(&bytes).map_err(|e| {
            warn!(url, error = %e, "capture is not a decodable image");
            ShotError::capture_unavailable(format!("undecodable capture of {url}: {e}"))
        })?;
        debug!(url, width = candidate.width(), height = candidate.height(), ?element, "captured");
        Ok((candidate, element))
    }

    fn evaluate(
        &self,
        baseline: &RasterBuffer,
        candidate: &RasterBuffer,
        element: Option<Rect>,
        masks: &[Rect],
        tolerance: Tolerance,
    ) -> ShotResult<ComparisonResult> {
        let (baseline, candidate) = match element {
            Some(rect) => {
                let candidate = extract(candidate, rect)?;
                // An element-sized baseline was approved already cropped
                let baseline = if baseline.dimensions() == (rect.width, rect.height)
                    || !rect.fits_within(baseline.width(), baseline.height())
                {
                    baseline.clone()
                } else {
                    extract(baseline, rect)?
                };
                (baseline, candidate)
            }
            None => (baseline.clone(), candidate.clone()),
        };

        // Mismatched sizes are a 100% result; masks only apply to equal sizes
        let (baseline, candidate) = if masks.is_empty()
            || baseline.dimensions() != candidate.dimensions()
        {
            (baseline, candidate)
        } else {
            (
                mask(&baseline, masks, self.mask_fill)?,
                mask(&candidate, masks, self.mask_fill)?,
            )
        };

        Ok(self.engine.compare(&baseline, &candidate, tolerance))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::baseline::MemoryBaselineStore;
    use crate::capture::StaticCapture;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const URL: &str = "http://localhost:8080/";

    fn png(buffer: &RasterBuffer) -> Vec<u8> {
        buffer.to_png().unwrap()
    }

    fn white(width: u32, height: u32) -> RasterBuffer {
        RasterBuffer::filled(width, height, WHITE).unwrap()
    }

    fn with_black(width: u32, height: u32, x: u32, y: u32) -> RasterBuffer {
        let mut image = white(width, height).into_image();
        image.put_pixel(x, y, BLACK);
        RasterBuffer::from_image(image).unwrap()
    }

    fn comparator(baseline: &RasterBuffer) -> Comparator<MemoryBaselineStore> {
        Comparator::new(MemoryBaselineStore::new().with_baseline("A", png(baseline)))
    }

    mod options_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let opts = CompareOptions::default();
            assert!(opts.element_selector.is_none());
            assert!(opts.mask_regions.is_empty());
            assert_eq!(opts.tolerance, 0.0);
        }

        #[test]
        fn test_builder() {
            let opts = CompareOptions::new()
                .with_selector(".computers")
                .with_mask(Rect::new(0, 0, 10, 10))
                .with_tolerance(1.5);
            assert_eq!(opts.element_selector.as_deref(), Some(".computers"));
            assert_eq!(opts.mask_regions.len(), 1);
            assert_eq!(opts.tolerance, 1.5);
        }

        #[test]
        fn test_deserialize_with_aliases() {
            let opts: CompareOptions = serde_json::from_str(
                r#"{"selector": ".table", "mask": [{"x":1,"y":2,"width":3,"height":4}]}"#,
            )
            .unwrap();
            assert_eq!(opts.element_selector.as_deref(), Some(".table"));
            assert_eq!(opts.mask_regions, vec![Rect::new(1, 2, 3, 4)]);
            assert_eq!(opts.tolerance, 0.0);
        }
    }

    mod scenario_tests {
        use super::*;

        #[tokio::test]
        async fn test_identical_capture_matches() {
            let base = white(2, 2);
            let cmp = comparator(&base);
            let mut adapter = StaticCapture::new().with_page(URL, png(&base));

            let result = cmp
                .compare(&mut adapter, "A", URL, &CompareOptions::default())
                .await
                .unwrap();
            assert!(result.matches);
            assert_eq!(result.difference_percentage, 0.0);
            assert!(result.diff_image.is_none());
        }

        #[tokio::test]
        async fn test_one_black_pixel_is_quarter_difference() {
            let cmp = comparator(&white(2, 2));
            let mut adapter = StaticCapture::new().with_page(URL, png(&with_black(2, 2, 1, 0)));

            let strict = cmp
                .compare(&mut adapter, "A", URL, &CompareOptions::default())
                .await
                .unwrap();
            assert_eq!(strict.difference_percentage, 25.0);
            assert!(!strict.matches);
            assert!(strict.diff_image.is_some());

            let lenient = cmp
                .compare(&mut adapter, "A", URL, &CompareOptions::new().with_tolerance(30.0))
                .await
                .unwrap();
            assert!(lenient.matches);
        }

        #[tokio::test]
        async fn test_missing_element_is_an_error() {
            let cmp = comparator(&white(2, 2));
            let mut adapter = StaticCapture::new().with_page(URL, png(&white(2, 2)));

            let err = cmp
                .compare(&mut adapter, "A", URL, &CompareOptions::new().with_selector(".missing"))
                .await
                .unwrap_err();
            assert!(matches!(err, ShotError::ElementNotFound { selector } if selector == ".missing"));
        }
    }

    mod failure_tests {
        use super::*;

        #[tokio::test]
        async fn test_baseline_missing_before_capture() {
            let cmp = Comparator::new(MemoryBaselineStore::new());
            let mut adapter = StaticCapture::new().with_page(URL, png(&white(2, 2)));

            let err = cmp
                .compare(&mut adapter, "A", URL, &CompareOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ShotError::BaselineMissing { name } if name == "A"));
            assert!(adapter.history().is_empty());
        }

        #[tokio::test]
        async fn test_navigation_failure_propagates() {
            let cmp = comparator(&white(2, 2));
            let mut adapter = StaticCapture::new().with_unreachable(URL, "connection refused");

            let err = cmp
                .compare(&mut adapter, "A", URL, &CompareOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ShotError::NavigationError { .. }));
        }

        #[tokio::test]
        async fn test_timeout_is_capture_unavailable() {
            let cmp = comparator(&white(2, 2)).with_capture_timeout(Duration::from_millis(20));
            let mut adapter = StaticCapture::new()
                .with_page(URL, png(&white(2, 2)))
                .with_delay(Duration::from_secs(5));

            let err = cmp
                .compare(&mut adapter, "A", URL, &CompareOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ShotError::CaptureUnavailable { .. }));
        }

        #[tokio::test]
        async fn test_undecodable_capture() {
            let cmp = comparator(&white(2, 2));
            let mut adapter = StaticCapture::new().with_page(URL, b"<html>".to_vec());

            let err = cmp
                .compare(&mut adapter, "A", URL, &CompareOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ShotError::CaptureUnavailable { .. }));
        }

        #[tokio::test]
        async fn test_invalid_tolerance() {
            let cmp = comparator(&white(2, 2));
            let mut adapter = StaticCapture::new().with_page(URL, png(&white(2, 2)));

            let err = cmp
                .compare(&mut adapter, "A", URL, &CompareOptions::new().with_tolerance(101.0))
                .await
                .unwrap_err();
            assert!(matches!(err, ShotError::InvalidTolerance { .. }));
        }

        #[tokio::test]
        async fn test_size_mismatch_is_a_result() {
            let cmp = comparator(&white(4, 4));
            let mut adapter = StaticCapture::new().with_page(URL, png(&white(4, 2)));

            let result = cmp
                .compare(&mut adapter, "A", URL, &CompareOptions::new().with_tolerance(100.0))
                .await
                .unwrap();
            assert!(!result.matches);
            assert!(!result.dimensions_match);
            assert_eq!(result.difference_percentage, 100.0);
        }
    }

    mod element_tests {
        use super::*;

        #[tokio::test]
        async fn test_full_page_baseline_cropped_to_element() {
            // Change outside the element must not count
            let cmp = comparator(&white(8, 8));
            let mut adapter = StaticCapture::new()
                .with_page(URL, png(&with_black(8, 8, 7, 7)))
                .with_element(URL, ".table", Rect::new(1, 1, 4, 4));

            let result = cmp
                .compare(&mut adapter, "A", URL, &CompareOptions::new().with_selector(".table"))
                .await
                .unwrap();
            assert!(result.matches);
            assert_eq!(result.total_pixels, 16);
        }

        #[tokio::test]
        async fn test_element_sized_baseline_used_as_is() {
            let cmp = comparator(&white(4, 4));
            let mut adapter = StaticCapture::new()
                .with_page(URL, png(&with_black(8, 8, 2, 2)))
                .with_element(URL, ".table", Rect::new(2, 2, 4, 4));

            let result = cmp
                .compare(&mut adapter, "A", URL, &CompareOptions::new().with_selector(".table"))
                .await
                .unwrap();
            assert_eq!(result.diff_pixel_count, 1);
            assert_eq!(result.changed_region, Some(Rect::new(0, 0, 1, 1)));
        }

        #[tokio::test]
        async fn test_approve_then_compare_element() {
            let cmp = Comparator::new(MemoryBaselineStore::new());
            let page = with_black(8, 8, 3, 3);
            let mut adapter = StaticCapture::new()
                .with_page(URL, png(&page))
                .with_element(URL, ".table", Rect::new(2, 2, 3, 3));
            let opts = CompareOptions::new().with_selector(".table");

            let approved = cmp.approve(&mut adapter, "table", URL, &opts).await.unwrap();
            assert_eq!(approved.dimensions(), (3, 3));
            assert!(cmp.store().exists("table").unwrap());

            let result = cmp.compare(&mut adapter, "table", URL, &opts).await.unwrap();
            assert!(result.is_identical());
        }
    }

    mod mask_tests {
        use super::*;

        #[tokio::test]
        async fn test_masked_difference_ignored() {
            let cmp = comparator(&white(4, 4));
            let mut adapter = StaticCapture::new().with_page(URL, png(&with_black(4, 4, 1, 1)));

            let opts = CompareOptions::new().with_mask(Rect::new(0, 0, 2, 2));
            let result = cmp.compare(&mut adapter, "A", URL, &opts).await.unwrap();
            assert!(result.matches);
            assert_eq!(result.difference_percentage, 0.0);
        }

        #[test]
        fn test_mask_out_of_bounds_rejected() {
            let cmp = comparator(&white(4, 4));
            let opts = CompareOptions::new().with_mask(Rect::new(3, 3, 2, 2));
            let err = cmp
                .compare_buffers(&white(4, 4), &white(4, 4), &opts)
                .unwrap_err();
            assert!(matches!(err, ShotError::InvalidRegion { .. }));
        }

        #[tokio::test]
        async fn test_mask_ignored_when_page_height_changes() {
            let cmp = comparator(&white(100, 100));
            let mut adapter = StaticCapture::new().with_page(URL, png(&white(100, 50)));

            let opts = CompareOptions::new().with_mask(Rect::new(0, 60, 10, 10));
            let result = cmp.compare(&mut adapter, "A", URL, &opts).await.unwrap();
            assert!(!result.matches);
            assert!(!result.dimensions_match);
            assert_eq!(result.difference_percentage, 100.0);
        }

        #[tokio::test]
        async fn test_mask_ignored_when_element_outgrows_baseline() {
            let cmp = comparator(&white(4, 4));
            let mut adapter = StaticCapture::new()
                .with_page(URL, png(&white(20, 20)))
                .with_element(URL, ".table", Rect::new(5, 5, 10, 10));

            let opts = CompareOptions::new()
                .with_selector(".table")
                .with_mask(Rect::new(5, 5, 5, 5));
            let result = cmp.compare(&mut adapter, "A", URL, &opts).await.unwrap();
            assert!(!result.matches);
            assert_eq!(result.difference_percentage, 100.0);
        }

        #[test]
        fn test_compare_buffers_mask_on_size_mismatch() {
            let cmp = comparator(&white(1, 1));
            let opts = CompareOptions::new()
                .with_mask(Rect::new(0, 3, 4, 1))
                .with_tolerance(100.0);
            let result = cmp
                .compare_buffers(&white(4, 4), &white(4, 2), &opts)
                .unwrap();
            assert!(!result.matches);
            assert_eq!(result.difference_percentage, 100.0);
        }

        #[test]
        fn test_compare_buffers_in_region() {
            let cmp = comparator(&white(1, 1));
            let result = cmp
                .compare_buffers_in(
                    &white(6, 6),
                    &with_black(6, 6, 5, 5),
                    Rect::new(0, 0, 3, 3),
                    &CompareOptions::default(),
                )
                .unwrap();
            assert!(result.matches);
        }
    }
}
