//! Shotcheck: visual regression testing by pixel comparison
//!
//! Capture a rendered page (or one element of it), compare it against an
//! approved baseline image, and report whether they match, by how much they
//! differ and where.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      SHOTCHECK Architecture                      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌──────────┐ │
//! │  │ Comparator │──►│ Capture    │──►│ extract /  │──►│ Diff     │ │
//! │  │ + Baseline │   │ Adapter    │   │ mask       │   │ Engine   │ │
//! │  │   Store    │   │ (chromium) │   │            │   │ (rayon)  │ │
//! │  └────────────┘   └────────────┘   └────────────┘   └──────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine (raster, region, mask, diff, comparison) is synchronous, pure
//! and safe to call from many threads. Only the capture adapter suspends.
//!
//! ```
//! use shotcheck::prelude::*;
//! use image::Rgba;
//!
//! let white = RasterBuffer::filled(2, 2, Rgba([255, 255, 255, 255]))?;
//! let result = DiffEngine::new().compare(&white, &white.clone(), Tolerance::EXACT);
//! assert!(result.matches);
//! # Ok::<(), shotcheck::ShotError>(())
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod baseline;
pub mod capture;
mod comparison;
mod diff;
mod mask;
mod orchestrator;
mod raster;
mod region;
mod result;

pub use baseline::{BaselineStore, FsBaselineStore, MemoryBaselineStore};
pub use capture::{CaptureAdapter, CaptureConfig, StaticCapture};
#[cfg(feature = "browser")]
pub use capture::ChromiumCapture;
pub use comparison::{ComparisonResult, ComparisonSummary, Tolerance};
pub use diff::{DiffEngine, DEFAULT_HIGHLIGHT, DEFAULT_NOISE_THRESHOLD, PARALLEL_PIXEL_THRESHOLD};
pub use mask::{mask, DEFAULT_MASK_FILL};
pub use orchestrator::{CompareOptions, Comparator, DEFAULT_CAPTURE_TIMEOUT};
pub use raster::RasterBuffer;
pub use region::{extract, ParseRectError, Rect};
pub use result::{ShotError, ShotResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::baseline::*;
    pub use super::capture::*;
    pub use super::comparison::*;
    pub use super::diff::*;
    pub use super::mask::*;
    pub use super::orchestrator::*;
    pub use super::raster::*;
    pub use super::region::*;
    pub use super::result::*;
}
