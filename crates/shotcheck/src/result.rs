//! Result and error types for Shotcheck.

use thiserror::Error;

/// Result type for Shotcheck operations
pub type ShotResult<T> = Result<T, ShotError>;

/// Errors that can occur while capturing or comparing images
///
/// A visual mismatch is never an error: it is reported through
/// [`ComparisonResult`](crate::ComparisonResult). Every variant here means the
/// comparison could not be carried out.
#[derive(Debug, Error)]
pub enum ShotError {
    /// A pixel coordinate lies outside a buffer
    #[error("Pixel ({x}, {y}) is outside a {width}x{height} buffer")]
    OutOfBounds {
        /// Requested column
        x: u32,
        /// Requested row
        y: u32,
        /// Buffer width
        width: u32,
        /// Buffer height
        height: u32,
    },

    /// A crop or mask rectangle does not fit the buffer it is applied to
    #[error("Invalid region {x},{y} {rect_width}x{rect_height} for a {width}x{height} buffer")]
    InvalidRegion {
        /// Rectangle left edge
        x: u32,
        /// Rectangle top edge
        y: u32,
        /// Rectangle width
        rect_width: u32,
        /// Rectangle height
        rect_height: u32,
        /// Buffer width
        width: u32,
        /// Buffer height
        height: u32,
    },

    /// Buffer dimensions are zero or inconsistent with the pixel data
    #[error("Invalid dimensions: {message}")]
    InvalidDimensions {
        /// Error message
        message: String,
    },

    /// Tolerance outside 0..=100 or not finite
    #[error("Invalid tolerance {value}: must be a percentage between 0 and 100")]
    InvalidTolerance {
        /// Rejected value
        value: f64,
    },

    /// Image bytes could not be decoded
    #[error("Failed to decode image: {message}")]
    Decode {
        /// Error message
        message: String,
    },

    /// Image could not be encoded
    #[error("Failed to encode image: {message}")]
    Encode {
        /// Error message
        message: String,
    },

    /// The capture adapter could not produce pixels
    #[error("Capture unavailable: {message}")]
    CaptureUnavailable {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Element selector matched nothing on the page
    #[error("Element not found: {selector}")]
    ElementNotFound {
        /// Selector that was looked up
        selector: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Reference image absent from the baseline store
    #[error("Baseline not found: {name}")]
    BaselineMissing {
        /// Baseline name
        name: String,
    },

    /// Baseline name cannot be mapped to a store entry
    #[error("Invalid baseline name: {name:?}")]
    InvalidBaselineName {
        /// Rejected name
        name: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ShotError {
    /// Create a capture-unavailable error
    #[must_use]
    pub fn capture_unavailable(message: impl Into<String>) -> Self {
        Self::CaptureUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid-dimensions error
    #[must_use]
    pub fn invalid_dimensions(message: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            message: message.into(),
        }
    }

    /// Whether the failure came from acquiring pixels rather than comparing them
    #[must_use]
    pub const fn is_capture_failure(&self) -> bool {
        matches!(
            self,
            Self::CaptureUnavailable { .. }
                | Self::NavigationError { .. }
                | Self::ElementNotFound { .. }
                | Self::BrowserLaunch { .. }
        )
    }
}
