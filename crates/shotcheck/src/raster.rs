//! Immutable decoded raster images.
//!
//! A [`RasterBuffer`] is the only image representation the comparison engine
//! sees. It is produced by decoding stored baselines or raw capture bytes and
//! is never mutated afterwards: cropping, masking and diff synthesis all build
//! new buffers.

use crate::region::Rect;
use crate::result::{ShotError, ShotResult};
use image::{ImageEncoder, Rgba, RgbaImage};
use std::fmt;

/// Bytes per RGBA8 pixel
pub(crate) const CHANNELS: usize = 4;

/// Decoded RGBA8 image with non-zero dimensions
#[derive(Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    image: RgbaImage,
}

impl fmt::Debug for RasterBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterBuffer")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl RasterBuffer {
    /// Decode an encoded image (PNG or JPEG)
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::Decode`] for malformed bytes and
    /// [`ShotError::InvalidDimensions`] for an empty image.
    pub fn from_encoded(bytes: &[u8]) -> ShotResult<Self> {
        let decoded = image::load_from_memory(bytes).map_err(|e| ShotError::Decode {
            message: e.to_string(),
        })?;
        Self::from_image(decoded.to_rgba8())
    }

    /// Wrap an already decoded RGBA image
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::InvalidDimensions`] if either dimension is zero.
    pub fn from_image(image: RgbaImage) -> ShotResult<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ShotError::invalid_dimensions(format!(
                "image must be non-empty, got {width}x{height}"
            )));
        }
        Ok(Self { image })
    }

    /// Build from raw RGBA8 bytes in row-major order
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::InvalidDimensions`] if a dimension is zero or the
    /// byte count is not exactly `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> ShotResult<Self> {
        let expected = u64::from(width) * u64::from(height) * CHANNELS as u64;
        if data.len() as u64 != expected {
            return Err(ShotError::invalid_dimensions(format!(
                "{width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        let image = RgbaImage::from_raw(width, height, data).ok_or_else(|| {
            ShotError::invalid_dimensions(format!("{width}x{height} buffer rejected"))
        })?;
        Self::from_image(image)
    }

    /// Build from an explicit pixel list in row-major order
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::InvalidDimensions`] if a dimension is zero or the
    /// pixel count does not equal `width * height`.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Rgba<u8>>) -> ShotResult<Self> {
        let expected = u64::from(width) * u64::from(height);
        if pixels.len() as u64 != expected {
            return Err(ShotError::invalid_dimensions(format!(
                "{width}x{height} needs {expected} pixels, got {}",
                pixels.len()
            )));
        }
        let data = pixels.into_iter().flat_map(|p| p.0).collect();
        Self::from_raw(width, height, data)
    }

    /// Wrap an image whose dimensions are already known to be non-zero
    pub(crate) fn from_valid(image: RgbaImage) -> Self {
        debug_assert!(image.width() > 0 && image.height() > 0);
        Self { image }
    }

    /// Single-colour buffer
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::InvalidDimensions`] if either dimension is zero.
    pub fn filled(width: u32, height: u32, color: Rgba<u8>) -> ShotResult<Self> {
        Self::from_image(RgbaImage::from_pixel(width, height, color))
    }

    /// Width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Rectangle covering the whole buffer
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width(), self.height())
    }

    /// Total number of pixels
    #[must_use]
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// Read one pixel
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::OutOfBounds`] when `x >= width` or `y >= height`.
    pub fn pixel(&self, x: u32, y: u32) -> ShotResult<Rgba<u8>> {
        self.image
            .get_pixel_checked(x, y)
            .copied()
            .ok_or(ShotError::OutOfBounds {
                x,
                y,
                width: self.width(),
                height: self.height(),
            })
    }

    /// Iterate pixels in row-major order
    pub fn pixels(&self) -> impl Iterator<Item = Rgba<u8>> + '_ {
        self.image.pixels().copied()
    }

    /// Raw RGBA8 bytes in row-major order
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Raw bytes of one row; `y` must be in range
    pub(crate) fn row(&self, y: u32) -> &[u8] {
        let stride = self.width() as usize * CHANNELS;
        let start = y as usize * stride;
        &self.image.as_raw()[start..start + stride]
    }

    /// Borrow the underlying image
    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Consume into the underlying image
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Encode as PNG
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::Encode`] if the encoder fails.
    pub fn to_png(&self) -> ShotResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
        encoder
            .write_image(
                self.image.as_raw(),
                self.width(),
                self.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| ShotError::Encode {
                message: e.to_string(),
            })?;
        Ok(buffer)
    }
}

impl TryFrom<RgbaImage> for RasterBuffer {
    type Error = ShotError;

    fn try_from(image: RgbaImage) -> ShotResult<Self> {
        Self::from_image(image)
    }
}
