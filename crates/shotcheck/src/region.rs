//! Rectangles and element-scoped cropping.

use crate::raster::{RasterBuffer, CHANNELS};
use crate::result::{ShotError, ShotResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Axis-aligned pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// X coordinate of top-left corner
    pub x: u32,
    /// Y coordinate of top-left corner
    pub y: u32,
    /// Width of region
    pub width: u32,
    /// Height of region
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert fractional client geometry reported by a browser.
    ///
    /// The origin is floored and the far edge ceiled so the rectangle covers
    /// every pixel the element touches.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::InvalidRegion`] for negative or non-finite input,
    /// which happens when the element is scrolled out of the viewport.
    pub fn from_client_box(x: f64, y: f64, width: f64, height: f64) -> ShotResult<Self> {
        let valid = [x, y, width, height]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0 && *v <= f64::from(u32::MAX));
        if !valid {
            return Err(ShotError::InvalidRegion {
                x: x.max(0.0) as u32,
                y: y.max(0.0) as u32,
                rect_width: width.max(0.0) as u32,
                rect_height: height.max(0.0) as u32,
                width: 0,
                height: 0,
            });
        }
        let left = x.floor();
        let top = y.floor();
        let right = (x + width).ceil();
        let bottom = (y + height).ceil();
        Ok(Self::new(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }

    /// Number of pixels covered
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether the rectangle covers no pixels
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge, `None` on overflow
    #[must_use]
    pub const fn right(&self) -> Option<u32> {
        self.x.checked_add(self.width)
    }

    /// Exclusive bottom edge, `None` on overflow
    #[must_use]
    pub const fn bottom(&self) -> Option<u32> {
        self.y.checked_add(self.height)
    }

    /// Check if a point is within this rectangle
    #[must_use]
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x
            && py >= self.y
            && self.right().map_or(true, |r| px < r)
            && self.bottom().map_or(true, |b| py < b)
    }

    /// Whether the rectangle lies fully inside a `width x height` area
    #[must_use]
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        matches!((self.right(), self.bottom()), (Some(r), Some(b)) if r <= width && b <= height)
    }

    /// Smallest rectangle covering both
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self
            .right()
            .unwrap_or(u32::MAX)
            .max(other.right().unwrap_or(u32::MAX));
        let bottom = self
            .bottom()
            .unwrap_or(u32::MAX)
            .max(other.bottom().unwrap_or(u32::MAX));
        Self::new(left, top, right - left, bottom - top)
    }

    /// Fail with [`ShotError::InvalidRegion`] unless the rectangle fits
    pub(crate) fn check_within(&self, width: u32, height: u32) -> ShotResult<()> {
        if self.fits_within(width, height) {
            Ok(())
        } else {
            Err(self.invalid_for(width, height))
        }
    }

    pub(crate) const fn invalid_for(&self, width: u32, height: u32) -> ShotError {
        ShotError::InvalidRegion {
            x: self.x,
            y: self.y,
            rect_width: self.width,
            rect_height: self.height,
            width,
            height,
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Error parsing a rectangle from `"x,y,width,height"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRectError {
    input: String,
}

impl fmt::Display for ParseRectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected rectangle as x,y,width,height but got {:?}",
            self.input
        )
    }
}

impl std::error::Error for ParseRectError {}

impl FromStr for Rect {
    type Err = ParseRectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRectError {
            input: s.to_string(),
        };
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| err())?;
        match parts.as_slice() {
            [x, y, w, h] => Ok(Self::new(*x, *y, *w, *h)),
            _ => Err(err()),
        }
    }
}

/// Crop a buffer to a rectangle.
///
/// # Errors
///
/// Returns [`ShotError::InvalidRegion`] if the rectangle is empty or not fully
/// contained in the buffer. Out-of-range geometry is never clamped.
pub fn extract(buffer: &RasterBuffer, rect: Rect) -> ShotResult<RasterBuffer> {
    if rect.is_empty() {
        return Err(rect.invalid_for(buffer.width(), buffer.height()));
    }
    rect.check_within(buffer.width(), buffer.height())?;

    let start = rect.x as usize * CHANNELS;
    let end = start + rect.width as usize * CHANNELS;
    let mut data = Vec::with_capacity(rect.area() as usize * CHANNELS);
    for y in rect.y..rect.y + rect.height {
        data.extend_from_slice(&buffer.row(y)[start..end]);
    }
    RasterBuffer::from_raw(rect.width, rect.height, data)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RasterBuffer {
        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| Rgba([x as u8, y as u8, 0, 255])))
            .collect();
        RasterBuffer::from_pixels(width, height, pixels).unwrap()
    }

    mod rect_tests {
        use super::*;

        #[test]
        fn test_contains() {
            let r = Rect::new(2, 2, 3, 3);
            assert!(r.contains(2, 2));
            assert!(r.contains(4, 4));
            assert!(!r.contains(5, 4));
            assert!(!r.contains(1, 3));
        }

        #[test]
        fn test_fits_within() {
            assert!(Rect::new(0, 0, 10, 10).fits_within(10, 10));
            assert!(!Rect::new(1, 0, 10, 10).fits_within(10, 10));
            assert!(!Rect::new(u32::MAX, 0, 2, 1).fits_within(u32::MAX, 1));
        }

        #[test]
        fn test_union() {
            let a = Rect::new(1, 1, 2, 2);
            let b = Rect::new(4, 0, 1, 1);
            assert_eq!(a.union(&b), Rect::new(1, 0, 4, 3));
        }

        #[test]
        fn test_parse() {
            assert_eq!("1,2,3,4".parse::<Rect>().unwrap(), Rect::new(1, 2, 3, 4));
            assert_eq!(
                " 0, 0 ,10,20".parse::<Rect>().unwrap(),
                Rect::new(0, 0, 10, 20)
            );
            assert!("1,2,3".parse::<Rect>().is_err());
            assert!("a,b,c,d".parse::<Rect>().is_err());
            assert!("-1,0,1,1".parse::<Rect>().is_err());
        }

        #[test]
        fn test_display_parses_back() {
            let r = Rect::new(3, 4, 5, 6);
            assert_eq!(r.to_string().parse::<Rect>().unwrap(), r);
        }

        #[test]
        fn test_from_client_box_covers_partial_pixels() {
            let r = Rect::from_client_box(10.5, 3.2, 20.0, 4.9).unwrap();
            assert_eq!(r, Rect::new(10, 3, 21, 6));
        }

        #[test]
        fn test_from_client_box_rejects_negative() {
            assert!(Rect::from_client_box(-4.0, 0.0, 10.0, 10.0).is_err());
            assert!(Rect::from_client_box(0.0, 0.0, f64::NAN, 10.0).is_err());
        }

        #[test]
        fn test_serde() {
            let r = Rect::new(1, 2, 3, 4);
            let json = serde_json::to_string(&r).unwrap();
            assert_eq!(json, r#"{"x":1,"y":2,"width":3,"height":4}"#);
            let back: Rect = serde_json::from_str(&json).unwrap();
            assert_eq!(back, r);
        }
    }

    mod extract_tests {
        use super::*;

        #[test]
        fn test_extract_copies_region() {
            let buf = gradient(5, 4);
            let crop = extract(&buf, Rect::new(1, 2, 3, 2)).unwrap();
            assert_eq!(crop.dimensions(), (3, 2));
            assert_eq!(crop.pixel(0, 0).unwrap(), Rgba([1, 2, 0, 255]));
            assert_eq!(crop.pixel(2, 1).unwrap(), Rgba([3, 3, 0, 255]));
        }

        #[test]
        fn test_extract_full_bounds_is_identity() {
            let buf = gradient(6, 3);
            assert_eq!(extract(&buf, buf.bounds()).unwrap(), buf);
        }

        #[test]
        fn test_extract_outside_fails() {
            let buf = gradient(4, 4);
            let err = extract(&buf, Rect::new(2, 2, 3, 1)).unwrap_err();
            assert!(matches!(err, ShotError::InvalidRegion { width: 4, .. }));
        }

        #[test]
        fn test_extract_empty_fails() {
            let buf = gradient(4, 4);
            assert!(extract(&buf, Rect::new(0, 0, 0, 2)).is_err());
        }

        #[test]
        fn test_extract_does_not_touch_source() {
            let buf = gradient(4, 4);
            let before = buf.clone();
            let _ = extract(&buf, Rect::new(0, 0, 2, 2)).unwrap();
            assert_eq!(buf, before);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_extract_idempotent(
                width in 1u32..24,
                height in 1u32..24,
                fx in 0.0f64..1.0,
                fy in 0.0f64..1.0,
                fw in 0.0f64..1.0,
                fh in 0.0f64..1.0
            ) {
                let buf = gradient(width, height);
                let x = (fx * f64::from(width - 1)) as u32;
                let y = (fy * f64::from(height - 1)) as u32;
                let w = 1 + (fw * f64::from(width - x - 1)) as u32;
                let h = 1 + (fh * f64::from(height - y - 1)) as u32;
                let once = extract(&buf, Rect::new(x, y, w, h)).unwrap();
                let twice = extract(&once, once.bounds()).unwrap();
                prop_assert_eq!(twice, once);
            }
        }
    }
}
