use serde::{Deserialize, Serialize};

use crate::complex::Complex;
use crate::error::CoreError;

/// Pixel dimensions of the screen the bounds are mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> crate::Result<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidScreenSize { width, height });
        }
        Ok(Self { width, height })
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// The rectangular region of the complex plane shown on screen.
///
/// Always normalized: `p1` is the lower-left corner (smallest real and
/// imaginary parts) and `p2` the upper-right, with a non-zero extent on both
/// axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    p1: Complex,
    p2: Complex,
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            p1: Complex,
            p2: Complex,
        }
        let raw = Raw::deserialize(deserializer)?;
        Bounds::new(raw.p1, raw.p2).map_err(serde::de::Error::custom)
    }
}

impl Bounds {
    /// Build bounds from any two opposite corners.
    pub fn new(a: Complex, b: Complex) -> crate::Result<Self> {
        if !a.is_finite() || !b.is_finite() {
            return Err(CoreError::InvalidBounds {
                reason: format!("corners must be finite, got {a} and {b}"),
            });
        }
        let p1 = Complex::new(a.re.min(b.re), a.im.min(b.im));
        let p2 = Complex::new(a.re.max(b.re), a.im.max(b.im));
        if p2.re - p1.re <= 0.0 || p2.im - p1.im <= 0.0 {
            return Err(CoreError::InvalidBounds {
                reason: format!("region {a} .. {b} has zero width or height"),
            });
        }
        Ok(Self { p1, p2 })
    }

    /// Bounds from literal corners already in normalized order.
    pub(crate) fn from_corners(re1: f64, im1: f64, re2: f64, im2: f64) -> Self {
        debug_assert!(re1 < re2 && im1 < im2);
        Self {
            p1: Complex::new(re1, im1),
            p2: Complex::new(re2, im2),
        }
    }

    /// Bounds centred on `center` spanning `width × height` plane units.
    pub fn centered(center: Complex, width: f64, height: f64) -> crate::Result<Self> {
        let half = Complex::new(width / 2.0, height / 2.0);
        Self::new(center - half, center + half)
    }

    #[inline]
    pub fn p1(&self) -> Complex {
        self.p1
    }

    #[inline]
    pub fn p2(&self) -> Complex {
        self.p2
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.p2.re - self.p1.re
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.p2.im - self.p1.im
    }

    pub fn center(&self) -> Complex {
        Complex::new(
            (self.p1.re + self.p2.re) / 2.0,
            (self.p1.im + self.p2.im) / 2.0,
        )
    }

    /// Map a pixel to the complex plane.
    ///
    /// Column 0 maps to `p1.re` and column `width − 1` to `p2.re`. Row 0 maps
    /// to `p1.im` unless `invert_y` is set, in which case row 0 is `p2.im`.
    /// A one-pixel axis maps to the centre of that axis.
    #[inline]
    pub fn pixel_to_complex(&self, screen: ScreenSize, x: u32, y: u32, invert_y: bool) -> Complex {
        let fx = axis_fraction(x as f64, screen.width);
        let mut fy = axis_fraction(y as f64, screen.height);
        if invert_y {
            fy = 1.0 - fy;
        }
        Complex::new(
            self.p1.re + fx * self.width(),
            self.p1.im + fy * self.height(),
        )
    }

    /// Inverse of [`pixel_to_complex`](Self::pixel_to_complex), returning
    /// fractional pixel coordinates.
    pub fn complex_to_pixel(&self, screen: ScreenSize, z: Complex, invert_y: bool) -> (f64, f64) {
        let mut fy = (z.im - self.p1.im) / self.height();
        if invert_y {
            fy = 1.0 - fy;
        }
        let fx = (z.re - self.p1.re) / self.width();
        (
            fraction_to_axis(fx, screen.width),
            fraction_to_axis(fy, screen.height),
        )
    }

    /// Bounds covering the pixel rectangle between two screen points,
    /// as selected by a zoom rubber band.
    pub fn select(
        &self,
        screen: ScreenSize,
        from: (u32, u32),
        to: (u32, u32),
        invert_y: bool,
    ) -> crate::Result<Self> {
        let a = self.pixel_to_complex(screen, from.0, from.1, invert_y);
        let b = self.pixel_to_complex(screen, to.0, to.1, invert_y);
        Self::new(a, b)
    }

    /// Scale the region about its centre; `factor < 1` zooms in.
    pub fn zoomed(&self, factor: f64) -> crate::Result<Self> {
        Self::centered(self.center(), self.width() * factor, self.height() * factor)
    }
}

#[inline]
fn axis_fraction(pos: f64, len: u32) -> f64 {
    if len <= 1 {
        0.5
    } else {
        pos / (len - 1) as f64
    }
}

#[inline]
fn fraction_to_axis(frac: f64, len: u32) -> f64 {
    if len <= 1 {
        0.0
    } else {
        frac * (len - 1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-10;

    fn default_bounds() -> Bounds {
        Bounds::new(Complex::new(-2.0, -1.5), Complex::new(1.0, 1.5)).unwrap()
    }

    #[test]
    fn corners_are_normalized() {
        let b = Bounds::new(Complex::new(1.0, 1.5), Complex::new(-2.0, -1.5)).unwrap();
        assert_eq!(b.p1(), Complex::new(-2.0, -1.5));
        assert_eq!(b.p2(), Complex::new(1.0, 1.5));
    }

    #[test]
    fn degenerate_bounds_rejected() {
        assert!(Bounds::new(Complex::new(0.0, 0.0), Complex::new(0.0, 1.0)).is_err());
        assert!(Bounds::new(Complex::new(0.0, 0.0), Complex::new(1.0, 0.0)).is_err());
        assert!(Bounds::new(Complex::new(f64::NAN, 0.0), Complex::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn invalid_screen_size() {
        assert!(ScreenSize::new(0, 10).is_err());
        assert!(ScreenSize::new(10, 0).is_err());
    }

    #[test]
    fn pixel_corners_hit_bounds() {
        let b = default_bounds();
        let s = ScreenSize::new(800, 600).unwrap();
        let tl = b.pixel_to_complex(s, 0, 0, false);
        assert!((tl.re + 2.0).abs() < EPSILON);
        assert!((tl.im + 1.5).abs() < EPSILON);
        let br = b.pixel_to_complex(s, 799, 599, false);
        assert!((br.re - 1.0).abs() < EPSILON);
        assert!((br.im - 1.5).abs() < EPSILON);
    }

    #[test]
    fn inverted_axis_starts_at_top() {
        let b = default_bounds();
        let s = ScreenSize::new(800, 600).unwrap();
        let tl = b.pixel_to_complex(s, 0, 0, true);
        assert!((tl.im - 1.5).abs() < EPSILON);
    }

    #[test]
    fn mapping_round_trips() {
        let b = default_bounds();
        let s = ScreenSize::new(97, 53).unwrap();
        for invert in [false, true] {
            for y in (0..53).step_by(7) {
                for x in (0..97).step_by(11) {
                    let z = b.pixel_to_complex(s, x, y, invert);
                    let (px, py) = b.complex_to_pixel(s, z, invert);
                    assert!((px - x as f64).abs() < 1e-6, "x {x} -> {px}");
                    assert!((py - y as f64).abs() < 1e-6, "y {y} -> {py}");
                }
            }
        }
    }

    #[test]
    fn single_pixel_axis_maps_to_center() {
        let b = default_bounds();
        let s = ScreenSize::new(1, 1).unwrap();
        let z = b.pixel_to_complex(s, 0, 0, false);
        assert!((z.re - b.center().re).abs() < EPSILON);
        assert!((z.im - b.center().im).abs() < EPSILON);
    }

    #[test]
    fn zoom_preserves_center() {
        let b = default_bounds();
        let z = b.zoomed(0.5).unwrap();
        assert!((z.width() - 1.5).abs() < EPSILON);
        assert!((z.center().re - b.center().re).abs() < EPSILON);
    }

    #[test]
    fn selection_covers_rectangle() {
        let b = default_bounds();
        let s = ScreenSize::new(301, 301).unwrap();
        let sel = b.select(s, (300, 300), (0, 0), false).unwrap();
        assert_eq!(sel, b);
    }
}
