//! The capability interface between the recoloring algorithm and a host
//! graphics backend.
//!
//! The algorithm is written once against [`Surface`] and [`SurfaceFactory`];
//! each backend (raster buffers server-side, `<canvas>` elements in the
//! browser) provides an implementation. Surface operations return `Result`
//! because the browser backend can fail at the host-API boundary; the raster
//! backend never does.

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ============================================================================
// RectPx
// ============================================================================

/// A rectangle defined in pixel coordinates.
///
/// Used to specify read regions within a surface, such as the border strips
/// and interior region sampled during classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RectPx {
    /// X offset from the left edge of the surface
    pub x: u32,
    /// Y offset from the top edge of the surface
    pub y: u32,
    /// Width of the rectangle
    pub width: u32,
    /// Height of the rectangle
    pub height: u32,
}

impl RectPx {
    /// Creates a new rectangle with the given position and dimensions.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Creates a rectangle starting at origin (0, 0) with the given dimensions.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    /// Returns the right edge coordinate (x + width).
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Returns the bottom edge coordinate (y + height).
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

// ============================================================================
// Rgb
// ============================================================================

/// An RGB color with 8-bit channels. Alpha plays no part in classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pairwise similarity test: every channel's absolute difference must be
    /// strictly less than `tolerance`.
    ///
    /// Not transitive; only meaningful compared against a fixed reference
    /// color, never for clustering.
    pub fn is_similar(self, other: Rgb, tolerance: u8) -> bool {
        let diff = |a: u8, b: u8| (a as i16 - b as i16).abs() < tolerance as i16;
        diff(self.r, other.r) && diff(self.g, other.g) && diff(self.b, other.b)
    }
}

// ============================================================================
// PixelBuffer
// ============================================================================

/// A flat RGBA pixel buffer read from a rectangular region of a surface.
///
/// Samples are row-major with no padding, 4 bytes per pixel, so
/// `data.len() == 4 * width * height` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps raw RGBA bytes read from a `width` x `height` region.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != 4 * width * height`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            4 * width as usize * height as usize,
            "pixel buffer length must be 4 * width * height"
        );
        Self { width, height, data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns true if the buffer covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw RGBA bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Iterates over pixel colors in row-major order, discarding alpha.
    pub fn colors(&self) -> impl Iterator<Item = Rgb> + '_ {
        self.data
            .chunks_exact(4)
            .map(|px| Rgb::new(px[0], px[1], px[2]))
    }

    /// Iterates over mutable 4-byte RGBA pixel chunks in row-major order.
    pub fn pixels_mut(&mut self) -> impl Iterator<Item = &mut [u8]> {
        self.data.chunks_exact_mut(4)
    }
}

// ============================================================================
// Paint
// ============================================================================

/// Fill operations a surface must support.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Paint {
    /// A whole-surface solid fill composited source-over with the given
    /// opacity (0.0..=1.0). The fallback path uses black at 0.1.
    Solid { color: Rgb, alpha: f32 },

    /// A whole-surface top-to-bottom linear gradient with opaque stops.
    VerticalGradient { top: Rgb, bottom: Rgb },
}

// ============================================================================
// Surface & SurfaceFactory
// ============================================================================

/// An addressable raster with a 2d drawing context.
///
/// This is the collaborator contract the recoloring algorithm requires from
/// a host graphics layer: read and write RGBA regions, fill, and composite
/// one surface onto another source-over.
pub trait Surface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Reads the RGBA pixels of a rectangular region.
    ///
    /// Implementations clamp the region to the surface bounds; the returned
    /// buffer's dimensions reflect the clamped region.
    fn read_pixels(&self, region: RectPx) -> Result<PixelBuffer>;

    /// Writes an RGBA buffer back at the given offset, replacing the pixels
    /// it covers. Out-of-bounds pixels are discarded.
    fn write_pixels(&mut self, buffer: &PixelBuffer, x: u32, y: u32) -> Result<()>;

    /// Fills the entire surface with the given paint, composited source-over.
    fn fill(&mut self, paint: &Paint) -> Result<()>;

    /// Draws `source` onto this surface at the origin using source-over
    /// compositing.
    fn draw_over(&mut self, source: &Self) -> Result<()>;
}

/// Allocates new surfaces for a backend.
///
/// The recoloring algorithm never creates the input surface; it allocates
/// output surfaces only through a factory supplied by the caller.
pub trait SurfaceFactory {
    type Surface: Surface;

    fn create_surface(&self, width: u32, height: u32) -> Result<Self::Surface>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_px_new() {
        let rect = RectPx::new(10, 20, 100, 200);
        assert_eq!(rect.x, 10);
        assert_eq!(rect.y, 20);
        assert_eq!(rect.width, 100);
        assert_eq!(rect.height, 200);
        assert_eq!(rect.right(), 110);
        assert_eq!(rect.bottom(), 220);
    }

    #[test]
    fn similarity_is_strict() {
        let reference = Rgb::new(100, 100, 100);
        // Exactly at the tolerance is NOT similar (strict inequality).
        assert!(!Rgb::new(132, 100, 100).is_similar(reference, 32));
        assert!(Rgb::new(131, 100, 100).is_similar(reference, 32));
        // One channel out of range fails the whole test.
        assert!(!Rgb::new(101, 101, 200).is_similar(reference, 32));
    }

    #[test]
    fn similarity_is_not_transitive() {
        let a = Rgb::new(0, 0, 0);
        let b = Rgb::new(30, 30, 30);
        let c = Rgb::new(60, 60, 60);
        assert!(a.is_similar(b, 32));
        assert!(b.is_similar(c, 32));
        assert!(!a.is_similar(c, 32));
    }

    #[test]
    fn pixel_buffer_invariant() {
        let buf = PixelBuffer::from_raw(2, 2, vec![0; 16]);
        assert_eq!(buf.data().len(), 16);
        assert_eq!(buf.colors().count(), 4);
        assert!(!buf.is_empty());

        let empty = PixelBuffer::from_raw(0, 3, Vec::new());
        assert!(empty.is_empty());
        assert_eq!(empty.colors().count(), 0);
    }

    #[test]
    #[should_panic(expected = "pixel buffer length")]
    fn pixel_buffer_rejects_bad_length() {
        let _ = PixelBuffer::from_raw(2, 2, vec![0; 15]);
    }

    #[test]
    fn pixel_buffer_colors_discard_alpha() {
        let buf = PixelBuffer::from_raw(1, 2, vec![255, 0, 0, 255, 0, 255, 0, 0]);
        let colors: Vec<Rgb> = buf.colors().collect();
        assert_eq!(colors, vec![Rgb::new(255, 0, 0), Rgb::new(0, 255, 0)]);
    }
}
