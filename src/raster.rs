//! Raster surface backend over [`image::RgbaImage`], plus the byte-level
//! conversion entry points.
//!
//! This backend runs anywhere (servers, tests, the CLI) with no host
//! graphics layer: compositing and gradient fills are implemented directly
//! on the pixel buffer. None of its surface operations can fail.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::{ConvertError, Result};
use crate::recolor::{RecolorReport, Recolorer};
use crate::surface::{Paint, PixelBuffer, RectPx, Rgb, Surface, SurfaceFactory};

// ============================================================================
// RasterSurface
// ============================================================================

/// A surface backed by an in-memory RGBA image.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    /// Creates a fully transparent surface of the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    /// Wraps an existing image as a surface.
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Borrows the underlying image.
    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Consumes the surface, returning the underlying image.
    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl Surface for RasterSurface {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn read_pixels(&self, region: RectPx) -> Result<PixelBuffer> {
        let x0 = region.x.min(self.width());
        let y0 = region.y.min(self.height());
        let x1 = region.right().min(self.width()).max(x0);
        let y1 = region.bottom().min(self.height()).max(y0);

        let width = x1 - x0;
        let height = y1 - y0;
        let mut data = Vec::with_capacity(4 * width as usize * height as usize);
        for y in y0..y1 {
            for x in x0..x1 {
                data.extend_from_slice(&self.image.get_pixel(x, y).0);
            }
        }
        Ok(PixelBuffer::from_raw(width, height, data))
    }

    fn write_pixels(&mut self, buffer: &PixelBuffer, x: u32, y: u32) -> Result<()> {
        for (row, chunk) in buffer
            .data()
            .chunks_exact(4 * buffer.width().max(1) as usize)
            .enumerate()
        {
            let dy = y + row as u32;
            if dy >= self.height() {
                break;
            }
            for (col, px) in chunk.chunks_exact(4).enumerate() {
                let dx = x + col as u32;
                if dx >= self.width() {
                    break;
                }
                self.image
                    .put_pixel(dx, dy, Rgba([px[0], px[1], px[2], px[3]]));
            }
        }
        Ok(())
    }

    fn fill(&mut self, paint: &Paint) -> Result<()> {
        match *paint {
            Paint::Solid { color, alpha } => {
                for px in self.image.pixels_mut() {
                    *px = blend_solid(color, alpha, *px);
                }
            }
            Paint::VerticalGradient { top, bottom } => {
                let (width, height) = self.image.dimensions();
                for y in 0..height {
                    let t = if height <= 1 {
                        0.0
                    } else {
                        y as f32 / (height - 1) as f32
                    };
                    let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
                    let row = Rgba([
                        lerp(top.r, bottom.r),
                        lerp(top.g, bottom.g),
                        lerp(top.b, bottom.b),
                        255,
                    ]);
                    for x in 0..width {
                        self.image.put_pixel(x, y, row);
                    }
                }
            }
        }
        Ok(())
    }

    fn draw_over(&mut self, source: &Self) -> Result<()> {
        let width = self.width().min(source.width());
        let height = self.height().min(source.height());
        for y in 0..height {
            for x in 0..width {
                let src = *source.image.get_pixel(x, y);
                let dst = *self.image.get_pixel(x, y);
                self.image.put_pixel(x, y, alpha_blend(src, dst));
            }
        }
        Ok(())
    }
}

/// Alpha blends two RGBA pixels (source over destination).
fn alpha_blend(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;

    let out_a = sa + da * (1.0 - sa);

    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |s: u8, d: u8| -> u8 {
        let sf = s as f32 / 255.0;
        let df = d as f32 / 255.0;
        let out = (sf * sa + df * da * (1.0 - sa)) / out_a;
        (out * 255.0).round() as u8
    };

    Rgba([
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}

/// Blends a solid color with fractional opacity over a destination pixel.
fn blend_solid(color: Rgb, sa: f32, dst: Rgba<u8>) -> Rgba<u8> {
    let da = dst[3] as f32 / 255.0;

    let out_a = sa + da * (1.0 - sa);

    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |s: u8, d: u8| -> u8 {
        let sf = s as f32 / 255.0;
        let df = d as f32 / 255.0;
        let out = (sf * sa + df * da * (1.0 - sa)) / out_a;
        (out * 255.0).round() as u8
    };

    Rgba([
        blend(color.r, dst[0]),
        blend(color.g, dst[1]),
        blend(color.b, dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}

// ============================================================================
// RasterFactory
// ============================================================================

/// Allocates transparent [`RasterSurface`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterFactory;

impl SurfaceFactory for RasterFactory {
    type Surface = RasterSurface;

    fn create_surface(&self, width: u32, height: u32) -> Result<Self::Surface> {
        Ok(RasterSurface::new(width, height))
    }
}

// ============================================================================
// Conversion entry points
// ============================================================================

/// Converts a light icon to a dark icon.
///
/// Decodes `bytes` with the host image decoder, recolors, and returns the
/// result as PNG bytes.
///
/// # Example
///
/// ```no_run
/// let bytes = std::fs::read("icon.png").unwrap();
/// let dark = dark_icon::convert_dark_icon(&bytes).unwrap();
/// std::fs::write("icon-dark.png", dark).unwrap();
/// ```
pub fn convert_dark_icon(bytes: &[u8]) -> Result<Vec<u8>> {
    let (png, _) = convert_dark_icon_with_report(bytes)?;
    Ok(png)
}

/// Converts a base64-encoded light icon to a dark icon.
pub fn convert_dark_icon_base64(encoded: &str) -> Result<Vec<u8>> {
    let bytes = STANDARD.decode(encoded)?;
    convert_dark_icon(&bytes)
}

/// Like [`convert_dark_icon`], additionally returning a [`RecolorReport`]
/// describing which path the conversion took.
pub fn convert_dark_icon_with_report(bytes: &[u8]) -> Result<(Vec<u8>, RecolorReport)> {
    let image = image::load_from_memory(bytes)
        .map_err(ConvertError::Decode)?
        .to_rgba8();
    let mut surface = RasterSurface::from_image(image);

    let (output, report) = Recolorer::new().recolor_with_report(&mut surface, &RasterFactory)?;

    Ok((encode_png(output.as_image())?, report))
}

/// Encodes an RGBA image as PNG bytes.
fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(ConvertError::Encode)?;
    Ok(bytes)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recolor::RecolorMode;

    fn white_red_icon(size: u32) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(size, size, Rgba([255, 255, 255, 255]));
        let lo = size / 4;
        let hi = 3 * size / 4;
        for y in lo..hi {
            for x in lo..hi {
                img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }
        img
    }

    #[test]
    fn gradient_fill_hits_exact_stops() {
        let mut surface = RasterSurface::new(4, 8);
        surface
            .fill(&Paint::VerticalGradient {
                top: Rgb::new(49, 49, 49),
                bottom: Rgb::new(20, 20, 20),
            })
            .unwrap();

        let img = surface.as_image();
        assert_eq!(img.get_pixel(0, 0).0, [49, 49, 49, 255]);
        assert_eq!(img.get_pixel(3, 7).0, [20, 20, 20, 255]);
        // Interior rows are strictly between the stops.
        let mid = img.get_pixel(0, 4).0;
        assert!(mid[0] < 49 && mid[0] > 20);
    }

    #[test]
    fn gradient_fill_single_row_uses_top_stop() {
        let mut surface = RasterSurface::new(3, 1);
        surface
            .fill(&Paint::VerticalGradient {
                top: Rgb::new(49, 49, 49),
                bottom: Rgb::new(20, 20, 20),
            })
            .unwrap();
        assert_eq!(surface.as_image().get_pixel(1, 0).0, [49, 49, 49, 255]);
    }

    #[test]
    fn solid_wash_darkens_opaque_pixels() {
        let mut surface =
            RasterSurface::from_image(RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255])));
        surface
            .fill(&Paint::Solid {
                color: Rgb::BLACK,
                alpha: 0.1,
            })
            .unwrap();
        assert_eq!(surface.as_image().get_pixel(0, 0).0, [229, 229, 229, 255]);
    }

    #[test]
    fn solid_wash_over_transparent_keeps_wash_alpha() {
        let mut surface = RasterSurface::new(1, 1);
        surface
            .fill(&Paint::Solid {
                color: Rgb::BLACK,
                alpha: 0.1,
            })
            .unwrap();
        // 0.1 of full alpha rounds to 26.
        assert_eq!(surface.as_image().get_pixel(0, 0).0, [0, 0, 0, 26]);
    }

    #[test]
    fn draw_over_respects_source_alpha() {
        let mut dest =
            RasterSurface::from_image(RgbaImage::from_pixel(2, 1, Rgba([10, 20, 30, 255])));
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([200, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        let src = RasterSurface::from_image(img);

        dest.draw_over(&src).unwrap();
        // Opaque source replaces; transparent source preserves.
        assert_eq!(dest.as_image().get_pixel(0, 0).0, [200, 0, 0, 255]);
        assert_eq!(dest.as_image().get_pixel(1, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn read_pixels_clamps_to_bounds() {
        let surface =
            RasterSurface::from_image(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])));
        let buffer = surface.read_pixels(RectPx::new(2, 2, 10, 10)).unwrap();
        assert_eq!(buffer.width(), 2);
        assert_eq!(buffer.height(), 2);

        let outside = surface.read_pixels(RectPx::new(8, 8, 2, 2)).unwrap();
        assert!(outside.is_empty());
    }

    #[test]
    fn write_pixels_discards_out_of_bounds() {
        let mut surface = RasterSurface::new(2, 2);
        let buffer = PixelBuffer::from_raw(2, 2, vec![9; 16]);
        surface.write_pixels(&buffer, 1, 1).unwrap();
        assert_eq!(surface.as_image().get_pixel(1, 1).0, [9, 9, 9, 9]);
        assert_eq!(surface.as_image().get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn convert_dark_icon_round_trip() {
        let bytes = encode_png(&white_red_icon(64)).unwrap();
        let dark = convert_dark_icon(&bytes).unwrap();

        let out = image::load_from_memory(&dark).unwrap().to_rgba8();
        assert_eq!(out.dimensions(), (64, 64));
        // Former white shows the gradient; the red square is intact.
        assert_eq!(out.get_pixel(0, 0).0, [49, 49, 49, 255]);
        assert_eq!(out.get_pixel(0, 63).0, [20, 20, 20, 255]);
        assert_eq!(out.get_pixel(32, 32).0, [255, 0, 0, 255]);
    }

    #[test]
    fn convert_dark_icon_base64_matches_bytes() {
        let bytes = encode_png(&white_red_icon(32)).unwrap();
        let from_bytes = convert_dark_icon(&bytes).unwrap();
        let from_base64 = convert_dark_icon_base64(&STANDARD.encode(&bytes)).unwrap();
        assert_eq!(from_bytes, from_base64);
    }

    #[test]
    fn convert_dark_icon_reports_path() {
        let bytes = encode_png(&white_red_icon(64)).unwrap();
        let (_, report) = convert_dark_icon_with_report(&bytes).unwrap();
        assert_eq!(report.mode, RecolorMode::Recolored);
        assert_eq!(report.background, Some(Rgb::WHITE));
    }

    #[test]
    fn convert_dark_icon_rejects_garbage() {
        assert!(matches!(
            convert_dark_icon(b"not a png"),
            Err(ConvertError::Decode(_))
        ));
        assert!(matches!(
            convert_dark_icon_base64("!!!"),
            Err(ConvertError::Base64(_))
        ));
    }
}
