//! dark-icon: convert light icons into dark-mode variants
//!
//! This crate inspects an icon's pixels, infers which of them form the
//! background versus the foreground glyph, strips the background to
//! transparency, and composites the glyph onto a dark vertical gradient.
//! Icons too ambiguous to classify get a flat 10%-opacity black wash
//! instead.
//!
//! The algorithm is written once against the [`Surface`] capability trait;
//! a raster backend over [`image::RgbaImage`] is always available, and a
//! browser `<canvas>` backend is behind the `canvas` feature.
//!
//! # Example
//!
//! Byte-level conversion (decode, recolor, PNG-encode):
//!
//! ```no_run
//! let bytes = std::fs::read("icon.png").unwrap();
//! let dark = dark_icon::convert_dark_icon(&bytes).unwrap();
//! std::fs::write("icon-dark.png", dark).unwrap();
//! ```
//!
//! Working with surfaces directly:
//!
//! ```
//! use dark_icon::{RasterFactory, RasterSurface, Recolorer, Surface};
//! use image::{Rgba, RgbaImage};
//!
//! let mut icon = RgbaImage::from_pixel(64, 64, Rgba([255, 255, 255, 255]));
//! for y in 24..40 {
//!     for x in 24..40 {
//!         icon.put_pixel(x, y, Rgba([200, 30, 30, 255]));
//!     }
//! }
//!
//! let mut surface = RasterSurface::from_image(icon);
//! let dark = Recolorer::new().recolor(&mut surface, &RasterFactory).unwrap();
//! assert_eq!(dark.width(), 64);
//! ```

mod error;
mod raster;
mod recolor;
mod surface;

#[cfg(feature = "canvas")]
mod canvas;

#[cfg(feature = "canvas")]
pub use canvas::{CanvasConverter, CanvasSurface, DomCanvasFactory};
pub use error::{ConvertError, Result};
pub use raster::{
    RasterFactory, RasterSurface, convert_dark_icon, convert_dark_icon_base64,
    convert_dark_icon_with_report,
};
pub use recolor::{
    FallbackReason, RELAXED_TOLERANCE, RecolorMode, RecolorReport, Recolorer,
    SIMILARITY_TOLERANCE,
};
pub use surface::{Paint, PixelBuffer, RectPx, Rgb, Surface, SurfaceFactory};
