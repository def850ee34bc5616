//! The core recoloring algorithm: classify background versus glyph pixels
//! and composite the glyph onto a dark gradient.
//!
//! The algorithm samples thin strips along the image border to estimate the
//! background color, checks that the border is homogeneous enough to trust
//! that estimate, finds the dominant non-background color in the interior,
//! strips the background to transparency, and draws the result over a dark
//! vertical gradient. When no confident split can be made it falls back to
//! a flat 10%-opacity black wash over the original image.
//!
//! Everything here is a deterministic pure function of the input pixels;
//! there is no cross-call state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::surface::{Paint, RectPx, Rgb, Surface, SurfaceFactory};

/// Default per-channel similarity tolerance, used when sampling the interior
/// for non-background colors.
pub const SIMILARITY_TOLERANCE: u8 = 32;

/// Relaxed tolerance used at the homogeneity check, background stripping,
/// and the foreground fold decision. Tuned behavior; the two constants are
/// load-bearing and intentionally different.
pub const RELAXED_TOLERANCE: u8 = 64;

/// Fraction of the shorter image dimension used as the border strip width.
const EDGE_FRACTION: f64 = 0.05;

/// How many of the most frequent edge colors take part in the homogeneity
/// check.
const TOP_CANDIDATES: usize = 5;

/// Top stop of the dark background gradient.
pub const GRADIENT_TOP: Rgb = Rgb { r: 49, g: 49, b: 49 };

/// Bottom stop of the dark background gradient.
pub const GRADIENT_BOTTOM: Rgb = Rgb { r: 20, g: 20, b: 20 };

/// Opacity of the black wash applied by the fallback path.
pub const FALLBACK_WASH_ALPHA: f32 = 0.1;

/// Width of the border strips sampled for background estimation.
fn edge_size(width: u32, height: u32) -> u32 {
    ((EDGE_FRACTION * width.min(height) as f64).floor() as u32).max(1)
}

// ============================================================================
// ColorHistogram
// ============================================================================

/// Occurrence counts of colors in a scanned region.
///
/// Alongside the count map it keeps the order in which colors were first
/// seen, because both consumers break count ties by scan order and that
/// tie-break must be deterministic (it decides which color becomes the
/// background or the glyph).
#[derive(Debug, Default)]
struct ColorHistogram {
    counts: HashMap<Rgb, u32>,
    order: Vec<Rgb>,
}

impl ColorHistogram {
    fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, color: Rgb) {
        let count = self.counts.entry(color).or_insert(0);
        if *count == 0 {
            self.order.push(color);
        }
        *count += 1;
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries sorted descending by count. The sort is stable over
    /// first-seen order, so among equal counts the earlier color ranks
    /// first.
    fn ranked(&self) -> Vec<(Rgb, u32)> {
        let mut entries: Vec<(Rgb, u32)> = self
            .order
            .iter()
            .map(|color| (*color, self.counts[color]))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }

    /// The last color (in first-seen order) attaining the maximum count.
    ///
    /// The incumbent survives only while its count is strictly greater than
    /// the challenger's, so a tie hands the win to the later color. This is
    /// deliberately different from the tie-break in [`ranked`](Self::ranked)
    /// and must stay that way.
    fn dominant(&self) -> Option<Rgb> {
        let mut best: Option<(Rgb, u32)> = None;
        for color in &self.order {
            let count = self.counts[color];
            match best {
                Some((_, best_count)) if best_count > count => {}
                _ => best = Some((*color, count)),
            }
        }
        best.map(|(color, _)| color)
    }
}

// ============================================================================
// RecolorReport
// ============================================================================

/// Which path the conversion took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "kebab-case")]
pub enum RecolorMode {
    /// The background was identified, stripped, and the glyph composited
    /// onto the dark gradient.
    Recolored,
    /// Classification was inconclusive; the flat wash was applied instead.
    Fallback,
}

/// Why the fallback path ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "kebab-case")]
pub enum FallbackReason {
    /// The input surface has a zero dimension.
    DegenerateSize,
    /// The border strips contain mutually dissimilar dominant colors.
    MixedEdgeColors,
    /// No interior pixel differs from the background color.
    NoForeground,
}

/// Diagnostic summary of a conversion.
///
/// Pure observability; the report never alters the algorithm. Serializes
/// to camelCase JSON for frontend consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct RecolorReport {
    /// Which path produced the output.
    pub mode: RecolorMode,

    /// Set when `mode` is [`RecolorMode::Fallback`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,

    /// The detected background color, when classification succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<Rgb>,

    /// The dominant foreground color, when classification succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground: Option<Rgb>,

    /// Whether the near-black/near-white glyph was folded toward the
    /// background hue.
    pub foreground_folded: bool,
}

impl RecolorReport {
    fn fallback(reason: FallbackReason) -> Self {
        Self {
            mode: RecolorMode::Fallback,
            fallback_reason: Some(reason),
            background: None,
            foreground: None,
            foreground_folded: false,
        }
    }

    fn recolored(background: Rgb, foreground: Rgb, folded: bool) -> Self {
        Self {
            mode: RecolorMode::Recolored,
            fallback_reason: None,
            background: Some(background),
            foreground: Some(foreground),
            foreground_folded: folded,
        }
    }

    /// Serializes the report to a JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serializes the report to a pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes a report from a JSON string.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// Recolorer
// ============================================================================

/// Converts a light icon surface into a dark variant.
///
/// Works against any [`Surface`] backend; the caller supplies the input
/// surface (already holding the decoded image) and a [`SurfaceFactory`]
/// for allocating the output. The input surface is mutated in place
/// (background stripped, glyph possibly folded) as a side effect of the
/// classification path; the returned surface is the composed result.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recolorer;

impl Recolorer {
    pub fn new() -> Self {
        Self
    }

    /// Recolors the icon on `surface`, returning a newly allocated output
    /// surface owned by the caller.
    pub fn recolor<F: SurfaceFactory>(
        &self,
        surface: &mut F::Surface,
        factory: &F,
    ) -> Result<F::Surface> {
        let (output, _) = self.recolor_with_report(surface, factory)?;
        Ok(output)
    }

    /// Like [`recolor`](Self::recolor), additionally returning a
    /// [`RecolorReport`] describing which path ran.
    pub fn recolor_with_report<F: SurfaceFactory>(
        &self,
        surface: &mut F::Surface,
        factory: &F,
    ) -> Result<(F::Surface, RecolorReport)> {
        let width = surface.width();
        let height = surface.height();

        if width == 0 || height == 0 {
            let output = self.fallback(surface, factory)?;
            return Ok((output, RecolorReport::fallback(FallbackReason::DegenerateSize)));
        }

        let edge = edge_size(width, height);

        // Border strips: left, right, top, bottom. They overlap at the
        // corners; the extra weight on corner colors is intentional.
        let strips = [
            RectPx::new(0, 0, edge, height),
            RectPx::new(width - edge, 0, edge, height),
            RectPx::new(0, 0, width, edge),
            RectPx::new(0, height - edge, width, edge),
        ];

        let mut edge_histogram = ColorHistogram::new();
        for strip in strips {
            for color in surface.read_pixels(strip)?.colors() {
                edge_histogram.add(color);
            }
        }

        let ranked = edge_histogram.ranked();
        let Some(&(background, _)) = ranked.first() else {
            // Unreachable once dimensions are >= 1, but a zero-size read
            // must not turn into a panic.
            let output = self.fallback(surface, factory)?;
            return Ok((output, RecolorReport::fallback(FallbackReason::DegenerateSize)));
        };

        // Homogeneity check: every runner-up among the top candidates must
        // be close to the winner, otherwise the border is not a clean
        // single background.
        let mixed = ranked
            .iter()
            .take(TOP_CANDIDATES)
            .skip(1)
            .any(|(color, _)| !color.is_similar(background, RELAXED_TOLERANCE));
        if mixed {
            let output = self.fallback(surface, factory)?;
            return Ok((output, RecolorReport::fallback(FallbackReason::MixedEdgeColors)));
        }

        // Interior sampling. Images smaller than two edge strips in either
        // dimension have no interior, which reads as "no foreground".
        let mut inner_histogram = ColorHistogram::new();
        if width > 2 * edge && height > 2 * edge {
            let inner = RectPx::new(edge, edge, width - 2 * edge, height - 2 * edge);
            for color in surface.read_pixels(inner)?.colors() {
                if !color.is_similar(background, SIMILARITY_TOLERANCE) {
                    inner_histogram.add(color);
                }
            }
        }

        let Some(foreground) = inner_histogram.dominant() else {
            let output = self.fallback(surface, factory)?;
            return Ok((output, RecolorReport::fallback(FallbackReason::NoForeground)));
        };

        // Strip the background: punch every background-like pixel to fully
        // transparent black.
        let mut pixels = surface.read_pixels(RectPx::from_size(width, height))?;
        for px in pixels.pixels_mut() {
            let color = Rgb::new(px[0], px[1], px[2]);
            if color.is_similar(background, RELAXED_TOLERANCE) {
                px.copy_from_slice(&[0, 0, 0, 0]);
            }
        }
        surface.write_pixels(&pixels, 0, 0)?;

        // Fold a near-black glyph (or a near-white glyph over a background
        // that isn't near-black) toward the background hue, so it doesn't
        // vanish against the dark gradient. This runs over the already
        // stripped buffer: punched pixels may get their RGB rewritten too,
        // but their alpha stays 0.
        let folded = foreground.is_similar(Rgb::BLACK, RELAXED_TOLERANCE)
            || (foreground.is_similar(Rgb::WHITE, RELAXED_TOLERANCE)
                && !background.is_similar(Rgb::BLACK, RELAXED_TOLERANCE));
        if folded {
            for px in pixels.pixels_mut() {
                let color = Rgb::new(px[0], px[1], px[2]);
                if color.is_similar(foreground, RELAXED_TOLERANCE) {
                    px[0] = background.r;
                    px[1] = background.g;
                    px[2] = background.b;
                }
            }
            surface.write_pixels(&pixels, 0, 0)?;
        }

        // Composite the glyph onto the dark gradient.
        let mut output = factory.create_surface(width, height)?;
        output.fill(&Paint::VerticalGradient {
            top: GRADIENT_TOP,
            bottom: GRADIENT_BOTTOM,
        })?;
        output.draw_over(surface)?;

        Ok((output, RecolorReport::recolored(background, foreground, folded)))
    }

    /// The crude transform used when classification is inconclusive: wash
    /// the original with 10%-opacity black in place, then copy it onto a
    /// fresh surface.
    fn fallback<F: SurfaceFactory>(
        &self,
        surface: &mut F::Surface,
        factory: &F,
    ) -> Result<F::Surface> {
        surface.fill(&Paint::Solid {
            color: Rgb::BLACK,
            alpha: FALLBACK_WASH_ALPHA,
        })?;
        let mut output = factory.create_surface(surface.width(), surface.height())?;
        output.draw_over(surface)?;
        Ok(output)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::raster::{RasterFactory, RasterSurface};

    fn solid_image(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    /// A `size` x `size` image with a solid background and a centered
    /// square glyph covering the middle third.
    fn glyph_image(size: u32, background: [u8; 4], glyph: [u8; 4]) -> RgbaImage {
        let mut img = solid_image(size, size, background);
        let lo = size / 3;
        let hi = 2 * size / 3;
        for y in lo..hi {
            for x in lo..hi {
                img.put_pixel(x, y, Rgba(glyph));
            }
        }
        img
    }

    fn run(img: RgbaImage) -> (RasterSurface, RecolorReport) {
        let mut surface = RasterSurface::from_image(img);
        Recolorer::new()
            .recolor_with_report(&mut surface, &RasterFactory)
            .expect("raster recolor cannot fail")
    }

    #[test]
    fn edge_size_clamps_to_one() {
        assert_eq!(edge_size(64, 64), 3);
        assert_eq!(edge_size(100, 40), 2);
        assert_eq!(edge_size(10, 10), 1);
        assert_eq!(edge_size(1, 1), 1);
    }

    #[test]
    fn histogram_ranked_ties_favor_first_seen() {
        let mut hist = ColorHistogram::new();
        let red = Rgb::new(255, 0, 0);
        let blue = Rgb::new(0, 0, 255);
        hist.add(red);
        hist.add(blue);
        hist.add(red);
        hist.add(blue);
        let ranked = hist.ranked();
        assert_eq!(ranked[0], (red, 2));
        assert_eq!(ranked[1], (blue, 2));
    }

    #[test]
    fn histogram_dominant_ties_favor_last_seen() {
        let mut hist = ColorHistogram::new();
        let red = Rgb::new(255, 0, 0);
        let green = Rgb::new(0, 255, 0);
        let blue = Rgb::new(0, 0, 255);
        hist.add(red);
        hist.add(red);
        hist.add(green);
        hist.add(blue);
        hist.add(blue);
        // red and blue both count 2; the later first-seen color wins.
        assert_eq!(hist.dominant(), Some(blue));
    }

    #[test]
    fn histogram_dominant_strict_winner() {
        let mut hist = ColorHistogram::new();
        let red = Rgb::new(255, 0, 0);
        let blue = Rgb::new(0, 0, 255);
        hist.add(red);
        hist.add(blue);
        hist.add(red);
        assert_eq!(hist.dominant(), Some(red));
        assert!(ColorHistogram::new().dominant().is_none());
    }

    #[test]
    fn white_background_red_glyph_recolors() {
        let img = glyph_image(64, [255, 255, 255, 255], [255, 0, 0, 255]);
        let (output, report) = run(img);

        assert_eq!(report.mode, RecolorMode::Recolored);
        assert_eq!(report.background, Some(Rgb::WHITE));
        assert_eq!(report.foreground, Some(Rgb::new(255, 0, 0)));
        assert!(!report.foreground_folded);

        let out = output.as_image();
        assert_eq!(out.width(), 64);
        assert_eq!(out.height(), 64);
        // Former white pixels show the gradient: exact top stop on the
        // first row, exact bottom stop on the last.
        assert_eq!(out.get_pixel(0, 0).0, [49, 49, 49, 255]);
        assert_eq!(out.get_pixel(0, 63).0, [20, 20, 20, 255]);
        // The glyph survives untouched.
        assert_eq!(out.get_pixel(32, 32).0, [255, 0, 0, 255]);
    }

    #[test]
    fn recolor_strips_background_on_input_surface() {
        let img = glyph_image(64, [255, 255, 255, 255], [255, 0, 0, 255]);
        let mut surface = RasterSurface::from_image(img);
        Recolorer::new()
            .recolor(&mut surface, &RasterFactory)
            .expect("raster recolor cannot fail");

        let stripped = surface.as_image();
        assert_eq!(stripped.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(stripped.get_pixel(32, 32).0, [255, 0, 0, 255]);
    }

    #[test]
    fn mixed_border_takes_fallback_wash() {
        // Alternating black/white columns: two mutually dissimilar
        // dominant edge colors.
        let mut img = RgbaImage::new(20, 20);
        for y in 0..20 {
            for x in 0..20 {
                let color = if x % 2 == 0 { [0, 0, 0, 255] } else { [255, 255, 255, 255] };
                img.put_pixel(x, y, Rgba(color));
            }
        }
        let (output, report) = run(img);

        assert_eq!(report.mode, RecolorMode::Fallback);
        assert_eq!(report.fallback_reason, Some(FallbackReason::MixedEdgeColors));

        let out = output.as_image();
        assert_eq!(out.width(), 20);
        assert_eq!(out.height(), 20);
        // White under a 0.1 black wash lands on 229; black stays black.
        // No transparency is introduced.
        assert_eq!(out.get_pixel(1, 0).0, [229, 229, 229, 255]);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn solid_image_takes_fallback_no_foreground() {
        let (output, report) = run(solid_image(32, 32, [200, 200, 200, 255]));

        assert_eq!(report.mode, RecolorMode::Fallback);
        assert_eq!(report.fallback_reason, Some(FallbackReason::NoForeground));

        // 200 * 0.9 rounds to 180.
        assert_eq!(output.as_image().get_pixel(16, 16).0, [180, 180, 180, 255]);
    }

    #[test]
    fn one_by_one_image_takes_fallback() {
        let (output, report) = run(solid_image(1, 1, [255, 255, 255, 255]));

        assert_eq!(report.mode, RecolorMode::Fallback);
        assert_eq!(report.fallback_reason, Some(FallbackReason::NoForeground));
        assert_eq!(output.as_image().dimensions(), (1, 1));
    }

    #[test]
    fn zero_size_image_takes_fallback() {
        let (output, report) = run(RgbaImage::new(0, 0));

        assert_eq!(report.fallback_reason, Some(FallbackReason::DegenerateSize));
        assert_eq!(output.as_image().dimensions(), (0, 0));
    }

    #[test]
    fn interior_similar_to_background_is_no_foreground() {
        // Interior differs from the border, but within the default
        // tolerance, so it never counts as foreground.
        let img = glyph_image(64, [200, 200, 200, 255], [220, 220, 220, 255]);
        let (_, report) = run(img);
        assert_eq!(report.fallback_reason, Some(FallbackReason::NoForeground));
    }

    #[test]
    fn near_black_glyph_folds_to_background_hue() {
        let img = glyph_image(64, [255, 255, 255, 255], [10, 10, 10, 255]);
        let (output, report) = run(img);

        assert_eq!(report.mode, RecolorMode::Recolored);
        assert!(report.foreground_folded);

        // The glyph was rewritten to the background hue before
        // compositing, so it shows as white on the gradient.
        let out = output.as_image();
        assert_eq!(out.get_pixel(32, 32).0, [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(0, 0).0, [49, 49, 49, 255]);
    }

    #[test]
    fn fold_rewrites_rgb_of_stripped_pixels_but_keeps_them_transparent() {
        // With a near-black glyph, punched background pixels (now RGB
        // 0,0,0) also match the glyph within the relaxed tolerance; their
        // RGB gets rewritten while alpha stays 0.
        let img = glyph_image(64, [255, 255, 255, 255], [10, 10, 10, 255]);
        let mut surface = RasterSurface::from_image(img);
        Recolorer::new()
            .recolor(&mut surface, &RasterFactory)
            .expect("raster recolor cannot fail");

        let stripped = surface.as_image();
        assert_eq!(stripped.get_pixel(0, 0).0, [255, 255, 255, 0]);
        assert_eq!(stripped.get_pixel(32, 32).0, [255, 255, 255, 255]);
    }

    #[test]
    fn near_white_glyph_folds_unless_background_is_near_black() {
        // Red-ish background, near-white glyph: the fold fires.
        let img = glyph_image(64, [200, 30, 30, 255], [250, 250, 250, 255]);
        let (output, report) = run(img);
        assert!(report.foreground_folded);
        assert_eq!(output.as_image().get_pixel(32, 32).0, [200, 30, 30, 255]);

        // Near-black background, near-white glyph: no fold.
        let img = glyph_image(64, [10, 10, 10, 255], [250, 250, 250, 255]);
        let (output, report) = run(img);
        assert!(!report.foreground_folded);
        assert_eq!(output.as_image().get_pixel(32, 32).0, [250, 250, 250, 255]);
    }

    #[test]
    fn determinism_byte_identical_outputs() {
        let img = glyph_image(48, [240, 240, 240, 255], [30, 90, 200, 255]);
        let (first, _) = run(img.clone());
        let (second, _) = run(img);
        assert_eq!(first.as_image().as_raw(), second.as_image().as_raw());
    }

    #[test]
    fn report_serializes_camel_case() {
        let report = RecolorReport::recolored(Rgb::WHITE, Rgb::new(255, 0, 0), false);
        let json = report.to_json().expect("report serializes");
        assert!(json.contains("\"mode\":\"recolored\""));
        assert!(json.contains("\"foregroundFolded\":false"));
        assert!(json.contains("\"background\""));

        let restored = RecolorReport::from_json(&json).expect("report deserializes");
        assert_eq!(restored, report);
    }

    #[test]
    fn fallback_report_serializes_reason() {
        let report = RecolorReport::fallback(FallbackReason::MixedEdgeColors);
        let json = report.to_json().expect("report serializes");
        assert!(json.contains("\"fallbackReason\":\"mixed-edge-colors\""));
        assert!(!json.contains("\"foreground\":"));
    }
}
