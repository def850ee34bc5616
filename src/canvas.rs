//! HTML canvas backend for WASM environments.
//!
//! Implements [`Surface`] over `<canvas>` elements and exposes the
//! conversion to JavaScript via wasm-bindgen.
//!
//! # Feature Flag
//!
//! This module is only available with the `canvas` feature enabled:
//!
//! ```toml
//! [dependencies]
//! dark-icon = { version = "0.1", features = ["canvas"] }
//! ```
//!
//! # Example (JavaScript/TypeScript)
//!
//! ```javascript
//! import init, { convertDarkIcon } from 'dark-icon';
//!
//! await init();
//!
//! // Accepts a URL string, Blob, File, ImageBitmap, or <img> element.
//! const blob = await convertDarkIcon(file);
//! imgElement.src = URL.createObjectURL(blob);
//! ```

use wasm_bindgen::prelude::*;
use wasm_bindgen::{Clamped, JsCast};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Blob, CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlImageElement, ImageBitmap,
    ImageData, Url,
};

use crate::error::{ConvertError, Result};
use crate::recolor::{RecolorReport, Recolorer};
use crate::surface::{Paint, PixelBuffer, RectPx, Surface, SurfaceFactory};

fn js_detail(value: JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"))
}

// ============================================================================
// CanvasSurface
// ============================================================================

/// A surface backed by an HTML `<canvas>` element and its 2d context.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
}

impl CanvasSurface {
    /// Wraps an existing canvas element, acquiring its 2d context.
    ///
    /// Context acquisition failure is fatal and surfaces as
    /// [`ConvertError::Context`].
    pub fn from_canvas(canvas: HtmlCanvasElement) -> Result<Self> {
        let context = canvas
            .get_context("2d")
            .map_err(|e| ConvertError::Context(js_detail(e)))?
            .ok_or_else(|| ConvertError::Context("canvas 2d context is null".into()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| ConvertError::Context("not a CanvasRenderingContext2d".into()))?;
        Ok(Self { canvas, context })
    }

    /// The wrapped canvas element.
    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    /// The canvas's 2d drawing context.
    pub fn context(&self) -> &CanvasRenderingContext2d {
        &self.context
    }

    /// Consumes the surface, returning the canvas element.
    pub fn into_canvas(self) -> HtmlCanvasElement {
        self.canvas
    }

    /// Exports the canvas content as a PNG [`Blob`].
    ///
    /// A null blob from the host is reported as
    /// [`ConvertError::BlobExport`], never as a silent empty result.
    pub async fn to_blob(&self) -> Result<Blob> {
        let canvas = self.canvas.clone();
        let promise = js_sys::Promise::new(&mut |resolve, reject| {
            let reject_on_error = reject.clone();
            let callback = Closure::once_into_js(move |blob: JsValue| {
                if blob.is_null() || blob.is_undefined() {
                    let _ = reject.call1(
                        &JsValue::NULL,
                        &JsValue::from_str("canvas yielded no blob"),
                    );
                } else {
                    let _ = resolve.call1(&JsValue::NULL, &blob);
                }
            });
            if let Err(err) = canvas.to_blob_with_type(callback.unchecked_ref(), "image/png") {
                let _ = reject_on_error.call1(&JsValue::NULL, &err);
            }
        });

        let value = JsFuture::from(promise)
            .await
            .map_err(|e| ConvertError::BlobExport(js_detail(e)))?;
        value
            .dyn_into::<Blob>()
            .map_err(|_| ConvertError::BlobExport("export did not produce a Blob".into()))
    }
}

impl Surface for CanvasSurface {
    fn width(&self) -> u32 {
        self.canvas.width()
    }

    fn height(&self) -> u32 {
        self.canvas.height()
    }

    fn read_pixels(&self, region: RectPx) -> Result<PixelBuffer> {
        let x0 = region.x.min(self.width());
        let y0 = region.y.min(self.height());
        let x1 = region.right().min(self.width()).max(x0);
        let y1 = region.bottom().min(self.height()).max(y0);

        let width = x1 - x0;
        let height = y1 - y0;
        if width == 0 || height == 0 {
            // getImageData throws on empty rectangles.
            return Ok(PixelBuffer::from_raw(width, height, Vec::new()));
        }

        let image_data = self
            .context
            .get_image_data(x0 as f64, y0 as f64, width as f64, height as f64)
            .map_err(|e| ConvertError::Context(js_detail(e)))?;
        Ok(PixelBuffer::from_raw(width, height, image_data.data().0))
    }

    fn write_pixels(&mut self, buffer: &PixelBuffer, x: u32, y: u32) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        let image_data = ImageData::new_with_u8_clamped_array_and_sh(
            Clamped(buffer.data()),
            buffer.width(),
            buffer.height(),
        )
        .map_err(|e| ConvertError::Context(js_detail(e)))?;
        self.context
            .put_image_data(&image_data, x as f64, y as f64)
            .map_err(|e| ConvertError::Context(js_detail(e)))
    }

    fn fill(&mut self, paint: &Paint) -> Result<()> {
        self.context
            .set_global_composite_operation("source-over")
            .map_err(|e| ConvertError::Context(js_detail(e)))?;

        match *paint {
            Paint::Solid { color, alpha } => {
                self.context.set_fill_style_str(&format!(
                    "rgba({}, {}, {}, {})",
                    color.r, color.g, color.b, alpha
                ));
            }
            Paint::VerticalGradient { top, bottom } => {
                let gradient = self.context.create_linear_gradient(
                    0.0,
                    0.0,
                    0.0,
                    self.height() as f64,
                );
                gradient
                    .add_color_stop(0.0, &format!("rgb({}, {}, {})", top.r, top.g, top.b))
                    .map_err(|e| ConvertError::Context(js_detail(e)))?;
                gradient
                    .add_color_stop(
                        1.0,
                        &format!("rgb({}, {}, {})", bottom.r, bottom.g, bottom.b),
                    )
                    .map_err(|e| ConvertError::Context(js_detail(e)))?;
                self.context.set_fill_style_canvas_gradient(&gradient);
            }
        }

        self.context
            .fill_rect(0.0, 0.0, self.width() as f64, self.height() as f64);
        Ok(())
    }

    fn draw_over(&mut self, source: &Self) -> Result<()> {
        self.context
            .set_global_composite_operation("source-over")
            .map_err(|e| ConvertError::Context(js_detail(e)))?;
        self.context
            .draw_image_with_html_canvas_element(&source.canvas, 0.0, 0.0)
            .map_err(|e| ConvertError::Context(js_detail(e)))
    }
}

// ============================================================================
// DomCanvasFactory
// ============================================================================

/// Allocates `<canvas>` elements through the global document.
pub struct DomCanvasFactory {
    document: Document,
}

impl DomCanvasFactory {
    pub fn new() -> Result<Self> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| ConvertError::Context("no global document".into()))?;
        Ok(Self { document })
    }
}

impl SurfaceFactory for DomCanvasFactory {
    type Surface = CanvasSurface;

    fn create_surface(&self, width: u32, height: u32) -> Result<Self::Surface> {
        let canvas = self
            .document
            .create_element("canvas")
            .map_err(|e| ConvertError::Context(js_detail(e)))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| ConvertError::Context("created element is not a canvas".into()))?;
        canvas.set_width(width);
        canvas.set_height(height);
        CanvasSurface::from_canvas(canvas)
    }
}

// ============================================================================
// Source loading
// ============================================================================

/// A temporary object URL, revoked on drop so cleanup happens on both
/// success and failure paths.
struct ObjectUrl(String);

impl ObjectUrl {
    fn for_blob(blob: &Blob) -> Result<Self> {
        Url::create_object_url_with_blob(blob)
            .map(Self)
            .map_err(|e| ConvertError::ImageLoad(js_detail(e)))
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        let _ = Url::revoke_object_url(&self.0);
    }
}

/// A decoded image source ready to draw onto a canvas.
enum LoadedSource {
    Bitmap(ImageBitmap),
    Image {
        element: HtmlImageElement,
        // Held until the source is drawn; revoked on drop.
        _url: Option<ObjectUrl>,
    },
}

impl LoadedSource {
    fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Bitmap(bitmap) => (bitmap.width(), bitmap.height()),
            Self::Image { element, .. } => (element.natural_width(), element.natural_height()),
        }
    }

    fn draw_onto(&self, context: &CanvasRenderingContext2d) -> Result<()> {
        match self {
            Self::Bitmap(bitmap) => context
                .draw_image_with_image_bitmap(bitmap, 0.0, 0.0)
                .map_err(|e| ConvertError::Context(js_detail(e))),
            Self::Image { element, .. } => context
                .draw_image_with_html_image_element(element, 0.0, 0.0)
                .map_err(|e| ConvertError::Context(js_detail(e))),
        }
    }
}

async fn await_image(element: &HtmlImageElement) -> Result<()> {
    if element.complete() && element.natural_width() != 0 {
        return Ok(());
    }
    JsFuture::from(element.decode())
        .await
        .map(|_| ())
        .map_err(|e| ConvertError::ImageLoad(js_detail(e)))
}

/// Normalizes the accepted browser inputs (URL string, `Blob`, `File`,
/// `ImageBitmap`, `<img>` element) into a drawable source.
async fn load_source(source: JsValue) -> Result<LoadedSource> {
    if let Some(bitmap) = source.dyn_ref::<ImageBitmap>() {
        return Ok(LoadedSource::Bitmap(bitmap.clone()));
    }

    if let Some(element) = source.dyn_ref::<HtmlImageElement>() {
        let element = element.clone();
        await_image(&element).await?;
        return Ok(LoadedSource::Image { element, _url: None });
    }

    // File is a Blob, so both go through a temporary object URL.
    let (url, guard) = if let Some(blob) = source.dyn_ref::<Blob>() {
        let guard = ObjectUrl::for_blob(blob)?;
        (guard.0.clone(), Some(guard))
    } else if let Some(url) = source.as_string() {
        (url, None)
    } else {
        return Err(ConvertError::ImageLoad(
            "unsupported image source; expected URL, Blob, File, ImageBitmap, or <img>".into(),
        ));
    };

    let element =
        HtmlImageElement::new().map_err(|e| ConvertError::ImageLoad(js_detail(e)))?;
    element.set_cross_origin(Some("anonymous"));
    element.set_src(&url);
    // On failure the guard drops here and the object URL is revoked
    // before the error propagates.
    await_image(&element).await?;

    Ok(LoadedSource::Image { element, _url: guard })
}

// ============================================================================
// wasm-bindgen API
// ============================================================================

/// Converts a light icon to a dark icon in a browser environment.
///
/// Accepts a URL string, `Blob`, `File`, `ImageBitmap`, or an `<img>`
/// element, and resolves to a PNG `Blob`.
#[wasm_bindgen(js_name = "convertDarkIcon")]
pub async fn convert_dark_icon_browser(source: JsValue) -> std::result::Result<Blob, JsError> {
    let loaded = load_source(source).await?;
    let (width, height) = loaded.dimensions();

    let factory = DomCanvasFactory::new()?;
    let mut surface = factory.create_surface(width, height)?;
    loaded.draw_onto(surface.context())?;

    let output = Recolorer::new().recolor(&mut surface, &factory)?;
    Ok(output.to_blob().await?)
}

/// Synchronous canvas-to-canvas conversion with report access.
///
/// For callers that already hold a drawn `<canvas>` and want to stay on
/// the canvas API rather than go through blobs.
#[wasm_bindgen]
#[derive(Default)]
pub struct CanvasConverter {
    recolorer: Recolorer,
    last_report: Option<RecolorReport>,
}

#[wasm_bindgen]
impl CanvasConverter {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recolors the image on `canvas`, returning a new canvas element with
    /// the result. The input canvas is mutated in place by the
    /// classification path.
    #[wasm_bindgen(js_name = "convertCanvas")]
    pub fn convert_canvas(
        &mut self,
        canvas: &HtmlCanvasElement,
    ) -> std::result::Result<HtmlCanvasElement, JsError> {
        let factory = DomCanvasFactory::new()?;
        let mut surface = CanvasSurface::from_canvas(canvas.clone())?;
        let (output, report) = self
            .recolorer
            .recolor_with_report(&mut surface, &factory)?;
        self.last_report = Some(report);
        Ok(output.into_canvas())
    }

    /// The report from the most recent conversion, or `null` if none has
    /// run yet.
    #[wasm_bindgen(js_name = "lastReport")]
    pub fn last_report(&self) -> std::result::Result<JsValue, JsError> {
        match &self.last_report {
            Some(report) => serde_wasm_bindgen::to_value(report)
                .map_err(|e| JsError::new(&format!("failed to serialize report: {e}"))),
            None => Ok(JsValue::NULL),
        }
    }
}
