//! Error types for icon conversion.

use thiserror::Error;

/// Errors that can occur while converting an icon.
///
/// The recoloring algorithm itself never fails: an image whose structure is
/// too ambiguous to classify takes the fallback path instead of returning an
/// error. These variants cover the host boundaries around it: decoding and
/// encoding image bytes, acquiring a drawing context, and (in the browser)
/// loading sources and exporting blobs.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The host graphics layer could not produce a 2d drawing context.
    #[error("could not acquire drawing context: {0}")]
    Context(String),

    /// The input bytes could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(image::ImageError),

    /// The output image could not be encoded as PNG.
    #[error("failed to encode PNG: {0}")]
    Encode(image::ImageError),

    /// The input string was not valid base64.
    #[error("invalid base64 input: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A browser image source failed to load or decode.
    #[error("failed to load image: {0}")]
    ImageLoad(String),

    /// The browser canvas yielded no blob on export.
    #[error("failed to export blob: {0}")]
    BlobExport(String),

    /// JSON serialization error (conversion reports).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (CLI file handling).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConvertError>;
