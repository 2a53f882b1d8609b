//! Turns what the shell hands us (a picked file or a raw camera frame) into
//! a [`CapturedImage`] data URL.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::capabilities::{CameraError, PixelFormat, SelectedFile, VideoFrame};
use crate::model::{CapturedImage, SourceFile};
use crate::{AppError, ErrorKind, MAX_UPLOAD_BYTES};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImageSourceError {
    #[error("no file selected")]
    NoFile,

    #[error("file '{name}' is empty")]
    EmptyFile { name: String },

    #[error("file '{name}' is {size} bytes, exceeds maximum of {max}")]
    TooLarge { name: String, size: usize, max: usize },

    #[error("file '{name}' has non-image type '{mime_type}'")]
    NotAnImage { name: String, mime_type: String },

    #[error("file '{name}' has no type and unrecognised content")]
    UnknownContent { name: String },

    #[error("frame rejected: {0}")]
    Frame(#[from] CameraError),

    #[error("jpeg encoding failed: width={width}, height={height}, reason={reason}")]
    JpegEncode {
        width: u32,
        height: u32,
        reason: String,
    },
}

impl From<ImageSourceError> for AppError {
    fn from(e: ImageSourceError) -> Self {
        match e {
            ImageSourceError::Frame(_) | ImageSourceError::JpegEncode { .. } => AppError::new(
                ErrorKind::DeviceAccess,
                "Could not capture an image from the webcam.",
            )
            .with_internal(e.to_string()),
            ImageSourceError::TooLarge { .. } => AppError::new(
                ErrorKind::InvalidInput,
                "The image is too large. Please choose a file under 20 MB.",
            )
            .with_internal(e.to_string()),
            _ => AppError::new(ErrorKind::InvalidInput, "Please choose a valid image file.")
                .with_internal(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
    Heic,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Heic => "image/heic",
        }
    }

    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }

        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(ImageFormat::Png);
        }

        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::WebP);
        }

        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(ImageFormat::Gif);
        }

        if &data[4..8] == b"ftyp" {
            let brand = &data[8..12];
            if brand == b"heic" || brand == b"heix" || brand == b"mif1" {
                return Some(ImageFormat::Heic);
            }
        }

        None
    }
}

/// The parts of a `data:` URL the analysis request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUrl<'a> {
    /// `type/subtype` from the prefix, if it has one.
    pub mime_type: Option<&'a str>,
    /// Everything after the first comma.
    pub payload: &'a str,
    pub is_base64: bool,
}

impl<'a> DataUrl<'a> {
    /// Lenient: a string without a comma yields an empty payload rather than
    /// an error, and an odd prefix just means no MIME type.
    pub fn parse(src: &'a str) -> Self {
        let (prefix, payload) = src.split_once(',').unwrap_or((src, ""));
        let header = prefix.strip_prefix("data:");

        let mime_type = header
            .map(|h| h.split(';').next().unwrap_or_default())
            .filter(|m| is_mime_token(m));
        let is_base64 = header.is_some_and(|h| h.split(';').skip(1).any(|p| p == "base64"));

        Self {
            mime_type,
            payload,
            is_base64,
        }
    }
}

fn is_mime_token(value: &str) -> bool {
    let Some((kind, subtype)) = value.split_once('/') else {
        return false;
    };
    !kind.is_empty()
        && !subtype.is_empty()
        && kind.chars().all(|c| c.is_ascii_alphanumeric())
        && subtype
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '+'))
}

pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// Validates a picked file and wraps it as a data URL.
///
/// A declared MIME type must start with `image/`; without one the content
/// is sniffed and must be a known image format.
#[instrument(skip_all, fields(name = %file.name, size = file.bytes.len()))]
pub fn captured_from_upload(file: SelectedFile) -> Result<CapturedImage, ImageSourceError> {
    if file.bytes.is_empty() {
        return Err(ImageSourceError::EmptyFile { name: file.name });
    }

    if file.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ImageSourceError::TooLarge {
            name: file.name,
            size: file.bytes.len(),
            max: MAX_UPLOAD_BYTES,
        });
    }

    let declared = file
        .mime_type
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    let mime_type = match declared {
        Some(mime) if mime.to_ascii_lowercase().starts_with("image/") => mime,
        Some(mime) => {
            return Err(ImageSourceError::NotAnImage {
                name: file.name,
                mime_type: mime,
            })
        }
        None => match ImageFormat::from_magic_bytes(&file.bytes) {
            Some(format) => {
                debug!(format = format.mime_type(), "sniffed untyped upload");
                format.mime_type().to_string()
            }
            None => return Err(ImageSourceError::UnknownContent { name: file.name }),
        },
    };

    let src = encode_data_url(&mime_type, &file.bytes);
    Ok(CapturedImage {
        src,
        source_file: Some(SourceFile {
            name: file.name,
            mime_type: Some(mime_type),
            size_bytes: file.bytes.len() as u64,
        }),
    })
}

/// Encodes a raw camera frame as JPEG at its native resolution.
#[instrument(skip_all, fields(width = frame.width, height = frame.height, format = ?frame.format))]
pub fn captured_from_frame(
    frame: &VideoFrame,
    quality: u8,
) -> Result<CapturedImage, ImageSourceError> {
    frame.validate()?;

    let rgb = to_rgb8(frame);
    let mut buffer = Vec::with_capacity(rgb.len() / 8);
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));

    encoder
        .write_image(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(|e| ImageSourceError::JpegEncode {
            width: frame.width,
            height: frame.height,
            reason: e.to_string(),
        })?;

    if !buffer.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Err(ImageSourceError::JpegEncode {
            width: frame.width,
            height: frame.height,
            reason: "invalid jpeg magic bytes".into(),
        });
    }

    Ok(CapturedImage {
        src: encode_data_url(ImageFormat::Jpeg.mime_type(), &buffer),
        source_file: None,
    })
}

// JPEG has no alpha; it is dropped rather than blended.
fn to_rgb8(frame: &VideoFrame) -> Vec<u8> {
    match frame.format {
        PixelFormat::Rgb8 => frame.data.clone(),
        PixelFormat::Rgba8 => frame
            .data
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect(),
        PixelFormat::Bgra8 => frame
            .data
            .chunks_exact(4)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect(),
    }
}
