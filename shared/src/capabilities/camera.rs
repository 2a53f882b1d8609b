use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::SessionId;
use crate::MAX_FRAME_DIMENSION;

/// Live camera access owned by the shell.
///
/// The core never holds a media stream itself: it names each stream by the
/// capture session that asked for it, and the shell keeps the mapping. A
/// `ReleaseStream` for a session must stop every track the shell acquired for
/// it, including a request that is still waiting on the permission prompt.
pub struct Camera<E> {
    context: CapabilityContext<CameraOperation, E>,
}

impl<Ev> Capability<Ev> for Camera<Ev> {
    type Operation = CameraOperation;
    type MappedSelf<MappedEv> = Camera<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Camera::new(self.context.map_event(f))
    }
}

impl<E> Camera<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<CameraOperation, E>) -> Self {
        Self { context }
    }

    pub fn open_stream<F>(&self, session: SessionId, callback: F)
    where
        F: FnOnce(CameraResult) -> E + Send + 'static,
        E: Send,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx
                .request_from_shell(CameraOperation::OpenStream { session })
                .await;
            ctx.update_app(callback(result));
        });
    }

    pub fn capture_frame<F>(&self, session: SessionId, callback: F)
    where
        F: FnOnce(CameraResult) -> E + Send + 'static,
        E: Send,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx
                .request_from_shell(CameraOperation::CaptureFrame { session })
                .await;
            ctx.update_app(callback(result));
        });
    }

    /// Fire-and-forget; releasing an unknown or already released session is a no-op.
    pub fn release_stream(&self, session: SessionId) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(CameraOperation::ReleaseStream { session })
                .await;
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraOperation {
    OpenStream { session: SessionId },
    CaptureFrame { session: SessionId },
    ReleaseStream { session: SessionId },
}

impl Operation for CameraOperation {
    type Output = CameraResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// One uncompressed frame at the camera's native resolution.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl VideoFrame {
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, CameraError> {
        let frame = Self {
            width,
            height,
            format,
            data,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Frames arrive from the shell unchecked; geometry must match the buffer.
    pub fn validate(&self) -> Result<(), CameraError> {
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::InvalidFrame {
                reason: format!("zero dimension {}x{}", self.width, self.height),
            });
        }

        if self.width > MAX_FRAME_DIMENSION || self.height > MAX_FRAME_DIMENSION {
            return Err(CameraError::InvalidFrame {
                reason: format!(
                    "{}x{} exceeds maximum of {MAX_FRAME_DIMENSION}",
                    self.width, self.height
                ),
            });
        }

        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|px| px.checked_mul(self.format.bytes_per_pixel()))
            .ok_or_else(|| CameraError::InvalidFrame {
                reason: "frame size overflows".to_string(),
            })?;

        if self.data.len() != expected {
            return Err(CameraError::InvalidFrame {
                reason: format!(
                    "expected {expected} bytes for {}x{} {:?}, got {}",
                    self.width,
                    self.height,
                    self.format,
                    self.data.len()
                ),
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("data_len", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraOutput {
    StreamOpened { width: u32, height: u32 },
    Frame(VideoFrame),
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera available")]
    NotFound,

    #[error("camera unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("capture failed: {reason}")]
    CaptureFailed { reason: String },

    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("camera not supported on this platform")]
    NotSupported,
}

impl CameraError {
    pub fn is_permission_error(&self) -> bool {
        matches!(self, CameraError::PermissionDenied)
    }
}

impl From<CameraError> for crate::AppError {
    fn from(e: CameraError) -> Self {
        let message = if e.is_permission_error() {
            "Camera access was denied. Please allow camera access and try again."
        } else {
            "Could not access the webcam. Please check permissions and try again."
        };
        crate::AppError::new(crate::ErrorKind::DeviceAccess, message).with_internal(e.to_string())
    }
}

pub type CameraResult = Result<CameraOutput, CameraError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn frame_accepts_matching_buffer() {
        let frame = VideoFrame::new(4, 2, PixelFormat::Rgba8, vec![0; 4 * 2 * 4]);
        assert!(frame.is_ok());
        let frame = VideoFrame::new(4, 2, PixelFormat::Rgb8, vec![0; 4 * 2 * 3]);
        assert!(frame.is_ok());
    }

    #[test]
    fn frame_rejects_short_buffer() {
        let frame = VideoFrame::new(4, 2, PixelFormat::Bgra8, vec![0; 31]);
        assert!(matches!(frame, Err(CameraError::InvalidFrame { .. })));
    }

    #[test]
    fn frame_rejects_zero_and_oversized_dimensions() {
        assert!(VideoFrame::new(0, 10, PixelFormat::Rgb8, vec![]).is_err());
        let frame = VideoFrame {
            width: MAX_FRAME_DIMENSION + 1,
            height: 1,
            format: PixelFormat::Rgb8,
            data: vec![],
        };
        assert!(frame.validate().is_err());
    }

    #[test]
    fn frame_debug_omits_pixels() {
        let frame = VideoFrame::new(1, 1, PixelFormat::Rgb8, vec![7, 8, 9]).unwrap();
        let printed = format!("{frame:?}");
        assert!(printed.contains("data_len: 3"));
        assert!(!printed.contains("[7, 8, 9]"));
    }

    #[test]
    fn permission_denial_maps_to_device_access() {
        let err: crate::AppError = CameraError::PermissionDenied.into();
        assert_eq!(err.kind, ErrorKind::DeviceAccess);
        assert!(err.message.contains("denied"));
        assert_eq!(err.internal_message.as_deref(), Some("camera permission denied"));
    }

    #[test]
    fn hardware_failure_maps_to_generic_message() {
        let err: crate::AppError = CameraError::Unavailable {
            reason: "NotReadableError".into(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::DeviceAccess);
        assert!(err.message.contains("webcam"));
    }
}
