use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisError;
use crate::capabilities::{CameraResult, PickerResult};
use crate::config::ClientSettings;
use crate::model::{FruitAnalysis, SessionId};

// --- Event enum: capability responses are internal and never cross the bridge ---

#[derive(Deserialize, Serialize, Debug)]
pub enum Event {
    /// Sent once by the shell before the first render. Validated by the
    /// core; invalid settings leave the app unconfigured.
    #[serde(skip_serializing)]
    Started(Box<ClientSettings>),

    // Start screen
    UploadRequested,
    WebcamRequested,

    // Capture screen
    ShutterPressed,
    CaptureCancelled,

    // Review screen
    AnalyzeRequested,
    Reset,

    // Capability responses (boxed to keep enum size small)
    #[serde(skip)]
    FilePicked(Box<PickerResult>),
    #[serde(skip)]
    StreamOpened {
        session: SessionId,
        result: Box<CameraResult>,
    },
    #[serde(skip)]
    FrameCaptured {
        session: SessionId,
        result: Box<CameraResult>,
    },
    #[serde(skip)]
    AnalysisCompleted {
        session: SessionId,
        outcome: Box<Result<Vec<FruitAnalysis>, AnalysisError>>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Started(_) => "started",
            Event::UploadRequested => "upload_requested",
            Event::WebcamRequested => "webcam_requested",
            Event::ShutterPressed => "shutter_pressed",
            Event::CaptureCancelled => "capture_cancelled",
            Event::AnalyzeRequested => "analyze_requested",
            Event::Reset => "reset",
            Event::FilePicked(_) => "file_picked",
            Event::StreamOpened { .. } => "stream_opened",
            Event::FrameCaptured { .. } => "frame_captured",
            Event::AnalysisCompleted { .. } => "analysis_completed",
        }
    }

    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Event::UploadRequested
                | Event::WebcamRequested
                | Event::ShutterPressed
                | Event::CaptureCancelled
                | Event::AnalyzeRequested
                | Event::Reset
        )
    }
}
