use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::AnalysisClient;
use crate::AppError;

/// Identifies one capture or review session. Capability responses carry the
/// id they were issued for so late arrivals can be told apart from current ones.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// One fruit as described by the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FruitAnalysis {
    pub fruit_name: String,
    /// Raw label, possibly localised. See [`Condition::parse`].
    pub condition: String,
    pub confidence: f64,
    pub description: String,
    pub ripeness_score: f64,
}

impl FruitAnalysis {
    pub fn condition_tag(&self) -> Condition {
        Condition::parse(&self.condition)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Ripe,
    Unripe,
    Fresh,
    Spoiled,
    Good,
    Bad,
    Unknown,
}

impl Condition {
    /// Case-insensitive; accepts the Vietnamese labels the prompt asks for as
    /// well as English. Anything else is `Unknown`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "chín" | "ripe" => Self::Ripe,
            "xanh" | "unripe" | "green" => Self::Unripe,
            "tươi" | "fresh" => Self::Fresh,
            "hỏng" | "spoiled" | "rotten" => Self::Spoiled,
            "tốt" | "good" => Self::Good,
            "xấu" | "bad" => Self::Bad,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub size_bytes: u64,
}

/// An image ready for analysis, always held as a data URL.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedImage {
    pub src: String,
    /// Present for uploads only.
    pub source_file: Option<SourceFile>,
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.src.split(',').next().unwrap_or_default();
        f.debug_struct("CapturedImage")
            .field("src", &format_args!("{prefix},<{} bytes>", self.src.len()))
            .field("source_file", &self.source_file)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CameraStatus {
    Starting,
    Live,
    Capturing,
    Failed(AppError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureSession {
    pub id: SessionId,
    pub status: CameraStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ReviewPhase {
    Idle,
    Loading,
    Done(Vec<FruitAnalysis>),
    Failed(AppError),
}

impl ReviewPhase {
    pub fn can_analyze(&self) -> bool {
        matches!(self, Self::Idle | Self::Failed(_))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewSession {
    pub id: SessionId,
    pub image: CapturedImage,
    pub phase: ReviewPhase,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Screen {
    Start { validation_error: Option<AppError> },
    Capturing(CaptureSession),
    Reviewing(ReviewSession),
}

impl Default for Screen {
    fn default() -> Self {
        Self::Start {
            validation_error: None,
        }
    }
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Capturing(_) => "capturing",
            Self::Reviewing(_) => "reviewing",
        }
    }

    pub fn capture_session(&self) -> Option<SessionId> {
        match self {
            Self::Capturing(session) => Some(session.id),
            _ => None,
        }
    }
}

#[derive(Default, Debug)]
pub struct Model {
    pub screen: Screen,
    pub client: Option<AnalysisClient>,
    /// Set when the shell's settings were rejected; fatal for this run.
    pub config_error: Option<AppError>,
    next_session_id: u64,
}

impl Model {
    pub fn next_session(&mut self) -> SessionId {
        self.next_session_id += 1;
        SessionId(self.next_session_id)
    }
}
