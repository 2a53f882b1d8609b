// lib.rs - Fruit Inspector shared core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod analysis;
pub mod app;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod image_source;
pub mod model;
pub mod presentation;
pub mod view;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use analysis::{AnalysisClient, AnalysisError};
pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::{ClientConfig, ClientSettings, ConfigError};
pub use event::Event;
pub use model::{CapturedImage, Condition, FruitAnalysis, Model, Screen, SessionId};
pub use view::ViewModel;

pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const MAX_FRAME_DIMENSION: u32 = 8192;
pub const DEFAULT_JPEG_QUALITY: u8 = 92;
pub const FALLBACK_MIME_TYPE: &str = "image/jpeg";
pub const NO_FRUIT_DETECTED_MESSAGE: &str = "No fruit was detected in the image.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidInput,
    DeviceAccess,
    AnalysisRequestFailure,
    Configuration,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::DeviceAccess => "DEVICE_ACCESS_ERROR",
            Self::AnalysisRequestFailure => "ANALYSIS_REQUEST_FAILED",
            Self::Configuration => "CONFIGURATION_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::AnalysisRequestFailure | Self::DeviceAccess => ErrorSeverity::Transient,
            Self::InvalidInput => ErrorSeverity::Permanent,
            Self::Configuration => ErrorSeverity::Fatal,
        }
    }

    /// Whether the user can retry by repeating the action that failed.
    /// Nothing is ever retried automatically.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::AnalysisRequestFailure | Self::DeviceAccess)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::AnalysisRequestFailure => {
                "Could not get an analysis from the AI. Please try again.".into()
            }
            ErrorKind::InvalidInput | ErrorKind::DeviceAccess | ErrorKind::Configuration => {
                self.message.clone()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserFacingError {
    pub message: String,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}
