//! Client for the Gemini `generateContent` endpoint.
//!
//! The client only builds requests and interprets responses; the HTTP round
//! trip itself goes through the shell via [`Http`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::capabilities::{Http, HttpError, HttpRequest, HttpResult};
use crate::config::ClientConfig;
use crate::image_source::DataUrl;
use crate::model::{CapturedImage, FruitAnalysis};
use crate::{AppError, ErrorKind, FALLBACK_MIME_TYPE};

const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("image has no payload")]
    InvalidImage,

    #[error("could not build request: {0}")]
    Request(HttpError),

    #[error("transport failed: {0}")]
    Transport(HttpError),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("prompt blocked: {reason}")]
    Blocked { reason: String },

    #[error("response contained no text")]
    EmptyResponse,

    #[error("malformed response envelope: {0}")]
    MalformedEnvelope(String),

    #[error("result does not match schema: {0}")]
    MalformedResult(String),
}

impl From<AnalysisError> for AppError {
    fn from(e: AnalysisError) -> Self {
        let status = match &e {
            AnalysisError::Status { status, .. } => Some(*status),
            _ => None,
        };
        let err = AppError::new(
            ErrorKind::AnalysisRequestFailure,
            "The analysis request failed.",
        )
        .with_internal(e.to_string());
        match status {
            Some(status) => err.with_context("http_status", status.to_string()),
            None => err,
        }
    }
}

/// Base64 payload and MIME type for the `inlineData` part.
///
/// The MIME type comes from the uploaded file when known, then from the
/// data-URL prefix, then falls back to JPEG.
pub fn prepare_image(image: &CapturedImage) -> (&str, &str) {
    let url = DataUrl::parse(&image.src);
    let mime_type = image
        .source_file
        .as_ref()
        .and_then(|f| f.mime_type.as_deref())
        .filter(|m| !m.trim().is_empty())
        .or(url.mime_type)
        .unwrap_or(FALLBACK_MIME_TYPE);
    (url.payload, mime_type)
}

pub fn prompt(language: &str) -> String {
    format!(
        "Analyze the image and identify every fruit present. For each fruit, give its name, \
         its condition (one of: chín, xanh, tươi, hỏng, tốt, xấu, không xác định), a confidence \
         score from 0.0 to 1.0, a one-sentence description, and a ripeness score from 1 (very \
         unripe) to 10 (perfectly ripe or fresh). Return the analysis as a JSON array of \
         objects. If no fruit is found, return an empty array. Respond in {language}."
    )
}

fn response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "fruitName": {
                    "type": "STRING",
                    "description": "Name of the identified fruit, e.g. 'Chuối', 'Táo'."
                },
                "condition": {
                    "type": "STRING",
                    "description": "Condition of the fruit: 'chín', 'xanh', 'tươi', 'hỏng', 'tốt', 'xấu' or 'không xác định'."
                },
                "confidence": {
                    "type": "NUMBER",
                    "description": "Confidence from 0.0 to 1.0 for the whole analysis."
                },
                "description": {
                    "type": "STRING",
                    "description": "A short, one-sentence summary of the analysis."
                },
                "ripenessScore": {
                    "type": "NUMBER",
                    "description": "Score from 1 (very unripe) to 10 (perfectly ripe or fresh)."
                }
            },
            "required": ["fruitName", "condition", "confidence", "description", "ripenessScore"]
        }
    })
}

// --- Wire types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Holds the configuration; constructed once and injected into the model.
#[derive(Debug, Clone)]
pub struct AnalysisClient {
    config: ClientConfig,
}

impl AnalysisClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    #[instrument(skip_all, fields(model = self.config.model()))]
    pub fn build_request(&self, image: &CapturedImage) -> Result<HttpRequest, AnalysisError> {
        let (payload, mime_type) = prepare_image(image);
        // inlineData only takes base64.
        if payload.is_empty() || !DataUrl::parse(&image.src).is_base64 {
            return Err(AnalysisError::InvalidImage);
        }

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type,
                            data: payload,
                        },
                    },
                    Part::Text {
                        text: prompt(self.config.response_language()),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        };

        let request = HttpRequest::post(self.config.generate_content_url())
            .and_then(|r| r.with_header(API_KEY_HEADER, self.config.api_key()))
            .and_then(|r| r.with_json(&body))
            .and_then(|r| r.with_timeout(self.config.timeout()))
            .map_err(AnalysisError::Request)?;

        debug!(
            request_id = request.request_id(),
            mime_type,
            payload_len = payload.len(),
            "built analysis request"
        );
        Ok(request)
    }

    /// Sends one request; the outcome reaches `callback` as an event. Nothing
    /// is retried.
    pub fn analyze<E, F>(
        &self,
        http: &Http<E>,
        image: &CapturedImage,
        callback: F,
    ) -> Result<(), AnalysisError>
    where
        E: Send + 'static,
        F: FnOnce(Result<Vec<FruitAnalysis>, AnalysisError>) -> E + Send + 'static,
    {
        let request = self.build_request(image)?;
        http.send(request, move |result| callback(parse_response(result)));
        Ok(())
    }
}

#[instrument(skip_all)]
pub fn parse_response(result: HttpResult) -> Result<Vec<FruitAnalysis>, AnalysisError> {
    let response = result.map_err(AnalysisError::Transport)?;

    if !response.is_success() {
        return Err(AnalysisError::Status {
            status: response.status(),
            message: error_message(response.body()),
        });
    }

    let envelope: GenerateContentResponse = serde_json::from_slice(response.body())
        .map_err(|e| AnalysisError::MalformedEnvelope(e.to_string()))?;

    if let Some(reason) = envelope
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(AnalysisError::Blocked { reason });
    }

    let Some(candidate) = envelope.candidates.into_iter().next() else {
        return Err(AnalysisError::EmptyResponse);
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match candidate.finish_reason {
            Some(reason) if reason != "STOP" => Err(AnalysisError::Blocked { reason }),
            _ => Err(AnalysisError::EmptyResponse),
        };
    }

    let fruits: Vec<FruitAnalysis> = serde_json::from_str(text.trim())
        .map_err(|e| AnalysisError::MalformedResult(e.to_string()))?;

    debug!(count = fruits.len(), "parsed analysis result");
    Ok(fruits)
}

fn error_message(body: &[u8]) -> String {
    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) {
        let ErrorBody { message, status } = envelope.error;
        match (status, message) {
            (Some(status), Some(message)) => return format!("{status}: {message}"),
            (None, Some(message)) => return message,
            (Some(status), None) => return status,
            (None, None) => {}
        }
    }
    String::from_utf8_lossy(body)
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect()
}
