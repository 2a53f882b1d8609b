use serde::{Deserialize, Serialize};

use crate::model::{CameraStatus, Model, ReviewPhase, Screen};
use crate::presentation::ResultCard;
use crate::{UserFacingError, NO_FRUIT_DETECTED_MESSAGE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub screen: ScreenView,
    /// False until the shell has sent a valid configuration.
    pub analysis_available: bool,
    /// Rejected settings. Fatal: the shell must restart with new ones.
    pub configuration_error: Option<UserFacingError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScreenView {
    Start {
        validation_error: Option<UserFacingError>,
    },
    Capturing {
        camera: CameraView,
        shutter_enabled: bool,
    },
    Reviewing {
        image_src: String,
        can_analyze: bool,
        is_loading: bool,
        error: Option<UserFacingError>,
        result: Option<AnalysisResultView>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CameraView {
    Starting,
    Live,
    Capturing,
    Failed(UserFacingError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnalysisResultView {
    NoFruitDetected { message: String },
    Fruits { cards: Vec<ResultCard> },
}

impl From<&Model> for ViewModel {
    fn from(model: &Model) -> Self {
        let analysis_available = model.client.is_some();

        let screen = match &model.screen {
            Screen::Start { validation_error } => ScreenView::Start {
                validation_error: validation_error.as_ref().map(UserFacingError::from),
            },
            Screen::Capturing(session) => {
                let camera = match &session.status {
                    CameraStatus::Starting => CameraView::Starting,
                    CameraStatus::Live => CameraView::Live,
                    CameraStatus::Capturing => CameraView::Capturing,
                    CameraStatus::Failed(e) => CameraView::Failed(e.into()),
                };
                ScreenView::Capturing {
                    shutter_enabled: matches!(camera, CameraView::Live),
                    camera,
                }
            }
            Screen::Reviewing(review) => {
                let result = match &review.phase {
                    ReviewPhase::Done(fruits) if fruits.is_empty() => {
                        Some(AnalysisResultView::NoFruitDetected {
                            message: NO_FRUIT_DETECTED_MESSAGE.to_string(),
                        })
                    }
                    ReviewPhase::Done(fruits) => Some(AnalysisResultView::Fruits {
                        cards: fruits.iter().map(ResultCard::from).collect(),
                    }),
                    _ => None,
                };
                let error: Option<UserFacingError> = match &review.phase {
                    ReviewPhase::Failed(e) => Some(e.into()),
                    _ => None,
                };

                ScreenView::Reviewing {
                    image_src: review.image.src.clone(),
                    can_analyze: analysis_available && review.phase.can_analyze(),
                    is_loading: matches!(review.phase, ReviewPhase::Loading),
                    error,
                    result,
                }
            }
        };

        Self {
            screen,
            analysis_available,
            configuration_error: model.config_error.as_ref().map(UserFacingError::from),
        }
    }
}
