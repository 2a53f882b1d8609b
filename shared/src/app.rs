use tracing::{debug, error, info, warn};

use crate::capabilities::{CameraOutput, Capabilities, PickerOutput};
use crate::config::{ClientConfig, ConfigError};
use crate::event::Event;
use crate::image_source::{captured_from_frame, captured_from_upload, ImageSourceError};
use crate::model::{
    CameraStatus, CaptureSession, Model, ReviewPhase, ReviewSession, Screen, SessionId,
};
use crate::view::ViewModel;
use crate::{AnalysisClient, AppError, ErrorKind, DEFAULT_JPEG_QUALITY};

#[derive(Default)]
pub struct App;

impl App {
    /// Every screen change goes through here so that leaving the capture
    /// screen, by whatever route, releases its camera stream exactly once.
    fn transition(model: &mut Model, caps: &Capabilities, next: Screen) {
        let previous = std::mem::replace(&mut model.screen, next);
        if let Screen::Capturing(session) = &previous {
            debug!(session = %session.id, "releasing camera stream");
            caps.camera.release_stream(session.id);
        }
        info!(from = previous.name(), to = model.screen.name(), "screen changed");
    }

    fn start_screen(validation_error: Option<AppError>) -> Screen {
        Screen::Start { validation_error }
    }

    fn unexpected_camera_output(output: &CameraOutput) -> AppError {
        AppError::new(
            ErrorKind::DeviceAccess,
            "Could not access the webcam. Please check permissions and try again.",
        )
        .with_internal(format!("unexpected camera output: {output:?}"))
    }

    fn on_file_picked(
        model: &mut Model,
        caps: &Capabilities,
        picked: crate::capabilities::PickerResult,
    ) {
        let outcome = match picked {
            Ok(PickerOutput::Picked(file)) => captured_from_upload(file).map_err(AppError::from),
            Ok(PickerOutput::NoFile) => Err(ImageSourceError::NoFile.into()),
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(image) => {
                let id = model.next_session();
                info!(session = %id, "upload accepted");
                Self::transition(
                    model,
                    caps,
                    Screen::Reviewing(ReviewSession {
                        id,
                        image,
                        phase: ReviewPhase::Idle,
                    }),
                );
            }
            Err(e) => {
                warn!(error = %e, "upload rejected");
                model.screen = Self::start_screen(Some(e));
            }
        }
    }

    fn on_stream_opened(
        model: &mut Model,
        caps: &Capabilities,
        session: SessionId,
        result: crate::capabilities::CameraResult,
    ) {
        let Screen::Capturing(capture) = &mut model.screen else {
            Self::drop_stale_stream(caps, session, &result);
            return;
        };
        if capture.id != session {
            Self::drop_stale_stream(caps, session, &result);
            return;
        }
        if capture.status != CameraStatus::Starting {
            debug!(session = %session, "duplicate stream response ignored");
            return;
        }

        capture.status = match result {
            Ok(CameraOutput::StreamOpened { width, height }) => {
                info!(session = %session, width, height, "camera live");
                CameraStatus::Live
            }
            Ok(other) => CameraStatus::Failed(Self::unexpected_camera_output(&other)),
            Err(e) => {
                warn!(session = %session, error = %e, "camera unavailable");
                CameraStatus::Failed(e.into())
            }
        };
    }

    fn drop_stale_stream(
        caps: &Capabilities,
        session: SessionId,
        result: &crate::capabilities::CameraResult,
    ) {
        debug!(session = %session, "stale stream response dropped");
        if matches!(result, Ok(CameraOutput::StreamOpened { .. })) {
            caps.camera.release_stream(session);
        }
    }

    fn on_frame_captured(
        model: &mut Model,
        caps: &Capabilities,
        session: SessionId,
        result: crate::capabilities::CameraResult,
    ) {
        match &model.screen {
            Screen::Capturing(CaptureSession {
                id,
                status: CameraStatus::Capturing,
            }) if *id == session => {}
            _ => {
                debug!(session = %session, "stale frame dropped");
                return;
            }
        }

        let image = match result {
            Ok(CameraOutput::Frame(frame)) => {
                captured_from_frame(&frame, DEFAULT_JPEG_QUALITY).map_err(AppError::from)
            }
            Ok(other) => Err(Self::unexpected_camera_output(&other)),
            Err(e) => Err(e.into()),
        };

        match image {
            Ok(image) => {
                let id = model.next_session();
                info!(capture = %session, review = %id, "frame captured");
                Self::transition(
                    model,
                    caps,
                    Screen::Reviewing(ReviewSession {
                        id,
                        image,
                        phase: ReviewPhase::Idle,
                    }),
                );
            }
            Err(e) => {
                warn!(session = %session, error = %e, "capture failed");
                if let Screen::Capturing(capture) = &mut model.screen {
                    capture.status = CameraStatus::Failed(e);
                }
            }
        }
    }

    fn on_analyze_requested(model: &mut Model, caps: &Capabilities) {
        let client: Option<&AnalysisClient> = model.client.as_ref();
        let config_error = model.config_error.as_ref();
        let Screen::Reviewing(review) = &mut model.screen else {
            debug!("analyze ignored outside review");
            return;
        };
        if !review.phase.can_analyze() {
            debug!(session = %review.id, "analyze ignored while busy or done");
            return;
        }

        let Some(client) = client else {
            let e = config_error
                .cloned()
                .unwrap_or_else(|| ConfigError::MissingApiKey.into());
            warn!(error = %e, "analysis requested without configuration");
            review.phase = ReviewPhase::Failed(e);
            return;
        };

        let session = review.id;
        let sent = client.analyze(&caps.http, &review.image, move |outcome| {
            Event::AnalysisCompleted {
                session,
                outcome: Box::new(outcome),
            }
        });

        review.phase = match sent {
            Ok(()) => {
                info!(session = %session, "analysis requested");
                ReviewPhase::Loading
            }
            Err(e) => {
                warn!(session = %session, error = %e, "analysis request not sent");
                ReviewPhase::Failed(e.into())
            }
        };
    }

    fn on_analysis_completed(
        model: &mut Model,
        session: SessionId,
        outcome: Result<Vec<crate::FruitAnalysis>, crate::AnalysisError>,
    ) {
        let review = match &mut model.screen {
            Screen::Reviewing(review)
                if review.id == session && review.phase == ReviewPhase::Loading =>
            {
                review
            }
            _ => {
                debug!(session = %session, "stale analysis result dropped");
                return;
            }
        };

        review.phase = match outcome {
            Ok(fruits) => {
                info!(session = %session, count = fruits.len(), "analysis complete");
                ReviewPhase::Done(fruits)
            }
            Err(e) => {
                warn!(session = %session, error = %e, "analysis failed");
                ReviewPhase::Failed(e.into())
            }
        };
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(
            event = event.name(),
            user = event.is_user_initiated(),
            screen = model.screen.name(),
            "update"
        );

        match event {
            Event::Started(settings) => match ClientConfig::try_from(*settings) {
                Ok(config) => {
                    info!(model = config.model(), "analysis client configured");
                    model.client = Some(AnalysisClient::new(config));
                    model.config_error = None;
                }
                Err(e) => {
                    let e = AppError::from(e);
                    error!(error = %e, "configuration rejected");
                    model.client = None;
                    model.config_error = Some(e);
                }
            },

            Event::UploadRequested => match &mut model.screen {
                Screen::Start { validation_error } => {
                    *validation_error = None;
                    caps.picker
                        .pick_image(|result| Event::FilePicked(Box::new(result)));
                }
                _ => {
                    debug!("upload ignored outside start screen");
                    return;
                }
            },

            Event::FilePicked(result) => {
                if !matches!(model.screen, Screen::Start { .. }) {
                    debug!("file pick result dropped after leaving start screen");
                    return;
                }
                Self::on_file_picked(model, caps, *result);
            }

            Event::WebcamRequested => {
                if !matches!(model.screen, Screen::Start { .. }) {
                    debug!("webcam ignored outside start screen");
                    return;
                }
                let id = model.next_session();
                Self::transition(
                    model,
                    caps,
                    Screen::Capturing(CaptureSession {
                        id,
                        status: CameraStatus::Starting,
                    }),
                );
                caps.camera.open_stream(id, move |result| Event::StreamOpened {
                    session: id,
                    result: Box::new(result),
                });
            }

            Event::StreamOpened { session, result } => {
                Self::on_stream_opened(model, caps, session, *result);
            }

            Event::ShutterPressed => match &mut model.screen {
                Screen::Capturing(capture) if capture.status == CameraStatus::Live => {
                    capture.status = CameraStatus::Capturing;
                    let session = capture.id;
                    caps.camera.capture_frame(session, move |result| {
                        Event::FrameCaptured {
                            session,
                            result: Box::new(result),
                        }
                    });
                }
                _ => {
                    debug!("shutter ignored while camera not live");
                    return;
                }
            },

            Event::FrameCaptured { session, result } => {
                Self::on_frame_captured(model, caps, session, *result);
            }

            Event::CaptureCancelled => {
                if !matches!(model.screen, Screen::Capturing(_)) {
                    debug!("cancel ignored outside capture screen");
                    return;
                }
                Self::transition(model, caps, Self::start_screen(None));
            }

            Event::AnalyzeRequested => Self::on_analyze_requested(model, caps),

            Event::AnalysisCompleted { session, outcome } => {
                Self::on_analysis_completed(model, session, *outcome);
            }

            Event::Reset => Self::transition(model, caps, Self::start_screen(None)),
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        ViewModel::from(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{CameraOperation, Effect, PixelFormat, VideoFrame};
    use crate::model::CapturedImage;
    use crate::{ClientSettings, ErrorSeverity};
    use crux_core::testing::AppTester;

    fn configured() -> (AppTester<App, Effect>, Model) {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();
        let settings = ClientSettings::new("test-key");
        let _ = app.update(Event::Started(Box::new(settings)), &mut model);
        (app, model)
    }

    fn camera_ops(effects: &[Effect]) -> Vec<CameraOperation> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Camera(request) => Some(request.operation.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn started_installs_client() {
        let (app, model) = configured();
        assert!(model.client.is_some());
        assert!(app.view(&model).analysis_available);
    }

    #[test]
    fn rejected_settings_are_fatal_and_install_no_client() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();
        let settings = ClientSettings {
            endpoint: Some("javascript:alert(1)".into()),
            ..ClientSettings::new("test-key")
        };
        let _ = app.update(Event::Started(Box::new(settings)), &mut model);

        assert!(model.client.is_none());
        let error = model.config_error.clone().unwrap();
        assert_eq!(error.kind, ErrorKind::Configuration);
        assert_eq!(error.severity, ErrorSeverity::Fatal);

        let view = app.view(&model);
        assert!(!view.analysis_available);
        assert_eq!(view.configuration_error.unwrap().error_code, error.code());

        model.screen = Screen::Reviewing(ReviewSession {
            id: model.next_session(),
            image: CapturedImage {
                src: "data:image/jpeg;base64,/9j/4AAQ".into(),
                source_file: None,
            },
            phase: ReviewPhase::Idle,
        });
        let update = app.update(Event::AnalyzeRequested, &mut model);
        assert!(!update.effects.iter().any(|e| matches!(e, Effect::Http(_))));
        let Screen::Reviewing(review) = &model.screen else {
            panic!("expected review screen");
        };
        assert_eq!(review.phase, ReviewPhase::Failed(error));
    }

    #[test]
    fn valid_settings_clear_an_earlier_rejection() {
        let (app, mut model) = configured();
        let _ = app.update(
            Event::Started(Box::new(ClientSettings::new("  "))),
            &mut model,
        );
        assert!(model.client.is_none());
        assert!(model.config_error.is_some());

        let _ = app.update(
            Event::Started(Box::new(ClientSettings::new("test-key"))),
            &mut model,
        );
        assert!(model.client.is_some());
        assert!(model.config_error.is_none());
        assert!(app.view(&model).configuration_error.is_none());
    }

    #[test]
    fn webcam_opens_stream_for_new_session() {
        let (app, mut model) = configured();
        let update = app.update(Event::WebcamRequested, &mut model);

        let id = model.screen.capture_session().unwrap();
        assert_eq!(
            camera_ops(&update.effects),
            vec![CameraOperation::OpenStream { session: id }]
        );
    }

    #[test]
    fn reset_from_capture_releases_stream() {
        let (app, mut model) = configured();
        let _ = app.update(Event::WebcamRequested, &mut model);
        let id = model.screen.capture_session().unwrap();

        let update = app.update(Event::Reset, &mut model);
        assert_eq!(
            camera_ops(&update.effects),
            vec![CameraOperation::ReleaseStream { session: id }]
        );
        assert!(matches!(model.screen, Screen::Start { validation_error: None }));
    }

    #[test]
    fn stale_stream_is_released() {
        let (app, mut model) = configured();
        let _ = app.update(Event::WebcamRequested, &mut model);
        let old = model.screen.capture_session().unwrap();
        let _ = app.update(Event::CaptureCancelled, &mut model);

        let update = app.update(
            Event::StreamOpened {
                session: old,
                result: Box::new(Ok(CameraOutput::StreamOpened {
                    width: 640,
                    height: 480,
                })),
            },
            &mut model,
        );
        assert_eq!(
            camera_ops(&update.effects),
            vec![CameraOperation::ReleaseStream { session: old }]
        );
        assert!(matches!(model.screen, Screen::Start { .. }));
    }

    #[test]
    fn failed_frame_keeps_capture_screen() {
        let (app, mut model) = configured();
        let _ = app.update(Event::WebcamRequested, &mut model);
        let id = model.screen.capture_session().unwrap();
        let _ = app.update(
            Event::StreamOpened {
                session: id,
                result: Box::new(Ok(CameraOutput::StreamOpened {
                    width: 2,
                    height: 2,
                })),
            },
            &mut model,
        );
        let _ = app.update(Event::ShutterPressed, &mut model);

        let bad = VideoFrame {
            width: 2,
            height: 2,
            format: PixelFormat::Rgb8,
            data: vec![0; 5],
        };
        let _ = app.update(
            Event::FrameCaptured {
                session: id,
                result: Box::new(Ok(CameraOutput::Frame(bad))),
            },
            &mut model,
        );

        match &model.screen {
            Screen::Capturing(capture) => {
                assert!(matches!(&capture.status, CameraStatus::Failed(e) if e.kind == ErrorKind::DeviceAccess));
            }
            other => panic!("unexpected screen {}", other.name()),
        }
    }

    #[test]
    fn analyze_without_config_fails_visibly() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();
        model.screen = Screen::Reviewing(ReviewSession {
            id: SessionId(1),
            image: crate::CapturedImage {
                src: "data:image/png;base64,AAAA".into(),
                source_file: None,
            },
            phase: ReviewPhase::Idle,
        });

        let update = app.update(Event::AnalyzeRequested, &mut model);
        assert!(!update.effects.iter().any(|e| matches!(e, Effect::Http(_))));
        match &model.screen {
            Screen::Reviewing(review) => assert!(
                matches!(&review.phase, ReviewPhase::Failed(e) if e.kind == ErrorKind::Configuration)
            ),
            other => panic!("unexpected screen {}", other.name()),
        }
    }
}
