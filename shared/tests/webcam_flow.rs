use crux_core::testing::AppTester;
use crux_core::Request;
use fruit_inspector::capabilities::{
    CameraError, CameraOperation, CameraOutput, Effect, PixelFormat, VideoFrame,
};
use fruit_inspector::view::{CameraView, ScreenView};
use fruit_inspector::{App, ClientSettings, Event, Model, Screen};

fn configured() -> (AppTester<App, Effect>, Model) {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    let settings = ClientSettings::new("test-key");
    let _ = app.update(Event::Started(Box::new(settings)), &mut model);
    (app, model)
}

fn camera_requests(effects: Vec<Effect>) -> Vec<Request<CameraOperation>> {
    effects
        .into_iter()
        .filter_map(|e| match e {
            Effect::Camera(request) => Some(request),
            _ => None,
        })
        .collect()
}

fn open_webcam(app: &AppTester<App, Effect>, model: &mut Model) -> Request<CameraOperation> {
    let update = app.update(Event::WebcamRequested, model);
    let mut requests = camera_requests(update.effects);
    assert_eq!(requests.len(), 1);
    requests.remove(0)
}

fn resolve(
    app: &AppTester<App, Effect>,
    model: &mut Model,
    request: &mut Request<CameraOperation>,
    result: Result<CameraOutput, CameraError>,
) -> Vec<Effect> {
    let update = app.resolve(request, result).expect("resolve camera");
    let mut effects = Vec::new();
    for event in update.events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

fn go_live(app: &AppTester<App, Effect>, model: &mut Model) {
    let mut open = open_webcam(app, model);
    let _ = resolve(
        app,
        model,
        &mut open,
        Ok(CameraOutput::StreamOpened {
            width: 4,
            height: 2,
        }),
    );
}

fn released(effects: Vec<Effect>) -> usize {
    camera_requests(effects)
        .iter()
        .filter(|r| matches!(r.operation, CameraOperation::ReleaseStream { .. }))
        .count()
}

#[test]
fn denied_permission_disables_shutter() {
    let (app, mut model) = configured();
    let mut open = open_webcam(&app, &mut model);

    assert!(matches!(
        app.view(&model).screen,
        ScreenView::Capturing {
            camera: CameraView::Starting,
            shutter_enabled: false,
        }
    ));

    let _ = resolve(&app, &mut model, &mut open, Err(CameraError::PermissionDenied));

    match app.view(&model).screen {
        ScreenView::Capturing {
            camera: CameraView::Failed(error),
            shutter_enabled,
        } => {
            assert!(!shutter_enabled);
            assert_eq!(error.error_code, "DEVICE_ACCESS_ERROR");
        }
        other => panic!("expected camera failure, got {other:?}"),
    }

    let update = app.update(Event::ShutterPressed, &mut model);
    assert!(camera_requests(update.effects).is_empty());
}

#[test]
fn cancel_releases_stream_once() {
    let (app, mut model) = configured();
    go_live(&app, &mut model);
    assert!(matches!(
        app.view(&model).screen,
        ScreenView::Capturing {
            camera: CameraView::Live,
            shutter_enabled: true,
        }
    ));

    let update = app.update(Event::CaptureCancelled, &mut model);
    assert_eq!(released(update.effects), 1);
    assert!(matches!(model.screen, Screen::Start { .. }));

    let update = app.update(Event::CaptureCancelled, &mut model);
    assert_eq!(released(update.effects), 0);
}

#[test]
fn cancel_after_denial_still_releases() {
    let (app, mut model) = configured();
    let mut open = open_webcam(&app, &mut model);
    let _ = resolve(&app, &mut model, &mut open, Err(CameraError::NotFound));

    let update = app.update(Event::CaptureCancelled, &mut model);
    assert_eq!(released(update.effects), 1);
}

#[test]
fn capture_moves_to_review_with_jpeg() {
    let (app, mut model) = configured();
    go_live(&app, &mut model);

    let update = app.update(Event::ShutterPressed, &mut model);
    let mut requests = camera_requests(update.effects);
    assert_eq!(requests.len(), 1);
    assert!(matches!(
        requests[0].operation,
        CameraOperation::CaptureFrame { .. }
    ));
    assert!(matches!(
        app.view(&model).screen,
        ScreenView::Capturing {
            camera: CameraView::Capturing,
            shutter_enabled: false,
        }
    ));

    let frame = VideoFrame::new(4, 2, PixelFormat::Rgba8, vec![200; 4 * 2 * 4]).unwrap();
    let effects = resolve(
        &app,
        &mut model,
        &mut requests[0],
        Ok(CameraOutput::Frame(frame)),
    );
    assert_eq!(released(effects), 1);

    match app.view(&model).screen {
        ScreenView::Reviewing {
            image_src,
            can_analyze,
            ..
        } => {
            assert!(image_src.starts_with("data:image/jpeg;base64,/9j/"));
            assert!(can_analyze);
        }
        other => panic!("expected review screen, got {other:?}"),
    }
}

#[test]
fn reset_while_starting_releases_and_drops_late_stream() {
    let (app, mut model) = configured();
    let mut open = open_webcam(&app, &mut model);

    let update = app.update(Event::Reset, &mut model);
    assert_eq!(released(update.effects), 1);

    let effects = resolve(
        &app,
        &mut model,
        &mut open,
        Ok(CameraOutput::StreamOpened {
            width: 640,
            height: 480,
        }),
    );
    assert_eq!(released(effects), 1);
    assert!(matches!(model.screen, Screen::Start { .. }));
}

#[test]
fn webcam_is_only_offered_from_start() {
    let (app, mut model) = configured();
    let _ = open_webcam(&app, &mut model);

    let update = app.update(Event::WebcamRequested, &mut model);
    assert!(camera_requests(update.effects).is_empty());
}
