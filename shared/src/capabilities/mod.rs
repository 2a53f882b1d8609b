mod camera;
mod http;
mod picker;

pub use self::camera::{
    Camera, CameraError, CameraOperation, CameraOutput, CameraResult, PixelFormat, VideoFrame,
};
pub use self::http::{
    Http, HttpError, HttpHeaders, HttpMethod, HttpOperation, HttpRequest, HttpResponse,
    HttpResult, ValidatedUrl,
};
pub use self::picker::{
    Picker, PickerError, PickerOperation, PickerOutput, PickerResult, SelectedFile, IMAGE_ACCEPT,
};

/// Render capability re-export.
///
/// Crux's built-in Render capability covers view updates as-is.
pub use crux_core::render::Render;

// The Effect derive refers to the app type by name.
#[allow(unused_imports)]
use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub camera: Camera<Event>,
    pub picker: Picker<Event>,
    pub render: Render<Event>,
}
