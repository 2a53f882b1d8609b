use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const IMAGE_ACCEPT: &str = "image/*";

/// Native file chooser. The shell reads the chosen file fully into memory
/// before responding.
pub struct Picker<E> {
    context: CapabilityContext<PickerOperation, E>,
}

impl<Ev> Capability<Ev> for Picker<Ev> {
    type Operation = PickerOperation;
    type MappedSelf<MappedEv> = Picker<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Picker::new(self.context.map_event(f))
    }
}

impl<E> Picker<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<PickerOperation, E>) -> Self {
        Self { context }
    }

    pub fn pick_image<F>(&self, callback: F)
    where
        F: FnOnce(PickerResult) -> E + Send + 'static,
        E: Send,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx
                .request_from_shell(PickerOperation::PickImage {
                    accept: IMAGE_ACCEPT.to_string(),
                })
                .await;
            ctx.update_app(callback(result));
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PickerOperation {
    PickImage { accept: String },
}

impl Operation for PickerOperation {
    type Output = PickerResult;
}

/// A file as reported by the platform. `mime_type` is whatever the OS
/// claims, if anything; it is not trusted on its own.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PickerOutput {
    Picked(SelectedFile),
    /// The dialog closed without a selection.
    NoFile,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum PickerError {
    #[error("failed to read file: {reason}")]
    ReadFailed { reason: String },

    #[error("file picker unavailable")]
    Unavailable,
}

impl From<PickerError> for crate::AppError {
    fn from(e: PickerError) -> Self {
        crate::AppError::new(
            crate::ErrorKind::InvalidInput,
            "The selected file could not be read.",
        )
        .with_internal(e.to_string())
    }
}

pub type PickerResult = Result<PickerOutput, PickerError>;
