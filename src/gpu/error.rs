use thiserror::Error;

/// Failures that can surface while creating a [`Context`](crate::Context).
///
/// Everything past context creation is either a programmer error (assertion)
/// or a native runtime error that is logged and, for device loss, recorded on
/// the context.
#[derive(Debug, Error)]
pub enum GPUError {
    #[error("native device creation failed: {0}")]
    DeviceCreation(String),
    #[error("window handle kind not usable by the {0} backend")]
    UnsupportedWindowHandle(&'static str),
    #[error("no window handle supplied")]
    MissingWindowHandle,
    #[error("failed to load native api: {0}")]
    LoadingError(String),
}

/// Convenient crate-wide result type.
pub type Result<T, E = GPUError> = std::result::Result<T, E>;
