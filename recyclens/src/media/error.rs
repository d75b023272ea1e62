use thiserror::Error;

/// Camera or microphone could not be acquired
///
/// Fatal to the connect attempt that raised it. The session reports it
/// through the Error state and does not retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaAccessError {
    /// The user or the OS refused access to the device
    #[error("Permission to use the {0} was denied")]
    PermissionDenied(&'static str),

    /// No such device exists
    #[error("No {0} device found")]
    DeviceNotFound(&'static str),

    /// The device exists but is busy or was unplugged
    #[error("The {0} is not available")]
    DeviceUnavailable(&'static str),

    /// The device stream could not be built or started
    #[error("Failed to start media stream: {0}")]
    StreamFailed(String),
}
