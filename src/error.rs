use thiserror::Error;

/// Result type for Fusion stereo operations
pub type Result<T> = std::result::Result<T, FusionError>;

/// Errors that can occur when controlling a Fusion stereo
#[derive(Error, Debug)]
pub enum FusionError {
    /// A `zone<N>` or `source<N>` identifier could not be parsed
    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),

    /// The action has no bus encoding
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    /// Device state needed to build the command is not available
    #[error("Missing context: {0}")]
    MissingContext(String),

    /// No menu sentinel arrived and there is no cached device list
    #[error("Timed out waiting for bluetooth devices")]
    DiscoveryTimeout,

    /// Another bluetooth discovery session is still running
    #[error("Bluetooth discovery already in progress")]
    DiscoveryBusy,

    /// Current device state could not be read
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The audio player could not be started or exited with an error
    #[error("Playback failure: {0}")]
    PlaybackFailure(String),

    /// A value supplied at the command intake is outside its range
    #[error("{field} out of range: received {value}, expected {min} <= value <= {max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// A value supplied at the command intake has the wrong type
    #[error("Invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    /// No stereo bus address is known yet
    #[error("No device id")]
    NoDevice,

    /// The bus output sink has been dropped
    #[error("Bus output closed")]
    BusClosed,

    /// Channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
