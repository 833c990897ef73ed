/// Error types for the native bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A JNI call failed
    #[error("JNI error: {0}")]
    Jni(#[from] jni::errors::Error),

    /// Image metadata that does not describe a usable image
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// An image format the bridge does not handle
    #[error("unsupported image format {0}")]
    UnsupportedFormat(i32),

    /// A plane index missing from the marshaled image
    #[error("image plane {0} is missing")]
    MissingPlane(usize),

    /// A plane buffer too small for the declared dimensions
    #[error("plane buffer truncated: need {needed} bytes, got {got}")]
    TruncatedBuffer {
        /// Bytes the declared dimensions require.
        needed: usize,
        /// Bytes the buffer actually holds.
        got: usize,
    },
}
