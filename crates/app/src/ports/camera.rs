//! Camera port — attachment capture for motion events.

use std::future::Future;

use domisafe_domain::time::Timestamp;

/// Why an attachment could not be captured.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The capture tool or device is missing.
    #[error("camera unavailable")]
    Unavailable,

    /// Writing the capture to disk failed.
    #[error("capture I/O error")]
    Io(#[from] std::io::Error),

    /// The capture tool ran and reported a failure.
    #[error("capture failed: {0}")]
    Failed(String),
}

/// Captures an image (or placeholder) and returns its path.
pub trait Camera: Send + Sync {
    /// Capture an attachment for an event that happened at `at`.
    fn capture(
        &self,
        at: Timestamp,
    ) -> impl Future<Output = Result<String, CaptureError>> + Send;
}

impl<T: Camera> Camera for std::sync::Arc<T> {
    fn capture(
        &self,
        at: Timestamp,
    ) -> impl Future<Output = Result<String, CaptureError>> + Send {
        (**self).capture(at)
    }
}
