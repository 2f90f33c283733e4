//! Virtual camera — writes a placeholder file instead of an image.

use std::path::{Path, PathBuf};

use domisafe_app::ports::{Camera, CaptureError};
use domisafe_domain::time::{self, Timestamp};

/// Writes `motion_<YYYYmmdd_HHMMSS>.txt` placeholders into an image directory.
pub struct VirtualCamera {
    image_dir: PathBuf,
}

impl VirtualCamera {
    #[must_use]
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
        }
    }

    #[must_use]
    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }
}

impl Camera for VirtualCamera {
    async fn capture(&self, at: Timestamp) -> Result<String, CaptureError> {
        tokio::fs::create_dir_all(&self.image_dir).await?;
        let file_name = format!("motion_{}.txt", at.format("%Y%m%d_%H%M%S"));
        let path = self.image_dir.join(file_name);
        let body = format!("placeholder capture at {}\n", time::format_iso(&at));
        tokio::fs::write(&path, body).await?;

        tracing::debug!(path = %path.display(), "virtual capture written");
        Ok(path.to_string_lossy().into_owned())
    }
}
