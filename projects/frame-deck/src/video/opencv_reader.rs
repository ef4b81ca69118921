use super::VideoReader;
use crate::error::{DeckError, DeckResult};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT},
};
use std::path::Path;

pub struct OpencvReader {
    capture: VideoCapture,
    source_fps: f64,
    total_frames: usize,
}

impl OpencvReader {
    pub fn new(path: &Path) -> DeckResult<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| DeckError::SourceUnavailable(path.display().to_string()))?;

        if !path.is_file() {
            return Err(DeckError::SourceUnavailable(format!(
                "{} does not exist",
                path_str
            )));
        }

        // Some backends raise instead of returning an unopened capture
        let capture = VideoCapture::from_file(path_str, CAP_ANY)
            .map_err(|e| DeckError::SourceUnavailable(format!("{}: {}", path_str, e)))?;
        if !capture.is_opened().unwrap_or(false) {
            return Err(DeckError::SourceUnavailable(path_str.to_string()));
        }

        let mut fps = capture.get(CAP_PROP_FPS)?;
        if fps <= 0.0 {
            tracing::warn!("OpencvReader: Failed to get FPS from metadata, falling back to 30.0");
            fps = 30.0;
        }
        let raw_count = capture.get(CAP_PROP_FRAME_COUNT)?.max(0.0) as usize;

        tracing::info!(
            "OpencvReader: opened {}, duration={:.2}s, fps={:.2}, stream_frames={}",
            path_str,
            raw_count as f64 / fps,
            fps,
            raw_count
        );

        Ok(Self {
            capture,
            source_fps: fps,
            total_frames: raw_count,
        })
    }
}

impl VideoReader for OpencvReader {
    fn frame_count(&self) -> usize {
        self.total_frames
    }

    fn source_fps(&self) -> f64 {
        self.source_fps
    }

    fn next_frame(&mut self) -> DeckResult<Option<Mat>> {
        let mut frame = Mat::default();
        let success = self.capture.read(&mut frame)?;
        if !success || frame.empty() {
            return Ok(None);
        }

        Ok(Some(frame))
    }
}

impl Drop for OpencvReader {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!("OpencvReader: failed to release capture: {}", e);
        }
    }
}
