pub mod opencv_reader;
pub mod sampler;

use crate::error::DeckResult;
use opencv::core::Mat;

/// Sequential access to decoded frames. The underlying handle is released
/// when the reader is dropped.
pub trait VideoReader: Send {
    fn frame_count(&self) -> usize;
    fn source_fps(&self) -> f64;
    /// Returns `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> DeckResult<Option<Mat>>;
}
