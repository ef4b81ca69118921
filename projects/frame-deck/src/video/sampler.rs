use crate::error::DeckResult;
use crate::video::{opencv_reader::OpencvReader, VideoReader};
use opencv::core::Mat;
use std::path::Path;
use std::time::{Duration, Instant};

/// Every `SAMPLE_STRIDE`-th decoded frame is kept.
pub const SAMPLE_STRIDE: usize = 30;

pub struct ProcessingStats {
    pub frames_read: usize,
    pub duration: Duration,
}

/// A trait for handling decoded frames. This separates the "what to keep"
/// from the "how to read" logic.
pub trait FrameProcessor {
    /// `frame_number` is 1-based: the first decoded frame is frame 1.
    fn process(&mut self, frame_number: usize, frame: Mat) -> DeckResult<()>;
}

/// Blanket implementation so any closure with the right signature
/// automatically implements FrameProcessor.
impl<F> FrameProcessor for F
where
    F: FnMut(usize, Mat) -> DeckResult<()>,
{
    fn process(&mut self, frame_number: usize, frame: Mat) -> DeckResult<()> {
        self(frame_number, frame)
    }
}

/// Drains `reader` front to back, handing each frame to `processor`.
pub fn process_video<R, P>(reader: &mut R, mut processor: P) -> DeckResult<ProcessingStats>
where
    R: VideoReader + ?Sized,
    P: FrameProcessor,
{
    let start_time = Instant::now();
    let mut frames_read = 0;

    while let Some(frame) = reader.next_frame()? {
        frames_read += 1;
        processor.process(frames_read, frame)?;
    }

    Ok(ProcessingStats {
        frames_read,
        duration: start_time.elapsed(),
    })
}

pub fn is_sampled(frame_number: usize) -> bool {
    frame_number % SAMPLE_STRIDE == 0
}

/// Keeps frames `SAMPLE_STRIDE`, `2 * SAMPLE_STRIDE`, ... in source order.
pub fn sample_reader<R>(reader: &mut R) -> DeckResult<Vec<Mat>>
where
    R: VideoReader + ?Sized,
{
    let mut frames = Vec::new();
    let keep = |frame_number: usize, frame: Mat| -> DeckResult<()> {
        if is_sampled(frame_number) {
            frames.push(frame);
        }
        Ok(())
    };
    let stats = process_video(&mut *reader, keep)?;

    tracing::info!(
        "Sampled {} of {} frames (stride {}, container reported {} at {:.2} fps) in {:.2}s",
        frames.len(),
        stats.frames_read,
        SAMPLE_STRIDE,
        reader.frame_count(),
        reader.source_fps(),
        stats.duration.as_secs_f64()
    );

    Ok(frames)
}

/// Opens `video_path` and returns its sampled frames. The decoder handle is
/// released before this returns, on success and on failure.
pub fn sample(video_path: &Path) -> DeckResult<Vec<Mat>> {
    let mut reader = OpencvReader::new(video_path)?;
    let result = sample_reader(&mut reader);
    drop(reader);
    result
}
