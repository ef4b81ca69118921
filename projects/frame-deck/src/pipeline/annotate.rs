use crate::error::DeckResult;
use opencv::core::{Mat, Point, Scalar};
use opencv::imgproc::{put_text, FONT_HERSHEY_SIMPLEX, LINE_8};

/// Text origin used for frame labels, in pixels from the top-left corner.
pub const LABEL_POSITION: (i32, i32) = (50, 50);

const FONT_SCALE: f64 = 1.0;
const THICKNESS: i32 = 2;

/// Draws `text` onto `frame` in place and hands the same buffer back.
///
/// The frame is moved in for the duration of the call, so callers that need
/// the untouched image must `try_clone` it first. Text running past the frame
/// edge is clipped by opencv.
pub fn annotate(mut frame: Mat, text: &str, position: (i32, i32)) -> DeckResult<Mat> {
    let color = Scalar::new(255.0, 255.0, 255.0, 0.0); // White
    put_text(
        &mut frame,
        text,
        Point::new(position.0, position.1),
        FONT_HERSHEY_SIMPLEX,
        FONT_SCALE,
        color,
        THICKNESS,
        LINE_8,
        false,
    )?;
    Ok(frame)
}

/// Labels each frame "Frame 1", "Frame 2", ... keeping the input order.
pub fn label_frames(frames: Vec<Mat>) -> DeckResult<Vec<Mat>> {
    frames
        .into_iter()
        .enumerate()
        .map(|(i, frame)| annotate(frame, &format!("Frame {}", i + 1), LABEL_POSITION))
        .collect()
}
