use crate::deck::package::{Emu, Presentation, SlideLayout};
use crate::error::{DeckError, DeckResult};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const PRESENTATION_FILE_NAME: &str = "presentation.pptx";

const PICTURE_LEFT_IN: f64 = 1.0;
const PICTURE_TOP_IN: f64 = 1.0;
const PICTURE_HEIGHT_IN: f64 = 5.5;

pub fn frame_image_path(output_dir: &Path, index: usize) -> PathBuf {
    output_dir.join(format!("frame_{}.jpg", index))
}

/// Builds one slide per frame, in order, and saves the deck as
/// `output_dir/presentation.pptx`. `output_dir` must already exist.
///
/// Each frame goes through a temporary `frame_{i}.jpg` which is removed as
/// soon as its bytes are embedded in the document.
pub fn build(frames: &[Mat], output_dir: &Path) -> DeckResult<PathBuf> {
    let start_time = Instant::now();
    let mut deck = Presentation::new();

    for (i, frame) in frames.iter().enumerate() {
        let slide = deck.add_slide(SlideLayout::TitleOnly);
        slide.set_title(format!("Slide {}", i + 1));

        let img_path = frame_image_path(output_dir, i);
        let img_str = img_path
            .to_str()
            .ok_or_else(|| DeckError::OutputWriteFailure(img_path.display().to_string()))?;
        if !imgcodecs::imwrite(img_str, frame, &Vector::new())? {
            return Err(DeckError::OutputWriteFailure(format!(
                "Failed to write frame image {}",
                img_str
            )));
        }

        let embedded = slide.add_picture(
            &img_path,
            Emu::inches(PICTURE_LEFT_IN),
            Emu::inches(PICTURE_TOP_IN),
            Emu::inches(PICTURE_HEIGHT_IN),
        );
        // The bytes are in the document now (or the insert failed); either way
        // the temporary image has no further reader.
        let removed = fs::remove_file(&img_path);
        embedded?;
        removed?;
    }

    let presentation_path = output_dir.join(PRESENTATION_FILE_NAME);
    deck.save(&presentation_path)?;

    tracing::info!(
        "Wrote {} slides to {} in {:.2}s",
        deck.slides().len(),
        presentation_path.display(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(presentation_path)
}
