// Conversion orchestrator: drives sampler -> annotator -> deck builder
//
// Runs synchronously on the calling thread. Any failure aborts the remaining
// stages; there is no partial result.

use crate::deck::builder;
use crate::error::{DeckError, DeckResult};
use crate::pipeline::annotate::label_frames;
use crate::run_context::RequestWorkspace;
use crate::video::sampler;
use std::path::PathBuf;
use std::time::Instant;

pub fn convert(workspace: &mut RequestWorkspace) -> DeckResult<PathBuf> {
    let start_time = Instant::now();
    tracing::info!("Starting conversion for run_id: {}", workspace.run_id());

    let frames = sampler::sample(workspace.video_path())?;
    let frames = label_frames(frames)?;
    let presentation_path = builder::build(&frames, workspace.output_dir())?;
    workspace.record_result(&presentation_path, frames.len())?;

    tracing::info!(
        "Finished run_id: {} with {} slides in {:.2}s",
        workspace.run_id(),
        frames.len(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(presentation_path)
}

/// Runs `convert` on the blocking pool, consuming the workspace. The uploaded
/// video is removed when the task ends, whatever the outcome.
pub async fn convert_in_background(mut workspace: RequestWorkspace) -> DeckResult<PathBuf> {
    tokio::task::spawn_blocking(move || convert(&mut workspace))
        .await
        .map_err(|e| DeckError::Internal(format!("Conversion task failed: {}", e)))?
}
