use crate::error::{DeckError, DeckResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const METADATA_FILE_NAME: &str = "metadata.json";
const OUTPUT_DIR_NAME: &str = "output";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunMetadata {
    pub original_name: String,
    pub created_at: DateTime<Utc>,
    pub run_id: String,
    #[serde(default)]
    pub slide_count: Option<usize>,
    #[serde(default)]
    pub presentation_path: Option<PathBuf>,
    #[serde(skip)]
    pub output_dir: PathBuf,
}

/// Directory owned by exactly one conversion request.
///
/// Named by a fresh UUID so concurrent uploads sharing a file name never touch
/// each other's files. On drop the uploaded video is deleted. A workspace that
/// never recorded a result is removed entirely; a finished one keeps its
/// output directory and metadata.
pub struct RequestWorkspace {
    pub metadata: RunMetadata,
    root: PathBuf,
    video_path: PathBuf,
    completed: bool,
}

impl RequestWorkspace {
    pub fn create(work_root: &Path, original_name: &str) -> DeckResult<Self> {
        let run_id = Uuid::new_v4().to_string();
        let root = work_root.join(&run_id);
        if root.exists() {
            return Err(DeckError::Internal(format!(
                "Workspace already exists for run: {}",
                run_id
            )));
        }

        let output_dir = root.join(OUTPUT_DIR_NAME);
        fs::create_dir_all(&output_dir)?;

        let video_path = root.join(format!("temp_{}", sanitize_file_name(original_name)));

        let workspace = Self {
            metadata: RunMetadata {
                original_name: original_name.to_string(),
                created_at: Utc::now(),
                run_id,
                slide_count: None,
                presentation_path: None,
                output_dir,
            },
            root,
            video_path,
            completed: false,
        };
        workspace.write_metadata()?;

        tracing::info!(
            "Created workspace {} for upload {:?}",
            workspace.root.display(),
            original_name
        );

        Ok(workspace)
    }

    pub fn run_id(&self) -> &str {
        &self.metadata.run_id
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.metadata.output_dir
    }

    pub async fn store_upload(&self, bytes: &[u8]) -> DeckResult<()> {
        tokio::fs::write(&self.video_path, bytes).await?;
        Ok(())
    }

    /// Records the finished deck in `metadata.json`.
    pub fn record_result(&mut self, presentation_path: &Path, slide_count: usize) -> DeckResult<()> {
        self.metadata.presentation_path = Some(presentation_path.to_path_buf());
        self.metadata.slide_count = Some(slide_count);
        self.write_metadata()?;
        self.completed = true;
        Ok(())
    }

    fn write_metadata(&self) -> DeckResult<()> {
        let content = serde_json::to_string_pretty(&self.metadata)
            .map_err(|e| DeckError::Internal(e.to_string()))?;
        fs::write(self.root.join(METADATA_FILE_NAME), content)?;
        Ok(())
    }
}

impl Drop for RequestWorkspace {
    fn drop(&mut self) {
        if !self.completed {
            match fs::remove_dir_all(&self.root) {
                Ok(()) => tracing::info!("Discarded unfinished workspace {}", self.root.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    "Failed to remove workspace {}: {}",
                    self.root.display(),
                    e
                ),
            }
            return;
        }

        match fs::remove_file(&self.video_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove uploaded video {}: {}",
                self.video_path.display(),
                e
            ),
        }
    }
}

/// Longest sanitized name kept, in bytes. Leaves room for the `temp_` prefix
/// well under the usual 255-byte file name limit.
const MAX_FILE_NAME_LEN: usize = 100;

/// Reduces a client-supplied file name to a safe single path component.
/// Overlong names are truncated from the stem so the extension survives.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.chars().all(|c| c == '.') {
        return "upload".to_string();
    }

    truncate_keeping_extension(cleaned)
}

// Operates on bytes; callers only pass ASCII.
fn truncate_keeping_extension(mut name: String) -> String {
    if name.len() <= MAX_FILE_NAME_LEN {
        return name;
    }

    let extension = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= 16 => name[dot..].to_string(),
        _ => String::new(),
    };
    name.truncate(MAX_FILE_NAME_LEN - extension.len());
    name.push_str(&extension);
    name
}

fn load_run(run_dir: &Path) -> DeckResult<Option<RunMetadata>> {
    let metadata_path = run_dir.join(METADATA_FILE_NAME);
    if !metadata_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(metadata_path)?;
    let mut metadata: RunMetadata =
        serde_json::from_str(&content).map_err(|e| DeckError::Internal(e.to_string()))?;
    metadata.output_dir = run_dir.join(OUTPUT_DIR_NAME);
    Ok(Some(metadata))
}

pub fn list_runs(work_root: &Path) -> DeckResult<Vec<(String, RunMetadata)>> {
    let mut outputs = Vec::new();

    if !work_root.exists() {
        return Ok(outputs);
    }

    for entry in fs::read_dir(work_root)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if let Some(metadata) = load_run(&path)? {
                let name = path
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or("unknown")
                    .to_string();
                outputs.push((name, metadata));
            }
        }
    }

    outputs.sort_by_key(|(_, metadata)| metadata.created_at);
    Ok(outputs)
}

/// Looks up a run by id. Ids that are not UUIDs never match, so the id can't
/// be used to escape the work root.
pub fn find_run(work_root: &Path, run_id: &str) -> DeckResult<Option<RunMetadata>> {
    if Uuid::parse_str(run_id).is_err() {
        return Ok(None);
    }
    load_run(&work_root.join(run_id))
}
