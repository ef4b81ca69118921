use crate::cli::Args;
use crate::deck::builder::PRESENTATION_FILE_NAME;
use crate::error::{DeckError, DeckResult};
use crate::pipeline::orchestrator::convert_in_background;
use crate::run_context::{find_run, list_runs, RequestWorkspace, RunMetadata};
use axum::{
    body::{Body, Bytes},
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

const PPTX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

#[derive(Serialize)]
pub struct ProcessResponse {
    pub presentation_path: String,
}

#[derive(Serialize)]
pub struct RunInfo {
    pub name: String,
    pub metadata: RunMetadata,
}

/// Pulls the uploaded file out of the form: the field named `file`, or else
/// the first field that carries a file name.
async fn read_upload(multipart: &mut Multipart) -> DeckResult<(String, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DeckError::InvalidUpload(e.to_string()))?
    {
        let is_file_field = field.name() == Some("file");
        let file_name = field.file_name().map(|s| s.to_string());
        if !is_file_field && file_name.is_none() {
            continue;
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| DeckError::InvalidUpload(e.to_string()))?;
        return Ok((file_name.unwrap_or_else(|| "upload".to_string()), bytes));
    }

    Err(DeckError::InvalidUpload(
        "Request has no file field".to_string(),
    ))
}

/// POST /process/ - convert an uploaded video into a slide deck
pub async fn process_video(
    State(args): State<Arc<Args>>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, DeckError> {
    let (file_name, bytes) = read_upload(&mut multipart).await?;
    tracing::info!("Received upload {:?} ({} bytes)", file_name, bytes.len());

    let work_root = std::path::Path::new(&args.work_root);
    let workspace = RequestWorkspace::create(work_root, &file_name)?;
    workspace.store_upload(&bytes).await?;
    drop(bytes);

    let presentation_path = convert_in_background(workspace).await?;

    Ok(Json(ProcessResponse {
        presentation_path: presentation_path.to_string_lossy().to_string(),
    }))
}

pub async fn get_runs(State(args): State<Arc<Args>>) -> Result<Json<Vec<RunInfo>>, DeckError> {
    let work_root = std::path::Path::new(&args.work_root);
    let runs = list_runs(work_root)?;

    let info_list = runs
        .into_iter()
        .map(|(name, metadata)| RunInfo { name, metadata })
        .collect();

    Ok(Json(info_list))
}

pub async fn download_presentation(
    State(args): State<Arc<Args>>,
    Path(run_id): Path<String>,
) -> Result<Response, StatusCode> {
    let work_root = std::path::Path::new(&args.work_root);
    let run = find_run(work_root, &run_id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let path = run.output_dir.join(PRESENTATION_FILE_NAME);
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to read {}: {}", path.display(), e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    Response::builder()
        .header(header::CONTENT_TYPE, PPTX_CONTENT_TYPE)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", PRESENTATION_FILE_NAME),
        )
        .body(Body::from(data))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::test_support::{scratch_dir, write_test_video};
    use crate::web::server::build_router;
    use axum::http::Request;
    use axum::Router;
    use std::path::PathBuf;
    use tower::ServiceExt;

    const BOUNDARY: &str = "frame-deck-test-boundary";

    fn test_router(work_root: &std::path::Path) -> Router {
        build_router(Arc::new(Args {
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
            work_root: work_root.to_string_lossy().to_string(),
            max_upload_mb: 64,
        }))
    }

    fn multipart_request(field: &str, file_name: Option<&str>, data: &[u8]) -> Request<Body> {
        let disposition = match file_name {
            Some(name) => format!("form-data; name=\"{}\"; filename=\"{}\"", field, name),
            None => format!("form-data; name=\"{}\"", field),
        };
        let mut body = format!(
            "--{}\r\nContent-Disposition: {}\r\nContent-Type: application/octet-stream\r\n\r\n",
            BOUNDARY, disposition
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/process/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn leftover_uploads(work_root: &std::path::Path) -> Vec<PathBuf> {
        std::fs::read_dir(work_root)
            .unwrap()
            .filter_map(|e| e.ok())
            .flat_map(|run| std::fs::read_dir(run.path()).unwrap())
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|s| s.to_str())
                    .map(|s| s.starts_with("temp_"))
                    .unwrap_or(false)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_garbage_upload_is_unprocessable() {
        let tmp_root = scratch_dir("api-garbage");
        let root = tmp_root.path();
        let response = test_router(root)
            .oneshot(multipart_request("file", Some("clip.mp4"), b"not a video"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["code"], "SOURCE_UNAVAILABLE");
        assert!(body["error"].as_str().unwrap().contains("Unable to open video"));
        assert!(leftover_uploads(root).is_empty());
        assert!(list_runs(root).unwrap().is_empty());
        assert_eq!(std::fs::read_dir(root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_upload_is_unprocessable() {
        let tmp_root = scratch_dir("api-empty");
        let root = tmp_root.path();
        let response = test_router(root)
            .oneshot(multipart_request("file", Some("empty.mp4"), b""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(std::fs::read_dir(root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_file_field_is_bad_request() {
        let tmp_root = scratch_dir("api-nofile");
        let root = tmp_root.path();
        let response = test_router(root)
            .oneshot(multipart_request("note", None, b"hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["code"], "INVALID_UPLOAD");
    }

    #[tokio::test]
    async fn test_process_list_and_download() {
        let tmp_root = scratch_dir("api-roundtrip");
        let root = tmp_root.path();
        let tmp_src = scratch_dir("api-roundtrip-src");
        let source = tmp_src.path().join("clip.avi");
        write_test_video(&source, 90);
        let video = std::fs::read(&source).unwrap();
        let router = test_router(root);

        let response = router
            .clone()
            .oneshot(multipart_request("file", Some("clip.avi"), &video))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let presentation = PathBuf::from(body["presentation_path"].as_str().unwrap());
        assert!(presentation.ends_with("output/presentation.pptx"));
        assert!(std::fs::metadata(&presentation).unwrap().len() > 0);
        assert!(leftover_uploads(root).is_empty());

        let response = router
            .clone()
            .oneshot(Request::get("/runs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let runs = json_body(response).await;
        let runs = runs.as_array().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0]["metadata"]["original_name"], "clip.avi");
        assert_eq!(runs[0]["metadata"]["slide_count"], 3);
        let run_id = runs[0]["name"].as_str().unwrap().to_string();

        let response = router
            .clone()
            .oneshot(
                Request::get(format!("/runs/{}/presentation", run_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            PPTX_CONTENT_TYPE
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(bytes.len() as u64, std::fs::metadata(&presentation).unwrap().len());

        let response = router
            .oneshot(
                Request::get("/runs/not-a-run/presentation")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_concurrent_uploads_with_same_name_do_not_collide() {
        let tmp_root = scratch_dir("api-concurrent");
        let root = tmp_root.path();
        let tmp_src_dir = scratch_dir("api-concurrent-src");
        let src_dir = tmp_src_dir.path();
        let long = src_dir.join("long.avi");
        let short = src_dir.join("short.avi");
        write_test_video(&long, 90);
        write_test_video(&short, 60);
        let long = std::fs::read(&long).unwrap();
        let short = std::fs::read(&short).unwrap();
        let router = test_router(root);

        let (a, b) = tokio::join!(
            router
                .clone()
                .oneshot(multipart_request("file", Some("same.avi"), &long)),
            router
                .clone()
                .oneshot(multipart_request("file", Some("same.avi"), &short)),
        );
        let a = json_body(a.unwrap()).await;
        let b = json_body(b.unwrap()).await;
        assert_ne!(a["presentation_path"], b["presentation_path"]);

        let mut counts: Vec<u64> = list_runs(root)
            .unwrap()
            .into_iter()
            .map(|(_, m)| m.slide_count.unwrap() as u64)
            .collect();
        counts.sort();
        assert_eq!(counts, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_health() {
        let tmp_root = scratch_dir("api-health");
        let root = tmp_root.path();
        let response = test_router(root)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
