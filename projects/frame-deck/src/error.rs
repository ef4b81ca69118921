use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Failure kinds surfaced by a conversion request.
///
/// Every variant aborts the remaining pipeline steps. An empty sample set is
/// not an error and has no variant here.
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    /// The uploaded file could not be opened as a video stream.
    #[error("Unable to open video file: {0}")]
    SourceUnavailable(String),

    /// The request did not carry a usable file upload.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// Writing a temporary image or the final document failed.
    #[error("Failed to write output: {0}")]
    OutputWriteFailure(String),

    /// The decoder or image codec reported an error mid-stream.
    #[error("Decoder error: {0}")]
    Decode(#[from] opencv::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DeckResult<T> = Result<T, DeckError>;

impl From<std::io::Error> for DeckError {
    fn from(err: std::io::Error) -> Self {
        DeckError::OutputWriteFailure(err.to_string())
    }
}

impl From<zip::result::ZipError> for DeckError {
    fn from(err: zip::result::ZipError) -> Self {
        DeckError::OutputWriteFailure(err.to_string())
    }
}

impl DeckError {
    pub fn code(&self) -> &'static str {
        match self {
            DeckError::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            DeckError::InvalidUpload(_) => "INVALID_UPLOAD",
            DeckError::OutputWriteFailure(_) => "OUTPUT_WRITE_FAILURE",
            DeckError::Decode(_) | DeckError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DeckError::SourceUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DeckError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            DeckError::OutputWriteFailure(_) | DeckError::Decode(_) | DeckError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for DeckError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Conversion failed");
        } else {
            tracing::warn!(error = %self, "Rejected conversion request");
        }

        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = DeckError::SourceUnavailable("x.mp4".to_string());
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "SOURCE_UNAVAILABLE");

        let err = DeckError::InvalidUpload("no file".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: DeckError = io.into();
        assert_eq!(err.code(), "OUTPUT_WRITE_FAILURE");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
