//! HTTP request handlers for API endpoints

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::io::ErrorKind as IoErrorKind;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use super::types::{fields, ConvertResponse, ErrorResponse, HealthResponse};
use super::AppState;
use crate::error::{DocConvertError, ErrorKind};

impl IntoResponse for DocConvertError {
    fn into_response(self) -> Response {
        let status = match (&self, self.kind()) {
            (DocConvertError::ResultNotFound { .. }, _) => StatusCode::NOT_FOUND,
            (DocConvertError::UploadTooLarge { .. }, _) => StatusCode::PAYLOAD_TOO_LARGE,
            (_, ErrorKind::Validation) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::Conversion | ErrorKind::Storage) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Landing page
pub async fn index() -> &'static str {
    "Welcome to Document Conversion API"
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Fields collected from a `POST /convert` body.
#[derive(Default)]
struct ConvertForm {
    file: Option<(Option<String>, Vec<u8>)>,
    from: Option<String>,
    to: Option<String>,
}

/// Convert an uploaded document
///
/// Expects multipart fields `file`, `fromFormat` and `toFormat`. The
/// conversion runs in its own task: if the client goes away the request
/// future is dropped, but the conversion and its cleanup still finish.
pub async fn convert_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ConvertResponse>, DocConvertError> {
    let form = read_form(multipart, state.service.config().max_upload_bytes).await?;

    let (filename, content) = match form.file {
        Some((name, bytes)) if !bytes.is_empty() => (name, bytes),
        _ => return Err(rejected(DocConvertError::EmptyFile)),
    };
    let from = non_blank(form.from, fields::FROM_FORMAT)?;
    let to = non_blank(form.to, fields::TO_FORMAT)?;

    info!(
        "Convert request: file={:?}, {} → {}, {} bytes",
        filename,
        from,
        to,
        content.len()
    );

    let service = Arc::clone(&state.service);
    let task =
        tokio::spawn(async move { service.convert_upload(content, filename, &from, &to).await });
    let download_url = task
        .await
        .map_err(|e| DocConvertError::Internal(format!("conversion task failed: {e}")))?
        .map_err(|e| {
            if e.is_validation() {
                rejected(e)
            } else {
                e
            }
        })?;

    Ok(Json(ConvertResponse { download_url }))
}

async fn read_form(mut multipart: Multipart, limit: usize) -> Result<ConvertForm, DocConvertError> {
    let mut form = ConvertForm::default();
    let upload_err = |e: MultipartError| {
        rejected(if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            DocConvertError::UploadTooLarge { limit }
        } else {
            DocConvertError::MalformedUpload {
                detail: e.body_text(),
            }
        })
    };

    while let Some(field) = multipart.next_field().await.map_err(upload_err)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(fields::FILE) => {
                let filename = field.file_name().map(str::to_owned);
                let bytes = field.bytes().await.map_err(upload_err)?;
                if bytes.len() > limit {
                    return Err(rejected(DocConvertError::UploadTooLarge { limit }));
                }
                form.file = Some((filename, bytes.to_vec()));
            }
            Some(fields::FROM_FORMAT) => form.from = Some(field.text().await.map_err(upload_err)?),
            Some(fields::TO_FORMAT) => form.to = Some(field.text().await.map_err(upload_err)?),
            _ => {}
        }
    }
    Ok(form)
}

fn non_blank(value: Option<String>, field: &'static str) -> Result<String, DocConvertError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(rejected(DocConvertError::MissingField { field })),
    }
}

fn rejected(e: DocConvertError) -> DocConvertError {
    warn!("Rejected conversion request: {}", e);
    e
}

/// Stream a converted file
pub async fn download(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Response, DocConvertError> {
    let path = state.service.results().resolve(&file_name).map_err(|e| {
        warn!("Rejected download of {:?}", file_name);
        e
    })?;

    let not_found = || DocConvertError::ResultNotFound {
        name: file_name.clone(),
    };
    let file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) if e.kind() == IoErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(DocConvertError::storage(&path, e)),
    };
    let meta = file
        .metadata()
        .await
        .map_err(|e| DocConvertError::storage(&path, e))?;
    if !meta.is_file() {
        return Err(not_found());
    }

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        ),
        (header::CONTENT_LENGTH, meta.len().to_string()),
    ];
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body).into_response())
}
