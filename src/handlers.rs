use crate::error::{ApiError, StorageError};
use crate::models::FileListing;
use crate::naming::{generated_name, now_millis};
use crate::AppState;
use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Multipart, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use std::io;
use tokio_util::io::StreamReader;
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Name of the multipart field carrying the upload.
pub const FILE_FIELD: &str = "file";

/// Attempts made to find a free name when the generated one is taken.
const MAX_NAME_ATTEMPTS: i64 = 16;

pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, ApiError> {
    let mut multipart = multipart.map_err(|err| ApiError::BadUpload(err.body_text()))?;
    let mut stored: Option<(String, u64)> = None;

    if let Err(err) = receive_upload(&state, &mut multipart, &mut stored).await {
        if let Some((name, _)) = stored {
            if let Err(cleanup) = state.index.remove(&name).await {
                tracing::warn!(%name, error = %cleanup, "failed to discard rejected upload");
            }
        }
        return Err(err);
    }

    match stored {
        Some((name, size)) => {
            tracing::info!(%name, size, "file uploaded");
            Ok(format!("/files/{}", name))
        }
        None => Err(ApiError::BadUpload("No file uploaded".to_string())),
    }
}

/// Walks the multipart body, storing the single `file` part. Text parts are
/// skipped.
async fn receive_upload(
    state: &AppState,
    multipart: &mut Multipart,
    stored: &mut Option<(String, u64)>,
) -> Result<(), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadUpload(err.body_text()))?
    {
        let Some(original) = field.file_name().map(str::to_owned) else {
            continue;
        };
        if field.name() != Some(FILE_FIELD) || stored.is_some() {
            return Err(ApiError::BadUpload("Unexpected field".to_string()));
        }

        let body = field.map_err(io::Error::other);
        let reader = StreamReader::new(body);
        tokio::pin!(reader);

        let millis = now_millis();
        let mut attempt = 0;
        let (name, size) = loop {
            let name = generated_name(millis + attempt, &original);
            match state.index.store(&name, &mut reader).await {
                Ok(size) => break (name, size),
                Err(StorageError::AlreadyExists(_)) if attempt + 1 < MAX_NAME_ATTEMPTS => {
                    attempt += 1;
                }
                Err(err) => return Err(ApiError::BadUpload(err.to_string())),
            }
        };
        *stored = Some((name, size));
    }
    Ok(())
}

pub async fn list_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<Vec<FileListing>>, ApiError> {
    let names = state.index.list().await.map_err(|err| {
        tracing::error!(error = %err, "directory listing failed");
        ApiError::ScanFailed
    })?;

    let hostname = request_hostname(&headers, &uri);
    let listing = names
        .into_iter()
        .map(|name| FileListing {
            url: format!(
                "{}://{}:{}/files/{}",
                state.scheme, hostname, state.public_port, name
            ),
            name,
        })
        .collect();

    Ok(Json(listing))
}

/// Serves `/files/{name}`. The stored name is taken from the raw request
/// path, so the encoded name handed out by the upload is used verbatim.
/// Range and conditional requests are answered by [`ServeFile`].
pub async fn serve_file(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let name = request
        .uri()
        .path()
        .strip_prefix("/files/")
        .ok_or(ApiError::FileNotFound)?
        .to_owned();

    if !state.index.exists(&name).await {
        tracing::debug!(%name, "requested file is not accessible");
        return Err(ApiError::FileNotFound);
    }

    let path = state.index.locate(&name).await.map_err(|err| {
        tracing::debug!(%name, error = %err, "failed to locate stored file");
        ApiError::FileNotFound
    })?;

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    if response.status() == StatusCode::NOT_FOUND {
        return Err(ApiError::FileNotFound);
    }

    let mut response = response.map(Body::new);
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=0"),
    );
    Ok(response)
}

/// Anything under `/files/` that no route matched, such as `/files/` itself.
pub async fn unmatched(uri: Uri) -> Response {
    if uri.path().starts_with("/files/") {
        ApiError::FileNotFound.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Hostname the client used, without a port. IPv6 literals keep their
/// brackets.
pub fn request_hostname(headers: &HeaderMap, uri: &Uri) -> String {
    let authority = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.authority().map(|authority| authority.as_str()))
        .map(str::trim)
        .filter(|host| !host.is_empty());

    let Some(authority) = authority else {
        return "localhost".to_string();
    };

    if authority.starts_with('[') {
        if let Some(end) = authority.find(']') {
            return authority[..=end].to_string();
        }
    }

    match authority.rsplit_once(':') {
        Some((host, _port)) => host.to_string(),
        None => authority.to_string(),
    }
}
