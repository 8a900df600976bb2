//! Helpers shared by the HTTP-level tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use filedrop::error::StorageError;
use filedrop::storage::{validate_name, FileIndex};
use tokio::io::{AsyncRead, AsyncReadExt};
use tower::ServiceExt;

pub const BOUNDARY: &str = "filedrop-test-boundary-7MA4YWxkTrZu0gW";
pub const HOST: &str = "files.example.com:5000";

/// In-memory stand-in for the storage directory. Listing and lookups come
/// from the map; stored bytes are also spooled to a temp dir so they can be
/// served as files.
pub struct MemoryIndex {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    spool: tempfile::TempDir,
    pub fail_listing: bool,
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self {
            files: Mutex::default(),
            spool: tempfile::tempdir().unwrap(),
            fail_listing: false,
        }
    }
}

impl MemoryIndex {
    pub fn failing() -> Self {
        Self {
            fail_listing: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, name: &str, data: &[u8]) {
        std::fs::write(self.spool.path().join(name), data).unwrap();
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), data.to_vec());
    }

    pub fn names(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl FileIndex for MemoryIndex {
    async fn list(&self) -> Result<Vec<String>, StorageError> {
        if self.fail_listing {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "permission denied",
            )));
        }
        Ok(self.names())
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.spool.path().join(name))
    }

    async fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_ok() && self.files.lock().unwrap().contains_key(name)
    }

    async fn locate(&self, name: &str) -> Result<PathBuf, StorageError> {
        let path = self.resolve(name)?;
        if !self.files.lock().unwrap().contains_key(name) {
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(path)
    }

    async fn store(
        &self,
        name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, StorageError> {
        self.resolve(name)?;
        if self.files.lock().unwrap().contains_key(name) {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        let len = data.len() as u64;
        std::fs::write(self.spool.path().join(name), &data)?;
        self.files.lock().unwrap().insert(name.to_string(), data);
        Ok(len)
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        let _ = std::fs::remove_file(self.spool.path().join(name));
        self.files
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }
}

/// One part of a multipart body.
pub struct Part<'a> {
    pub field: &'a str,
    pub filename: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn file(filename: &'a str, data: &'a [u8]) -> Self {
        Self {
            field: "file",
            filename: Some(filename),
            data,
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        part.field, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
            }
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.field).as_bytes(),
            ),
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::HOST, HOST)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::HOST, HOST)
        .body(Body::empty())
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Response<Body>) {
    let response = app.clone().oneshot(request).await.unwrap();
    (response.status(), response)
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Uploads one file and returns the `/files/...` path from the response.
pub async fn upload(app: &Router, filename: &str, data: &[u8]) -> String {
    let (status, response) = send(app, upload_request(&[Part::file(filename, data)])).await;
    assert_eq!(status, StatusCode::OK);
    body_text(response).await
}

/// Asserts `path` is `/files/{digits}_{suffix}` and returns the stored name.
pub fn assert_generated_path(path: &str, suffix: &str) -> String {
    let name = path
        .strip_prefix("/files/")
        .unwrap_or_else(|| panic!("unexpected upload path {path:?}"));
    let (millis, rest) = name.split_once('_').unwrap();
    assert!(!millis.is_empty() && millis.chars().all(|c| c.is_ascii_digit()), "{name}");
    assert_eq!(rest, suffix);
    name.to_string()
}
