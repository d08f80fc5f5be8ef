//! Blob storage over `/storage/v1`

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Body;
use serde_json::json;
use tracing::debug;

use super::{check, encode_path, SupabaseClient};
use crate::backend::{BackendResult, ObjectStore, ProgressCallback};

/// Size of the body pieces handed to the transport; progress is reported
/// once per piece
const UPLOAD_CHUNK: usize = 256 * 1024;

/// Wrap `bytes` in a streaming body that reports each piece as it is sent
fn progress_body(bytes: Bytes, progress: ProgressCallback) -> Body {
    let total = bytes.len() as u64;
    let mut pieces = Vec::with_capacity(bytes.len() / UPLOAD_CHUNK + 1);
    let mut offset = 0;
    while offset < bytes.len() {
        let end = (offset + UPLOAD_CHUNK).min(bytes.len());
        pieces.push(bytes.slice(offset..end));
        offset = end;
    }

    let mut loaded = 0u64;
    let stream = stream::iter(pieces).map(move |piece| {
        loaded += piece.len() as u64;
        progress(loaded, total);
        Ok::<Bytes, std::io::Error>(piece)
    });
    Body::wrap_stream(stream)
}

#[async_trait]
impl ObjectStore for SupabaseClient {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
        progress: ProgressCallback,
    ) -> BackendResult<()> {
        let length = bytes.len();
        debug!(path = %path, bytes = length, "Uploading object");

        let request = self
            .authed(self.http.post(self.object_url(path)))?
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, length)
            .header("x-upsert", "false")
            .body(progress_body(bytes, progress.clone()));

        check(request.send().await?).await?;
        if length == 0 {
            progress(0, 0);
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        self.endpoint(&format!(
            "/storage/v1/object/public/{}/{}",
            self.config.bucket,
            encode_path(path)
        ))
    }

    async fn remove(&self, paths: &[String]) -> BackendResult<()> {
        let url = self.endpoint(&format!("/storage/v1/object/{}", self.config.bucket));
        let request = self
            .authed(self.http.delete(url))?
            .json(&json!({ "prefixes": paths }));

        check(request.send().await?).await?;
        Ok(())
    }

    async fn download(&self, path: &str) -> BackendResult<Bytes> {
        let request = self.authed(self.http.get(self.object_url(path)))?;
        let response = check(request.send().await?).await?;
        Ok(response.bytes().await?)
    }
}
