//! Asset uploads with size checks, retries and reconciliation.

use base64::Engine;
use md5::{Digest, Md5};
use std::path::Path;
use std::sync::Arc;

use super::host::{AssetHost, PutOutcome};
use crate::core::UploadResult;
use crate::errors::{PodflowError, PodflowResult};
use crate::events::EventSink;
use crate::pipeline::{with_retry, RetryPolicy};

/// Uploads local files to an [`AssetHost`].
pub struct AssetUploader {
    host: Arc<dyn AssetHost>,
    policy: RetryPolicy,
    sink: Arc<dyn EventSink>,
    max_upload_bytes: u64,
}

/// Hex digest and base64 `Content-MD5` header value of `bytes`.
#[must_use]
pub fn checksums(bytes: &[u8]) -> (String, String) {
    let digest = Md5::digest(bytes);
    (
        format!("{digest:x}"),
        base64::engine::general_purpose::STANDARD.encode(digest),
    )
}

impl AssetUploader {
    /// Creates an uploader.
    #[must_use]
    pub fn new(
        host: Arc<dyn AssetHost>,
        policy: RetryPolicy,
        sink: Arc<dyn EventSink>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            host,
            policy,
            sink,
            max_upload_bytes,
        }
    }

    /// Uploads the file at `path` under its file name.
    ///
    /// Missing files and files over the size limit fail with
    /// [`PodflowError::InvalidInput`] before any request is made. When the
    /// host already holds an object with the same name its existing URL is
    /// returned and the result is marked reconciled.
    pub async fn upload(&self, path: &Path) -> PodflowResult<UploadResult> {
        let object_name = default_object_name(path)?;
        self.upload_as(path, &object_name).await
    }

    /// Uploads the file at `path` under `object_name`.
    pub async fn upload_as(&self, path: &Path, object_name: &str) -> PodflowResult<UploadResult> {
        self.check(path).await?;
        let bytes = tokio::fs::read(path).await?;
        let (checksum, content_md5) = checksums(&bytes);
        let key = format!("upload:{object_name}");

        let outcome = with_retry(&self.policy, &key, self.sink.as_ref(), || {
            let host = self.host.as_ref();
            let bytes = bytes.clone();
            let content_md5 = content_md5.as_str();
            async move {
                match host.put(object_name, bytes, content_md5).await? {
                    PutOutcome::Created(url) => Ok((url, false)),
                    PutOutcome::AlreadyExists => {
                        tracing::debug!(object = object_name, "object exists, reconciling");
                        host.existing_url(object_name).await.map(|url| (url, true))
                    }
                }
            }
        })
        .await?;

        let (url, reconciled) = outcome.value;
        tracing::info!(
            object = %object_name,
            attempt = outcome.attempt,
            reconciled,
            "asset uploaded"
        );

        let result = UploadResult::new(url, outcome.attempt, checksum);
        Ok(if reconciled { result.reconciled() } else { result })
    }

    async fn check(&self, path: &Path) -> PodflowResult<()> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            PodflowError::invalid_input(format!("asset {} is not readable: {e}", path.display()))
        })?;
        if !metadata.is_file() {
            return Err(PodflowError::invalid_input(format!(
                "asset {} is not a file",
                path.display()
            )));
        }
        if metadata.len() > self.max_upload_bytes {
            return Err(PodflowError::invalid_input(format!(
                "asset {} is {} bytes, exceeds max size of {} bytes",
                path.display(),
                metadata.len(),
                self.max_upload_bytes
            )));
        }

        Ok(())
    }
}

/// The final path component, used as the default object name.
pub fn default_object_name(path: &Path) -> PodflowResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            PodflowError::invalid_input(format!("asset {} has no file name", path.display()))
        })
}
