//! S3 transport
//!
//! Works against AWS S3 and S3-compatible stores (MinIO, Wasabi, ...). A
//! custom endpoint switches the client to path-style addressing. Archives at
//! or above the multipart threshold are uploaded in parts, and downloads are
//! streamed straight to disk.

use crate::traits::{RemoteHandle, Transport};
use crate::utils::{file_name, join_key, relative_segments, with_retry};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use satchel_core::config::S3Settings;
use satchel_core::{Error, Result, RetryPolicy};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Files at or above this size are uploaded with a multipart upload
pub const MULTIPART_THRESHOLD: u64 = 64 * 1024 * 1024;

/// Default size of each uploaded part
pub const PART_SIZE: u64 = 64 * 1024 * 1024;

/// S3 rejects multipart uploads with more parts than this
const MAX_PARTS: u64 = 10_000;

/// Deposits archives as objects and retrieves objects by key or prefix
pub struct S3Transport {
    client: Client,
    bucket: String,
    prefix: String,
    policy: RetryPolicy,
    multipart_threshold: u64,
    part_size: u64,
}

impl S3Transport {
    pub async fn new(settings: &S3Settings, policy: RetryPolicy) -> Result<Self> {
        let client = Self::create_client(&settings.region, settings.endpoint.as_deref()).await;
        Ok(Self::with_client(client, settings, policy))
    }

    /// Build around an existing client
    pub fn with_client(client: Client, settings: &S3Settings, policy: RetryPolicy) -> Self {
        Self {
            client,
            bucket: settings.bucket.clone(),
            prefix: settings.prefix.clone(),
            policy,
            multipart_threshold: MULTIPART_THRESHOLD,
            part_size: PART_SIZE,
        }
    }

    /// Upload files of at least `threshold` bytes in parts of `part_size` bytes
    pub fn with_multipart(mut self, threshold: u64, part_size: u64) -> Self {
        self.multipart_threshold = threshold;
        self.part_size = part_size.max(1);
        self
    }

    async fn create_client(region: &str, endpoint: Option<&str>) -> Client {
        let region = Region::new(region.to_string());

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .load()
            .await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        if let Some(endpoint_url) = endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint_url);
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint_url)
                .force_path_style(true);
        }

        Client::from_conf(s3_config_builder.build())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Full object key for a path relative to the configured prefix
    fn make_key(&self, parts: &[&str]) -> String {
        join_key(std::iter::once(self.prefix.as_str()).chain(parts.iter().copied()))
    }

    fn object_url(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    /// Stream one object into `dest`; a missing key is `NotFound` and never retried
    async fn get_object(&self, key: &str, dest: &Path) -> Result<()> {
        let context = format!("get {}", self.object_url(key));
        let result = with_retry(&self.policy, &context, || async {
            let resp = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| {
                    if e.as_service_error().is_some_and(GetObjectError::is_no_such_key) {
                        Error::not_found(self.object_url(key))
                    } else {
                        Error::transport(&context, DisplayErrorContext(e).to_string())
                    }
                })?;

            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::transport(&context, e.to_string()))?;
            }
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| Error::transport(&context, e.to_string()))?;
            let body = resp.body.into_async_read();
            tokio::pin!(body);
            let copied = tokio::io::copy(&mut body, &mut file)
                .await
                .map_err(|e| Error::transport(&context, e.to_string()))?;
            file.flush()
                .await
                .map_err(|e| Error::transport(&context, e.to_string()))?;
            Ok(copied)
        })
        .await;

        match result {
            Ok(copied) => {
                debug!("Downloaded {} bytes from {}", copied, self.object_url(key));
                Ok(())
            }
            Err(e) => {
                if dest.exists() {
                    let _ = tokio::fs::remove_file(dest).await;
                }
                Err(e)
            }
        }
    }

    /// Every key under `prefix`, following continuation tokens
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let context = format!("list {}", self.object_url(prefix));
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let token = continuation_token.clone();
            let resp = with_retry(&self.policy, &context, || {
                let mut request = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(prefix);
                if let Some(token) = token.clone() {
                    request = request.continuation_token(token);
                }
                let context = context.clone();
                async move {
                    request
                        .send()
                        .await
                        .map_err(|e| Error::transport(context, DisplayErrorContext(e).to_string()))
                }
            })
            .await?;

            for object in resp.contents() {
                if let Some(key) = object.key() {
                    if !key.ends_with('/') {
                        keys.push(key.to_string());
                    }
                }
            }

            if resp.is_truncated() == Some(true) {
                continuation_token = resp.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        debug!("Found {} objects under {}", keys.len(), self.object_url(prefix));
        Ok(keys)
    }

    async fn put_single(&self, local_path: &Path, key: &str, context: &str) -> Result<()> {
        with_retry(&self.policy, context, || async {
            let body = ByteStream::from_path(local_path)
                .await
                .map_err(|e| Error::transport(context, e.to_string()))?;
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map_err(|e| Error::transport(context, DisplayErrorContext(e).to_string()))?;
            Ok(())
        })
        .await
    }

    /// Upload in parts, aborting the upload if any part or the completion fails
    async fn put_multipart(&self, local_path: &Path, key: &str, len: u64, context: &str) -> Result<()> {
        let upload_id = with_retry(&self.policy, context, || async {
            let resp = self
                .client
                .create_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| Error::transport(context, DisplayErrorContext(e).to_string()))?;
            resp.upload_id()
                .map(str::to_string)
                .ok_or_else(|| Error::transport(context, "no upload id returned"))
        })
        .await?;

        let ranges = part_ranges(len, self.part_size);
        debug!(
            "Uploading {} in {} parts (upload {})",
            local_path.display(),
            ranges.len(),
            upload_id
        );

        let result: Result<()> = async {
            let mut parts = Vec::with_capacity(ranges.len());
            for &(part_number, offset, length) in &ranges {
                parts.push(
                    self.upload_part(local_path, key, &upload_id, part_number, offset, length, context)
                        .await?,
                );
            }

            let upload = CompletedMultipartUpload::builder()
                .set_parts(Some(parts))
                .build();
            with_retry(&self.policy, context, || async {
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(upload.clone())
                    .send()
                    .await
                    .map_err(|e| Error::transport(context, DisplayErrorContext(e).to_string()))?;
                Ok(())
            })
            .await
        }
        .await;

        if result.is_err() {
            self.abort_multipart(key, &upload_id).await;
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn upload_part(
        &self,
        local_path: &Path,
        key: &str,
        upload_id: &str,
        part_number: i32,
        offset: u64,
        length: u64,
        context: &str,
    ) -> Result<CompletedPart> {
        let e_tag = with_retry(&self.policy, context, || async {
            let body = ByteStream::read_from()
                .path(local_path)
                .offset(offset)
                .length(Length::Exact(length))
                .build()
                .await
                .map_err(|e| Error::transport(context, e.to_string()))?;
            let resp = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(body)
                .send()
                .await
                .map_err(|e| Error::transport(context, DisplayErrorContext(e).to_string()))?;
            Ok(resp.e_tag().map(str::to_string))
        })
        .await?;

        Ok(CompletedPart::builder()
            .part_number(part_number)
            .set_e_tag(e_tag)
            .build())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        let outcome = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await;
        match outcome {
            Ok(_) => debug!("Aborted multipart upload {} of {}", upload_id, self.object_url(key)),
            Err(e) => warn!(
                "Failed to abort multipart upload {} of {}: {}",
                upload_id,
                self.object_url(key),
                DisplayErrorContext(e)
            ),
        }
    }
}

/// `(part number, offset, length)` for each part of a `len`-byte upload
///
/// Parts grow past `part_size` when needed to stay within [`MAX_PARTS`].
fn part_ranges(len: u64, part_size: u64) -> Vec<(i32, u64, u64)> {
    let part_size = part_size.max(len.div_ceil(MAX_PARTS)).max(1);
    (0..len.div_ceil(part_size))
        .map(|index| {
            let offset = index * part_size;
            ((index + 1) as i32, offset, part_size.min(len - offset))
        })
        .collect()
}

#[async_trait]
impl Transport for S3Transport {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn send_file(&self, local_path: &Path, remote_dir: Option<&str>) -> Result<RemoteHandle> {
        let name = file_name(local_path)?;
        let key = self.make_key(&[remote_dir.unwrap_or_default(), name.as_str()]);
        let context = format!("put {}", self.object_url(&key));

        let len = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| Error::transport(&context, e.to_string()))?
            .len();
        if len > 0 && len >= self.multipart_threshold {
            self.put_multipart(local_path, &key, len, &context).await?;
        } else {
            self.put_single(local_path, &key, &context).await?;
        }

        info!("Uploaded {} to {}", local_path.display(), self.object_url(&key));
        Ok(RemoteHandle::Object {
            bucket: self.bucket.clone(),
            key,
        })
    }

    async fn retrieve_file(&self, remote_path: &str, local_dir: &Path) -> Result<PathBuf> {
        let segments = relative_segments(remote_path)?;
        let name = segments
            .last()
            .cloned()
            .ok_or_else(|| Error::transport(remote_path, "remote path names no object"))?;
        let key = self.make_key(&segments.iter().map(String::as_str).collect::<Vec<_>>());

        let dest = local_dir.join(name);
        self.get_object(&key, &dest).await?;
        Ok(dest)
    }

    async fn retrieve_from_path(&self, local_path: &Path, remote_path: Option<&str>) -> Result<()> {
        let base = match remote_path {
            Some(path) => self.make_key(&[path]),
            None => self.make_key(&[]),
        };
        let list_prefix = if base.is_empty() {
            String::new()
        } else {
            format!("{}/", base)
        };

        let keys = self.list_keys(&list_prefix).await?;
        if keys.is_empty() {
            return Err(Error::not_found(self.object_url(&list_prefix)));
        }
        for key in &keys {
            let relative = key.strip_prefix(&list_prefix).unwrap_or(key);
            let mut dest = local_path.to_path_buf();
            dest.extend(relative_segments(relative)?);
            self.get_object(key, &dest).await?;
        }

        info!(
            "Retrieved {} objects from {} into {}",
            keys.len(),
            self.object_url(&list_prefix),
            local_path.display()
        );
        Ok(())
    }
}

impl std::fmt::Debug for S3Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Transport")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("multipart_threshold", &self.multipart_threshold)
            .finish_non_exhaustive()
    }
}
