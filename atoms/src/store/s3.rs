use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use super::BlobStore;
use crate::error::{AtomError, AtomResult};

/// Photo storage in a single S3 bucket. URLs use the virtual-hosted style.
#[derive(Clone, Debug)]
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", self.bucket, key)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AtomResult<String> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| AtomError::store("S3 put_object error", e))?;

        tracing::info!(bucket = %self.bucket, key, size, "📤 photo uploaded");
        Ok(self.object_url(key))
    }

    async fn delete_object(&self, key: &str) -> AtomResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AtomError::store("S3 delete_object error", e))?;
        Ok(())
    }
}
