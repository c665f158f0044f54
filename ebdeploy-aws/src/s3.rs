use crate::classify::sdk_error;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use ebdeploy_core::{ObjectStore, ProviderError, Result};
use std::path::Path;
use tracing::debug;

/// Region where buckets are created without a location constraint
const DEFAULT_BUCKET_REGION: &str = "us-east-1";

/// S3-backed object store
pub struct S3Store {
    client: Client,
    region: String,
}

impl S3Store {
    pub fn new(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    fn bucket_configuration(&self) -> Option<CreateBucketConfiguration> {
        (self.region != DEFAULT_BUCKET_REGION).then(|| {
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build()
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .set_create_bucket_configuration(self.bucket_configuration())
            .send()
            .await
            .map_err(sdk_error("s3"))?;

        debug!(bucket, region = %self.region, "Bucket created");
        Ok(())
    }

    async fn upload(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| ProviderError::other("s3", format!("cannot read {}: {}", path.display(), e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/zip")
            .body(body)
            .send()
            .await
            .map_err(sdk_error("s3"))?;

        debug!(bucket, key, "Object uploaded");
        Ok(())
    }
}
