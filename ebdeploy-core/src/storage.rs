//! Object storage for packaged repository archives.

use crate::archive::PackagedArchive;
use crate::error::Result;
use crate::naming;
use crate::prompt::{notify, Prompter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::info;

/// Trait for object storage operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a bucket in the session region
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Upload the file at `path` under `key`
    async fn upload(&self, bucket: &str, key: &str, path: &Path) -> Result<()>;
}

/// Where an archive ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArchive {
    pub bucket: String,
    pub key: String,
}

/// Creates a fresh bucket per run and uploads the archive into it
pub struct ArchivePublisher<'a> {
    store: &'a dyn ObjectStore,
    prompter: &'a dyn Prompter,
    region: String,
}

impl<'a> ArchivePublisher<'a> {
    pub fn new(store: &'a dyn ObjectStore, prompter: &'a dyn Prompter, region: impl Into<String>) -> Self {
        Self {
            store,
            prompter,
            region: region.into(),
        }
    }

    /// Publish `archive` into a bucket named after `repo` and `at`
    pub async fn publish(
        &self,
        repo: &str,
        archive: &PackagedArchive,
        at: DateTime<Utc>,
    ) -> Result<PublishedArchive> {
        let bucket = naming::bucket_name(repo, at);

        notify(self.prompter, &format!("ℹ️  Creating S3 bucket {}", bucket)).await;
        self.store.create_bucket(&bucket).await?;
        notify(self.prompter, &format!("✅ S3 bucket {} created", bucket)).await;

        notify(self.prompter, &format!("ℹ️  Uploading {} to {}", archive.key, bucket)).await;
        self.store.upload(&bucket, &archive.key, &archive.path).await?;
        notify(
            self.prompter,
            &format!(
                "✅ {} uploaded to S3: {}",
                archive.key,
                naming::bucket_console_url(&self.region, &bucket)
            ),
        )
        .await;

        info!(bucket = %bucket, key = %archive.key, size_bytes = archive.size_bytes, sha256 = %archive.sha256, "Archive published");
        Ok(PublishedArchive {
            bucket,
            key: archive.key.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EbDeployError, ProviderError};
    use crate::prompt::testing::ScriptedPrompter;
    use chrono::TimeZone;
    use mockall::predicate::eq;
    use std::path::PathBuf;

    fn archive() -> PackagedArchive {
        PackagedArchive {
            name: "myapp-1a2b3c4".to_string(),
            path: PathBuf::from("/tmp/myapp-1a2b3c4.zip"),
            key: "myapp-1a2b3c4.zip".to_string(),
            size_bytes: 42,
            sha256: "00".repeat(32),
        }
    }

    #[tokio::test]
    async fn test_publish_creates_bucket_and_uploads() {
        let mut store = MockObjectStore::new();
        store
            .expect_create_bucket()
            .with(eq("myapp-20240309070501"))
            .times(1)
            .returning(|_| Ok(()));
        store
            .expect_upload()
            .withf(|bucket, key, path| {
                bucket == "myapp-20240309070501"
                    && key == "myapp-1a2b3c4.zip"
                    && path == Path::new("/tmp/myapp-1a2b3c4.zip")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let prompter = ScriptedPrompter::new(vec![]);

        let publisher = ArchivePublisher::new(&store, &prompter, "eu-west-1");
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let published = publisher.publish("MyApp", &archive(), at).await.unwrap();

        assert_eq!(published.bucket, "myapp-20240309070501");
        assert_eq!(published.key, "myapp-1a2b3c4.zip");
        assert!(prompter
            .printed()
            .iter()
            .any(|line| line.contains("s3.console.aws.amazon.com/s3/buckets/myapp-20240309070501")));
    }

    #[tokio::test]
    async fn test_bucket_failure_skips_upload() {
        let mut store = MockObjectStore::new();
        store
            .expect_create_bucket()
            .returning(|_| Err(ProviderError::other("s3", "BucketAlreadyOwnedByYou").into()));
        store.expect_upload().never();
        let prompter = ScriptedPrompter::new(vec![]);

        let publisher = ArchivePublisher::new(&store, &prompter, "eu-west-1");
        let result = publisher.publish("myapp", &archive(), Utc::now()).await;

        assert!(matches!(result, Err(EbDeployError::Provider(_))));
    }
}
