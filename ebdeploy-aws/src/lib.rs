//! AWS implementations of the ebdeploy provider traits.

pub mod classify;
pub mod ec2;
pub mod elasticbeanstalk;
pub mod rds;
pub mod s3;

pub use classify::{classify, provider_error};
pub use ec2::Ec2Network;
pub use elasticbeanstalk::ElasticBeanstalkPlatform;
pub use rds::RdsDatabase;
pub use s3::S3Store;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use ebdeploy_core::AwsCredentials;
use tracing::info;

/// Name reported for credentials entered at the prompt
const CREDENTIALS_PROVIDER: &str = "ebdeploy-prompt";

/// One client per service, all bound to the session region
pub struct AwsClients {
    pub s3: S3Store,
    pub rds: RdsDatabase,
    pub elasticbeanstalk: ElasticBeanstalkPlatform,
    pub ec2: Ec2Network,
    region: String,
}

impl AwsClients {
    /// Build clients from credentials collected interactively
    pub async fn from_credentials(credentials: &AwsCredentials) -> Self {
        let provider = Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(credentials.region.clone()))
            .credentials_provider(provider)
            .load()
            .await;

        Self::from_config(&config, &credentials.region)
    }

    pub fn from_config(config: &SdkConfig, region: &str) -> Self {
        info!(region, "AWS clients configured");
        Self {
            s3: S3Store::new(aws_sdk_s3::Client::new(config), region),
            rds: RdsDatabase::new(aws_sdk_rds::Client::new(config)),
            elasticbeanstalk: ElasticBeanstalkPlatform::new(aws_sdk_elasticbeanstalk::Client::new(config)),
            ec2: Ec2Network::new(aws_sdk_ec2::Client::new(config)),
            region: region.to_string(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}
