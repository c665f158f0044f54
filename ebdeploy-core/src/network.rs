//! Security-group linkage between the application environment and its database.

use crate::error::{EbDeployError, Result};
use crate::polling::PollPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Tag Elastic Beanstalk puts on the resources of an environment
pub const ENVIRONMENT_NAME_TAG: &str = "elasticbeanstalk:environment-name";

/// Description of the instance security group Elastic Beanstalk creates
pub const ENVIRONMENT_GROUP_DESCRIPTION: &str = "SecurityGroup for ElasticBeanstalk environment.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    pub id: String,
    pub description: String,
}

/// Inbound rule letting `source_group` reach `destination_group` on `port`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupLink {
    pub source_group: String,
    pub destination_group: String,
    pub port: u16,
    pub protocol: String,
}

impl SecurityGroupLink {
    pub fn tcp(source_group: impl Into<String>, destination_group: impl Into<String>, port: u16) -> Self {
        Self {
            source_group: source_group.into(),
            destination_group: destination_group.into(),
            port,
            protocol: "tcp".to_string(),
        }
    }
}

/// Trait for network operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkProvider: Send + Sync {
    /// Security groups tagged with the given environment name
    async fn find_security_groups(&self, environment: &str) -> Result<Vec<SecurityGroup>>;

    /// Add the ingress rule to the destination group
    async fn authorize_ingress(&self, link: &SecurityGroupLink) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Database port opened to the environment
    pub ingress_port: u16,
    /// The environment's group appears a little after the environment is created
    pub lookup: PollPolicy,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            ingress_port: 5432,
            lookup: PollPolicy::new(Duration::from_secs(15), Some(20)),
        }
    }
}

pub struct NetworkLinker<'a> {
    provider: &'a dyn NetworkProvider,
    settings: NetworkSettings,
}

impl<'a> NetworkLinker<'a> {
    pub fn new(provider: &'a dyn NetworkProvider, settings: NetworkSettings) -> Self {
        Self { provider, settings }
    }

    /// Id of the environment's instance security group
    pub async fn resolve_environment_security_group(&self, environment: &str) -> Result<String> {
        let policy = self.settings.lookup;
        let mut checks = 0u32;

        loop {
            let groups = self.provider.find_security_groups(environment).await?;
            checks += 1;

            if let Some(group) = groups
                .into_iter()
                .find(|group| group.description == ENVIRONMENT_GROUP_DESCRIPTION)
            {
                debug!(environment, group = %group.id, checks, "Environment security group resolved");
                return Ok(group.id);
            }

            if !policy.allows_another(checks) {
                return Err(EbDeployError::validation(format!(
                    "No security group found for environment {}",
                    environment
                )));
            }
            tokio::time::sleep(policy.interval).await;
        }
    }

    /// Open the database port of `database_group` to `environment_group`
    pub async fn link(&self, environment_group: &str, database_group: &str) -> Result<SecurityGroupLink> {
        let link = SecurityGroupLink::tcp(environment_group, database_group, self.settings.ingress_port);
        self.provider.authorize_ingress(&link).await?;

        info!(
            source = %link.source_group,
            destination = %link.destination_group,
            port = link.port,
            "Ingress authorized"
        );
        Ok(link)
    }
}
