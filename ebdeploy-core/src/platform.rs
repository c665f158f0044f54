//! Elastic Beanstalk application, environment and version management.

use crate::error::{EbDeployError, Result};
use crate::naming;
use crate::polling::RetryPolicy;
use crate::prompt::{choose_or_enter, notify, Prompter};
use crate::source::RuntimePlatform;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Option namespace for the Node.js container
pub const NODE_CONTAINER_NAMESPACE: &str = "aws:elasticbeanstalk:container:nodejs";

/// A namespaced environment configuration option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentOption {
    pub namespace: String,
    pub option_name: String,
    pub value: String,
}

/// Parameters for a new environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSpec {
    pub application: String,
    pub environment: String,
    pub cname_prefix: String,
    pub solution_stack: String,
    pub options: Vec<EnvironmentOption>,
}

/// Parameters for a new application version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpec {
    pub application: String,
    pub label: String,
    pub description: String,
    pub bucket: String,
    pub key: String,
}

/// Trait for application platform operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformProvider: Send + Sync {
    async fn create_application(&self, name: &str) -> Result<()>;

    async fn create_environment(&self, spec: &EnvironmentSpec) -> Result<()>;

    /// Register a source bundle as a version, auto-creating the application
    async fn create_application_version(&self, spec: &VersionSpec) -> Result<()>;

    /// Point `environment` at `version_label`
    async fn update_environment(&self, environment: &str, version_label: &str) -> Result<()>;

    async fn list_applications(&self) -> Result<Vec<String>>;

    async fn list_environments(&self, application: &str) -> Result<Vec<String>>;
}

/// Solution stacks and the deploy retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSettings {
    pub go_stack: String,
    pub node_stack: String,
    pub deploy: RetryPolicy,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            go_stack: "64bit Amazon Linux 2018.03 v2.14.2 running Go 1.13.6".to_string(),
            node_stack: "64bit Amazon Linux 2018.03 v4.13.0 running Node.js".to_string(),
            deploy: RetryPolicy::default(),
        }
    }
}

impl PlatformSettings {
    /// Solution stack and extra options for a runtime
    pub fn stack_for(&self, platform: RuntimePlatform) -> (String, Vec<EnvironmentOption>) {
        match platform {
            RuntimePlatform::Go => (self.go_stack.clone(), Vec::new()),
            RuntimePlatform::Node => (
                self.node_stack.clone(),
                vec![EnvironmentOption {
                    namespace: NODE_CONTAINER_NAMESPACE.to_string(),
                    option_name: "NodeCommand".to_string(),
                    value: "npm start".to_string(),
                }],
            ),
        }
    }
}

/// Application and environment a version was deployed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    pub application: String,
    pub environment: String,
}

pub struct PlatformProvisioner<'a> {
    provider: &'a dyn PlatformProvider,
    prompter: &'a dyn Prompter,
    settings: PlatformSettings,
}

impl<'a> PlatformProvisioner<'a> {
    pub fn new(
        provider: &'a dyn PlatformProvider,
        prompter: &'a dyn Prompter,
        settings: PlatformSettings,
    ) -> Self {
        Self {
            provider,
            prompter,
            settings,
        }
    }

    /// Create the application; an existing application of the same name is reused.
    pub async fn ensure_application(&self, name: &str) -> Result<()> {
        notify(self.prompter, "🔄 Creating Elastic Beanstalk application...").await;

        match self.provider.create_application(name).await {
            Ok(()) => {
                notify(self.prompter, "✅ Elastic Beanstalk application created.").await;
                Ok(())
            }
            Err(EbDeployError::Provider(err)) if err.is_already_exists() => {
                debug!(application = name, "Application already exists");
                notify(
                    self.prompter,
                    &format!(
                        "ℹ️  Application {} already exists. \nℹ️  Skipping to next step...",
                        name
                    ),
                )
                .await;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Create the environment named after the bucket's timestamp segment
    pub async fn ensure_environment(
        &self,
        application: &str,
        bucket: &str,
        platform: RuntimePlatform,
    ) -> Result<String> {
        notify(
            self.prompter,
            "🔄 Creating Elastic Beanstalk application environment...",
        )
        .await;

        let environment = naming::environment_name(bucket).to_string();
        let (solution_stack, options) = self.settings.stack_for(platform);
        let spec = EnvironmentSpec {
            application: application.to_string(),
            environment: environment.clone(),
            cname_prefix: bucket.to_string(),
            solution_stack,
            options,
        };
        self.provider.create_environment(&spec).await?;

        info!(application, environment = %environment, stack = %spec.solution_stack, "Environment created");
        notify(
            self.prompter,
            "✅ Elastic Beanstalk application environment created.",
        )
        .await;
        Ok(environment)
    }

    /// Register the uploaded archive as a version labelled with the bucket name
    pub async fn publish_version(&self, application: &str, bucket: &str, key: &str) -> Result<String> {
        notify(self.prompter, "🔄 Creating Elastic Beanstalk application version...").await;

        let spec = VersionSpec {
            application: application.to_string(),
            label: bucket.to_string(),
            description: bucket.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        };
        self.provider.create_application_version(&spec).await?;

        notify(self.prompter, "✅ Elastic Beanstalk application version created.").await;
        Ok(spec.label)
    }

    /// Submit the environment update, retrying while the environment is busy.
    ///
    /// Returns the number of update calls made. Only the submission is
    /// confirmed; the update itself completes asynchronously.
    pub async fn deploy(&self, environment: &str, version_label: &str) -> Result<u32> {
        let policy = self.settings.deploy;
        let mut attempt = 0u32;

        loop {
            if attempt % 2 == 0 {
                notify(
                    self.prompter,
                    "🔄 Preparing to update Elastic Beanstalk application environment...",
                )
                .await;
            }

            match self.provider.update_environment(environment, version_label).await {
                Ok(()) => {
                    info!(environment, version_label, attempts = attempt + 1, "Environment update submitted");
                    notify(
                        self.prompter,
                        "✅ Elastic Beanstalk application environment has started to update, please wait for it to finish.",
                    )
                    .await;
                    return Ok(attempt + 1);
                }
                Err(EbDeployError::Provider(err)) if err.is_retryable() && policy.can_retry(attempt) => {
                    warn!(environment, attempt, error = %err, "Environment not ready, retrying");
                    tokio::time::sleep(policy.interval).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Let the user pick the application and environment to update
    pub async fn select_existing(&self) -> Result<DeploymentTarget> {
        let applications = self.provider.list_applications().await?;
        let application = choose_or_enter(
            self.prompter,
            "EB_APP_NAME",
            "Choose the Elastic Beanstalk app that you want to update, or enter the name of the app",
            "Enter the name of the app",
            applications,
        )
        .await?;

        let environments = self.provider.list_environments(&application).await?;
        let environment = choose_or_enter(
            self.prompter,
            "EB_ENV_NAME",
            "Choose the Elastic Beanstalk app environment that you want to update, or enter the name of the environment",
            "Enter the name of the app environment",
            environments,
        )
        .await?;

        Ok(DeploymentTarget {
            application,
            environment,
        })
    }

    pub async fn print_summary(&self, application: &str, environment: &str, version_label: &str) {
        notify(
            self.prompter,
            &format!(
                "ℹ️  EB Application Name: {}\nℹ️  EB Environment Name: {}\nℹ️  EB Application Version Name: {}",
                application, environment, version_label
            ),
        )
        .await;
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::error::{ProviderError, ProviderErrorKind};

    pub fn not_ready(environment: &str) -> ProviderError {
        ProviderError::new(
            "elasticbeanstalk",
            ProviderErrorKind::NotReady,
            Some("InvalidParameterValue".to_string()),
            format!(
                "Environment named {} is in an invalid state for this operation. Must be Ready.",
                environment
            ),
        )
    }

    pub fn already_exists(application: &str) -> ProviderError {
        ProviderError::new(
            "elasticbeanstalk",
            ProviderErrorKind::AlreadyExists,
            Some("InvalidParameterValue".to_string()),
            format!("Application {} already exists.", application),
        )
    }
}
