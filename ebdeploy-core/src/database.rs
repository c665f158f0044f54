//! Relational database provisioning.
//!
//! A database is either created from scratch (create pipeline) or looked up
//! among the account's existing instances (update pipeline). Both paths end
//! with the user confirming a summary; declining starts the collection over.

use crate::archive::{ConfigExtension, OptionSetting};
use crate::error::{EbDeployError, Result};
use crate::polling::PollPolicy;
use crate::prompt::{choose_or_enter, confirmed_secret, notify, Prompter};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Status the provider reports once an instance accepts connections
pub const AVAILABLE_STATUS: &str = "available";

/// Lifecycle state of a database instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Available,
    /// Any transitional state, carrying the provider's status string
    Pending(String),
}

impl InstanceStatus {
    pub fn from_provider(status: &str) -> Self {
        if status == AVAILABLE_STATUS {
            InstanceStatus::Available
        } else {
            InstanceStatus::Pending(status.to_string())
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, InstanceStatus::Available)
    }
}

/// What the provider reports about one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDescription {
    pub identifier: String,
    pub engine: String,
    pub username: String,
    pub status: InstanceStatus,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// First VPC security group attached to the instance
    pub security_group_id: Option<String>,
}

/// Parameters for a new instance
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseRequest {
    pub identifier: String,
    pub engine: String,
    pub username: String,
    pub password: String,
    pub allocated_storage_gb: i32,
    pub instance_class: String,
}

impl fmt::Debug for DatabaseRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseRequest")
            .field("identifier", &self.identifier)
            .field("engine", &self.engine)
            .field("username", &self.username)
            .field("password", &"***")
            .field("allocated_storage_gb", &self.allocated_storage_gb)
            .field("instance_class", &self.instance_class)
            .finish()
    }
}

/// A ready database the application can connect to
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseInstance {
    pub identifier: String,
    pub engine: String,
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub security_group_id: Option<String>,
}

impl fmt::Debug for DatabaseInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseInstance")
            .field("identifier", &self.identifier)
            .field("engine", &self.engine)
            .field("username", &self.username)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security_group_id", &self.security_group_id)
            .finish()
    }
}

impl DatabaseInstance {
    /// Combine a described instance with the password the user supplied
    pub fn from_description(description: InstanceDescription, password: String) -> Result<Self> {
        let (Some(host), Some(port)) = (description.host, description.port) else {
            return Err(EbDeployError::validation(format!(
                "RDS instance {} has no endpoint yet",
                description.identifier
            )));
        };

        Ok(Self {
            identifier: description.identifier,
            engine: description.engine,
            username: description.username,
            password,
            host,
            port,
            security_group_id: description.security_group_id,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Environment variables the application reads its connection details from
    pub fn config_extension(&self) -> ConfigExtension {
        ConfigExtension {
            name: "rds_env".to_string(),
            settings: vec![
                OptionSetting::new("RDS_HOSTNAME", &self.host),
                OptionSetting::new("RDS_USERNAME", &self.username),
                OptionSetting::new("RDS_PASSWORD", &self.password),
                OptionSetting::new("RDS_PORT", self.port.to_string()),
                OptionSetting::new("RDS_DB_NAME", &self.identifier),
            ],
        }
    }

    fn summary(&self) -> String {
        format!(
            "ℹ️  RDS Information: \n   DBName: {}\n   MasterUsername: {}\n   Host: {}\n   Port: {}",
            self.identifier, self.username, self.host, self.port
        )
    }
}

/// Trait for relational database operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatabaseProvider: Send + Sync {
    /// Submit a create request; the instance is not usable until it reports available
    async fn create_instance(&self, request: &DatabaseRequest) -> Result<InstanceDescription>;

    async fn describe_instance(&self, identifier: &str) -> Result<InstanceDescription>;

    async fn list_instances(&self) -> Result<Vec<InstanceDescription>>;
}

/// Sizing and polling for new instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub allocated_storage_gb: i32,
    pub instance_class: String,
    /// Engines offered to the user; the first is the default
    pub engines: Vec<String>,
    pub poll: PollPolicy,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            allocated_storage_gb: 5,
            instance_class: "db.t3.micro".to_string(),
            engines: vec!["postgres".to_string()],
            poll: PollPolicy::default(),
        }
    }
}

/// Drives the database part of both pipelines
pub struct DatabaseProvisioner<'a> {
    provider: &'a dyn DatabaseProvider,
    prompter: &'a dyn Prompter,
    settings: DatabaseSettings,
}

impl<'a> DatabaseProvisioner<'a> {
    pub fn new(
        provider: &'a dyn DatabaseProvider,
        prompter: &'a dyn Prompter,
        settings: DatabaseSettings,
    ) -> Self {
        Self {
            provider,
            prompter,
            settings,
        }
    }

    /// Optionally create a new instance and wait for it to become available
    pub async fn provision_new(&self) -> Result<Option<DatabaseInstance>> {
        let request = loop {
            let Some(request) = self.collect_request().await? else {
                return Ok(None);
            };

            notify(
                self.prompter,
                &format!(
                    "ℹ️  RDS Information: \n   DBName: {}\n   MasterUsername: {}\n   Platform: {}",
                    request.identifier, request.username, request.engine
                ),
            )
            .await;

            if self
                .prompter
                .confirm("RDS_CONFIRM", "Please confirm your RDS Information", false)
                .await?
            {
                break request;
            }
        };

        notify(self.prompter, "🔄 Creating RDS database...").await;
        let created = self.provider.create_instance(&request).await?;
        info!(identifier = %request.identifier, engine = %request.engine, "RDS instance requested");
        notify(self.prompter, "✅ RDS database created.").await;
        notify(
            self.prompter,
            "ℹ️  Beginning to set up RDS database. This may take around 5 minutes.",
        )
        .await;
        notify(self.prompter, "🔄 Setting up RDS database...").await;

        let ready = self.wait_until_available(&request.identifier).await?;
        notify(self.prompter, "✅ RDS database setup completed.").await;

        let security_group_id = created
            .security_group_id
            .or(ready.security_group_id.clone())
            .ok_or_else(|| {
                EbDeployError::validation(format!(
                    "RDS instance {} has no VPC security group",
                    request.identifier
                ))
            })?;

        let mut instance = DatabaseInstance::from_description(ready, request.password)?;
        instance.security_group_id = Some(security_group_id);
        Ok(Some(instance))
    }

    async fn collect_request(&self) -> Result<Option<DatabaseRequest>> {
        let required = self
            .prompter
            .confirm(
                "RDS_REQUIRED",
                "Does your app require a RDS database instance?",
                false,
            )
            .await?;
        if !required {
            return Ok(None);
        }

        let consent = self
            .prompter
            .confirm(
                "RDS_CONFIG_CONSENT",
                "A directory and a file containing the RDS details variables will be added to your repository in order to connect to the RDS database instance. If this is acceptable, press 'Y' to continue, otherwise you may continue without an RDS database instance.",
                false,
            )
            .await?;
        if !consent {
            return Ok(None);
        }

        let identifier = self
            .prompter
            .input("DB_INSTANCE_IDENTIFIER", "RDS Instance Name", "", false)
            .await?;
        let default_engine = self.settings.engines.first().map(String::as_str).unwrap_or("postgres");
        let engine = self
            .prompter
            .list("RDS_ENGINE", "RDS Platform", &self.settings.engines, default_engine)
            .await?;
        let username = self
            .prompter
            .input("RDS_DB_USERNAME", "RDS DB Username", "", false)
            .await?;
        let password = confirmed_secret(self.prompter, "RDS_DB_PASSWORD", "RDS DB Password").await?;

        Ok(Some(DatabaseRequest {
            identifier,
            engine,
            username,
            password,
            allocated_storage_gb: self.settings.allocated_storage_gb,
            instance_class: self.settings.instance_class.clone(),
        }))
    }

    /// Describe `identifier` until it reports available or the poll ceiling is hit
    pub async fn wait_until_available(&self, identifier: &str) -> Result<InstanceDescription> {
        let policy = self.settings.poll;
        let mut checks = 0u32;

        loop {
            let description = self.provider.describe_instance(identifier).await?;
            checks += 1;

            if description.status.is_available() {
                info!(identifier, checks, "RDS instance available");
                return Ok(description);
            }

            if !policy.allows_another(checks) {
                return Err(EbDeployError::PollExhausted {
                    resource: format!("RDS instance {}", identifier),
                    attempts: checks,
                });
            }

            debug!(identifier, checks, status = ?description.status, "RDS instance not available yet");
            tokio::time::sleep(policy.interval).await;

            if policy.is_reminder(checks - 1) {
                notify(self.prompter, "🔄 Setting up RDS database...").await;
            }
        }
    }

    /// Optionally pick an existing instance the application already uses
    pub async fn provision_existing(&self) -> Result<Option<DatabaseInstance>> {
        loop {
            let required = self
                .prompter
                .confirm("RDS_REQUIRED", "Does your app require a RDS database?", false)
                .await?;
            if !required {
                return Ok(None);
            }

            let existing = self
                .prompter
                .confirm(
                    "RDS_EXISTING",
                    "Does your app already have an existing RDS database?",
                    false,
                )
                .await?;
            if !existing {
                notify(
                    self.prompter,
                    "ℹ️  Continuing without an RDS database. Use the Create New pipeline to provision one.",
                )
                .await;
                return Ok(None);
            }

            let mut instances = self.provider.list_instances().await?;
            let names = instances.iter().map(|i| i.identifier.clone()).collect();
            let chosen = choose_or_enter(
                self.prompter,
                "RDS_INSTANCE_NAME",
                "Please choose the RDS instance that is connected to the app",
                "Enter the name of the RDS instance that is connected to the app",
                names,
            )
            .await?;

            let description = match instances.iter().position(|i| i.identifier == chosen) {
                Some(index) => instances.swap_remove(index),
                None => self.provider.describe_instance(&chosen).await?,
            };

            let password = confirmed_secret(
                self.prompter,
                "RDS_DB_PASSWORD",
                "Please enter the master password for the chosen RDS instance",
            )
            .await?;
            let instance = DatabaseInstance::from_description(description, password)?;

            notify(self.prompter, &instance.summary()).await;
            if self
                .prompter
                .confirm("RDS_CONFIRM", "Please confirm your RDS Information", false)
                .await?
            {
                return Ok(Some(instance));
            }
        }
    }
}
