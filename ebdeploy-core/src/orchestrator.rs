//! The create and update pipelines.
//!
//! Every step runs in sequence and the first failure ends the run. Nothing
//! created by earlier steps is rolled back.

use crate::archive::{PackagedArchive, RepositoryFetcher};
use crate::database::{DatabaseInstance, DatabaseProvider, DatabaseProvisioner, DatabaseSettings};
use crate::error::{EbDeployError, Result};
use crate::logging::LogContext;
use crate::naming;
use crate::network::{NetworkLinker, NetworkProvider, NetworkSettings};
use crate::platform::{PlatformProvider, PlatformProvisioner, PlatformSettings};
use crate::prompt::{notify, Prompter};
use crate::session::Pipeline;
use crate::source::RepositorySource;
use crate::storage::{ArchivePublisher, ObjectStore, PublishedArchive};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

/// Provider implementations the pipelines call into
#[derive(Clone, Copy)]
pub struct Providers<'a> {
    pub fetcher: &'a dyn RepositoryFetcher,
    pub store: &'a dyn ObjectStore,
    pub database: &'a dyn DatabaseProvider,
    pub platform: &'a dyn PlatformProvider,
    pub network: &'a dyn NetworkProvider,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionSettings {
    pub database: DatabaseSettings,
    pub platform: PlatformSettings,
    pub network: NetworkSettings,
}

/// What a finished run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionSummary {
    pub application: String,
    pub environment: String,
    pub version_label: String,
    pub bucket: String,
    pub console_url: String,
    /// `host:port` of the database the application is configured for
    pub database: Option<String>,
}

pub struct Orchestrator<'a> {
    providers: Providers<'a>,
    prompter: &'a dyn Prompter,
    settings: ProvisionSettings,
    region: String,
    context: LogContext,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        providers: Providers<'a>,
        prompter: &'a dyn Prompter,
        settings: ProvisionSettings,
        region: impl Into<String>,
    ) -> Self {
        Self {
            providers,
            prompter,
            settings,
            region: region.into(),
            context: LogContext::new("provision", "orchestrator"),
        }
    }

    pub async fn run(&self, pipeline: Pipeline, source: &RepositorySource) -> Result<ProvisionSummary> {
        let context = self.context.child(pipeline.as_str());
        context.info(&format!("Starting pipeline for {}/{}", source.owner, source.repo));
        self.track("start", pipeline, None).await;

        let result = match pipeline {
            Pipeline::CreateNew => self.run_create(source).instrument(context.span()).await,
            Pipeline::UpdateExisting => self.run_update(source).instrument(context.span()).await,
        };

        match &result {
            Ok(summary) => {
                context.info("Pipeline finished");
                self.track("complete", pipeline, Some(summary)).await;
            }
            Err(err) => {
                context.error(&format!("Pipeline failed: {}", err));
                self.track("error", pipeline, None).await;
            }
        }
        result
    }

    /// Database (new) → package → publish → application/environment/version → deploy → link
    pub async fn run_create(&self, source: &RepositorySource) -> Result<ProvisionSummary> {
        let database = self.database().provision_new().await?;
        let archive = self.package(source, database.as_ref()).await?;
        let published = self.publish(source, &archive).await?;

        let platform = self.platform();
        let application = naming::application_name(&archive.name);
        platform.ensure_application(&application).await?;
        let environment = platform
            .ensure_environment(&application, &published.bucket, source.platform)
            .await?;
        let version_label = platform
            .publish_version(&application, &published.bucket, &published.key)
            .await?;
        platform.deploy(&environment, &version_label).await?;
        platform
            .print_summary(&application, &environment, &version_label)
            .await;

        // The environment's security group is only looked up when there is a database to open it to
        if let Some(database) = &database {
            self.link(&environment, database).await?;
        }

        Ok(self
            .finish(application, environment, version_label, published.bucket, database.as_ref())
            .await)
    }

    /// Database (existing or none) → package → publish → select target → version → deploy
    pub async fn run_update(&self, source: &RepositorySource) -> Result<ProvisionSummary> {
        let database = self.database().provision_existing().await?;
        let archive = self.package(source, database.as_ref()).await?;
        let published = self.publish(source, &archive).await?;

        let platform = self.platform();
        let target = platform.select_existing().await?;
        let version_label = platform
            .publish_version(&target.application, &published.bucket, &published.key)
            .await?;
        platform.deploy(&target.environment, &version_label).await?;
        platform
            .print_summary(&target.application, &target.environment, &version_label)
            .await;

        Ok(self
            .finish(
                target.application,
                target.environment,
                version_label,
                published.bucket,
                database.as_ref(),
            )
            .await)
    }

    fn database(&self) -> DatabaseProvisioner<'a> {
        DatabaseProvisioner::new(
            self.providers.database,
            self.prompter,
            self.settings.database.clone(),
        )
    }

    fn platform(&self) -> PlatformProvisioner<'a> {
        PlatformProvisioner::new(
            self.providers.platform,
            self.prompter,
            self.settings.platform.clone(),
        )
    }

    async fn package(
        &self,
        source: &RepositorySource,
        database: Option<&DatabaseInstance>,
    ) -> Result<PackagedArchive> {
        let extensions: Vec<_> = database.map(|db| db.config_extension()).into_iter().collect();

        notify(self.prompter, "🔄 Downloading repository files...").await;
        let archive = self.providers.fetcher.fetch(source, &extensions).await?;
        notify(self.prompter, "✅ Download complete.").await;
        Ok(archive)
    }

    async fn publish(&self, source: &RepositorySource, archive: &PackagedArchive) -> Result<PublishedArchive> {
        ArchivePublisher::new(self.providers.store, self.prompter, self.region.clone())
            .publish(&source.repo, archive, Utc::now())
            .await
    }

    async fn link(&self, environment: &str, database: &DatabaseInstance) -> Result<()> {
        let database_group = database.security_group_id.as_deref().ok_or_else(|| {
            EbDeployError::validation(format!(
                "RDS instance {} has no VPC security group",
                database.identifier
            ))
        })?;

        let linker = NetworkLinker::new(self.providers.network, self.settings.network.clone());
        let environment_group = linker.resolve_environment_security_group(environment).await?;
        linker.link(&environment_group, database_group).await?;

        notify(
            self.prompter,
            "✅ Elastic Beanstalk environment security group linked to RDS database.",
        )
        .await;
        Ok(())
    }

    async fn finish(
        &self,
        application: String,
        environment: String,
        version_label: String,
        bucket: String,
        database: Option<&DatabaseInstance>,
    ) -> ProvisionSummary {
        let console_url = naming::application_console_url(&self.region, &application);
        notify(
            self.prompter,
            &format!("🌐 Elastic Beanstalk Application: {}", console_url),
        )
        .await;

        ProvisionSummary {
            application,
            environment,
            version_label,
            bucket,
            console_url,
            database: database.map(DatabaseInstance::endpoint),
        }
    }

    async fn track(&self, event: &str, pipeline: Pipeline, summary: Option<&ProvisionSummary>) {
        let tags = vec!["ebdeploy".to_string(), event.to_string()];
        let metadata = serde_json::json!({
            "pipeline": pipeline.as_str(),
            "region": self.region,
            "correlation_id": self.context.correlation_id().as_str(),
            "application": summary.map(|s| s.application.as_str()),
        });

        if let Err(err) = self.prompter.track(event, &tags, &metadata).await {
            tracing::debug!(error = %err, "Failed to record usage event");
        }
    }
}
