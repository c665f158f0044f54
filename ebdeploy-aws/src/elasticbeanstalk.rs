use crate::classify::sdk_error;
use async_trait::async_trait;
use aws_sdk_elasticbeanstalk::Client;
use aws_sdk_elasticbeanstalk::types::{ConfigurationOptionSetting, S3Location};
use ebdeploy_core::{EnvironmentOption, EnvironmentSpec, PlatformProvider, Result, VersionSpec};
use tracing::debug;

const SERVICE: &str = "elasticbeanstalk";

/// Elastic Beanstalk-backed platform provider
pub struct ElasticBeanstalkPlatform {
    client: Client,
}

impl ElasticBeanstalkPlatform {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn option_setting(option: &EnvironmentOption) -> ConfigurationOptionSetting {
    ConfigurationOptionSetting::builder()
        .namespace(&option.namespace)
        .option_name(&option.option_name)
        .value(&option.value)
        .build()
}

#[async_trait]
impl PlatformProvider for ElasticBeanstalkPlatform {
    async fn create_application(&self, name: &str) -> Result<()> {
        self.client
            .create_application()
            .application_name(name)
            .description(name)
            .send()
            .await
            .map_err(sdk_error(SERVICE))?;
        Ok(())
    }

    async fn create_environment(&self, spec: &EnvironmentSpec) -> Result<()> {
        let options = spec.options.iter().map(option_setting).collect::<Vec<_>>();

        self.client
            .create_environment()
            .application_name(&spec.application)
            .environment_name(&spec.environment)
            .cname_prefix(&spec.cname_prefix)
            .solution_stack_name(&spec.solution_stack)
            .set_option_settings((!options.is_empty()).then_some(options))
            .send()
            .await
            .map_err(sdk_error(SERVICE))?;
        Ok(())
    }

    async fn create_application_version(&self, spec: &VersionSpec) -> Result<()> {
        let bundle = S3Location::builder()
            .s3_bucket(&spec.bucket)
            .s3_key(&spec.key)
            .build();

        self.client
            .create_application_version()
            .application_name(&spec.application)
            .version_label(&spec.label)
            .description(&spec.description)
            .auto_create_application(true)
            .process(true)
            .source_bundle(bundle)
            .send()
            .await
            .map_err(sdk_error(SERVICE))?;
        Ok(())
    }

    async fn update_environment(&self, environment: &str, version_label: &str) -> Result<()> {
        self.client
            .update_environment()
            .environment_name(environment)
            .version_label(version_label)
            .send()
            .await
            .map_err(sdk_error(SERVICE))?;

        debug!(environment, version_label, "Environment update accepted");
        Ok(())
    }

    async fn list_applications(&self) -> Result<Vec<String>> {
        let output = self
            .client
            .describe_applications()
            .send()
            .await
            .map_err(sdk_error(SERVICE))?;

        Ok(output
            .applications()
            .iter()
            .filter_map(|app| app.application_name())
            .map(str::to_string)
            .collect())
    }

    async fn list_environments(&self, application: &str) -> Result<Vec<String>> {
        let output = self
            .client
            .describe_environments()
            .application_name(application)
            .send()
            .await
            .map_err(sdk_error(SERVICE))?;

        Ok(output
            .environments()
            .iter()
            .filter_map(|env| env.environment_name())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_setting_carries_namespace() {
        let setting = option_setting(&EnvironmentOption {
            namespace: "aws:elasticbeanstalk:container:nodejs".to_string(),
            option_name: "NodeCommand".to_string(),
            value: "npm start".to_string(),
        });

        assert_eq!(setting.namespace(), Some("aws:elasticbeanstalk:container:nodejs"));
        assert_eq!(setting.option_name(), Some("NodeCommand"));
        assert_eq!(setting.value(), Some("npm start"));
    }
}
