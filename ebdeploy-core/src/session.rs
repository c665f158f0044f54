//! Up-front questions: which repository, which AWS account, which pipeline.

use crate::error::{EbDeployError, Result};
use crate::prompt::{notify, Prompter};
use crate::source::{RepoAccess, RepositorySource, RuntimePlatform};
use std::fmt;

pub const BANNER: &str = "\nebdeploy - Elastic Beanstalk\n";

pub const REQUIREMENTS: &str = "This tool will create an Elastic Beanstalk application and deploy your Github repository.
It can also create a Relational Database Service for your Elastic Beanstalk application.

Requirements:
 - Github
    - Username
    - Access Token (If the repository is private.)
    - Repository Name

 - AWS
    - Access Key ID
    - Secret Access Key
";

/// Region offered by default
pub const DEFAULT_REGION: &str = "eu-west-1";

/// Regions offered to the user
pub const REGIONS: [&str; 23] = [
    "us-east-2",
    "us-east-1",
    "us-west-1",
    "us-west-2",
    "ap-east-1",
    "ap-south-1",
    "ap-northeast-3",
    "ap-northeast-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "ca-central-1",
    "cn-north-1",
    "cn-northwest-1",
    "eu-central-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-north-1",
    "me-south-1",
    "sa-east-1",
    "us-gov-east-1",
    "us-gov-west-1",
];

/// Static credentials for the session; never written to the process environment
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &"***")
            .field("secret_access_key", &"***")
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    CreateNew,
    UpdateExisting,
}

impl Pipeline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pipeline::CreateNew => "Create New",
            Pipeline::UpdateExisting => "Update Existing",
        }
    }

    pub fn from_choice(choice: &str) -> Option<Self> {
        [Pipeline::CreateNew, Pipeline::UpdateExisting]
            .into_iter()
            .find(|pipeline| pipeline.as_str() == choice)
    }
}

pub async fn print_banner(prompter: &dyn Prompter) {
    notify(prompter, BANNER).await;
    notify(prompter, REQUIREMENTS).await;
}

/// Ask for the repository until the user confirms the summary
pub async fn collect_repository(prompter: &dyn Prompter) -> Result<RepositorySource> {
    loop {
        let owner = prompter
            .input("GITHUB_USER_NAME", "Github Username", "", false)
            .await?;
        let repo = prompter
            .input("GITHUB_REPO", "Github Repository", "", false)
            .await?;

        let platforms: Vec<String> = RuntimePlatform::ALL
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();
        let choice = prompter
            .list(
                "EB_ENV_PLATFORM",
                "Elastic Beanstalk Environment Platform",
                &platforms,
                RuntimePlatform::Node.as_str(),
            )
            .await?;
        let platform = RuntimePlatform::from_choice(&choice).ok_or_else(|| {
            EbDeployError::validation(format!("Unsupported platform {}", choice))
        })?;

        let private = prompter
            .confirm("GITHUB_REPO_PRIVATE", "Is this a private repository?", true)
            .await?;
        let access = if private {
            RepoAccess::Private(
                prompter
                    .secret("GITHUB_ACCESS_TOKEN", "Github Access Token")
                    .await?,
            )
        } else {
            RepoAccess::Public
        };

        let source = RepositorySource::new(owner.trim(), repo.trim(), access, platform);
        notify(prompter, &source.summary()).await;

        if prompter
            .confirm("GITHUB_CONFIRM", "Please confirm your Github Information", false)
            .await?
        {
            return Ok(source);
        }
    }
}

pub async fn collect_aws(prompter: &dyn Prompter) -> Result<AwsCredentials> {
    let access_key_id = prompter
        .secret("AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID")
        .await?;
    let secret_access_key = prompter
        .secret("AWS_SECRET_ACCESS_KEY", "AWS_SECRET_ACCESS_KEY")
        .await?;

    let regions: Vec<String> = REGIONS.iter().map(|r| r.to_string()).collect();
    let region = prompter
        .list("AWS_REGION", "AWS Region", &regions, DEFAULT_REGION)
        .await?;

    Ok(AwsCredentials {
        access_key_id,
        secret_access_key,
        region,
    })
}

pub async fn choose_pipeline(prompter: &dyn Prompter) -> Result<Pipeline> {
    let choices = vec![
        Pipeline::CreateNew.as_str().to_string(),
        Pipeline::UpdateExisting.as_str().to_string(),
    ];
    let choice = prompter
        .list(
            "EB_OP_OPTION",
            "Would you like to create a new Elastic Beanstalk Application, or update an existing one?",
            &choices,
            Pipeline::CreateNew.as_str(),
        )
        .await?;

    Pipeline::from_choice(&choice)
        .ok_or_else(|| EbDeployError::validation(format!("Unknown pipeline {}", choice)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::testing::*;

    #[tokio::test]
    async fn test_declined_repository_is_collected_again() {
        let prompter = ScriptedPrompter::new(vec![
            ("GITHUB_USER_NAME", text("octo")),
            ("GITHUB_REPO", text("wrong")),
            ("EB_ENV_PLATFORM", text("Go")),
            ("GITHUB_REPO_PRIVATE", no()),
            ("GITHUB_CONFIRM", no()),
            ("GITHUB_USER_NAME", text("octo")),
            ("GITHUB_REPO", text("myapp")),
            ("EB_ENV_PLATFORM", text("Node")),
            ("GITHUB_REPO_PRIVATE", yes()),
            ("GITHUB_ACCESS_TOKEN", text("ghp_x")),
            ("GITHUB_CONFIRM", yes()),
        ]);

        let source = collect_repository(&prompter).await.unwrap();

        assert_eq!(source.repo, "myapp");
        assert_eq!(source.platform, RuntimePlatform::Node);
        assert_eq!(source.access, RepoAccess::Private("ghp_x".to_string()));
        let summaries = prompter
            .printed()
            .iter()
            .filter(|l| l.contains("Github Information"))
            .count();
        assert_eq!(summaries, 2);
    }

    #[tokio::test]
    async fn test_unknown_platform_is_rejected() {
        let prompter = ScriptedPrompter::new(vec![
            ("GITHUB_USER_NAME", text("octo")),
            ("GITHUB_REPO", text("myapp")),
            ("EB_ENV_PLATFORM", text("Cobol")),
        ]);

        let result = collect_repository(&prompter).await;
        assert!(matches!(result, Err(EbDeployError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_aws_credentials_offer_all_regions() {
        let prompter = ScriptedPrompter::new(vec![
            ("AWS_ACCESS_KEY_ID", text("AKIAEXAMPLE")),
            ("AWS_SECRET_ACCESS_KEY", text("secret")),
            ("AWS_REGION", text("us-west-2")),
        ]);

        let credentials = collect_aws(&prompter).await.unwrap();

        assert_eq!(credentials.region, "us-west-2");
        assert!(!format!("{credentials:?}").contains("AKIAEXAMPLE"));
        let offered = &prompter.offered()[0].1;
        assert_eq!(offered.len(), 23);
        assert!(offered.contains(&DEFAULT_REGION.to_string()));
    }

    #[tokio::test]
    async fn test_pipeline_choice() {
        let prompter = ScriptedPrompter::new(vec![("EB_OP_OPTION", text("Update Existing"))]);
        assert_eq!(
            choose_pipeline(&prompter).await.unwrap(),
            Pipeline::UpdateExisting
        );
    }
}
