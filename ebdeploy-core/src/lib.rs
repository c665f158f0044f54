pub mod archive;
pub mod database;
pub mod error;
pub mod logging;
pub mod naming;
pub mod network;
pub mod orchestrator;
pub mod platform;
pub mod polling;
pub mod prompt;
pub mod session;
pub mod source;
pub mod storage;

pub use archive::{
    ConfigExtension, FetchSettings, GithubFetcher, OptionSetting, PackagedArchive,
    RepositoryFetcher,
};
pub use database::{
    DatabaseInstance, DatabaseProvider, DatabaseProvisioner, DatabaseRequest, DatabaseSettings,
    InstanceDescription, InstanceStatus,
};
pub use error::{
    ArchiveError, EbDeployError, PromptError, ProviderError, ProviderErrorKind, Result,
};
pub use logging::{
    init_logging, parse_log_level, CorrelationId, LogConfig, LogContext,
    LogFormat,
};
pub use network::{NetworkLinker, NetworkProvider, NetworkSettings, SecurityGroup, SecurityGroupLink};
pub use orchestrator::{Orchestrator, ProvisionSettings, ProvisionSummary, Providers};
pub use platform::{
    DeploymentTarget, EnvironmentOption, EnvironmentSpec, PlatformProvider, PlatformProvisioner,
    PlatformSettings, VersionSpec,
};
pub use polling::{PollPolicy, RetryPolicy};
pub use prompt::{PromptResult, Prompter, ENTER_A_VALUE};
pub use session::{AwsCredentials, Pipeline};
pub use source::{RepoAccess, RepositorySource, RuntimePlatform};
pub use storage::{ArchivePublisher, ObjectStore, PublishedArchive};
