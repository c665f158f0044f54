use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime the application environment is provisioned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimePlatform {
    Node,
    Go,
}

impl RuntimePlatform {
    pub const ALL: [RuntimePlatform; 2] = [RuntimePlatform::Node, RuntimePlatform::Go];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimePlatform::Node => "Node",
            RuntimePlatform::Go => "Go",
        }
    }

    /// Parse a platform name as shown in prompts
    pub fn from_choice(choice: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str().eq_ignore_ascii_case(choice.trim()))
    }
}

impl fmt::Display for RuntimePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the repository archive may be downloaded
#[derive(Clone, PartialEq, Eq)]
pub enum RepoAccess {
    Public,
    /// Private repository, fetched with an access token
    Private(String),
}

impl fmt::Debug for RepoAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoAccess::Public => f.write_str("Public"),
            RepoAccess::Private(_) => f.write_str("Private(***)"),
        }
    }
}

impl RepoAccess {
    pub fn label(&self) -> &'static str {
        match self {
            RepoAccess::Public => "Public",
            RepoAccess::Private(_) => "Private",
        }
    }
}

/// The repository being deployed, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySource {
    pub owner: String,
    pub repo: String,
    pub access: RepoAccess,
    pub platform: RuntimePlatform,
}

impl RepositorySource {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        access: RepoAccess,
        platform: RuntimePlatform,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            access,
            platform,
        }
    }

    /// Multi-line summary shown before the user confirms
    pub fn summary(&self) -> String {
        format!(
            "ℹ️  Github Information: \n   Username: {}\n   Repo: {}\n   RepoAccess: {}\n   Platform: {}",
            self.owner,
            self.repo,
            self.access.label(),
            self.platform
        )
    }
}
