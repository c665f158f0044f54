use thiserror::Error;

/// Main result type for ebdeploy operations
pub type Result<T> = std::result::Result<T, EbDeployError>;

/// Main error type for ebdeploy operations
#[derive(Debug, Error)]
pub enum EbDeployError {
    /// Errors reported by a cloud provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Repository archive errors
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Prompt channel errors
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A polling loop ran out of attempts before the resource became ready
    #[error("{resource} was not ready after {attempts} checks")]
    PollExhausted { resource: String, attempts: u32 },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal errors (should not normally occur)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// How a provider error should be treated by the workflow.
///
/// Adapters assign the kind when they translate a provider failure, so the
/// workflow never has to look at provider-specific codes or messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The resource being created is already there
    AlreadyExists,
    /// The resource exists but is in a transitional state; retrying later may succeed
    NotReady,
    /// The rule or permission being added is already present
    DuplicateRule,
    /// The referenced resource does not exist
    NotFound,
    /// Anything else (auth, quota, malformed request, service failure)
    Other,
}

/// A classified failure from a cloud provider call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{service} {}: {message}", .code.as_deref().unwrap_or("error"))]
pub struct ProviderError {
    /// Service that produced the error (e.g. "s3", "rds")
    pub service: String,
    /// Classification assigned by the adapter
    pub kind: ProviderErrorKind,
    /// Provider error code, when one was returned
    pub code: Option<String>,
    /// Provider error message
    pub message: String,
}

impl ProviderError {
    pub fn new(
        service: impl Into<String>,
        kind: ProviderErrorKind,
        code: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            kind,
            code,
            message: message.into(),
        }
    }

    /// Create an unclassified provider error
    pub fn other(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(service, ProviderErrorKind::Other, None, message)
    }

    /// Whether waiting and retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind == ProviderErrorKind::NotReady
    }

    /// Whether the failed create call found the resource already present
    pub fn is_already_exists(&self) -> bool {
        self.kind == ProviderErrorKind::AlreadyExists
    }
}

/// Repository archive errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Download request failed or returned a non-success status
    #[error("Download failed: {reason}")]
    DownloadFailed { reason: String },

    /// The source host did not return an archive link
    #[error("No archive link returned for {owner}/{repo}")]
    MissingRedirect { owner: String, repo: String },

    /// The archive layout is not what a repository snapshot looks like
    #[error("Malformed archive: {reason}")]
    Malformed { reason: String },

    /// Zip encoding/decoding failure
    #[error("Zip error: {message}")]
    Zip { message: String },

    /// Generated configuration could not be rendered
    #[error("Failed to render configuration {name}: {reason}")]
    Render { name: String, reason: String },
}

/// Prompt channel errors
#[derive(Debug, Error)]
pub enum PromptError {
    /// The prompt daemon could not be reached
    #[error("Failed to reach prompt daemon: {message}")]
    Transport { message: String },

    /// The prompt daemon answered with an error status
    #[error("Prompt daemon returned status {status_code}")]
    Status { status_code: u16 },

    /// The reply could not be decoded into the expected shape
    #[error("Failed to decode reply for {key}: {reason}")]
    Decode { key: String, reason: String },

    /// The reply did not contain an answer for the prompt
    #[error("No answer for prompt {key}")]
    MissingAnswer { key: String },

    /// The terminal interaction failed or was aborted
    #[error("Prompt interaction failed: {message}")]
    Interaction { message: String },
}

/// Convenience methods for creating specific errors
impl EbDeployError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The provider error this wraps, if any
    pub fn as_provider(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider(err) => Some(err),
            _ => None,
        }
    }
}

impl ArchiveError {
    /// Create a download failure
    pub fn download_failed(reason: impl Into<String>) -> Self {
        Self::DownloadFailed {
            reason: reason.into(),
        }
    }

    /// Create a malformed archive error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

impl PromptError {
    /// Create a decode error
    pub fn decode(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an interaction error
    pub fn interaction(message: impl Into<String>) -> Self {
        Self::Interaction {
            message: message.into(),
        }
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(error: zip::result::ZipError) -> Self {
        Self::Zip {
            message: error.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for EbDeployError {
    fn from(error: zip::result::ZipError) -> Self {
        EbDeployError::Archive(error.into())
    }
}

impl From<reqwest::Error> for ArchiveError {
    fn from(error: reqwest::Error) -> Self {
        Self::DownloadFailed {
            reason: error.to_string(),
        }
    }
}

impl From<reqwest::Error> for EbDeployError {
    fn from(error: reqwest::Error) -> Self {
        EbDeployError::Archive(error.into())
    }
}

impl From<walkdir::Error> for EbDeployError {
    fn from(error: walkdir::Error) -> Self {
        match error.into_io_error() {
            Some(io) => EbDeployError::Io(io),
            None => EbDeployError::Archive(ArchiveError::malformed("filesystem loop while packaging")),
        }
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode {
            key: "<reply>".to_string(),
            reason: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for EbDeployError {
    fn from(error: serde_json::Error) -> Self {
        EbDeployError::Internal {
            message: format!("Serialization error: {}", error),
        }
    }
}
