//! Translation of AWS service errors into classified provider errors.

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use ebdeploy_core::{EbDeployError, ProviderError, ProviderErrorKind};
use std::error::Error as StdError;
use std::fmt::Debug;

/// Decide how the workflow should treat an error from its code and message
pub fn classify(code: Option<&str>, message: &str) -> ProviderErrorKind {
    match code {
        Some("InvalidPermission.Duplicate") => ProviderErrorKind::DuplicateRule,
        Some("DBInstanceNotFound" | "DBInstanceNotFoundFault" | "NoSuchBucket") => {
            ProviderErrorKind::NotFound
        }
        Some("DBInstanceAlreadyExists" | "DBInstanceAlreadyExistsFault" | "BucketAlreadyOwnedByYou") => {
            ProviderErrorKind::AlreadyExists
        }
        Some("InvalidParameterValue") if message.contains("Must be Ready") => {
            ProviderErrorKind::NotReady
        }
        _ if message.contains("already exists") => ProviderErrorKind::AlreadyExists,
        _ => ProviderErrorKind::Other,
    }
}

/// Classify a failed SDK call made against `service`
pub fn provider_error<E, R>(service: &str, error: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
    R: Debug,
{
    let code = error.code().map(str::to_string);
    let message = match error.message() {
        Some(message) => message.to_string(),
        None => DisplayErrorContext(&error).to_string(),
    };
    let kind = classify(code.as_deref(), &message);

    tracing::debug!(service, code = ?code, kind = ?kind, "AWS call failed");
    ProviderError::new(service, kind, code, message)
}

/// Shorthand for `map_err` on SDK results
pub(crate) fn sdk_error<E, R>(service: &'static str) -> impl FnOnce(SdkError<E, R>) -> EbDeployError
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
    R: Debug,
{
    move |error| provider_error(service, error).into()
}

/// A response that is missing a field the workflow relies on
pub(crate) fn missing(service: &str, what: &str) -> EbDeployError {
    ProviderError::other(service, format!("response did not include {}", what)).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_environment() {
        let kind = classify(
            Some("InvalidParameterValue"),
            "Environment named 20240309070501 is in an invalid state for this operation. Must be Ready.",
        );
        assert_eq!(kind, ProviderErrorKind::NotReady);
    }

    #[test]
    fn test_existing_application() {
        let kind = classify(Some("InvalidParameterValue"), "Application myapp already exists.");
        assert_eq!(kind, ProviderErrorKind::AlreadyExists);
    }

    #[test]
    fn test_other_invalid_parameter_is_not_retryable() {
        let kind = classify(
            Some("InvalidParameterValue"),
            "No Application Version named 'myapp-1' found.",
        );
        assert_eq!(kind, ProviderErrorKind::Other);
    }

    #[test]
    fn test_codes() {
        assert_eq!(
            classify(Some("InvalidPermission.Duplicate"), "the specified rule already exists"),
            ProviderErrorKind::DuplicateRule
        );
        assert_eq!(
            classify(Some("DBInstanceNotFound"), "DBInstance orders not found."),
            ProviderErrorKind::NotFound
        );
        assert_eq!(
            classify(Some("DBInstanceAlreadyExists"), "DB instance already exists"),
            ProviderErrorKind::AlreadyExists
        );
        assert_eq!(classify(None, "dispatch failure"), ProviderErrorKind::Other);
        assert_eq!(
            classify(Some("AccessDenied"), "User is not authorized"),
            ProviderErrorKind::Other
        );
    }
}
