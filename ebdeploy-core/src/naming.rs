//! Deterministic names derived from the repository and the run timestamp.

use chrono::{DateTime, Utc};

/// Timestamp format used as the bucket suffix (second resolution)
pub const BUCKET_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Bucket for one run: `<lowercased-repo>-<UTC timestamp>`.
///
/// Two runs for the same repository inside the same second collide; the
/// provider rejects the second bucket.
pub fn bucket_name(repo: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}-{}",
        repo.to_lowercase(),
        at.format(BUCKET_TIMESTAMP_FORMAT)
    )
}

/// Application name: the archive name without its trailing commit segment.
///
/// A name without any hyphen is returned unchanged.
pub fn application_name(archive_name: &str) -> String {
    match archive_name.rsplit_once('-') {
        Some((head, _)) => head.to_string(),
        None => archive_name.to_string(),
    }
}

/// Environment name: the trailing timestamp segment of the bucket name
pub fn environment_name(bucket: &str) -> &str {
    bucket.rsplit('-').next().unwrap_or(bucket)
}

/// Console link to the application overview
pub fn application_console_url(region: &str, application: &str) -> String {
    format!(
        "https://{region}.console.aws.amazon.com/elasticbeanstalk/home?region={region}#/application/overview?applicationName={application}"
    )
}

/// Console link to the bucket overview
pub fn bucket_console_url(region: &str, bucket: &str) -> String {
    format!("https://s3.console.aws.amazon.com/s3/buckets/{bucket}/?region={region}&tab=overview")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_bucket_name_lowercases_and_stamps() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(bucket_name("MyApp", at), "myapp-20240309070501");
    }

    #[test]
    fn test_application_name_strips_final_segment() {
        for (archive, expected) in [
            ("myapp-1a2b3c4", "myapp"),
            ("my-app-1a2b3c4", "my-app"),
            ("a-b-c-d-e", "a-b-c-d"),
            ("octo-my-service-deadbee", "octo-my-service"),
        ] {
            assert_eq!(application_name(archive), expected, "archive {archive}");
        }
    }

    #[test]
    fn test_application_name_without_hyphen() {
        assert_eq!(application_name("standalone"), "standalone");
    }

    #[test]
    fn test_environment_name_is_final_segment() {
        for (bucket, expected) in [
            ("myapp-20240309070501", "20240309070501"),
            ("my-app-20240309070501", "20240309070501"),
            ("a-b-c", "c"),
        ] {
            assert_eq!(environment_name(bucket), expected);
        }
    }

    #[test]
    fn test_bucket_and_environment_agree() {
        let at = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
        let bucket = bucket_name("some-long-repo", at);
        assert_eq!(environment_name(&bucket), "20251231235959");
    }

    #[test]
    fn test_console_urls() {
        let url = application_console_url("eu-west-1", "myapp");
        assert!(url.starts_with("https://eu-west-1.console.aws.amazon.com/elasticbeanstalk/"));
        assert!(url.ends_with("applicationName=myapp"));

        let bucket = bucket_console_url("us-east-2", "myapp-1");
        assert!(bucket.contains("/buckets/myapp-1/"));
        assert!(bucket.contains("region=us-east-2"));
    }
}
