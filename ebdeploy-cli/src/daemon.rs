//! Prompt channel relayed through the local prompt daemon.
//!
//! Every call is a JSON `POST` to the daemon. A prompt returns the path of a
//! reply file, which blocks until a human answers and then holds a JSON
//! object keyed by the prompt key.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use ebdeploy_core::prompt::{PromptResult, Prompter};
use ebdeploy_core::PromptError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, instrument};

use crate::terminal::DATETIME_FORMAT;

/// Environment variable carrying the daemon port
pub const PORT_ENV: &str = "SDK_SPEAK_PORT";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptRequest<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    message: &'a str,
    choices: &'a [String],
    allow_empty: bool,
    #[serde(skip_serializing_if = "Value::is_null")]
    default: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptResponse {
    reply_filename: String,
}

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct TrackRequest<'a> {
    event: &'a str,
    tags: &'a [String],
    details: &'a Value,
    error: &'a str,
}

/// Read the answer for `key` out of a reply document
fn decode_reply<T: DeserializeOwned>(key: &str, reply: &str) -> PromptResult<T> {
    let mut document: serde_json::Map<String, Value> =
        serde_json::from_str(reply).map_err(|e| PromptError::decode(key, e.to_string()))?;
    let answer = document.remove(key).ok_or_else(|| PromptError::MissingAnswer {
        key: key.to_string(),
    })?;
    serde_json::from_value(answer).map_err(|e| PromptError::decode(key, e.to_string()))
}

/// HTTP client for the prompt daemon
pub struct DaemonPrompter {
    client: reqwest::Client,
    base_url: String,
}

impl DaemonPrompter {
    /// `base_url` includes the port, e.g. `http://127.0.0.1:4000`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Daemon at `daemon_url` on the port named by `SDK_SPEAK_PORT`
    pub fn from_env(daemon_url: &str) -> anyhow::Result<Self> {
        let port = std::env::var(PORT_ENV)
            .map_err(|_| anyhow::anyhow!("{} must be set to use the prompt daemon", PORT_ENV))?;
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}={}: {}", PORT_ENV, port, e))?;
        Ok(Self::new(format!("{}:{}", daemon_url.trim_end_matches('/'), port)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> PromptResult<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| PromptError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(PromptError::Status {
                status_code: status.as_u16(),
            });
        }
        Ok(response)
    }

    #[instrument(skip(self, request), fields(key = request.name, kind = request.kind))]
    async fn prompt<T: DeserializeOwned>(&self, request: PromptRequest<'_>) -> PromptResult<T> {
        let key = request.name;
        let response: PromptResponse = self
            .post("/prompt", &request)
            .await?
            .json()
            .await
            .map_err(|e| PromptError::decode(key, e.to_string()))?;

        debug!(reply = %response.reply_filename, "Waiting for prompt reply");
        let reply = tokio::fs::read_to_string(Path::new(&response.reply_filename))
            .await
            .map_err(|e| PromptError::Transport {
                message: format!("failed to read reply {}: {}", response.reply_filename, e),
            })?;

        decode_reply(key, &reply)
    }
}

#[async_trait]
impl Prompter for DaemonPrompter {
    async fn print(&self, text: &str) -> PromptResult<()> {
        self.post("/print", &TextRequest { text }).await?;
        Ok(())
    }

    async fn confirm(&self, key: &str, message: &str, default: bool) -> PromptResult<bool> {
        self.prompt(PromptRequest {
            name: key,
            kind: "confirm",
            message,
            choices: &[],
            allow_empty: false,
            default: Value::Bool(default),
        })
        .await
    }

    async fn input(
        &self,
        key: &str,
        message: &str,
        default: &str,
        allow_empty: bool,
    ) -> PromptResult<String> {
        self.prompt(PromptRequest {
            name: key,
            kind: "input",
            message,
            choices: &[],
            allow_empty,
            default: Value::from(default),
        })
        .await
    }

    async fn secret(&self, key: &str, message: &str) -> PromptResult<String> {
        self.prompt(PromptRequest {
            name: key,
            kind: "secret",
            message,
            choices: &[],
            allow_empty: false,
            default: Value::Null,
        })
        .await
    }

    async fn list(
        &self,
        key: &str,
        message: &str,
        choices: &[String],
        default: &str,
    ) -> PromptResult<String> {
        self.prompt(PromptRequest {
            name: key,
            kind: "list",
            message,
            choices,
            allow_empty: false,
            default: Value::from(default),
        })
        .await
    }

    async fn checkbox(
        &self,
        key: &str,
        message: &str,
        choices: &[String],
    ) -> PromptResult<Vec<String>> {
        self.prompt(PromptRequest {
            name: key,
            kind: "checkbox",
            message,
            choices,
            allow_empty: true,
            default: Value::Null,
        })
        .await
    }

    async fn editor(&self, key: &str, message: &str, default: &str) -> PromptResult<String> {
        self.prompt(PromptRequest {
            name: key,
            kind: "editor",
            message,
            choices: &[],
            allow_empty: true,
            default: Value::from(default),
        })
        .await
    }

    async fn datetime(
        &self,
        key: &str,
        message: &str,
        default: NaiveDateTime,
    ) -> PromptResult<NaiveDateTime> {
        let raw: String = self
            .prompt(PromptRequest {
                name: key,
                kind: "datetime",
                message,
                choices: &[],
                allow_empty: false,
                default: Value::from(default.format(DATETIME_FORMAT).to_string()),
            })
            .await?;

        NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT)
            .map_err(|e| PromptError::decode(key, e.to_string()))
    }

    async fn spinner_start(&self, text: &str) -> PromptResult<()> {
        self.post("/start-spinner", &TextRequest { text }).await?;
        Ok(())
    }

    async fn spinner_stop(&self, text: &str) -> PromptResult<()> {
        self.post("/stop-spinner", &TextRequest { text }).await?;
        Ok(())
    }

    async fn track(&self, event: &str, tags: &[String], metadata: &Value) -> PromptResult<()> {
        self.post(
            "/track",
            &TrackRequest {
                event,
                tags,
                details: metadata,
                error: "",
            },
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use tempfile::TempDir;

    /// Write a reply file and return the daemon response pointing at it
    fn reply_file(dir: &TempDir, name: &str, reply: Value) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, reply.to_string()).unwrap();
        json!({ "replyFilename": path.to_string_lossy() }).to_string()
    }

    #[tokio::test]
    async fn test_input_prompt_reads_reply_file() {
        let dir = TempDir::new().unwrap();
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/prompt")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "name": "GITHUB_REPO",
                "type": "input",
                "message": "GitHub repository name",
                "allowEmpty": false
            })))
            .with_body(reply_file(&dir, "repo", json!({ "GITHUB_REPO": "myapp" })))
            .create_async()
            .await;

        let prompter = DaemonPrompter::new(server.url());
        let answer = prompter
            .input("GITHUB_REPO", "GitHub repository name", "", false)
            .await
            .unwrap();

        assert_eq!(answer, "myapp");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_typed_replies() {
        let dir = TempDir::new().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/prompt")
            .match_body(Matcher::PartialJson(json!({ "type": "confirm", "default": true })))
            .with_body(reply_file(&dir, "confirm", json!({ "RDS_REQUIRED": false })))
            .create_async()
            .await;
        server
            .mock("POST", "/prompt")
            .match_body(Matcher::PartialJson(json!({ "type": "checkbox" })))
            .with_body(reply_file(&dir, "checkbox", json!({ "TAGS": ["a", "b"] })))
            .create_async()
            .await;
        server
            .mock("POST", "/prompt")
            .match_body(Matcher::PartialJson(json!({ "type": "datetime" })))
            .with_body(reply_file(&dir, "datetime", json!({ "WHEN": "2024-03-01 12:30:00" })))
            .create_async()
            .await;

        let prompter = DaemonPrompter::new(server.url());
        assert!(!prompter.confirm("RDS_REQUIRED", "Need a database?", true).await.unwrap());

        let choices = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let tags = prompter.checkbox("TAGS", "Tags", &choices).await.unwrap();
        assert_eq!(tags, vec!["a", "b"]);

        let default = NaiveDateTime::parse_from_str("2024-01-01 00:00:00", DATETIME_FORMAT).unwrap();
        let when = prompter.datetime("WHEN", "When?", default).await.unwrap();
        assert_eq!(when.format(DATETIME_FORMAT).to_string(), "2024-03-01 12:30:00");
    }

    #[tokio::test]
    async fn test_reply_with_wrong_type_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/prompt")
            .with_body(reply_file(&dir, "confirm", json!({ "RDS_REQUIRED": "yes" })))
            .create_async()
            .await;

        let prompter = DaemonPrompter::new(server.url());
        let result = prompter.confirm("RDS_REQUIRED", "Need a database?", true).await;
        assert!(matches!(result, Err(PromptError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_reply_without_key_is_missing_answer() {
        let dir = TempDir::new().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/prompt")
            .with_body(reply_file(&dir, "other", json!({ "OTHER": "x" })))
            .create_async()
            .await;

        let prompter = DaemonPrompter::new(server.url());
        let result = prompter.secret("AWS_SECRET_ACCESS_KEY", "Secret").await;
        assert!(matches!(result, Err(PromptError::MissingAnswer { .. })));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/print")
            .with_status(500)
            .create_async()
            .await;

        let prompter = DaemonPrompter::new(server.url());
        let result = prompter.print("hello").await;
        assert!(matches!(result, Err(PromptError::Status { status_code: 500 })));
    }

    #[tokio::test]
    async fn test_print_spinner_and_track_bodies() {
        let mut server = mockito::Server::new_async().await;
        let print = server
            .mock("POST", "/print")
            .match_body(Matcher::Json(json!({ "text": "✅ Download complete." })))
            .create_async()
            .await;
        let start = server
            .mock("POST", "/start-spinner")
            .match_body(Matcher::Json(json!({ "text": "Working" })))
            .create_async()
            .await;
        let stop = server
            .mock("POST", "/stop-spinner")
            .match_body(Matcher::Json(json!({ "text": "Done" })))
            .create_async()
            .await;
        let track = server
            .mock("POST", "/track")
            .match_body(Matcher::PartialJson(json!({
                "event": "Deployment complete",
                "tags": ["ebdeploy"],
                "details": { "pipeline": "Create New" }
            })))
            .create_async()
            .await;

        let prompter = DaemonPrompter::new(server.url());
        prompter.print("✅ Download complete.").await.unwrap();
        prompter.spinner_start("Working").await.unwrap();
        prompter.spinner_stop("Done").await.unwrap();
        prompter
            .track(
                "Deployment complete",
                &["ebdeploy".to_string()],
                &json!({ "pipeline": "Create New" }),
            )
            .await
            .unwrap();

        print.assert_async().await;
        start.assert_async().await;
        stop.assert_async().await;
        track.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_daemon_is_transport_error() {
        let prompter = DaemonPrompter::new("http://127.0.0.1:1");
        let result = prompter.print("hello").await;
        assert!(matches!(result, Err(PromptError::Transport { .. })));
    }
}
