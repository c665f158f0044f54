//! The prompt/output capability every workflow step talks to.
//!
//! The workflow never knows whether it is driving a terminal or a chat UI
//! behind the local prompt daemon; both sit behind [`Prompter`]. Every prompt
//! carries a stable key so answers can be supplied ahead of time and so the
//! daemon can attribute responses.

use crate::error::PromptError;
use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Result type for prompt operations
pub type PromptResult<T> = std::result::Result<T, PromptError>;

/// Choice shown at the top of live-fetched lists to allow free-text entry
pub const ENTER_A_VALUE: &str = "Enter a value";

/// Interactive input/output channel
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Show a line of progress or information
    async fn print(&self, text: &str) -> PromptResult<()>;

    /// Yes/no question
    async fn confirm(&self, key: &str, message: &str, default: bool) -> PromptResult<bool>;

    /// Free-text answer; `allow_empty` lets the user accept the default with an empty line
    async fn input(
        &self,
        key: &str,
        message: &str,
        default: &str,
        allow_empty: bool,
    ) -> PromptResult<String>;

    /// Hidden free-text answer
    async fn secret(&self, key: &str, message: &str) -> PromptResult<String>;

    /// Single choice from `choices`
    async fn list(
        &self,
        key: &str,
        message: &str,
        choices: &[String],
        default: &str,
    ) -> PromptResult<String>;

    /// Any number of choices from `choices`
    async fn checkbox(
        &self,
        key: &str,
        message: &str,
        choices: &[String],
    ) -> PromptResult<Vec<String>>;

    /// Multi-line text edited in an external editor
    async fn editor(&self, key: &str, message: &str, default: &str) -> PromptResult<String>;

    /// Date and time answer
    async fn datetime(
        &self,
        key: &str,
        message: &str,
        default: NaiveDateTime,
    ) -> PromptResult<NaiveDateTime>;

    /// Start an activity indicator
    async fn spinner_start(&self, _text: &str) -> PromptResult<()> {
        Ok(())
    }

    /// Stop the activity indicator, leaving `text` behind
    async fn spinner_stop(&self, _text: &str) -> PromptResult<()> {
        Ok(())
    }

    /// Record a usage event
    async fn track(
        &self,
        _event: &str,
        _tags: &[String],
        _metadata: &serde_json::Value,
    ) -> PromptResult<()> {
        Ok(())
    }
}

/// Print through the prompter, logging instead of failing when the channel drops a line.
pub async fn notify(prompter: &dyn Prompter, text: &str) {
    if let Err(err) = prompter.print(text).await {
        tracing::warn!(error = %err, "Failed to print to prompt channel");
    }
}

/// Ask for a secret twice until both entries match.
///
/// There is no limit on attempts; the user is interactive and can always abort.
pub async fn confirmed_secret(
    prompter: &dyn Prompter,
    key: &str,
    message: &str,
) -> PromptResult<String> {
    loop {
        let first = prompter.secret(key, message).await?;
        notify(prompter, "ℹ️  Please confirm the password.").await;
        let second = prompter.secret(key, message).await?;

        if first == second {
            return Ok(first);
        }

        notify(prompter, "ℹ️  The passwords did not match. Please try again.").await;
    }
}

/// Pick a name from a live-fetched list, falling back to free-text entry.
pub async fn choose_or_enter(
    prompter: &dyn Prompter,
    key: &str,
    list_message: &str,
    input_message: &str,
    names: Vec<String>,
) -> PromptResult<String> {
    let mut choices = Vec::with_capacity(names.len() + 1);
    choices.push(ENTER_A_VALUE.to_string());
    choices.extend(names);

    let chosen = prompter
        .list(key, list_message, &choices, ENTER_A_VALUE)
        .await?;

    if chosen == ENTER_A_VALUE {
        prompter.input(key, input_message, "", false).await
    } else {
        Ok(chosen)
    }
}
