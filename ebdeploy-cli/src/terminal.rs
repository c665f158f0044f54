//! Terminal prompts backed by dialoguer, with an indicatif spinner.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use dialoguer::{Confirm, Editor, Input, MultiSelect, Password, Select};
use ebdeploy_core::prompt::{PromptResult, Prompter, ENTER_A_VALUE};
use ebdeploy_core::PromptError;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Environment prefix for answers supplied ahead of time
pub const ANSWER_ENV_PREFIX: &str = "EBDEPLOY_ANSWER_";

/// Format of date-time answers
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Answers keyed by prompt key, consulted before asking
#[derive(Debug, Clone, Default)]
pub struct PresetAnswers {
    answers: HashMap<String, String>,
}

impl PresetAnswers {
    /// Parse `KEY=VALUE` pairs; the value may itself contain `=`
    pub fn parse(pairs: &[String]) -> anyhow::Result<Self> {
        let mut answers = HashMap::new();
        for pair in pairs {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Invalid answer '{}': expected KEY=VALUE", pair))?;
            if key.is_empty() {
                anyhow::bail!("Invalid answer '{}': empty key", pair);
            }
            answers.insert(key.to_string(), value.to_string());
        }
        Ok(Self { answers })
    }

    /// Add `EBDEPLOY_ANSWER_<KEY>` variables without replacing flag answers
    pub fn with_env(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        for (name, value) in vars {
            if let Some(key) = name.strip_prefix(ANSWER_ENV_PREFIX) {
                if !key.is_empty() {
                    self.answers.entry(key.to_string()).or_insert(value);
                }
            }
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.answers.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

/// Decode a preset yes/no answer
fn decode_bool(key: &str, raw: &str) -> PromptResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        other => Err(PromptError::decode(key, format!("'{}' is not a yes/no answer", other))),
    }
}

/// Decode a preset list answer, which must name one of the choices
fn decode_choice(key: &str, raw: &str, choices: &[String]) -> PromptResult<String> {
    choices
        .iter()
        .find(|choice| choice.as_str() == raw)
        .cloned()
        .ok_or_else(|| {
            PromptError::decode(key, format!("'{}' is not one of {}", raw, choices.join(", ")))
        })
}

/// Decode a comma-separated preset checkbox answer
fn decode_choices(key: &str, raw: &str, choices: &[String]) -> PromptResult<Vec<String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| decode_choice(key, item, choices))
        .collect()
}

fn decode_datetime(key: &str, raw: &str) -> PromptResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), DATETIME_FORMAT)
        .map_err(|e| PromptError::decode(key, e.to_string()))
}

fn interaction(error: dialoguer::Error) -> PromptError {
    PromptError::interaction(error.to_string())
}

/// Run a blocking dialoguer prompt off the async runtime
async fn blocking<T, F>(prompt: F) -> PromptResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> PromptResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(prompt)
        .await
        .map_err(|e| PromptError::interaction(e.to_string()))?
}

/// Prompts on the controlling terminal
pub struct TerminalPrompter {
    presets: PresetAnswers,
    spinner: Mutex<Option<ProgressBar>>,
}

impl TerminalPrompter {
    pub fn new(presets: PresetAnswers) -> Self {
        Self {
            presets,
            spinner: Mutex::new(None),
        }
    }

    fn preset(&self, key: &str) -> Option<&str> {
        let answer = self.presets.get(key);
        if answer.is_some() {
            debug!(key, "Using preset answer");
        }
        answer
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn print(&self, text: &str) -> PromptResult<()> {
        match self.spinner.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(spinner) => spinner.println(text),
                None => println!("{}", text),
            },
            Err(_) => println!("{}", text),
        }
        Ok(())
    }

    async fn confirm(&self, key: &str, message: &str, default: bool) -> PromptResult<bool> {
        if let Some(raw) = self.preset(key) {
            return decode_bool(key, raw);
        }

        let message = message.to_string();
        blocking(move || {
            Confirm::new()
                .with_prompt(message)
                .default(default)
                .interact()
                .map_err(interaction)
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
        if let Some(raw) = self.preset(key) {
            if raw.is_empty() && !allow_empty {
                return Err(PromptError::decode(key, "empty answer is not allowed"));
            }
            return Ok(raw.to_string());
        }

        let message = message.to_string();
        let default = default.to_string();
        blocking(move || {
            let mut input = Input::<String>::new()
                .with_prompt(message)
                .allow_empty(allow_empty);
            if !default.is_empty() {
                input = input.default(default);
            }
            input.interact_text().map_err(interaction)
        })
        .await
    }

    async fn secret(&self, key: &str, message: &str) -> PromptResult<String> {
        if let Some(raw) = self.preset(key) {
            return Ok(raw.to_string());
        }

        let message = message.to_string();
        blocking(move || {
            Password::new()
                .with_prompt(message)
                .interact()
                .map_err(interaction)
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
        if let Some(raw) = self.preset(key) {
            // An unlisted name goes through the free-text entry under the same key
            if !choices.iter().any(|c| c == raw) && choices.iter().any(|c| c == ENTER_A_VALUE) {
                return Ok(ENTER_A_VALUE.to_string());
            }
            return decode_choice(key, raw, choices);
        }
        if choices.is_empty() {
            return Err(PromptError::decode(key, "no choices to select from"));
        }

        let message = message.to_string();
        let choices = choices.to_vec();
        let selected = choices.iter().position(|c| c == default).unwrap_or(0);
        blocking(move || {
            let index = Select::new()
                .with_prompt(message)
                .items(&choices)
                .default(selected)
                .interact()
                .map_err(interaction)?;
            Ok(choices[index].clone())
        })
        .await
    }

    async fn checkbox(
        &self,
        key: &str,
        message: &str,
        choices: &[String],
    ) -> PromptResult<Vec<String>> {
        if let Some(raw) = self.preset(key) {
            return decode_choices(key, raw, choices);
        }

        let message = message.to_string();
        let choices = choices.to_vec();
        blocking(move || {
            let indices = MultiSelect::new()
                .with_prompt(message)
                .items(&choices)
                .interact()
                .map_err(interaction)?;
            Ok(indices.into_iter().map(|i| choices[i].clone()).collect())
        })
        .await
    }

    async fn editor(&self, key: &str, message: &str, default: &str) -> PromptResult<String> {
        if let Some(raw) = self.preset(key) {
            return Ok(raw.to_string());
        }

        println!("{}", message);
        let default = default.to_string();
        blocking(move || {
            let edited = Editor::new()
                .edit(&default)
                .map_err(|e| PromptError::interaction(e.to_string()))?;
            Ok(edited.unwrap_or(default))
        })
        .await
    }

    async fn datetime(
        &self,
        key: &str,
        message: &str,
        default: NaiveDateTime,
    ) -> PromptResult<NaiveDateTime> {
        if let Some(raw) = self.preset(key) {
            return decode_datetime(key, raw);
        }

        let message = format!("{} ({})", message, DATETIME_FORMAT);
        let key = key.to_string();
        blocking(move || {
            let raw = Input::<String>::new()
                .with_prompt(message)
                .default(default.format(DATETIME_FORMAT).to_string())
                .validate_with(|value: &String| -> Result<(), String> {
                    NaiveDateTime::parse_from_str(value.trim(), DATETIME_FORMAT)
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
                .interact_text()
                .map_err(interaction)?;
            decode_datetime(&key, &raw)
        })
        .await
    }

    async fn spinner_start(&self, text: &str) -> PromptResult<()> {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(text.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        let mut guard = self
            .spinner
            .lock()
            .map_err(|_| PromptError::interaction("spinner state poisoned"))?;
        if let Some(previous) = guard.replace(spinner) {
            previous.finish_and_clear();
        }
        Ok(())
    }

    async fn spinner_stop(&self, text: &str) -> PromptResult<()> {
        let spinner = self
            .spinner
            .lock()
            .map_err(|_| PromptError::interaction("spinner state poisoned"))?
            .take();
        match spinner {
            Some(spinner) => spinner.finish_with_message(text.to_string()),
            None => println!("{}", text),
        }
        Ok(())
    }
}
