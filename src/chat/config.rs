//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::time::Duration;

use arrrg_derive::CommandLine;
use utf8path::Path;

use crate::error::{Error, Result};
use crate::session::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT, SessionConfig};
use crate::wizard::Wizard;

/// Default number of seconds to wait for the next piece of a reply.
const DEFAULT_TURN_TIMEOUT_SECS: u64 = 120;

/// Command-line arguments for the architect tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: claude-haiku-4-5)", "MODEL")]
    pub model: Option<String>,

    /// System prompt replacing the built-in Docusaurus instructions.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: 4096)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature, kept as text until validated.
    #[arrrg(optional, "Sampling temperature between 0.0 and 1.0", "TEMP")]
    pub temperature: Option<String>,

    /// Seconds to wait for the next piece of a reply; 0 waits forever.
    #[arrrg(optional, "Seconds to wait for streamed output (default: 120, 0 = no limit)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Base URL of the Messages API.
    #[arrrg(optional, "API base URL (default: https://api.anthropic.com/v1/)", "URL")]
    pub base_url: Option<String>,

    /// YAML file of installation steps replacing the built-in walkthrough.
    #[arrrg(optional, "YAML file of installation steps", "FILE")]
    pub steps: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// The model to use for generating responses.
    pub model: String,

    /// System prompt sent with every turn.
    pub system_prompt: Option<String>,

    /// Maximum tokens per response.
    pub max_tokens: u32,

    /// Optional sampling temperature.
    pub temperature: Option<f32>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// How long to wait for the next fragment before failing the turn.
    pub turn_timeout: Option<Duration>,

    /// Override for the API base URL.
    pub base_url: Option<String>,

    /// Installation steps to load instead of the built-in ones.
    pub steps_path: Option<String>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: claude-haiku-4-5
    /// - Max tokens: 4096
    /// - Color: enabled
    /// - Turn timeout: 120 seconds
    /// - System prompt: the Docusaurus consultant instructions
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            use_color: true,
            turn_timeout: Some(Duration::from_secs(DEFAULT_TURN_TIMEOUT_SECS)),
            base_url: None,
            steps_path: None,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets or clears the system prompt.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets the per-fragment timeout.  `None` waits forever.
    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Sets the API base URL.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    /// Sets the installation steps file.
    pub fn with_steps_path(mut self, path: Option<String>) -> Self {
        self.steps_path = path;
        self
    }

    /// Request parameters for the assistant session.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new()
            .with_model(self.model.clone())
            .with_max_tokens(self.max_tokens)
            .with_system(self.system_prompt.clone())
            .with_temperature(self.temperature)
    }

    /// The configured walkthrough, or the built-in one.
    pub fn load_wizard(&self) -> Result<Wizard> {
        match &self.steps_path {
            Some(path) => Wizard::from_file(&Path::from(path.as_str())),
            None => Wizard::builtin(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let temperature = args
            .temperature
            .as_deref()
            .map(parse_temperature)
            .transpose()?;
        let turn_timeout = match args.timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(Duration::from_secs(DEFAULT_TURN_TIMEOUT_SECS)),
        };
        let defaults = ChatConfig::new();
        Ok(ChatConfig {
            model: args.model.unwrap_or(defaults.model),
            system_prompt: args.system.or(defaults.system_prompt),
            max_tokens: args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature,
            use_color: !args.no_color,
            turn_timeout,
            base_url: args.base_url,
            steps_path: args.steps,
        })
    }
}

fn parse_temperature(value: &str) -> Result<f32> {
    match value.trim().parse::<f32>() {
        Ok(parsed) if parsed.is_finite() && (0.0..=1.0).contains(&parsed) => Ok(parsed),
        _ => Err(Error::validation(
            format!("temperature {value:?} must be a number between 0.0 and 1.0"),
            Some("temperature".to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.model, "claude-haiku-4-5");
        assert_eq!(config.max_tokens, 4096);
        assert!(config.use_color);
        assert_eq!(config.system_prompt.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
        assert!(config.temperature.is_none());
        assert_eq!(config.turn_timeout, Some(Duration::from_secs(120)));
        assert!(config.base_url.is_none());
        assert!(config.steps_path.is_none());
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::try_from(ChatArgs::default()).unwrap();
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            model: Some("claude-sonnet-4-0".to_string()),
            system: Some("You are terse.".to_string()),
            max_tokens: Some(8192),
            temperature: Some("0.25".to_string()),
            timeout_secs: Some(0),
            base_url: Some("http://localhost:8080/v1/".to_string()),
            steps: Some("steps.yaml".to_string()),
            no_color: true,
        };
        let config = ChatConfig::try_from(args).unwrap();
        assert_eq!(config.model, "claude-sonnet-4-0");
        assert_eq!(config.system_prompt.as_deref(), Some("You are terse."));
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(config.temperature, Some(0.25));
        assert!(config.turn_timeout.is_none());
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/v1/"));
        assert_eq!(config.steps_path.as_deref(), Some("steps.yaml"));
        assert!(!config.use_color);
    }

    #[test]
    fn config_rejects_bad_temperature() {
        for bad in ["hot", "1.5", "-0.1", "NaN"] {
            let args = ChatArgs {
                temperature: Some(bad.to_string()),
                ..ChatArgs::default()
            };
            let err = ChatConfig::try_from(args).unwrap_err();
            assert_eq!(err.param(), Some("temperature"), "{bad}");
        }
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_model("claude-opus-4-1")
            .with_system_prompt(None)
            .with_max_tokens(1024)
            .with_temperature(Some(0.7))
            .with_turn_timeout(Some(Duration::from_secs(30)))
            .without_color();
        assert_eq!(config.model, "claude-opus-4-1");
        assert!(config.system_prompt.is_none());
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.temperature, Some(0.7));
        assert_eq!(config.turn_timeout, Some(Duration::from_secs(30)));
        assert!(!config.use_color);

        let session = config.session_config();
        assert_eq!(session.model, "claude-opus-4-1");
        assert_eq!(session.max_tokens, 1024);
        assert!(session.system.is_none());
        assert_eq!(session.temperature, Some(0.7));
    }

    #[test]
    fn builtin_wizard_by_default() {
        let wizard = ChatConfig::new().load_wizard().unwrap();
        assert_eq!(wizard.len(), 4);
    }
}
