//! Settings read from the environment.

use std::env;
use std::error::Error;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::time::Duration;

use echo_chat_core::{
    ControllerBuilder, DEFAULT_HISTORY_DEPTH, DEFAULT_REPLY_TIMEOUT,
    UserProfile,
};
use echo_chat_openai_model::{
    OpenAIConfig, OpenAIConfigBuilder, OpenAIProvider,
};
use echo_chat_simulated_model::{DEFAULT_DELAY, SimulatedProvider};

const DEFAULT_SYSTEM_PROMPT: &str = include_str!("./system_prompt.md");
const DEFAULT_WIDTH: usize = 80;
const MIN_WIDTH: usize = 20;
const MAX_WIDTH: usize = 1000;
const RULE_SEPARATOR: char = ';';

/// Where replies come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Canned replies after a fixed delay. Used when no API key is set.
    Simulated {
        /// How long each reply takes.
        delay: Duration,
    },
    /// An OpenAI-compatible chat completions API.
    OpenAI(OpenAIConfig),
}

/// Everything needed to start a chat session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// The reply source.
    pub backend: Backend,
    /// System prompt sent with every request.
    pub system_prompt: String,
    /// Rules appended to the system prompt.
    pub chat_rules: Vec<String>,
    /// Who the assistant is talking to, if known.
    pub user_profile: Option<UserProfile>,
    /// How many earlier messages accompany each request.
    pub history_depth: usize,
    /// How long an exchange may wait for its reply.
    pub reply_timeout: Duration,
    /// Width of the terminal layout, in columns.
    pub width: usize,
}

/// A variable was set to a value that cannot be used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError {
    var: &'static str,
    value: String,
    reason: String,
}

impl ConfigError {
    /// Returns the name of the offending variable.
    #[inline]
    pub fn var(&self) -> &str {
        self.var
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}={:?}: {}", self.var, self.value, self.reason)
    }
}

impl Error for ConfigError {}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let reply_timeout = parse_var(&lookup, "ECHO_CHAT_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REPLY_TIMEOUT);
        if reply_timeout.is_zero() {
            return Err(ConfigError {
                var: "ECHO_CHAT_TIMEOUT_SECS",
                value: "0".to_owned(),
                reason: "must be at least one second".to_owned(),
            });
        }

        let backend = match lookup("OPENAI_API_KEY") {
            Some(api_key) => {
                let mut builder = OpenAIConfigBuilder::with_api_key(api_key)
                    .with_request_timeout(reply_timeout);
                if let Some(base_url) = lookup("OPENAI_BASE_URL") {
                    builder = builder.with_base_url(base_url);
                }
                if let Some(model) = lookup("OPENAI_MODEL") {
                    builder = builder.with_model(model);
                }
                Backend::OpenAI(builder.build())
            }
            None => {
                let delay = parse_var(&lookup, "ECHO_CHAT_DELAY_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_DELAY);
                Backend::Simulated { delay }
            }
        };

        let width = parse_var(&lookup, "ECHO_CHAT_WIDTH")?
            .unwrap_or(DEFAULT_WIDTH);
        if !(MIN_WIDTH..=MAX_WIDTH).contains(&width) {
            return Err(ConfigError {
                var: "ECHO_CHAT_WIDTH",
                value: width.to_string(),
                reason: format!("must be between {MIN_WIDTH} and {MAX_WIDTH}"),
            });
        }

        let chat_rules: Vec<String> = lookup("ECHO_CHAT_RULES")
            .map(|rules| {
                rules
                    .split(RULE_SEPARATOR)
                    .map(str::trim)
                    .filter(|rule| !rule.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let description = lookup("ECHO_CHAT_USER_DESCRIPTION");
        let user_profile = match (lookup("ECHO_CHAT_USER_NAME"), description) {
            (Some(name), description) => Some(UserProfile::new(
                name.trim(),
                description.as_deref().map(str::trim).unwrap_or_default(),
            )),
            (None, Some(description)) => {
                return Err(ConfigError {
                    var: "ECHO_CHAT_USER_DESCRIPTION",
                    value: description,
                    reason: "ECHO_CHAT_USER_NAME is not set".to_owned(),
                });
            }
            (None, None) => None,
        };

        Ok(Self {
            backend,
            system_prompt: lookup("ECHO_CHAT_SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.trim().to_owned()),
            chat_rules,
            user_profile,
            history_depth: parse_var(&lookup, "ECHO_CHAT_HISTORY_DEPTH")?
                .unwrap_or(DEFAULT_HISTORY_DEPTH),
            reply_timeout,
            width,
        })
    }

    /// Creates a controller builder wired to the configured backend.
    pub fn controller_builder(&self) -> ControllerBuilder {
        let builder = match &self.backend {
            Backend::Simulated { delay } => {
                debug!("using simulated replies");
                ControllerBuilder::with_model_provider(
                    SimulatedProvider::with_delay(*delay),
                )
            }
            Backend::OpenAI(config) => {
                debug!("using {config:?}");
                ControllerBuilder::with_model_provider(OpenAIProvider::new(
                    config.clone(),
                ))
            }
        };
        let builder = match &self.user_profile {
            Some(profile) => builder.with_user_profile(profile.clone()),
            None => builder,
        };
        builder
            .with_system_prompt(&self.system_prompt)
            .with_chat_rules(self.chat_rules.iter().cloned())
            .with_history_depth(self.history_depth)
            .with_reply_timeout(self.reply_timeout)
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    match value.trim().parse() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(err) => Err(ConfigError {
            var,
            reason: format!("{err}"),
            value,
        }),
    }
}
