use std::time::Duration;

use echo_chat_model::ModelProvider;

use super::Controller;
use crate::model_client::{ModelClient, RetryPolicy};
use crate::prompt::UserProfile;
use crate::view::View;

/// Number of earlier messages sent along with each request by default.
pub const DEFAULT_HISTORY_DEPTH: usize = 10;

/// How long an exchange may wait for its reply by default.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// [`Controller`] builder.
pub struct ControllerBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) view: Box<dyn View>,
    pub(crate) system_prompt: Option<String>,
    pub(crate) chat_rules: Vec<String>,
    pub(crate) user_profile: Option<UserProfile>,
    pub(crate) history_depth: usize,
    pub(crate) reply_timeout: Duration,
    pub(crate) on_idle: Option<Box<dyn Fn() + Send + Sync>>,
}

impl ControllerBuilder {
    /// Creates a new builder with the specified reply source.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            view: Box::new(()),
            system_prompt: None,
            chat_rules: Vec::new(),
            user_profile: None,
            history_depth: DEFAULT_HISTORY_DEPTH,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            on_idle: None,
        }
    }

    /// Sets the view the controller drives. Without one the controller runs
    /// headless.
    #[inline]
    pub fn with_view<V: View>(mut self, view: V) -> Self {
        self.view = Box::new(view);
        self
    }

    /// Sets the system prompt sent at the start of every request.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the rules appended, numbered, to the system prompt.
    #[inline]
    pub fn with_chat_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chat_rules = rules.into_iter().map(Into::into).collect();
        self
    }

    /// Describes the user to the assistant in the system prompt.
    #[inline]
    pub fn with_user_profile(mut self, profile: UserProfile) -> Self {
        self.user_profile = Some(profile);
        self
    }

    /// Sets how many earlier messages accompany each request.
    #[inline]
    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }

    /// Sets how long an exchange may wait for its reply.
    #[inline]
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Sets how transient provider failures are retried.
    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.model_client.set_retry_policy(policy);
        self
    }

    /// Attaches a callback to be invoked whenever an exchange resolves.
    #[inline]
    pub fn on_idle(
        mut self,
        on_idle: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.on_idle = Some(Box::new(on_idle));
        self
    }

    /// Builds the controller and starts its task.
    ///
    /// Must be called within a tokio runtime.
    #[inline]
    pub fn build(self) -> Controller {
        Controller::spawn_from_builder(self)
    }
}
