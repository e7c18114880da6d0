//! A reply source that works without any API key.
//!
//! [`SimulatedProvider`] waits for a fixed delay and then answers with
//! [`respond`], a canned template that quotes the user's message. It stands
//! in for a real LLM backend and exercises the same asynchronous, fallible
//! path through the controller.

#[macro_use]
extern crate tracing;

mod failure;

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use echo_chat_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

use failure::FailurePlan;

/// How long the simulated assistant "thinks" before replying.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Builds the simulated reply for `input`.
///
/// The input is embedded verbatim, and the same input always yields the
/// same reply.
pub fn respond(input: &str) -> String {
    format!(
        "Received your message: '{input}'. This is a simulated reply. \
         To use a real assistant, configure an API key."
    )
}

/// Error type for [`SimulatedProvider`].
#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stage {
    Waiting,
    Replied,
    Finished,
}

/// The response of [`SimulatedProvider`].
///
/// Nothing is produced until the delay elapses. After that the reply is
/// delivered as a single delta, followed by the completion event.
pub struct SimulatedResponse {
    outcome: Result<String, ErrorKind>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
    stage: Stage,
}

impl ModelResponse for SimulatedResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        match this.stage {
            Stage::Waiting => {
                let delay = this.delay;
                let sleep =
                    this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
                ready!(sleep.as_mut().poll(cx));
                this.sleep = None;
                this.stage = Stage::Replied;

                match &this.outcome {
                    Ok(reply) => Poll::Ready(Ok(Some(
                        ModelResponseEvent::MessageDelta(reply.clone()),
                    ))),
                    Err(kind) => {
                        this.stage = Stage::Finished;
                        Poll::Ready(Err(Error {
                            message: "simulated failure",
                            kind: *kind,
                        }))
                    }
                }
            }
            Stage::Replied => {
                this.stage = Stage::Finished;
                Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                    ModelFinishReason::Stop,
                ))))
            }
            // In case this method is called after completion.
            Stage::Finished => Poll::Ready(Ok(None)),
        }
    }
}

/// A provider that answers every request with [`respond`] after a delay.
///
/// The reply quotes the latest user message of the request; the rest of the
/// history is ignored. Failures can be injected with
/// [`SimulatedProvider::fail_with`] to exercise error handling.
#[derive(Clone, Debug)]
pub struct SimulatedProvider {
    delay: Duration,
    failures: Option<Arc<FailurePlan>>,
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::with_delay(DEFAULT_DELAY)
    }
}

impl SimulatedProvider {
    /// Creates a provider that replies after `delay`.
    #[inline]
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            failures: None,
        }
    }

    /// Makes the first `times` requests fail with `kind`. `0` means every
    /// request fails.
    #[inline]
    pub fn fail_with(mut self, kind: ErrorKind, times: u64) -> Self {
        self.failures = Some(Arc::new(FailurePlan::new(kind, times)));
        self
    }

    /// Returns the delay before each reply.
    #[inline]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl ModelProvider for SimulatedProvider {
    type Error = crate::Error;
    type Response = SimulatedResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let Some(input) = req.last_user_text() else {
            return ready(Err(Error {
                message: "request carries no user message",
                kind: ErrorKind::Other,
            }));
        };

        let failure = self.failures.as_ref().and_then(|f| f.next_failure());
        let outcome = match failure {
            Some(kind) => {
                debug!("injecting a failure: {kind}");
                Err(kind)
            }
            None => Ok(respond(input)),
        };
        ready(Ok(SimulatedResponse {
            outcome,
            delay: self.delay,
            sleep: None,
            stage: Stage::Waiting,
        }))
    }
}
