use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use echo_chat_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent,
};
use tracing::Instrument;

type SendRequestResult =
    Result<ModelClientResponse, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest, RetryPolicy) -> BoxedSendRequestFuture + Send + Sync>;

/// How transient provider failures are retried.
///
/// Only errors whose kind is transient (rate limits, network trouble) are
/// retried, with exponential backoff starting at `initial_interval`. No new
/// attempt starts once `max_elapsed` has passed since the first one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Total time budget for retrying.
    pub max_elapsed: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub const fn disabled() -> Self {
        Self {
            initial_interval: Duration::ZERO,
            max_elapsed: Duration::ZERO,
        }
    }

    #[inline]
    fn is_disabled(&self) -> bool {
        self.max_elapsed.is_zero()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_elapsed: Duration::from_secs(10),
        }
    }
}

/// A wrapper around a model provider that drains its responses and
/// provides a type-erased interface for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    retry_policy: RetryPolicy,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // The provider is shared by every attempt of every request, and
        // `ModelClient` doesn't carry its type.
        let provider = Arc::new(provider);
        let handler_fn: HandlerFn = Arc::new(move |req, policy| {
            let provider = Arc::clone(&provider);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    send_with_retry(&*provider, &req, policy).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self {
            handler_fn,
            retry_policy: RetryPolicy::default(),
        }
    }

    #[inline]
    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.retry_policy = policy;
    }

    /// Sends a request and returns the complete reply.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the future stops the current
    /// attempt and any pending retry.
    #[inline]
    pub async fn send_request(&self, req: ModelRequest) -> SendRequestResult {
        (self.handler_fn)(req, self.retry_policy).await
    }
}

/// A completely received reply from the model client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelClientResponse {
    pub text: String,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn send_with_retry<P: ModelProvider + 'static>(
    provider: &P,
    req: &ModelRequest,
    policy: RetryPolicy,
) -> SendRequestResult {
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.initial_interval)
        .with_max_elapsed_time(Some(policy.max_elapsed))
        .build();

    let mut attempt = 0u32;
    backoff::future::retry(backoff, || {
        attempt += 1;
        let fut = provider.send_request(req);
        async move {
            let resp_or_err = fut.await;
            handle_response::<P>(resp_or_err).await.map_err(|err| {
                if err.kind().is_transient() && !policy.is_disabled() {
                    warn!("attempt {attempt} failed, will retry: {err}");
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
        }
    })
    .await
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut text = String::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };

        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(delta) => {
                text.push_str(&delta);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        text,
        finish_reason,
    })
}
