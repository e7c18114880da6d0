//! A model provider for OpenAI-compatible APIs.

#[macro_use]
extern crate tracing;

mod config;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use echo_chat_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};
use reqwest::{Client, Response, StatusCode, header};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use proto::{ChatCompletion, ErrorBody, ModelList};
pub use response::OpenAIResponse;

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn from_transport(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() {
            ErrorKind::Network
        } else {
            err.status().map(kind_for_status).unwrap_or(ErrorKind::Other)
        };
        Self::new(format!("{err}"), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

fn kind_for_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ErrorKind::Timeout
        }
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
            ErrorKind::Network
        }
        _ => ErrorKind::Other,
    }
}

/// Turns a non-success response into an [`Error`], keeping the message the
/// server put in the body when there is one.
async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.is_empty() => status
            .canonical_reason()
            .unwrap_or("no reason given")
            .to_string(),
        Err(_) => body,
    };
    warn!("request failed with {status}: {detail}");
    Err(Error::new(
        format!("request failed with {status}: {detail}"),
        kind_for_status(status),
    ))
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    /// Returns the configuration of this provider.
    #[inline]
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Lists the ids of the models the server offers.
    pub fn list_models(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, Error>> + Send + 'static {
        let resp_fut = self
            .client
            .get(self.config.endpoint("/models"))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .timeout(self.config.request_timeout)
            .send();

        async move {
            let resp = resp_fut.await.map_err(Error::from_transport)?;
            let resp = check_status(resp).await?;
            let list: ModelList =
                resp.json().await.map_err(Error::from_transport)?;
            Ok(list.data.into_iter().map(|entry| entry.id).collect())
        }
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        trace!("sending {} messages", openai_req.messages.len());
        let resp_fut = self
            .client
            .post(self.config.endpoint("/chat/completions"))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::ACCEPT, "application/json")
            .timeout(self.config.request_timeout)
            .json(&openai_req)
            .send();

        async move {
            let resp = resp_fut.await.map_err(Error::from_transport)?;
            let resp = check_status(resp).await?;
            let completion: ChatCompletion =
                resp.json().await.map_err(Error::from_transport)?;
            OpenAIResponse::from_completion(completion)
        }
    }
}
