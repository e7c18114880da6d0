use std::error::Error;
use std::fmt::{self, Display};
use std::time::Duration;

use echo_chat_model::{ErrorKind, ModelProviderError};

use crate::transcript::Message;

/// Why an exchange ended without a reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeError {
    /// The reply source reported an error.
    Provider {
        /// The kind reported by the provider.
        kind: ErrorKind,
        /// Human readable details.
        message: String,
    },
    /// No reply arrived within the configured timeout.
    TimedOut(Duration),
    /// The exchange was cancelled before it resolved.
    Cancelled,
}

impl ExchangeError {
    /// Returns the provider error kind, if the provider is what failed.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ExchangeError::Provider { kind, .. } => Some(*kind),
            ExchangeError::TimedOut(_) => Some(ErrorKind::Timeout),
            ExchangeError::Cancelled => None,
        }
    }

    /// The transcript entry that replaces the placeholder.
    pub(crate) fn to_message(&self) -> Message {
        match self {
            ExchangeError::Cancelled => Message::error("Request cancelled."),
            _ => Message::error(format!(
                "(system) Something went wrong: {self}."
            )),
        }
    }
}

impl From<Box<dyn ModelProviderError>> for ExchangeError {
    fn from(err: Box<dyn ModelProviderError>) -> Self {
        ExchangeError::Provider {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeError::Provider { message, .. } => f.write_str(message),
            ExchangeError::TimedOut(timeout) => {
                write!(f, "no reply within {} seconds", timeout.as_secs_f32())
            }
            ExchangeError::Cancelled => f.write_str("request cancelled"),
        }
    }
}

impl Error for ExchangeError {}

/// Returned when talking to a controller that has shut down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControllerClosed;

impl Display for ControllerClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "the chat controller has shut down".fmt(f)
    }
}

impl Error for ControllerClosed {}
