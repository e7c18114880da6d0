use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The provider could not be reached.
    Network,
    /// The provider did not answer in time.
    Timeout,
    /// Any other errors.
    Other,
}

impl ErrorKind {
    /// Returns `true` if a later attempt with the same request may succeed.
    #[inline]
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::RateLimitExceeded | ErrorKind::Network)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Moderated => write!(f, "content was moderated"),
            ErrorKind::RateLimitExceeded => write!(f, "rate limit exceeded"),
            ErrorKind::Network => write!(f, "network error"),
            ErrorKind::Timeout => write!(f, "request timed out"),
            ErrorKind::Other => write!(f, "unexpected error"),
        }
    }
}
