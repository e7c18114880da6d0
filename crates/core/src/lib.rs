//! The chat session controller and the types it works with.
//!
//! A [`Controller`] owns a [`Transcript`](transcript::Transcript) and
//! drives a [`View`](view::View). Each submitted input becomes an
//! exchange: the user message and a placeholder are appended, the reply
//! source is asked for a reply in the background, and the placeholder is
//! then replaced by the reply or by an error indicator.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod controller;
mod error;
mod model_client;
mod prompt;
pub mod transcript;
pub mod view;

pub use controller::{Controller, ControllerBuilder, Submission};
pub use controller::{DEFAULT_HISTORY_DEPTH, DEFAULT_REPLY_TIMEOUT};
pub use error::{ControllerClosed, ExchangeError};
pub use model_client::RetryPolicy;
pub use prompt::UserProfile;
