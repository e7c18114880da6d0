//! The protocol between the chat controller and whatever produces replies.
//!
//! A reply may come from a canned responder or from a remote LLM API. Both
//! are modelled as a [`ModelProvider`] whose requests may suspend and fail,
//! so the controller never has to know which one it is talking to.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
