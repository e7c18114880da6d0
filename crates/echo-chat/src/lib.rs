//! A small chat window for the terminal.
//!
//! Without an API key every message is answered by a simulated assistant.
//! Setting `OPENAI_API_KEY` switches to an OpenAI-compatible backend. The
//! library half exposes configuration and the terminal view so other hosts
//! can reuse them.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

pub mod config;
#[cfg(feature = "cli")]
pub mod terminal;

pub use config::{Backend, Config, ConfigError};

/// Re-exports of [`echo_chat_core`] crate.
pub mod core {
    pub use echo_chat_core::*;
}
