mod builder;
mod state;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::select;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::Instrument;

use crate::error::ControllerClosed;
use crate::transcript::Transcript;
pub use builder::{
    ControllerBuilder, DEFAULT_HISTORY_DEPTH, DEFAULT_REPLY_TIMEOUT,
};
use state::{Command, ControllerState};

/// What happened to a submitted input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Submission {
    /// An exchange has started for the input.
    Accepted,
    /// The input was empty or whitespace-only and was ignored.
    Empty,
    /// Another exchange is still awaiting its reply, so the input was
    /// ignored and the view left untouched.
    Busy,
}

/// Handle to a chat session controller.
///
/// The controller runs as its own task and exclusively owns the transcript,
/// the view and the reply source. Handles are cheap to clone; the task ends
/// after [`Controller::shutdown`] or once every handle is dropped.
#[derive(Clone)]
pub struct Controller {
    cmd_tx: mpsc::UnboundedSender<Command>,
    kill_tx: Arc<watch::Sender<bool>>,
}

impl Controller {
    /// Submits the text from the input field.
    pub async fn submit<S: Into<String>>(
        &self,
        input: S,
    ) -> Result<Submission, ControllerClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Submit {
            input: input.into(),
            reply_tx,
        })?;
        reply_rx.await.map_err(|_| ControllerClosed)
    }

    /// Aborts the exchange awaiting its reply, if there is one.
    pub fn cancel(&self) -> Result<(), ControllerClosed> {
        self.send(Command::Cancel)
    }

    /// Returns a snapshot of the transcript.
    pub async fn transcript(&self) -> Result<Transcript, ControllerClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Snapshot(reply_tx))?;
        reply_rx.await.map_err(|_| ControllerClosed)
    }

    /// Stops the controller. A pending exchange is aborted without touching
    /// the view.
    #[inline]
    pub fn shutdown(&self) {
        self.kill_tx.send(true).ok();
    }

    #[inline]
    fn send(&self, cmd: Command) -> Result<(), ControllerClosed> {
        self.cmd_tx.send(cmd).map_err(|_| ControllerClosed)
    }

    fn spawn_from_builder(builder: ControllerBuilder) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = watch::channel(false);
        let state = ControllerState::from_builder(builder, cmd_tx.downgrade());
        tokio::spawn(
            run_controller(state, cmd_rx, kill_rx)
                .instrument(trace_span!("controller")),
        );
        Self {
            cmd_tx,
            kill_tx: Arc::new(kill_tx),
        }
    }
}

async fn run_controller(
    mut state: ControllerState,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut kill_rx: watch::Receiver<bool>,
) {
    debug!("started");
    loop {
        let cmd = select! {
            biased;

            _ = kill_rx.changed() => {
                break;
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                cmd
            }
        };
        trace!("received command: {cmd:?}");
        state.handle(cmd);
    }
    state.abort_exchange();
    debug!("will terminate");
}
