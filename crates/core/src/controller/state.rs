use std::fmt::{self, Debug};
use std::time::Duration;

use echo_chat_model::{ModelMessage, ModelRequest};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::Submission;
use super::builder::ControllerBuilder;
use crate::error::ExchangeError;
use crate::model_client::ModelClient;
use crate::prompt::compose_system_prompt;
use crate::transcript::{Message, Sender, Transcript};
use crate::view::View;

#[derive(Default)]
enum Stage {
    #[default]
    Idle,
    AwaitingReply {
        exchange_id: u64,
        task: JoinHandle<()>,
    },
}

pub enum Command {
    Submit {
        input: String,
        reply_tx: oneshot::Sender<Submission>,
    },
    Cancel,
    Snapshot(oneshot::Sender<Transcript>),
    ExchangeFinished {
        exchange_id: u64,
        result: Result<String, ExchangeError>,
    },
}

impl Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Submit { input, .. } => f
                .debug_struct("Submit")
                .field("input", input)
                .finish_non_exhaustive(),
            Command::Cancel => f.write_str("Cancel"),
            Command::Snapshot(_) => f.write_str("Snapshot"),
            Command::ExchangeFinished {
                exchange_id,
                result,
            } => f
                .debug_struct("ExchangeFinished")
                .field("exchange_id", exchange_id)
                .field("result", result)
                .finish(),
        }
    }
}

pub struct ControllerState {
    model_client: ModelClient,
    view: Box<dyn View>,
    transcript: Transcript,
    stage: Stage,
    system_prompt: Option<String>,
    history_depth: usize,
    reply_timeout: Duration,
    next_exchange_id: u64,
    cmd_tx: mpsc::WeakUnboundedSender<Command>,
    on_idle: Option<Box<dyn Fn() + Send + Sync>>,
}

impl ControllerState {
    pub fn from_builder(
        builder: ControllerBuilder,
        cmd_tx: mpsc::WeakUnboundedSender<Command>,
    ) -> Self {
        let ControllerBuilder {
            model_client,
            view,
            system_prompt,
            chat_rules,
            user_profile,
            history_depth,
            reply_timeout,
            on_idle,
        } = builder;
        let system_prompt = compose_system_prompt(
            system_prompt.as_deref(),
            &chat_rules,
            user_profile.as_ref(),
        );

        Self {
            model_client,
            view,
            transcript: Default::default(),
            stage: Default::default(),
            system_prompt,
            history_depth,
            reply_timeout,
            next_exchange_id: 1,
            cmd_tx,
            on_idle,
        }
    }

    pub fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Submit { input, reply_tx } => {
                let submission = self.submit(input);
                reply_tx.send(submission).ok();
            }
            Command::Cancel => self.cancel(),
            Command::Snapshot(reply_tx) => {
                reply_tx.send(self.transcript.clone()).ok();
            }
            Command::ExchangeFinished {
                exchange_id,
                result,
            } => self.finish_exchange(exchange_id, result),
        }
    }

    /// Aborts the running exchange without resolving its placeholder.
    pub fn abort_exchange(&mut self) {
        if let Stage::AwaitingReply { task, .. } = std::mem::take(&mut self.stage)
        {
            task.abort();
        }
    }

    fn submit(&mut self, input: String) -> Submission {
        if input.trim().is_empty() {
            trace!("ignoring an empty input");
            return Submission::Empty;
        }
        if matches!(self.stage, Stage::AwaitingReply { .. }) {
            debug!("an exchange is in flight, ignoring the input");
            return Submission::Busy;
        }

        self.view.clear_input();
        self.view.refresh(&self.transcript);

        self.transcript.push_user(input);
        self.view.refresh(&self.transcript);

        let pushed = self.transcript.push_placeholder();
        debug_assert!(pushed, "placeholder left over from an earlier exchange");
        self.view.refresh(&self.transcript);

        self.start_exchange();
        Submission::Accepted
    }

    fn start_exchange(&mut self) {
        let exchange_id = self.next_exchange_id;
        self.next_exchange_id += 1;

        let request = self.build_model_request();
        let model_client = self.model_client.clone();
        let reply_timeout = self.reply_timeout;
        let cmd_tx = self.cmd_tx.clone();

        debug!("starting exchange {exchange_id}");
        let task = tokio::spawn(async move {
            let result =
                match timeout(reply_timeout, model_client.send_request(request))
                    .await
                {
                    Ok(Ok(resp)) => Ok(resp.text),
                    Ok(Err(err)) => Err(ExchangeError::from(err)),
                    Err(_) => Err(ExchangeError::TimedOut(reply_timeout)),
                };

            // The controller may have stopped while we were waiting.
            let Some(cmd_tx) = cmd_tx.upgrade() else {
                return;
            };
            cmd_tx
                .send(Command::ExchangeFinished {
                    exchange_id,
                    result,
                })
                .ok();
        });
        self.stage = Stage::AwaitingReply { exchange_id, task };
    }

    fn finish_exchange(
        &mut self,
        exchange_id: u64,
        result: Result<String, ExchangeError>,
    ) {
        match &self.stage {
            Stage::AwaitingReply {
                exchange_id: current,
                ..
            } if *current == exchange_id => {}
            _ => {
                // Cancelled exchanges may still report back.
                trace!("discarding the result of exchange {exchange_id}");
                return;
            }
        }
        self.stage = Stage::Idle;

        let resolution = match result {
            Ok(reply) => Message::assistant(reply),
            Err(err) => {
                warn!("exchange {exchange_id} failed: {err}");
                err.to_message()
            }
        };
        self.resolve(resolution);
    }

    fn cancel(&mut self) {
        let Stage::AwaitingReply { exchange_id, task } =
            std::mem::take(&mut self.stage)
        else {
            trace!("nothing to cancel");
            return;
        };
        debug!("cancelling exchange {exchange_id}");
        task.abort();
        self.resolve(ExchangeError::Cancelled.to_message());
    }

    fn resolve(&mut self, resolution: Message) {
        if !self.transcript.resolve_placeholder(resolution) {
            error!("no placeholder to resolve");
        }
        self.view.refresh(&self.transcript);
        self.view.focus_input();

        if let Some(on_idle) = &self.on_idle {
            on_idle();
        }
    }

    /// Builds the request for the exchange that was just started: the system
    /// prompt, up to `history_depth` earlier messages, then the new input.
    fn build_model_request(&self) -> ModelRequest {
        let finalized: Vec<&Message> = self
            .transcript
            .iter()
            .filter(|m| !m.is_placeholder() && !m.is_error())
            .collect();
        let (current, earlier) = match finalized.split_last() {
            Some((current, earlier)) => (Some(*current), earlier),
            None => (None, &[][..]),
        };
        let skip = earlier.len().saturating_sub(self.history_depth);

        let mut messages = Vec::with_capacity(earlier.len() - skip + 2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(ModelMessage::System(prompt.clone()));
        }
        messages.extend(
            earlier[skip..]
                .iter()
                .chain(current.as_ref())
                .map(|msg| to_model_message(msg)),
        );
        ModelRequest { messages }
    }
}

#[inline]
fn to_model_message(msg: &Message) -> ModelMessage {
    match msg.sender() {
        Sender::User => ModelMessage::User(msg.text().to_owned()),
        Sender::Assistant => ModelMessage::Assistant(msg.text().to_owned()),
    }
}
