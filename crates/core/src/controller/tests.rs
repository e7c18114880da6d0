use std::sync::{Arc, Mutex};
use std::time::Duration;

use echo_chat_model::{ErrorKind, ModelMessage, ModelProvider, ModelRequest};
use echo_chat_simulated_model::{
    SimulatedProvider, SimulatedResponse, respond,
};
use tokio::sync::watch;
use tokio::time::timeout;

use super::{Controller, ControllerBuilder, Submission};
use crate::error::ControllerClosed;
use crate::model_client::RetryPolicy;
use crate::prompt::UserProfile;
use crate::transcript::{Message, PLACEHOLDER_TEXT, Sender, Transcript};
use crate::view::View;

#[derive(Clone, Debug, PartialEq, Eq)]
enum ViewEvent {
    ClearInput,
    Refresh(Vec<Message>),
    FocusInput,
}

#[derive(Clone, Default)]
struct RecordingView {
    events: Arc<Mutex<Vec<ViewEvent>>>,
}

impl RecordingView {
    fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl View for RecordingView {
    fn clear_input(&mut self) {
        self.events.lock().unwrap().push(ViewEvent::ClearInput);
    }

    fn refresh(&mut self, transcript: &Transcript) {
        assert!(transcript.placeholder_count() <= 1);
        self.events
            .lock()
            .unwrap()
            .push(ViewEvent::Refresh(transcript.messages().to_vec()));
    }

    fn focus_input(&mut self) {
        self.events.lock().unwrap().push(ViewEvent::FocusInput);
    }
}

/// Records every request before handing it to a [`SimulatedProvider`].
#[derive(Clone)]
struct RecordingProvider {
    inner: SimulatedProvider,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ModelProvider for RecordingProvider {
    type Error = echo_chat_simulated_model::Error;
    type Response = SimulatedResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        self.requests.lock().unwrap().push(req.clone());
        self.inner.send_request(req)
    }
}

struct Harness {
    controller: Controller,
    view: RecordingView,
    idle_rx: watch::Receiver<usize>,
}

impl Harness {
    fn new(builder: ControllerBuilder) -> Self {
        let view = RecordingView::default();
        let (idle_tx, idle_rx) = watch::channel(0usize);
        let controller = builder
            .with_view(view.clone())
            .on_idle(move || {
                idle_tx.send_modify(|count| *count += 1);
            })
            .build();
        Self {
            controller,
            view,
            idle_rx,
        }
    }

    fn simulated() -> Self {
        Self::new(ControllerBuilder::with_model_provider(
            SimulatedProvider::default(),
        ))
    }

    async fn wait_for_idle(&mut self, count: usize) {
        timeout(
            Duration::from_secs(120),
            self.idle_rx.wait_for(|c| *c >= count),
        )
        .await
        .unwrap()
        .unwrap();
    }

    async fn transcript(&self) -> Transcript {
        self.controller.transcript().await.unwrap()
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_exchange() {
    let mut harness = Harness::simulated();
    assert!(harness.transcript().await.is_empty());

    let submission = harness.controller.submit("hello").await.unwrap();
    assert_eq!(submission, Submission::Accepted);
    harness.wait_for_idle(1).await;

    let transcript = harness.transcript().await;
    assert_eq!(
        transcript.messages(),
        [Message::user("hello"), Message::assistant(respond("hello"))]
    );
    assert!(transcript.messages()[1].text().contains("hello"));
    assert_eq!(transcript.placeholder_count(), 0);

    assert_eq!(
        harness.view.events(),
        vec![
            ViewEvent::ClearInput,
            ViewEvent::Refresh(vec![]),
            ViewEvent::Refresh(vec![Message::user("hello")]),
            ViewEvent::Refresh(vec![
                Message::user("hello"),
                Message::placeholder(),
            ]),
            ViewEvent::Refresh(vec![
                Message::user("hello"),
                Message::assistant(respond("hello")),
            ]),
            ViewEvent::FocusInput,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_empty_submissions_are_ignored() {
    let harness = Harness::simulated();

    for input in ["", "   ", "\n\t "] {
        let submission = harness.controller.submit(input).await.unwrap();
        assert_eq!(submission, Submission::Empty);
    }

    assert!(harness.transcript().await.is_empty());
    assert!(harness.view.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sequential_exchanges() {
    let mut harness = Harness::simulated();

    harness.controller.submit("a").await.unwrap();
    harness.wait_for_idle(1).await;
    harness.controller.submit("b").await.unwrap();
    harness.wait_for_idle(2).await;

    let transcript = harness.transcript().await;
    assert_eq!(
        transcript.messages(),
        [
            Message::user("a"),
            Message::assistant(respond("a")),
            Message::user("b"),
            Message::assistant(respond("b")),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_submission_while_awaiting_reply() {
    let mut harness = Harness::simulated();

    let first = harness.controller.submit("first").await.unwrap();
    assert_eq!(first, Submission::Accepted);

    let in_flight = harness.transcript().await;
    assert_eq!(in_flight.placeholder_count(), 1);
    let last = in_flight.last().unwrap();
    assert!(last.is_placeholder());
    assert_eq!(last.sender(), Sender::Assistant);
    assert_eq!(last.text(), PLACEHOLDER_TEXT);
    let events_before = harness.view.events().len();

    let second = harness.controller.submit("second").await.unwrap();
    assert_eq!(second, Submission::Busy);
    assert_eq!(harness.transcript().await, in_flight);
    assert_eq!(harness.view.events().len(), events_before);

    harness.wait_for_idle(1).await;
    let transcript = harness.transcript().await;
    assert_eq!(
        transcript.messages(),
        [Message::user("first"), Message::assistant(respond("first"))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_reply_replaces_placeholder() {
    let provider = SimulatedProvider::default().fail_with(ErrorKind::Moderated, 0);
    let mut harness =
        Harness::new(ControllerBuilder::with_model_provider(provider));

    harness.controller.submit("hello").await.unwrap();
    harness.wait_for_idle(1).await;

    let transcript = harness.transcript().await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript.placeholder_count(), 0);
    let reply = &transcript.messages()[1];
    assert_eq!(reply.sender(), Sender::Assistant);
    assert!(reply.is_error());
    assert!(reply.text().starts_with("(system) Something went wrong:"));
    assert_eq!(harness.view.events().last(), Some(&ViewEvent::FocusInput));

    // The session stays usable.
    let submission = harness.controller.submit("again").await.unwrap();
    assert_eq!(submission, Submission::Accepted);
}

#[tokio::test(start_paused = true)]
async fn test_reply_timeout() {
    let provider = SimulatedProvider::with_delay(Duration::from_secs(30));
    let mut harness = Harness::new(
        ControllerBuilder::with_model_provider(provider)
            .with_reply_timeout(Duration::from_secs(2)),
    );

    harness.controller.submit("slow").await.unwrap();
    harness.wait_for_idle(1).await;

    let transcript = harness.transcript().await;
    let reply = transcript.last().unwrap();
    assert!(reply.is_error());
    assert_eq!(
        reply.text(),
        "(system) Something went wrong: no reply within 2 seconds."
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_exchange() {
    let provider = SimulatedProvider::with_delay(Duration::from_secs(30));
    let mut harness =
        Harness::new(ControllerBuilder::with_model_provider(provider));

    harness.controller.submit("never mind").await.unwrap();
    harness.controller.cancel().unwrap();
    harness.wait_for_idle(1).await;

    let transcript = harness.transcript().await;
    assert_eq!(
        transcript.messages(),
        [
            Message::user("never mind"),
            Message::error("Request cancelled.")
        ]
    );

    // Nothing arrives later for the aborted exchange.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.transcript().await, transcript);
    assert_eq!(*harness.idle_rx.borrow(), 1);

    // Cancelling while idle changes nothing.
    harness.controller.cancel().unwrap();
    assert_eq!(harness.transcript().await, transcript);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let provider = SimulatedProvider::with_delay(Duration::from_millis(100))
        .fail_with(ErrorKind::RateLimitExceeded, 2);
    let mut harness = Harness::new(
        ControllerBuilder::with_model_provider(provider).with_retry_policy(
            RetryPolicy {
                initial_interval: Duration::from_millis(1),
                max_elapsed: Duration::from_secs(5),
            },
        ),
    );

    harness.controller.submit("retry me").await.unwrap();
    harness.wait_for_idle(1).await;

    let transcript = harness.transcript().await;
    assert_eq!(
        transcript.last(),
        Some(&Message::assistant(respond("retry me")))
    );
}

#[tokio::test(start_paused = true)]
async fn test_history_window() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let provider = RecordingProvider {
        inner: SimulatedProvider::default(),
        requests: Arc::clone(&requests),
    };
    let mut harness = Harness::new(
        ControllerBuilder::with_model_provider(provider)
            .with_system_prompt("sys")
            .with_history_depth(2),
    );

    for (idx, input) in ["a", "b", "c"].into_iter().enumerate() {
        harness.controller.submit(input).await.unwrap();
        harness.wait_for_idle(idx + 1).await;
    }

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 3);
    assert_eq!(
        requests[0].messages,
        [
            ModelMessage::System("sys".to_owned()),
            ModelMessage::User("a".to_owned()),
        ]
    );
    assert_eq!(
        requests[2].messages,
        [
            ModelMessage::System("sys".to_owned()),
            ModelMessage::User("b".to_owned()),
            ModelMessage::Assistant(respond("b")),
            ModelMessage::User("c".to_owned()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_huge_history_depth() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let provider = RecordingProvider {
        inner: SimulatedProvider::default(),
        requests: Arc::clone(&requests),
    };
    let mut harness = Harness::new(
        ControllerBuilder::with_model_provider(provider)
            .with_history_depth(usize::MAX),
    );

    harness.controller.submit("hello").await.unwrap();
    harness.wait_for_idle(1).await;
    harness.controller.submit("again").await.unwrap();
    harness.wait_for_idle(2).await;

    assert_eq!(
        harness.transcript().await.last(),
        Some(&Message::assistant(respond("again")))
    );
    let requests = requests.lock().unwrap();
    assert_eq!(requests[1].messages.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_system_prompt_includes_rules_and_profile() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let provider = RecordingProvider {
        inner: SimulatedProvider::default(),
        requests: Arc::clone(&requests),
    };
    let mut harness = Harness::new(
        ControllerBuilder::with_model_provider(provider)
            .with_system_prompt("sys")
            .with_chat_rules(["Be kind.", "Stay short."])
            .with_user_profile(UserProfile::new("Ada", "Writes compilers.")),
    );

    harness.controller.submit("hi").await.unwrap();
    harness.wait_for_idle(1).await;

    let requests = requests.lock().unwrap();
    let [ModelMessage::System(prompt), ModelMessage::User(input)] =
        &requests[0].messages[..]
    else {
        panic!("unexpected request: {:?}", requests[0]);
    };
    assert_eq!(input, "hi");
    assert!(prompt.starts_with("sys\n\nChat rules\n"), "{prompt}");
    assert!(prompt.contains("1. Be kind.\n2. Stay short.\n"), "{prompt}");
    assert!(prompt.contains("You are talking to: Ada\n"), "{prompt}");
    assert!(prompt.contains("Description: Writes compilers.\n"), "{prompt}");
}

#[tokio::test(start_paused = true)]
async fn test_error_indicators_are_not_sent_as_history() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let provider = RecordingProvider {
        inner: SimulatedProvider::default()
            .fail_with(ErrorKind::Moderated, 1),
        requests: Arc::clone(&requests),
    };
    let mut harness =
        Harness::new(ControllerBuilder::with_model_provider(provider));

    harness.controller.submit("one").await.unwrap();
    harness.wait_for_idle(1).await;
    harness.controller.submit("two").await.unwrap();
    harness.wait_for_idle(2).await;

    let requests = requests.lock().unwrap();
    assert_eq!(
        requests[1].messages,
        [
            ModelMessage::User("one".to_owned()),
            ModelMessage::User("two".to_owned()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown() {
    let harness = Harness::simulated();
    harness.controller.shutdown();

    assert_eq!(
        harness.controller.submit("hello").await,
        Err(ControllerClosed)
    );
    assert_eq!(harness.controller.transcript().await, Err(ControllerClosed));
}
