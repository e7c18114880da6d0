use std::pin::Pin;
use std::task::{Context, Poll};

use echo_chat_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};

use crate::Error;
use crate::proto::ChatCompletion;

/// A fully received chat completion, replayed as response events.
///
/// The request is sent with `stream: false`, so the whole reply is already
/// in memory. It is delivered as one delta followed by the completion event.
#[derive(Debug)]
pub struct OpenAIResponse {
    content: Option<String>,
    finish_reason: Option<ModelFinishReason>,
}

impl OpenAIResponse {
    pub(crate) fn from_completion(
        completion: ChatCompletion,
    ) -> Result<Self, Error> {
        let Some(choice) = completion.choices.into_iter().next() else {
            return Err(Error::new("response has no choices", ErrorKind::Other));
        };

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("content_filter") => {
                return Err(Error::new(
                    "reply was blocked by the content filter",
                    ErrorKind::Moderated,
                ));
            }
            Some("length") => ModelFinishReason::Length,
            _ => ModelFinishReason::Stop,
        };

        Ok(Self {
            content: choice.message.content.filter(|c| !c.is_empty()),
            finish_reason: Some(finish_reason),
        })
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if let Some(content) = this.content.take() {
            return Poll::Ready(Ok(Some(ModelResponseEvent::MessageDelta(
                content,
            ))));
        }
        Poll::Ready(Ok(this.finish_reason.take().map(ModelResponseEvent::Completed)))
    }
}
