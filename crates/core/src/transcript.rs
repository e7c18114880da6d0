//! Messages shown in a chat session.

use std::slice;

/// Text shown while the assistant reply is pending.
pub const PLACEHOLDER_TEXT: &str = "thinking…";

/// Who wrote a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sender {
    /// The person typing into the input field.
    User,
    /// The reply source.
    Assistant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Status {
    Final,
    Placeholder,
    Error,
}

/// A single entry of a [`Transcript`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Message {
    sender: Sender,
    text: String,
    status: Status,
}

impl Message {
    /// Creates a message typed by the user.
    #[inline]
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            status: Status::Final,
        }
    }

    /// Creates an assistant reply.
    #[inline]
    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
            status: Status::Final,
        }
    }

    /// Creates the transient "thinking" entry.
    #[inline]
    pub fn placeholder() -> Self {
        Self {
            sender: Sender::Assistant,
            text: PLACEHOLDER_TEXT.to_owned(),
            status: Status::Placeholder,
        }
    }

    /// Creates an assistant-style entry reporting a failed exchange.
    #[inline]
    pub fn error<S: Into<String>>(text: S) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
            status: Status::Error,
        }
    }

    /// Returns who wrote this message.
    #[inline]
    pub fn sender(&self) -> Sender {
        self.sender
    }

    /// Returns the text of this message.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns `true` for the transient "thinking" entry.
    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.status == Status::Placeholder
    }

    /// Returns `true` if this message reports a failed exchange.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }
}

/// The ordered messages of one chat session, oldest first.
///
/// Apart from the placeholder, which is swapped for the reply once an
/// exchange resolves, messages are only ever appended. At most one
/// placeholder exists at a time.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Returns all messages in display order.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns an iterator over the messages in display order.
    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if no message has been added yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the most recent message.
    #[inline]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Returns the number of placeholder entries, which is either 0 or 1.
    pub fn placeholder_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_placeholder()).count()
    }

    pub(crate) fn push_user(&mut self, text: String) {
        self.messages.push(Message::user(text));
    }

    /// Appends the placeholder unless one is already present.
    pub(crate) fn push_placeholder(&mut self) -> bool {
        if self.messages.iter().any(Message::is_placeholder) {
            return false;
        }
        self.messages.push(Message::placeholder());
        true
    }

    /// Removes the placeholder and appends `resolution` in its place at the
    /// end of the transcript. Returns `false` if there was no placeholder.
    pub(crate) fn resolve_placeholder(&mut self, resolution: Message) -> bool {
        let Some(idx) = self.messages.iter().position(Message::is_placeholder)
        else {
            return false;
        };
        self.messages.remove(idx);
        self.messages.push(resolution);
        true
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = slice::Iter<'a, Message>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
