//! Conversation transcript types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who a message comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions.
    User,
    /// The model's answer.
    Assistant,
    /// Notices from the client itself (retries, failures, cancellation).
    System,
}

/// Severity of a system message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Informational notice.
    Info,
    /// Something went wrong but is being handled.
    Warning,
    /// A terminal failure.
    Error,
}

/// A single entry in the transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// The author of this message.
    pub role: Role,
    /// Message text. Grows in place while an answer is being typed.
    pub text: String,
    /// Severity, only set for system messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    /// When the message was added to the transcript.
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    /// Creates a user message.
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            kind: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates an empty assistant message to be filled while typing.
    pub fn assistant_placeholder() -> Self {
        Self {
            role: Role::Assistant,
            text: String::new(),
            kind: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a system message.
    pub fn system<S: Into<String>>(text: S, kind: MessageKind) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
            kind: Some(kind),
            timestamp: Utc::now(),
        }
    }

    /// Returns whether this is an assistant message.
    #[inline]
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// The ordered list of messages shown to the user.
///
/// Append-only, except for the trailing assistant message, which is
/// edited in place while an answer streams in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<ConversationMessage>,
}

impl Transcript {
    /// Returns all messages in order.
    #[inline]
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Returns the last message.
    #[inline]
    pub fn last(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns whether the transcript has no messages.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the text of the trailing assistant message, if the last
    /// message is one.
    pub fn assistant_tail(&self) -> Option<&str> {
        self.last()
            .filter(|msg| msg.is_assistant())
            .map(|msg| msg.text.as_str())
    }

    pub(crate) fn push(&mut self, msg: ConversationMessage) {
        self.messages.push(msg);
    }

    /// Inserts `msg` right before the trailing assistant message, or
    /// appends it if the last message is not an assistant message. Keeps
    /// the answer being typed at the end of the transcript.
    pub(crate) fn insert_before_assistant_tail(
        &mut self,
        msg: ConversationMessage,
    ) {
        match self.last() {
            Some(last) if last.is_assistant() => {
                let idx = self.messages.len() - 1;
                self.messages.insert(idx, msg);
            }
            _ => self.messages.push(msg),
        }
    }

    /// Appends a character to the trailing assistant message.
    ///
    /// Returns `false` (and changes nothing) if the last message is not
    /// an assistant message.
    pub(crate) fn append_to_assistant(&mut self, ch: char) -> bool {
        match self.messages.last_mut() {
            Some(last) if last.is_assistant() => {
                last.text.push(ch);
                true
            }
            _ => false,
        }
    }

    /// Replaces the text of the trailing assistant message.
    pub(crate) fn set_assistant_text(&mut self, text: &str) -> bool {
        match self.messages.last_mut() {
            Some(last) if last.is_assistant() => {
                text.clone_into(&mut last.text);
                true
            }
            _ => false,
        }
    }

    /// Removes the trailing assistant message if it has no text yet.
    pub(crate) fn remove_empty_assistant_tail(&mut self) -> bool {
        if self.assistant_tail() == Some("") {
            self.messages.pop();
            true
        } else {
            false
        }
    }
}

impl FromIterator<ConversationMessage> for Transcript {
    fn from_iter<I: IntoIterator<Item = ConversationMessage>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}
