//! Append-only chat history with sequence-tagged replies.
//!
//! Every user message gets a [`ReplyTicket`]. A reply is only appended if its
//! ticket is newer than the newest reply already accepted, so a slow answer to
//! an earlier message cannot land after the answer to a later one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::character::CharacterId;

const DEFAULT_ERROR_TEXT: &str = "Ошибка сети, попробуй ещё раз позже";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Character,
    Narrator,
    System,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    SkillCheck,
    Apology,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: Sender,
    #[serde(default)]
    pub kind: MessageKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl ChatMessage {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            kind: MessageKind::Text,
            text: text.into(),
            timestamp: Utc::now(),
            seq: None,
        }
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }
}

/// Handle for the reply to one user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplyTicket {
    pub seq: u64,
}

/// Text appended in place of a reply when the chat request fails.
pub fn apology_line(error: Option<&str>) -> String {
    let error = error.map(str::trim).filter(|e| !e.is_empty()).unwrap_or(DEFAULT_ERROR_TEXT);
    format!("У меня небольшие проблемы 🥺 {error}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub character_id: CharacterId,
    #[serde(default)]
    messages: Vec<ChatMessage>,
    #[serde(default)]
    next_seq: u64,
    #[serde(default)]
    newest_reply: Option<u64>,
}

impl Conversation {
    pub fn new(character_id: CharacterId) -> Self {
        Self {
            character_id,
            messages: Vec::new(),
            next_seq: 0,
            newest_reply: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn push_narration(&mut self, text: impl Into<String>) {
        self.push(ChatMessage::new(Sender::Narrator, text));
    }

    /// Appends the user's message and issues the ticket its reply must carry.
    pub fn push_user(&mut self, text: impl Into<String>) -> ReplyTicket {
        let ticket = ReplyTicket { seq: self.next_seq };
        self.next_seq += 1;
        self.push(ChatMessage::new(Sender::User, text).with_seq(ticket.seq));
        ticket
    }

    /// Returns false and drops the reply when a newer one was already accepted.
    pub fn accept_reply(&mut self, ticket: ReplyTicket, text: impl Into<String>) -> bool {
        self.accept(ticket, ChatMessage::new(Sender::Character, text))
    }

    /// Records a failed request as a soft apology from the character.
    pub fn fail_reply(&mut self, ticket: ReplyTicket, error: Option<&str>) -> bool {
        let message = ChatMessage::new(Sender::Character, apology_line(error)).with_kind(MessageKind::Apology);
        self.accept(ticket, message)
    }

    fn accept(&mut self, ticket: ReplyTicket, message: ChatMessage) -> bool {
        if self.newest_reply.is_some_and(|newest| ticket.seq <= newest) {
            tracing::warn!(
                character = %self.character_id,
                seq = ticket.seq,
                newest = ?self.newest_reply,
                "discarding stale reply"
            );
            return false;
        }
        self.newest_reply = Some(ticket.seq);
        self.push(message.with_seq(ticket.seq));
        true
    }
}
