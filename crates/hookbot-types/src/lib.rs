use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ──────────────────── Event Types ────────────────────

/// A parsed protocol event delivered by the event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A channel or private message.
    Privmsg {
        /// Message target: a channel name (`#foo`) or the bot's own nickname.
        channel: String,
        /// Nickname of the sender.
        sender: String,
        /// Message text.
        text: String,
    },
    /// A user joined a channel.
    Join { channel: String, nick: String },
    /// A user left a channel.
    Part {
        channel: String,
        nick: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// A channel topic was changed.
    Topic {
        channel: String,
        nick: String,
        topic: String,
    },
}

impl Event {
    /// Event kind name, used for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Privmsg { .. } => "privmsg",
            Event::Join { .. } => "join",
            Event::Part { .. } => "part",
            Event::Topic { .. } => "topic",
        }
    }
}

// ──────────────────── Message Types ────────────────────

/// An inbound chat message as seen by the hook dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel the message was sent to (`#foo`), or the bot's nickname for
    /// private messages.
    pub channel: String,
    /// Nickname of the sender.
    pub sender: String,
    /// Message text.
    pub text: String,
    /// Time the message was received.
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(
        channel: impl Into<String>,
        sender: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            sender: sender.into(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }

    /// Build an inbound message from a `privmsg` event. Other events yield `None`.
    pub fn from_event(event: &Event) -> Option<Self> {
        match event {
            Event::Privmsg {
                channel,
                sender,
                text,
            } => Some(Self::new(channel.as_str(), sender.as_str(), text.as_str())),
            _ => None,
        }
    }

    /// Time elapsed since the message was received.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.received_at)
    }
}

/// Where a hook's responses are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ResponseTarget {
    /// A channel; responses go to the channel itself.
    Public(String),
    /// A private conversation with the named user.
    Private(String),
}

impl ResponseTarget {
    pub fn is_private(&self) -> bool {
        matches!(self, ResponseTarget::Private(_))
    }

    /// Channel or nickname the protocol command is addressed to.
    pub fn name(&self) -> &str {
        match self {
            ResponseTarget::Public(name) | ResponseTarget::Private(name) => name,
        }
    }
}

// ──────────────────── Outbound Types ────────────────────

/// Protocol command name of an outbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandName {
    Privmsg,
    Notice,
}

impl CommandName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandName::Privmsg => "PRIVMSG",
            CommandName::Notice => "NOTICE",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single protocol command ready for the transport.
///
/// `payload` holds everything after the command name, e.g.
/// `#rust :alice: hello`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundCommand {
    pub command: CommandName,
    pub payload: String,
}

impl OutboundCommand {
    pub fn privmsg(payload: impl Into<String>) -> Self {
        Self {
            command: CommandName::Privmsg,
            payload: payload.into(),
        }
    }

    pub fn notice(payload: impl Into<String>) -> Self {
        Self {
            command: CommandName::Notice,
            payload: payload.into(),
        }
    }
}

impl fmt::Display for OutboundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.command, self.payload)
    }
}
