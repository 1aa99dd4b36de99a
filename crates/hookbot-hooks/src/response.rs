//! Turning hook return values into addressed protocol commands.

use hookbot_types::{OutboundCommand, ResponseTarget};

/// One response produced by a hook. `text` may span multiple lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseDescriptor {
    /// Reply to the sender: the first line names them, the rest are plain.
    Reply(String),
    /// Like `Reply`, but naming an explicit recipient.
    ReplyTo(String, String),
    /// Plain message lines.
    Msg(String),
    /// Plain notice lines.
    Notice(String),
}

impl ResponseDescriptor {
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply(text.into())
    }

    pub fn reply_to(recipient: impl Into<String>, text: impl Into<String>) -> Self {
        Self::ReplyTo(recipient.into(), text.into())
    }

    pub fn msg(text: impl Into<String>) -> Self {
        Self::Msg(text.into())
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self::Notice(text.into())
    }
}

/// What a hook callback returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HookReply {
    #[default]
    Nothing,
    One(ResponseDescriptor),
    Many(Vec<ResponseDescriptor>),
}

impl From<ResponseDescriptor> for HookReply {
    fn from(descriptor: ResponseDescriptor) -> Self {
        HookReply::One(descriptor)
    }
}

impl From<Vec<ResponseDescriptor>> for HookReply {
    fn from(descriptors: Vec<ResponseDescriptor>) -> Self {
        HookReply::Many(descriptors)
    }
}

impl From<Option<ResponseDescriptor>> for HookReply {
    fn from(descriptor: Option<ResponseDescriptor>) -> Self {
        descriptor.map_or(HookReply::Nothing, HookReply::One)
    }
}

/// Resolve a hook's reply into commands, in descriptor order.
pub fn resolve_reply(
    reply: HookReply,
    target: &ResponseTarget,
    sender: &str,
) -> Vec<OutboundCommand> {
    match reply {
        HookReply::Nothing => Vec::new(),
        HookReply::One(descriptor) => resolve_descriptor(&descriptor, target, sender),
        HookReply::Many(descriptors) => descriptors
            .iter()
            .flat_map(|descriptor| resolve_descriptor(descriptor, target, sender))
            .collect(),
    }
}

fn resolve_descriptor(
    descriptor: &ResponseDescriptor,
    target: &ResponseTarget,
    sender: &str,
) -> Vec<OutboundCommand> {
    match descriptor {
        ResponseDescriptor::Reply(text) => addressed_lines(text, target, sender),
        ResponseDescriptor::ReplyTo(recipient, text) => addressed_lines(text, target, recipient),
        ResponseDescriptor::Msg(text) => split_lines(text)
            .into_iter()
            .map(|line| OutboundCommand::privmsg(plain_payload(target, line)))
            .collect(),
        ResponseDescriptor::Notice(text) => split_lines(text)
            .into_iter()
            .map(|line| OutboundCommand::notice(plain_payload(target, line)))
            .collect(),
    }
}

fn addressed_lines(text: &str, target: &ResponseTarget, recipient: &str) -> Vec<OutboundCommand> {
    split_lines(text)
        .into_iter()
        .enumerate()
        .map(|(index, line)| {
            let payload = if index == 0 {
                addressed_payload(target, recipient, line)
            } else {
                plain_payload(target, line)
            };
            OutboundCommand::privmsg(payload)
        })
        .collect()
}

// In a private conversation the partner is the only possible recipient, so
// the line is not prefixed with their name.
fn addressed_payload(target: &ResponseTarget, recipient: &str, line: &str) -> String {
    match target {
        ResponseTarget::Public(channel) => format!("{channel} :{recipient}: {line}"),
        ResponseTarget::Private(partner) => format!("{partner} :{line}"),
    }
}

fn plain_payload(target: &ResponseTarget, line: &str) -> String {
    format!("{} :{line}", target.name())
}

/// Split response text into lines.
///
/// `\n`, `\r\n` and a bare `\r` all end a line. Trailing whitespace is
/// trimmed and leading blank lines are dropped; every other line, blank or
/// not, is kept as is.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.trim_end()
        .lines()
        .flat_map(|line| line.split('\r'))
        .skip_while(|line| line.trim().is_empty())
        .collect()
}
