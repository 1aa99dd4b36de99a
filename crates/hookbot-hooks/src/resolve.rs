//! Per-message, per-hook applicability checks.

use once_cell::sync::Lazy;
use regex::Regex;

use hookbot_types::{InboundMessage, ResponseTarget};

use crate::hook::{HookInput, HookOptions, MatchType};

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9\-_^]+):").unwrap());

const CHANNEL_SIGILS: [char; 4] = ['#', '&', '+', '!'];

/// Input and reply target for a hook that matched a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applicable {
    pub input: HookInput,
    pub target: ResponseTarget,
}

/// Nickname a message is addressed to (`marvin: hello` → `marvin`).
pub fn receiver(text: &str) -> Option<&str> {
    ADDRESS_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Channel name with its leading sigil removed.
pub fn strip_sigil(channel: &str) -> &str {
    channel
        .strip_prefix(|c: char| CHANNEL_SIGILS.contains(&c))
        .unwrap_or(channel)
}

/// A message sent to the bot's own nickname is a private conversation with
/// the sender; anything else is answered in the channel.
pub fn response_target(message: &InboundMessage, nickname: &str) -> ResponseTarget {
    if message.channel == nickname {
        ResponseTarget::Private(message.sender.clone())
    } else {
        ResponseTarget::Public(message.channel.clone())
    }
}

/// Decide whether a hook applies to a message, and with which input.
pub fn applicability(
    options: &HookOptions,
    message: &InboundMessage,
    nickname: &str,
) -> Option<Applicable> {
    if let Some(channel) = &options.channel {
        if channel != strip_sigil(&message.channel) {
            return None;
        }
    }

    let receiver = receiver(&message.text);
    if options.direct && receiver != Some(nickname) {
        return None;
    }

    let text = match receiver {
        Some(name) if options.direct => message.text[name.len() + 1..].trim(),
        _ => message.text.as_str(),
    };

    let input = match options.match_type {
        MatchType::Text => HookInput::Text(text.to_string()),
        MatchType::Token => {
            HookInput::Tokens(text.split_whitespace().map(str::to_string).collect())
        }
    };

    let target = response_target(message, nickname);
    if options.public_only && target.is_private() {
        return None;
    }

    Some(Applicable { input, target })
}
