//! IRC line parsing.

use hookbot_types::Event;

/// One parsed IRC protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    /// Source, e.g. `alice!~alice@example.org`.
    pub prefix: Option<String>,
    pub command: String,
    /// Middle parameters followed by the trailing one, if any.
    pub params: Vec<String>,
}

/// Parse a single line (without the trailing CRLF).
///
/// Returns `None` for empty lines or lines without a command.
pub fn parse_line(line: &str) -> Option<IrcMessage> {
    let line = line.trim_end_matches(['\r', '\n']);

    let (prefix, rest) = match line.strip_prefix(':') {
        Some(stripped) => {
            let (prefix, rest) = stripped.split_once(' ')?;
            (Some(prefix.to_string()), rest)
        }
        None => (None, line),
    };

    let (middle, trailing) = match rest.split_once(" :") {
        Some((middle, trailing)) => (middle, Some(trailing)),
        None => match rest.strip_prefix(':') {
            Some(trailing) => ("", Some(trailing)),
            None => (rest, None),
        },
    };

    let mut words = middle.split(' ').filter(|w| !w.is_empty());
    let command = words.next()?.to_ascii_uppercase();
    let mut params: Vec<String> = words.map(str::to_string).collect();
    if let Some(trailing) = trailing {
        params.push(trailing.to_string());
    }

    Some(IrcMessage {
        prefix,
        command,
        params,
    })
}

impl IrcMessage {
    /// Nickname part of the prefix (`alice!~a@host` → `alice`).
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split(['!', '@']).next().unwrap_or(prefix))
    }

    /// Convert to a dispatcher event. Commands other than `PRIVMSG`, `JOIN`,
    /// `PART` and `TOPIC` are not events.
    pub fn to_event(&self) -> Option<Event> {
        let nick = self.nick()?.to_string();
        let channel = self.params.first()?.clone();
        match self.command.as_str() {
            "PRIVMSG" => Some(Event::Privmsg {
                channel,
                sender: nick,
                text: self.params.get(1)?.clone(),
            }),
            "JOIN" => Some(Event::Join { channel, nick }),
            "PART" => Some(Event::Part {
                channel,
                nick,
                reason: self.params.get(1).cloned(),
            }),
            "TOPIC" => Some(Event::Topic {
                channel,
                nick,
                topic: self.params.get(1).cloned().unwrap_or_default(),
            }),
            _ => None,
        }
    }
}
