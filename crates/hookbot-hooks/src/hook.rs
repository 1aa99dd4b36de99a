//! Hook definitions and registration options.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HookError;
use crate::response::HookReply;

/// Task timeout used when a hook is registered without `task_timeout`.
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 5000;

/// Whether a hook receives the message text or its whitespace tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    Text,
    Token,
}

/// Input handed to a hook callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookInput {
    Text(String),
    Tokens(Vec<String>),
}

impl HookInput {
    /// The input as one string. Tokens are joined with single spaces.
    pub fn text(&self) -> String {
        match self {
            HookInput::Text(text) => text.clone(),
            HookInput::Tokens(tokens) => tokens.join(" "),
        }
    }

    /// The input as whitespace-separated tokens.
    pub fn tokens(&self) -> Vec<&str> {
        match self {
            HookInput::Text(text) => text.split_whitespace().collect(),
            HookInput::Tokens(tokens) => tokens.iter().map(String::as_str).collect(),
        }
    }
}

/// Everything a callback gets for one invocation.
pub struct HookCall {
    /// Nickname of the message sender.
    pub sender: String,
    pub input: HookInput,
    /// Random source seeded for this invocation only.
    pub rng: StdRng,
}

/// Future returned by a hook callback.
pub type HookFuture = Pin<Box<dyn Future<Output = anyhow::Result<HookReply>> + Send>>;

/// Async hook callback.
///
/// Callbacks run concurrently with each other and may be invoked any number
/// of times. Returning `Err` or panicking counts as "no response".
pub type HookCallback = Arc<dyn Fn(HookCall) -> HookFuture + Send + Sync>;

/// Wrap an async function as a [`HookCallback`].
pub fn callback<F, Fut>(f: F) -> HookCallback
where
    F: Fn(HookCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<HookReply>> + Send + 'static,
{
    Arc::new(move |call: HookCall| -> HookFuture { Box::pin(f(call)) })
}

/// Wrap a synchronous function as a [`HookCallback`].
///
/// The function runs on the hook's task, so it should not block for long;
/// use [`callback`] with `spawn_blocking` for heavy work.
pub fn sync_callback<F>(f: F) -> HookCallback
where
    F: Fn(HookCall) -> anyhow::Result<HookReply> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |call: HookCall| -> HookFuture {
        let f = f.clone();
        Box::pin(async move { f(call) })
    })
}

/// Validated registration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookOptions {
    /// `in`
    pub match_type: MatchType,
    /// Channel name without its sigil (`rust` matches `#rust`).
    pub channel: Option<String>,
    /// Only fire for messages addressed as `<nickname>: ...`.
    pub direct: bool,
    /// Suppress this hook's output when any other hook responded too.
    pub exclusive: bool,
    /// Never fire in private conversations.
    pub public_only: bool,
    pub task_timeout: Duration,
}

impl Default for HookOptions {
    fn default() -> Self {
        Self {
            match_type: MatchType::Text,
            channel: None,
            direct: false,
            exclusive: false,
            public_only: false,
            task_timeout: Duration::from_millis(DEFAULT_TASK_TIMEOUT_MS),
        }
    }
}

impl HookOptions {
    /// Validate raw `(name, value)` options.
    ///
    /// Options are checked in the order given; the first unknown name or
    /// ill-typed value is reported as [`HookError::BadOption`].
    pub fn parse<I, K>(options: I) -> Result<Self, HookError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut parsed = Self::default();
        for (name, value) in options {
            let name = name.into();
            if !parsed.apply(&name, &value) {
                return Err(HookError::BadOption(name));
            }
        }
        Ok(parsed)
    }

    fn apply(&mut self, name: &str, value: &Value) -> bool {
        match name {
            "in" => match value.as_str() {
                Some("text") => self.match_type = MatchType::Text,
                Some("token") => self.match_type = MatchType::Token,
                _ => return false,
            },
            "channel" => match value.as_str() {
                Some(channel) => self.channel = Some(channel.to_string()),
                None => return false,
            },
            "direct" => match value.as_bool() {
                Some(flag) => self.direct = flag,
                None => return false,
            },
            "exclusive" => match value.as_bool() {
                Some(flag) => self.exclusive = flag,
                None => return false,
            },
            "public_only" => match value.as_bool() {
                Some(flag) => self.public_only = flag,
                None => return false,
            },
            "task_timeout" => match positive_millis(value) {
                Some(ms) => self.task_timeout = Duration::from_millis(ms),
                None => return false,
            },
            _ => return false,
        }
        true
    }
}

/// Accept integers and integral floats (json5 may produce either).
fn positive_millis(value: &Value) -> Option<u64> {
    if let Some(ms) = value.as_u64() {
        return (ms > 0).then_some(ms);
    }
    let ms = value.as_f64()?;
    (ms > 0.0 && ms.fract() == 0.0 && ms <= u64::MAX as f64).then_some(ms as u64)
}

/// A registered message hook.
pub struct Hook {
    pub id: String,
    pub callback: HookCallback,
    pub options: HookOptions,
}

impl Hook {
    pub fn new(id: impl Into<String>, callback: HookCallback, options: HookOptions) -> Self {
        Self {
            id: id.into(),
            callback,
            options,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("id", &self.id)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_defaults() {
        let options = HookOptions::parse(Vec::<(String, Value)>::new()).unwrap();
        assert_eq!(options, HookOptions::default());
        assert_eq!(options.task_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_parse_all_options() {
        let options = HookOptions::parse([
            ("in", json!("token")),
            ("channel", json!("rust")),
            ("direct", json!(true)),
            ("exclusive", json!(true)),
            ("public_only", json!(true)),
            ("task_timeout", json!(250)),
        ])
        .unwrap();
        assert_eq!(options.match_type, MatchType::Token);
        assert_eq!(options.channel.as_deref(), Some("rust"));
        assert!(options.direct);
        assert!(options.exclusive);
        assert!(options.public_only);
        assert_eq!(options.task_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_parse_unknown_option() {
        let err = HookOptions::parse([("direct", json!(true)), ("colour", json!("red"))])
            .unwrap_err();
        assert_eq!(err, HookError::BadOption("colour".into()));
    }

    #[test]
    fn test_parse_bad_values() {
        for (name, value) in [
            ("in", json!("regex")),
            ("channel", json!(42)),
            ("direct", json!("yes")),
            ("public_only", json!(null)),
            ("task_timeout", json!(0)),
            ("task_timeout", json!(-5)),
            ("task_timeout", json!(1.5)),
        ] {
            let err = HookOptions::parse([(name, value)]).unwrap_err();
            assert_eq!(err, HookError::BadOption(name.into()));
        }
    }

    #[test]
    fn test_parse_reports_first_bad_option_in_order() {
        let err = HookOptions::parse([
            ("task_timeout", json!(0)),
            ("bogus", json!(true)),
        ])
        .unwrap_err();
        assert_eq!(err, HookError::BadOption("task_timeout".into()));
    }

    #[test]
    fn test_parse_integral_float_timeout() {
        let options = HookOptions::parse([("task_timeout", json!(750.0))]).unwrap();
        assert_eq!(options.task_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_input_views() {
        let text = HookInput::Text("  choose  a b ".into());
        assert_eq!(text.tokens(), vec!["choose", "a", "b"]);

        let tokens = HookInput::Tokens(vec!["a".into(), "b".into()]);
        assert_eq!(tokens.text(), "a b");
        assert_eq!(tokens.tokens(), vec!["a", "b"]);
    }
}
