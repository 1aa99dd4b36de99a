//! Built-in hooks that can be enabled from the config file.

use rand::seq::SliceRandom;
use serde_json::Value;

use crate::hook::{HookCall, HookCallback, sync_callback};
use crate::response::{HookReply, ResponseDescriptor};

/// Names accepted by [`builtin`].
pub const BUILTIN_NAMES: [&str; 3] = ["choose", "echo", "ping"];

/// Callback and default options of a built-in hook.
///
/// Options given in the config are applied after the defaults, so they can
/// override them.
pub fn builtin(name: &str) -> Option<(HookCallback, Vec<(String, Value)>)> {
    let (callback, defaults): (HookCallback, Vec<(&str, Value)>) = match name {
        "ping" => (sync_callback(ping), vec![("in", Value::from("token"))]),
        "choose" => (
            sync_callback(choose),
            vec![("in", Value::from("token")), ("direct", Value::from(true))],
        ),
        "echo" => (sync_callback(echo), vec![("direct", Value::from(true))]),
        _ => return None,
    };
    let defaults = defaults
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    Some((callback, defaults))
}

/// `ping` → `pong`
fn ping(call: HookCall) -> anyhow::Result<HookReply> {
    let tokens = call.input.tokens();
    match tokens.first() {
        Some(first) if first.eq_ignore_ascii_case("ping") => {
            Ok(ResponseDescriptor::reply("pong").into())
        }
        _ => Ok(HookReply::Nothing),
    }
}

/// `choose tea coffee` → one of the options, picked at random.
fn choose(mut call: HookCall) -> anyhow::Result<HookReply> {
    let tokens = call.input.tokens();
    let Some((first, choices)) = tokens.split_first() else {
        return Ok(HookReply::Nothing);
    };
    if !first.eq_ignore_ascii_case("choose") {
        return Ok(HookReply::Nothing);
    }
    Ok(choices
        .choose(&mut call.rng)
        .map(|choice| ResponseDescriptor::reply(*choice))
        .into())
}

/// Repeat the addressed text back to the channel.
fn echo(call: HookCall) -> anyhow::Result<HookReply> {
    let text = call.input.text();
    if text.trim().is_empty() {
        return Ok(HookReply::Nothing);
    }
    Ok(ResponseDescriptor::msg(text).into())
}
