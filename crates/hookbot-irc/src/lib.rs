//! IRC event source and transport for hookbot.
//!
//! Connects to a server, registers, joins the configured channels and hands
//! every parsed event to the [`HookManager`](hookbot_hooks::HookManager).
//! Hook responses go back out through [`IrcConnection`].
//!
//! # Configuration
//!
//! ```json5
//! irc: {
//!     host: "irc.libera.chat",
//!     port: 6667,
//!     nickname: "marvin",
//!     channels: ["#bots"],
//! }
//! ```

pub mod client;
pub mod protocol;

pub use client::{IrcConnection, run_client};
pub use protocol::{IrcMessage, parse_line};
