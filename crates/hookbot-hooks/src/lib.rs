//! hookbot-hooks: Message hook dispatcher.
//!
//! For every inbound message the [`HookManager`] decides which registered
//! hooks apply, runs each of them as its own task under a shared deadline,
//! merges what they return and sends the resulting protocol commands back
//! through the [`Connection`].
//!
//! ```text
//! Event::Privmsg
//!     ↓ applicability (per hook)
//! spawn one task per applicable hook
//!     ↓ (task_ref, commands) via mpsc
//! collector (shared, shrinking deadline)
//!     ↓ exclusive-hook suppression
//! Connection::send
//! ```

pub mod builtin;
pub mod connection;
pub mod error;
pub mod hook;
pub mod manager;
pub mod registry;
pub mod resolve;
pub mod response;
pub mod runner;

pub use connection::Connection;
pub use error::HookError;
pub use hook::{
    DEFAULT_TASK_TIMEOUT_MS, Hook, HookCall, HookCallback, HookFuture, HookInput, HookOptions,
    MatchType,
    callback, sync_callback,
};
pub use manager::HookManager;
pub use registry::{HookRegistry, MemoryRegistry, RegistryError};
pub use response::{HookReply, ResponseDescriptor};
