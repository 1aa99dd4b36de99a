use thiserror::Error;

/// Errors returned by the hook registration API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("hook already registered: {0}")]
    DuplicateId(String),
    #[error("bad hook option: {0}")]
    BadOption(String),
    #[error("hook not found: {0}")]
    NotFound(String),
    #[error("hook manager is not running")]
    ManagerStopped,
}
