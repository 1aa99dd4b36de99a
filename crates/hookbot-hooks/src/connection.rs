//! Transport capability used to send hook responses.

/// A live connection the dispatcher can send commands through.
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    /// Nickname the bot is known by on this connection.
    fn nickname(&self) -> &str;

    /// Write one protocol command, e.g. `("PRIVMSG", "#rust :hello")`.
    async fn send(&self, command: &str, payload: &str) -> anyhow::Result<()>;
}
