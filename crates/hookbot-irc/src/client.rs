//! IRC client loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hookbot_config::IrcConfig;
use hookbot_hooks::{Connection, HookManager};

use crate::protocol::{IrcMessage, parse_line};

const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound side of an IRC connection.
///
/// Lines are queued to a writer task, so `send` never waits on the socket.
pub struct IrcConnection {
    nickname: String,
    writer: mpsc::UnboundedSender<String>,
}

impl IrcConnection {
    pub fn new(nickname: impl Into<String>, writer: mpsc::UnboundedSender<String>) -> Self {
        Self {
            nickname: nickname.into(),
            writer,
        }
    }
}

#[async_trait::async_trait]
impl Connection for IrcConnection {
    fn nickname(&self) -> &str {
        &self.nickname
    }

    async fn send(&self, command: &str, payload: &str) -> anyhow::Result<()> {
        self.writer
            .send(format!("{command} {payload}"))
            .context("IRC writer closed")
    }
}

/// Connect to the configured server and run until the server closes the
/// connection or `cancel` fires. There is no reconnect.
pub async fn run_client(
    config: IrcConfig,
    manager: HookManager,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    info!(%addr, nickname = %config.nickname, "Connected to IRC server");

    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_cancel = CancellationToken::new();
    let mut writer = tokio::spawn(run_writer(write_half, rx, writer_cancel.clone()));

    let connection = Arc::new(IrcConnection::new(config.nickname.clone(), tx));
    connection.send("NICK", &config.nickname).await?;
    connection
        .send(
            "USER",
            &format!("{} 0 * :{}", config.username, config.realname),
        )
        .await?;

    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();
    let result = loop {
        buf.clear();
        let read = tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => {
                info!(%addr, "IRC server closed the connection");
                break Ok(());
            }
            Ok(_) => {
                // Servers relay whatever bytes clients send; undecodable ones
                // become U+FFFD.
                let line = String::from_utf8_lossy(&buf);
                let Some(message) = parse_line(&line) else {
                    continue;
                };
                if let Err(e) = handle_message(&message, &config, &manager, &connection).await {
                    break Err(e);
                }
            }
            Err(e) => break Err(e).context("failed to read from IRC server"),
        }
    };

    if cancel.is_cancelled() {
        let _ = connection.send("QUIT", ":shutting down").await;
    }

    // Queued lines drain unless a dispatch still holds the connection.
    drop(connection);
    match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("IRC writer task failed: {e}"),
        Err(_) => writer_cancel.cancel(),
    }

    result
}

async fn handle_message(
    message: &IrcMessage,
    config: &IrcConfig,
    manager: &HookManager,
    connection: &Arc<IrcConnection>,
) -> anyhow::Result<()> {
    match message.command.as_str() {
        "PING" => {
            let token = message.params.first().map(String::as_str).unwrap_or("");
            connection.send("PONG", &format!(":{token}")).await?;
        }
        // RPL_WELCOME: registration complete.
        "001" => {
            info!(nickname = %config.nickname, "Registered with IRC server");
            for channel in &config.channels {
                connection.send("JOIN", channel).await?;
            }
        }
        // ERR_NICKNAMEINUSE
        "433" => bail!("nickname {} is already in use", config.nickname),
        "ERROR" => {
            let reason = message.params.last().map(String::as_str).unwrap_or("");
            bail!("IRC server error: {reason}");
        }
        _ => {
            if let Some(event) = message.to_event() {
                debug!(kind = event.kind(), "Dispatching IRC event");
                manager.dispatch(event, connection.clone());
            }
        }
    }
    Ok(())
}

async fn run_writer(
    mut write_half: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = rx.recv() => line,
        };
        let Some(line) = line else {
            break;
        };

        debug!(%line, "IRC >>");
        let framed = format!("{line}\r\n");
        if let Err(e) = write_half.write_all(framed.as_bytes()).await {
            warn!("Failed to write to IRC server: {e}");
            break;
        }
    }
}
