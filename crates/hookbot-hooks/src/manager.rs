//! Hook manager: a single task that owns the hook catalog and dispatches
//! inbound messages to matching hooks.
//!
//! Registration calls and dispatches are queued and handled one at a time,
//! in arrival order. While a message's hook tasks are being collected the
//! manager waits; anything queued in the meantime is handled afterwards.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use hookbot_types::{Event, InboundMessage, OutboundCommand};

use crate::connection::Connection;
use crate::error::HookError;
use crate::hook::{Hook, HookCallback, HookOptions};
use crate::registry::HookRegistry;
use crate::resolve::applicability;
use crate::runner::{Collected, collect, spawn_task};

enum ManagerCommand {
    AddHook {
        id: String,
        callback: HookCallback,
        options: Vec<(String, Value)>,
        reply: oneshot::Sender<Result<(), HookError>>,
    },
    RemoveHook {
        id: String,
        reply: oneshot::Sender<Result<(), HookError>>,
    },
    ListHooks {
        reply: oneshot::Sender<Vec<String>>,
    },
    Dispatch {
        event: Event,
        connection: Arc<dyn Connection>,
    },
}

/// Handle to the hook manager task. Cheap to clone; the task stops once
/// every handle is dropped.
#[derive(Clone)]
pub struct HookManager {
    tx: mpsc::UnboundedSender<ManagerCommand>,
}

impl HookManager {
    /// Spawn the manager. Its catalog starts from `registry.get_all()`.
    pub fn start(registry: Arc<dyn HookRegistry>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = ManagerActor {
            registry,
            catalog: BTreeMap::new(),
        };
        tokio::spawn(actor.run(rx));
        Self { tx }
    }

    /// Register a hook with raw `(name, value)` options.
    pub async fn add_hook<I, K>(
        &self,
        id: impl Into<String>,
        callback: HookCallback,
        options: I,
    ) -> Result<(), HookError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let (reply, rx) = oneshot::channel();
        self.call(
            ManagerCommand::AddHook {
                id: id.into(),
                callback,
                options: options.into_iter().map(|(k, v)| (k.into(), v)).collect(),
                reply,
            },
            rx,
        )
        .await?
    }

    /// Unregister a hook.
    pub async fn remove_hook(&self, id: impl Into<String>) -> Result<(), HookError> {
        let (reply, rx) = oneshot::channel();
        self.call(
            ManagerCommand::RemoveHook {
                id: id.into(),
                reply,
            },
            rx,
        )
        .await?
    }

    /// Ids of all hooks in the catalog, sorted.
    ///
    /// Answered after everything queued before it, including dispatches.
    pub async fn hook_ids(&self) -> Result<Vec<String>, HookError> {
        let (reply, rx) = oneshot::channel();
        self.call(ManagerCommand::ListHooks { reply }, rx).await
    }

    /// Queue an event for dispatch and return immediately.
    pub fn dispatch(&self, event: Event, connection: Arc<dyn Connection>) {
        if self
            .tx
            .send(ManagerCommand::Dispatch { event, connection })
            .is_err()
        {
            warn!("Hook manager stopped, dropping event");
        }
    }

    async fn call<T>(
        &self,
        command: ManagerCommand,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, HookError> {
        self.tx
            .send(command)
            .map_err(|_| HookError::ManagerStopped)?;
        rx.await.map_err(|_| HookError::ManagerStopped)
    }
}

struct ManagerActor {
    registry: Arc<dyn HookRegistry>,
    catalog: BTreeMap<String, Arc<Hook>>,
}

impl ManagerActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ManagerCommand>) {
        self.catalog = self
            .registry
            .get_all()
            .await
            .into_iter()
            .map(|hook| (hook.id.clone(), hook))
            .collect();
        info!(hooks = self.catalog.len(), "Hook manager started");

        while let Some(command) = rx.recv().await {
            match command {
                ManagerCommand::AddHook {
                    id,
                    callback,
                    options,
                    reply,
                } => {
                    let _ = reply.send(self.add_hook(id, callback, options).await);
                }
                ManagerCommand::RemoveHook { id, reply } => {
                    let _ = reply.send(self.remove_hook(&id).await);
                }
                ManagerCommand::ListHooks { reply } => {
                    let _ = reply.send(self.catalog.keys().cloned().collect());
                }
                ManagerCommand::Dispatch { event, connection } => {
                    self.dispatch(event, connection).await;
                }
            }
        }

        info!("Hook manager stopped");
    }

    async fn add_hook(
        &mut self,
        id: String,
        callback: HookCallback,
        options: Vec<(String, Value)>,
    ) -> Result<(), HookError> {
        let options = HookOptions::parse(options)?;
        if self.catalog.contains_key(&id) {
            return Err(HookError::DuplicateId(id));
        }

        let hook = Arc::new(Hook::new(id.clone(), callback, options));
        if self.registry.put(&id, hook.clone()).await.is_err() {
            return Err(HookError::DuplicateId(id));
        }

        info!(hook_id = %id, options = ?hook.options, "Hook registered");
        self.catalog.insert(id, hook);
        Ok(())
    }

    async fn remove_hook(&mut self, id: &str) -> Result<(), HookError> {
        if self.catalog.remove(id).is_none() {
            return Err(HookError::NotFound(id.to_string()));
        }
        self.registry.delete(id).await;
        info!(hook_id = %id, "Hook removed");
        Ok(())
    }

    async fn dispatch(&self, event: Event, connection: Arc<dyn Connection>) {
        let Some(message) = InboundMessage::from_event(&event) else {
            debug!(kind = event.kind(), "No hooks for event kind");
            return;
        };
        if self.catalog.is_empty() {
            return;
        }

        let collected = self.run_hooks(&message, connection.nickname()).await;
        for command in merge(collected) {
            if let Err(e) = connection.send(command.command.as_str(), &command.payload).await {
                warn!(channel = %message.channel, "Failed to send hook response: {e:#}");
            }
        }
        debug!(
            channel = %message.channel,
            latency_ms = message.age().num_milliseconds(),
            "Message handled"
        );
    }

    /// Start every applicable hook and collect their output.
    async fn run_hooks(&self, message: &InboundMessage, nickname: &str) -> Vec<Collected> {
        // The catalog cannot change while this dispatch is running.
        let snapshot: Vec<Arc<Hook>> = self.catalog.values().cloned().collect();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pending = HashMap::new();
        let mut budget = Duration::ZERO;

        for hook in snapshot {
            let Some(applicable) = applicability(&hook.options, message, nickname) else {
                continue;
            };
            budget = budget.max(hook.options.task_timeout);
            let (task_ref, task) =
                spawn_task(hook, message.sender.clone(), applicable, tx.clone());
            pending.insert(task_ref, task);
        }
        drop(tx);

        if pending.is_empty() {
            return Vec::new();
        }

        debug!(
            channel = %message.channel,
            sender = %message.sender,
            tasks = pending.len(),
            budget_ms = budget.as_millis() as u64,
            "Dispatching message to hooks"
        );
        let collected = collect(pending, &mut rx, budget).await;
        debug!(
            channel = %message.channel,
            responded = collected.len(),
            "Hook dispatch finished"
        );
        collected
    }
}

/// Apply exclusive-hook suppression: an exclusive hook's commands survive
/// only when it is the sole hook that produced any output.
fn merge(collected: Vec<Collected>) -> Vec<OutboundCommand> {
    let total = collected.len();
    collected
        .into_iter()
        .filter(|(hook, _)| {
            let keep = !hook.options.exclusive || total == 1;
            if !keep {
                debug!(hook_id = %hook.id, "Suppressing exclusive hook output");
            }
            keep
        })
        .flat_map(|(_, commands)| commands)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::{HookCall, callback, sync_callback};
    use crate::registry::MemoryRegistry;
    use crate::response::{HookReply, ResponseDescriptor};
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::time::Instant;

    const NICK: &str = "marvin";

    /// A mock connection recording everything sent through it.
    struct RecordingConnection {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingConnection {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Connection for RecordingConnection {
        fn nickname(&self) -> &str {
            NICK
        }

        async fn send(&self, command: &str, payload: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(format!("{command} {payload}"));
            Ok(())
        }
    }

    fn privmsg(channel: &str, text: &str) -> Event {
        Event::Privmsg {
            channel: channel.into(),
            sender: "alice".into(),
            text: text.into(),
        }
    }

    fn replying(text: &'static str) -> HookCallback {
        sync_callback(move |_| Ok(ResponseDescriptor::reply(text).into()))
    }

    fn no_options() -> Vec<(&'static str, Value)> {
        Vec::new()
    }

    /// Dispatch and wait until the manager has handled the event.
    async fn dispatch(
        manager: &HookManager,
        conn: &Arc<RecordingConnection>,
        event: Event,
    ) -> Vec<String> {
        manager.dispatch(event, conn.clone());
        manager.hook_ids().await.unwrap();
        conn.sent()
    }

    #[tokio::test]
    async fn test_channel_filter() {
        let manager = HookManager::start(Arc::new(MemoryRegistry::new()));
        manager
            .add_hook("foo-only", replying("hi"), [("channel", json!("foo"))])
            .await
            .unwrap();

        let conn = RecordingConnection::new();
        assert!(dispatch(&manager, &conn, privmsg("#bar", "hello")).await.is_empty());
        assert_eq!(
            dispatch(&manager, &conn, privmsg("#foo", "hello")).await,
            vec!["PRIVMSG #foo :alice: hi"]
        );
    }

    #[tokio::test]
    async fn test_direct_hook_receives_stripped_text() {
        let manager = HookManager::start(Arc::new(MemoryRegistry::new()));
        let echo = sync_callback(|call: HookCall| {
            Ok(ResponseDescriptor::msg(format!("got [{}]", call.input.text())).into())
        });
        manager
            .add_hook("echo", echo, [("direct", json!(true))])
            .await
            .unwrap();

        let conn = RecordingConnection::new();
        assert!(dispatch(&manager, &conn, privmsg("#rust", "echo this")).await.is_empty());
        assert_eq!(
            dispatch(&manager, &conn, privmsg("#rust", "marvin: echo this")).await,
            vec!["PRIVMSG #rust :got [echo this]"]
        );
    }

    #[tokio::test]
    async fn test_exclusive_suppressed_when_others_respond() {
        let manager = HookManager::start(Arc::new(MemoryRegistry::new()));
        manager
            .add_hook("a", replying("from a"), [("exclusive", json!(true))])
            .await
            .unwrap();
        manager
            .add_hook("b", replying("from b"), [("channel", json!("both"))])
            .await
            .unwrap();

        let conn = RecordingConnection::new();
        assert_eq!(
            dispatch(&manager, &conn, privmsg("#both", "hi")).await,
            vec!["PRIVMSG #both :alice: from b"]
        );

        let conn = RecordingConnection::new();
        assert_eq!(
            dispatch(&manager, &conn, privmsg("#other", "hi")).await,
            vec!["PRIVMSG #other :alice: from a"]
        );
    }

    #[tokio::test]
    async fn test_exclusive_counts_only_hooks_with_output() {
        let manager = HookManager::start(Arc::new(MemoryRegistry::new()));
        manager
            .add_hook("a", replying("from a"), [("exclusive", json!(true))])
            .await
            .unwrap();
        manager
            .add_hook("quiet", sync_callback(|_| Ok(HookReply::Nothing)), no_options())
            .await
            .unwrap();

        let conn = RecordingConnection::new();
        assert_eq!(
            dispatch(&manager, &conn, privmsg("#rust", "hi")).await,
            vec!["PRIVMSG #rust :alice: from a"]
        );
    }

    #[tokio::test]
    async fn test_two_exclusive_hooks_suppress_each_other() {
        let manager = HookManager::start(Arc::new(MemoryRegistry::new()));
        for id in ["a", "b"] {
            manager
                .add_hook(id, replying("x"), [("exclusive", json!(true))])
                .await
                .unwrap();
        }

        let conn = RecordingConnection::new();
        assert!(dispatch(&manager, &conn, privmsg("#rust", "hi")).await.is_empty());
    }

    #[tokio::test]
    async fn test_private_conversation() {
        let manager = HookManager::start(Arc::new(MemoryRegistry::new()));
        manager
            .add_hook("any", replying("hello\nagain"), no_options())
            .await
            .unwrap();
        manager
            .add_hook("public", replying("public"), [("public_only", json!(true))])
            .await
            .unwrap();

        let conn = RecordingConnection::new();
        assert_eq!(
            dispatch(&manager, &conn, privmsg(NICK, "hi")).await,
            vec!["PRIVMSG alice :hello", "PRIVMSG alice :again"]
        );
    }

    #[tokio::test]
    async fn test_multiline_reply() {
        let manager = HookManager::start(Arc::new(MemoryRegistry::new()));
        manager
            .add_hook("lines", replying("line1\nline2"), no_options())
            .await
            .unwrap();

        let conn = RecordingConnection::new();
        assert_eq!(
            dispatch(&manager, &conn, privmsg("#rust", "hi")).await,
            vec!["PRIVMSG #rust :alice: line1", "PRIVMSG #rust :line2"]
        );
    }

    #[tokio::test]
    async fn test_duplicate_and_not_found() {
        let manager = HookManager::start(Arc::new(MemoryRegistry::new()));
        manager
            .add_hook("dup", replying("first"), no_options())
            .await
            .unwrap();
        let err = manager
            .add_hook("dup", replying("second"), no_options())
            .await
            .unwrap_err();
        assert_eq!(err, HookError::DuplicateId("dup".into()));

        let err = manager.remove_hook("missing").await.unwrap_err();
        assert_eq!(err, HookError::NotFound("missing".into()));
        assert_eq!(manager.hook_ids().await.unwrap(), vec!["dup"]);

        let conn = RecordingConnection::new();
        assert_eq!(
            dispatch(&manager, &conn, privmsg("#rust", "hi")).await,
            vec!["PRIVMSG #rust :alice: first"]
        );

        manager.remove_hook("dup").await.unwrap();
        assert!(manager.hook_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_option_leaves_catalog_unchanged() {
        let registry = Arc::new(MemoryRegistry::new());
        let manager = HookManager::start(registry.clone());
        let err = manager
            .add_hook(
                "bad",
                replying("x"),
                [("direct", json!(true)), ("colour", json!("red"))],
            )
            .await
            .unwrap_err();
        assert_eq!(err, HookError::BadOption("colour".into()));
        assert!(manager.hook_ids().await.unwrap().is_empty());
        assert!(registry.get_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_catalog_loaded_from_registry() {
        let registry = Arc::new(MemoryRegistry::new());
        registry
            .put(
                "stored",
                Arc::new(Hook::new("stored", replying("x"), HookOptions::default())),
            )
            .await
            .unwrap();

        let manager = HookManager::start(registry.clone());
        assert_eq!(manager.hook_ids().await.unwrap(), vec!["stored"]);

        manager.remove_hook("stored").await.unwrap();
        assert!(registry.get_all().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_slow_hook() {
        let manager = HookManager::start(Arc::new(MemoryRegistry::new()));
        let slow = callback(|_| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            anyhow::Ok(HookReply::from(ResponseDescriptor::msg("too late")))
        });
        manager
            .add_hook("slow", slow, [("task_timeout", json!(500))])
            .await
            .unwrap();

        let conn = RecordingConnection::new();
        let start = Instant::now();
        assert!(dispatch(&manager, &conn, privmsg("#rust", "hi")).await.is_empty());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(600), "{elapsed:?}");

        // The abandoned result must not leak into the next dispatch.
        manager.remove_hook("slow").await.unwrap();
        manager
            .add_hook("fast", replying("fast"), no_options())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        let conn = RecordingConnection::new();
        assert_eq!(
            dispatch(&manager, &conn, privmsg("#rust", "hi")).await,
            vec!["PRIVMSG #rust :alice: fast"]
        );
    }

    #[tokio::test]
    async fn test_crashing_hook_behaves_like_nil() {
        let manager = HookManager::start(Arc::new(MemoryRegistry::new()));
        manager
            .add_hook("crash", sync_callback(|_| panic!("hook bug")), no_options())
            .await
            .unwrap();
        manager
            .add_hook("ok", replying("still here"), no_options())
            .await
            .unwrap();

        let conn = RecordingConnection::new();
        assert_eq!(
            dispatch(&manager, &conn, privmsg("#rust", "hi")).await,
            vec!["PRIVMSG #rust :alice: still here"]
        );
        // The manager keeps serving after the crash.
        assert_eq!(manager.hook_ids().await.unwrap(), vec!["crash", "ok"]);
    }

    #[tokio::test]
    async fn test_non_privmsg_events_ignored() {
        let manager = HookManager::start(Arc::new(MemoryRegistry::new()));
        manager
            .add_hook("any", replying("x"), no_options())
            .await
            .unwrap();

        let conn = RecordingConnection::new();
        let events = [
            Event::Join {
                channel: "#rust".into(),
                nick: "bob".into(),
            },
            Event::Part {
                channel: "#rust".into(),
                nick: "bob".into(),
                reason: None,
            },
            Event::Topic {
                channel: "#rust".into(),
                nick: "bob".into(),
                topic: "new".into(),
            },
        ];
        for event in events {
            assert!(dispatch(&manager, &conn, event).await.is_empty());
        }
    }

    #[test]
    fn test_merge_single_exclusive_kept() {
        let hook = Arc::new(Hook::new(
            "solo",
            replying("x"),
            HookOptions {
                exclusive: true,
                ..Default::default()
            },
        ));
        let commands = merge(vec![(hook, vec![OutboundCommand::privmsg("#rust :x")])]);
        assert_eq!(commands, vec![OutboundCommand::privmsg("#rust :x")]);
    }
}
