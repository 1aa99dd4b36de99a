//! Hook task fan-out and deadline-bounded collection.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use hookbot_types::OutboundCommand;

use crate::hook::{Hook, HookCall};
use crate::resolve::Applicable;
use crate::response::resolve_reply;

/// Result reported by one hook task.
#[derive(Debug)]
pub struct TaskReport {
    pub task_ref: Uuid,
    pub commands: Vec<OutboundCommand>,
}

/// A hook task in flight for the current message.
pub struct DispatchTask {
    pub hook: Arc<Hook>,
    handle: JoinHandle<()>,
}

impl DispatchTask {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Commands a hook produced for one message.
pub type Collected = (Arc<Hook>, Vec<OutboundCommand>);

/// Start a hook's callback on its own task.
///
/// The task always reports back, with no commands if the callback failed or
/// panicked. Reports sent after the collector gave up are dropped.
pub fn spawn_task(
    hook: Arc<Hook>,
    sender: String,
    applicable: Applicable,
    results: mpsc::UnboundedSender<TaskReport>,
) -> (Uuid, DispatchTask) {
    let task_ref = Uuid::new_v4();
    let task_hook = hook.clone();

    let handle = tokio::spawn(async move {
        let Applicable { input, target } = applicable;
        let call = HookCall {
            sender: sender.clone(),
            input,
            rng: StdRng::from_entropy(),
        };

        let callback = task_hook.callback.clone();
        let outcome = AssertUnwindSafe(async move { callback(call).await })
            .catch_unwind()
            .await;

        let commands = match outcome {
            Ok(Ok(reply)) => resolve_reply(reply, &target, &sender),
            Ok(Err(e)) => {
                warn!(hook_id = %task_hook.id, %task_ref, "Hook failed: {e:#}");
                Vec::new()
            }
            Err(panic) => {
                warn!(
                    hook_id = %task_hook.id,
                    %task_ref,
                    "Hook panicked: {}",
                    panic_message(panic.as_ref())
                );
                Vec::new()
            }
        };

        if results.send(TaskReport { task_ref, commands }).is_err() {
            debug!(hook_id = %task_hook.id, %task_ref, "Dropping late hook result");
        }
    });

    (task_ref, DispatchTask { hook, handle })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

/// Wait for task reports until every task has reported or `budget` is spent.
///
/// The budget is shared: time spent waiting for one report is subtracted
/// before waiting for the next. Tasks still running afterwards are abandoned,
/// not cancelled. Hooks that produced no commands are left out, and the
/// result lists the last completed hook first.
pub async fn collect(
    mut pending: HashMap<Uuid, DispatchTask>,
    results: &mut mpsc::UnboundedReceiver<TaskReport>,
    budget: Duration,
) -> Vec<Collected> {
    let mut remaining = budget;
    let mut collected = Vec::new();

    while !pending.is_empty() && !remaining.is_zero() {
        let started = Instant::now();
        match tokio::time::timeout(remaining, results.recv()).await {
            Ok(Some(report)) => {
                remaining = remaining.saturating_sub(started.elapsed());
                let Some(task) = pending.remove(&report.task_ref) else {
                    debug!(task_ref = %report.task_ref, "Ignoring result of unknown task");
                    continue;
                };
                if !report.commands.is_empty() {
                    collected.push((task.hook, report.commands));
                }
            }
            Ok(None) => break,
            Err(_) => remaining = Duration::ZERO,
        }
    }

    for (task_ref, task) in pending {
        warn!(
            hook_id = %task.hook.id,
            %task_ref,
            finished = task.is_finished(),
            budget_ms = budget.as_millis() as u64,
            "Abandoning hook task past deadline"
        );
    }

    collected.reverse();
    collected
}
