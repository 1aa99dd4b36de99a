//! Registering built-in hooks from the config file.

use std::collections::BTreeMap;

use anyhow::{Context, bail};
use serde_json::{Map, Value};

use hookbot_hooks::HookManager;
use hookbot_hooks::builtin::{BUILTIN_NAMES, builtin};

/// Register every hook named in the config. Stops at the first failure.
pub async fn register_configured_hooks(
    manager: &HookManager,
    hooks: &BTreeMap<String, Map<String, Value>>,
) -> anyhow::Result<Vec<String>> {
    for (name, overrides) in hooks {
        let Some((callback, mut options)) = builtin(name) else {
            bail!(
                "unknown hook {name:?} (available: {})",
                BUILTIN_NAMES.join(", ")
            );
        };
        options.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        manager
            .add_hook(name.as_str(), callback, options)
            .await
            .with_context(|| format!("failed to register hook {name:?}"))?;
    }
    Ok(manager.hook_ids().await?)
}
