//! Hook registry: callbacks per application and extension point, in registration order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::callback::Callback;
use super::definitions::CallbackKind;

/// A callback together with the plugin that registered it.
#[derive(Clone)]
pub struct RegisteredCallback {
    /// Plugin that owns the callback.
    pub plugin_id: String,
    /// The callback.
    pub callback: Arc<dyn Callback>,
}

impl fmt::Debug for RegisteredCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredCallback")
            .field("plugin_id", &self.plugin_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SlotKey {
    app_id: String,
    point: String,
}

impl SlotKey {
    fn new(app_id: &str, point: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            point: point.to_string(),
        }
    }
}

/// Ordered callback lists for one callback kind.
#[derive(Debug, Default)]
struct CallbackTable {
    slots: DashMap<SlotKey, Vec<RegisteredCallback>>,
}

impl CallbackTable {
    fn push(&self, key: SlotKey, entry: RegisteredCallback) {
        self.slots.entry(key).or_default().push(entry);
    }

    fn remove_plugin(&self, app_id: &str, plugin_id: &str) -> usize {
        let mut removed = 0;
        self.slots.retain(|key, entries| {
            if key.app_id == app_id {
                let before = entries.len();
                entries.retain(|e| e.plugin_id != plugin_id);
                removed += before - entries.len();
            }
            !entries.is_empty()
        });
        removed
    }

    fn snapshot(&self, key: &SlotKey) -> Vec<RegisteredCallback> {
        self.slots
            .get(key)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    fn owners_by_point(&self, app_id: &str) -> BTreeMap<String, Vec<String>> {
        self.slots
            .iter()
            .filter(|slot| slot.key().app_id == app_id)
            .map(|slot| {
                let owners = slot.value().iter().map(|e| e.plugin_id.clone()).collect();
                (slot.key().point.clone(), owners)
            })
            .collect()
    }

    fn contains_plugin(&self, app_id: &str, plugin_id: &str) -> bool {
        self.slots.iter().any(|slot| {
            slot.key().app_id == app_id && slot.value().iter().any(|e| e.plugin_id == plugin_id)
        })
    }
}

/// Extension point → plugin ids, per callback kind, for one application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySummary {
    /// Action points and their owners in execution order.
    pub actions: BTreeMap<String, Vec<String>>,
    /// Filter points and their owners in execution order.
    pub filters: BTreeMap<String, Vec<String>>,
}

/// Registry of action and filter callbacks.
///
/// Scoped per application: a plugin active in one application never
/// receives dispatches issued for another. Within a point, callbacks run
/// in registration order.
#[derive(Debug, Default)]
pub struct HookRegistry {
    actions: CallbackTable,
    filters: CallbackTable,
}

impl HookRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: CallbackKind) -> &CallbackTable {
        match kind {
            CallbackKind::Action => &self.actions,
            CallbackKind::Filter => &self.filters,
        }
    }

    /// Appends a callback to the end of the list for `(app_id, point)`.
    pub fn register(
        &self,
        kind: CallbackKind,
        app_id: &str,
        point: &str,
        plugin_id: &str,
        callback: Arc<dyn Callback>,
    ) {
        self.table(kind).push(
            SlotKey::new(app_id, point),
            RegisteredCallback {
                plugin_id: plugin_id.to_string(),
                callback,
            },
        );

        debug!(
            kind = %kind,
            app_id = %app_id,
            point = %point,
            plugin_id = %plugin_id,
            "Callback registered"
        );
    }

    /// Removes every action and filter the plugin registered in `app_id`.
    ///
    /// Returns the number of callbacks removed.
    pub fn unregister(&self, app_id: &str, plugin_id: &str) -> usize {
        let removed = self.actions.remove_plugin(app_id, plugin_id)
            + self.filters.remove_plugin(app_id, plugin_id);

        info!(
            app_id = %app_id,
            plugin_id = %plugin_id,
            removed = removed,
            "Callbacks unregistered for plugin"
        );
        removed
    }

    /// Returns a snapshot of the callbacks for a point, in execution order.
    ///
    /// The snapshot is detached from the registry, so registrations that
    /// happen while a dispatch is running do not affect it.
    pub fn list(&self, kind: CallbackKind, app_id: &str, point: &str) -> Vec<RegisteredCallback> {
        self.table(kind).snapshot(&SlotKey::new(app_id, point))
    }

    /// Returns the plugin ids registered at a point, in execution order.
    pub fn owners(&self, kind: CallbackKind, app_id: &str, point: &str) -> Vec<String> {
        self.list(kind, app_id, point)
            .into_iter()
            .map(|e| e.plugin_id)
            .collect()
    }

    /// Returns whether any callbacks are registered at a point.
    pub fn has_callbacks(&self, kind: CallbackKind, app_id: &str, point: &str) -> bool {
        self.table(kind)
            .slots
            .get(&SlotKey::new(app_id, point))
            .is_some_and(|entries| !entries.is_empty())
    }

    /// Returns whether the plugin has any callback registered in `app_id`.
    pub fn contains_plugin(&self, app_id: &str, plugin_id: &str) -> bool {
        self.actions.contains_plugin(app_id, plugin_id)
            || self.filters.contains_plugin(app_id, plugin_id)
    }

    /// Summarizes the registered points for an application.
    pub fn summary(&self, app_id: &str) -> RegistrySummary {
        RegistrySummary {
            actions: self.actions.owners_by_point(app_id),
            filters: self.filters.owners_by_point(app_id),
        }
    }
}
