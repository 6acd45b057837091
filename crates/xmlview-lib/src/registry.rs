//! Schema registry and forward-reference resolution.
//!
//! Schemas are keyed by `(group, name)`, compared case-insensitively.
//! Registration takes the write lock and lookups the read lock. Callbacks of
//! resolved lookups run after the lock is released, in registration order.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::ConfigError;
use crate::field::Target;
use crate::schema::Schema;

type Key = (String, String);

/// A callback and the schema it resolved to, fired once the lock is released.
type Ready = (OnResolved, Arc<Schema>);

/// Called once with the target schema.
pub type OnResolved = Box<dyn FnOnce(&Arc<Schema>) + Send + Sync>;

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

struct PendingLookup {
    waiting: String,
    field: String,
    on_resolved: OnResolved,
}

/// A lookup still waiting for its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRef {
    /// `group.name` of the awaited schema.
    pub target: String,
    pub waiting: String,
    pub field: String,
}

impl fmt::Display for PendingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} -> {}", self.waiting, self.field, self.target)
    }
}

#[derive(Default)]
struct State {
    schemas: IndexMap<Key, Arc<Schema>>,
    pending: IndexMap<Key, Vec<PendingLookup>>,
}

#[derive(Default)]
pub struct Registry {
    state: RwLock<State>,
}

fn key(group: &str, name: &str) -> Key {
    (group.to_lowercase(), name.to_lowercase())
}

/// Registry key of `target` as seen from a schema in `group`.
fn target_key(target: &Target, group: &str) -> Option<Key> {
    match target {
        Target::Name(name) => Some(key(group, name)),
        Target::Qualified { group, name } => Some(key(group, name)),
        Target::SelfRef | Target::Schema(_) => None,
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Register `schema`, resolve its embedded targets and fire every
    /// lookup waiting for it.
    ///
    /// Registering a key twice keeps the first schema and returns it.
    pub fn register(&self, schema: Arc<Schema>) -> Arc<Schema> {
        let mut state = self.state.write();
        let k = key(schema.group(), schema.name());
        if let Some(existing) = state.schemas.get(&k) {
            tracing::warn!(schema = %schema.key(), "schema already registered, keeping the first");
            return existing.clone();
        }
        state.schemas.insert(k.clone(), schema.clone());
        tracing::debug!(schema = %schema.key(), "registered schema");

        let mut ready: Vec<Ready> = Vec::new();

        for field in schema.fields() {
            let Some(slot) = field.target() else {
                continue;
            };
            if !slot.is_pending() {
                continue;
            }
            let owned = field.clone();
            let on_resolved: OnResolved = Box::new(move |target| {
                if let Some(slot) = owned.target() {
                    slot.resolve(target.clone());
                }
            });
            ready.extend(resolve_locked(
                &mut state,
                &schema,
                field.name(),
                &slot.target,
                on_resolved,
            ));
        }

        if let Some(waiters) = state.pending.shift_remove(&k) {
            for waiter in waiters {
                tracing::debug!(
                    target_schema = %schema.key(),
                    waiting = %waiter.waiting,
                    field = %waiter.field,
                    "resolved forward reference"
                );
                ready.push((waiter.on_resolved, schema.clone()));
            }
        }
        drop(state);

        for (on_resolved, target) in ready {
            on_resolved(&target);
        }
        schema
    }

    /// Run `on_resolved` with the schema `target` names, now if it is
    /// known, otherwise as soon as it is registered.
    pub fn resolve<F>(&self, waiting: &Arc<Schema>, field: &str, target: &Target, on_resolved: F)
    where
        F: FnOnce(&Arc<Schema>) + Send + Sync + 'static,
    {
        match target {
            Target::SelfRef => on_resolved(waiting),
            Target::Schema(schema) => on_resolved(schema),
            _ => {
                let ready =
                    resolve_locked(&mut self.state.write(), waiting, field, target, Box::new(on_resolved));
                if let Some((on_resolved, target)) = ready {
                    on_resolved(&target);
                }
            }
        }
    }

    pub fn get(&self, group: &str, name: &str) -> Option<Arc<Schema>> {
        self.state.read().schemas.get(&key(group, name)).cloned()
    }

    /// Look up `group.name`, or `name` in `default_group`.
    pub fn lookup(&self, reference: &str, default_group: &str) -> Option<Arc<Schema>> {
        match reference.split_once('.') {
            Some((group, name)) => self.get(group, name),
            None => self.get(default_group, reference),
        }
    }

    pub fn contains(&self, group: &str, name: &str) -> bool {
        self.state.read().schemas.contains_key(&key(group, name))
    }

    /// Registered schemas in registration order, optionally limited to a group.
    pub fn schemas(&self, group: Option<&str>) -> Vec<Arc<Schema>> {
        let group = group.map(str::to_lowercase);
        self.state
            .read()
            .schemas
            .iter()
            .filter(|((g, _), _)| group.as_ref().is_none_or(|want| g == want))
            .map(|(_, schema)| schema.clone())
            .collect()
    }

    pub fn pending(&self) -> Vec<PendingRef> {
        self.state
            .read()
            .pending
            .iter()
            .flat_map(|((group, name), waiters)| {
                waiters.iter().map(move |w| PendingRef {
                    target: format!("{group}.{name}"),
                    waiting: w.waiting.clone(),
                    field: w.field.clone(),
                })
            })
            .collect()
    }

    /// Fail when any lookup is still waiting. Nothing calls this implicitly.
    pub fn finalize(&self) -> Result<(), ConfigError> {
        let pending = self.pending();
        if pending.is_empty() {
            return Ok(());
        }
        Err(ConfigError::DanglingReferences(
            pending.iter().map(PendingRef::to_string).collect(),
        ))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Registry")
            .field("schemas", &state.schemas.keys().collect::<Vec<_>>())
            .field("pending", &state.pending.len())
            .finish()
    }
}

/// Queue `on_resolved` behind `target`, or hand it back with its schema when
/// the target is already known.
fn resolve_locked(
    state: &mut State,
    waiting: &Arc<Schema>,
    field: &str,
    target: &Target,
    on_resolved: OnResolved,
) -> Option<Ready> {
    let Some(k) = target_key(target, waiting.group()) else {
        let schema = match target {
            Target::Schema(schema) => schema.clone(),
            _ => waiting.clone(),
        };
        return Some((on_resolved, schema));
    };
    if let Some(schema) = state.schemas.get(&k) {
        return Some((on_resolved, schema.clone()));
    }
    tracing::debug!(
        target_schema = %format!("{}.{}", k.0, k.1),
        waiting = %waiting.key(),
        field,
        "deferred forward reference"
    );
    state.pending.entry(k).or_default().push(PendingLookup {
        waiting: waiting.key(),
        field: field.to_string(),
        on_resolved,
    });
    None
}
