//! Public query/mutation API — the only surface application code should use.
//!
//! Two states: Uninitialized and Initialized. The transition happens exactly
//! once, on the first query or mutation; callers never sequence an explicit
//! init step. Template registration ([`Experiments::default_ex`]) goes
//! through a startup queue and is refused after initialization, since bit
//! positions are resolved during the first decode.
//!
//! Known consistency boundary: a mutation re-serializes the cached in-memory
//! state, not a fresh cookie read, so two tabs mutating concurrently race
//! with last-write-wins semantics. Accepted for this domain.

use crate::codec;
use crate::cookie::{CookieTransport, COOKIE_MAX_AGE_SECS, COOKIE_PATH, EXPERIMENTS_COOKIE};
use crate::namespace::NamespaceManager;
use crate::startup::StartupQueue;
use crate::state::{DirtyReport, NamespaceDirt};
use crate::template::TemplateRegistry;

/// Per-user experiment state for one application, backed by the
/// `fs_experiments` cookie.
pub struct Experiments<T: CookieTransport> {
    app: String,
    transport: T,
    templates: StartupQueue<TemplateRegistry>,
    manager: Option<NamespaceManager>,
}

impl<T: CookieTransport> Experiments<T> {
    pub fn new(app: impl Into<String>, transport: T) -> Self {
        Self {
            app: app.into(),
            transport,
            templates: StartupQueue::new(),
            manager: None,
        }
    }

    /// Supply a feature template registry.
    ///
    /// Must happen before the first query or mutation for v1 bit positions
    /// to resolve; afterwards the registration is refused and logged, never
    /// applied half-way.
    pub fn default_ex(&mut self, registry: TemplateRegistry) {
        if let Err(err) = self.templates.register(registry) {
            log::warn!("ignoring template registration: {err}");
        }
    }

    /// Whether the first decode has happened.
    pub fn is_initialized(&self) -> bool {
        self.manager.is_some()
    }

    /// The underlying cookie transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Read a feature flag; `default` applies only when the name is defined
    /// in neither namespace.
    pub fn show_ex(&mut self, name: &str, default: bool) -> bool {
        self.ensure_init();
        match &self.manager {
            Some(manager) => manager.read(name, default),
            None => default,
        }
    }

    /// Set a feature flag and rewrite the cookie immediately (no batching).
    pub fn set_ex(&mut self, name: &str, value: bool) {
        self.ensure_init();
        let Some(manager) = self.manager.as_mut() else {
            return;
        };
        manager.write(name, value);
        let encoded = codec::encode(manager.state());
        self.transport
            .set(EXPERIMENTS_COOKIE, &encoded, COOKIE_PATH, COOKIE_MAX_AGE_SECS);
    }

    /// Every feature currently truthy in either namespace, app-private
    /// order first.
    pub fn active_list(&mut self) -> Vec<String> {
        self.ensure_init();
        match &self.manager {
            Some(manager) => manager.active_list(),
            None => Vec::new(),
        }
    }

    /// Features mutated this session, per namespace, for analytics.
    pub fn dirty_report(&mut self) -> DirtyReport {
        self.ensure_init();
        let Some(manager) = &self.manager else {
            return DirtyReport {
                user_id: String::new(),
                namespaces: Vec::new(),
            };
        };
        DirtyReport {
            user_id: manager.state().user_id.clone(),
            namespaces: manager
                .dirty_by_namespace()
                .into_iter()
                .map(|(app, features)| NamespaceDirt { app, features })
                .collect(),
        }
    }

    /// [`Experiments::dirty_report`] as a JSON value, ready to ship.
    pub fn dirty_json(&mut self) -> serde_json::Value {
        serde_json::to_value(self.dirty_report()).unwrap_or(serde_json::Value::Null)
    }

    /// One-shot transition: drain queued template registrations, read and
    /// decode the cookie, build the namespace manager.
    fn ensure_init(&mut self) {
        if self.manager.is_some() {
            return;
        }
        let mut merged = TemplateRegistry::new();
        if let Ok(registrations) = self.templates.drain_ready() {
            for registry in registrations {
                merged.merge(registry);
            }
        }
        let raw = self.transport.get(EXPERIMENTS_COOKIE).unwrap_or_default();
        let state = codec::decode(&raw, &merged);
        self.manager = Some(NamespaceManager::new(self.app.clone(), state, &merged));
    }
}
