//! In-memory experiment state — the decoded form of the `fs_experiments` cookie.
//!
//! All maps here preserve insertion order: the wire format is re-emitted in
//! the order records and features were first seen, so a decode/encode cycle
//! must not shuffle anything. Ordering is kept with an entries `Vec` plus a
//! name → index `HashMap` rather than a plain `HashMap` alone.

use std::collections::HashMap;

use serde::Serialize;

/// Insertion-ordered string-keyed map.
///
/// Lookup is O(1) through the index; iteration follows insertion order.
/// Re-inserting an existing key replaces the value in place without moving
/// the key's position.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        if let Some(&i) = self.index.get(&key) {
            self.entries[i].1 = value;
        } else {
            self.index.insert(key.clone(), self.entries.len());
            self.entries.push((key, value));
        }
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    #[inline]
    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        let i = *self.index.get(key)?;
        Some(&mut self.entries[i].1)
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Value of one feature inside a namespace.
///
/// A feature is either a plain boolean flag or a set of named variants.
/// Within one namespace a given name never switches between the two shapes
/// across mutations; the namespace manager enforces that at write time.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureValue {
    Flag(bool),
    Variants(OrderedMap<bool>),
}

impl FeatureValue {
    /// A flag is truthy when set; a variant set is truthy when any variant is.
    pub fn is_truthy(&self) -> bool {
        match self {
            FeatureValue::Flag(on) => *on,
            FeatureValue::Variants(variants) => variants.iter().any(|(_, &on)| on),
        }
    }
}

/// Decoded experiment assignments for one application namespace.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppExperiments {
    /// Opaque template-version token, copied through unmodified.
    pub stamp: String,
    /// Opaque assignment-group token, copied through unmodified.
    pub bucket: String,
    /// Feature name → value, in wire/first-insertion order.
    pub features: OrderedMap<FeatureValue>,
    /// Base feature names mutated since this namespace was loaded, in
    /// first-touch order. Consumed by analytics, not by flag evaluation.
    pub dirty: Vec<String>,
}

impl AppExperiments {
    /// Record a mutation of `name` for instrumentation. Idempotent: a name
    /// already on the list is not appended again.
    pub fn mark_dirty(&mut self, name: &str) {
        if !self.dirty.iter().any(|d| d == name) {
            self.dirty.push(name.to_string());
        }
    }
}

/// One per-app record in the global state.
///
/// Records for applications this process has no template for are never
/// parsed; they ride along as the original wire substring and are echoed
/// back verbatim on encode so their owner's state cannot be corrupted.
#[derive(Clone, Debug, PartialEq)]
pub enum AppRecord {
    Experiments(AppExperiments),
    Opaque(String),
}

impl AppRecord {
    pub fn as_experiments(&self) -> Option<&AppExperiments> {
        match self {
            AppRecord::Experiments(exp) => Some(exp),
            AppRecord::Opaque(_) => None,
        }
    }

}

/// The whole decoded cookie: one user, one record per application.
///
/// Rebuilt from the cookie on first API use; discarded when the process
/// ends. Durability is entirely delegated to the cookie itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlobalExperimentState {
    pub user_id: String,
    pub apps: OrderedMap<AppRecord>,
}

impl GlobalExperimentState {
    /// Look up the decoded record for `app`, creating an empty one if the
    /// cookie had none. Only the write path calls this: an opaque record is
    /// preserved untouched until a write actually routes to its namespace,
    /// at which point it cannot be written as-is and is replaced (logged —
    /// it means a newer app version wrote state this version cannot read).
    pub fn ensure_app(&mut self, app: &str) -> &mut AppExperiments {
        let needs_reset = match self.apps.get(app) {
            Some(AppRecord::Experiments(_)) => false,
            Some(AppRecord::Opaque(_)) => {
                log::warn!("replacing undecodable record for namespace {app:?} on write");
                true
            }
            None => true,
        };
        if needs_reset {
            self.apps
                .insert(app, AppRecord::Experiments(AppExperiments::default()));
        }
        match self.apps.get_mut(app) {
            Some(AppRecord::Experiments(exp)) => exp,
            _ => unreachable!("record for {app:?} was just ensured"),
        }
    }
}

/// Analytics payload: which features were touched this session, per namespace.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DirtyReport {
    pub user_id: String,
    pub namespaces: Vec<NamespaceDirt>,
}

/// Dirty-feature list of a single namespace.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NamespaceDirt {
    pub app: String,
    pub features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_map_preserves_insertion_order() {
        let mut map = OrderedMap::new();
        map.insert("charlie", 3);
        map.insert("alpha", 1);
        map.insert("bravo", 2);

        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["charlie", "alpha", "bravo"]);
    }

    #[test]
    fn ordered_map_replace_keeps_position() {
        let mut map = OrderedMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("a", 10);

        let entries: Vec<(&str, &i32)> = map.iter().collect();
        assert_eq!(entries, [("a", &10), ("b", &2)]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn mark_dirty_is_idempotent() {
        let mut exp = AppExperiments::default();
        exp.mark_dirty("x");
        exp.mark_dirty("y");
        exp.mark_dirty("x");

        assert_eq!(exp.dirty, ["x", "y"]);
    }

    #[test]
    fn variant_feature_truthy_when_any_variant_is() {
        let mut variants = OrderedMap::new();
        variants.insert("red", false);
        variants.insert("blue", false);
        assert!(!FeatureValue::Variants(variants.clone()).is_truthy());

        variants.insert("blue", true);
        assert!(FeatureValue::Variants(variants).is_truthy());

        assert!(FeatureValue::Flag(true).is_truthy());
        assert!(!FeatureValue::Flag(false).is_truthy());
    }

    #[test]
    fn ensure_app_creates_empty_record_once() {
        let mut state = GlobalExperimentState::default();
        state.ensure_app("myapp").mark_dirty("x");

        // A second call must find the same record, not a fresh one.
        assert_eq!(state.ensure_app("myapp").dirty, ["x"]);
        assert_eq!(state.apps.len(), 1);
    }

    #[test]
    fn ensure_app_replaces_opaque_record() {
        let mut state = GlobalExperimentState::default();
        state
            .apps
            .insert("myapp", AppRecord::Opaque("a=myapp,junk".into()));

        let exp = state.ensure_app("myapp");
        assert!(exp.features.is_empty());
    }

    #[test]
    fn dirty_report_serializes_to_json() {
        let report = DirtyReport {
            user_id: "42".into(),
            namespaces: vec![NamespaceDirt {
                app: "myapp".into(),
                features: vec!["alpha".into()],
            }],
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"user_id\":\"42\""));
        assert!(json.contains("\"alpha\""));
    }
}
