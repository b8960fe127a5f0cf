//! Namespace manager — precedence-resolved reads and writes over exactly
//! two live namespaces: the app-private one and the cross-app `shared-ui`
//! entry.
//!
//! Which namespace owns a feature is decided once, when the state is
//! loaded: names declared by the `shared-ui` template or already present in
//! the decoded `shared-ui` record are shared-owned, everything else is
//! app-owned. There is no per-write existence probing, so a feature's home
//! cannot drift mid-session and a shared flag is never duplicated into the
//! app-private namespace.

use std::collections::{HashMap, HashSet};

use crate::state::{AppRecord, FeatureValue, GlobalExperimentState, OrderedMap};
use crate::template::TemplateRegistry;

/// Reserved app entry holding flags visible to every cooperating application.
pub const SHARED_NAMESPACE: &str = "shared-ui";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Owner {
    App,
    Shared,
}

/// Holds the decoded state and resolves reads/writes between the app-private
/// and shared namespaces. Constructed once per process by the public API.
#[derive(Debug)]
pub struct NamespaceManager {
    app: String,
    state: GlobalExperimentState,
    ownership: HashMap<String, Owner>,
}

impl NamespaceManager {
    pub fn new(
        app: impl Into<String>,
        state: GlobalExperimentState,
        templates: &TemplateRegistry,
    ) -> Self {
        let app = app.into();

        // Namespace records are not materialized here: an opaque own record
        // (e.g. written by a newer app version) must survive re-encoding
        // byte-for-byte until a write actually routes to it, and namespaces
        // the cookie never contained stay absent until first written.

        // Ownership table, fixed at load time. The decoded shared record is
        // consulted as well as the template: a shared flag written by another
        // app must keep routing shared even if this app's registry does not
        // declare it.
        let mut ownership = HashMap::new();
        if let Some(template) = templates.get(&app) {
            for (name, _) in template.declared() {
                ownership.insert(name.to_string(), Owner::App);
            }
        }
        if let Some(template) = templates.get(SHARED_NAMESPACE) {
            for (name, _) in template.declared() {
                ownership.insert(name.to_string(), Owner::Shared);
            }
        }
        if let Some(AppRecord::Experiments(shared)) = state.apps.get(SHARED_NAMESPACE) {
            for (name, _) in shared.features.iter() {
                ownership.insert(name.to_string(), Owner::Shared);
            }
        }

        Self {
            app,
            state,
            ownership,
        }
    }

    #[inline]
    pub fn state(&self) -> &GlobalExperimentState {
        &self.state
    }

    /// Read a feature with app-over-shared precedence.
    ///
    /// Undefined in both namespaces yields `default`. A truthy app-private
    /// value wins; otherwise a defined shared value is used; a falsy
    /// app-private value only shows through when shared has nothing.
    pub fn read(&self, name: &str, default: bool) -> bool {
        let (base, variant) = split_name(name);
        let app_value = self.lookup(&self.app, base, variant);
        let shared_value = self.lookup(SHARED_NAMESPACE, base, variant);

        match (app_value, shared_value) {
            (None, None) => default,
            (Some(true), _) => true,
            (_, Some(shared)) => shared,
            (Some(app), None) => app,
        }
    }

    fn lookup(&self, namespace: &str, base: &str, variant: Option<&str>) -> Option<bool> {
        let exp = self.state.apps.get(namespace)?.as_experiments()?;
        match (exp.features.get(base)?, variant) {
            (FeatureValue::Flag(on), None) => Some(*on),
            // A v1-decoded variant feature is a bare flag; the requested
            // variant's truth is unknowable, not false.
            (FeatureValue::Flag(_), Some(_)) => None,
            (FeatureValue::Variants(variants), Some(v)) => variants.get(v).copied(),
            (FeatureValue::Variants(variants), None) => {
                Some(variants.iter().any(|(_, &on)| on))
            }
        }
    }

    /// Write a feature to its owning namespace and mark it dirty there.
    ///
    /// A name in neither template becomes app-owned on first write and stays
    /// so. The target namespace's record is materialized on first write
    /// (replacing an undecodable opaque blob only then — the other namespace
    /// is never touched). A scalar write onto a variant-shaped feature is
    /// refused and logged: a name never mixes shapes within one namespace.
    pub fn write(&mut self, name: &str, value: bool) {
        let (base, variant) = split_name(name);
        let owner = *self
            .ownership
            .entry(base.to_string())
            .or_insert(Owner::App);
        let namespace = match owner {
            Owner::App => self.app.clone(),
            Owner::Shared => SHARED_NAMESPACE.to_string(),
        };

        let exp = self.state.ensure_app(&namespace);
        match variant {
            Some(variant) => {
                if !matches!(exp.features.get(base), Some(FeatureValue::Variants(_))) {
                    // Replace a bare flag: the scalar was only ever the v1
                    // "some variant selected" conflation bit.
                    exp.features
                        .insert(base, FeatureValue::Variants(OrderedMap::new()));
                }
                if let Some(FeatureValue::Variants(variants)) = exp.features.get_mut(base) {
                    variants.insert(variant, value);
                }
            }
            None => {
                if matches!(exp.features.get(base), Some(FeatureValue::Variants(_))) {
                    log::warn!(
                        "refusing scalar write to variant feature '{base}' in '{namespace}'"
                    );
                    return;
                }
                exp.features.insert(base, FeatureValue::Flag(value));
            }
        }
        exp.mark_dirty(base);
    }

    /// Every base feature name currently truthy in either namespace, in
    /// app-private-then-shared iteration order, deduplicated. Used for CSS
    /// class tagging and diagnostics.
    pub fn active_list(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut active = Vec::new();
        for namespace in [self.app.as_str(), SHARED_NAMESPACE] {
            let Some(exp) = self.state.apps.get(namespace).and_then(AppRecord::as_experiments)
            else {
                continue;
            };
            for (name, value) in exp.features.iter() {
                if value.is_truthy() && seen.insert(name.to_string()) {
                    active.push(name.to_string());
                }
            }
        }
        active
    }

    /// Dirty lists of both live namespaces, app-private first.
    pub fn dirty_by_namespace(&self) -> Vec<(String, Vec<String>)> {
        [self.app.as_str(), SHARED_NAMESPACE]
            .into_iter()
            .filter_map(|ns| {
                let exp = self.state.apps.get(ns)?.as_experiments()?;
                Some((ns.to_string(), exp.dirty.clone()))
            })
            .collect()
    }
}

/// Split `"<feature>#<variant>"` into base and optional variant.
#[inline]
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.split_once('#') {
        Some((base, variant)) => (base, Some(variant)),
        None => (name, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use crate::template::AppTemplate;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::new()
            .app("myapp", AppTemplate::new().flag("alpha").flag("beta"))
            .app(SHARED_NAMESPACE, AppTemplate::new().flag("banner"))
    }

    fn manager(raw: &str) -> NamespaceManager {
        let registry = registry();
        NamespaceManager::new("myapp", decode(raw, &registry), &registry)
    }

    #[test]
    fn read_defaults_when_undefined_everywhere() {
        let mgr = manager("");
        assert!(!mgr.read("nope", false));
        assert!(mgr.read("nope", true));
    }

    #[test]
    fn shared_value_shows_through_when_app_is_silent() {
        let mgr = manager("u=1,a=shared-ui,s=s,v=1,b=b");
        assert!(mgr.read("banner", false));
    }

    #[test]
    fn truthy_app_value_wins_over_shared() {
        let mgr = manager("u=1,a=myapp,s=s,v=10,b=b&a=shared-ui,s=s,e=2,f=alpha:0~beta:1,b=b");
        // alpha: app true, shared false -> app wins.
        assert!(mgr.read("alpha", false));
        // beta: app false (defined), shared true -> shared wins.
        assert!(mgr.read("beta", false));
    }

    #[test]
    fn shared_presence_at_load_wins_ownership() {
        let mut mgr = manager("u=1,a=shared-ui,s=s,e=2,f=alpha:0,b=b");
        // "alpha" is app-declared but also present in the shared record;
        // shared presence at load time wins ownership, so this write routes
        // shared and there is never a duplicate.
        mgr.write("alpha", true);
        assert!(mgr.read("alpha", false));
        let shared = mgr.state().apps.get(SHARED_NAMESPACE).unwrap();
        assert!(shared.as_experiments().unwrap().features.get("alpha").unwrap().is_truthy());
        assert!(mgr.state().apps.get("myapp").is_none());
    }

    #[test]
    fn shared_owned_write_routes_to_shared() {
        let mut mgr = manager("u=1,a=shared-ui,s=s,v=1,b=b");
        mgr.write("banner", false);

        assert!(!mgr.read("banner", true));
        // The app namespace was never written, so no record materializes.
        assert!(mgr.state().apps.get("myapp").is_none());
        let shared = mgr.state().apps.get(SHARED_NAMESPACE).unwrap();
        assert_eq!(shared.as_experiments().unwrap().dirty, ["banner"]);
    }

    #[test]
    fn unknown_name_becomes_app_owned_on_first_write() {
        let mut mgr = manager("");
        mgr.write("fresh", true);
        mgr.write("fresh", false);

        let app = mgr.state().apps.get("myapp").unwrap().as_experiments().unwrap();
        assert_eq!(app.features.get("fresh"), Some(&FeatureValue::Flag(false)));
        assert_eq!(app.dirty, ["fresh"]);
    }

    #[test]
    fn variant_write_builds_mapping_and_reads_back() {
        let mut mgr = manager("");
        mgr.write("theme#red", true);
        mgr.write("theme#blue", false);

        assert!(mgr.read("theme#red", false));
        assert!(!mgr.read("theme#blue", true));
        // Base name is truthy while any variant is.
        assert!(mgr.read("theme", false));
        let app = mgr.state().apps.get("myapp").unwrap().as_experiments().unwrap();
        assert_eq!(app.dirty, ["theme"]);
    }

    #[test]
    fn scalar_write_onto_variant_feature_is_refused() {
        let mut mgr = manager("");
        mgr.write("theme#red", true);
        mgr.write("theme", false);

        // The mapping survives; the refused write is not recorded as dirty
        // twice either way (idempotent list).
        assert!(mgr.read("theme#red", false));
        assert!(mgr.read("theme", false));
    }

    #[test]
    fn opaque_own_record_survives_until_written() {
        use crate::state::AppRecord;

        // Unknown field keeps the own record opaque (newer app version).
        let blob = "a=myapp,s=s1,v=10,b=B1,z=future";
        let mut mgr = manager(&format!("u=1,{blob}"));

        // Reads fall through to defaults without touching the blob.
        assert!(!mgr.read("alpha", false));
        assert_eq!(
            mgr.state().apps.get("myapp"),
            Some(&AppRecord::Opaque(blob.to_string()))
        );

        // A write to the *other* namespace still leaves it alone.
        mgr.write("banner", true);
        assert_eq!(
            mgr.state().apps.get("myapp"),
            Some(&AppRecord::Opaque(blob.to_string()))
        );

        // Only a write routed to this namespace replaces it.
        mgr.write("fresh", true);
        assert!(mgr.state().apps.get("myapp").unwrap().as_experiments().is_some());
    }

    #[test]
    fn active_list_orders_app_then_shared() {
        let mut mgr = manager("u=1,a=shared-ui,s=s,v=1,b=b");
        mgr.write("zeta", true);
        mgr.write("alpha", true);

        assert_eq!(mgr.active_list(), ["zeta", "alpha", "banner"]);
    }
}
