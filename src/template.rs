//! Feature template registry — the externally supplied, ordered schema of
//! feature names per application.
//!
//! Declaration order is load-bearing: legacy (v1) cookie records carry a
//! positional bitstring whose index *i* refers to the *i*-th declared
//! feature, so a registry must iterate features exactly as they were
//! declared. Templates are registered before the first decode and frozen
//! afterwards (see the startup queue in [`crate::startup`]).

use crate::state::OrderedMap;

/// Declared shape of one feature.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureShape {
    /// Plain boolean flag.
    Flag,
    /// Named variant set, in declared order.
    Variants(Vec<String>),
}

/// Ordered feature declarations for one application.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppTemplate {
    features: OrderedMap<FeatureShape>,
}

impl AppTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a plain boolean feature. Declaration order is bit order.
    pub fn flag(mut self, name: impl Into<String>) -> Self {
        self.features.insert(name, FeatureShape::Flag);
        self
    }

    /// Declare a multi-variant feature.
    pub fn variants<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        variants: impl IntoIterator<Item = S>,
    ) -> Self {
        let variants = variants.into_iter().map(Into::into).collect();
        self.features.insert(name, FeatureShape::Variants(variants));
        self
    }

    #[inline]
    pub fn shape_of(&self, name: &str) -> Option<&FeatureShape> {
        self.features.get(name)
    }

    /// Declared features in declaration (= bit-position) order.
    pub fn declared(&self) -> impl Iterator<Item = (&str, &FeatureShape)> {
        self.features.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Template registry: application name → ordered feature template.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TemplateRegistry {
    apps: OrderedMap<AppTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the template for one application.
    pub fn app(mut self, name: impl Into<String>, template: AppTemplate) -> Self {
        self.apps.insert(name, template);
        self
    }

    #[inline]
    pub fn get(&self, app: &str) -> Option<&AppTemplate> {
        self.apps.get(app)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AppTemplate)> {
        self.apps.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Fold another registry into this one.
    ///
    /// Bundles register their templates independently before startup; later
    /// registrations add new apps and append unknown features, but never
    /// reorder or reshape features an earlier registration declared — bit
    /// positions of already-declared features must not move.
    pub fn merge(&mut self, other: TemplateRegistry) {
        for (app, template) in other.apps.iter() {
            if !self.apps.contains_key(app) {
                self.apps.insert(app, template.clone());
                continue;
            }
            let Some(existing) = self.apps.get_mut(app) else {
                continue;
            };
            for (name, shape) in template.declared() {
                if !existing.features.contains_key(name) {
                    existing.features.insert(name, shape.clone());
                }
            }
        }
    }
}
