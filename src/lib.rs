//! # flagjar
//!
//! Per-user feature-experiment state ("feature flags with variants") shared
//! across cooperating front-end applications through one cookie on a common
//! top-level domain.
//!
//! ## Wire format (`fs_experiments` cookie)
//!
//! ```text
//! u=<userId>,a=<app>,s=<stamp>,v=<bitstring>,b=<bucket>&a=<app2>,...
//!                    └── v1: positional bits, template order ──┘
//!
//! u=<userId>,a=<app>,s=<stamp>,e=2,f=alpha:1~theme#red:0,b=<bucket>
//!                    └── v2: self-describing name:value pairs ──┘
//! ```
//!
//! Decode needs the per-app feature template (declared order = bit order)
//! for v1 records; records for apps with no template ride along opaquely
//! and are echoed back byte-for-byte. Encode always emits v2.
//!
//! ## Namespaces
//!
//! Each application reads from two namespaces: its own and the cross-app
//! `shared-ui` entry. Feature ownership is fixed when the state loads;
//! reads resolve app-over-shared, writes route to the owning namespace and
//! rewrite the whole cookie immediately.
//!
//! ```
//! use flagjar::{AppTemplate, CookieTransport, Experiments, TemplateRegistry};
//!
//! struct NoJar;
//! impl CookieTransport for NoJar {
//!     fn get(&self, _: &str) -> Option<String> { None }
//!     fn set(&mut self, _: &str, _: &str, _: &str, _: u64) {}
//!     fn unset(&mut self, _: &str, _: &str) {}
//! }
//!
//! let mut ex = Experiments::new("myapp", NoJar);
//! ex.default_ex(TemplateRegistry::new().app(
//!     "myapp",
//!     AppTemplate::new().flag("alpha").variants("theme", ["red", "blue"]),
//! ));
//!
//! assert!(!ex.show_ex("alpha", false));
//! ex.set_ex("alpha", true);
//! assert!(ex.show_ex("alpha", false));
//! assert_eq!(ex.active_list(), ["alpha"]);
//! ```

pub mod api;
pub mod codec;
pub mod cookie;
pub mod namespace;
pub mod startup;
pub mod state;
pub mod template;

pub use api::Experiments;
pub use codec::{decode, encode, RecordError};
pub use cookie::{
    app_cookie_name, CookieTransport, COOKIE_MAX_AGE_SECS, COOKIE_PATH, EXPERIMENTS_COOKIE,
};
pub use namespace::{NamespaceManager, SHARED_NAMESPACE};
pub use startup::{Phase, StartupError, StartupQueue};
pub use state::{
    AppExperiments, AppRecord, DirtyReport, FeatureValue, GlobalExperimentState, NamespaceDirt,
    OrderedMap,
};
pub use template::{AppTemplate, FeatureShape, TemplateRegistry};
