//! Cookie transport boundary.
//!
//! The core never talks to a browser directly; it writes through this trait.
//! Real implementations wrap `document.cookie` or an HTTP cookie jar and
//! live outside this crate. `flagjar-mock` provides in-memory
//! implementations for tests.

/// Name of the single cross-app experiment cookie.
pub const EXPERIMENTS_COOKIE: &str = "fs_experiments";

/// Path the experiment cookie is scoped to.
pub const COOKIE_PATH: &str = "/";

/// Experiment cookie lifetime: one year.
pub const COOKIE_MAX_AGE_SECS: u64 = 365 * 24 * 60 * 60;

/// Name of the reserved per-app experiment cookie, `fs_ex_<app>`.
///
/// Present in the data model for compatibility but never read or written by
/// the core; decoding must tolerate it being absent.
pub fn app_cookie_name(app: &str) -> String {
    format!("fs_ex_{app}")
}

/// Get/set/unset primitives over a named cookie.
///
/// `set` returns nothing: when cookie storage is disabled the write silently
/// no-ops and the browser offers no reliable way to detect it. The design
/// favors availability over correctness-signaling throughout.
pub trait CookieTransport {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&mut self, name: &str, value: &str, path: &str, max_age_secs: u64);
    fn unset(&mut self, name: &str, path: &str);
}
