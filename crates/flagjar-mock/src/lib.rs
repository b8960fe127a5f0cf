//! Test-support cookie transports for `flagjar`.
//!
//! Intended for tests only: never talks to a real cookie store. [`MemoryJar`]
//! records every `set`/`unset` call so tests can assert on the exact wire
//! writes; [`DeadJar`] models disabled cookie storage, where writes silently
//! vanish.

use std::collections::HashMap;

use flagjar::CookieTransport;

/// One recorded `set` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetCall {
    pub name: String,
    pub value: String,
    pub path: String,
    pub max_age_secs: u64,
}

/// In-memory cookie store that records every write.
#[derive(Debug, Default)]
pub struct MemoryJar {
    cookies: HashMap<String, String>,
    set_calls: Vec<SetCall>,
    unset_calls: Vec<String>,
}

impl MemoryJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a cookie before the code under test runs.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Current value of a cookie, if any.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Every `set` call, in order.
    pub fn set_calls(&self) -> &[SetCall] {
        &self.set_calls
    }

    /// Names passed to `unset`, in order.
    pub fn unset_calls(&self) -> &[String] {
        &self.unset_calls
    }
}

impl CookieTransport for MemoryJar {
    fn get(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: &str, path: &str, max_age_secs: u64) {
        self.cookies.insert(name.to_string(), value.to_string());
        self.set_calls.push(SetCall {
            name: name.to_string(),
            value: value.to_string(),
            path: path.to_string(),
            max_age_secs,
        });
    }

    fn unset(&mut self, name: &str, _path: &str) {
        self.cookies.remove(name);
        self.unset_calls.push(name.to_string());
    }
}

/// Transport with cookie storage disabled: reads find nothing, writes are
/// dropped without any signal, exactly as a browser does.
#[derive(Debug, Default)]
pub struct DeadJar;

impl CookieTransport for DeadJar {
    fn get(&self, _name: &str) -> Option<String> {
        None
    }

    fn set(&mut self, _name: &str, _value: &str, _path: &str, _max_age_secs: u64) {}

    fn unset(&mut self, _name: &str, _path: &str) {}
}
