use crate::interception::site::HookSite;
use std::collections::HashSet;
use std::sync::Mutex;

/// Platform integration layer that physically installs hooks
///
/// Implementations report failure as a human-readable reason; the registry
/// logs it and carries on with the remaining sites.
pub trait HookHost: Send + Sync {
    fn install(&self, site: &HookSite) -> Result<(), String>;
}

/// In-memory host: a table of the methods the host process exposes
///
/// Used by the CLI and tests. Methods can be declared missing or already
/// instrumented by a foreign framework to exercise registration failures.
#[derive(Debug, Default)]
pub struct MethodTable {
    methods: HashSet<String>,
    foreign: HashSet<String>,
    installed: Mutex<Vec<String>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a method by its call key (`interface#method(params)`)
    pub fn with_method(mut self, call_key: impl Into<String>) -> Self {
        self.methods.insert(call_key.into());
        self
    }

    /// Declare every call a set of sites targets
    pub fn with_sites<'a, I>(mut self, sites: I) -> Self
    where
        I: IntoIterator<Item = &'a HookSite>,
    {
        self.methods.extend(sites.into_iter().map(HookSite::call_key));
        self
    }

    /// Mark a method as already hooked by something else
    pub fn with_foreign_hook(mut self, call_key: impl Into<String>) -> Self {
        self.foreign.insert(call_key.into());
        self
    }

    pub fn without_method(mut self, call_key: &str) -> Self {
        self.methods.remove(call_key);
        self
    }

    /// Call keys installed so far, in installation order
    pub fn installed(&self) -> Vec<String> {
        self.installed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl HookHost for MethodTable {
    fn install(&self, site: &HookSite) -> Result<(), String> {
        let key = site.call_key();
        if !self.methods.contains(&key) {
            return Err(format!("{} not present in host", key));
        }
        if self.foreign.contains(&key) {
            return Err(format!("{} already instrumented by another framework", key));
        }
        self.installed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key);
        Ok(())
    }
}
