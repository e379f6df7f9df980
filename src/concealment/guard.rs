//! Startup guard against instrumenting protected processes

use crate::error::MaskError;
use tracing::warn;

/// Core platform processes never instrumented regardless of configuration
pub const PROTECTED_PROCESSES: &[&str] = &[
    "android",
    "system",
    "system_server",
    "com.android.systemui",
    "com.android.phone",
];

/// Identity of the process the engine is asked to attach to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    /// Package (or process) name
    pub package: String,
    /// Process name when it differs from the package (`pkg:service`)
    pub process: Option<String>,
}

impl ProcessIdentity {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            process: None,
        }
    }

    pub fn with_process(mut self, process: impl Into<String>) -> Self {
        self.process = Some(process.into());
        self
    }
}

/// Decides whether a process may be instrumented
#[derive(Debug, Clone)]
pub struct ProcessGuard {
    self_package: String,
    protected: Vec<String>,
}

impl ProcessGuard {
    pub fn new(self_package: impl Into<String>, extra_protected: &[String]) -> Self {
        let mut protected: Vec<String> =
            PROTECTED_PROCESSES.iter().map(|s| s.to_string()).collect();
        protected.extend(extra_protected.iter().cloned());
        Self {
            self_package: self_package.into(),
            protected,
        }
    }

    fn is_protected_name(&self, name: &str) -> bool {
        // Sub-processes of the companion app (`pkg:ui`) count as self
        let base = name.split(':').next().unwrap_or(name);
        base == self.self_package || self.protected.iter().any(|p| p == name || p == base)
    }

    pub fn is_protected(&self, identity: &ProcessIdentity) -> bool {
        self.is_protected_name(&identity.package)
            || identity
                .process
                .as_deref()
                .map(|p| self.is_protected_name(p))
                .unwrap_or(false)
    }

    /// Fails for the companion app itself and for core platform processes
    pub fn check(&self, identity: &ProcessIdentity) -> Result<(), MaskError> {
        if self.is_protected(identity) {
            warn!(
                target: "idveil::engine",
                "Skipping protected process {}",
                identity.package
            );
            return Err(MaskError::ProtectedProcess(identity.package.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> ProcessGuard {
        ProcessGuard::new("com.idveil.app", &["com.vendor.keystore".to_string()])
    }

    #[test]
    fn test_core_processes_protected() {
        let g = guard();
        for name in PROTECTED_PROCESSES {
            assert!(g.check(&ProcessIdentity::new(*name)).is_err(), "{}", name);
        }
    }

    #[test]
    fn test_self_and_subprocess_protected() {
        let g = guard();
        assert!(g.is_protected(&ProcessIdentity::new("com.idveil.app")));
        assert!(g.is_protected(
            &ProcessIdentity::new("com.other").with_process("com.idveil.app:ui")
        ));
    }

    #[test]
    fn test_extra_protected() {
        assert!(guard().is_protected(&ProcessIdentity::new("com.vendor.keystore")));
    }

    #[test]
    fn test_ordinary_app_allowed() {
        let g = guard();
        assert!(g.check(&ProcessIdentity::new("com.example.shop")).is_ok());
        // prefix of a protected name is not protected
        assert!(g.check(&ProcessIdentity::new("com.android.phonebook")).is_ok());
    }
}
