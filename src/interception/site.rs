use serde::{Deserialize, Serialize};
use std::fmt;

/// When a handler runs relative to the intercepted call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Sees and may rewrite arguments, may short-circuit with a result
    Before,
    /// Sees the real result, may override it
    After,
    /// Owns the result; the original call is skipped
    Replace,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Before => "before",
            Self::After => "after",
            Self::Replace => "replace",
        })
    }
}

/// A declared interception point
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HookSite {
    /// Fully qualified interface or class name
    pub interface: String,
    pub method: String,
    /// Parameter type names, empty for no-argument methods
    #[serde(default)]
    pub params: Vec<String>,
    pub stage: Stage,
}

impl HookSite {
    pub fn new(interface: impl Into<String>, method: impl Into<String>, stage: Stage) -> Self {
        Self {
            interface: interface.into(),
            method: method.into(),
            params: Vec::new(),
            stage,
        }
    }

    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Key of the underlying call, shared by every stage hooking it
    ///
    /// Format: `interface#method(param,param)`
    pub fn call_key(&self) -> String {
        format!("{}#{}({})", self.interface, self.method, self.params.join(","))
    }

    /// Unique key of this site, call key plus stage
    pub fn key(&self) -> String {
        format!("{}@{}", self.call_key(), self.stage)
    }

    /// Reject sites the host could never resolve
    pub fn validate(&self) -> Result<(), String> {
        fn is_name(s: &str) -> bool {
            !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || "#(),".contains(c))
        }

        if !is_name(&self.interface) {
            return Err(format!("malformed interface name {:?}", self.interface));
        }
        if !is_name(&self.method) {
            return Err(format!("malformed method name {:?}", self.method));
        }
        if let Some(p) = self.params.iter().find(|p| !is_name(p)) {
            return Err(format!("malformed parameter type {:?}", p));
        }
        Ok(())
    }
}

impl fmt::Display for HookSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.call_key(), self.stage)
    }
}
