use crate::concealment::maps::MetadataFilter;
use crate::concealment::stack::StackFrame;
use crate::concealment::Concealer;
use crate::error::MaskError;
use crate::interception::{CallResult, HandlerResult, HookHandler, InterceptOutcome, Invocation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Introspection surface a concealment hook filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcealmentSurface {
    /// Result: array of frames (symbol strings or frame objects)
    StackTrace,
    /// Result: one line of a metadata file, `null` at end of input.
    /// Optional first argument: the path being read.
    MetadataRead,
    /// First argument: the queried package name
    PackageInfo,
    /// Result: array of package names or objects with a `package` field
    PackageList,
}

impl fmt::Display for ConcealmentSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StackTrace => "stack_trace",
            Self::MetadataRead => "metadata_read",
            Self::PackageInfo => "package_info",
            Self::PackageList => "package_list",
        })
    }
}

/// Handler applying one concealment surface to intercepted calls
#[derive(Debug, Clone)]
pub struct ConcealmentHook {
    surface: ConcealmentSurface,
    concealer: Arc<Concealer>,
}

impl ConcealmentHook {
    pub fn new(surface: ConcealmentSurface, concealer: Arc<Concealer>) -> Self {
        Self { surface, concealer }
    }

    pub fn surface(&self) -> ConcealmentSurface {
        self.surface
    }

    fn stack_trace(&self, result: Option<&CallResult>) -> HandlerResult {
        let Some(Value::Array(items)) = result.and_then(CallResult::value) else {
            return Ok(InterceptOutcome::PassThrough);
        };

        let as_strings = items.iter().all(Value::is_string);
        let frames = items
            .iter()
            .map(|item| match item {
                Value::String(symbol) => Ok(StackFrame::new(symbol.as_str())),
                other => serde_json::from_value(other.clone()),
            })
            .collect::<Result<Vec<StackFrame>, _>>()
            .map_err(|e| MaskError::HandlerFault {
                site: self.surface.to_string(),
                reason: format!("unreadable stack frame: {}", e),
            })?;

        let before = frames.len();
        let kept = self.concealer.stack().filter(frames);
        if kept.len() == before {
            return Ok(InterceptOutcome::PassThrough);
        }

        let filtered = if as_strings {
            kept.into_iter().map(|f| Value::String(f.symbol)).collect()
        } else {
            kept.into_iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<Value>, _>>()
                .map_err(|e| MaskError::HandlerFault {
                    site: self.surface.to_string(),
                    reason: e.to_string(),
                })?
        };
        Ok(InterceptOutcome::Found(Value::Array(filtered)))
    }

    fn metadata_read(&self, args: &[Value], result: Option<&CallResult>) -> HandlerResult {
        if let Some(path) = args.first().and_then(Value::as_str) {
            if !MetadataFilter::applies_to(path) {
                return Ok(InterceptOutcome::PassThrough);
            }
        }
        match result.and_then(CallResult::value).and_then(Value::as_str) {
            Some(line) if self.concealer.metadata().is_concealed(line) => {
                Ok(InterceptOutcome::Found(Value::String(String::new())))
            }
            _ => Ok(InterceptOutcome::PassThrough),
        }
    }

    fn package_info(&self, args: &[Value]) -> HandlerResult {
        match args.first().and_then(Value::as_str) {
            Some(package) => Ok(self.concealer.packages().package_info(package)),
            None => Ok(InterceptOutcome::PassThrough),
        }
    }

    fn package_list(&self, result: Option<&CallResult>) -> HandlerResult {
        let Some(Value::Array(items)) = result.and_then(CallResult::value) else {
            return Ok(InterceptOutcome::PassThrough);
        };

        let packages = self.concealer.packages();
        let kept: Vec<Value> = items
            .iter()
            .filter(|item| {
                let name = match item {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(map) => map
                        .get("package")
                        .or_else(|| map.get("packageName"))
                        .and_then(Value::as_str),
                    _ => None,
                };
                !name.is_some_and(|n| packages.is_hidden(n))
            })
            .cloned()
            .collect();

        if kept.len() == items.len() {
            Ok(InterceptOutcome::PassThrough)
        } else {
            Ok(InterceptOutcome::Found(Value::Array(kept)))
        }
    }
}

impl HookHandler for ConcealmentHook {
    fn handle(&self, call: &mut Invocation<'_>) -> HandlerResult {
        match self.surface {
            ConcealmentSurface::StackTrace => self.stack_trace(call.result.as_ref()),
            ConcealmentSurface::MetadataRead => self.metadata_read(&call.args, call.result.as_ref()),
            ConcealmentSurface::PackageInfo => self.package_info(&call.args),
            ConcealmentSurface::PackageList => self.package_list(call.result.as_ref()),
        }
    }
}
