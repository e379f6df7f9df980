use crate::config::SnapshotStore;
use crate::error::MaskError;
use crate::interception::host::HookHost;
use crate::interception::site::{HookSite, Stage};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Failure raised by an intercepted call, in host terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostFailure {
    /// The platform's "no such entity" convention (e.g. a missing package)
    NotFound,
    Error(String),
}

/// What an intercepted call hands back to its caller
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    Returned(Value),
    Threw(HostFailure),
}

impl CallResult {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Returned(v) => Some(v),
            Self::Threw(_) => None,
        }
    }
}

/// Handler verdict at the interception boundary
#[derive(Debug, Clone, PartialEq)]
pub enum InterceptOutcome {
    /// Report this value instead
    Found(Value),
    /// Report the platform's not-found failure
    NotFound,
    /// No override
    PassThrough,
}

impl InterceptOutcome {
    fn into_call_result(self) -> Option<CallResult> {
        match self {
            Self::Found(v) => Some(CallResult::Returned(v)),
            Self::NotFound => Some(CallResult::Threw(HostFailure::NotFound)),
            Self::PassThrough => None,
        }
    }
}

/// One execution of an intercepted call, as seen by a handler
#[derive(Debug)]
pub struct Invocation<'a> {
    /// Site the running handler was registered for
    pub site: &'a HookSite,
    /// Calling application identity
    pub caller: &'a str,
    /// Arguments; `before` handlers may rewrite them
    pub args: Vec<Value>,
    /// Result so far. `None` before the original call has run.
    pub result: Option<CallResult>,
}

pub type HandlerResult = Result<InterceptOutcome, MaskError>;

/// Code run when an intercepted call executes
pub trait HookHandler: Send + Sync {
    fn handle(&self, call: &mut Invocation<'_>) -> HandlerResult;
}

impl<F> HookHandler for F
where
    F: Fn(&mut Invocation<'_>) -> HandlerResult + Send + Sync,
{
    fn handle(&self, call: &mut Invocation<'_>) -> HandlerResult {
        self(call)
    }
}

/// Result of registering one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationResult {
    Ok,
    Failed(String),
}

impl RegistrationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Outcome of registering a batch of sites
#[derive(Debug, Clone, Default)]
pub struct RegistrationReport {
    pub registered: Vec<HookSite>,
    pub failed: Vec<(HookSite, String)>,
}

impl RegistrationReport {
    pub fn record(&mut self, site: HookSite, result: RegistrationResult) {
        match result {
            RegistrationResult::Ok => self.registered.push(site),
            RegistrationResult::Failed(reason) => self.failed.push((site, reason)),
        }
    }

    pub fn total(&self) -> usize {
        self.registered.len() + self.failed.len()
    }
}

struct Registered {
    site: HookSite,
    handler: Arc<dyn HookHandler>,
}

/// Installs hooks and runs their handlers when the target call executes
///
/// Handlers are grouped by call key; every stage of one call shares the
/// group and runs in registration order. Nothing a handler does can fail
/// the host call: errors and panics are logged and read as "no override".
pub struct InterceptionRegistry {
    host: Arc<dyn HookHost>,
    store: Arc<SnapshotStore>,
    handlers: RwLock<HashMap<String, Vec<Registered>>>,
}

impl InterceptionRegistry {
    pub fn new(host: Arc<dyn HookHost>, store: Arc<SnapshotStore>) -> Self {
        Self {
            host,
            store,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Install `site` with the host and attach `handler` to it
    pub fn register(&self, site: HookSite, handler: Arc<dyn HookHandler>) -> RegistrationResult {
        let installed = site.validate().and_then(|()| {
            // Host integrations may panic on unexpected platform state
            panic::catch_unwind(AssertUnwindSafe(|| self.host.install(&site)))
                .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())))
        });

        if let Err(reason) = installed {
            let err = MaskError::RegistrationFailure {
                site: site.to_string(),
                reason: reason.clone(),
            };
            warn!(target: "idveil::interception", "{}", err);
            return RegistrationResult::Failed(reason);
        }

        debug!(target: "idveil::interception", "Registered {}", site);
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers
            .entry(site.call_key())
            .or_default()
            .push(Registered { site, handler });
        RegistrationResult::Ok
    }

    /// Register every pair; failures are recorded and skipped
    pub fn register_all<I>(&self, sites: I) -> RegistrationReport
    where
        I: IntoIterator<Item = (HookSite, Arc<dyn HookHandler>)>,
    {
        let mut report = RegistrationReport::default();
        for (site, handler) in sites {
            let result = self.register(site.clone(), handler);
            report.record(site, result);
        }
        info!(
            target: "idveil::interception",
            "Registered {}/{} hook sites",
            report.registered.len(),
            report.total()
        );
        report
    }

    /// Number of handlers attached to a call key
    pub fn handler_count(&self, call_key: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(call_key)
            .map_or(0, Vec::len)
    }

    pub fn call_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Execute an intercepted call
    ///
    /// `original` performs the real call. It runs at most once, and not at
    /// all when a `before` handler short-circuits or a `replace` handler
    /// supplies the result.
    pub fn invoke<F>(&self, call_key: &str, caller: &str, args: Vec<Value>, original: F) -> CallResult
    where
        F: FnOnce(&[Value]) -> CallResult,
    {
        if !self.store.current().module_enabled {
            return original(&args);
        }

        // Clone the handler list so no lock is held while handlers run;
        // a handler may itself trigger intercepted calls.
        let group: Option<Vec<(HookSite, Arc<dyn HookHandler>)>> = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers.get(call_key).map(|list| {
                list.iter()
                    .map(|r| (r.site.clone(), Arc::clone(&r.handler)))
                    .collect()
            })
        };
        let Some(group) = group else {
            return original(&args);
        };

        let mut args = args;
        let mut result: Option<CallResult> = None;

        for (site, handler) in group.iter().filter(|(s, _)| s.stage == Stage::Before) {
            let mut call = Invocation {
                site,
                caller,
                args: args.clone(),
                result: None,
            };
            let outcome = run_guarded(handler.as_ref(), &mut call);
            if outcome.is_some() {
                // Keep rewritten arguments only from handlers that completed
                args = call.args;
            }
            if let Some(short) = outcome.and_then(InterceptOutcome::into_call_result) {
                result = Some(short);
                break;
            }
        }

        if result.is_none() {
            // First replace handler with an answer wins; the rest are skipped
            let replacement = group
                .iter()
                .filter(|(s, _)| s.stage == Stage::Replace)
                .find_map(|(site, handler)| {
                    let mut call = Invocation {
                        site,
                        caller,
                        args: args.clone(),
                        result: None,
                    };
                    run_guarded(handler.as_ref(), &mut call)
                        .and_then(InterceptOutcome::into_call_result)
                });
            result = Some(replacement.unwrap_or_else(|| original(&args)));
        }

        let mut result = result.unwrap_or(CallResult::Returned(Value::Null));
        for (site, handler) in group.iter().filter(|(s, _)| s.stage == Stage::After) {
            let mut call = Invocation {
                site,
                caller,
                args: args.clone(),
                result: Some(result.clone()),
            };
            if let Some(overridden) =
                run_guarded(handler.as_ref(), &mut call).and_then(InterceptOutcome::into_call_result)
            {
                result = overridden;
            }
        }
        result
    }
}

impl std::fmt::Debug for InterceptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionRegistry")
            .field("call_keys", &self.call_keys())
            .finish()
    }
}

/// Run one handler; `None` means it faulted
fn run_guarded(handler: &dyn HookHandler, call: &mut Invocation<'_>) -> Option<InterceptOutcome> {
    let site = call.site.to_string();
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(call))) {
        Ok(Ok(outcome)) => Some(outcome),
        Ok(Err(err)) => {
            log_fault(site, err.to_string());
            None
        }
        Err(payload) => {
            log_fault(site, panic_message(payload.as_ref()));
            None
        }
    }
}

fn log_fault(site: String, reason: String) {
    let err = MaskError::HandlerFault { site, reason };
    warn!(target: "idveil::interception", "{}; passing original result through", err);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSnapshot;
    use crate::interception::host::MethodTable;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KEY: &str = "a.Phone#getImei()";

    fn site(stage: Stage) -> HookSite {
        HookSite::new("a.Phone", "getImei", stage)
    }

    fn registry() -> InterceptionRegistry {
        let host = MethodTable::new().with_method(KEY);
        InterceptionRegistry::new(Arc::new(host), Arc::new(SnapshotStore::default()))
    }

    fn real(_: &[Value]) -> CallResult {
        CallResult::Returned(json!("real"))
    }

    fn fixed(v: &'static str) -> Arc<dyn HookHandler> {
        Arc::new(move |_: &mut Invocation<'_>| -> HandlerResult {
            Ok(InterceptOutcome::Found(json!(v)))
        })
    }

    #[test]
    fn test_unhooked_call_passes_through() {
        let registry = registry();
        assert_eq!(
            registry.invoke(KEY, "com.a", vec![], real),
            CallResult::Returned(json!("real"))
        );
    }

    #[test]
    fn test_after_overrides_result() {
        let registry = registry();
        assert!(registry.register(site(Stage::After), fixed("masked")).is_ok());
        assert_eq!(
            registry.invoke(KEY, "com.a", vec![], real),
            CallResult::Returned(json!("masked"))
        );
    }

    #[test]
    fn test_after_handlers_run_in_registration_order() {
        let registry = registry();
        registry.register(site(Stage::After), fixed("first"));
        registry.register(site(Stage::After), fixed("second"));
        assert_eq!(
            registry.invoke(KEY, "com.a", vec![], real),
            CallResult::Returned(json!("second"))
        );
        assert_eq!(registry.handler_count(KEY), 2);
    }

    #[test]
    fn test_before_short_circuit_skips_original() {
        let registry = registry();
        registry.register(
            site(Stage::Before),
            Arc::new(|_: &mut Invocation<'_>| -> HandlerResult {
                Ok(InterceptOutcome::NotFound)
            }),
        );
        let calls = AtomicUsize::new(0);
        let result = registry.invoke(KEY, "com.a", vec![], |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            real(&[])
        });
        assert_eq!(result, CallResult::Threw(HostFailure::NotFound));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_before_rewrites_arguments() {
        let registry = registry();
        registry.register(
            site(Stage::Before),
            Arc::new(|call: &mut Invocation<'_>| -> HandlerResult {
                call.args[0] = json!(1);
                Ok(InterceptOutcome::PassThrough)
            }),
        );
        let result = registry.invoke(KEY, "com.a", vec![json!(0)], |args| {
            CallResult::Returned(args[0].clone())
        });
        assert_eq!(result, CallResult::Returned(json!(1)));
    }

    #[test]
    fn test_replace_skips_original() {
        let registry = registry();
        registry.register(site(Stage::Replace), fixed("replaced"));
        let result = registry.invoke(KEY, "com.a", vec![], |_| panic!("original must not run"));
        assert_eq!(result, CallResult::Returned(json!("replaced")));
    }

    fn replace_for(key: &'static str, value: &'static str) -> Arc<dyn HookHandler> {
        Arc::new(move |call: &mut Invocation<'_>| -> HandlerResult {
            if call.args.first().and_then(Value::as_str) == Some(key) {
                Ok(InterceptOutcome::Found(json!(value)))
            } else {
                Ok(InterceptOutcome::PassThrough)
            }
        })
    }

    #[test]
    fn test_replace_handlers_tried_in_registration_order() {
        let registry = registry();
        registry.register(site(Stage::Replace), replace_for("android_id", "A"));
        registry.register(site(Stage::Replace), replace_for("gsf_id", "G"));

        assert_eq!(
            registry.invoke(KEY, "com.a", vec![json!("gsf_id")], real),
            CallResult::Returned(json!("G"))
        );
        assert_eq!(
            registry.invoke(KEY, "com.a", vec![json!("android_id")], real),
            CallResult::Returned(json!("A"))
        );
        // Nobody answers: the original runs
        assert_eq!(
            registry.invoke(KEY, "com.a", vec![json!("bluetooth_name")], real),
            CallResult::Returned(json!("real"))
        );
    }

    #[test]
    fn test_first_answering_replace_wins() {
        let registry = registry();
        registry.register(site(Stage::Replace), fixed("first"));
        registry.register(site(Stage::Replace), fixed("second"));
        let result = registry.invoke(KEY, "com.a", vec![], |_| panic!("original must not run"));
        assert_eq!(result, CallResult::Returned(json!("first")));
    }

    #[test]
    fn test_handler_error_passes_through() {
        let registry = registry();
        registry.register(
            site(Stage::After),
            Arc::new(|_: &mut Invocation<'_>| -> HandlerResult {
                Err(MaskError::InvalidConfig("broken".into()))
            }),
        );
        assert_eq!(
            registry.invoke(KEY, "com.a", vec![], real),
            CallResult::Returned(json!("real"))
        );
    }

    #[test]
    fn test_handler_panic_passes_through() {
        let registry = registry();
        registry.register(
            site(Stage::Before),
            Arc::new(|call: &mut Invocation<'_>| -> HandlerResult {
                call.args.clear();
                panic!("boom")
            }),
        );
        let result = registry.invoke(KEY, "com.a", vec![json!(7)], |args| {
            CallResult::Returned(args[0].clone())
        });
        // Arguments touched by the faulting handler are discarded
        assert_eq!(result, CallResult::Returned(json!(7)));
    }

    #[test]
    fn test_module_disabled_skips_handlers() {
        let store = Arc::new(SnapshotStore::new(
            ConfigSnapshot::default().with_module_enabled(false),
        ));
        let registry =
            InterceptionRegistry::new(Arc::new(MethodTable::new().with_method(KEY)), store);
        registry.register(site(Stage::After), fixed("masked"));
        assert_eq!(
            registry.invoke(KEY, "com.a", vec![], real),
            CallResult::Returned(json!("real"))
        );
    }

    #[test]
    fn test_registration_failure_isolated() {
        let registry = registry();
        let missing = HookSite::new("a.Phone", "getMeid", Stage::After);
        let malformed = HookSite::new("a.Phone", "get Imei", Stage::After);
        let report = registry.register_all(vec![
            (missing, fixed("x")),
            (malformed, fixed("x")),
            (site(Stage::After), fixed("masked")),
        ]);
        assert_eq!(report.registered.len(), 1);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(
            registry.invoke(KEY, "com.a", vec![], real),
            CallResult::Returned(json!("masked"))
        );
    }
}
