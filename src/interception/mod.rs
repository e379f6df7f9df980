// Interception registry
//
// The platform integration layer supplies a fixed HookCatalog at startup and
// a HookHost that physically installs hooks. The registry attaches handlers
// to each site and, when a hooked call executes, runs them by stage:
//
//   before  -> may rewrite arguments or short-circuit with a result
//   replace -> first one owns the result; the original call is skipped
//   after   -> sees the real result, may override it
//
// Handler errors and panics never reach the host application: they are
// logged and the original result passes through.

mod catalog;
mod host;
mod identity_hook;
mod registry;
mod site;

pub use catalog::{CatalogEntry, HookCatalog, HookTarget};
pub use host::{HookHost, MethodTable};
pub use identity_hook::IdentityHook;
pub use registry::{
    CallResult, HandlerResult, HookHandler, HostFailure, InterceptOutcome, InterceptionRegistry,
    Invocation, RegistrationReport, RegistrationResult,
};
pub use site::{HookSite, Stage};
