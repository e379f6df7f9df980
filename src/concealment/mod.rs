// Self-concealment
//
// Hides the interception machinery from introspection inside the hosted
// process on three surfaces:
//   - captured stacks     (stack::StackFilter, thread-local re-entrancy guard)
//   - metadata file reads (maps::MetadataFilter, per line)
//   - package queries     (packages::PackageFilter)
//
// Namespaces on the allowlist are never filtered. guard::ProcessGuard is the
// startup check that keeps the engine out of protected processes entirely.

mod guard;
mod hook;
mod maps;
mod packages;
mod policy;
mod stack;

pub use guard::{ProcessGuard, ProcessIdentity, PROTECTED_PROCESSES};
pub use hook::{ConcealmentHook, ConcealmentSurface};
pub use maps::{MetadataFilter, METADATA_PATHS};
pub use packages::{PackageEntry, PackageFilter};
pub use policy::ConcealmentPolicy;
pub use stack::{
    BacktraceCapture, ConcealedStack, ReentrancyGuard, StackFilter, StackFrame, StackSource,
};

use crate::error::MaskError;
use std::sync::Arc;

/// The three filters built from one policy
#[derive(Debug)]
pub struct Concealer {
    stack: Arc<StackFilter>,
    metadata: MetadataFilter,
    packages: PackageFilter,
}

impl Concealer {
    pub fn new(policy: &ConcealmentPolicy) -> Result<Self, MaskError> {
        Ok(Self {
            stack: Arc::new(StackFilter::new(policy)?),
            metadata: MetadataFilter::new(policy),
            packages: PackageFilter::new(policy),
        })
    }

    pub fn stack(&self) -> &Arc<StackFilter> {
        &self.stack
    }

    pub fn metadata(&self) -> &MetadataFilter {
        &self.metadata
    }

    pub fn packages(&self) -> &PackageFilter {
        &self.packages
    }

    /// Stack capture of the calling thread with concealed frames removed
    pub fn capture_stack(&self) -> Vec<StackFrame> {
        ConcealedStack::new(BacktraceCapture, Arc::clone(&self.stack)).capture()
    }
}
