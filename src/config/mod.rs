// Configuration boundary
//
// Two layers:
//   - ConfigSnapshot: profiles, app assignments and the global switch. Immutable,
//     versioned, published whole through SnapshotStore.
//   - EngineConfig: static TOML settings read once at attach time.

mod engine_config;
mod profile;
mod snapshot;
mod store;

pub use engine_config::{EngineConfig, DEFAULT_SELF_PACKAGE};
pub use profile::{now_millis, AppAssignment, IdentifierRecord, Profile};
pub use snapshot::ConfigSnapshot;
pub use store::SnapshotStore;
