use crate::identifier::IdentifierType;
use crate::resolver::Resolution;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;

/// Marker owner for session-scoped fallback values
pub const SESSION_OWNER: &str = "__session__";

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    entries: HashMap<(String, IdentifierType), Resolution>,
}

/// Per-process resolution state
///
/// Holds the session salt used for fallback values and the cache of values
/// already handed out. The cache is keyed by the store's publish generation:
/// the first lookup after a snapshot replacement clears it and everything is
/// resolved again from the new snapshot.
#[derive(Debug)]
pub struct ResolutionContext {
    session_salt: u64,
    cache: Mutex<CacheState>,
}

impl ResolutionContext {
    /// Context with a random session salt
    pub fn new() -> Self {
        Self::with_session_salt(rand::thread_rng().gen())
    }

    /// Context with a fixed salt, for reproducible fallback values
    pub fn with_session_salt(session_salt: u64) -> Self {
        Self {
            session_salt,
            cache: Mutex::new(CacheState::default()),
        }
    }

    pub fn session_salt(&self) -> u64 {
        self.session_salt
    }

    pub fn cached(&self, generation: u64, app: &str, ty: IdentifierType) -> Option<Resolution> {
        let mut state = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if state.generation != generation {
            if generation > state.generation {
                state.entries.clear();
                state.generation = generation;
            }
            return None;
        }
        state.entries.get(&(app.to_string(), ty)).cloned()
    }

    pub fn store(&self, generation: u64, app: &str, ty: IdentifierType, resolution: &Resolution) {
        let mut state = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if state.generation != generation {
            // Resolved against a snapshot that has since been replaced
            if generation < state.generation {
                return;
            }
            state.entries.clear();
            state.generation = generation;
        }
        state
            .entries
            .insert((app.to_string(), ty), resolution.clone());
    }

    pub fn clear(&self) {
        let mut state = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self::new()
    }
}
