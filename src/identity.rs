use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::warn;

use crate::model::Identity;

/// Storage key for the single identity slot. Explicit so other slots can
/// coexist later.
pub const IDENTITY_KEY: &str = "comments.identity";

/// Key-value persistence as exposed by the hosting device (browser local
/// storage, a dotfile, ...). Best effort: implementations log and swallow
/// I/O problems rather than failing a submission over a pre-fill nicety.
pub trait LocalPersistence: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

#[derive(Default)]
pub struct MemPersistence {
    inner: Mutex<HashMap<String, String>>,
}

impl MemPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalPersistence for MemPersistence {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.remove(key);
        }
    }
}

/// JSON map in a single file, read-modify-write per call. Fine for the
/// one-slot, one-device use this serves.
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> HashMap<String, String> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => HashMap::new(),
        }
    }

    fn save(&self, map: &HashMap<String, String>) {
        let raw = match serde_json::to_string(map) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "failed to serialize local persistence");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, raw) {
            warn!(path = %self.path.display(), error = %e, "failed to write local persistence");
        }
    }
}

impl LocalPersistence for FilePersistence {
    fn get(&self, key: &str) -> Option<String> {
        self.load().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut map = self.load();
        map.insert(key.to_string(), value.to_string());
        self.save(&map);
    }

    fn remove(&self, key: &str) {
        let mut map = self.load();
        if map.remove(key).is_some() {
            self.save(&map);
        }
    }
}

/// Remembers the last successful submitter so later submissions pre-fill
/// and later deletes can present the same identity. Overwritten on every
/// accepted submission; `clear` exists for shared devices.
pub struct ClientIdentityCache<P: LocalPersistence> {
    store: P,
}

impl<P: LocalPersistence> ClientIdentityCache<P> {
    pub fn new(store: P) -> Self {
        Self { store }
    }

    pub fn set(&self, identity: &Identity) {
        match serde_json::to_string(identity) {
            Ok(raw) => self.store.set(IDENTITY_KEY, &raw),
            Err(e) => warn!(error = %e, "failed to serialize identity"),
        }
    }

    pub fn get(&self) -> Option<Identity> {
        let raw = self.store.get(IDENTITY_KEY)?;
        serde_json::from_str(&raw).ok()
    }

    pub fn clear(&self) {
        self.store.remove(IDENTITY_KEY);
    }
}
