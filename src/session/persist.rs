//! Persisted session projection
//!
//! A deliberately narrow subset of the session survives restarts: the
//! `authenticated` flag and the resolved identity. The access token itself
//! is never written anywhere, so a fresh process always has to complete a
//! refresh (or a login) before the session is usable for authorized calls.

use crate::error::Result;
use crate::session::Identity;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const AUTHENTICATED_KEY: &str = "authenticated";
pub const IDENTITY_KEY: &str = "identity";

/// Durable key-value surface backing the projection
pub trait ProjectionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// The restorable slice of session state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedSession {
    pub authenticated: bool,
    pub identity: Option<Identity>,
}

/// Write the projection for the given session state
pub fn save_projection(
    storage: &dyn ProjectionStorage,
    authenticated: bool,
    identity: Option<&Identity>,
) -> Result<()> {
    if authenticated {
        storage.set(AUTHENTICATED_KEY, "true")?;
    } else {
        storage.remove(AUTHENTICATED_KEY)?;
    }
    match identity {
        Some(identity) => storage.set(IDENTITY_KEY, &serde_json::to_string(identity)?)?,
        None => storage.remove(IDENTITY_KEY)?,
    }
    Ok(())
}

/// Read the projection back, tolerating an empty or unreadable identity.
///
/// A corrupt identity entry downgrades to an unauthenticated projection
/// instead of failing startup.
pub fn load_projection(storage: &dyn ProjectionStorage) -> Result<PersistedSession> {
    let authenticated = storage
        .get(AUTHENTICATED_KEY)?
        .map(|v| v == "true")
        .unwrap_or(false);
    let identity = storage
        .get(IDENTITY_KEY)?
        .and_then(|raw| serde_json::from_str(&raw).ok());

    if authenticated && identity.is_some() {
        Ok(PersistedSession {
            authenticated: true,
            identity,
        })
    } else {
        Ok(PersistedSession::default())
    }
}

/// Projection storage backed by a single JSON object on disk
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_map(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        let value: Value = serde_json::from_str(&content)?;
        Ok(value.as_object().cloned().unwrap_or_default())
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(map.clone()))?)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProjectionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.read_map()?;
        Ok(map.get(key).and_then(|v| v.as_str()).map(str::to_string))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// In-memory projection storage for tests
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
