//! Key-value preference store
//!
//! A small persistent document of JSON values keyed by name. Services get
//! a store injected instead of reaching for a process-wide singleton.
//!
//! `JsonFilePreferences` keeps one JSON object per file and rewrites it
//! atomically (temp file + rename) on every change.

use anyhow::Context;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;

    fn put(&self, key: &str, value: Value) -> anyhow::Result<()>;

    /// Returns true if the key existed
    fn remove(&self, key: &str) -> anyhow::Result<bool>;
}

/// Preferences persisted as a single JSON object on disk
pub struct JsonFilePreferences {
    path: PathBuf,
    /// Cached document; the file is only read once
    doc: Mutex<Map<String, Value>>,
}

impl JsonFilePreferences {
    /// Open (or lazily create) a preference file
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let doc = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read preferences {}", path.display()))?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                match serde_json::from_str::<Value>(&content)
                    .with_context(|| format!("Failed to parse preferences {}", path.display()))?
                {
                    Value::Object(map) => map,
                    other => {
                        warn!(
                            path = %path.display(),
                            kind = %json_kind(&other),
                            "preferences_not_an_object"
                        );
                        Map::new()
                    }
                }
            }
        } else {
            Map::new()
        };

        info!(path = %path.display(), keys = %doc.len(), "preferences_opened");
        Ok(Self { path, doc: Mutex::new(doc) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, doc: &Map<String, Value>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let json = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes())
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), bytes = %json.len(), "preferences_flushed");
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.doc.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> anyhow::Result<()> {
        let mut doc = self.doc.lock();
        let previous = doc.insert(key.to_string(), value);
        if let Err(e) = self.flush(&doc) {
            // Keep memory and disk consistent
            match previous {
                Some(v) => doc.insert(key.to_string(), v),
                None => doc.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<bool> {
        let mut doc = self.doc.lock();
        let Some(previous) = doc.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = self.flush(&doc) {
            doc.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(true)
    }
}

/// In-memory preferences (tests, dry runs)
#[derive(Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> anyhow::Result<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.values.lock().remove(key).is_some())
    }
}
