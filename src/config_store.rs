//! Read-modify-write access to the node's JSON config file.
//!
//! The file belongs to the node binary. Warden only rewrites it while no
//! daemon is running, between `init` and `daemon`.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::error::{Result, WardenError};

/// The node's config document: always a top-level JSON object.
pub type NodeConfig = Map<String, Value>;

pub const REQUIRED_ORIGINS: [&str; 2] = ["https://sweetipfswebui.netlify.com", "http://127.0.0.1:5001"];
pub const REQUIRED_METHODS: [&str; 3] = ["PUT", "GET", "POST"];

const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
const ALLOW_METHODS: &str = "Access-Control-Allow-Methods";

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<NodeConfig> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.unreadable(e.to_string()))?;

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(config)) => Ok(config),
            Ok(_) => Err(self.unreadable("top-level value is not an object".to_string())),
            Err(e) => Err(self.unreadable(e.to_string())),
        }
    }

    /// Overwrites the file with the pretty-printed config in a single write.
    pub async fn write(&self, config: &NodeConfig) -> Result<()> {
        let data = serde_json::to_string_pretty(config).map_err(|e| WardenError::ConfigWriteFailed {
            path: self.path.clone(),
            source: e.into(),
        })?;

        tokio::fs::write(&self.path, data.as_bytes())
            .await
            .map_err(|source| WardenError::ConfigWriteFailed {
                path: self.path.clone(),
                source,
            })?;

        trace!(path = %self.path.display(), bytes = data.len(), "Node config written");
        Ok(())
    }

    /// Reads the config, lets `mutator` edit it in place, writes it back.
    /// Nothing is written if the mutator fails.
    pub async fn patch<F>(&self, mutator: F) -> Result<NodeConfig>
    where
        F: FnOnce(&mut NodeConfig) -> Result<()>,
    {
        let mut config = self.read().await?;
        mutator(&mut config)?;
        self.write(&config).await?;
        debug!(path = %self.path.display(), "Node config patched");
        Ok(config)
    }

    fn unreadable(&self, detail: String) -> WardenError {
        WardenError::ConfigUnreadable {
            path: self.path.clone(),
            detail,
        }
    }
}

/// Create-if-absent containers and lenient scalar getters on a JSON object.
pub trait JsonObjectExt {
    /// Nested object at `key`, inserted empty if absent.
    fn object(&mut self, key: &str) -> Result<&mut Map<String, Value>>;

    /// Nested array at `key`, inserted empty if absent.
    fn array(&mut self, key: &str) -> Result<&mut Vec<Value>>;

    fn string(&self, key: &str) -> Option<&str>;
    fn int(&self, key: &str) -> Option<i64>;
    fn boolean(&self, key: &str) -> Option<bool>;
}

impl JsonObjectExt for Map<String, Value> {
    fn object(&mut self, key: &str) -> Result<&mut Map<String, Value>> {
        self.entry(key)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| WardenError::UnexpectedConfigShape {
                key: key.to_string(),
                expected: "an object",
            })
    }

    fn array(&mut self, key: &str) -> Result<&mut Vec<Value>> {
        self.entry(key)
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| WardenError::UnexpectedConfigShape {
                key: key.to_string(),
                expected: "an array",
            })
    }

    fn string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    fn boolean(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }
}

/// Appends each entry that is not already present, preserving order.
/// Returns how many entries were added.
pub fn ensure_entries<I, S>(array: &mut Vec<Value>, entries: I) -> usize
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut added = 0;
    for entry in entries {
        let value = Value::String(entry.into());
        if !array.contains(&value) {
            array.push(value);
            added += 1;
        }
    }
    added
}

/// Origins and methods that must appear under `API.HTTPHeaders`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    pub origins: Vec<String>,
    pub methods: Vec<String>,
}

impl CorsPolicy {
    pub fn with_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for origin in origins {
            let origin = origin.into();
            if !self.origins.contains(&origin) {
                self.origins.push(origin);
            }
        }
        self
    }

    /// Idempotent: re-applying never duplicates entries, and unrelated
    /// content is left untouched.
    pub fn apply(&self, config: &mut NodeConfig) -> Result<()> {
        let headers = config.object("API")?.object("HTTPHeaders")?;

        let origins = ensure_entries(headers.array(ALLOW_ORIGIN)?, self.origins.iter().cloned());
        let methods = ensure_entries(headers.array(ALLOW_METHODS)?, self.methods.iter().cloned());

        debug!(origins, methods, "Applied API header policy");
        Ok(())
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            origins: REQUIRED_ORIGINS.iter().map(|s| s.to_string()).collect(),
            methods: REQUIRED_METHODS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
