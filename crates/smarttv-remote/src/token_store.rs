//! Persistence of pairing tokens.
//!
//! A token is stored per application scope (the configured `app_name`).
//! Pairing a second TV under the same scope replaces the first TV's token.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::{RemoteError, RemoteResult};

/// Storage for pairing tokens, keyed by application scope.
pub trait TokenStore: Send + Sync {
    fn load(&self, scope: &str) -> RemoteResult<Option<String>>;
    fn save(&self, scope: &str, token: &str) -> RemoteResult<()>;
    fn clear(&self, scope: &str) -> RemoteResult<()>;
}

/// One JSON object on disk, `{ "<scope>": "<token>" }`.
///
/// Writes go to a sibling temp file that is renamed over the target, and all
/// access is serialized through one lock.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> RemoteResult<BTreeMap<String, String>> {
        self.parse(&self.read_contents()?)
    }

    fn read_contents(&self) -> RemoteResult<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(RemoteError::TokenStore {
                reason: format!("failed to read '{}': {e}", self.path.display()),
            }),
        }
    }

    fn parse(&self, contents: &str) -> RemoteResult<BTreeMap<String, String>> {
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(contents).map_err(|e| RemoteError::TokenStore {
            reason: format!("'{}' is not a token map: {e}", self.path.display()),
        })
    }

    fn write_all(&self, tokens: &BTreeMap<String, String>) -> RemoteResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = serde_json::to_string_pretty(tokens)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, rendered)?;
        std::fs::rename(&tmp, &self.path).map_err(|e| RemoteError::TokenStore {
            reason: format!("failed to replace '{}': {e}", self.path.display()),
        })
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, scope: &str) -> RemoteResult<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(scope))
    }

    fn save(&self, scope: &str, token: &str) -> RemoteResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        // A corrupt map is overwritten on save.
        let mut tokens = self.parse(&self.read_contents()?).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding corrupt token file");
            BTreeMap::new()
        });
        tokens.insert(scope.to_string(), token.to_string());
        self.write_all(&tokens)?;
        tracing::debug!(scope, path = %self.path.display(), "Pairing token saved");
        Ok(())
    }

    fn clear(&self, scope: &str) -> RemoteResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut tokens = self.read_all()?;
        if tokens.remove(scope).is_some() {
            self.write_all(&tokens)?;
        }
        Ok(())
    }
}

/// In-process store, for tests and for callers that do not persist tokens.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, scope: &str) -> RemoteResult<Option<String>> {
        let tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tokens.get(scope).cloned())
    }

    fn save(&self, scope: &str, token: &str) -> RemoteResult<()> {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens.insert(scope.to_string(), token.to_string());
        Ok(())
    }

    fn clear(&self, scope: &str) -> RemoteResult<()> {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens.remove(scope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir(label: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "smarttv-token-tests-{}-{}-{}",
            label,
            std::process::id(),
            now
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_file_store_round_trip_per_scope() {
        let dir = unique_temp_dir("scopes");
        let store = FileTokenStore::new(dir.join("nested").join("tokens.json"));

        assert_eq!(store.load("SmartRemote").unwrap(), None);
        store.save("SmartRemote", "ABC123").unwrap();
        store.save("Other", "XYZ").unwrap();
        store.save("SmartRemote", "DEF456").unwrap();

        let reopened = FileTokenStore::new(store.path());
        assert_eq!(reopened.load("SmartRemote").unwrap().as_deref(), Some("DEF456"));
        assert_eq!(reopened.load("Other").unwrap().as_deref(), Some("XYZ"));

        reopened.clear("Other").unwrap();
        assert_eq!(store.load("Other").unwrap(), None);
        assert!(!store.path().with_extension("json.tmp").exists());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = unique_temp_dir("corrupt");
        let path = dir.join("tokens.json");
        fs::write(&path, "not json").unwrap();
        let store = FileTokenStore::new(&path);
        assert!(matches!(store.load("x"), Err(RemoteError::TokenStore { .. })));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_save_repairs_truncated_file() {
        let dir = unique_temp_dir("truncated");
        let path = dir.join("tokens.json");
        fs::write(&path, r#"{"SmartRemote": "AB"#).unwrap();
        let store = FileTokenStore::new(&path);

        store.save("SmartRemote", "ABC123").unwrap();

        assert_eq!(store.load("SmartRemote").unwrap().as_deref(), Some("ABC123"));
        let on_disk: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 1);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::new();
        store.save("a", "1").unwrap();
        assert_eq!(store.load("a").unwrap().as_deref(), Some("1"));
        store.clear("a").unwrap();
        assert_eq!(store.load("a").unwrap(), None);
    }
}
