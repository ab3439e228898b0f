//! Resumption store: remembers which session URL belongs to which upload.
//!
//! Entries map an upload fingerprint to the URL the server assigned when
//! the session was created. A later process looks the fingerprint up and
//! resumes the session instead of starting over. There is no expiry; stale
//! entries are detected and replaced by the protocol client.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

/// Errors from resumption store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key-value storage of fingerprint -> session URL.
///
/// Implementations must be safe to share between executors; each call is
/// atomic with respect to the others.
pub trait UrlStore: Send + Sync {
    /// Returns the session URL stored for `fingerprint`, if any.
    fn get(&self, fingerprint: &str) -> Option<String>;

    /// Stores (or replaces) the session URL for `fingerprint`.
    fn put(&self, fingerprint: &str, url: &str) -> Result<(), StoreError>;

    /// Forgets `fingerprint`. Removing an absent key is not an error.
    fn remove(&self, fingerprint: &str) -> Result<(), StoreError>;
}

/// Store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryUrlStore {
    urls: Mutex<HashMap<String, String>>,
}

impl MemoryUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.urls.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UrlStore for MemoryUrlStore {
    fn get(&self, fingerprint: &str) -> Option<String> {
        self.urls.lock().unwrap().get(fingerprint).cloned()
    }

    fn put(&self, fingerprint: &str, url: &str) -> Result<(), StoreError> {
        self.urls
            .lock()
            .unwrap()
            .insert(fingerprint.to_string(), url.to_string());
        Ok(())
    }

    fn remove(&self, fingerprint: &str) -> Result<(), StoreError> {
        self.urls.lock().unwrap().remove(fingerprint);
        Ok(())
    }
}

/// Store persisted to a JSON file.
///
/// Records are cached in memory and the whole map is rewritten on every
/// change. The lock is held across the rewrite so concurrent writers cannot
/// interleave partial files.
pub struct FileUrlStore {
    path: PathBuf,
    urls: Mutex<HashMap<String, String>>,
}

impl FileUrlStore {
    /// Opens the store at `path`, loading existing records from disk.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let urls = load_urls(&path)?;
        Ok(Self {
            path,
            urls: Mutex::new(urls),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns all stored fingerprints.
    pub fn fingerprints(&self) -> Vec<String> {
        self.urls.lock().unwrap().keys().cloned().collect()
    }

    fn persist(&self, map: &HashMap<String, String>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(map)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("persisted {} resume record(s) to {:?}", map.len(), self.path);
        Ok(())
    }
}

impl UrlStore for FileUrlStore {
    fn get(&self, fingerprint: &str) -> Option<String> {
        self.urls.lock().unwrap().get(fingerprint).cloned()
    }

    fn put(&self, fingerprint: &str, url: &str) -> Result<(), StoreError> {
        let mut map = self.urls.lock().unwrap();
        map.insert(fingerprint.to_string(), url.to_string());
        self.persist(&map)
    }

    fn remove(&self, fingerprint: &str) -> Result<(), StoreError> {
        let mut map = self.urls.lock().unwrap();
        if map.remove(fingerprint).is_none() {
            return Ok(());
        }
        self.persist(&map)
    }
}

/// Loads records from a JSON file on disk.
fn load_urls(path: &Path) -> Result<HashMap<String, String>, StoreError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let data = std::fs::read_to_string(path)?;
    if data.trim().is_empty() {
        return Ok(HashMap::new());
    }
    let urls: HashMap<String, String> = serde_json::from_str(&data)?;
    debug!("loaded {} resume record(s) from {:?}", urls.len(), path);
    Ok(urls)
}

/// Returns the default store path.
pub fn default_store_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("tuskit").join("resume.json"))
}

/// Returns the platform-specific config directory.
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}
