//! Persistent key/value storage for user preferences.
//!
//! The widget only ever stores two keys, theme and unit. Storage is injected
//! as an `Arc<dyn PreferenceStore>` so several widgets can share one store.

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap},
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

pub const THEME_KEY: &str = "city-weather.theme";
pub const UNIT_KEY: &str = "city-weather.unit";

pub trait PreferenceStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Read and parse a preference. Absent and malformed values both yield `None`.
pub fn load_preference<T: FromStr>(store: &dyn PreferenceStore, key: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = store.get(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Ignoring stored preference {key}: {e}");
            None
        }
    }
}

/// Store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<'a>(values: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            values: Mutex::new(values),
        }
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// TOML-backed store. The whole file is rewritten on every `set`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match read_values(&path) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!("Starting with empty preferences: {e:#}");
                BTreeMap::new()
            }
        };

        Self {
            path,
            values: Mutex::new(values),
        }
    }

    /// Open the store in the platform data directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(Self::default_path()?))
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "city-weather", "city-weather")
            .ok_or_else(|| anyhow!("Could not determine platform data directory"))?;

        Ok(dirs.data_dir().join("preferences.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_values(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read preferences file: {}", path.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse preferences file: {}", path.display()))
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create preferences directory: {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(&*values).context("Failed to serialize preferences")?;

        fs::write(&self.path, toml)
            .with_context(|| format!("Failed to write preferences file: {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Theme, Unit};

    #[test]
    fn memory_store_get_set() {
        let store = MemoryStore::new();
        assert_eq!(store.get(THEME_KEY), None);

        store.set(THEME_KEY, "dark").unwrap();
        assert_eq!(store.get(THEME_KEY).as_deref(), Some("dark"));
    }

    #[test]
    fn load_preference_treats_malformed_as_absent() {
        let store = MemoryStore::with_values([(THEME_KEY, "purple"), (UNIT_KEY, "imperial")]);

        assert_eq!(load_preference::<Theme>(&store, THEME_KEY), None);
        assert_eq!(load_preference::<Unit>(&store, UNIT_KEY), Some(Unit::Imperial));
        assert_eq!(load_preference::<Unit>(&store, "missing"), None);
    }

    #[test]
    fn file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.toml");

        let store = FileStore::open(&path);
        assert_eq!(store.get(UNIT_KEY), None);
        store.set(UNIT_KEY, "imperial").unwrap();
        store.set(THEME_KEY, "dark").unwrap();

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get(UNIT_KEY).as_deref(), Some("imperial"));
        assert_eq!(reopened.get(THEME_KEY).as_deref(), Some("dark"));
    }

    #[test]
    fn file_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let store = FileStore::open(&path);
        assert_eq!(store.get(THEME_KEY), None);

        store.set(THEME_KEY, "light").unwrap();
        assert_eq!(FileStore::open(&path).get(THEME_KEY).as_deref(), Some("light"));
    }
}
