use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

/// Byte-oriented persistence boundary. Keys are `/`-separated paths made of
/// ASCII letters, digits, `-` and `_`.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&mut self, key: &str, value: &[u8]) -> Result<()>;
    /// Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<()>;
    /// Keys directly under `prefix` (e.g. `"history"`), sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

fn validate_key(key: &str) -> Result<()> {
    let ok = !key.is_empty()
        && key.split('/').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        });
    if !ok {
        bail!("Invalid store key: {key:?}");
    }
    Ok(())
}

/// One JSON file per key under a base directory. Writes go to a temp file
/// that is synced and renamed over the target.
pub struct FileKvStore {
    base_dir: PathBuf,
}

impl FileKvStore {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("studyplan");
        Self::with_base_dir(base_dir)
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let path = self.file_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(&path)?))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        validate_key(key)?;
        let path = self.file_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(value)?;
        file.sync_all()?;

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.file_path(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        validate_key(prefix)?;
        let dir = self.base_dir.join(prefix);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.strip_suffix(".json").map(|stem| format!("{prefix}/{stem}"))
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// In-memory store for tests and dry runs.
#[derive(Clone, Debug, Default)]
pub struct MemoryKvStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.entries.remove(key);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        validate_key(prefix)?;
        let dir = format!("{prefix}/");
        Ok(self
            .entries
            .keys()
            .filter(|k| k.strip_prefix(&dir).is_some_and(|rest| !rest.contains('/')))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_file_store() -> (TempDir, FileKvStore) {
        let dir = TempDir::new().unwrap();
        let store = FileKvStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_file_store_get_set() {
        let (_dir, mut store) = make_file_store();
        assert_eq!(store.get("sessions").unwrap(), None);
        store.set("sessions", b"[1,2]").unwrap();
        assert_eq!(store.get("sessions").unwrap().as_deref(), Some(&b"[1,2]"[..]));
        store.set("sessions", b"[]").unwrap();
        assert_eq!(store.get("sessions").unwrap().as_deref(), Some(&b"[]"[..]));

        store.remove("sessions").unwrap();
        assert_eq!(store.get("sessions").unwrap(), None);
        store.remove("sessions").unwrap();
    }

    #[test]
    fn test_file_store_nested_keys_and_list() {
        let (dir, mut store) = make_file_store();
        store.set("history/2026-03-03", b"{}").unwrap();
        store.set("history/2026-03-02", b"{}").unwrap();
        store.set("sessions", b"{}").unwrap();

        assert!(dir.path().join("history").join("2026-03-02.json").exists());
        assert_eq!(
            store.list("history").unwrap(),
            vec!["history/2026-03-02", "history/2026-03-03"]
        );
        assert!(store.list("mastery").unwrap().is_empty());
    }

    #[test]
    fn test_file_store_leaves_no_tmp_files() {
        let (dir, mut store) = make_file_store();
        store.set("sessions", b"{}").unwrap();
        let tmp_files: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(tmp_files.is_empty(), "no residual .tmp files");
    }

    #[test]
    fn test_rejects_path_escapes() {
        let (_dir, mut store) = make_file_store();
        assert!(store.set("../outside", b"x").is_err());
        assert!(store.set("history//x", b"x").is_err());
        assert!(store.get("").is_err());

        let mut mem = MemoryKvStore::default();
        assert!(mem.set("a/../b", b"x").is_err());
    }

    #[test]
    fn test_memory_list_is_one_level() {
        let mut mem = MemoryKvStore::default();
        mem.set("history/2026-03-02", b"{}").unwrap();
        mem.set("history/archive/old", b"{}").unwrap();
        mem.set("historyx", b"{}").unwrap();
        assert_eq!(mem.list("history").unwrap(), vec!["history/2026-03-02"]);
    }
}
