use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    dashmap::DashMap,
    fd_lock::RwLock,
    relaybot_common::{Error, KeyValueAtom, Result, StoreProvider, validate_store_key},
    serde_json::{Map, Value},
    tracing::debug,
};

const EXTENSION: &str = "store";

/// JSON-file backed store: `<directory>/<key>.store` per key.
///
/// Files are read the first time a key is requested. Writes happen only on
/// [`flush`](StoreProvider::flush); the last flush wins.
pub struct FileStore {
    directory: PathBuf,
    cells: DashMap<String, Arc<KeyValueAtom>>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `directory`.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        debug!(directory = %directory.display(), "opened file store");
        Ok(Self {
            directory,
            cells: DashMap::new(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.{EXTENSION}"))
    }

    fn load(&self, key: &str) -> Result<Map<String, Value>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(Map::new());
        }
        let raw = fs::read_to_string(&path)?;
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::message(format!(
                "{} does not hold a JSON object",
                path.display()
            ))),
        }
    }

    /// Write the cell's current snapshot to `<key>.store`.
    ///
    /// Flushes of one key are serialised through an `fd_lock` on
    /// `<key>.store.lock`. The snapshot is taken under that lock, so the last
    /// flush to finish writes the newest value.
    fn write(&self, key: &str, cell: &KeyValueAtom) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path.with_extension(format!("{EXTENSION}.lock")))?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock.write().map_err(Error::lock_failed)?;

        let json = serde_json::to_vec_pretty(&*cell.value())?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;
        debug!(key, path = %path.display(), "flushed store");
        Ok(())
    }
}

impl StoreProvider for FileStore {
    fn store(&self, key: &str) -> Result<Arc<KeyValueAtom>> {
        validate_store_key(key)?;
        if let Some(cell) = self.cells.get(key) {
            return Ok(Arc::clone(cell.value()));
        }

        let initial = self.load(key)?;
        let cell = self
            .cells
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(KeyValueAtom::with_value(initial)));
        Ok(Arc::clone(cell.value()))
    }

    fn flush(&self, key: &str) -> Result<()> {
        let Some(cell) = self.cells.get(key).map(|c| Arc::clone(c.value())) else {
            return Ok(());
        };
        self.write(key, &cell)
    }

    fn flush_all(&self) -> Result<()> {
        let cells: Vec<(String, Arc<KeyValueAtom>)> = self
            .cells
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        for (key, cell) in cells {
            self.write(&key, &cell)?;
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn temp_store() -> (FileStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn returns_the_same_cell_for_a_key() {
        let (store, _dir) = temp_store();
        let a = store.store("test").unwrap();
        let b = store.store("test").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn defaults_to_an_empty_map() {
        let (store, _dir) = temp_store();
        assert!(store.store("test").unwrap().value().is_empty());
    }

    #[test]
    fn nothing_is_written_until_flush() {
        let (store, dir) = temp_store();
        store.store("test").unwrap().set("answer", 42);
        assert!(!dir.path().join("test.store").exists());

        store.flush("test").unwrap();
        assert!(dir.path().join("test.store").exists());
    }

    #[test]
    fn flushed_values_survive_reopen() {
        let (store, dir) = temp_store();
        store.store("karma").unwrap().set("alice", 3);
        store.store("quotes").unwrap().set("latest", "hello");
        store.flush_all().unwrap();
        drop(store);

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.store("karma").unwrap().get("alice"), Some(json!(3)));
        assert_eq!(
            reopened.store("quotes").unwrap().get("latest"),
            Some(json!("hello"))
        );
    }

    #[test]
    fn flushing_an_unknown_key_is_a_noop() {
        let (store, dir) = temp_store();
        store.flush("ghost").unwrap();
        assert!(!dir.path().join("ghost.store").exists());
    }

    #[test]
    fn rejects_path_like_keys() {
        let (store, _dir) = temp_store();
        assert!(store.store("../escape").is_err());
    }

    #[test]
    fn corrupt_files_are_reported() {
        let (store, dir) = temp_store();
        fs::write(dir.path().join("bad.store"), "[1, 2]").unwrap();
        assert!(store.store("bad").is_err());
    }

    #[test]
    fn concurrent_flushes_of_one_key_leave_a_whole_file() {
        let (store, dir) = temp_store();
        let store = Arc::new(store);
        let cell = store.store("k").unwrap();

        for round in 0..50 {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = Arc::clone(&store);
                    let cell = Arc::clone(&cell);
                    std::thread::spawn(move || {
                        cell.set("value", "x".repeat((round * 8 + i) % 97));
                        store.flush("k")
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap().unwrap();
            }

            let raw = fs::read_to_string(dir.path().join("k.store")).unwrap();
            let on_disk: Value = serde_json::from_str(&raw).unwrap();
            assert_eq!(on_disk, Value::Object((*cell.value()).clone()));
        }
    }
}
