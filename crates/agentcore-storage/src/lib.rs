//! Key-path to JSON persistence with atomic writes.
//!
//! A [`Storage`] maps an ordered sequence of path segments (a [`Key`]) to a
//! JSON value, persisted as one file per key under a data directory. There
//! is no cross-process locking — callers that need per-key serialization
//! (the message store and session store) are expected to provide it, since
//! every mutation they make goes through [`Storage::update`].

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("key not found: {0}")]
    NotFound(Key),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serde error for key {key}: {source}")]
    Serde {
        key: Key,
        #[source]
        source: serde_json::Error,
    },
}

/// An ordered sequence of path segments identifying a stored entity, e.g.
/// `["session", "ses_..."]` for the storage layout's `session/{sid}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(Vec<String>);

impl Key {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Key(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn child(&self, segment: impl Into<String>) -> Key {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Key(segments)
    }

    fn to_relative_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for segment in &self.0 {
            path.push(segment);
        }
        path.set_extension("json");
        path
    }

    fn from_relative_path(path: &Path) -> Option<Key> {
        let mut segments: Vec<String> = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let last = segments.pop()?;
        let stem = last.strip_suffix(".json")?;
        segments.push(stem.to_string());
        Some(Key(segments))
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// Content-addressed, file-backed key/value store.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Storage { root: root.into() }
    }

    fn path_for(&self, key: &Key) -> PathBuf {
        self.root.join(key.to_relative_path())
    }

    pub fn read_value(&self, key: &Key) -> Result<Value, StorageError> {
        let path = self.path_for(key);
        let bytes = fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.clone())
            } else {
                StorageError::Io { path: path.clone(), source }
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|source| StorageError::Serde {
            key: key.clone(),
            source,
        })
    }

    pub fn read<T: DeserializeOwned>(&self, key: &Key) -> Result<T, StorageError> {
        let value = self.read_value(key)?;
        serde_json::from_value(value).map_err(|source| StorageError::Serde {
            key: key.clone(),
            source,
        })
    }

    pub fn write_value(&self, key: &Key, value: &Value) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| StorageError::Io { path: parent.to_path_buf(), source })?;
        }
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Serde {
            key: key.clone(),
            source,
        })?;
        write_atomic(&path, &bytes).map_err(|source| StorageError::Io { path, source })?;
        tracing::debug!(key = %key, "storage write");
        Ok(())
    }

    pub fn write<T: Serialize>(&self, key: &Key, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value).map_err(|source| StorageError::Serde {
            key: key.clone(),
            source,
        })?;
        self.write_value(key, &value)
    }

    /// Read-modify-write. Fails `NotFound` if the key is absent; use
    /// `write` to create a key for the first time.
    pub fn update<T, F>(&self, key: &Key, mutate: F) -> Result<T, StorageError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(T) -> T,
    {
        let current: T = self.read(key)?;
        let updated = mutate(current);
        self.write(key, &updated)?;
        self.read(key)
    }

    /// Idempotent: removing an absent key is not an error.
    pub fn remove(&self, key: &Key) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(key = %key, "storage remove");
                Ok(())
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    /// All keys strictly under `prefix`, sorted lexicographically.
    pub fn list(&self, prefix: &Key) -> Result<Vec<Key>, StorageError> {
        let mut dir = self.root.clone();
        for segment in prefix.segments() {
            dir.push(segment);
        }
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in walkdir::WalkDir::new(&dir)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .expect("walked entry is under root");
            if let Some(key) = Key::from_relative_path(relative) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    set_owner_only_mode(tmp.path())?;
    tmp.persist(path)
        .map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_owner_only_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(0o600);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_owner_only_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Note {
        text: String,
    }

    fn storage() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        (dir, storage)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, storage) = storage();
        let key = Key::new(["session", "ses_1"]);
        storage.write(&key, &Note { text: "hello".into() }).unwrap();
        let back: Note = storage.read(&key).unwrap();
        assert_eq!(back.text, "hello");
    }

    #[test]
    fn read_missing_key_is_not_found() {
        let (_dir, storage) = storage();
        let key = Key::new(["session", "missing"]);
        let err = storage.read::<Note>(&key).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn update_fails_not_found_when_absent() {
        let (_dir, storage) = storage();
        let key = Key::new(["session", "missing"]);
        let err = storage
            .update(&key, |n: Note| n)
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn update_mutates_existing_value() {
        let (_dir, storage) = storage();
        let key = Key::new(["session", "ses_1"]);
        storage.write(&key, &Note { text: "a".into() }).unwrap();
        let updated: Note = storage
            .update(&key, |mut n: Note| {
                n.text.push('b');
                n
            })
            .unwrap();
        assert_eq!(updated.text, "ab");
    }

    #[test]
    fn remove_is_idempotent() {
        let (_dir, storage) = storage();
        let key = Key::new(["session", "ses_1"]);
        storage.write(&key, &Note { text: "a".into() }).unwrap();
        storage.remove(&key).unwrap();
        storage.remove(&key).unwrap();
        assert!(matches!(
            storage.read::<Note>(&key).unwrap_err(),
            StorageError::NotFound(_)
        ));
    }

    #[test]
    fn list_returns_keys_under_prefix_sorted() {
        let (_dir, storage) = storage();
        storage
            .write(&Key::new(["message", "ses_1", "msg_b"]), &Note { text: "b".into() })
            .unwrap();
        storage
            .write(&Key::new(["message", "ses_1", "msg_a"]), &Note { text: "a".into() })
            .unwrap();
        storage
            .write(&Key::new(["message", "ses_2", "msg_c"]), &Note { text: "c".into() })
            .unwrap();

        let under_ses_1 = storage.list(&Key::new(["message", "ses_1"])).unwrap();
        assert_eq!(
            under_ses_1,
            vec![
                Key::new(["message", "ses_1", "msg_a"]),
                Key::new(["message", "ses_1", "msg_b"]),
            ]
        );
    }

    #[test]
    fn list_of_missing_prefix_is_empty() {
        let (_dir, storage) = storage();
        assert!(storage.list(&Key::new(["message", "nope"])).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn written_file_has_owner_only_mode() {
        use std::os::unix::fs::PermissionsExt;
        let (dir, storage) = storage();
        let key = Key::new(["auth"]);
        storage.write(&key, &Note { text: "secret".into() }).unwrap();
        let meta = fs::metadata(dir.path().join("auth.json")).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }
}
