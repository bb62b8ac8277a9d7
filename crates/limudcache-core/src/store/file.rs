use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{Collection, Store, StoreError};

const ENTRY_EXTENSION: &str = "json";

/// Escaped names longer than this are replaced by a hash of the key, keeping
/// the full file name (with temp suffix) under the usual 255-byte limit.
const MAX_STEM_LEN: usize = 200;

/// Prefix of hashed names. `%H` is never produced by [`encode_key`].
const HASHED_PREFIX: &str = "%H";

/// File layout for hashed names, which cannot be decoded back to the key.
#[derive(Serialize, Deserialize)]
struct HashedEntry {
    key: String,
    value: Value,
}

/// Distinguishes temp files of concurrent writers to the same key.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Store backed by one JSON file per key, one directory per collection.
///
/// Writes go to a temp file that is renamed into place, so a reader sees
/// either the previous entry or the complete new one.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.name())
    }

    /// Path of a key's file, and whether its name is hashed.
    fn entry_path(&self, collection: Collection, key: &str) -> (PathBuf, bool) {
        let (stem, hashed) = file_stem(key);
        let path = self
            .collection_dir(collection)
            .join(format!("{}.{}", stem, ENTRY_EXTENSION));
        (path, hashed)
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError> {
        let (path, hashed) = self.entry_path(collection, key);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !hashed {
            return Ok(Some(serde_json::from_str(&contents)?));
        }

        let stored: HashedEntry = serde_json::from_str(&contents)?;
        if stored.key != key {
            warn!(collection = %collection, key = key, other = %stored.key, "Hashed name collision");
            return Ok(None);
        }
        Ok(Some(stored.value))
    }

    async fn put(&self, collection: Collection, key: &str, entry: Value) -> Result<(), StoreError> {
        let dir = self.collection_dir(collection);
        tokio::fs::create_dir_all(&dir).await?;

        let (path, hashed) = self.entry_path(collection, key);
        let tmp = path.with_extension(format!(
            "{}.tmp{}",
            ENTRY_EXTENSION,
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let contents = if hashed {
            serde_json::to_vec(&HashedEntry {
                key: key.to_string(),
                value: entry,
            })?
        } else {
            serde_json::to_vec(&entry)?
        };

        if let Err(e) = tokio::fs::write(&tmp, contents).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.entry_path(collection, key).0).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<(String, Value)>, StoreError> {
        let mut dir = match tokio::fs::read_dir(self.collection_dir(collection)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let decoded = decode_key(stem);
            if decoded.is_none() && !stem.starts_with(HASHED_PREFIX) {
                debug!(path = %path.display(), "Skipping file with undecodable name");
                continue;
            }

            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                // Deleted between read_dir and read
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let parsed = match decoded {
                Some(key) => serde_json::from_str(&contents).map(|value| (key, value)),
                None => serde_json::from_str::<HashedEntry>(&contents).map(|e| (e.key, e.value)),
            };
            match parsed {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(collection = %collection, file = %stem, error = %e, "Skipping corrupt entry"),
            }
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    async fn clear(&self, collection: Collection) -> Result<(), StoreError> {
        match tokio::fs::remove_dir_all(self.collection_dir(collection)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Escape a key into a file name: ASCII alphanumerics, `-` and `_` pass
/// through, every other byte becomes `%XX`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            let _ = write!(out, "%{:02X}", b);
        }
    }
    out
}

/// The escaped key, or a hash of it when the escaped form is too long.
fn file_stem(key: &str) -> (String, bool) {
    let encoded = encode_key(key);
    if encoded.len() <= MAX_STEM_LEN {
        return (encoded, false);
    }
    let digest = Sha256::digest(key.as_bytes());
    (format!("{}{}", HASHED_PREFIX, hex::encode(digest)), true)
}

fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
