// On-disk cache buckets — named, versioned key→response stores.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::source::traits::FetchedResource;

/// Store of named buckets rooted at a single cache directory.
#[derive(Debug, Clone)]
pub struct BucketStore {
    root: PathBuf,
}

/// A single named bucket. Keys are resource paths; each entry is a
/// meta/body file pair named by the key's SHA-256, so per-key writes
/// stay atomic (temp file + rename).
#[derive(Debug, Clone)]
pub struct Bucket {
    name: String,
    dir: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    content_type: String,
}

impl BucketStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Open or create the named bucket.
    pub fn bucket(&self, name: &str) -> Result<Bucket> {
        let dir = self.root.join(name);
        fs::create_dir_all(&dir)?;
        Ok(Bucket {
            name: name.to_string(),
            dir,
        })
    }

    /// Whether a bucket with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.root.join(name).is_dir()
    }

    /// Names of all existing buckets, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Ok(name) = entry.file_name().into_string() {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete the named bucket and everything in it.
    pub fn delete(&self, name: &str) -> Result<()> {
        let dir = self.root.join(name);
        if dir.is_dir() {
            fs::remove_dir_all(&dir)?;
            debug!("bucket {} deleted", name);
        }
        Ok(())
    }

    /// Delete every bucket in the store.
    pub fn delete_all(&self) -> Result<()> {
        for name in self.list()? {
            self.delete(&name)?;
        }
        Ok(())
    }

    /// Delete every bucket except `keep`. Returns the names deleted.
    pub fn retain_only(&self, keep: &str) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.list()? {
            if name != keep {
                self.delete(&name)?;
                deleted.push(name);
            }
        }
        Ok(deleted)
    }
}

impl Bucket {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn entry_paths(&self, key: &str) -> (PathBuf, PathBuf) {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        (
            self.dir.join(format!("{digest}.meta")),
            self.dir.join(format!("{digest}.body")),
        )
    }

    /// Store a response copy under `key`.
    ///
    /// The body lands before the meta file, and both go through a temp
    /// name + rename, so a reader never observes a half-written entry.
    pub fn put(&self, key: &str, resource: &FetchedResource) -> Result<()> {
        let (meta_path, body_path) = self.entry_paths(key);

        let tmp_body = body_path.with_extension("body.tmp");
        fs::write(&tmp_body, &resource.body)?;
        fs::rename(&tmp_body, &body_path)?;

        let meta = EntryMeta {
            key: key.to_string(),
            content_type: resource.content_type.clone(),
        };
        let tmp_meta = meta_path.with_extension("meta.tmp");
        fs::write(&tmp_meta, serde_json::to_vec(&meta)?)?;
        fs::rename(&tmp_meta, &meta_path)?;

        debug!(
            "bucket {} cached key={} bytes={}",
            self.name,
            key,
            resource.body.len()
        );
        Ok(())
    }

    /// Read the cached copy under `key`, if any. Unreadable entries are
    /// treated as absent.
    pub fn get(&self, key: &str) -> Option<FetchedResource> {
        let (meta_path, body_path) = self.entry_paths(key);
        let meta: EntryMeta = serde_json::from_slice(&fs::read(meta_path).ok()?).ok()?;
        if meta.key != key {
            warn!("bucket {} entry key mismatch for {}", self.name, key);
            return None;
        }
        let body = fs::read(body_path).ok()?;
        Some(FetchedResource {
            content_type: meta.content_type,
            body: Bytes::from(body),
        })
    }

    /// Whether `key` has a cached copy.
    pub fn has(&self, key: &str) -> bool {
        self.entry_paths(key).0.is_file()
    }
}
