use crate::path::{normalize, normalize_entry, parent};
use crate::{Error, Filesystem, Result, Visibility};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct FileEntry {
    contents: Vec<u8>,
    visibility: Visibility,
}

#[derive(Debug, Default)]
struct Tree {
    files: HashMap<String, FileEntry>,
    // The root ("") is implicit and never stored.
    dirs: HashMap<String, Visibility>,
}

impl Tree {
    fn dir_exists(&self, dir: &str) -> bool {
        dir.is_empty() || self.dirs.contains_key(dir)
    }

    fn require_parent(&self, path: &str) -> Result<()> {
        let parent = parent(path);
        if self.dir_exists(parent) {
            Ok(())
        } else {
            Err(Error::NotFound(parent.to_string()))
        }
    }

    /// Create every missing ancestor of `path` with public visibility.
    fn ensure_parents(&mut self, path: &str) -> Result<()> {
        let parent = parent(path);
        if parent.is_empty() {
            return Ok(());
        }

        let mut current = String::new();
        for part in parent.split('/') {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);

            if self.files.contains_key(&current) {
                return Err(Error::AlreadyExists(format!(
                    "{current} is a file, cannot create directory"
                )));
            }
            self.dirs.entry(current.clone()).or_insert(Visibility::Public);
        }
        Ok(())
    }

    fn put_file(&mut self, path: String, contents: Vec<u8>, visibility: Visibility) -> Result<()> {
        if self.dirs.contains_key(&path) {
            return Err(Error::AlreadyExists(format!("{path} is a directory")));
        }
        self.files.insert(
            path,
            FileEntry {
                contents,
                visibility,
            },
        );
        Ok(())
    }
}

/// A simple in-memory [`Filesystem`] adapter.
///
/// - Files are stored as raw bytes in a `HashMap` keyed by normalized path.
/// - Directories are tracked explicitly, so directory operations behave like a
///   disk: `update` and `create_dir` need an existing parent, `write` creates
///   missing parents.
/// - Intended for tests, local development, and ephemeral usage.
///
/// Clones share the same underlying tree.
#[derive(Clone, Default)]
pub struct MemoryFilesystem {
    inner: Arc<RwLock<Tree>>,
}

impl MemoryFilesystem {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    fn tree(&self) -> RwLockReadGuard<'_, Tree> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn tree_mut(&self) -> RwLockWriteGuard<'_, Tree> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the number of stored files.
    pub fn len(&self) -> usize {
        self.tree().files.len()
    }

    /// Returns true if there are no stored files.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a copy of the bytes stored at `path` (useful for tests).
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        let key = normalize(path).ok()?;
        self.tree().files.get(&key).map(|f| f.contents.clone())
    }

    /// Visibility of the file or directory at `path`.
    pub fn visibility(&self, path: &str) -> Option<Visibility> {
        let key = normalize(path).ok()?;
        let tree = self.tree();
        tree.files
            .get(&key)
            .map(|f| f.visibility)
            .or_else(|| tree.dirs.get(&key).copied())
    }

    /// Returns true if `path` is a directory.
    pub fn is_dir(&self, path: &str) -> bool {
        normalize(path)
            .map(|key| self.tree().dir_exists(&key))
            .unwrap_or(false)
    }
}

impl fmt::Debug for MemoryFilesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Avoid dumping potentially large in-memory contents.
        let tree = self.tree();
        f.debug_struct("MemoryFilesystem")
            .field("files", &tree.files.len())
            .field("dirs", &tree.dirs.len())
            .finish()
    }
}

#[async_trait]
impl Filesystem for MemoryFilesystem {
    async fn write(&self, path: &str, contents: &[u8]) -> Result<()> {
        let key = normalize_entry(path)?;
        let mut tree = self.tree_mut();
        tree.ensure_parents(&key)?;
        tree.put_file(key, contents.to_vec(), Visibility::Public)
    }

    async fn update(&self, path: &str, contents: &[u8]) -> Result<()> {
        let key = normalize_entry(path)?;
        let mut tree = self.tree_mut();
        tree.require_parent(&key)?;

        match tree.files.get_mut(&key) {
            Some(entry) => {
                entry.contents = contents.to_vec();
                Ok(())
            }
            None => tree.put_file(key, contents.to_vec(), Visibility::Public),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let key = normalize_entry(path)?;
        let tree = self.tree();
        tree.files
            .get(&key)
            .map(|f| f.contents.clone())
            .ok_or(Error::NotFound(key))
    }

    async fn rename(&self, path: &str, new_path: &str) -> Result<()> {
        let from = normalize_entry(path)?;
        let to = normalize_entry(new_path)?;
        let mut tree = self.tree_mut();

        if !tree.files.contains_key(&from) {
            return Err(Error::NotFound(from));
        }
        tree.require_parent(&to)?;
        if tree.dirs.contains_key(&to) {
            return Err(Error::AlreadyExists(format!("{to} is a directory")));
        }

        if let Some(entry) = tree.files.remove(&from) {
            tree.files.insert(to, entry);
        }
        Ok(())
    }

    async fn copy(&self, path: &str, new_path: &str) -> Result<()> {
        let from = normalize_entry(path)?;
        let to = normalize_entry(new_path)?;
        let mut tree = self.tree_mut();

        let entry = tree
            .files
            .get(&from)
            .cloned()
            .ok_or_else(|| Error::NotFound(from.clone()))?;
        tree.require_parent(&to)?;
        tree.put_file(to, entry.contents, entry.visibility)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let key = normalize_entry(path)?;
        let mut tree = self.tree_mut();
        match tree.files.remove(&key) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(key)),
        }
    }

    async fn create_dir(&self, dir: &str) -> Result<()> {
        let key = normalize_entry(dir)?;
        let mut tree = self.tree_mut();

        if tree.dirs.contains_key(&key) || tree.files.contains_key(&key) {
            return Err(Error::AlreadyExists(key));
        }
        tree.require_parent(&key)?;
        tree.dirs.insert(key, Visibility::Public);
        Ok(())
    }

    async fn delete_dir(&self, dir: &str) -> Result<()> {
        let key = normalize_entry(dir)?;
        let mut tree = self.tree_mut();

        if tree.dirs.remove(&key).is_none() {
            return Err(Error::NotFound(key));
        }

        let nested = format!("{key}/");
        tree.files.retain(|p, _| !p.starts_with(&nested));
        tree.dirs.retain(|p, _| !p.starts_with(&nested));
        Ok(())
    }

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        let key = normalize_entry(path)?;
        let mut tree = self.tree_mut();

        if let Some(entry) = tree.files.get_mut(&key) {
            entry.visibility = visibility;
            return Ok(());
        }
        match tree.dirs.get_mut(&key) {
            Some(v) => {
                *v = visibility;
                Ok(())
            }
            None => Err(Error::NotFound(key)),
        }
    }
}
