use crate::path::PathPrefix;
use crate::{Error, Filesystem, Result, Visibility};
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Unix permission bits used for each [`Visibility`] level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionMap {
    pub file_public: u32,
    pub file_private: u32,
    pub dir_public: u32,
    pub dir_private: u32,
}

impl PermissionMap {
    pub fn file(&self, visibility: Visibility) -> u32 {
        match visibility {
            Visibility::Public => self.file_public,
            Visibility::Private => self.file_private,
        }
    }

    pub fn dir(&self, visibility: Visibility) -> u32 {
        match visibility {
            Visibility::Public => self.dir_public,
            Visibility::Private => self.dir_private,
        }
    }
}

impl Default for PermissionMap {
    fn default() -> Self {
        Self {
            file_public: 0o644,
            file_private: 0o600,
            dir_public: 0o755,
            dir_private: 0o700,
        }
    }
}

/// A local filesystem adapter.
///
/// - Paths are *relative* logical paths (e.g. `"foo/bar.txt"`); leading
///   separators are stripped.
/// - Everything is stored under a configured root directory.
/// - `..` components are rejected to prevent directory traversal.
/// - Mutating operations are serialized through an internal mutex, so two
///   operations issued to the same adapter never interleave.
///
/// Visibility is mapped to Unix permission bits through a [`PermissionMap`].
/// On other platforms `set_visibility` only checks that the target exists.
pub struct LocalFilesystem {
    prefix: PathPrefix,
    permissions: PermissionMap,
    lock: Mutex<()>,
}

impl fmt::Debug for LocalFilesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFilesystem")
            .field("root", &self.prefix.root())
            .field("permissions", &self.permissions)
            .finish()
    }
}

impl LocalFilesystem {
    /// Create a new local filesystem rooted at `root`, creating the root
    /// directory if it does not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let permissions = PermissionMap::default();

        if !root.is_dir() {
            std::fs::create_dir_all(&root).map_err(|e| {
                Error::Generic(format!(
                    "impossible to create the root directory {}: {e}",
                    root.display()
                ))
            })?;
        }

        Ok(Self {
            prefix: PathPrefix::new(root),
            permissions,
            lock: Mutex::new(()),
        })
    }

    /// Use a custom visibility to permission mapping.
    pub fn with_permissions(mut self, permissions: PermissionMap) -> Self {
        self.permissions = permissions;
        self
    }

    /// Return the configured root directory.
    pub fn root(&self) -> &Path {
        self.prefix.root()
    }

    /// Return the visibility to permission mapping.
    pub fn permissions(&self) -> &PermissionMap {
        &self.permissions
    }

    async fn create_parent_dirs(&self, location: &Path) -> Result<()> {
        if let Some(parent) = location.parent() {
            let mut builder = tokio::fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            builder.mode(self.permissions.dir_public);
            builder
                .create(parent)
                .await
                .map_err(|e| map_io(e, parent))?;
        }
        Ok(())
    }

    async fn write_file(&self, location: &Path, contents: &[u8], mode: u32) -> Result<()> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;

        let mut file = options
            .open(location)
            .await
            .map_err(|e| map_io(e, location))?;
        file.write_all(contents).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Translate an io error into the crate's error taxonomy.
fn map_io(err: io::Error, location: &Path) -> Error {
    let path = location.display().to_string();
    match err.kind() {
        io::ErrorKind::NotFound => Error::NotFound(path),
        io::ErrorKind::PermissionDenied => Error::PermissionDenied(path),
        io::ErrorKind::AlreadyExists => Error::AlreadyExists(path),
        _ => Error::Io(err),
    }
}

#[cfg(unix)]
async fn chmod(location: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(location, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| map_io(e, location))
}

#[async_trait]
impl Filesystem for LocalFilesystem {
    async fn write(&self, path: &str, contents: &[u8]) -> Result<()> {
        let location = self.prefix.apply(path)?;
        let _guard = self.lock.lock().await;

        self.create_parent_dirs(&location).await?;
        self.write_file(&location, contents, self.permissions.file_public)
            .await
    }

    async fn update(&self, path: &str, contents: &[u8]) -> Result<()> {
        let location = self.prefix.apply(path)?;
        let _guard = self.lock.lock().await;

        self.write_file(&location, contents, self.permissions.file_public)
            .await
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let location = self.prefix.apply(path)?;
        tokio::fs::read(&location)
            .await
            .map_err(|e| map_io(e, &location))
    }

    async fn rename(&self, path: &str, new_path: &str) -> Result<()> {
        let location = self.prefix.apply(path)?;
        let destination = self.prefix.apply(new_path)?;
        let _guard = self.lock.lock().await;

        if let Err(e) = tokio::fs::metadata(&location).await {
            return Err(map_io(e, &location));
        }
        tokio::fs::rename(&location, &destination)
            .await
            .map_err(|e| map_io(e, &destination))
    }

    async fn copy(&self, path: &str, new_path: &str) -> Result<()> {
        let location = self.prefix.apply(path)?;
        let destination = self.prefix.apply(new_path)?;
        let _guard = self.lock.lock().await;

        let metadata = tokio::fs::metadata(&location)
            .await
            .map_err(|e| map_io(e, &location))?;
        let contents = tokio::fs::read(&location)
            .await
            .map_err(|e| map_io(e, &location))?;

        #[cfg(unix)]
        let mode = {
            use std::os::unix::fs::PermissionsExt;
            metadata.permissions().mode() & 0o7777
        };
        #[cfg(not(unix))]
        let mode = {
            let _ = metadata;
            self.permissions.file_public
        };

        self.write_file(&destination, &contents, mode).await?;

        // The open mode only applies to new files and is subject to the umask.
        #[cfg(unix)]
        chmod(&destination, mode).await?;

        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let location = self.prefix.apply(path)?;
        let _guard = self.lock.lock().await;

        tokio::fs::remove_file(&location)
            .await
            .map_err(|e| map_io(e, &location))
    }

    async fn create_dir(&self, dir: &str) -> Result<()> {
        let location = self.prefix.apply(dir)?;
        let _guard = self.lock.lock().await;

        let mut builder = tokio::fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(self.permissions.dir_public);
        builder
            .create(&location)
            .await
            .map_err(|e| map_io(e, &location))
    }

    async fn delete_dir(&self, dir: &str) -> Result<()> {
        let location = self.prefix.apply(dir)?;
        let _guard = self.lock.lock().await;

        let metadata = tokio::fs::metadata(&location)
            .await
            .map_err(|e| map_io(e, &location))?;
        if !metadata.is_dir() {
            return Err(Error::NotFound(location.display().to_string()));
        }

        tokio::fs::remove_dir_all(&location)
            .await
            .map_err(|e| map_io(e, &location))
    }

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        let location = self.prefix.apply(path)?;
        let _guard = self.lock.lock().await;

        let metadata = tokio::fs::metadata(&location)
            .await
            .map_err(|e| map_io(e, &location))?;

        let mode = if metadata.is_dir() {
            self.permissions.dir(visibility)
        } else {
            self.permissions.file(visibility)
        };

        #[cfg(unix)]
        chmod(&location, mode).await?;
        #[cfg(not(unix))]
        tracing::debug!(?location, mode, "visibility is not supported on this platform");

        Ok(())
    }
}
