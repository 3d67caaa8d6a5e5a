use crate::{Error, Filesystem, Operation, Result, Visibility};
use async_trait::async_trait;

/// Wraps any filesystem and rejects every mutating operation.
///
/// Reads are forwarded; everything else fails with
/// [`Error::PermissionDenied`] without touching the inner filesystem. Useful
/// for safe views, and for putting a mirror member out of service.
///
/// ```
/// # use flyfs::{Filesystem, MemoryFilesystem};
/// # use flyfs::multi::ReadOnlyFilesystem;
/// # async fn example() -> flyfs::Result<()> {
/// let fs = ReadOnlyFilesystem::new(MemoryFilesystem::new());
/// assert!(fs.write("file.txt", b"data").await.is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ReadOnlyFilesystem<F: Filesystem> {
    inner: F,
}

impl<F: Filesystem> ReadOnlyFilesystem<F> {
    /// Create a read-only wrapper around any filesystem.
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    /// Get a reference to the inner filesystem.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Unwrap and return the inner filesystem.
    pub fn into_inner(self) -> F {
        self.inner
    }

    fn blocked(operation: Operation, path: &str) -> Result<()> {
        tracing::warn!(%operation, ?path, "Operation blocked (read-only filesystem)");
        Err(Error::PermissionDenied(format!(
            "{operation} not allowed on read-only filesystem: {path}"
        )))
    }
}

#[async_trait]
impl<F: Filesystem> Filesystem for ReadOnlyFilesystem<F> {
    async fn write(&self, path: &str, _contents: &[u8]) -> Result<()> {
        Self::blocked(Operation::Write, path)
    }

    async fn update(&self, path: &str, _contents: &[u8]) -> Result<()> {
        Self::blocked(Operation::Update, path)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn rename(&self, path: &str, _new_path: &str) -> Result<()> {
        Self::blocked(Operation::Rename, path)
    }

    async fn copy(&self, path: &str, _new_path: &str) -> Result<()> {
        Self::blocked(Operation::Copy, path)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        Self::blocked(Operation::Delete, path)
    }

    async fn create_dir(&self, dir: &str) -> Result<()> {
        Self::blocked(Operation::CreateDir, dir)
    }

    async fn delete_dir(&self, dir: &str) -> Result<()> {
        Self::blocked(Operation::DeleteDir, dir)
    }

    async fn set_visibility(&self, path: &str, _visibility: Visibility) -> Result<()> {
        Self::blocked(Operation::SetVisibility, path)
    }
}
