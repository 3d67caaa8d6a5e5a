use std::fmt::{self, Debug};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

#[cfg(feature = "local")]
pub use adapters::local::{LocalFilesystem, PermissionMap};
#[cfg(feature = "memory")]
pub use adapters::memory::MemoryFilesystem;

pub use adapters::multi;
pub use path::PathPrefix;

pub mod path;

/// A specialized Result type for filesystem operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The logical operations of the [`Filesystem`] contract.
///
/// Used to label fan-out failures and log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Write,
    Update,
    Read,
    Rename,
    Copy,
    Delete,
    CreateDir,
    DeleteDir,
    SetVisibility,
}

impl Operation {
    /// Returns true for every operation that changes backend state.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Operation::Read)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Write => "write",
            Operation::Update => "update",
            Operation::Read => "read",
            Operation::Rename => "rename",
            Operation::Copy => "copy",
            Operation::Delete => "delete",
            Operation::CreateDir => "create_dir",
            Operation::DeleteDir => "delete_dir",
            Operation::SetVisibility => "set_visibility",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details about a fan-out operation in which at least one adapter failed.
///
/// Holds the indices of the adapters that succeeded and the full error of
/// every adapter that failed, in adapter order.
///
/// A failed *mutating* operation does not mean nothing was mutated: every
/// index in [`successes`](Self::successes) now holds the new state while the
/// failed adapters may still hold the old one. Nothing is rolled back.
///
/// ```
/// # use flyfs::{Error, Filesystem, MemoryFilesystem};
/// # use flyfs::multi::{MirrorFilesystem, ReadOnlyFilesystem};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fs = MirrorFilesystem::builder()
///     .add_adapter(MemoryFilesystem::new())
///     .add_adapter(ReadOnlyFilesystem::new(MemoryFilesystem::new()))
///     .build()?;
///
/// match fs.write("file.txt", b"data").await {
///     Err(Error::PartialFailure(details)) => {
///         println!("{} of {} failed", details.failure_count(), details.total_adapters());
///         for (idx, error) in &details.failures {
///             eprintln!("Adapter {}: {}", idx, error);
///         }
///     }
///     _ => {}
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FanOutFailure {
    /// The operation that was fanned out
    pub operation: Operation,
    /// Indices of adapters that succeeded
    pub successes: Vec<usize>,
    /// Indices and errors of adapters that failed
    pub failures: Vec<(usize, Box<Error>)>,
}

impl FanOutFailure {
    /// Total number of adapters involved
    pub fn total_adapters(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Number of successful adapters
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    /// Number of failed adapters
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Check if any adapters succeeded
    pub fn has_successes(&self) -> bool {
        !self.successes.is_empty()
    }

    /// Get indices of all failed adapters
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|(idx, _)| *idx).collect()
    }

    /// Get indices of all successful adapters
    pub fn successful_indices(&self) -> &[usize] {
        &self.successes
    }

    /// The error reported by the adapter at `index`, if it failed.
    pub fn error_for(&self, index: usize) -> Option<&Error> {
        self.failures
            .iter()
            .find(|(idx, _)| *idx == index)
            .map(|(_, e)| e.as_ref())
    }
}

impl fmt::Display for FanOutFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed on {} of {} adapters",
            self.operation,
            self.failure_count(),
            self.total_adapters()
        )?;
        if let Some((idx, first)) = self.failures.first() {
            write!(f, " (adapter {idx}: {first})")?;
        }
        Ok(())
    }
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    Io,
    InvalidInput,
    Timeout,
    PartialFailure,
    TotalFailure,
    Other,
}

/// A unified Error type for filesystem operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO Error")]
    Io(#[from] std::io::Error),

    #[error("Unknown visibility: {0}")]
    InvalidVisibility(String),

    #[error("Adapter call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Generic filesystem error: {0}")]
    Generic(String),

    #[error("Partial failure: {0}")]
    PartialFailure(FanOutFailure),

    #[error("Total failure: {0}")]
    TotalFailure(FanOutFailure),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::Io(_) => ErrorKind::Io,
            Error::InvalidVisibility(_) => ErrorKind::InvalidInput,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Generic(_) => ErrorKind::Other,
            Error::PartialFailure(_) => ErrorKind::PartialFailure,
            Error::TotalFailure(_) => ErrorKind::TotalFailure,
        }
    }

    /// True for a plain not-found error, or for a total fan-out failure in
    /// which every adapter reported not-found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Error::TotalFailure(details) => {
                !details.failures.is_empty() && details.failures.iter().all(|(_, e)| e.is_not_found())
            }
            _ => false,
        }
    }

    /// The fan-out details carried by a composite failure.
    pub fn fan_out(&self) -> Option<&FanOutFailure> {
        match self {
            Error::PartialFailure(details) | Error::TotalFailure(details) => Some(details),
            _ => None,
        }
    }
}

/// Symbolic permission level.
///
/// Each adapter maps the two levels to its own notion of permissions, with
/// separate values for files and directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(Error::InvalidVisibility(other.to_string())),
        }
    }
}

/// Adapter modules, gated behind Cargo features.
pub mod adapters {
    #[cfg(feature = "local")]
    pub mod local;
    #[cfg(feature = "memory")]
    pub mod memory;
    pub mod multi;
}

/// The filesystem capability contract.
///
/// Every backend implements these nine operations. Paths are slash-separated
/// and adapter-relative; adapters strip leading separators before combining
/// them with any internal root.
///
/// The trait is object safe so adapters of different kinds can be held side by
/// side as `Arc<dyn Filesystem>`. Implementations must tolerate concurrent
/// calls, since a [`MirrorFilesystem`](multi::MirrorFilesystem) issues
/// operations to every adapter from separate tasks.
#[async_trait]
pub trait Filesystem: Send + Sync + Debug {
    /// Write a new file, creating missing parent directories.
    async fn write(&self, path: &str, contents: &[u8]) -> Result<()>;

    /// Overwrite a file. Parent directories are not created.
    async fn update(&self, path: &str, contents: &[u8]) -> Result<()>;

    /// Read a whole file.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Move a file to `new_path`.
    async fn rename(&self, path: &str, new_path: &str) -> Result<()>;

    /// Copy a file to `new_path`, keeping its permissions.
    async fn copy(&self, path: &str, new_path: &str) -> Result<()>;

    /// Delete a file. Fails with [`Error::NotFound`] if it is absent.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Create a single directory.
    async fn create_dir(&self, dir: &str) -> Result<()>;

    /// Delete a directory and everything beneath it.
    async fn delete_dir(&self, dir: &str) -> Result<()>;

    /// Set a file or directory to public or private.
    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()>;
}

#[async_trait]
impl<T: Filesystem + ?Sized> Filesystem for Arc<T> {
    async fn write(&self, path: &str, contents: &[u8]) -> Result<()> {
        (**self).write(path, contents).await
    }

    async fn update(&self, path: &str, contents: &[u8]) -> Result<()> {
        (**self).update(path, contents).await
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        (**self).read(path).await
    }

    async fn rename(&self, path: &str, new_path: &str) -> Result<()> {
        (**self).rename(path, new_path).await
    }

    async fn copy(&self, path: &str, new_path: &str) -> Result<()> {
        (**self).copy(path, new_path).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        (**self).delete(path).await
    }

    async fn create_dir(&self, dir: &str) -> Result<()> {
        (**self).create_dir(dir).await
    }

    async fn delete_dir(&self, dir: &str) -> Result<()> {
        (**self).delete_dir(dir).await
    }

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        (**self).set_visibility(path, visibility).await
    }
}

/// Convenience methods built on [`Filesystem`].
#[async_trait]
pub trait FilesystemExt: Filesystem {
    /// Read a file as a UTF-8 string.
    async fn read_string(&self, path: &str) -> Result<String> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes).map_err(|e| Error::Generic(format!("invalid utf-8: {e}")))
    }

    /// Copy a file from this filesystem into `dest` under the same path.
    async fn copy_to<D>(&self, path: &str, dest: &D) -> Result<()>
    where
        D: Filesystem + ?Sized,
    {
        let contents = self.read(path).await?;
        dest.write(path, &contents).await
    }

    /// Move a file from this filesystem to `dest` by copying then deleting the source.
    ///
    /// If the copy fails the source is left untouched. If the delete fails
    /// after a successful copy, the error is returned and the file exists in
    /// both filesystems.
    ///
    /// # Example
    ///
    /// ```rust
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// use flyfs::{Filesystem, FilesystemExt, MemoryFilesystem};
    ///
    /// let source = MemoryFilesystem::new();
    /// let dest = MemoryFilesystem::new();
    ///
    /// source.write("file.txt", b"hello").await?;
    /// source.move_to("file.txt", &dest).await?;
    ///
    /// assert!(source.read("file.txt").await.is_err());
    /// assert_eq!(dest.read_string("file.txt").await?, "hello");
    /// # Ok(())
    /// # }
    /// ```
    async fn move_to<D>(&self, path: &str, dest: &D) -> Result<()>
    where
        D: Filesystem + ?Sized,
    {
        self.copy_to(path, dest).await?;
        self.delete(path).await
    }
}

impl<T: Filesystem + ?Sized> FilesystemExt for T {}
