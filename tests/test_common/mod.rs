//! Common test utilities and a reusable contract suite for filesystem adapters
//!
//! `filesystem_test_suite!` generates the same set of tests for any
//! [`Filesystem`] implementation, so plain adapters and mirrors are held to
//! one contract.
#![allow(dead_code, unused_imports, unused_macros)]

use async_trait::async_trait;
#[cfg(feature = "memory")]
use flyfs::MemoryFilesystem;
use flyfs::{Error, Filesystem, Result, Visibility};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Barrier;

/// Generate the contract suite for a filesystem.
///
/// `setup` is a closure returning a future of `(filesystem, guard)`; the guard
/// is kept alive for the duration of each test (e.g. a `TempDir`).
///
/// ```ignore
/// filesystem_test_suite!(setup = || async { (MemoryFilesystem::new(), ()) });
/// ```
macro_rules! filesystem_test_suite {
    (setup = $setup:expr) => {
        filesystem_test_suite!(@cases $setup;
            test_write_and_read => run_test_write_and_read,
            test_write_creates_parents => run_test_write_creates_parents,
            test_read_missing => run_test_read_missing,
            test_update_overwrites => run_test_update_overwrites,
            test_update_idempotent => run_test_update_idempotent,
            test_update_missing_parent => run_test_update_missing_parent,
            test_rename => run_test_rename,
            test_rename_missing_source => run_test_rename_missing_source,
            test_copy => run_test_copy,
            test_copy_missing_source => run_test_copy_missing_source,
            test_delete => run_test_delete,
            test_delete_missing => run_test_delete_missing,
            test_create_dir => run_test_create_dir,
            test_create_dir_existing => run_test_create_dir_existing,
            test_delete_dir => run_test_delete_dir,
            test_delete_dir_missing => run_test_delete_dir_missing,
            test_delete_dir_on_file => run_test_delete_dir_on_file,
            test_set_visibility => run_test_set_visibility,
            test_set_visibility_missing => run_test_set_visibility_missing,
            test_leading_separator => run_test_leading_separator,
            test_binary_and_empty_data => run_test_binary_and_empty_data,
        );
    };
    (@cases $setup:expr; $($name:ident => $runner:ident),* $(,)?) => {
        mod filesystem_test_suite {
            use super::*;

            $(
                #[tokio::test]
                async fn $name() {
                    let (fs, _guard) = ($setup)().await;
                    crate::test_common::$runner(&fs).await;
                }
            )*
        }
    };
}

// Individual test implementations that can be reused

pub async fn run_test_write_and_read<F: Filesystem + ?Sized>(fs: &F) {
    fs.write("test.txt", b"hello world").await.unwrap();
    assert_eq!(fs.read("test.txt").await.unwrap(), b"hello world");
}

pub async fn run_test_write_creates_parents<F: Filesystem + ?Sized>(fs: &F) {
    fs.write("a/b/c/deep.txt", b"nested").await.unwrap();
    assert_eq!(fs.read("a/b/c/deep.txt").await.unwrap(), b"nested");
}

pub async fn run_test_read_missing<F: Filesystem + ?Sized>(fs: &F) {
    let err = fs.read("nonexistent.txt").await.unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got {err:?}");
}

pub async fn run_test_update_overwrites<F: Filesystem + ?Sized>(fs: &F) {
    fs.write("test.txt", b"hello world").await.unwrap();
    fs.update("test.txt", b"hello").await.unwrap();
    assert_eq!(fs.read("test.txt").await.unwrap(), b"hello");
}

pub async fn run_test_update_idempotent<F: Filesystem + ?Sized>(fs: &F) {
    fs.write("test.txt", b"original").await.unwrap();
    fs.update("test.txt", b"same").await.unwrap();
    let once = fs.read("test.txt").await.unwrap();
    fs.update("test.txt", b"same").await.unwrap();
    let twice = fs.read("test.txt").await.unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice, b"same");
}

pub async fn run_test_update_missing_parent<F: Filesystem + ?Sized>(fs: &F) {
    let result = fs.update("no-such-dir/test.txt", b"data").await;
    assert!(result.is_err());
}

pub async fn run_test_rename<F: Filesystem + ?Sized>(fs: &F) {
    fs.write("test.txt", b"hello").await.unwrap();
    fs.rename("test.txt", "test_updated.txt").await.unwrap();

    assert!(fs.read("test.txt").await.unwrap_err().is_not_found());
    assert_eq!(fs.read("test_updated.txt").await.unwrap(), b"hello");
}

pub async fn run_test_rename_missing_source<F: Filesystem + ?Sized>(fs: &F) {
    let err = fs.rename("missing.txt", "other.txt").await.unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got {err:?}");
}

pub async fn run_test_copy<F: Filesystem + ?Sized>(fs: &F) {
    fs.write("test.txt", b"hello").await.unwrap();
    fs.copy("test.txt", "test_copied.txt").await.unwrap();

    let original = fs.read("test.txt").await.unwrap();
    let copied = fs.read("test_copied.txt").await.unwrap();
    assert_eq!(original, copied);
}

pub async fn run_test_copy_missing_source<F: Filesystem + ?Sized>(fs: &F) {
    let err = fs.copy("missing.txt", "other.txt").await.unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got {err:?}");
}

pub async fn run_test_delete<F: Filesystem + ?Sized>(fs: &F) {
    fs.write("test.txt", b"hello world").await.unwrap();
    fs.delete("test.txt").await.unwrap();
    assert!(fs.read("test.txt").await.unwrap_err().is_not_found());
}

pub async fn run_test_delete_missing<F: Filesystem + ?Sized>(fs: &F) {
    let err = fs.delete("missing.txt").await.unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got {err:?}");
}

pub async fn run_test_create_dir<F: Filesystem + ?Sized>(fs: &F) {
    fs.create_dir("subdir").await.unwrap();
    // update does not create parents, so this only works if the dir exists
    fs.update("subdir/file.txt", b"inside").await.unwrap();
    assert_eq!(fs.read("subdir/file.txt").await.unwrap(), b"inside");
}

pub async fn run_test_create_dir_existing<F: Filesystem + ?Sized>(fs: &F) {
    fs.create_dir("subdir").await.unwrap();
    assert!(fs.create_dir("subdir").await.is_err());
}

pub async fn run_test_delete_dir<F: Filesystem + ?Sized>(fs: &F) {
    fs.create_dir("subdir").await.unwrap();
    fs.write("subdir/a.txt", b"a").await.unwrap();
    fs.write("subdir/nested/b.txt", b"b").await.unwrap();

    fs.delete_dir("subdir").await.unwrap();

    assert!(fs.read("subdir/a.txt").await.unwrap_err().is_not_found());
    assert!(fs.read("subdir/nested/b.txt").await.is_err());
    assert!(fs.update("subdir/c.txt", b"c").await.is_err());
}

pub async fn run_test_delete_dir_missing<F: Filesystem + ?Sized>(fs: &F) {
    let err = fs.delete_dir("missing").await.unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got {err:?}");
}

pub async fn run_test_delete_dir_on_file<F: Filesystem + ?Sized>(fs: &F) {
    fs.write("plain.txt", b"keep").await.unwrap();

    let err = fs.delete_dir("plain.txt").await.unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got {err:?}");
    assert_eq!(fs.read("plain.txt").await.unwrap(), b"keep");
}

pub async fn run_test_set_visibility<F: Filesystem + ?Sized>(fs: &F) {
    fs.write("test.txt", b"hello").await.unwrap();
    fs.create_dir("dir").await.unwrap();

    fs.set_visibility("test.txt", Visibility::Private)
        .await
        .unwrap();
    fs.set_visibility("dir", Visibility::Private).await.unwrap();
    fs.set_visibility("dir", Visibility::Public).await.unwrap();
    fs.set_visibility("test.txt", Visibility::Public)
        .await
        .unwrap();

    assert_eq!(fs.read("test.txt").await.unwrap(), b"hello");
}

pub async fn run_test_set_visibility_missing<F: Filesystem + ?Sized>(fs: &F) {
    let err = fs
        .set_visibility("missing.txt", Visibility::Private)
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got {err:?}");
}

pub async fn run_test_leading_separator<F: Filesystem + ?Sized>(fs: &F) {
    fs.write("/rooted.txt", b"data").await.unwrap();
    assert_eq!(fs.read("rooted.txt").await.unwrap(), b"data");
}

pub async fn run_test_binary_and_empty_data<F: Filesystem + ?Sized>(fs: &F) {
    let binary: Vec<u8> = (0..=255).collect();
    fs.write("binary.dat", &binary).await.unwrap();
    assert_eq!(fs.read("binary.dat").await.unwrap(), binary);

    fs.write("empty.txt", b"").await.unwrap();
    assert!(fs.read("empty.txt").await.unwrap().is_empty());
}

/// Install a tracing subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// What a [`ProbeFilesystem`] does before delegating each call.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Delegate immediately.
    Normal,
    /// Sleep first.
    Delay(Duration),
    /// Wait until every party reached the barrier.
    Rendezvous(Arc<Barrier>),
    /// Never complete.
    Hang,
    /// Panic inside the adapter task.
    Panic,
}

/// Test double wrapping a [`MemoryFilesystem`] with scripted timing.
#[cfg(feature = "memory")]
#[derive(Debug, Clone)]
pub struct ProbeFilesystem {
    pub inner: MemoryFilesystem,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

#[cfg(feature = "memory")]
impl ProbeFilesystem {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            inner: MemoryFilesystem::new(),
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn before(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Normal => {}
            Behavior::Delay(d) => tokio::time::sleep(*d).await,
            Behavior::Rendezvous(barrier) => {
                barrier.wait().await;
            }
            Behavior::Hang => futures::future::pending::<()>().await,
            Behavior::Panic => panic!("probe adapter panicked"),
        }
    }
}

#[cfg(feature = "memory")]
#[async_trait]
impl Filesystem for ProbeFilesystem {
    async fn write(&self, path: &str, contents: &[u8]) -> Result<()> {
        self.before().await;
        self.inner.write(path, contents).await
    }

    async fn update(&self, path: &str, contents: &[u8]) -> Result<()> {
        self.before().await;
        self.inner.update(path, contents).await
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.before().await;
        self.inner.read(path).await
    }

    async fn rename(&self, path: &str, new_path: &str) -> Result<()> {
        self.before().await;
        self.inner.rename(path, new_path).await
    }

    async fn copy(&self, path: &str, new_path: &str) -> Result<()> {
        self.before().await;
        self.inner.copy(path, new_path).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.before().await;
        self.inner.delete(path).await
    }

    async fn create_dir(&self, dir: &str) -> Result<()> {
        self.before().await;
        self.inner.create_dir(dir).await
    }

    async fn delete_dir(&self, dir: &str) -> Result<()> {
        self.before().await;
        self.inner.delete_dir(dir).await
    }

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        self.before().await;
        self.inner.set_visibility(path, visibility).await
    }
}

/// Assert that `err` is a partial fan-out failure with exactly these failed indices.
pub fn assert_partial(err: &Error, failed: &[usize]) {
    match err {
        Error::PartialFailure(details) => assert_eq!(details.failed_indices(), failed),
        other => panic!("expected partial failure, got {other:?}"),
    }
}
