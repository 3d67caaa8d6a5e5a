use crate::{Error, FanOutFailure, Filesystem, Operation, Result, Visibility};
use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Replicates every operation across an ordered set of adapters.
///
/// Each call spawns one task per adapter and waits for all of them before
/// returning (fork-join). Adapters run independently: there is no two-phase
/// commit and nothing is rolled back when a sibling fails.
///
/// ## Mutating operations
///
/// `write`, `update`, `rename`, `copy`, `delete`, `create_dir`, `delete_dir`
/// and `set_visibility` succeed only if every adapter succeeded. Otherwise the
/// call returns [`Error::PartialFailure`] (some adapters succeeded) or
/// [`Error::TotalFailure`] (none did), carrying every adapter's error.
///
/// **A failed mutating call does not mean no adapter was mutated.** After a
/// partial failure the succeeding adapters hold the new state and the failing
/// ones the old state. The mirror never reconciles them.
///
/// ## Reads
///
/// `read` is issued to every adapter. The content of the canonical adapter
/// (index 0 unless configured) is returned when it succeeded; otherwise the
/// content of the first adapter in order that succeeded. Contents are not
/// compared between adapters. If every adapter fails the call returns
/// [`Error::TotalFailure`].
///
/// ## Timeouts
///
/// By default an adapter call may take arbitrarily long, and a hung adapter
/// hangs the mirror call. [`MirrorFilesystemBuilder::adapter_timeout`] bounds
/// each adapter call; an elapsed call is cancelled and reported as that
/// adapter's [`Error::Timeout`].
///
/// Cancellation reaches every adapter task: when a mirror call is dropped
/// before it completes (for instance by the timeout of an enclosing mirror),
/// the tasks it spawned are aborted rather than left running.
///
/// The adapter list is fixed at construction. A `MirrorFilesystem` is itself a
/// [`Filesystem`], so mirrors nest.
pub struct MirrorFilesystem {
    adapters: Vec<Arc<dyn Filesystem>>,
    canonical_index: usize,
    adapter_timeout: Option<Duration>,
}

impl MirrorFilesystem {
    /// Create a builder for configuring a mirror.
    pub fn builder() -> MirrorFilesystemBuilder {
        MirrorFilesystemBuilder::new()
    }

    /// Create a mirror with default settings (canonical index 0, no timeout).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generic`] if `adapters` is empty.
    pub fn new(adapters: Vec<Arc<dyn Filesystem>>) -> Result<Self> {
        adapters
            .into_iter()
            .fold(Self::builder(), |builder, adapter| builder.add_shared(adapter))
            .build()
    }

    /// Get the number of adapters.
    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }

    /// Get a reference to a specific adapter by index.
    pub fn adapter(&self, index: usize) -> Option<&Arc<dyn Filesystem>> {
        self.adapters.get(index)
    }

    /// Index of the adapter whose content `read` prefers.
    pub fn canonical_index(&self) -> usize {
        self.canonical_index
    }

    /// Get the per-adapter timeout.
    pub fn adapter_timeout(&self) -> Option<Duration> {
        self.adapter_timeout
    }

    /// Run `op` against every adapter on its own task and wait for all of them.
    ///
    /// Results are returned in adapter order.
    async fn fan_out<T, F>(&self, operation: Operation, path: &str, op: F) -> Vec<Result<T>>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn Filesystem>) -> BoxFuture<'static, Result<T>>,
    {
        tracing::debug!(
            %operation,
            ?path,
            adapter_count = self.adapters.len(),
            "Fanning out"
        );

        let handles: Vec<_> = self
            .adapters
            .iter()
            .map(|adapter| {
                let fut = op(Arc::clone(adapter));
                let timeout = self.adapter_timeout;
                tokio::spawn(async move {
                    match timeout {
                        Some(limit) => tokio::time::timeout(limit, fut)
                            .await
                            .unwrap_or(Err(Error::Timeout(limit))),
                        None => fut.await,
                    }
                })
            })
            .collect();

        // Dropping the fan-out (an outer timeout, a cancelled caller) must not
        // leave adapter tasks running detached.
        let _abort: Vec<AbortOnDrop> = handles
            .iter()
            .map(|handle| AbortOnDrop(handle.abort_handle()))
            .collect();

        futures::future::join_all(handles)
            .await
            .into_iter()
            .enumerate()
            .map(|(idx, joined)| {
                let result = joined.unwrap_or_else(|e| {
                    Err(Error::Generic(format!("adapter {idx} task failed: {e}")))
                });
                if let Err(e) = &result {
                    tracing::warn!(%operation, ?path, adapter_index = idx, error = %e, "Adapter failed");
                }
                result
            })
            .collect()
    }

    /// Evaluate the results of a mutating fan-out.
    fn evaluate(operation: Operation, path: &str, results: Vec<Result<()>>) -> Result<()> {
        let mut successes = Vec::new();
        let mut failures = Vec::new();

        for (idx, result) in results.into_iter().enumerate() {
            match result {
                Ok(()) => successes.push(idx),
                Err(e) => failures.push((idx, Box::new(e))),
            }
        }

        if failures.is_empty() {
            return Ok(());
        }

        let details = FanOutFailure {
            operation,
            successes,
            failures,
        };

        if details.has_successes() {
            tracing::error!(
                %operation,
                ?path,
                success_count = details.success_count(),
                failure_count = details.failure_count(),
                "Mirror operation failed partially, adapters are now inconsistent"
            );
            Err(Error::PartialFailure(details))
        } else {
            tracing::error!(%operation, ?path, "Mirror operation failed on all adapters");
            Err(Error::TotalFailure(details))
        }
    }

    /// Pick the read result: canonical adapter first, then first success in order.
    fn select_read(&self, path: &str, results: Vec<Result<Vec<u8>>>) -> Result<Vec<u8>> {
        let canonical = self.canonical_index;
        let chosen = if matches!(results.get(canonical), Some(Ok(_))) {
            Some(canonical)
        } else {
            results.iter().position(|r| r.is_ok())
        };

        let mut failures = Vec::new();
        for (idx, result) in results.into_iter().enumerate() {
            match result {
                Ok(contents) if Some(idx) == chosen => {
                    if idx != canonical {
                        tracing::warn!(
                            ?path,
                            canonical_index = canonical,
                            adapter_index = idx,
                            "Canonical adapter failed, read served by fallback"
                        );
                    }
                    return Ok(contents);
                }
                Ok(_) => {}
                Err(e) => failures.push((idx, Box::new(e))),
            }
        }

        tracing::error!(?path, "Read failed on all adapters");
        Err(Error::TotalFailure(FanOutFailure {
            operation: Operation::Read,
            successes: Vec::new(),
            failures,
        }))
    }

    async fn mutate<F>(&self, operation: Operation, path: &str, op: F) -> Result<()>
    where
        F: Fn(Arc<dyn Filesystem>) -> BoxFuture<'static, Result<()>>,
    {
        let results = self.fan_out(operation, path, op).await;
        Self::evaluate(operation, path, results)
    }
}

/// Aborts the task when dropped. A finished task is unaffected.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Debug for MirrorFilesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorFilesystem")
            .field("adapters", &self.adapters)
            .field("canonical_index", &self.canonical_index)
            .field("adapter_timeout", &self.adapter_timeout)
            .finish()
    }
}

#[async_trait]
impl Filesystem for MirrorFilesystem {
    async fn write(&self, path: &str, contents: &[u8]) -> Result<()> {
        let contents = Bytes::copy_from_slice(contents);
        let owned = path.to_string();
        self.mutate(Operation::Write, path, |adapter| {
            let path = owned.clone();
            let contents = contents.clone();
            async move { adapter.write(&path, &contents).await }.boxed()
        })
        .await
    }

    async fn update(&self, path: &str, contents: &[u8]) -> Result<()> {
        let contents = Bytes::copy_from_slice(contents);
        let owned = path.to_string();
        self.mutate(Operation::Update, path, |adapter| {
            let path = owned.clone();
            let contents = contents.clone();
            async move { adapter.update(&path, &contents).await }.boxed()
        })
        .await
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let owned = path.to_string();
        let results = self
            .fan_out(Operation::Read, path, |adapter| {
                let path = owned.clone();
                async move { adapter.read(&path).await }.boxed()
            })
            .await;
        self.select_read(path, results)
    }

    async fn rename(&self, path: &str, new_path: &str) -> Result<()> {
        let from = path.to_string();
        let to = new_path.to_string();
        self.mutate(Operation::Rename, path, |adapter| {
            let (from, to) = (from.clone(), to.clone());
            async move { adapter.rename(&from, &to).await }.boxed()
        })
        .await
    }

    async fn copy(&self, path: &str, new_path: &str) -> Result<()> {
        let from = path.to_string();
        let to = new_path.to_string();
        self.mutate(Operation::Copy, path, |adapter| {
            let (from, to) = (from.clone(), to.clone());
            async move { adapter.copy(&from, &to).await }.boxed()
        })
        .await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let owned = path.to_string();
        self.mutate(Operation::Delete, path, |adapter| {
            let path = owned.clone();
            async move { adapter.delete(&path).await }.boxed()
        })
        .await
    }

    async fn create_dir(&self, dir: &str) -> Result<()> {
        let owned = dir.to_string();
        self.mutate(Operation::CreateDir, dir, |adapter| {
            let dir = owned.clone();
            async move { adapter.create_dir(&dir).await }.boxed()
        })
        .await
    }

    async fn delete_dir(&self, dir: &str) -> Result<()> {
        let owned = dir.to_string();
        self.mutate(Operation::DeleteDir, dir, |adapter| {
            let dir = owned.clone();
            async move { adapter.delete_dir(&dir).await }.boxed()
        })
        .await
    }

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        let owned = path.to_string();
        self.mutate(Operation::SetVisibility, path, |adapter| {
            let path = owned.clone();
            async move { adapter.set_visibility(&path, visibility).await }.boxed()
        })
        .await
    }
}

/// Builder for [`MirrorFilesystem`].
#[derive(Default)]
pub struct MirrorFilesystemBuilder {
    adapters: Vec<Arc<dyn Filesystem>>,
    canonical_index: usize,
    adapter_timeout: Option<Duration>,
}

impl MirrorFilesystemBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter to the mirror.
    pub fn add_adapter<F: Filesystem + 'static>(self, adapter: F) -> Self {
        self.add_shared(Arc::new(adapter))
    }

    /// Add an adapter that is also held elsewhere.
    pub fn add_shared(mut self, adapter: Arc<dyn Filesystem>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Set the adapter whose content `read` prefers (default: 0).
    pub fn canonical_index(mut self, index: usize) -> Self {
        self.canonical_index = index;
        self
    }

    /// Bound every adapter call (default: unbounded).
    pub fn adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = Some(timeout);
        self
    }

    /// Build the mirror.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generic`] if no adapter was added or the canonical
    /// index is out of bounds.
    pub fn build(self) -> Result<MirrorFilesystem> {
        if self.adapters.is_empty() {
            return Err(Error::Generic(
                "MirrorFilesystem requires at least one adapter".to_string(),
            ));
        }
        if self.canonical_index >= self.adapters.len() {
            return Err(Error::Generic(format!(
                "Canonical index {} out of bounds (have {} adapters)",
                self.canonical_index,
                self.adapters.len()
            )));
        }

        Ok(MirrorFilesystem {
            adapters: self.adapters,
            canonical_index: self.canonical_index,
            adapter_timeout: self.adapter_timeout,
        })
    }
}

impl Debug for MirrorFilesystemBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorFilesystemBuilder")
            .field("adapter_count", &self.adapters.len())
            .field("canonical_index", &self.canonical_index)
            .field("adapter_timeout", &self.adapter_timeout)
            .finish()
    }
}
