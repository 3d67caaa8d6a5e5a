//! Multi-adapter filesystems built out of other filesystems.
//!
//! These types implement the [`Filesystem`](crate::Filesystem) trait by
//! coordinating underlying adapters, so they compose with each other and with
//! plain adapters.
//!
//! # Available Patterns
//!
//! - [`MirrorFilesystem`] - Fans every operation out to all adapters concurrently
//! - [`ReadOnlyFilesystem`] - Forwards reads and rejects every mutation
//!
//! # Examples
//!
//! ## Mirroring two local directories
//!
//! ```no_run
//! # use flyfs::{Filesystem, LocalFilesystem};
//! # async fn example() -> flyfs::Result<()> {
//! use flyfs::multi::MirrorFilesystem;
//!
//! let fs = MirrorFilesystem::builder()
//!     .add_adapter(LocalFilesystem::new("/storage-1")?)
//!     .add_adapter(LocalFilesystem::new("/storage-2")?)
//!     .build()?;
//!
//! // Lands in both directories
//! fs.write("file.txt", b"hello").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Nesting mirrors
//!
//! ```no_run
//! # use flyfs::{Filesystem, LocalFilesystem, MemoryFilesystem};
//! # async fn example() -> flyfs::Result<()> {
//! use flyfs::multi::MirrorFilesystem;
//!
//! let disks = MirrorFilesystem::builder()
//!     .add_adapter(LocalFilesystem::new("/storage-1")?)
//!     .add_adapter(LocalFilesystem::new("/storage-2")?)
//!     .build()?;
//!
//! let fs = MirrorFilesystem::builder()
//!     .add_adapter(disks)
//!     .add_adapter(MemoryFilesystem::new())
//!     .build()?;
//!
//! fs.write("file.txt", b"three copies").await?;
//! # Ok(())
//! # }
//! ```

mod mirror;
mod readonly;

pub use mirror::{MirrorFilesystem, MirrorFilesystemBuilder};
pub use readonly::ReadOnlyFilesystem;
