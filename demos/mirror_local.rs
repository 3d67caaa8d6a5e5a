//! Mirroring writes across two local directories and an in-memory copy.
//!
//! Run with:
//! ```sh
//! RUST_LOG=flyfs=debug cargo run --example mirror_local --features="memory,local"
//! ```

use flyfs::multi::{MirrorFilesystem, ReadOnlyFilesystem};
use flyfs::{Error, Filesystem, FilesystemExt, LocalFilesystem, MemoryFilesystem, Visibility};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Mirror Examples ===\n");

    example_1_mirror_two_directories().await?;
    example_2_partial_failure().await?;
    example_3_read_fallback().await?;

    println!("\n=== All examples completed successfully! ===");
    Ok(())
}

/// Every mutation lands in both directories; a delete removes both copies.
async fn example_1_mirror_two_directories() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Example 1: Two directories ---");

    let temp = TempDir::new()?;
    let fs = MirrorFilesystem::builder()
        .add_adapter(LocalFilesystem::new(temp.path().join("sub1"))?)
        .add_adapter(LocalFilesystem::new(temp.path().join("sub2"))?)
        .build()?;

    fs.write("a.txt", b"hi").await?;
    fs.set_visibility("a.txt", Visibility::Private).await?;
    for sub in ["sub1", "sub2"] {
        let on_disk = std::fs::read_to_string(temp.path().join(sub).join("a.txt"))?;
        println!("✓ {sub}/a.txt = {on_disk:?}");
    }

    fs.delete("a.txt").await?;
    match fs.read("a.txt").await {
        Err(e) if e.is_not_found() => println!("✓ a.txt gone from every adapter"),
        other => println!("unexpected: {other:?}"),
    }

    println!();
    Ok(())
}

/// One adapter refuses writes: the others keep the data and the caller
/// learns exactly which index failed.
async fn example_2_partial_failure() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Example 2: Partial failure ---");

    let temp = TempDir::new()?;
    let memory = MemoryFilesystem::new();
    let fs = MirrorFilesystem::builder()
        .add_adapter(LocalFilesystem::new(temp.path())?)
        .add_adapter(ReadOnlyFilesystem::new(MemoryFilesystem::new()))
        .add_adapter(memory.clone())
        .build()?;

    match fs.write("b.txt", b"x").await {
        Err(Error::PartialFailure(details)) => {
            println!("✗ {details}");
            println!("  succeeded on {:?}", details.successful_indices());
            for (idx, error) in &details.failures {
                println!("  adapter {idx}: {error}");
            }
        }
        other => println!("unexpected: {other:?}"),
    }
    println!(
        "✓ in-memory copy holds {} bytes",
        memory.contents("b.txt").map_or(0, |c| c.len())
    );

    println!();
    Ok(())
}

/// Reads come from the canonical adapter, falling back in order.
async fn example_3_read_fallback() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Example 3: Read fallback ---");

    let canonical = MemoryFilesystem::new();
    let backup = MemoryFilesystem::new();
    backup.write("report.txt", b"from the backup").await?;

    let fs = MirrorFilesystem::builder()
        .add_adapter(canonical)
        .add_adapter(backup)
        .build()?;

    println!("✓ read: {}", fs.read_string("report.txt").await?);

    Ok(())
}
