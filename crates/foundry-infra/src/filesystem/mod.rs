//! Filesystem adapter and data directory layout.
//!
//! Implements the `FileSystem` trait from `foundry-core` over `tokio::fs`.

use std::path::{Path, PathBuf};

use foundry_core::fs::FileSystem;

/// Environment variable that relocates the data directory.
pub const DATA_DIR_ENV: &str = "FOUNDRY_DATA_DIR";

/// Local filesystem implementation of the `FileSystem` trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }

    /// `{data_dir}/capabilities/`: one `<name>.py` per synthesized capability.
    pub fn capabilities_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("capabilities")
    }

    /// `{data_dir}/workers/`: one program per worker.
    pub fn workers_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("workers")
    }
}

impl FileSystem for LocalFileSystem {
    async fn write_file(&self, path: &Path, content: &str) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await
    }

    async fn read_file(&self, path: &Path) -> Result<String, std::io::Error> {
        tokio::fs::read_to_string(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), std::io::Error> {
        tokio::fs::create_dir_all(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    #[cfg(unix)]
    async fn set_executable(&self, path: &Path) -> Result<(), std::io::Error> {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
    }

    #[cfg(not(unix))]
    async fn set_executable(&self, _path: &Path) -> Result<(), std::io::Error> {
        Ok(())
    }
}

/// Resolve the data directory.
///
/// Priority:
/// 1. `FOUNDRY_DATA_DIR` environment variable
/// 2. `~/.foundry`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".foundry");
    }

    // Last resort: current directory
    PathBuf::from(".foundry")
}
