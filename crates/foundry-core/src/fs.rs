//! FileSystem trait for abstracting file I/O.
//!
//! Defined in foundry-core so the synthesizer, materializer and launch
//! controller can touch files without depending on any specific filesystem
//! implementation. The `LocalFileSystem` adapter lives in foundry-infra.

use std::path::Path;

/// Abstraction over filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Write string content to a file, replacing it if present.
    fn write_file(
        &self,
        path: &Path,
        content: &str,
    ) -> impl std::future::Future<Output = Result<(), std::io::Error>> + Send;

    /// Read a file's content as a string.
    fn read_file(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<String, std::io::Error>> + Send;

    /// Create a directory and all parent directories.
    fn create_dir_all(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<(), std::io::Error>> + Send;

    /// Check whether a path exists.
    fn exists(&self, path: &Path) -> impl std::future::Future<Output = bool> + Send;

    /// Mark a file executable by its owner (no-op where unsupported).
    fn set_executable(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<(), std::io::Error>> + Send;
}
