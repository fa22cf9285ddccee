//! Detached process spawning for launched workers.

use std::path::Path;
use std::process::{Command, Stdio};

use foundry_core::launch::ProcessSpawner;

/// Spawns programs in their own session with stdio detached, so they
/// outlive the launching process.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedSpawner;

impl DetachedSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSpawner for DetachedSpawner {
    fn spawn_detached(&self, program: &Path) -> std::io::Result<u32> {
        let mut command = Command::new(program);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        if let Some(dir) = program.parent() {
            command.current_dir(dir);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // SAFETY: setsid is async-signal-safe and touches no parent state.
            unsafe {
                command.pre_exec(|| {
                    if libc::setsid() == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        let child = command.spawn()?;
        let pid = child.id();
        tracing::debug!(program = %program.display(), pid, "Spawned detached process");
        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_an_error() {
        let err = DetachedSpawner::new()
            .spawn_detached(Path::new("/nonexistent/worker_001"))
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_spawns_executable_script() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let program = dir.path().join("worker_001");
        std::fs::write(
            &program,
            format!("#!/bin/sh\ntouch '{}'\n", marker.display()),
        )
        .unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let pid = DetachedSpawner::new().spawn_detached(&program).unwrap();
        assert!(pid > 0);

        for _ in 0..50 {
            if marker.exists() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(100));
        }
        assert!(marker.exists());
    }
}
