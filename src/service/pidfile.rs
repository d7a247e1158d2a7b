// ABOUTME: PID file lifecycle for the router's service-manager integration

use std::io;
use std::path::{Path, PathBuf};

pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id to `path`, truncating any
    /// previous contents. The file is removed by `Drop`, so a clean
    /// shutdown always leaves no pidfile behind; a crash leaves a
    /// stale one, which is the service manager's problem to notice.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::write(&path, format!("{}\n", std::process::id()))?;
        Ok(PidFile { path })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove pidfile");
            }
        }
    }
}
