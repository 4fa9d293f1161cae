// Log file initialisation
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::errors::Result;

/// Route `tracing` output to `log_file` (appending).
///
/// `RUST_LOG` wins over `default_filter`. The console stays free for
/// progress bars and the run summary. Calling twice is a no-op.
pub fn init_logging(log_file: &Path, default_filter: &str) -> Result<()> {
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(file))
        .try_init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_log_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("ragbench.log");
        init_logging(&path, "info").unwrap();
        assert!(path.exists());
        // Second init must not fail
        init_logging(&path, "debug").unwrap();
    }
}
