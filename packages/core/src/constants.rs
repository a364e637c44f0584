// ABOUTME: Filesystem locations used by PMStation
// ABOUTME: Resolves the data directory and default database path

use std::env;
use std::path::PathBuf;

/// Get the path to the PMStation directory (~/.pmstation)
pub fn pmstation_dir() -> PathBuf {
    // First try HOME environment variable (useful for tests)
    if let Ok(home) = env::var("HOME") {
        PathBuf::from(home).join(".pmstation")
    } else {
        // Fall back to dirs crate, then the working directory
        dirs::home_dir()
            .map(|home| home.join(".pmstation"))
            .unwrap_or_else(|| PathBuf::from(".pmstation"))
    }
}

/// Get the default SQLite database path (~/.pmstation/pmstation.db)
pub fn default_database_path() -> PathBuf {
    pmstation_dir().join("pmstation.db")
}
