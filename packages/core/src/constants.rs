use std::env;
use std::path::PathBuf;

/// Get the path to the DroneGuide directory (~/.droneguide)
pub fn droneguide_dir() -> PathBuf {
    // HOME first so tests can redirect it
    if let Ok(home) = env::var("HOME") {
        PathBuf::from(home).join(".droneguide")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".droneguide")
    }
}

/// Default SQLite database location (~/.droneguide/droneguide.db)
pub fn database_file() -> PathBuf {
    droneguide_dir().join("droneguide.db")
}

/// Persisted client identity (~/.droneguide/client.json)
pub fn identity_file() -> PathBuf {
    droneguide_dir().join("client.json")
}
