//! Registry configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where and how the registry keeps its sessions.
///
/// Start from `RegistryConfig::default()` and override what you need:
///
/// ```rust
/// use std::time::Duration;
/// use lorahub_registry::RegistryConfig;
///
/// let config = RegistryConfig {
///     open_timeout: Duration::from_secs(5),
///     ..RegistryConfig::default()
/// };
/// assert_eq!(config.bucket, "applications");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Path of the database file. Created if missing.
    pub path: PathBuf,

    /// Name of the table holding session entries.
    pub bucket: String,

    /// How long to wait for another handle to release the database file
    /// before giving up.
    ///
    /// Default: 1 second. `Duration::ZERO` fails immediately.
    pub open_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("handler_sessions.redb"),
            bucket: "applications".to_string(),
            open_timeout: Duration::from_secs(1),
        }
    }
}
