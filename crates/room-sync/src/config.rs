//! Configuration loading and management

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use room_core::protocol::{MIN_ROOM_ID_LEN, is_valid_room_id};
use serde::{Deserialize, Serialize};

/// Minimum length of a usable rendezvous host address.
pub const MIN_HOST_LEN: usize = 10;

/// Main configuration for a room-sync peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the `ipfs` executable
    #[serde(default = "default_ipfs_path")]
    pub ipfs_path: PathBuf,

    /// Path to the `ipget` executable
    #[serde(default = "default_ipget_path")]
    pub ipget_path: PathBuf,

    /// Rendezvous service to talk to (`host:port` or URL)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen address for the in-process rendezvous service in host mode
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Directory kept in sync with the room
    pub working_dir: Option<PathBuf>,

    /// Upper bound for each step of a background sync run
    #[serde(default = "default_sync_step_timeout")]
    pub sync_step_timeout_secs: u64,

    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// Time given to a freshly started ipfs daemon before it is queried
    #[serde(default = "default_daemon_warmup")]
    pub daemon_warmup_secs: u64,

    /// File the engine's bootstrap list is saved to at start-up and
    /// restored from on exit
    pub bootstrap_backup: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl ShutdownConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Total time allowed for the rendezvous service to stop.
    pub fn deadline(&self) -> Duration {
        self.retry_delay().saturating_mul(self.max_attempts)
    }
}

fn default_ipfs_path() -> PathBuf {
    PathBuf::from("ipfs")
}

fn default_ipget_path() -> PathBuf {
    PathBuf::from("ipget")
}

fn default_host() -> String {
    "localhost:3100".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:3100".to_string()
}

fn default_sync_step_timeout() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    5
}

fn default_daemon_warmup() -> u64 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ipfs_path: default_ipfs_path(),
            ipget_path: default_ipget_path(),
            host: default_host(),
            listen: default_listen(),
            working_dir: None,
            sync_step_timeout_secs: default_sync_step_timeout(),
            shutdown: ShutdownConfig::default(),
            daemon_warmup_secs: default_daemon_warmup(),
            bootstrap_backup: None,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            tracing::debug!("No config file given, using defaults");
            return Ok(Config::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn sync_step_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_step_timeout_secs)
    }

    pub fn daemon_warmup(&self) -> Duration {
        Duration::from_secs(self.daemon_warmup_secs)
    }

    /// Check start-up requirements. `create` relaxes the host check since a
    /// host-mode peer talks to its own service.
    pub fn validate(&self, create: bool) -> Result<()> {
        find_executable(&self.ipfs_path)
            .with_context(|| format!("Invalid path to ipfs: {:?}", self.ipfs_path))?;
        find_executable(&self.ipget_path)
            .with_context(|| format!("Invalid path to ipget: {:?}", self.ipget_path))?;

        if !create && self.host.len() < MIN_HOST_LEN {
            bail!("Invalid host address: {:?}", self.host);
        }
        Ok(())
    }
}

/// Check a room id given on the command line.
pub fn validate_room_id(room_id: &str) -> Result<()> {
    if !is_valid_room_id(room_id) {
        bail!(
            "Invalid room id {:?}: expected at least {} characters",
            room_id,
            MIN_ROOM_ID_LEN
        );
    }
    Ok(())
}

/// Resolve an executable. Paths with a directory component must exist;
/// bare names are looked up on `PATH`.
pub fn find_executable(program: &Path) -> Result<PathBuf> {
    if program.components().count() > 1 {
        if program.is_file() {
            return Ok(program.to_path_buf());
        }
        bail!("{:?} does not exist", program);
    }

    let path_var = std::env::var_os("PATH").context("PATH is not set")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
        .with_context(|| format!("{:?} not found on PATH", program))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.host, "localhost:3100");
        assert_eq!(config.listen, "0.0.0.0:3100");
        assert_eq!(config.sync_step_timeout(), Duration::from_secs(300));
        assert_eq!(config.shutdown.deadline(), Duration::from_secs(25));
        assert!(config.working_dir.is_none());
    }

    #[test]
    fn test_huge_shutdown_values_saturate() {
        let shutdown = ShutdownConfig {
            max_attempts: u32::MAX,
            retry_delay_secs: u64::MAX,
        };
        assert_eq!(shutdown.deadline(), Duration::MAX);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(
            &file,
            r#"{"host": "rooms.example.com:3100", "shutdown": {"max_attempts": 2}}"#,
        )
        .unwrap();

        let config = Config::load(Some(&file)).unwrap();
        assert_eq!(config.host, "rooms.example.com:3100");
        assert_eq!(config.ipfs_path, PathBuf::from("ipfs"));
        assert_eq!(config.shutdown.max_attempts, 2);
        assert_eq!(config.shutdown.retry_delay_secs, 5);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.json"))).is_err());
    }

    #[test]
    fn test_load_without_path() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.daemon_warmup(), Duration::from_secs(3));
    }

    #[test]
    fn test_find_executable_explicit_path() {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("ipfs");
        std::fs::write(&bin, b"").unwrap();

        assert_eq!(find_executable(&bin).unwrap(), bin);
        assert!(find_executable(&dir.path().join("ipget")).is_err());
    }

    #[test]
    fn test_find_executable_bare_name_missing() {
        assert!(find_executable(Path::new("definitely-not-a-real-binary-xyz")).is_err());
    }

    #[test]
    fn test_validate_short_host() {
        let dir = TempDir::new().unwrap();
        let ipfs = dir.path().join("ipfs");
        let ipget = dir.path().join("ipget");
        std::fs::write(&ipfs, b"").unwrap();
        std::fs::write(&ipget, b"").unwrap();

        let config = Config {
            ipfs_path: ipfs,
            ipget_path: ipget,
            host: "a:1".into(),
            ..Default::default()
        };
        assert!(config.validate(false).is_err());
        assert!(config.validate(true).is_ok());
    }

    #[test]
    fn test_validate_room_id() {
        assert!(validate_room_id("short").is_err());
        assert!(validate_room_id("0123456789abcdef").is_ok());
    }
}
