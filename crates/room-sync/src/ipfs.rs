//! IPFS-backed content store.
//!
//! Drives the `ipfs` CLI for identity, publishing and bootstrap management,
//! and `ipget` for retrieving content by IPNS name. Each operation runs one
//! or more subprocesses; failures carry the subprocess's stderr.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use room_core::protocol::is_valid_address;
use room_core::store::Result;
use room_core::{ContentStore, PersonalId, StoreError};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const ADDED_MARK: &str = "added";
const PUBLISHED_MARK: &str = "Published to";

pub struct IpfsStore {
    ipfs_path: PathBuf,
    ipget_path: PathBuf,
    daemon: Mutex<Option<Child>>,
}

impl IpfsStore {
    pub fn new(ipfs_path: PathBuf, ipget_path: PathBuf) -> Self {
        Self {
            ipfs_path,
            ipget_path,
            daemon: Mutex::new(None),
        }
    }

    async fn execute<I, S>(&self, program: &Path, args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        let command_line = || {
            let shown: Vec<_> = args.iter().map(|a| a.to_string_lossy()).collect();
            format!("{} {}", program.display(), shown.join(" "))
        };

        debug!("Running {}", command_line());
        let output = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(StoreError::CommandFailed {
                command: command_line(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    async fn ipfs(&self, args: &[&str]) -> Result<String> {
        let out = self.execute(&self.ipfs_path, args).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Point this node's IPNS name at `/ipfs/<hash>`. Returns the name.
    pub async fn publish_name(&self, hash: &str) -> Result<String> {
        let target = format!("/ipfs/{}", hash);
        let output = self.ipfs(&["name", "publish", &target, "--local"]).await?;
        if !output.contains(PUBLISHED_MARK) {
            return Err(StoreError::UnexpectedOutput(format!("publishing error: {}", output)));
        }
        Ok(parse_published_name(&output).unwrap_or(hash).to_string())
    }

    /// Clear the bootstrap list.
    pub async fn clear_bootstrap_list(&self) -> Result<()> {
        self.ipfs(&["bootstrap", "rm", "--all"]).await?;
        Ok(())
    }

    /// Write the current bootstrap list to `file`, one address per line.
    pub async fn save_bootstrap_list(&self, file: &Path) -> Result<()> {
        let output = self.ipfs(&["bootstrap", "list"]).await?;
        tokio::fs::write(file, output).await?;
        info!("Saved bootstrap list to {}", file.display());
        Ok(())
    }

    /// Replace the bootstrap list with the one saved in `file`.
    pub async fn load_bootstrap_list(&self, file: &Path) -> Result<()> {
        let content = tokio::fs::read_to_string(file).await?;
        let peers = parse_bootstrap_list(&content);
        self.set_bootstrap_peers(&peers).await?;
        info!("Restored {} bootstrap peer(s) from {}", peers.len(), file.display());
        Ok(())
    }
}

/// One address per non-blank line, as printed by `ipfs bootstrap list`.
pub fn parse_bootstrap_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Hash of the last `added <hash> <name>` line (the root directory).
pub fn parse_added_hash(output: &str) -> Option<&str> {
    let pos = output.rfind(ADDED_MARK)?;
    output[pos + ADDED_MARK.len()..].split_whitespace().next()
}

/// Name from `Published to <name>: /ipfs/<hash>`.
pub fn parse_published_name(output: &str) -> Option<&str> {
    let pos = output.find(PUBLISHED_MARK)?;
    let rest = output[pos + PUBLISHED_MARK.len()..].trim_start();
    let name = rest.split(':').next()?.trim();
    (!name.is_empty()).then_some(name)
}

#[async_trait]
impl ContentStore for IpfsStore {
    async fn identity(&self) -> Result<PersonalId> {
        let out = self.execute(&self.ipfs_path, ["id"]).await?;
        serde_json::from_slice(&out).map_err(|e| StoreError::UnexpectedOutput(e.to_string()))
    }

    async fn fetch_by_name(&self, name: &str, dest: &Path) -> Result<()> {
        let source = format!("/ipns/{}", name);
        self.execute(
            &self.ipget_path,
            [OsStr::new("-o"), dest.as_os_str(), OsStr::new(&source)],
        )
        .await?;
        Ok(())
    }

    async fn publish(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.display().to_string()));
        }

        let out = self
            .execute(
                &self.ipfs_path,
                [OsStr::new("add"), OsStr::new("-r"), path.as_os_str()],
            )
            .await?;
        let output = String::from_utf8_lossy(&out);
        let hash = parse_added_hash(&output)
            .ok_or_else(|| StoreError::UnexpectedOutput(format!("processing error: {}", output)))?;

        debug!("Added {} as {}", path.display(), hash);
        self.publish_name(hash).await
    }

    async fn set_bootstrap_peers(&self, peers: &[String]) -> Result<()> {
        self.clear_bootstrap_list().await?;
        for peer in peers {
            if !is_valid_address(peer) {
                debug!("Skipping bootstrap address {}", peer);
                continue;
            }
            self.ipfs(&["bootstrap", "add", peer]).await?;
        }
        Ok(())
    }

    async fn start_daemon(&self) -> Result<()> {
        let mut daemon = self.daemon.lock().await;
        if daemon.is_some() {
            debug!("Daemon already running");
            return Ok(());
        }

        let child = Command::new(&self.ipfs_path)
            .arg("daemon")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        info!("Started ipfs daemon (pid {:?})", child.id());
        *daemon = Some(child);
        Ok(())
    }

    async fn stop_daemon(&self) -> Result<()> {
        let Some(mut child) = self.daemon.lock().await.take() else {
            return Ok(());
        };
        if let Err(e) = child.kill().await {
            warn!("Failed to stop ipfs daemon: {}", e);
            return Err(e.into());
        }
        info!("Stopped ipfs daemon");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_added_hash_takes_root() {
        let output = "added QmFile1 docs/a.md\nadded QmFile2 docs/b.md\nadded QmRootHash docs\n";
        assert_eq!(parse_added_hash(output), Some("QmRootHash"));
    }

    #[test]
    fn test_parse_added_hash_missing() {
        assert_eq!(parse_added_hash("Error: no such file"), None);
        assert_eq!(parse_added_hash("added"), None);
    }

    #[test]
    fn test_parse_published_name() {
        let output = "Published to QmSelfPeer: /ipfs/QmRootHash\n";
        assert_eq!(parse_published_name(output), Some("QmSelfPeer"));
        assert_eq!(parse_published_name("nothing here"), None);
    }

    #[test]
    fn test_parse_bootstrap_list() {
        let saved = "/ip4/1.2.3.4/tcp/4001/p2p/QmA\n\n  /ip4/5.6.7.8/tcp/4001/p2p/QmB  \r\n\n";
        assert_eq!(
            parse_bootstrap_list(saved),
            vec![
                "/ip4/1.2.3.4/tcp/4001/p2p/QmA".to_string(),
                "/ip4/5.6.7.8/tcp/4001/p2p/QmB".to_string(),
            ]
        );
        assert!(parse_bootstrap_list("").is_empty());
        assert!(parse_bootstrap_list("\n \n").is_empty());
    }

    /// Shell script standing in for a binary; writes its second argument
    /// to `out` byte for byte.
    #[cfg(unix)]
    fn recording_binary(dir: &Path, name: &str, out: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let bin = dir.join(name);
        let script = format!("#!/bin/sh\nprintf '%s' \"$2\" > '{}'\n", out.display());
        std::fs::write(&bin, script).unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        bin
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_passes_non_utf8_path_unchanged() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("args");
        let ipget = recording_binary(dir.path(), "ipget", &out);
        let store = IpfsStore::new(PathBuf::from("ipfs"), ipget);

        let dest = dir.path().join(OsStr::from_bytes(b"notes-\xff"));
        store.fetch_by_name("QmPeer", &dest).await.unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), dest.as_os_str().as_bytes());
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let store = IpfsStore::new(
            PathBuf::from("/nonexistent/ipfs"),
            PathBuf::from("/nonexistent/ipget"),
        );
        assert!(matches!(store.identity().await, Err(StoreError::Io(_))));
    }

    #[tokio::test]
    async fn test_publish_missing_path() {
        let store = IpfsStore::new(PathBuf::from("ipfs"), PathBuf::from("ipget"));
        let result = store.publish(Path::new("/nonexistent/dir")).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_stop_without_daemon() {
        let store = IpfsStore::new(PathBuf::from("ipfs"), PathBuf::from("ipget"));
        store.stop_daemon().await.unwrap();
    }
}
