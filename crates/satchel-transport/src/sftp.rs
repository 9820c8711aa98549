//! SFTP transport
//!
//! Drives the system `sftp` client in batch mode with key-based
//! authentication. Deposits never go over SFTP: archives are pushed through
//! the object store, so [`Transport::send_file`] reports `Unsupported`.

use crate::traits::{RemoteHandle, Transport};
use crate::utils::{file_name, join_key, relative_segments, with_retry};
use async_trait::async_trait;
use satchel_core::config::SftpSettings;
use satchel_core::{Error, Result, RetryPolicy};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

const DEFAULT_PROGRAM: &str = "sftp";

/// Pulls files from an SFTP host
#[derive(Debug, Clone)]
pub struct SftpTransport {
    host: String,
    port: u16,
    username: String,
    key_path: PathBuf,
    base_dir: String,
    program: PathBuf,
    policy: RetryPolicy,
}

impl SftpTransport {
    pub fn new(settings: &SftpSettings, policy: RetryPolicy) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            username: settings.username.clone(),
            key_path: settings.key_path.clone().into_std_path_buf(),
            base_dir: settings.base_dir.clone().unwrap_or_default(),
            program: PathBuf::from(DEFAULT_PROGRAM),
            policy,
        }
    }

    /// Use a different `sftp` executable
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn remote_path(&self, relative: Option<&str>) -> Result<String> {
        let segments = match relative {
            Some(relative) => relative_segments(relative)?,
            None => Vec::new(),
        };
        let joined = join_key(
            std::iter::once(self.base_dir.as_str()).chain(segments.iter().map(String::as_str)),
        );
        if self.base_dir.starts_with('/') {
            Ok(format!("/{}", joined))
        } else if joined.is_empty() {
            Ok(".".to_string())
        } else {
            Ok(joined)
        }
    }

    fn command_args(&self) -> Vec<String> {
        vec![
            "-b".to_string(),
            "-".to_string(),
            "-i".to_string(),
            self.key_path.display().to_string(),
            "-P".to_string(),
            self.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            format!("{}@{}", self.username, self.host),
        ]
    }

    /// Run one batch session, feeding `script` on stdin
    async fn run_batch(&self, script: &str, context: &str) -> Result<()> {
        with_retry(&self.policy, context, || async {
            let mut child = Command::new(&self.program)
                .args(self.command_args())
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| Error::transport(context, format!("failed to start sftp: {}", e)))?;

            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(script.as_bytes())
                    .await
                    .map_err(|e| Error::transport(context, e.to_string()))?;
            }

            let output = child
                .wait_with_output()
                .await
                .map_err(|e| Error::transport(context, e.to_string()))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(Error::transport(context, stderr.trim().to_string()));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl Transport for SftpTransport {
    fn name(&self) -> &'static str {
        "sftp"
    }

    async fn send_file(&self, _local_path: &Path, _remote_dir: Option<&str>) -> Result<RemoteHandle> {
        Err(Error::unsupported(self.name(), "send_file"))
    }

    async fn retrieve_file(&self, remote_path: &str, local_dir: &Path) -> Result<PathBuf> {
        let remote = self.remote_path(Some(remote_path))?;
        let name = file_name(Path::new(&remote))?;
        tokio::fs::create_dir_all(local_dir).await?;

        let dest = local_dir.join(name);
        let script = format!("get {} {}\n", quote(&remote), quote(&dest.display().to_string()));
        let context = format!("get sftp://{}/{}", self.host, remote.trim_start_matches('/'));
        self.run_batch(&script, &context).await?;

        debug!("Retrieved {}", dest.display());
        Ok(dest)
    }

    async fn retrieve_from_path(&self, local_path: &Path, remote_path: Option<&str>) -> Result<()> {
        let remote = self.remote_path(remote_path)?;
        tokio::fs::create_dir_all(local_path).await?;

        let script = batch_script_for_tree(&remote, local_path);
        let context = format!("get -r sftp://{}/{}", self.host, remote.trim_start_matches('/'));
        self.run_batch(&script, &context).await?;

        info!("Retrieved sftp://{}/{} into {}", self.host, remote, local_path.display());
        Ok(())
    }
}

/// Commands that mirror `remote` into `local`
fn batch_script_for_tree(remote: &str, local: &Path) -> String {
    format!(
        "lcd {}\ncd {}\nget -r *\n",
        quote(&local.display().to_string()),
        quote(remote)
    )
}

// sftp batch files accept double-quoted arguments with backslash escapes
fn quote(arg: &str) -> String {
    let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}
