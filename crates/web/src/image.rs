//! Filesystem image assembly
//!
//! Stages a serialized payload into a per-call scratch directory, invokes the
//! external image tool (`mkspiffs` by default) and returns the produced
//! binary. The scratch directory lives exactly as long as one build call:
//! the `TempDir` guard removes it on success, tool failure, and timeout
//! alike.

use crate::config::ImageToolConfig;
use esignage_common::{Error, Result};
use serde::Serialize;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Relative path of the staged payload inside the image filesystem.
const CONFIG_FILE_NAME: &str = "config.json";

pub struct ImageBuilder {
    cfg: ImageToolConfig,
}

impl ImageBuilder {
    pub fn new(cfg: ImageToolConfig) -> Self {
        Self { cfg }
    }

    /// Build a filesystem image containing `payload` serialized with the
    /// same JSON encoding the plain configuration endpoint uses.
    pub async fn build<T: Serialize>(&self, payload: &T) -> Result<Vec<u8>> {
        let scratch = tempfile::tempdir()?;
        let fs_dir = scratch.path().join("fs");
        tokio::fs::create_dir(&fs_dir).await?;

        let encoded = serde_json::to_vec(payload)?;
        tokio::fs::write(fs_dir.join(CONFIG_FILE_NAME), &encoded).await?;

        let image_path = scratch.path().join("config.bin");

        debug!(
            "Invoking {} in {:?} ({} payload bytes)",
            self.cfg.tool_path,
            scratch.path(),
            encoded.len()
        );

        // The tool's stdout/stderr are inherited for diagnosis, not parsed.
        let mut child = Command::new(&self.cfg.tool_path)
            .arg("-c")
            .arg(&fs_dir)
            .arg("-b")
            .arg(self.cfg.block_size.to_string())
            .arg("-p")
            .arg(self.cfg.page_size.to_string())
            .arg("-s")
            .arg(&self.cfg.image_size)
            .arg(&image_path)
            .spawn()
            .map_err(|e| {
                Error::ImageBuildFailed(format!("failed to launch {}: {}", self.cfg.tool_path, e))
            })?;

        let status = match tokio::time::timeout(
            Duration::from_secs(self.cfg.timeout_secs),
            child.wait(),
        )
        .await
        {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(Error::Timeout {
                    seconds: self.cfg.timeout_secs,
                });
            }
        };

        if !status.success() {
            return Err(Error::ImageBuildFailed(format!(
                "{} exited with {}",
                self.cfg.tool_path, status
            )));
        }

        // Never stream a partial or absent artifact
        tokio::fs::read(&image_path).await.map_err(|_| {
            Error::ImageBuildFailed(format!("{} produced no output file", self.cfg.tool_path))
        })
    }
}
