//! Content sinks fed by the transfer state machine.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use scpgate_common::helpers::fs::ensure_directory;
use scpgate_common::ScpCaptureConfig;
use sha2::{Digest, Sha256};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::*;
use uuid::Uuid;

use super::types::FileTransfer;
use crate::ScpError;

/// Receives the bytes of each transferred file.
#[async_trait]
pub trait ContentSink: Send {
    /// `chunk` holds only bytes belonging to `transfer`, never the trailing status byte.
    async fn process_data(&mut self, transfer: &FileTransfer, chunk: &[u8])
        -> Result<(), ScpError>;

    /// Called once the declared size of `transfer` has been received.
    async fn file_complete(&mut self, _transfer: &FileTransfer) -> Result<(), ScpError> {
        Ok(())
    }

    /// Gives a chance to alter a content packet before it is relayed.
    /// The returned packet must have the same length.
    fn rewrite_content(&mut self, packet: Bytes) -> Bytes {
        packet
    }
}

/// Observes transfers without storing anything
#[derive(Default)]
pub struct DiscardContent;

#[async_trait]
impl ContentSink for DiscardContent {
    async fn process_data(
        &mut self,
        _transfer: &FileTransfer,
        _chunk: &[u8],
    ) -> Result<(), ScpError> {
        Ok(())
    }
}

/// Information about a captured file
#[derive(Debug, Clone)]
pub struct CapturedFileSummary {
    pub id: Uuid,
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub hash: String,
    pub duration_ms: u64,
}

struct CapturedFile {
    id: Uuid,
    path: PathBuf,
    file: File,
    written: u64,
    hasher: Sha256,
    started_at: Instant,
}

/// Writes each transferred file to `<storage>/<file id>`.
///
/// The remote-supplied name only ever appears in logs.
pub struct FileCapture {
    storage_path: PathBuf,
    secure_storage: bool,
    current: Option<CapturedFile>,
    completed: Vec<CapturedFileSummary>,
}

impl FileCapture {
    pub fn new<P: Into<PathBuf>>(storage_path: P) -> Self {
        Self {
            storage_path: storage_path.into(),
            secure_storage: true,
            current: None,
            completed: vec![],
        }
    }

    pub fn from_config(config: &ScpCaptureConfig) -> Self {
        Self {
            secure_storage: config.secure_storage,
            ..Self::new(config.storage_path.clone())
        }
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    pub fn path_for(&self, id: &Uuid) -> PathBuf {
        self.storage_path.join(id.to_string())
    }

    pub fn completed(&self) -> &[CapturedFileSummary] {
        &self.completed
    }

    /// Id of the artifact currently being written, if any
    pub fn current_file(&self) -> Option<Uuid> {
        self.current.as_ref().map(|c| c.id)
    }

    async fn open(&mut self, id: Uuid) -> Result<CapturedFile, ScpError> {
        ensure_directory(&self.storage_path, self.secure_storage).map_err(|source| {
            ScpError::StorageDirectory {
                path: self.storage_path.clone(),
                source,
            }
        })?;

        let path = self.path_for(&id);
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| ScpError::StorageWrite {
                path: path.clone(),
                source,
            })?;

        Ok(CapturedFile {
            id,
            path,
            file,
            written: 0,
            hasher: Sha256::new(),
            started_at: Instant::now(),
        })
    }
}

#[async_trait]
impl ContentSink for FileCapture {
    async fn process_data(
        &mut self,
        transfer: &FileTransfer,
        chunk: &[u8],
    ) -> Result<(), ScpError> {
        let mut current = match self.current.take() {
            Some(current) if current.id == transfer.id => current,
            stale => {
                if let Some(stale) = stale {
                    warn!(file_id=%stale.id, written=stale.written, "Abandoning incomplete captured file");
                }
                self.open(transfer.id).await?
            }
        };

        if let Err(source) = current.file.write_all(chunk).await {
            return Err(ScpError::StorageWrite {
                path: current.path,
                source,
            });
        }
        current.hasher.update(chunk);
        current.written += chunk.len() as u64;
        self.current = Some(current);
        Ok(())
    }

    async fn file_complete(&mut self, transfer: &FileTransfer) -> Result<(), ScpError> {
        let Some(mut current) = self.current.take() else {
            return Ok(());
        };

        if let Err(source) = current.file.flush().await {
            return Err(ScpError::StorageWrite {
                path: current.path,
                source,
            });
        }

        let summary = CapturedFileSummary {
            id: current.id,
            name: transfer.name.clone(),
            path: current.path,
            size: current.written,
            hash: format!("sha256:{:x}", current.hasher.finalize()),
            duration_ms: current.started_at.elapsed().as_millis() as u64,
        };

        info!(
            file_id=%summary.id,
            size=summary.size,
            hash=%summary.hash,
            duration_ms=summary.duration_ms,
            "file {} -> {}", summary.name, summary.id
        );

        self.completed.push(summary);
        Ok(())
    }
}
