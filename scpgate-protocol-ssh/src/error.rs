use std::path::PathBuf;

use scpgate_common::ScpgateError;

#[derive(thiserror::Error, Debug)]
pub enum ScpError {
    #[error("failed to prepare capture directory {path:?}: {source}")]
    StorageDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write captured file {path:?}: {source}")]
    StorageWrite {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("channel is closed")]
    ChannelClosed,
    #[error("frame transport is closed")]
    TransportClosed,
    #[error("russh error: {0}")]
    Russh(#[from] russh::Error),
    #[error(transparent)]
    Scpgate(#[from] ScpgateError),
}

impl ScpError {
    /// Storage failures desynchronize the capture from the stream
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::StorageDirectory { .. } | Self::StorageWrite { .. })
    }
}
