//! SCP protocol types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// SCP command parsed from exec request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ScpCommand {
    /// scp -t (to/upload)
    Upload { path: String, recursive: bool },
    /// scp -f (from/download)
    Download { path: String, recursive: bool },
    /// Not an SCP command
    NotScp,
}

/// Directive carried by a `C`/`D` control line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileCommand {
    CreateFile,
    CreateDirectory,
}

impl FileCommand {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'C' => Some(Self::CreateFile),
            b'D' => Some(Self::CreateDirectory),
            _ => None,
        }
    }
}

/// A classified control line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlLine {
    /// `C<mode> <size> <name>` or `D<mode> <size> <name>`
    Entry {
        command: FileCommand,
        mode: String,
        size: u64,
        name: String,
    },
    /// `E`
    EndDirectory,
    Unrecognized,
}

/// Status byte sent back by the receiving side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScpStatus {
    /// `\0`
    Ok,
    /// `\x01<message>`
    Warning(String),
    /// `\x02<message>`
    Error(String),
    /// Anything else in acknowledgement position
    Unknown(u8),
}

/// How the next packet on the primary stream is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    CommandLine,
    Acknowledgement,
    Content,
}

/// Snapshot of the file whose content is currently flowing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransfer {
    pub id: Uuid,
    /// Remote-supplied, display only
    pub name: String,
    pub mode: String,
    pub size: u64,
}
