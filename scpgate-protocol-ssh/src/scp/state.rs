//! Per-session transfer state.

use tracing::*;
use uuid::Uuid;

use super::types::{ControlLine, FileCommand, FileTransfer, PacketKind};

/// Result of accounting a content packet against the current file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSlice {
    pub transfer: FileTransfer,
    /// Number of leading bytes of the packet that belong to the file
    pub take: usize,
    /// The declared size has been reached with this packet
    pub complete: bool,
}

/// Tracks the single in-flight entry of one scp session.
///
/// `bytes_remaining <= file_size` holds at all times and `file_id` is only
/// set while content of a file is being received.
#[derive(Debug, Default, Clone)]
pub struct TransferState {
    file_command: Option<FileCommand>,
    file_mode: Option<String>,
    file_size: u64,
    bytes_remaining: u64,
    file_name: String,
    awaiting_response: bool,
    file_id: Option<Uuid>,
}

impl TransferState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides how the next packet is treated. The order of checks matters:
    /// an acknowledgement is expected right after a command line, while
    /// `bytes_remaining` may already be zero.
    pub fn classify(&self) -> PacketKind {
        if self.awaiting_response {
            PacketKind::Acknowledgement
        } else if self.bytes_remaining == 0 {
            PacketKind::CommandLine
        } else {
            PacketKind::Content
        }
    }

    pub fn acknowledge(&mut self) {
        self.awaiting_response = false;
    }

    /// Applies a parsed control line. Only `C`/`D` lines mutate state.
    pub fn apply(&mut self, line: &ControlLine) {
        if let ControlLine::Entry {
            command,
            mode,
            size,
            name,
        } = line
        {
            self.file_command = Some(*command);
            self.file_mode = Some(mode.clone());
            self.file_size = *size;
            self.bytes_remaining = *size;
            self.file_name = name.clone();
            self.awaiting_response = true;
        }
    }

    /// Accounts `available` bytes of content, assigning a fresh file id on the
    /// first content byte and clearing it once the declared size is reached.
    pub fn consume_content(&mut self, available: usize) -> ContentSlice {
        let id = match self.file_id {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                debug!(file_id=%id, name=%self.file_name, size=self.file_size, "Receiving file content");
                self.file_id = Some(id);
                id
            }
        };

        let take = self.bytes_remaining.min(available as u64);
        self.bytes_remaining -= take;
        let complete = self.bytes_remaining == 0;

        let transfer = FileTransfer {
            id,
            name: self.file_name.clone(),
            mode: self.file_mode.clone().unwrap_or_default(),
            size: self.file_size,
        };

        if complete {
            self.file_id = None;
        }

        ContentSlice {
            transfer,
            // Bounded by `available`
            take: take as usize,
            complete,
        }
    }

    pub fn file_command(&self) -> Option<FileCommand> {
        self.file_command
    }

    pub fn file_mode(&self) -> Option<&str> {
        self.file_mode.as_deref()
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn bytes_remaining(&self) -> u64 {
        self.bytes_remaining
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    pub fn file_id(&self) -> Option<Uuid> {
        self.file_id
    }
}
