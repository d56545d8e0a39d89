use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use russh::ChannelMsg;
use tokio::sync::{Mutex, Notify};

pub type SharedBuffers = Arc<Mutex<ChannelBuffers>>;

/// Bytes held per channel before the producer is paused
pub const MAX_BUFFERED: usize = 256 * 1024;

/// Incoming side of a channel, collected from russh events so that the
/// relay loop can poll it.
///
/// Exit status and close are only reported once every buffered byte has
/// been taken, so a reader polling termination never loses trailing output.
#[derive(Debug)]
pub struct ChannelBuffers {
    data: BytesMut,
    extended: BytesMut,
    exit_status: Option<u32>,
    eof: bool,
    closed: bool,
    released: bool,
    capacity: usize,
    drained: Arc<Notify>,
}

impl Default for ChannelBuffers {
    fn default() -> Self {
        Self::with_capacity(MAX_BUFFERED)
    }
}

impl ChannelBuffers {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::new(),
            extended: BytesMut::new(),
            exit_status: None,
            eof: false,
            closed: false,
            released: false,
            capacity,
            drained: Arc::new(Notify::new()),
        }
    }

    pub fn shared() -> SharedBuffers {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Signalled whenever the reader takes bytes out
    pub fn drained_signal(&self) -> Arc<Notify> {
        self.drained.clone()
    }

    pub fn push_data(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    pub fn push_extended(&mut self, data: &[u8]) {
        self.extended.extend_from_slice(data);
    }

    pub fn set_exit_status(&mut self, status: u32) {
        self.exit_status = Some(status);
    }

    pub fn mark_eof(&mut self) {
        self.eof = true;
    }

    /// The peer closed the channel. Buffered bytes stay readable.
    pub fn mark_closed(&mut self) {
        self.closed = true;
    }

    /// The channel was torn down locally; nothing more will be read.
    pub fn release(&mut self) {
        self.released = true;
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn has_extended(&self) -> bool {
        !self.extended.is_empty()
    }

    pub fn buffered(&self) -> usize {
        self.data.len() + self.extended.len()
    }

    pub fn is_full(&self) -> bool {
        self.buffered() >= self.capacity
    }

    fn is_drained(&self) -> bool {
        self.buffered() == 0
    }

    pub fn take_data(&mut self, max_len: usize) -> Bytes {
        let len = self.data.len().min(max_len);
        let taken = self.data.split_to(len).freeze();
        self.drained.notify_one();
        taken
    }

    pub fn take_extended(&mut self, max_len: usize) -> Bytes {
        let len = self.extended.len().min(max_len);
        let taken = self.extended.split_to(len).freeze();
        self.drained.notify_one();
        taken
    }

    pub fn exit_status(&self) -> Option<u32> {
        self.exit_status.filter(|_| self.is_drained())
    }

    pub fn eof_received(&self) -> bool {
        self.eof
    }

    pub fn is_closed(&self) -> bool {
        self.released || (self.closed && self.is_drained())
    }

    pub fn apply(&mut self, msg: ChannelMsg) {
        match msg {
            ChannelMsg::Data { data } => self.push_data(&data),
            ChannelMsg::ExtendedData { data, ext: _ } => self.push_extended(&data),
            ChannelMsg::ExitStatus { exit_status } => self.set_exit_status(exit_status),
            ChannelMsg::Eof => self.mark_eof(),
            ChannelMsg::Close => self.mark_closed(),
            _ => (),
        }
    }
}
