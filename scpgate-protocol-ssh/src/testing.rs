//! Scripted channel and recording transport for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::channel::{ChannelFrame, ExecChannel, FrameTransport, ScpChannel, UpstreamConnector};
use crate::ScpError;

#[derive(Default)]
pub struct FakeTransport {
    frames: Mutex<Vec<ChannelFrame>>,
    unlinked: Mutex<Vec<u32>>,
}

impl FakeTransport {
    pub fn frames(&self) -> Vec<ChannelFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn unlinked(&self) -> Vec<u32> {
        self.unlinked.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameTransport for FakeTransport {
    async fn emit_frame(&self, frame: ChannelFrame) -> Result<(), ScpError> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }

    fn unlink(&self, channel_id: u32) {
        self.unlinked.lock().unwrap().push(channel_id);
    }
}

#[derive(Default)]
struct FakeState {
    incoming: VecDeque<Bytes>,
    incoming_stderr: VecDeque<Bytes>,
    sent: Vec<u8>,
    sent_stderr: Vec<u8>,
    send_calls: usize,
    send_limit: Option<usize>,
    stalled: bool,
    exit_status: Option<u32>,
    closed: bool,
    close_when_drained: bool,
    eof: bool,
    executed: Vec<String>,
    plain_closes: usize,
}

impl FakeState {
    fn drained(&self) -> bool {
        self.incoming.is_empty() && self.incoming_stderr.is_empty()
    }

    /// Like the russh adapters, a posted status waits for unread input
    fn exit_status(&self) -> Option<u32> {
        self.exit_status.filter(|_| self.drained())
    }

    fn closed(&self) -> bool {
        self.closed || (self.close_when_drained && self.drained())
    }
}

fn pop(queue: &mut VecDeque<Bytes>, max_len: usize) -> Bytes {
    let Some(mut chunk) = queue.pop_front() else {
        return Bytes::new();
    };
    if chunk.len() > max_len {
        let rest = chunk.split_off(max_len);
        queue.push_front(rest);
    }
    chunk
}

/// A channel whose peer behaviour is scripted up front. Clones share state.
#[derive(Clone)]
pub struct FakeChannel {
    id: u32,
    state: Arc<Mutex<FakeState>>,
    transport: Arc<FakeTransport>,
}

impl FakeChannel {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            state: Default::default(),
            transport: Default::default(),
        }
    }

    pub fn push_incoming(&self, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .incoming
            .push_back(Bytes::copy_from_slice(data));
    }

    pub fn push_incoming_stderr(&self, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .incoming_stderr
            .push_back(Bytes::copy_from_slice(data));
    }

    pub fn post_exit_status(&self, status: u32) {
        self.state.lock().unwrap().exit_status = Some(status);
    }

    pub fn close_when_drained(&self) {
        self.state.lock().unwrap().close_when_drained = true;
    }

    pub fn receive_eof(&self) {
        self.state.lock().unwrap().eof = true;
    }

    pub fn limit_sends(&self, max: usize) {
        self.state.lock().unwrap().send_limit = Some(max);
    }

    pub fn stall_sends(&self) {
        self.state.lock().unwrap().stalled = true;
    }

    pub fn sent(&self) -> Vec<u8> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_stderr(&self) -> Vec<u8> {
        self.state.lock().unwrap().sent_stderr.clone()
    }

    pub fn send_calls(&self) -> usize {
        self.state.lock().unwrap().send_calls
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn plain_closes(&self) -> usize {
        self.state.lock().unwrap().plain_closes
    }

    pub fn transport_log(&self) -> Arc<FakeTransport> {
        self.transport.clone()
    }

    fn accept(&self, data: &[u8], stderr: bool) -> usize {
        let mut state = self.state.lock().unwrap();
        state.send_calls += 1;
        if state.stalled {
            return 0;
        }
        let n = state.send_limit.unwrap_or(usize::MAX).min(data.len());
        let target = if stderr {
            &mut state.sent_stderr
        } else {
            &mut state.sent
        };
        target.extend_from_slice(&data[..n]);
        n
    }
}

#[async_trait]
impl ScpChannel for FakeChannel {
    async fn recv_ready(&self) -> bool {
        !self.state.lock().unwrap().incoming.is_empty()
    }

    async fn recv(&mut self, max_len: usize) -> Result<Bytes, ScpError> {
        Ok(pop(&mut self.state.lock().unwrap().incoming, max_len))
    }

    async fn recv_stderr_ready(&self) -> bool {
        !self.state.lock().unwrap().incoming_stderr.is_empty()
    }

    async fn recv_stderr(&mut self, max_len: usize) -> Result<Bytes, ScpError> {
        Ok(pop(&mut self.state.lock().unwrap().incoming_stderr, max_len))
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, ScpError> {
        Ok(self.accept(data, false))
    }

    async fn send_stderr(&mut self, data: &[u8]) -> Result<usize, ScpError> {
        Ok(self.accept(data, true))
    }

    async fn exit_status_ready(&self) -> bool {
        self.state.lock().unwrap().exit_status().is_some()
    }

    async fn recv_exit_status(&mut self) -> Result<u32, ScpError> {
        Ok(self.state.lock().unwrap().exit_status().unwrap_or_default())
    }

    async fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed()
    }

    async fn eof_received(&self) -> bool {
        self.state.lock().unwrap().eof
    }

    fn channel_id(&self) -> u32 {
        self.id
    }

    fn remote_channel_id(&self) -> u32 {
        self.id
    }

    async fn close(&mut self) -> Result<(), ScpError> {
        let mut state = self.state.lock().unwrap();
        state.plain_closes += 1;
        state.closed = true;
        Ok(())
    }

    async fn mark_closed(&mut self) {
        self.state.lock().unwrap().closed = true;
    }

    fn transport(&self) -> Arc<dyn FrameTransport> {
        self.transport.clone()
    }
}

#[async_trait]
impl ExecChannel for FakeChannel {
    async fn exec(&mut self, command: &str) -> Result<(), ScpError> {
        self.state.lock().unwrap().executed.push(command.to_owned());
        Ok(())
    }
}

/// Hands out a prepared server-side channel
pub struct FakeConnector {
    pub channel: FakeChannel,
}

#[async_trait]
impl UpstreamConnector for FakeConnector {
    type Channel = FakeChannel;

    async fn open_session_channel(&self) -> Result<FakeChannel, ScpError> {
        Ok(self.channel.clone())
    }
}
