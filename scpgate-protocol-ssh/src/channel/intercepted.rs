use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex};

use async_trait::async_trait;
use bytes::Bytes;
use russh::server::Handle;
use russh::ChannelId;
use tokio::sync::{mpsc, MutexGuard};
use tracing::*;

use super::{
    ChannelBuffers, ChannelFrame, ChannelRequest, FrameTransport, ScpChannel, SharedBuffers,
};
use crate::compat::HandleResultExt;
use crate::ScpError;

/// Frame emission through a russh server session.
///
/// Frames are sequenced through a single background writer so that frames of
/// all channels sharing the session go out in order.
pub struct RusshFrameTransport {
    channels: SyncMutex<HashMap<u32, ChannelId>>,
    tx: mpsc::UnboundedSender<(ChannelId, ChannelFrame)>,
}

impl RusshFrameTransport {
    pub fn new(handle: Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(ChannelId, ChannelFrame)>();
        tokio::spawn(async move {
            while let Some((channel, frame)) = rx.recv().await {
                let result = match frame {
                    ChannelFrame::Request {
                        request: ChannelRequest::ExitStatus(status),
                        ..
                    } => handle.exit_status_request(channel, status).await,
                    ChannelFrame::Request {
                        request: ChannelRequest::EndOfWrite,
                        ..
                    } => {
                        // russh has no public primitive for arbitrary channel requests
                        debug!(%channel, payload = ?frame.encode(), "Skipping eow@openssh.com");
                        Ok(())
                    }
                    ChannelFrame::Eof { .. } => handle.eof(channel).await,
                    ChannelFrame::Close { .. } => handle.close(channel).await,
                };
                if result.is_err() {
                    debug!(%channel, ?frame, "Session is gone, frame dropped");
                }
            }
        });
        Self::with_writer(tx)
    }

    fn with_writer(tx: mpsc::UnboundedSender<(ChannelId, ChannelFrame)>) -> Self {
        Self {
            channels: SyncMutex::new(HashMap::new()),
            tx,
        }
    }

    /// Adds a channel to the table and returns the id frames address it by
    pub fn register(&self, channel: ChannelId) -> u32 {
        let id = u32::from(channel);
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, channel);
        id
    }

}

#[async_trait]
impl FrameTransport for RusshFrameTransport {
    async fn emit_frame(&self, frame: ChannelFrame) -> Result<(), ScpError> {
        let channel = self
            .channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&frame.recipient())
            .copied()
            .ok_or(ScpError::ChannelClosed)?;
        self.tx
            .send((channel, frame))
            .map_err(|_| ScpError::TransportClosed)
    }

    fn unlink(&self, channel_id: u32) {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&channel_id);
    }
}

/// Receiving end handed to the proxy's russh handler, which pushes the
/// client's channel events into it.
#[derive(Clone)]
pub struct ChannelFeed {
    buffers: SharedBuffers,
}

impl ChannelFeed {
    pub fn new(buffers: SharedBuffers) -> Self {
        Self { buffers }
    }

    /// Waits while the relay loop has not caught up with earlier data
    async fn wait_for_room(&self) -> MutexGuard<'_, ChannelBuffers> {
        loop {
            let buffers = self.buffers.lock().await;
            if !buffers.is_full() || buffers.is_closed() {
                return buffers;
            }
            let drained = buffers.drained_signal();
            drop(buffers);
            drained.notified().await;
        }
    }

    pub async fn data(&self, data: &[u8]) {
        self.wait_for_room().await.push_data(data);
    }

    pub async fn extended_data(&self, data: &[u8]) {
        self.wait_for_room().await.push_extended(data);
    }

    pub async fn exit_status(&self, status: u32) {
        self.buffers.lock().await.set_exit_status(status);
    }

    pub async fn eof(&self) {
        self.buffers.lock().await.mark_eof();
    }

    pub async fn close(&self) {
        self.buffers.lock().await.mark_closed();
    }
}

/// The client's channel on the proxy's russh server session
pub struct InterceptedChannel {
    channel: ChannelId,
    id: u32,
    handle: Handle,
    buffers: SharedBuffers,
    transport: Arc<RusshFrameTransport>,
}

impl InterceptedChannel {
    pub fn new(
        handle: Handle,
        channel: ChannelId,
        transport: Arc<RusshFrameTransport>,
    ) -> (Self, ChannelFeed) {
        let id = transport.register(channel);
        let buffers = ChannelBuffers::shared();
        let feed = ChannelFeed::new(buffers.clone());
        (
            Self {
                channel,
                id,
                handle,
                buffers,
                transport,
            },
            feed,
        )
    }
}

#[async_trait]
impl ScpChannel for InterceptedChannel {
    async fn recv_ready(&self) -> bool {
        self.buffers.lock().await.has_data()
    }

    async fn recv(&mut self, max_len: usize) -> Result<Bytes, ScpError> {
        Ok(self.buffers.lock().await.take_data(max_len))
    }

    async fn recv_stderr_ready(&self) -> bool {
        self.buffers.lock().await.has_extended()
    }

    async fn recv_stderr(&mut self, max_len: usize) -> Result<Bytes, ScpError> {
        Ok(self.buffers.lock().await.take_extended(max_len))
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, ScpError> {
        match self
            .handle
            .data(self.channel, Bytes::copy_from_slice(data))
            .await
        {
            Ok(()) => Ok(data.len()),
            Err(_) => Ok(0),
        }
    }

    async fn send_stderr(&mut self, data: &[u8]) -> Result<usize, ScpError> {
        match self
            .handle
            .extended_data(self.channel, 1, Bytes::copy_from_slice(data))
            .await
        {
            Ok(()) => Ok(data.len()),
            Err(_) => Ok(0),
        }
    }

    async fn exit_status_ready(&self) -> bool {
        self.buffers.lock().await.exit_status().is_some()
    }

    async fn recv_exit_status(&mut self) -> Result<u32, ScpError> {
        Ok(self.buffers.lock().await.exit_status().unwrap_or_default())
    }

    async fn is_closed(&self) -> bool {
        self.buffers.lock().await.is_closed()
    }

    async fn eof_received(&self) -> bool {
        self.buffers.lock().await.eof_received()
    }

    fn channel_id(&self) -> u32 {
        self.id
    }

    fn remote_channel_id(&self) -> u32 {
        self.id
    }

    async fn close(&mut self) -> Result<(), ScpError> {
        self.handle.close(self.channel).await.or_channel_closed()
    }

    async fn mark_closed(&mut self) {
        self.buffers.lock().await.release();
    }

    fn transport(&self) -> Arc<dyn FrameTransport> {
        self.transport.clone()
    }
}
