use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use russh::client::{Handle, Handler, Msg};
use russh::Channel;
use tokio::sync::{mpsc, Mutex};
use tracing::*;

use super::{
    ChannelBuffers, ChannelFrame, ExecChannel, FrameTransport, ScpChannel, SharedBuffers,
    UpstreamConnector,
};
use crate::ScpError;

/// Operations queued for the pump before senders wait
const OPERATION_QUEUE: usize = 32;

#[derive(Debug, PartialEq)]
enum UpstreamOperation {
    Exec(String),
    Data(Bytes),
    ExtendedData { ext: u32, data: Bytes },
    Eof,
    Close,
}

/// Opens channels on an established russh client session
pub struct RusshUpstream<H: Handler> {
    handle: Arc<Mutex<Handle<H>>>,
}

impl<H: Handler> RusshUpstream<H> {
    pub fn new(handle: Arc<Mutex<Handle<H>>>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl<H: Handler + 'static> UpstreamConnector for RusshUpstream<H> {
    type Channel = UpstreamChannel;

    async fn open_session_channel(&self) -> Result<UpstreamChannel, ScpError> {
        let channel = self.handle.lock().await.channel_open_session().await?;
        Ok(UpstreamChannel::spawn(channel))
    }
}

/// Server-side channel opened by the interceptor. A background task owns the
/// russh channel and collects its events.
pub struct UpstreamChannel {
    id: u32,
    ops_tx: mpsc::Sender<UpstreamOperation>,
    buffers: SharedBuffers,
    transport: Arc<UpstreamFrames>,
}

impl UpstreamChannel {
    pub fn spawn(channel: Channel<Msg>) -> Self {
        let id = u32::from(channel.id());
        let buffers = ChannelBuffers::shared();
        let (ops_tx, ops_rx) = mpsc::channel(OPERATION_QUEUE);

        let pump = UpstreamPump {
            channel,
            ops_rx,
            buffers: buffers.clone(),
        };
        tokio::spawn({
            let buffers = buffers.clone();
            async move {
                if let Err(error) = pump.run().await {
                    error!(channel=%id, ?error, "Upstream channel failed");
                }
                buffers.lock().await.mark_closed();
            }
        });

        Self::from_parts(id, ops_tx, buffers)
    }

    fn from_parts(
        id: u32,
        ops_tx: mpsc::Sender<UpstreamOperation>,
        buffers: SharedBuffers,
    ) -> Self {
        Self {
            id,
            transport: Arc::new(UpstreamFrames {
                ops_tx: ops_tx.clone(),
            }),
            ops_tx,
            buffers,
        }
    }

    /// Waits for room in the pump's queue
    async fn enqueue(&self, op: UpstreamOperation) -> Result<(), ScpError> {
        self.ops_tx
            .send(op)
            .await
            .map_err(|_| ScpError::ChannelClosed)
    }
}

#[async_trait]
impl ScpChannel for UpstreamChannel {
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
            .enqueue(UpstreamOperation::Data(Bytes::copy_from_slice(data)))
            .await
        {
            Ok(()) => Ok(data.len()),
            Err(_) => Ok(0),
        }
    }

    async fn send_stderr(&mut self, data: &[u8]) -> Result<usize, ScpError> {
        match self
            .enqueue(UpstreamOperation::ExtendedData {
                ext: 1,
                data: Bytes::copy_from_slice(data),
            })
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
        // Readiness is checked by the caller; a channel that died without status reports failure
        Ok(self.buffers.lock().await.exit_status().unwrap_or(1))
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
        self.enqueue(UpstreamOperation::Close).await
    }

    async fn mark_closed(&mut self) {
        self.buffers.lock().await.release();
    }

    fn transport(&self) -> Arc<dyn FrameTransport> {
        self.transport.clone()
    }
}

#[async_trait]
impl ExecChannel for UpstreamChannel {
    async fn exec(&mut self, command: &str) -> Result<(), ScpError> {
        self.enqueue(UpstreamOperation::Exec(command.to_owned())).await
    }
}

/// Client-side frames map onto the channel's own operations
struct UpstreamFrames {
    ops_tx: mpsc::Sender<UpstreamOperation>,
}

#[async_trait]
impl FrameTransport for UpstreamFrames {
    async fn emit_frame(&self, frame: ChannelFrame) -> Result<(), ScpError> {
        let op = match frame {
            ChannelFrame::Eof { .. } => UpstreamOperation::Eof,
            ChannelFrame::Close { .. } => UpstreamOperation::Close,
            ChannelFrame::Request { request, .. } => {
                debug!(
                    request = request.name(),
                    "Channel request is not sent from the client side, skipping"
                );
                return Ok(());
            }
        };
        self.ops_tx
            .send(op)
            .await
            .map_err(|_| ScpError::TransportClosed)
    }

    fn unlink(&self, _channel_id: u32) {}
}

struct UpstreamPump {
    channel: Channel<Msg>,
    ops_rx: mpsc::Receiver<UpstreamOperation>,
    buffers: SharedBuffers,
}

impl UpstreamPump {
    async fn run(mut self) -> anyhow::Result<()> {
        loop {
            // Stop reading the channel while the relay loop is behind
            let (full, drained) = {
                let buffers = self.buffers.lock().await;
                (buffers.is_full(), buffers.drained_signal())
            };

            tokio::select! {
                op = self.ops_rx.recv() => {
                    match op {
                        Some(UpstreamOperation::Exec(command)) => {
                            self.channel.exec(true, command).await.context("request_exec")?;
                        }
                        Some(UpstreamOperation::Data(data)) => {
                            self.channel.data(&*data).await.context("data")?;
                        }
                        Some(UpstreamOperation::ExtendedData { ext, data }) => {
                            self.channel.extended_data(ext, &*data).await.context("extended data")?;
                        }
                        Some(UpstreamOperation::Eof) => {
                            self.channel.eof().await.context("eof")?;
                        }
                        Some(UpstreamOperation::Close) | None => {
                            let _ = self.channel.close().await;
                            break;
                        }
                    }
                }
                msg = self.channel.wait(), if !full => {
                    match msg {
                        Some(msg) => self.buffers.lock().await.apply(msg),
                        None => break,
                    }
                }
                _ = drained.notified(), if full => {}
            }
        }
        Ok(())
    }
}
