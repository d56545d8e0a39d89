//! Channel abstraction the relay loop runs on, and its russh implementations.

mod buffers;
mod frame;
mod intercepted;
mod upstream;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
pub use buffers::{ChannelBuffers, SharedBuffers};
pub use frame::*;
pub use intercepted::{ChannelFeed, InterceptedChannel, RusshFrameTransport};
pub use upstream::{RusshUpstream, UpstreamChannel};

use crate::ScpError;

/// Emits raw connection-protocol frames on a shared transport.
///
/// Implementations serialize emission per transport.
#[async_trait]
pub trait FrameTransport: Send + Sync {
    async fn emit_frame(&self, frame: ChannelFrame) -> Result<(), ScpError>;

    /// Releases the channel id slot in the transport's channel table
    fn unlink(&self, channel_id: u32);
}

/// A multiplexed logical channel with pollable primary and extended streams.
#[async_trait]
pub trait ScpChannel: Send + Sync {
    async fn recv_ready(&self) -> bool;

    async fn recv(&mut self, max_len: usize) -> Result<Bytes, ScpError>;

    async fn recv_stderr_ready(&self) -> bool;

    async fn recv_stderr(&mut self, max_len: usize) -> Result<Bytes, ScpError>;

    /// Returns the number of bytes accepted, which may be fewer than offered.
    async fn send(&mut self, data: &[u8]) -> Result<usize, ScpError>;

    async fn send_stderr(&mut self, data: &[u8]) -> Result<usize, ScpError>;

    async fn exit_status_ready(&self) -> bool;

    async fn recv_exit_status(&mut self) -> Result<u32, ScpError>;

    async fn is_closed(&self) -> bool;

    async fn eof_received(&self) -> bool;

    fn channel_id(&self) -> u32;

    fn remote_channel_id(&self) -> u32;

    /// Plain close, without exit status
    async fn close(&mut self) -> Result<(), ScpError>;

    /// Marks the channel closed locally after a manual teardown
    async fn mark_closed(&mut self);

    fn transport(&self) -> Arc<dyn FrameTransport>;
}

/// A channel on which a command can be executed
#[async_trait]
pub trait ExecChannel: ScpChannel {
    async fn exec(&mut self, command: &str) -> Result<(), ScpError>;
}

/// Opens the server-side channel of an intercepted session.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    type Channel: ExecChannel;

    async fn open_session_channel(&self) -> Result<Self::Channel, ScpError>;
}
