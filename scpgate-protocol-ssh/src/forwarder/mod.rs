//! Relay loop between the client-side channel of an intercepted session and
//! the server-side channel opened for it.

mod handler;
mod teardown;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use handler::{Passthrough, TrafficHandler};
use scpgate_common::{ScpCaptureConfig, SessionId};
pub use teardown::close_session;
use tokio::task::JoinHandle;
use tracing::*;

use crate::channel::{ExecChannel, ScpChannel, UpstreamConnector};
use crate::scp::{FileCapture, ScpCommand, ScpInterceptor, ScpParser};
use crate::{DataStream, ScpError, TrafficDirection};

/// The parts of a proxied session the relay loop needs.
pub struct ScpSession<C> {
    pub id: SessionId,
    /// Cleared from outside to stop the relay loop
    pub running: Arc<AtomicBool>,
    /// Remote-copy command line the client asked for
    pub scp_command: String,
    /// Client-side channel
    pub scp_channel: C,
}

impl<C> ScpSession<C> {
    pub fn new(id: SessionId, scp_command: impl Into<String>, scp_channel: C) -> Self {
        Self {
            id,
            running: Arc::new(AtomicBool::new(true)),
            scp_command: scp_command.into(),
            scp_channel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Running,
    Closing,
    Closed,
}

/// Why a relay loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ClientClosed,
    ServerClosed,
    ServerExited(u32),
    ClientExited,
    Cancelled,
}

impl Termination {
    /// Exit status posted to the client
    pub fn exit_status(&self) -> u32 {
        match self {
            Self::ServerExited(status) => *status,
            _ => 0,
        }
    }
}

pub struct ScpForwarder<C, H> {
    session: ScpSession<C>,
    handler: H,
    buffer_size: usize,
    poll_interval: Duration,
    state: RelayState,
}

impl<C: ScpChannel> ScpForwarder<C, ScpInterceptor<FileCapture>> {
    /// Forwarder that stores transferred files under the configured directory
    pub fn with_storage(
        session: ScpSession<C>,
        config: &ScpCaptureConfig,
    ) -> Result<Self, ScpError> {
        config.validate()?;
        Ok(Self::new(
            session,
            ScpInterceptor::new(FileCapture::from_config(config)),
            config,
        ))
    }
}

impl<C: ScpChannel, H: TrafficHandler> ScpForwarder<C, H> {
    pub fn new(session: ScpSession<C>, handler: H, config: &ScpCaptureConfig) -> Self {
        Self {
            session,
            handler,
            buffer_size: config.buffer_size.max(1),
            poll_interval: config.poll_interval,
            state: RelayState::Closed,
        }
    }

    pub fn session(&self) -> &ScpSession<C> {
        &self.session
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Runs the relay loop on its own task.
    pub fn spawn<U>(mut self, upstream: U) -> JoinHandle<Result<Termination, ScpError>>
    where
        C: 'static,
        H: 'static,
        U: UpstreamConnector + 'static,
    {
        tokio::spawn(async move { self.forward(&upstream).await })
    }

    /// Opens the server-side channel, runs the remote-copy command on it and
    /// relays until either side finishes or the session is stopped.
    pub async fn forward<U: UpstreamConnector>(
        &mut self,
        upstream: &U,
    ) -> Result<Termination, ScpError> {
        let session_id = self.session.id;
        match self.start_and_relay(upstream).await {
            Ok(termination) => {
                info!(session=%session_id, ?termination, "scp session finished");
                Ok(termination)
            }
            Err(error) if error.is_storage_failure() => {
                error!(session=%session_id, ?error, "Failed to store scp file");
                Err(error)
            }
            Err(error) => {
                error!(session=%session_id, ?error, "Error processing scp command");
                Err(error)
            }
        }
    }

    async fn start_and_relay<U: UpstreamConnector>(
        &mut self,
        upstream: &U,
    ) -> Result<Termination, ScpError> {
        let mut server_channel = upstream.open_session_channel().await?;
        server_channel.exec(&self.session.scp_command).await?;

        match ScpParser::new().parse_command(&self.session.scp_command) {
            ScpCommand::Upload { path, recursive } => {
                info!(session=%self.session.id, %path, recursive, "scp upload");
            }
            ScpCommand::Download { path, recursive } => {
                info!(session=%self.session.id, %path, recursive, "scp download");
            }
            ScpCommand::NotScp => {
                debug!(session=%self.session.id, command=%self.session.scp_command, "Relaying non-scp command");
            }
        }

        self.state = RelayState::Running;
        let result = self.relay(&mut server_channel).await;
        self.state = RelayState::Closed;
        result
    }

    async fn relay<S: ExecChannel>(&mut self, server: &mut S) -> Result<Termination, ScpError> {
        while self.session.running.load(Ordering::Relaxed) {
            let mut active = false;
            let client = &mut self.session.scp_channel;

            if client.recv_ready().await {
                active = true;
                let data = client.recv(self.buffer_size).await?;
                let data = self
                    .handler
                    .handle_traffic(TrafficDirection::ClientToServer, data)
                    .await?;
                send_all(server, &data, DataStream::Primary).await?;
            }

            if server.recv_ready().await {
                active = true;
                let data = server.recv(self.buffer_size).await?;
                let data = self
                    .handler
                    .handle_traffic(TrafficDirection::ServerToClient, data)
                    .await?;
                send_all(client, &data, DataStream::Primary).await?;
            }

            if client.recv_stderr_ready().await {
                active = true;
                let data = client.recv_stderr(self.buffer_size).await?;
                let data = self
                    .handler
                    .handle_error(TrafficDirection::ClientToServer, data);
                send_all(server, &data, DataStream::Extended).await?;
            }

            if server.recv_stderr_ready().await {
                active = true;
                let data = server.recv_stderr(self.buffer_size).await?;
                let data = self
                    .handler
                    .handle_error(TrafficDirection::ServerToClient, data);
                send_all(client, &data, DataStream::Extended).await?;
            }

            if let Some(termination) = check_termination(client, server).await? {
                self.terminate(server, termination).await?;
                return Ok(termination);
            }

            if !active {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        self.terminate(server, Termination::Cancelled).await?;
        Ok(Termination::Cancelled)
    }

    async fn terminate<S: ScpChannel>(
        &mut self,
        server: &mut S,
        termination: Termination,
    ) -> Result<(), ScpError> {
        self.state = RelayState::Closing;
        debug!(session=%self.session.id, ?termination, "Closing scp session");

        if matches!(
            termination,
            Termination::ClientClosed | Termination::Cancelled
        ) {
            if let Err(error) = server.close().await {
                debug!(session=%self.session.id, ?error, "Server channel already gone");
            }
        }

        close_session(&mut self.session.scp_channel, termination.exit_status()).await
    }
}

async fn check_termination<C: ScpChannel, S: ScpChannel>(
    client: &mut C,
    server: &mut S,
) -> Result<Option<Termination>, ScpError> {
    if client.is_closed().await {
        return Ok(Some(Termination::ClientClosed));
    }
    if server.is_closed().await {
        return Ok(Some(Termination::ServerClosed));
    }
    if server.exit_status_ready().await {
        let status = server.recv_exit_status().await?;
        return Ok(Some(Termination::ServerExited(status)));
    }
    if client.exit_status_ready().await {
        client.recv_exit_status().await?;
        return Ok(Some(Termination::ClientExited));
    }
    Ok(None)
}

/// Writes `data` to one stream of `channel`, issuing further sends for the
/// remainder until everything is accepted.
///
/// Returns the number of bytes sent. A channel that already posted its exit
/// status, or that stops accepting data, yields 0.
pub async fn send_all<C: ScpChannel + ?Sized>(
    channel: &mut C,
    data: &[u8],
    stream: DataStream,
) -> Result<usize, ScpError> {
    if data.is_empty() || channel.exit_status_ready().await {
        return Ok(0);
    }

    let mut sent = 0;
    while sent < data.len() {
        let remainder = &data[sent..];
        let n = match stream {
            DataStream::Primary => channel.send(remainder).await?,
            DataStream::Extended => channel.send_stderr(remainder).await?,
        };
        if n == 0 {
            trace!(
                channel = channel.channel_id(),
                sent,
                total = data.len(),
                "Peer stopped consuming"
            );
            return Ok(0);
        }
        sent += n;
    }
    Ok(sent)
}
