use async_trait::async_trait;
use bytes::Bytes;
use tracing::*;

use super::capture::ContentSink;
use super::parser::ScpParser;
use super::state::TransferState;
use super::types::{ControlLine, PacketKind, ScpStatus};
use crate::{ScpError, TrafficDirection, TrafficHandler};

/// Follows the scp control protocol on the primary stream and hands file
/// content to a [`ContentSink`]. Both directions share one state since the
/// protocol is strictly request/acknowledge/data.
pub struct ScpInterceptor<S> {
    parser: ScpParser,
    state: TransferState,
    sink: S,
}

impl<S: ContentSink> ScpInterceptor<S> {
    pub fn new(sink: S) -> Self {
        Self {
            parser: ScpParser::new(),
            state: TransferState::new(),
            sink,
        }
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn handle_command(&mut self, traffic: Bytes) -> Bytes {
        let line = self.parser.parse_control_line(&traffic);
        match &line {
            ControlLine::Entry { .. } | ControlLine::EndDirectory => {
                info!("got command {}", String::from_utf8_lossy(&traffic).trim());
            }
            ControlLine::Unrecognized => {
                trace!(len = traffic.len(), "Relaying unrecognized control packet");
            }
        }
        self.state.apply(&line);
        traffic
    }

    fn process_response(&mut self, traffic: Bytes) -> Bytes {
        match self.parser.parse_status(&traffic) {
            Some(ScpStatus::Warning(message)) => warn!(%message, "scp warning"),
            Some(ScpStatus::Error(message)) => warn!(%message, "scp error"),
            _ => (),
        }
        traffic
    }

    async fn process_data(&mut self, traffic: Bytes) -> Result<Bytes, ScpError> {
        let slice = self.state.consume_content(traffic.len());
        let chunk = traffic.get(..slice.take).unwrap_or_default();
        self.sink.process_data(&slice.transfer, chunk).await?;
        if slice.complete {
            self.sink.file_complete(&slice.transfer).await?;
        }
        Ok(self.sink.rewrite_content(traffic))
    }
}

#[async_trait]
impl<S: ContentSink> TrafficHandler for ScpInterceptor<S> {
    async fn handle_traffic(
        &mut self,
        direction: TrafficDirection,
        traffic: Bytes,
    ) -> Result<Bytes, ScpError> {
        if traffic.is_empty() {
            return Ok(traffic);
        }

        match self.state.classify() {
            PacketKind::Acknowledgement => {
                trace!(%direction, "Acknowledgement");
                self.state.acknowledge();
                Ok(self.process_response(traffic))
            }
            PacketKind::CommandLine => Ok(self.handle_command(traffic)),
            PacketKind::Content => self.process_data(traffic).await,
        }
    }
}
