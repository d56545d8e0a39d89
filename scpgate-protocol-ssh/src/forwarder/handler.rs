use async_trait::async_trait;
use bytes::Bytes;

use crate::{ScpError, TrafficDirection};

/// Inspection hooks applied to every buffer before it is relayed.
#[async_trait]
pub trait TrafficHandler: Send {
    /// Primary stream, both directions.
    async fn handle_traffic(
        &mut self,
        _direction: TrafficDirection,
        traffic: Bytes,
    ) -> Result<Bytes, ScpError> {
        Ok(traffic)
    }

    /// Extended ("stderr") stream, both directions. Never parsed as scp.
    fn handle_error(&mut self, _direction: TrafficDirection, traffic: Bytes) -> Bytes {
        traffic
    }
}

/// Relays everything unchanged
#[derive(Default)]
pub struct Passthrough;

impl TrafficHandler for Passthrough {}
