use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrafficDirection {
    ClientToServer,
    ServerToClient,
}

impl Display for TrafficDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientToServer => write!(f, "client->server"),
            Self::ServerToClient => write!(f, "server->client"),
        }
    }
}

/// Which stream of a channel a buffer travels on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataStream {
    Primary,
    Extended,
}
