mod channel;
mod common;
mod compat;
mod error;
mod forwarder;
pub mod scp;
#[cfg(test)]
mod testing;

pub use channel::*;
pub use common::*;
pub use error::*;
pub use forwarder::*;
