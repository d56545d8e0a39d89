mod config;
mod error;
pub mod helpers;
pub mod logging;
mod types;

pub use config::*;
pub use error::*;
pub use types::*;
