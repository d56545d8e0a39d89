//! SCP Protocol
//!
//! Control-line parsing, per-session transfer state and content capture for
//! intercepted scp sessions.

mod capture;
mod interceptor;
mod parser;
mod state;
mod types;

pub use capture::{CapturedFileSummary, ContentSink, DiscardContent, FileCapture};
pub use interceptor::ScpInterceptor;
pub use parser::ScpParser;
pub use state::{ContentSlice, TransferState};
pub use types::*;
