//! SCP Protocol Parser
//!
//! Parses the negotiated exec command and the control lines exchanged on the
//! primary stream of an scp channel.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use super::types::{ControlLine, FileCommand, ScpCommand, ScpStatus};

#[allow(clippy::unwrap_used)]
static ENTRY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)^([CD])([0-7]{4})\s([0-9]+)\s(.*)\n").unwrap());

#[allow(clippy::unwrap_used)]
static END_DIRECTORY_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)^E\n").unwrap());

/// SCP Protocol Parser
#[derive(Default)]
pub struct ScpParser;

impl ScpParser {
    pub fn new() -> Self {
        Self
    }

    /// Classify the exec command a client asked for.
    ///
    /// Only the server side of scp (`-t` sink, `-f` source) is of interest.
    /// Flags may be combined, as in `scp -rpt -- /dest`.
    pub fn parse_command(&self, command: &str) -> ScpCommand {
        let mut words = command.split_whitespace();
        let is_scp = words
            .next()
            .and_then(|program| Path::new(program).file_name())
            .is_some_and(|name| name == "scp");
        if !is_scp {
            return ScpCommand::NotScp;
        }

        let (mut sink, mut source, mut recursive) = (false, false, false);
        let mut path = String::new();
        for word in words {
            match word.strip_prefix('-') {
                Some(flags) => {
                    for flag in flags.chars() {
                        match flag {
                            't' => sink = true,
                            'f' => source = true,
                            'r' => recursive = true,
                            _ => (),
                        }
                    }
                }
                None => path = word.to_owned(),
            }
        }

        match (sink, source) {
            (true, _) => ScpCommand::Upload { path, recursive },
            (false, true) => ScpCommand::Download { path, recursive },
            (false, false) => ScpCommand::NotScp,
        }
    }

    /// Classify a packet received while no file content is pending.
    ///
    /// Only `C`, `D` and `E` lines are recognized. Everything else, including
    /// `T` timestamp lines and non UTF-8 payloads, is [`ControlLine::Unrecognized`].
    pub fn parse_control_line(&self, data: &[u8]) -> ControlLine {
        if std::str::from_utf8(data).is_err() {
            return ControlLine::Unrecognized;
        }

        if let Some(captures) = ENTRY_LINE.captures(data) {
            let (Some(command), Some(mode), Some(size), Some(name)) = (
                captures.get(1),
                captures.get(2),
                captures.get(3),
                captures.get(4),
            ) else {
                return ControlLine::Unrecognized;
            };

            let Some(command) = command
                .as_bytes()
                .first()
                .and_then(|b| FileCommand::from_byte(*b))
            else {
                return ControlLine::Unrecognized;
            };

            // Digits only, so the only failure left is overflow
            let Ok(size) = String::from_utf8_lossy(size.as_bytes()).parse::<u64>() else {
                return ControlLine::Unrecognized;
            };

            return ControlLine::Entry {
                command,
                mode: String::from_utf8_lossy(mode.as_bytes()).into_owned(),
                size,
                name: String::from_utf8_lossy(name.as_bytes()).into_owned(),
            };
        }

        if END_DIRECTORY_LINE.is_match(data) {
            return ControlLine::EndDirectory;
        }

        ControlLine::Unrecognized
    }

    /// Decode an acknowledgement packet
    pub fn parse_status(&self, data: &[u8]) -> Option<ScpStatus> {
        let (first, rest) = data.split_first()?;
        let message = || String::from_utf8_lossy(rest).trim().to_string();
        Some(match first {
            0 => ScpStatus::Ok,
            1 => ScpStatus::Warning(message()),
            2 => ScpStatus::Error(message()),
            other => ScpStatus::Unknown(*other),
        })
    }
}
