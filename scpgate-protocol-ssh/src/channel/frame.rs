//! Raw connection-protocol frames used to tear down a channel.

use bytes::{BufMut, Bytes, BytesMut};

// https://tools.ietf.org/html/rfc4254#section-9
pub mod msg {
    pub const CHANNEL_EOF: u8 = 96;
    pub const CHANNEL_CLOSE: u8 = 97;
    pub const CHANNEL_REQUEST: u8 = 98;
}

pub const EXIT_STATUS: &str = "exit-status";
pub const END_OF_WRITE: &str = "eow@openssh.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRequest {
    ExitStatus(u32),
    /// OpenSSH extension: no more data will be written on this channel
    EndOfWrite,
}

impl ChannelRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExitStatus(_) => EXIT_STATUS,
            Self::EndOfWrite => END_OF_WRITE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFrame {
    Request {
        recipient: u32,
        request: ChannelRequest,
        want_reply: bool,
    },
    Eof {
        recipient: u32,
    },
    Close {
        recipient: u32,
    },
}

impl ChannelFrame {
    pub fn exit_status(recipient: u32, status: u32) -> Self {
        Self::Request {
            recipient,
            request: ChannelRequest::ExitStatus(status),
            want_reply: false,
        }
    }

    pub fn end_of_write(recipient: u32) -> Self {
        Self::Request {
            recipient,
            request: ChannelRequest::EndOfWrite,
            want_reply: false,
        }
    }

    pub fn message_type(&self) -> u8 {
        match self {
            Self::Request { .. } => msg::CHANNEL_REQUEST,
            Self::Eof { .. } => msg::CHANNEL_EOF,
            Self::Close { .. } => msg::CHANNEL_CLOSE,
        }
    }

    pub fn recipient(&self) -> u32 {
        match self {
            Self::Request { recipient, .. }
            | Self::Eof { recipient }
            | Self::Close { recipient } => *recipient,
        }
    }

    /// Unencrypted message payload, as handed to the transport's packet writer
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(self.message_type());
        buf.put_u32(self.recipient());
        if let Self::Request {
            request,
            want_reply,
            ..
        } = self
        {
            let name = request.name().as_bytes();
            buf.put_u32(name.len() as u32);
            buf.put_slice(name);
            buf.put_u8(u8::from(*want_reply));
            if let ChannelRequest::ExitStatus(status) = request {
                buf.put_u32(*status);
            }
        }
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_exit_status() {
        let frame = ChannelFrame::exit_status(7, 1);
        let mut expected = vec![98, 0, 0, 0, 7, 0, 0, 0, 11];
        expected.extend_from_slice(b"exit-status");
        expected.extend_from_slice(&[0, 0, 0, 0, 1]);
        assert_eq!(&frame.encode()[..], &expected[..]);
    }

    #[test]
    fn test_encode_end_of_write() {
        let frame = ChannelFrame::end_of_write(0x0102_0304);
        let mut expected = vec![98, 1, 2, 3, 4, 0, 0, 0, 15];
        expected.extend_from_slice(b"eow@openssh.com");
        expected.push(0);
        assert_eq!(&frame.encode()[..], &expected[..]);
    }

    #[test]
    fn test_encode_eof_and_close() {
        assert_eq!(&ChannelFrame::Eof { recipient: 3 }.encode()[..], &[96, 0, 0, 0, 3]);
        assert_eq!(
            &ChannelFrame::Close { recipient: 3 }.encode()[..],
            &[97, 0, 0, 0, 3]
        );
    }
}
