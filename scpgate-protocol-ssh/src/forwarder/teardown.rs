use tracing::*;

use crate::channel::{ChannelFrame, ScpChannel};
use crate::ScpError;

/// Closes `channel` the way a cooperating peer would: exit status, EOF and
/// end-of-write where the peer has not seen them yet, then close and unlink.
///
/// A channel that is already closed is left alone.
pub async fn close_session<C: ScpChannel + ?Sized>(
    channel: &mut C,
    status: u32,
) -> Result<(), ScpError> {
    if channel.is_closed().await {
        return Ok(());
    }

    let transport = channel.transport();
    let recipient = channel.remote_channel_id();

    if !channel.exit_status_ready().await {
        transport
            .emit_frame(ChannelFrame::exit_status(recipient, status))
            .await?;
    }

    if !channel.eof_received().await {
        transport
            .emit_frame(ChannelFrame::Eof { recipient })
            .await?;
        transport
            .emit_frame(ChannelFrame::end_of_write(recipient))
            .await?;
    }

    transport
        .emit_frame(ChannelFrame::Close { recipient })
        .await?;

    transport.unlink(channel.channel_id());
    channel.mark_closed().await;
    debug!(channel = recipient, status, "Channel closed");
    Ok(())
}
