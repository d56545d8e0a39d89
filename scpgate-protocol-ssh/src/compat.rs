use crate::ScpError;

/// russh handles report a gone session as `Err(())` or hand back the unsent buffer.
pub trait HandleResultExt<T> {
    fn or_channel_closed(self) -> Result<T, ScpError>;
}

impl<T, E> HandleResultExt<T> for Result<T, E> {
    fn or_channel_closed(self) -> Result<T, ScpError> {
        self.map_err(|_| ScpError::ChannelClosed)
    }
}
