use std::time::Duration;

pub(crate) const fn _default_true() -> bool {
    true
}

pub(crate) const fn _default_buffer_size() -> usize {
    1024
}

#[inline]
pub(crate) fn _default_poll_interval() -> Duration {
    Duration::from_millis(100)
}
