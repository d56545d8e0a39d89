use std::sync::Arc;

use time::{format_description, UtcOffset};
use tracing_subscriber::filter::dynamic_filter_fn;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

pub const DEFAULT_LOG_FILTER: &str = "scpgate=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs the global subscriber. Fails if one is already set.
pub fn init_logging() -> Result<(), TryInitError> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let env_filter = Arc::new(env_filter());
    let enable_colors = console::user_attended();

    let full_fmt_layer = {
        let env_filter = env_filter.clone();
        format_description::parse("[day].[month].[year] [hour]:[minute]:[second]")
            .ok()
            .map(|format| {
                tracing_subscriber::fmt::layer()
                    .with_ansi(enable_colors)
                    .with_timer(OffsetTime::new(offset, format))
                    .with_filter(dynamic_filter_fn(move |m, c| {
                        env_filter.enabled(m, c.clone())
                    }))
            })
    };
    let compact_fmt_layer = {
        format_description::parse("[hour]:[minute]:[second]")
            .ok()
            .map(|format| {
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_ansi(enable_colors)
                    .with_target(false)
                    .with_timer(OffsetTime::new(offset, format))
                    .with_filter(dynamic_filter_fn(move |m, c| {
                        env_filter.enabled(m, c.clone())
                    }))
            })
    };

    let r = tracing_subscriber::registry();
    let r = r.with(if !console::user_attended() {
        full_fmt_layer
    } else {
        None
    });
    let r = r.with(if console::user_attended() {
        compact_fmt_layer
    } else {
        None
    });

    r.try_init()
}
