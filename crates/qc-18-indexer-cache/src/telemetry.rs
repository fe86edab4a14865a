//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the configured level when set.

use crate::config::IndexerCacheConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global fmt subscriber.
///
/// Returns `false` if a subscriber was already installed (tests call this
/// from many places) or the filter could not be parsed.
pub fn init_tracing(config: &IndexerCacheConfig) -> bool {
    let env_filter = match EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
    {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("Invalid log filter {:?}: {}", config.log_level, e);
            return false;
        }
    };

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .is_ok()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .is_ok()
    }
}
