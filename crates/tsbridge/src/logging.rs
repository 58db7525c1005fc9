//! Tracing setup for hosts that don't install their own subscriber.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directives from `RUST_LOG`, else `TSBRIDGE_LOG` as the crate level.
fn filter_from(rust_log: Option<&str>, tsbridge_log: Option<&str>) -> EnvFilter {
    if let Some(directives) = rust_log {
        return EnvFilter::new(directives);
    }

    let level = match tsbridge_log {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    };
    EnvFilter::new(format!("tsbridge={level}"))
}

/// Initialize tracing with `TSBRIDGE_LOG` and `LOG_FORMAT` support.
///
/// Worker stderr is logged under the `tsbridge::worker` target. Does nothing
/// if a global subscriber is already set.
pub fn init_tracing() {
    let rust_log = std::env::var("RUST_LOG").ok();
    let tsbridge_log = std::env::var("TSBRIDGE_LOG").ok();
    let filter = filter_from(rust_log.as_deref(), tsbridge_log.as_deref());

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    let result = if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(json = use_json, "Tracing initialized");
    }
}
