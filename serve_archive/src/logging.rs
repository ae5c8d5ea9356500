use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Without --logging only warnings and errors get through.
fn default_filter(enabled: bool) -> &'static str {
    if enabled {
        "serve_archive=info,warp=info"
    } else {
        "warn"
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the flag.
pub fn init(enabled: bool) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(enabled).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
