//! Tracing subscriber setup for the lineguard binaries.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` applies to lineguard and
/// the database client is held at `warn`. `json` switches to
/// newline-delimited JSON. Only the first call in a process has effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };
    // a subscriber is already installed (tests, embedding binaries)
    installed.ok();
}

fn default_directives(level: Level) -> String {
    format!("{},surrealdb=warn,hyper=warn,reqwest=warn", level.as_str().to_lowercase())
}
