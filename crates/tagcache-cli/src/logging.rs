use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize console logging for the CLI.
///
/// # Configuration
///
/// - **Log Level**: Controlled by `LOG_LEVEL` environment variable (default: "warn")
/// - **Override**: `RUST_LOG` takes precedence when set
/// - **Filtering**: Redis client internals are kept at warn level
/// - **Format**: Compact format on stderr so command output stays clean
pub fn init_console_logging() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tagcache={log_level},tagcache_store={log_level},tagcache_cli={log_level},redis=warn"
        ))
    });

    let console_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(console_layer).init();
}
