use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the process-wide log subscriber. `log` records from the library
/// are routed through it; `RUST_LOG` overrides the default filter.
pub fn init_logger(verbose: bool) {
    let default_filter = if verbose { "barbot_lib=debug,barbot=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .try_init();

    if let Err(e) = result {
        eprintln!("Logger already initialised: {}", e);
    }
}
