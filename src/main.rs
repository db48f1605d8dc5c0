use teamboard_lib::config::AppConfig;

fn main() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("teamboard: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry before anything else so panics during startup are captured.
    // Returns a no-op guard when no DSN is configured.
    let _sentry_guard = sentry::init(sentry_options(&config));

    if let Err(e) = teamboard_lib::run(config) {
        eprintln!("teamboard: {e}");
        std::process::exit(1);
    }
}

fn sentry_options(config: &AppConfig) -> sentry::ClientOptions {
    sentry::ClientOptions {
        dsn: config.sentry_dsn.as_deref().and_then(|s| s.parse().ok()),
        release: Some(env!("CARGO_PKG_VERSION").into()),
        traces_sample_rate: 0.0,
        send_default_pii: false,
        before_send: Some(std::sync::Arc::new(|mut event| {
            if let Some(ref mut user) = event.user {
                user.email = None;
                user.ip_address = None;
                user.username = None;
            }
            Some(event)
        })),
        ..Default::default()
    }
}
