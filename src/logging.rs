use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;

/// Initialize tracing with stdout, an optional rolling file, and Sentry layers.
///
/// - Stdout: compact, human-readable
/// - File: daily rotation under `log_dir` when configured
/// - Sentry: ERROR events become issues, WARN become breadcrumbs
/// - Default level: INFO, override via RUST_LOG env
///
/// Keep the returned guard alive for the lifetime of the process, otherwise
/// buffered file output is dropped.
pub fn init(config: &AppConfig) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,teamboard_lib=debug"));

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .compact();

    let (file_layer, guard) = match config.log_dir.as_deref().map(file_writer) {
        Some(Ok((writer, guard))) => (
            Some(fmt::layer().with_ansi(false).with_writer(writer).json()),
            Some(guard),
        ),
        Some(Err(e)) => {
            eprintln!("[logging] file logging disabled: {e}");
            (None, None)
        }
        None => (None, None),
    };

    // No-op when Sentry DSN is not configured.
    let sentry_layer = sentry_tracing::layer().event_filter(|meta| match *meta.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    });

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .with(sentry_layer)
        .try_init();

    if installed.is_err() {
        // A subscriber is already set (tests, embedding host).
        return guard;
    }

    tracing::debug!("Tracing initialized");
    guard
}

fn file_writer(
    dir: &Path,
) -> std::io::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::daily(dir, "teamboard.log");
    Ok(tracing_appender::non_blocking(appender))
}

/// Install a panic hook that writes crash details next to the database.
pub fn install_crash_hook(data_dir: &Path) {
    let crash_dir = data_dir.join("crash_logs");
    if let Err(e) = std::fs::create_dir_all(&crash_dir) {
        tracing::warn!(error = %e, "Crash log directory unavailable");
        return;
    }

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = crash_dir.join(format!("crash_{timestamp}.log"));

        let message = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<unknown payload>".into());
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_default();

        let report = format!(
            "=== TEAMBOARD CRASH REPORT ===\nTime: {}\nVersion: {}\nPanic: {}\nLocation: {}\n\nBacktrace:\n{}\n",
            chrono::Local::now().to_rfc3339(),
            env!("CARGO_PKG_VERSION"),
            message,
            location,
            std::backtrace::Backtrace::force_capture(),
        );
        let _ = std::fs::write(&path, report);
        eprintln!("[CRASH] Report written to: {}", path.display());

        prev_hook(info);
    }));

    tracing::info!("Crash hook installed");
}
