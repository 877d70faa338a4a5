use std::fs;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize logger system
///
/// Console output is always on. When `log_dir` is given, a daily rolling file
/// layer is added next to it.
pub fn init_logger(log_dir: Option<&Path>) {
    // Capture log macro logs (the AWS SDK stack still emits some)
    let _ = tracing_log::LogTracer::init();

    // 1. Console output layer
    let console_layer = fmt::Layer::new()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    // 2. File output layer (disable ANSI formatting)
    let file_layer = log_dir.and_then(|dir| match prepare_log_dir(dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::daily(dir, "codeartifact-proxy.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // Leak the guard so buffered lines are flushed for the lifetime of the process
            std::mem::forget(guard);
            Some(
                fmt::Layer::new()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true)
                    .with_level(true)
                    .boxed(),
            )
        }
        Err(e) => {
            eprintln!("Failed to initialize log directory {:?}: {}", dir, e);
            None
        }
    });

    // 3. Set filter layer (default to INFO and above)
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // 4. Initialize global subscriber (use try_init to avoid crash on re-initialization)
    let persisted = file_layer.is_some();
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if persisted {
        info!("Logger system initialized (Console + File Persistence)");
    } else {
        info!("Logger system initialized (Console)");
    }
}

fn prepare_log_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}
