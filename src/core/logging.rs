use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::core::config::AppPaths;

const LOG_FILE_PREFIX: &str = "study-assistant.log";
/// Our own spans at info, request traces at info, dependencies at warn.
const DEFAULT_DIRECTIVES: &str = "warn,study_assistant=info,tower_http=info";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs stdout logging plus a daily-rolling file under `paths.log_dir`.
pub fn init(paths: &AppPaths) {
    if let Err(err) = std::fs::create_dir_all(&paths.log_dir) {
        eprintln!(
            "cannot create log directory {}: {}",
            paths.log_dir.display(),
            err
        );
    }

    let file_appender = tracing_appender::rolling::daily(&paths.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer);

    let _ = tracing_subscriber::registry()
        .with(build_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with(stdout_layer)
        .with(file_layer)
        .try_init();
}

/// `RUST_LOG` when it parses, otherwise the service defaults.
fn build_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_favour_this_crate() {
        let filter = build_filter(None).to_string();
        assert!(filter.contains("study_assistant=info"));
        assert!(filter.contains("tower_http=info"));
    }

    #[test]
    fn rust_log_overrides_defaults() {
        let filter = build_filter(Some("study_assistant=debug")).to_string();
        assert!(filter.contains("study_assistant=debug"));
        assert!(!filter.contains("tower_http"));
    }

    #[test]
    fn blank_rust_log_falls_back() {
        assert!(build_filter(Some("  ")).to_string().contains("study_assistant=info"));
    }
}
