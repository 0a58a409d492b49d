//! Tracing subscriber setup for terminal and file output.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Message fields longer than this are cut in the formatted output. Chat
/// content ends up in log lines and can be several kilobytes long.
const MAX_MESSAGE_CHARS: usize = 280;

fn truncate_for_log(message: &str, max_chars: usize) -> (&str, bool) {
    match message.char_indices().nth(max_chars) {
        Some((byte_index, _character)) => (&message[..byte_index], true),
        None => (message, false),
    }
}

fn format_field(
    writer: &mut format::Writer<'_>,
    field: &tracing::field::Field,
    value: &dyn std::fmt::Debug,
) -> std::fmt::Result {
    let field_name = field.name();

    if field_name == "message" {
        let formatted = format!("{value:?}");
        let (truncated, was_truncated) = truncate_for_log(&formatted, MAX_MESSAGE_CHARS);
        if was_truncated {
            write!(writer, "{}={}...", field_name, truncated)
        } else {
            write!(writer, "{}={formatted}", field_name)
        }
    } else {
        write!(writer, "{}={value:?}", field_name)
    }
}

fn build_env_filter(debug: bool) -> EnvFilter {
    // An explicit RUST_LOG wins over the --debug switch.
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    if debug {
        EnvFilter::new("connoisseur=debug,serenity=info,info")
    } else {
        EnvFilter::new("info,serenity=warn")
    }
}

/// Initialize tracing.
///
/// Always logs to stderr. When `log_dir` is set, a daily-rolling file appender
/// is added; the returned guard must be held for the life of the process so
/// buffered lines are flushed on exit.
pub fn init_tracing(debug: bool, log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .fmt_fields(format::debug_fn(format_field))
        .compact();

    match log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir).map_err(|error| {
                anyhow::anyhow!(
                    "failed to create log directory {}: {error}",
                    log_dir.display()
                )
            })?;

            let file_appender = tracing_appender::rolling::daily(log_dir, "connoisseur.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .fmt_fields(format::debug_fn(format_field))
                .compact();

            tracing_subscriber::registry()
                .with(build_env_filter(debug))
                .with(stderr_layer)
                .with(file_layer)
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(build_env_filter(debug))
                .with(stderr_layer)
                .try_init()?;
            Ok(None)
        }
    }
}
