//! Tracing setup.
//!
//! Events go to stdout and to an append-only file next to the executable,
//! one `"<timestamp> - <message>"` line per event.

use std::fmt;
use std::path::Path;

use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// `ctime`-style timestamp, e.g. `Mon Oct 19 09:15:02 2026`
const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Plain `"<timestamp> - <message>"` event format used for the log file
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{} - ", Local::now().format(TIMESTAMP_FORMAT))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber.
///
/// Returns the file writer's guard; keep it alive for the life of the
/// process or buffered lines are lost. `None` means the log file could not be
/// opened and only stdout is active.
pub fn init(log_file: &Path) -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "gmail_watcher=info".into())
    };

    let (file_layer, guard) = match file_writer(log_file) {
        Ok((writer, guard)) => {
            let layer = tracing_subscriber::fmt::layer()
                .event_format(LineFormat)
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "Cannot open log file {}: {}; logging to stdout only",
                log_file.display(),
                e
            );
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(tracing_subscriber::fmt::layer().with_filter(filter()))
        .init();

    guard
}

fn file_writer(
    log_file: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), tracing_appender::rolling::InitError>
{
    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("watcher_log.txt");

    let appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)?;

    Ok(tracing_appender::non_blocking(appender))
}
