//! Operational log output
//!
//! Lines look like
//! `[2024-05-01T12:00:00.000Z] id=4f1a2b3c4d5e image=app:1.0: Started`,
//! with the container fields taken from the span each handler runs in.
//! Errors are preceded by a line holding only `ERROR`.

use chrono::{SecondsFormat, Utc};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Event formatter for the forwarder's log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct ForwarderFormat;

impl<S, N> FormatEvent<S, N> for ForwarderFormat
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
        if *event.metadata().level() == Level::ERROR {
            writeln!(writer, "ERROR")?;
        }

        write!(
            writer,
            "[{}] ",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        )?;

        let mut scoped = false;
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>() {
                    if fields.is_empty() {
                        continue;
                    }
                    if scoped {
                        write!(writer, " ")?;
                    }
                    write!(writer, "{}", fields)?;
                    scoped = true;
                }
            }
        }
        if scoped {
            write!(writer, ": ")?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Build the subscriber used by the forwarder, writing through `make_writer`
pub fn subscriber<W>(make_writer: W, filter: EnvFilter) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .event_format(ForwarderFormat)
        .finish()
}

/// Install the global subscriber
///
/// `level` overrides `RUST_LOG`; without either, `info` is used. Warnings and
/// errors go to stderr, everything else to stdout.
pub fn init(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);

    let _ = tracing::subscriber::set_global_default(subscriber(writer, filter));
}
