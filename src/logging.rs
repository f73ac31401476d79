use colored::*;
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// A custom tracing event formatter for colorizing log output based on level.
///
/// Info lines are printed bare so broker and role progress reads like
/// plain output. Warnings and errors get a `warning:`/`error:` tag, which
/// is how skipped sample lines and skipped backends stand out from the
/// report on stdout.
pub struct ColorizedFormatter;

impl<S, N> FormatEvent<S, N> for ColorizedFormatter
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
        // Buffer the fields so the whole line can be colored at once.
        let mut buffer = String::new();
        let mut buf_writer = Writer::new(&mut buffer);
        ctx.format_fields(buf_writer.by_ref(), event)?;

        let level = *event.metadata().level();
        writeln!(writer, "{}", colorize(level, &buffer))
    }
}

fn level_tag(level: Level) -> Option<&'static str> {
    match level {
        Level::WARN => Some("warning: "),
        Level::ERROR => Some("error: "),
        _ => None,
    }
}

fn colorize(level: Level, message: &str) -> ColoredString {
    let line = format!("{}{}", level_tag(level).unwrap_or(""), message);
    match level {
        Level::INFO => line.white(),
        Level::WARN => line.yellow(),
        Level::ERROR => line.red(),
        Level::DEBUG => line.blue(),
        Level::TRACE => line.purple(),
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects debug over info.
/// Logs go to stderr so stdout carries only the report.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // An already-installed global subscriber (a test harness or an
    // embedding binary) keeps precedence over this one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(ColorizedFormatter)
        .try_init();
}
