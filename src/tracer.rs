//! A small `tracing` subscriber that prints events to standard error.
//!
//! Standard output carries the UUID stream, so diagnostics must never go there.

use std::{
    env,
    fmt::{self, Write},
    io::{self, Write as _},
    sync::atomic::{AtomicU64, Ordering},
};

use tracing::{field::Visit, Level, Subscriber};
use tracing_core::{
    span::{Attributes, Id, Record},
    Event, Field, Metadata,
};

/// Levels printed when `RUST_LOG` is not set.
const DEFAULT_LEVEL: Level = Level::WARN;

struct StringVisitor<'a> {
    string: &'a mut String,
}

impl Visit for StringVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let _ = if field.name() == "message" {
            write!(self.string, "{value:?} ")
        } else {
            write!(self.string, "{} = {:?}; ", field.name(), value)
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LogFilter {
    target: Option<String>,
    level: Option<Level>,
}

/// Filters events by `RUST_LOG` and writes them to stderr.
///
/// `RUST_LOG` is a comma separated list of `level`, `target` or `target=level` entries; an
/// event is printed if it matches any entry. A level entry admits that level and everything
/// more severe.
#[derive(Debug)]
pub struct MinimalTracer {
    filters: Vec<LogFilter>,
}

fn string_to_level(string: &str) -> Option<Level> {
    match string.trim().to_lowercase().as_str() {
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "warn" | "warning" => Some(Level::WARN),
        "trace" => Some(Level::TRACE),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn parse_filters(value: &str) -> Vec<LogFilter> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((target, level)) => LogFilter {
                target: Some(target.to_string()),
                level: string_to_level(level),
            },
            None => match string_to_level(entry) {
                Some(level) => LogFilter {
                    target: None,
                    level: Some(level),
                },
                None => LogFilter {
                    target: Some(entry.to_string()),
                    level: None,
                },
            },
        })
        .collect()
}

impl MinimalTracer {
    pub fn from_env() -> Self {
        let filters = match env::var("RUST_LOG") {
            Ok(value) => parse_filters(&value),
            Err(_) => vec![LogFilter {
                target: None,
                level: Some(DEFAULT_LEVEL),
            }],
        };
        Self { filters }
    }

    /// Installs the tracer as the global default subscriber.
    pub fn register() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
        tracing::subscriber::set_global_default(Self::from_env())
    }

    fn admits(&self, metadata: &Metadata<'_>) -> bool {
        self.filters.iter().any(|filter| {
            // `Level` orders more verbose levels as greater.
            let level_ok = filter.level.map_or(true, |level| *metadata.level() <= level);
            let target_ok = filter
                .target
                .as_deref()
                .map_or(true, |target| metadata.target().starts_with(target));
            level_ok && target_ok
        })
    }
}

static AUTO_ID: AtomicU64 = AtomicU64::new(1);

impl Subscriber for MinimalTracer {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.admits(metadata)
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        Id::from_u64(AUTO_ID.fetch_add(1, Ordering::Relaxed))
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let metadata = event.metadata();
        let mut text = String::new();
        event.record(&mut StringVisitor { string: &mut text });
        let _ = writeln!(
            io::stderr().lock(),
            "{} {}: {}",
            metadata.level(),
            metadata.target(),
            text.trim_end()
        );
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}
