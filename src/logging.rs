//! Process-wide logging pipeline.
//!
//! [`ActiveLogConfig`] is derived from the resolved options without side
//! effects; [`LoggingContext::install`] then publishes it as the global
//! `tracing` subscriber. Records are written as
//!
//! ```text
//! [2026.10.19 08:15:02.318904] [ThreadId(1)] [info]  Loaded 2 tunnel(s)
//! ```
//!
//! Fatal records are `error!` events carrying a `fatal` field:
//!
//! ```rust,no_run
//! tracing::error!(fatal = true, "cannot continue");
//! ```

use std::{
    collections::BTreeSet,
    fmt,
    path::{Path, PathBuf},
};

use tracing::{
    Event, Level, Metadata, Subscriber,
    field::{Field, Visit},
};
use tracing_appender::{
    non_blocking::{NonBlockingBuilder, WorkerGuard},
    rolling::{RollingFileAppender, Rotation as AppenderRotation},
};
use tracing_subscriber::{
    Layer, Registry,
    fmt::{
        FmtContext, FormatEvent, FormatFields,
        format::Writer,
        time::{ChronoUtc, FormatTime},
    },
    layer::{Context, Layered, SubscriberExt},
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
};

use crate::{
    error::{KovriError, KovriResult},
    options::ResolvedConfig,
};

/// Boolean field that marks an `error!` event as fatal when `true`
pub const FATAL_FIELD: &str = "fatal";

const TIMESTAMP_FORMAT: &str = "%Y.%m.%d %T%.6f";
const DEFAULT_LOG_PREFIX: &str = "kovri";
const DEFAULT_LOG_SUFFIX: &str = "log";

/// Record severity, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Fatal,
    Error,
    Warning,
    Info,
    Debug,
    Trace,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Fatal,
        Severity::Error,
        Severity::Warning,
        Severity::Info,
        Severity::Debug,
        Severity::Trace,
    ];

    /// Map a numeric `log-level` (0 = fatal .. 5 = trace)
    pub fn from_level(level: i64) -> KovriResult<Self> {
        usize::try_from(level)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or_else(|| {
                KovriError::InvalidArgument(format!(
                    "invalid log-level {level}, expected 0 (fatal) to 5 (trace)"
                ))
            })
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "fatal" => Some(Severity::Fatal),
            "error" => Some(Severity::Error),
            "warn" | "warning" => Some(Severity::Warning),
            "info" => Some(Severity::Info),
            "debug" => Some(Severity::Debug),
            "trace" => Some(Severity::Trace),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Debug => "debug",
            Severity::Trace => "trace",
        }
    }

    pub fn of_level(level: &Level) -> Self {
        match *level {
            Level::ERROR => Severity::Error,
            Level::WARN => Severity::Warning,
            Level::INFO => Severity::Info,
            Level::DEBUG => Severity::Debug,
            _ => Severity::Trace,
        }
    }

    /// Severity of a recorded event; `fatal = true` upgrades an error
    pub fn of(event: &Event<'_>) -> Self {
        let severity = Self::of_level(event.metadata().level());
        if severity == Severity::Error && may_be_fatal(event.metadata()) {
            let mut marker = FatalMarker(false);
            event.record(&mut marker);
            if marker.0 {
                return Severity::Fatal;
            }
        }
        severity
    }
}

/// Error callsites that carry a `fatal` field
fn may_be_fatal(metadata: &Metadata<'_>) -> bool {
    *metadata.level() == Level::ERROR && metadata.fields().field(FATAL_FIELD).is_some()
}

struct FatalMarker(bool);

impl Visit for FatalMarker {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == FATAL_FIELD {
            self.0 = value;
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which severities reach the sinks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeverityFilter {
    /// The given severity and everything more urgent
    Threshold(Severity),
    /// Exactly the listed severities
    Levels(BTreeSet<Severity>),
}

impl SeverityFilter {
    pub fn threshold(level: i64) -> KovriResult<Self> {
        Severity::from_level(level).map(SeverityFilter::Threshold)
    }

    /// Explicit level names; an empty list enables every level
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> KovriResult<Self> {
        if names.len() > Severity::ALL.len() {
            return Err(KovriError::InvalidArgument(format!(
                "Invalid number of log levels. Maximum allowed: {}",
                Severity::ALL.len()
            )));
        }
        if names.is_empty() {
            return Ok(SeverityFilter::Levels(Severity::ALL.into_iter().collect()));
        }

        names
            .iter()
            .map(|name| {
                Severity::from_name(name.as_ref()).ok_or_else(|| {
                    KovriError::InvalidArgument(format!(
                        "Invalid log-level '{}'. Options: fatal error warn info debug trace",
                        name.as_ref()
                    ))
                })
            })
            .collect::<KovriResult<BTreeSet<_>>>()
            .map(SeverityFilter::Levels)
    }

    pub fn admits(&self, severity: Severity) -> bool {
        match self {
            SeverityFilter::Threshold(threshold) => severity <= *threshold,
            SeverityFilter::Levels(levels) => levels.contains(&severity),
        }
    }

    /// True when debug or trace records get through
    pub fn admits_debug(&self) -> bool {
        self.admits(Severity::Debug) || self.admits(Severity::Trace)
    }
}

impl<S: Subscriber> Layer<S> for SeverityFilter {
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        let severity = Severity::of_level(metadata.level());
        self.admits(severity) || (may_be_fatal(metadata) && self.admits(Severity::Fatal))
    }

    fn event_enabled(&self, event: &Event<'_>, _ctx: Context<'_, S>) -> bool {
        self.admits(Severity::of(event))
    }
}

/// Output destination for log records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sink {
    Console,
    File,
}

/// When the log file is rotated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rotation {
    /// At midnight UTC, not local midnight
    #[default]
    Daily,
}

/// Location of the rotating log file.
///
/// Files are named `<prefix>.<YYYY-MM-DD>.<suffix>` inside `directory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileTemplate {
    pub directory: PathBuf,
    pub prefix: String,
    pub suffix: String,
}

impl LogFileTemplate {
    /// `kovri.<date>.log` inside `directory`
    pub fn in_dir(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: DEFAULT_LOG_PREFIX.to_string(),
            suffix: DEFAULT_LOG_SUFFIX.to_string(),
        }
    }

    /// Split a user-supplied `log-file-name` into directory, stem and extension
    pub fn from_path(path: &Path) -> Self {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_LOG_PREFIX.to_string());
        let suffix = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_LOG_SUFFIX.to_string());
        Self {
            directory,
            prefix,
            suffix,
        }
    }

    /// Path pattern with the date placeholder, for display
    pub fn pattern(&self) -> String {
        self.directory
            .join(format!("{}.%Y-%m-%d.{}", self.prefix, self.suffix))
            .display()
            .to_string()
    }
}

/// Logging configuration ready to be installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveLogConfig {
    pub filter: SeverityFilter,
    pub sinks: Vec<Sink>,
    pub file: LogFileTemplate,
    pub rotation: Rotation,
    /// Write every file record through immediately
    pub auto_flush: bool,
}

impl ActiveLogConfig {
    /// Derive the logging setup from `log-*` options.
    ///
    /// An explicitly set `log-levels` takes over from `log-level`.
    pub fn from_options(options: &ResolvedConfig) -> KovriResult<Self> {
        let filter = if options.is_defaulted("log-levels")? {
            SeverityFilter::threshold(options.int("log-level")?)?
        } else {
            SeverityFilter::from_names(options.list("log-levels")?)?
        };

        let file = match options.string("log-file-name")? {
            "" => LogFileTemplate::in_dir(options.data_dir()?.logs_dir()),
            path => LogFileTemplate::from_path(Path::new(path)),
        };

        Ok(Self::new(
            filter,
            options.boolean("log-to-console")?,
            options.boolean("log-to-file")?,
            file,
        ))
    }

    pub fn new(
        filter: SeverityFilter,
        to_console: bool,
        to_file: bool,
        file: LogFileTemplate,
    ) -> Self {
        // Both sinks are planned, then disabled ones are dropped
        let mut sinks = vec![Sink::Console, Sink::File];
        sinks.retain(|sink| match sink {
            Sink::Console => to_console,
            Sink::File => to_file,
        });

        let auto_flush = filter.admits_debug();
        Self {
            filter,
            sinks,
            file,
            rotation: Rotation::Daily,
            auto_flush,
        }
    }

    pub fn has_sink(&self, sink: Sink) -> bool {
        self.sinks.contains(&sink)
    }
}

/// Shared record layout: `[timestamp] [thread] [severity]  message`
#[derive(Debug, Clone)]
pub struct RecordFormat {
    timer: ChronoUtc,
}

impl RecordFormat {
    pub fn new() -> Self {
        Self {
            timer: ChronoUtc::new(TIMESTAMP_FORMAT.to_string()),
        }
    }
}

impl Default for RecordFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, N> FormatEvent<S, N> for RecordFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        writer.write_char('[')?;
        self.timer.format_time(&mut writer)?;
        write!(
            writer,
            "] [{:?}] [{}]  ",
            std::thread::current().id(),
            Severity::of(event)
        )?;

        let mut fields = FieldWriter {
            writer: &mut writer,
            result: Ok(()),
            first: true,
        };
        event.record(&mut fields);
        fields.result?;
        writeln!(writer)
    }
}

/// Writes the message and extra fields; the fatal marker is already in the
/// severity column
struct FieldWriter<'a, 'w> {
    writer: &'a mut Writer<'w>,
    result: fmt::Result,
    first: bool,
}

impl Visit for FieldWriter<'_, '_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if self.result.is_err() || field.name() == FATAL_FIELD {
            return;
        }
        let separator = if self.first { "" } else { " " };
        self.first = false;
        self.result = if field.name() == "message" {
            write!(self.writer, "{separator}{value:?}")
        } else {
            write!(self.writer, "{separator}{}={value:?}", field.name())
        };
    }
}

type FilterLayer = reload::Layer<SeverityFilter, Registry>;
type Filtered = Layered<FilterLayer, Registry>;
type BoxedSink = Box<dyn Layer<Filtered> + Send + Sync>;

/// The installed logging pipeline.
///
/// Created once at startup by [`install`](Self::install) and kept alive by
/// the caller; dropping it flushes buffered file output.
pub struct LoggingContext {
    config: ActiveLogConfig,
    filter: reload::Handle<SeverityFilter, Registry>,
    sinks: reload::Handle<Vec<BoxedSink>, Filtered>,
    _guard: Option<WorkerGuard>,
}

impl LoggingContext {
    /// Publish `config` as the process-wide subscriber.
    ///
    /// Fails if a global subscriber is already installed.
    pub fn install(config: ActiveLogConfig) -> KovriResult<Self> {
        let (sinks, guard) = build_sinks(&config)?;
        let (filter_layer, filter) = reload::Layer::new(config.filter.clone());
        let (sink_layer, sink_handle) = reload::Layer::new(sinks);

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(sink_layer)
            .try_init()
            .map_err(|e| KovriError::Logging(e.to_string()))?;

        Ok(Self {
            config,
            filter,
            sinks: sink_handle,
            _guard: guard,
        })
    }

    /// Replace the filter and the sink set with those of `config`
    pub fn apply(&mut self, config: ActiveLogConfig) -> KovriResult<()> {
        let (sinks, guard) = build_sinks(&config)?;
        self.filter
            .reload(config.filter.clone())
            .map_err(|e| KovriError::Logging(e.to_string()))?;
        self.sinks
            .reload(sinks)
            .map_err(|e| KovriError::Logging(e.to_string()))?;
        self._guard = guard;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &ActiveLogConfig {
        &self.config
    }

    /// Number of sinks currently attached
    pub fn active_sinks(&self) -> KovriResult<usize> {
        self.sinks
            .with_current(Vec::len)
            .map_err(|e| KovriError::Logging(e.to_string()))
    }
}

impl fmt::Debug for LoggingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Build the surviving sinks of `config`, all sharing one record format
fn build_sinks(config: &ActiveLogConfig) -> KovriResult<(Vec<BoxedSink>, Option<WorkerGuard>)> {
    let format = RecordFormat::new();
    let mut sinks: Vec<BoxedSink> = Vec::with_capacity(config.sinks.len());
    let mut guard = None;

    for sink in &config.sinks {
        match sink {
            Sink::Console => sinks.push(
                tracing_subscriber::fmt::layer()
                    .event_format(format.clone())
                    .with_ansi(false)
                    .with_writer(std::io::stderr)
                    .boxed(),
            ),
            Sink::File => {
                let appender = rolling_appender(config)?;
                if config.auto_flush {
                    sinks.push(
                        tracing_subscriber::fmt::layer()
                            .event_format(format.clone())
                            .with_ansi(false)
                            .with_writer(appender)
                            .boxed(),
                    );
                } else {
                    let (writer, worker) =
                        NonBlockingBuilder::default().lossy(false).finish(appender);
                    guard = Some(worker);
                    sinks.push(
                        tracing_subscriber::fmt::layer()
                            .event_format(format.clone())
                            .with_ansi(false)
                            .with_writer(writer)
                            .boxed(),
                    );
                }
            }
        }
    }

    Ok((sinks, guard))
}

fn rolling_appender(config: &ActiveLogConfig) -> KovriResult<RollingFileAppender> {
    let directory = &config.file.directory;
    std::fs::create_dir_all(directory).map_err(|source| KovriError::Io {
        path: directory.clone(),
        source,
    })?;

    let rotation = match config.rotation {
        Rotation::Daily => AppenderRotation::DAILY,
    };
    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.file.prefix.as_str())
        .filename_suffix(config.file.suffix.as_str())
        .build(directory)?;
    Ok(appender)
}
