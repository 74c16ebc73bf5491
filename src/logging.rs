//! Process logging: a size-rotated log file plus the conversation log handle
//! the dialogue writes its request/response/error records through.

use anyhow::{Context, Result};
use chrono::Local;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Registry};

use crate::search::SearchError;
use crate::transport::TransportError;

pub const LOG_FILE_NAME: &str = "bot.log";
pub const CONVERSATION_TARGET: &str = "conversation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub dir: PathBuf,
    pub max_bytes: u64,
    pub backups: usize,
    /// Mirror log lines to stderr as well.
    pub console: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            max_bytes: 100 * 1024 * 1024,
            backups: 5,
            console: false,
        }
    }
}

impl LogSettings {
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE_NAME)
    }
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init(settings: &LogSettings) -> Result<()> {
    fs::create_dir_all(&settings.dir)
        .with_context(|| format!("failed to create log directory {}", settings.dir.display()))?;

    let writer =
        RotatingFileWriter::open(settings.file_path(), settings.max_bytes, settings.backups)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .event_format(LineFormat)
        .with_ansi(false)
        .with_writer(writer);
    let console_layer = settings.console.then(|| {
        tracing_subscriber::fmt::layer()
            .event_format(LineFormat)
            .with_writer(io::stderr)
    });

    let subscriber = Registry::default()
        .with(filter)
        .with(file_layer)
        .with(console_layer);

    // Bridge log crate -> tracing (reqwest and hyper log through `log`)
    tracing_log::LogTracer::init().context("failed to bridge `log` records into tracing")?;
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install the tracing subscriber")?;

    tracing::info!("Logger initialized successfully.");
    Ok(())
}

/// `[YYYY-MM-DD hh:mm:ss] [LEVEL] span{fields} message`
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
        write!(
            writer,
            "[{}] [{}] ",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            event.metadata().level()
        )?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{}}}", fields)?;
                    }
                }
                write!(writer, " ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// A log file that is rolled over to `<name>.1 .. <name>.<backups>` once it would grow past
/// `max_bytes`. The oldest backup is dropped.
pub struct RotatingFileWriter {
    state: Mutex<RotatingState>,
}

struct RotatingState {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    backups: usize,
}

impl RotatingFileWriter {
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> Result<Self> {
        let path = path.into();
        let file = open_append(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            state: Mutex::new(RotatingState {
                path,
                file,
                written,
                max_bytes,
                backups,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RotatingState> {
        // A panic mid-write leaves nothing inconsistent worth refusing to log over.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Path of the `index`-th backup; `.1` is the most recent.
pub fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl RotatingState {
    fn should_rotate(&self, incoming: usize) -> bool {
        self.max_bytes > 0 && self.written > 0 && self.written + incoming as u64 > self.max_bytes
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backups == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        for index in (1..self.backups).rev() {
            let from = backup_path(&self.path, index);
            if from.exists() {
                fs::rename(&from, backup_path(&self.path, index + 1))?;
            }
        }
        fs::rename(&self.path, backup_path(&self.path, 1))?;

        self.file = open_append(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

pub struct RotatingFileGuard<'a> {
    state: MutexGuard<'a, RotatingState>,
}

impl Write for RotatingFileGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state.should_rotate(buf.len()) {
            self.state.rotate()?;
        }
        let n = self.state.file.write(buf)?;
        self.state.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFileWriter {
    type Writer = RotatingFileGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingFileGuard { state: self.lock() }
    }
}

/// Handle for the per-message audit trail: what came in, what went out, what broke.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationLog;

impl ConversationLog {
    pub fn new() -> Self {
        Self
    }

    pub fn request(&self, user_id: i64, raw_text: &str, cleaned: &str) {
        tracing::info!(target: CONVERSATION_TARGET, "User {user_id}: {raw_text} -> {cleaned}");
    }

    pub fn response(&self, user_id: i64, response: &str) {
        tracing::info!(target: CONVERSATION_TARGET, "Bot -> User {user_id}: {response}");
    }

    /// Records a failed search. Upstream trouble is expected now and then; a payload we
    /// cannot read is not.
    pub fn search_failure(&self, error: &SearchError) {
        if error.is_expected() {
            tracing::warn!(target: CONVERSATION_TARGET, "Error occurred: {error:?}");
        } else {
            tracing::error!(target: CONVERSATION_TARGET, "Unexpected fault: {error:?}");
        }
    }

    /// The answer was ready but the chat service refused it.
    pub fn delivery_failure(&self, error: &TransportError) {
        tracing::warn!(target: CONVERSATION_TARGET, "Error occurred: {error:?}");
    }

    pub fn fault(&self, detail: &dyn fmt::Display) {
        tracing::error!(target: CONVERSATION_TARGET, "Unexpected fault: {detail}");
    }

    pub fn search_completed(&self, query: &str, results: usize, elapsed_ms: u64) {
        tracing::debug!(target: CONVERSATION_TARGET, query, results, elapsed_ms, "search completed");
    }
}
