//! Ingestion pipeline: namespace defaulting, severity gates and the query facade

use crate::args::{display_primitive, expand_newlines, Arg};
use crate::config::LoggerConfig;
use crate::console::{ConsoleFns, ConsoleInterception, HostConsole};
use crate::cycle::stringify;
use crate::error::LoggerError;
use crate::filter::LogQuery;
use crate::store::LogBackend;
use crate::types::{
    Level, LevelSet, LogRecord, NewRecord, RecordPatch, RecordUpdate, StoredRecord,
    CONSOLE_NAMESPACE, DEFAULT_NAMESPACE,
};
use chrono::Utc;
use parking_lot::RwLock;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

thread_local! {
    static EMITTING: Cell<bool> = const { Cell::new(false) };
}

/// True while a logging call is running on the current thread
///
/// Capture paths check this to drop events raised by the logger's own
/// console output instead of feeding them back into the pipeline.
pub fn is_emitting() -> bool {
    EMITTING.with(Cell::get)
}

struct EmitGuard {
    previous: bool,
}

impl EmitGuard {
    fn enter() -> Self {
        Self { previous: EMITTING.with(|flag| flag.replace(true)) }
    }
}

impl Drop for EmitGuard {
    fn drop(&mut self) {
        EMITTING.with(|flag| flag.set(self.previous));
    }
}

enum StoreSetting {
    /// A memory store sized by the config
    Default,
    Custom(Arc<dyn LogBackend>),
    Disabled,
}

/// Builder for [`Logger`]
pub struct LoggerBuilder {
    config: LoggerConfig,
    store: StoreSetting,
    console: ConsoleFns,
}

impl LoggerBuilder {
    fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
            store: StoreSetting::Default,
            console: ConsoleFns::stdio(),
        }
    }

    /// Gates, preview length, capacity and capture namespace
    pub fn config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Store records in `store` instead of a fresh memory store
    pub fn datastore<B: LogBackend + 'static>(mut self, store: Arc<B>) -> Self {
        self.store = StoreSetting::Custom(store);
        self
    }

    /// Do not store records at all; logging calls still reach the console
    pub fn without_datastore(mut self) -> Self {
        self.store = StoreSetting::Disabled;
        self
    }

    /// Functions that enabled levels are forwarded to
    pub fn console(mut self, console: ConsoleFns) -> Self {
        self.console = console;
        self
    }

    pub fn build(self) -> Logger {
        let datastore: Option<Arc<dyn LogBackend>> = match self.store {
            StoreSetting::Default => Some(Arc::new(self.config.build_store())),
            StoreSetting::Custom(store) => Some(store),
            StoreSetting::Disabled => None,
        };
        if datastore.is_none() {
            warn!("logger built without a datastore; records will not be kept");
        }

        Logger {
            inner: Arc::new(LoggerInner {
                console: self.console,
                console_enabled: RwLock::new(self.config.console_enabled),
                db_enabled: RwLock::new(self.config.db_enabled),
                datastore,
                preview_len: self.config.preview_len,
                capture_namespace: self.config.capture_namespace,
            }),
        }
    }
}

struct LoggerInner {
    console: ConsoleFns,
    console_enabled: RwLock<LevelSet>,
    db_enabled: RwLock<LevelSet>,
    datastore: Option<Arc<dyn LogBackend>>,
    preview_len: usize,
    capture_namespace: String,
}

/// Namespace-aware logger
///
/// Cheap to clone; clones share gates and datastore. Every logging method
/// takes the call's arguments in the shape
/// `(namespace, message, extra...)`, built with [`args!`](crate::args).
/// A call with a single argument logs it as the message of the `"default"`
/// namespace.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    /// Logger with default config, a memory store and stdio forwarding
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    pub fn error(&self, args: Vec<Arg>) -> Option<StoredRecord> {
        self.emit(Level::Error, args)
    }

    pub fn warn(&self, args: Vec<Arg>) -> Option<StoredRecord> {
        self.emit(Level::Warn, args)
    }

    pub fn info(&self, args: Vec<Arg>) -> Option<StoredRecord> {
        self.emit(Level::Info, args)
    }

    pub fn log(&self, args: Vec<Arg>) -> Option<StoredRecord> {
        self.emit(Level::Log, args)
    }

    /// Run one logging call through the pipeline
    ///
    /// Returns the stored record, or `None` when the level is not stored or
    /// there is no datastore.
    pub fn emit(&self, level: Level, mut args: Vec<Arg>) -> Option<StoredRecord> {
        let _guard = EmitGuard::enter();

        // Single argument, or an undefined message: log under "default"
        if args.len() < 2 || args[1].is_undefined() {
            let first = args.first().cloned().unwrap_or_else(Arg::undefined);
            if args.len() < 2 {
                args = vec![Arg::from(DEFAULT_NAMESPACE), first];
            } else {
                args[0] = Arg::from(DEFAULT_NAMESPACE);
                args[1] = first;
            }
        }

        let namespace = args[0].display_string();
        let mut message = message_text(&args[1]);

        let mut trailing = None;
        for (index, arg) in args.iter_mut().enumerate() {
            let formatted = match arg {
                Arg::Error(err) if index == 1 => {
                    message = err.short_form();
                    trailing = Some(Arg::from(err.long_form()));
                    Arg::from(message.clone())
                }
                Arg::Error(err) => Arg::from(err.long_form()),
                Arg::Primitive(crate::Value::String(s)) => Arg::from(expand_newlines(s)),
                _ => continue,
            };
            *arg = formatted;
        }
        args.extend(trailing);

        if self.console_enabled().contains(level) {
            self.forward_to_console(level, &namespace, &args);
        }

        if !self.db_enabled().contains(level) {
            return None;
        }
        let datastore = self.inner.datastore.as_ref()?;

        let data = args.split_off(2);
        let record = datastore.create(NewRecord {
            namespace,
            level,
            time: Utc::now(),
            message,
            extra: data.iter().map(Arg::to_extra).collect(),
        });

        Some(StoredRecord {
            id: record.id,
            namespace: record.namespace,
            level: record.level,
            time: record.time,
            message: record.message,
            data,
        })
    }

    fn forward_to_console(&self, level: Level, namespace: &str, args: &[Arg]) {
        let Some(console_fn) = self.inner.console.resolve(level) else {
            return;
        };

        // Implicit namespaces are not echoed
        let implicit = namespace == DEFAULT_NAMESPACE
            || namespace == CONSOLE_NAMESPACE
            || namespace == self.inner.capture_namespace;
        let skip = usize::from(implicit);
        let console_args: Vec<Arg> = args
            .iter()
            .skip(skip)
            .map(|arg| arg.console_form(self.inner.preview_len))
            .collect();
        console_fn(&console_args);
    }

    /// A logger with `namespace` pre-applied
    pub fn get_logger(&self, namespace: impl Into<String>) -> NamespacedLogger {
        NamespacedLogger {
            logger: self.clone(),
            namespace: namespace.into(),
        }
    }

    /// Stored records matching `query`, oldest first
    pub fn get_logs(&self, query: impl Into<LogQuery>) -> Result<Vec<LogRecord>, LoggerError> {
        let datastore = self.inner.datastore.as_ref().ok_or_else(LoggerError::no_datastore)?;
        Ok(datastore.read(&query.into()))
    }

    /// Merge an edited record back into the store
    ///
    /// `extra` is re-rendered when `data` is supplied. Returns `false` when
    /// there is no datastore, the id is unknown, or the update moves the
    /// record to a level that is not stored.
    pub fn update(&self, update: impl Into<RecordUpdate>) -> bool {
        let update = update.into();
        let Some(datastore) = self.inner.datastore.as_ref() else {
            return false;
        };
        if let Some(level) = update.level {
            if !self.db_enabled().contains(level) {
                return false;
            }
        }

        let patch = RecordPatch {
            namespace: update.namespace,
            level: update.level,
            message: update.message,
            extra: update.data.map(|data| data.iter().map(Arg::to_extra).collect()),
        };
        datastore.update(update.id, patch)
    }

    /// Delete stored records matching `query`; returns how many went
    pub fn clear(&self, query: impl Into<LogQuery>) -> usize {
        match self.inner.datastore.as_ref() {
            Some(datastore) => datastore.delete(&query.into()),
            None => 0,
        }
    }

    /// Delete every stored record
    pub fn clear_all(&self) -> usize {
        self.clear(LogQuery::all())
    }

    /// Namespaces of the stored records, in first-seen order
    pub fn get_namespaces(&self) -> Vec<String> {
        self.inner
            .datastore
            .as_ref()
            .map(|datastore| datastore.namespaces())
            .unwrap_or_default()
    }

    pub fn console_enabled(&self) -> LevelSet {
        *self.inner.console_enabled.read()
    }

    pub fn set_console_enabled(&self, levels: impl Into<LevelSet>) {
        *self.inner.console_enabled.write() = levels.into();
    }

    pub fn db_enabled(&self) -> LevelSet {
        *self.inner.db_enabled.read()
    }

    pub fn set_db_enabled(&self, levels: impl Into<LevelSet>) {
        *self.inner.db_enabled.write() = levels.into();
    }

    pub fn datastore(&self) -> Option<&Arc<dyn LogBackend>> {
        self.inner.datastore.as_ref()
    }

    /// Namespace used for intercepted console and tracing output
    pub fn capture_namespace(&self) -> &str {
        &self.inner.capture_namespace
    }

    /// Start logging everything written to `console`
    ///
    /// Interception lasts until the returned handle is stopped or dropped.
    pub fn intercept_console(&self, console: &Arc<HostConsole>) -> ConsoleInterception {
        let mut interception = ConsoleInterception::new(console.clone(), self.clone());
        interception.intercept();
        interception
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("console_enabled", &self.console_enabled())
            .field("db_enabled", &self.db_enabled())
            .field("has_datastore", &self.inner.datastore.is_some())
            .field("capture_namespace", &self.inner.capture_namespace)
            .finish()
    }
}

/// Text stored as the record message
fn message_text(arg: &Arg) -> String {
    match arg {
        Arg::Primitive(value) => display_primitive(value),
        Arg::Error(err) => err.short_form(),
        Arg::Markup(markup) => markup.text().to_string(),
        Arg::Structured(value) => {
            expand_newlines(&stringify(value).unwrap_or_else(|| "undefined".to_string()))
        }
    }
}

/// Logger bound to one namespace
#[derive(Debug, Clone)]
pub struct NamespacedLogger {
    logger: Logger,
    namespace: String,
}

impl NamespacedLogger {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn error(&self, args: Vec<Arg>) -> Option<StoredRecord> {
        self.emit(Level::Error, args)
    }

    pub fn warn(&self, args: Vec<Arg>) -> Option<StoredRecord> {
        self.emit(Level::Warn, args)
    }

    pub fn info(&self, args: Vec<Arg>) -> Option<StoredRecord> {
        self.emit(Level::Info, args)
    }

    pub fn log(&self, args: Vec<Arg>) -> Option<StoredRecord> {
        self.emit(Level::Log, args)
    }

    pub fn emit(&self, level: Level, args: Vec<Arg>) -> Option<StoredRecord> {
        let mut call = Vec::with_capacity(args.len() + 1);
        call.push(Arg::from(self.namespace.as_str()));
        call.extend(args);
        self.logger.emit(level, call)
    }
}
