//! Host console model and reversible console interception

use crate::args::Arg;
use crate::logger::{is_emitting, Logger};
use crate::types::Level;
use parking_lot::RwLock;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

/// A console output function
pub type ConsoleFn = Arc<dyn Fn(&[Arg]) + Send + Sync>;

/// One optional output function per level
#[derive(Clone, Default)]
pub struct ConsoleFns {
    pub error: Option<ConsoleFn>,
    pub warn: Option<ConsoleFn>,
    pub info: Option<ConsoleFn>,
    pub log: Option<ConsoleFn>,
}

impl ConsoleFns {
    /// No output functions at all
    pub fn none() -> Self {
        Self::default()
    }

    /// Error and warn go to stderr, info and log to stdout
    pub fn stdio() -> Self {
        let stderr: ConsoleFn = Arc::new(|args: &[Arg]| {
            let _ = writeln!(std::io::stderr().lock(), "{}", render_line(args));
        });
        let stdout: ConsoleFn = Arc::new(|args: &[Arg]| {
            let _ = writeln!(std::io::stdout().lock(), "{}", render_line(args));
        });
        Self {
            error: Some(stderr.clone()),
            warn: Some(stderr),
            info: Some(stdout.clone()),
            log: Some(stdout),
        }
    }

    /// The same function for every level, told which level it serves
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Level, &[Arg]) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let mut fns = Self::none();
        for level in Level::ALL {
            let f = f.clone();
            fns.set(level, Some(Arc::new(move |args: &[Arg]| f(level, args))));
        }
        fns
    }

    pub fn get(&self, level: Level) -> Option<&ConsoleFn> {
        match level {
            Level::Error => self.error.as_ref(),
            Level::Warn => self.warn.as_ref(),
            Level::Info => self.info.as_ref(),
            Level::Log => self.log.as_ref(),
        }
    }

    pub fn set(&mut self, level: Level, f: Option<ConsoleFn>) {
        let slot = match level {
            Level::Error => &mut self.error,
            Level::Warn => &mut self.warn,
            Level::Info => &mut self.info,
            Level::Log => &mut self.log,
        };
        *slot = f;
    }

    /// The function of `level`, falling back to `log`
    pub fn resolve(&self, level: Level) -> Option<&ConsoleFn> {
        self.get(level).or(self.log.as_ref())
    }
}

impl fmt::Debug for ConsoleFns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleFns")
            .field("error", &self.error.is_some())
            .field("warn", &self.warn.is_some())
            .field("info", &self.info.is_some())
            .field("log", &self.log.is_some())
            .finish()
    }
}

/// Arguments joined by spaces, as a console prints them
pub fn render_line(args: &[Arg]) -> String {
    args.iter().map(Arg::display_string).collect::<Vec<_>>().join(" ")
}

/// The application's console, whose functions can be swapped at runtime
pub struct HostConsole {
    slots: RwLock<ConsoleFns>,
}

impl HostConsole {
    pub fn new(fns: ConsoleFns) -> Self {
        Self { slots: RwLock::new(fns) }
    }

    /// A console writing to the standard streams
    pub fn stdio() -> Self {
        Self::new(ConsoleFns::stdio())
    }

    pub fn error(&self, args: &[Arg]) {
        self.call(Level::Error, args);
    }

    pub fn warn(&self, args: &[Arg]) {
        self.call(Level::Warn, args);
    }

    pub fn info(&self, args: &[Arg]) {
        self.call(Level::Info, args);
    }

    pub fn log(&self, args: &[Arg]) {
        self.call(Level::Log, args);
    }

    /// Invoke the current function of `level`, if any
    pub fn call(&self, level: Level, args: &[Arg]) {
        // Release the lock before calling out
        let f = self.slots.read().get(level).cloned();
        if let Some(f) = f {
            f(args);
        }
    }

    /// Snapshot of the current functions
    pub fn functions(&self) -> ConsoleFns {
        self.slots.read().clone()
    }

    /// Install `fns` and return the functions they replace
    pub fn replace(&self, fns: ConsoleFns) -> ConsoleFns {
        std::mem::replace(&mut *self.slots.write(), fns)
    }
}

impl Default for HostConsole {
    fn default() -> Self {
        Self::stdio()
    }
}

/// Handle redirecting a [`HostConsole`] into a [`Logger`]
///
/// While active, every console call is logged under the logger's capture
/// namespace. Dropping the handle restores the original functions.
pub struct ConsoleInterception {
    console: Arc<HostConsole>,
    logger: Logger,
    originals: Option<ConsoleFns>,
}

impl ConsoleInterception {
    /// Create an inactive handle
    pub fn new(console: Arc<HostConsole>, logger: Logger) -> Self {
        Self { console, logger, originals: None }
    }

    /// Replace the console functions with logging trampolines
    ///
    /// Calling this while already active does nothing.
    pub fn intercept(&mut self) {
        if self.originals.is_some() {
            return;
        }

        let originals = self.console.functions();
        let mut trampolines = ConsoleFns::none();
        for level in Level::ALL {
            trampolines.set(level, Some(self.trampoline(level, originals.get(level).cloned())));
        }

        self.originals = Some(self.console.replace(trampolines));
        debug!(namespace = self.logger.capture_namespace(), "console interception started");
    }

    /// Put the original console functions back
    ///
    /// Calling this while inactive does nothing.
    pub fn stop(&mut self) {
        if let Some(originals) = self.originals.take() {
            self.console.replace(originals);
            debug!("console interception stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.originals.is_some()
    }

    fn trampoline(&self, level: Level, original: Option<ConsoleFn>) -> ConsoleFn {
        let logger = self.logger.clone();
        Arc::new(move |args: &[Arg]| {
            // Output produced by the logger itself goes straight through
            if is_emitting() {
                if let Some(original) = &original {
                    original(args);
                }
                return;
            }

            let mut call = Vec::with_capacity(args.len() + 1);
            call.push(Arg::from(logger.capture_namespace()));
            call.extend(args.iter().cloned());
            logger.emit(level, call);
        })
    }
}

impl Drop for ConsoleInterception {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::LogQuery;
    use crate::store::{LogBackend, MemoryStore};
    use parking_lot::Mutex;

    type Lines = Arc<Mutex<Vec<(Level, String)>>>;

    fn recording() -> (ConsoleFns, Lines) {
        let lines: Lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let fns =
            ConsoleFns::from_fn(move |level, args| sink.lock().push((level, render_line(args))));
        (fns, lines)
    }

    #[test]
    fn test_resolve_falls_back_to_log() {
        let (all, _) = recording();
        let mut fns = ConsoleFns::none();
        fns.set(Level::Log, all.log.clone());

        assert!(fns.get(Level::Warn).is_none());
        assert!(fns.resolve(Level::Warn).is_some());
        assert!(ConsoleFns::none().resolve(Level::Error).is_none());
    }

    #[test]
    fn test_render_line() {
        let line = render_line(&crate::args![1, "two", serde_json::json!({"k": true})]);
        assert_eq!(line, r#"1 two {"k":true}"#);
    }

    #[test]
    fn test_host_console_replace() {
        let (first, first_lines) = recording();
        let (second, second_lines) = recording();
        let console = HostConsole::new(first);

        console.warn(&crate::args!["a"]);
        let previous = console.replace(second);
        console.warn(&crate::args!["b"]);
        console.replace(previous);
        console.warn(&crate::args!["c"]);

        assert_eq!(first_lines.lock().len(), 2);
        assert_eq!(second_lines.lock().as_slice(), [(Level::Warn, "b".to_string())]);
    }

    #[test]
    fn test_interception_logs_and_restores() {
        let (host_fns, host_lines) = recording();
        let (forward_fns, forward_lines) = recording();
        let console = Arc::new(HostConsole::new(host_fns));
        let store = Arc::new(MemoryStore::new());
        let logger = Logger::builder().datastore(store.clone()).console(forward_fns).build();

        let mut interception = logger.intercept_console(&console);
        assert!(interception.is_active());

        console.log(&crate::args!["hello world"]);
        console.error(&crate::args!["bad", 3]);

        let records = store.read(&LogQuery::from("console"));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "hello world");
        assert_eq!(records[1].level, Level::Error);
        assert_eq!(records[1].extra.len(), 1);

        // The "console" namespace is not echoed to the forward target
        assert_eq!(
            forward_lines.lock().as_slice(),
            [(Level::Log, "hello world".to_string()), (Level::Error, "bad 3".to_string())]
        );
        assert!(host_lines.lock().is_empty());

        interception.stop();
        interception.stop();
        assert!(!interception.is_active());

        console.log(&crate::args!["after"]);
        assert_eq!(store.len(), 2);
        assert_eq!(host_lines.lock().as_slice(), [(Level::Log, "after".to_string())]);
    }

    #[test]
    fn test_intercept_is_idempotent() {
        let (host_fns, host_lines) = recording();
        let console = Arc::new(HostConsole::new(host_fns));
        let logger = Logger::builder().console(ConsoleFns::none()).build();

        let mut interception = ConsoleInterception::new(console.clone(), logger);
        interception.intercept();
        interception.intercept();
        interception.stop();

        console.info(&crate::args!["restored"]);
        assert_eq!(host_lines.lock().len(), 1);
    }

    #[test]
    fn test_drop_restores_console() {
        let (host_fns, host_lines) = recording();
        let console = Arc::new(HostConsole::new(host_fns));
        let store = Arc::new(MemoryStore::new());
        let logger = Logger::builder().datastore(store.clone()).console(ConsoleFns::none()).build();

        {
            let _interception = logger.intercept_console(&console);
            console.log(&crate::args!["captured"]);
        }
        console.log(&crate::args!["plain"]);

        assert_eq!(store.len(), 1);
        assert_eq!(host_lines.lock().as_slice(), [(Level::Log, "plain".to_string())]);
    }

    #[test]
    fn test_logger_forwarding_to_intercepted_console_does_not_recurse() {
        let (host_fns, host_lines) = recording();
        let console = Arc::new(HostConsole::new(host_fns));
        let store = Arc::new(MemoryStore::new());

        let mut interception = ConsoleInterception::new(
            console.clone(),
            Logger::builder().datastore(store.clone()).console(ConsoleFns::none()).build(),
        );
        interception.intercept();

        // Forward target is the intercepted console itself
        let looping = console.clone();
        let forward = ConsoleFns::from_fn(move |level, args| looping.call(level, args));
        let logger = Logger::builder().datastore(store.clone()).console(forward).build();

        logger.log(crate::args!["app", "once"]);

        assert_eq!(store.len(), 1);
        assert_eq!(host_lines.lock().as_slice(), [(Level::Log, "app once".to_string())]);
    }
}
