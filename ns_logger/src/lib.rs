//! Namespace- and level-aware log capture
//!
//! `ns_logger` runs inside a host application, intercepts log calls, tags
//! each with a namespace and a severity level, and keeps them in a queryable
//! in-memory store so an inspection panel can filter, search, edit and clear
//! the captured history at runtime.
//!
//! ```no_run
//! use ns_logger::{args, Logger, LogQuery};
//!
//! let logger = Logger::new();
//! logger.warn(args!["api", "slow response", serde_json::json!({"ms": 950})]);
//! logger.log(args!["no namespace given"]);
//!
//! let api = logger.get_logger("api");
//! api.error(args!["request failed"]);
//!
//! let warnings = logger.get_logs(LogQuery::all().namespace("api")).unwrap();
//! assert_eq!(warnings.len(), 2);
//! ```

pub mod args;
pub mod config;
pub mod console;
pub mod cycle;
pub mod error;
pub mod filter;
pub mod logger;
pub mod pretty;
pub mod store;
pub mod tracing_layer;
pub mod types;
pub mod value;

#[cfg(test)]
mod tests;

pub use args::{Arg, ErrorValue, Markup};
pub use config::LoggerConfig;
pub use console::{ConsoleFn, ConsoleFns, ConsoleInterception, HostConsole};
pub use cycle::{decycle, retrocycle, stringify};
pub use error::LoggerError;
pub use filter::LogQuery;
pub use logger::{is_emitting, Logger, LoggerBuilder, NamespacedLogger};
pub use pretty::pretty_print;
pub use store::{LogBackend, MemoryStore, StoreEvent, StoreStats};
pub use tracing_layer::ConsoleCaptureLayer;
pub use types::{
    ExtraItem, ExtraKind, Level, LevelSet, LogRecord, NewRecord, RecordPatch, RecordUpdate,
    StoredRecord, CONSOLE_NAMESPACE, DEFAULT_NAMESPACE,
};
pub use value::Value;

/// Build the argument list of a logging call
///
/// Each expression is converted with `Arg::from`.
///
/// ```
/// use ns_logger::{args, Arg};
///
/// let call: Vec<Arg> = args!["api", "status", 200];
/// assert_eq!(call.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Arg>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Arg::from($arg)),+]
    };
}
