//! Demo host application feeding the log capture service from every entry point

use anyhow::Result;
use crossbeam_channel::Receiver;
use ns_logger::{
    args, Arg, ConsoleCaptureLayer, ConsoleFns, ErrorValue, HostConsole, Level, LogQuery, Logger,
    LoggerConfig, Markup, MemoryStore, StoreEvent, Value,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Everything the demo host owns
pub struct DemoApp {
    pub logger: Logger,
    store: Arc<MemoryStore>,
    console: Arc<HostConsole>,
    events: Receiver<StoreEvent>,
}

impl DemoApp {
    /// Build the logger and install tracing with the capture layer
    pub fn new(config: LoggerConfig, default_filter: &str) -> Result<Self> {
        let store = Arc::new(config.build_store());
        let events = store.subscribe();
        let logger = Logger::builder()
            .config(config)
            .datastore(store.clone())
            .console(ConsoleFns::stdio())
            .build();

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(env_filter);

        tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(fmt_layer)
                .with(ConsoleCaptureLayer::new(logger.clone()).namespace_from_target(true)),
        )?;

        info!(target: "demo", "logging system initialized");
        Ok(Self {
            logger,
            store,
            console: Arc::new(HostConsole::stdio()),
            events,
        })
    }

    /// Exercise direct calls, namespaced loggers, console capture and tracing
    pub fn generate_demo_logs(&self) {
        let logger = &self.logger;

        logger.log(args!["demo starting"]);
        logger.info(args!["app", "configuration loaded", Value::from(serde_json::json!({
            "theme": "dark",
            "plugins": ["search", "export"],
        }))]);

        let api = logger.get_logger("api");
        api.warn(args![
            "slow response",
            serde_json::json!({"route": "/users", "ms": 950})
        ]);
        let io_failure = std::io::Error::new(std::io::ErrorKind::TimedOut, "upstream timed out");
        api.error(args![Arg::error(&io_failure)]);
        api.error(args![
            "handler failed",
            ErrorValue::new("index out of range")
                .with_stack("RangeError: index out of range\n    at render (table.rs:88)")
        ]);

        // Markup is previewed on the console and stored as html
        logger.info(args![
            "ui",
            "rendered table",
            Markup::new("<table>\n<tr><td>Ada</td></tr>\n\n\n<tr><td>Grace</td></tr>\n</table>")
        ]);

        // A payload that refers to itself
        let session = Value::object([("user", Value::from("ada"))]);
        session.set("self", session.clone());
        logger.log(args!["session", "session snapshot", session]);

        // Editing a record after the fact
        if let Some(mut record) = logger.log(args!["jobs", "job 17 queued"]) {
            record.message = "job 17 finished".to_string();
            record.level = Level::Info;
            logger.update(record);
        }

        // Host console output while intercepted
        {
            let _interception = logger.intercept_console(&self.console);
            self.console.log(&args!["hello from the host console"]);
            self.console.warn(&args!["deprecated option", "--fast"]);
        }
        self.console.info(&args!["this line is not captured"]);

        // Events from the host's own tracing instrumentation
        info!(target: "demo::worker", jobs = 3, "worker pool started");
        warn!(target: "demo::worker", queue_depth = 120, "queue is backing up");
        error!(target: "demo::worker", job = 17, "job retried too often");
        debug!(target: "demo::cache", hit_rate = 0.93, "cache stats");

        logger.log(args!["scratch", "temporary"]);
        logger.log(args!["scratch", "temporary again"]);
        let cleared = logger.clear("scratch");
        info!(target: "demo", cleared, "scratch namespace cleared");
    }

    /// Print statistics about the record store
    pub fn print_statistics(&self) {
        let stats = self.store.stats();

        println!("\n=== Record Store Statistics ===");
        println!("Total records inserted: {}", stats.total_inserted);
        println!("Current records: {}", stats.current);
        println!("Evicted (capacity): {}", stats.evicted);
        match stats.capacity {
            Some(capacity) => println!("Capacity: {}", capacity),
            None => println!("Capacity: unbounded"),
        }

        println!("\n=== Records by Level ===");
        for level in Level::ALL {
            let count = self.logger.get_logs(level).map(|logs| logs.len()).unwrap_or(0);
            println!("{:5}: {}", level, count);
        }

        println!("\n=== Namespaces ===");
        for namespace in self.logger.get_namespaces() {
            let count = self
                .logger
                .get_logs(LogQuery::all().namespace(namespace.as_str()))
                .map(|logs| logs.len())
                .unwrap_or(0);
            println!("{}: {}", namespace, count);
        }

        let mut inserted = 0;
        let mut changed = 0;
        for event in self.events.try_iter() {
            match event {
                StoreEvent::Inserted { .. } => inserted += 1,
                StoreEvent::Updated { .. }
                | StoreEvent::Deleted { .. }
                | StoreEvent::Evicted { .. } => changed += 1,
            }
        }
        println!("\n=== Store Events ===");
        println!("Inserts observed: {}", inserted);
        println!("Other changes observed: {}", changed);
    }
}
