//! Tracing layer that forwards events into a [`Logger`]

use crate::args::Arg;
use crate::logger::{is_emitting, Logger};
use crate::types::Level;
use crate::value::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Captures `tracing` events as log records
///
/// Events land in the logger's capture namespace, or in a namespace named
/// after the event target when [`namespace_from_target`](Self::namespace_from_target)
/// is set. Structured fields travel as one object argument.
#[derive(Debug, Clone)]
pub struct ConsoleCaptureLayer {
    logger: Logger,
    namespace_from_target: bool,
}

impl ConsoleCaptureLayer {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            namespace_from_target: false,
        }
    }

    /// Use the event target as the record namespace
    pub fn namespace_from_target(mut self, enabled: bool) -> Self {
        self.namespace_from_target = enabled;
        self
    }
}

/// Field visitor that collects the message and the remaining fields
#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Vec<(String, Value)>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: Value) {
        self.fields.push((field.name().to_string(), value));
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut text = format!("{:?}", value);
        // Remove quotes from debug format if it's a simple string
        if text.len() > 1 && text.starts_with('"') && text.ends_with('"') {
            text = text[1..text.len() - 1].to_string();
        }
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.push(field, Value::String(text));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::String(value.to_string()));
    }
}

/// Events this crate emits about itself
fn is_own_target(target: &str) -> bool {
    target == "ns_logger" || target.starts_with("ns_logger::")
}

impl<S> Layer<S> for ConsoleCaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_emitting() || is_own_target(metadata.target()) {
            return;
        }

        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let namespace = if self.namespace_from_target {
            metadata.target()
        } else {
            self.logger.capture_namespace()
        };

        let mut args = vec![
            Arg::from(namespace),
            Arg::from(collector.message.unwrap_or_default()),
        ];
        if !collector.fields.is_empty() {
            args.push(Arg::Structured(Value::object(collector.fields)));
        }

        self.logger.emit(Level::from_tracing(metadata.level()), args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ConsoleFns;
    use crate::filter::LogQuery;
    use crate::store::{LogBackend, MemoryStore};
    use std::sync::Arc;
    use tracing_subscriber::prelude::*;

    fn capture(
        layer_for: impl FnOnce(Logger) -> ConsoleCaptureLayer,
        body: impl FnOnce(),
    ) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let logger = Logger::builder()
            .datastore(store.clone())
            .console(ConsoleFns::none())
            .build();
        let subscriber = tracing_subscriber::registry().with(layer_for(logger));
        tracing::subscriber::with_default(subscriber, body);
        store
    }

    #[test]
    fn test_tracing_integration() {
        let store = capture(ConsoleCaptureLayer::new, || {
            tracing::info!(target: "app", "Test info message");
            tracing::warn!(target: "app", value = 42, "Test warning with field");
            tracing::error!(target: "app", "Test error message");
            tracing::debug!(target: "app", "Test debug message");
        });

        let logs = store.read(&LogQuery::from("console"));
        let summary: Vec<(Level, &str)> =
            logs.iter().map(|r| (r.level, r.message.as_str())).collect();
        assert_eq!(
            summary,
            [
                (Level::Info, "Test info message"),
                (Level::Warn, "Test warning with field"),
                (Level::Error, "Test error message"),
                (Level::Log, "Test debug message"),
            ]
        );
        assert_eq!(logs[1].extra.len(), 1);
        assert!(logs[1].extra[0].data.contains("<span class=json-key>value</span>"));
        assert!(logs[0].extra.is_empty());
    }

    #[test]
    fn test_namespace_from_target() {
        let store = capture(
            |logger| ConsoleCaptureLayer::new(logger).namespace_from_target(true),
            || tracing::info!(target: "net::http", "request served"),
        );

        assert_eq!(store.namespaces(), ["net::http"]);
    }

    #[test]
    fn test_own_events_are_skipped() {
        let store = capture(ConsoleCaptureLayer::new, || {
            tracing::info!(target: "ns_logger::store", "internal");
            tracing::info!(target: "ns_logger", "internal");
            tracing::info!(target: "ns_logger_example", "not internal");
        });

        let logs = store.read(&LogQuery::all());
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "not internal");
    }

    #[test]
    fn test_field_collector_types() {
        let store = capture(ConsoleCaptureLayer::new, || {
            tracing::info!(
                target: "app",
                count = 3u64,
                ratio = 0.5,
                ok = true,
                name = "x",
                "typed"
            );
        });

        let logs = store.read(&LogQuery::all());
        let extra = &logs[0].extra[0].data;
        assert!(extra.contains("<span class=json-value>3</span>"));
        assert!(extra.contains("<span class=json-value>0.5</span>"));
        assert!(extra.contains("<span class=json-value>true</span>"));
        assert!(extra.contains("<span class=json-string>\"x\"</span>"));
    }
}
