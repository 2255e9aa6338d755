//! Core types for the log capture service

use crate::args::Arg;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Namespace used when a call does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Namespace used for captured console output
pub const CONSOLE_NAMESPACE: &str = "console";

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Error messages
    Error,
    /// Warning messages
    Warn,
    /// Informational messages
    Info,
    /// Plain log output
    Log,
}

impl Level {
    /// Every level, in the order the console exposes them
    pub const ALL: [Level; 4] = [Level::Error, Level::Info, Level::Warn, Level::Log];

    /// Lowercase name as used by the console and in stored records
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Log => "log",
        }
    }

    /// Convert from tracing Level
    pub fn from_tracing(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            tracing::Level::DEBUG | tracing::Level::TRACE => Level::Log,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Level::Error => 1,
            Level::Warn => 1 << 1,
            Level::Info => 1 << 2,
            Level::Log => 1 << 3,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Error returned when parsing an unrecognized level name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "log" => Ok(Level::Log),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

/// A subset of the severity levels, used for the console and storage gates
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LevelSet(u8);

impl LevelSet {
    /// The empty set; nothing passes the gate
    pub const fn none() -> Self {
        Self(0)
    }

    /// All four levels
    pub const fn all() -> Self {
        Self(0b1111)
    }

    pub fn contains(&self, level: Level) -> bool {
        self.0 & level.bit() != 0
    }

    pub fn insert(&mut self, level: Level) {
        self.0 |= level.bit();
    }

    pub fn remove(&mut self, level: Level) {
        self.0 &= !level.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Levels in the set, in `Level::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = Level> + '_ {
        Level::ALL.into_iter().filter(move |level| self.contains(*level))
    }

    /// Build a set from level names, ignoring names that are not levels
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        names
            .into_iter()
            .filter_map(|name| name.parse::<Level>().ok())
            .collect()
    }
}

impl fmt::Debug for LevelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<Level> for LevelSet {
    fn from_iter<I: IntoIterator<Item = Level>>(iter: I) -> Self {
        let mut set = LevelSet::none();
        for level in iter {
            set.insert(level);
        }
        set
    }
}

impl From<Level> for LevelSet {
    fn from(level: Level) -> Self {
        std::iter::once(level).collect()
    }
}

impl<const N: usize> From<[Level; N]> for LevelSet {
    fn from(levels: [Level; N]) -> Self {
        levels.into_iter().collect()
    }
}

impl From<&[Level]> for LevelSet {
    fn from(levels: &[Level]) -> Self {
        levels.iter().copied().collect()
    }
}

impl From<Vec<Level>> for LevelSet {
    fn from(levels: Vec<Level>) -> Self {
        levels.into_iter().collect()
    }
}

impl Serialize for LevelSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for LevelSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let levels = Vec::<Level>::deserialize(deserializer)?;
        Ok(levels.into_iter().collect())
    }
}

/// How an extra argument is rendered by the inspection panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtraKind {
    /// Pretty-printed, highlighted serialization
    Code,
    /// Markup taken verbatim from the argument
    Html,
}

/// Rendering descriptor for one argument beyond the message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraItem {
    pub data: String,
    #[serde(rename = "type")]
    pub kind: ExtraKind,
}

impl ExtraItem {
    pub fn code(data: impl Into<String>) -> Self {
        Self { data: data.into(), kind: ExtraKind::Code }
    }

    pub fn html(data: impl Into<String>) -> Self {
        Self { data: data.into(), kind: ExtraKind::Html }
    }
}

/// A record as held by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Unique ID assigned at insertion, never reused
    pub id: u64,
    /// Caller-assigned grouping tag
    pub namespace: String,
    /// Severity level
    pub level: Level,
    /// Insertion time, refreshed by updates
    pub time: DateTime<Utc>,
    /// Primary display string
    pub message: String,
    /// One descriptor per argument beyond the message
    pub extra: Vec<ExtraItem>,
}

impl LogRecord {
    /// Format the record as a single line for plain-text display
    pub fn format_display(&self) -> String {
        let extra = if self.extra.is_empty() {
            String::new()
        } else {
            format!(" (+{} extra)", self.extra.len())
        };

        format!(
            "[{}] #{} {:5} [{}] {}{}",
            self.time.format("%H:%M:%S%.3f"),
            self.id,
            self.level.as_str(),
            self.namespace,
            self.message,
            extra
        )
    }
}

/// A record about to be inserted; the store assigns the ID
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub namespace: String,
    pub level: Level,
    pub time: DateTime<Utc>,
    pub message: String,
    pub extra: Vec<ExtraItem>,
}

/// Fields to merge into an existing record; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub namespace: Option<String>,
    pub level: Option<Level>,
    pub message: Option<String>,
    pub extra: Option<Vec<ExtraItem>>,
}

/// What a logging call hands back to the caller
///
/// Carries the normalized extra arguments under `data` so the caller can
/// edit the record and pass it to [`Logger::update`](crate::Logger::update).
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: u64,
    pub namespace: String,
    pub level: Level,
    pub time: DateTime<Utc>,
    pub message: String,
    pub data: Vec<Arg>,
}

/// An update request keyed by record ID
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub id: u64,
    pub namespace: Option<String>,
    pub level: Option<Level>,
    pub message: Option<String>,
    /// Raw arguments to re-render as `extra`
    pub data: Option<Vec<Arg>>,
}

impl RecordUpdate {
    pub fn new(id: u64) -> Self {
        Self { id, ..Default::default() }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn data(mut self, data: Vec<Arg>) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<StoredRecord> for RecordUpdate {
    fn from(record: StoredRecord) -> Self {
        Self {
            id: record.id,
            namespace: Some(record.namespace),
            level: Some(record.level),
            message: Some(record.message),
            data: Some(record.data),
        }
    }
}

impl From<&StoredRecord> for RecordUpdate {
    fn from(record: &StoredRecord) -> Self {
        record.clone().into()
    }
}
