//! Query filter for reading and deleting records

use crate::types::{Level, LevelSet, LogRecord};
use serde::{Deserialize, Serialize};

/// Selects records by namespace, level and message text
///
/// Every criterion is optional. An absent or empty criterion imposes no
/// constraint, so `LogQuery::default()` matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogQuery {
    /// Namespaces to include
    #[serde(default)]
    pub namespaces: Option<Vec<String>>,
    /// Levels to include
    #[serde(default)]
    pub levels: Option<LevelSet>,
    /// Case-insensitive substring of the message
    #[serde(default)]
    pub search: Option<String>,
}

impl LogQuery {
    /// A query matching every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a single namespace
    pub fn namespace(self, namespace: impl Into<String>) -> Self {
        self.namespaces([namespace.into()])
    }

    /// Restrict to a set of namespaces; an empty set lifts the restriction
    pub fn namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for namespace in namespaces {
            let namespace = namespace.into();
            if !list.contains(&namespace) {
                list.push(namespace);
            }
        }
        self.namespaces = (!list.is_empty()).then_some(list);
        self
    }

    /// Restrict to a single level
    pub fn level(self, level: Level) -> Self {
        self.levels(level)
    }

    /// Restrict to a set of levels; an empty set lifts the restriction
    pub fn levels(mut self, levels: impl Into<LevelSet>) -> Self {
        let levels = levels.into();
        self.levels = (!levels.is_empty()).then_some(levels);
        self
    }

    /// Require the message to contain `text`, ignoring case
    pub fn search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search = (!text.is_empty()).then_some(text);
        self
    }

    /// True when no criterion is set
    pub fn is_unconstrained(&self) -> bool {
        self.namespaces.is_none() && self.levels.is_none() && self.search.is_none()
    }

    /// Check whether a record satisfies every criterion
    pub fn matches(&self, record: &LogRecord) -> bool {
        if let Some(namespaces) = &self.namespaces {
            if !namespaces.is_empty() && !namespaces.iter().any(|ns| *ns == record.namespace) {
                return false;
            }
        }

        if let Some(levels) = &self.levels {
            if !levels.is_empty() && !levels.contains(record.level) {
                return false;
            }
        }

        if let Some(search) = &self.search {
            if !record.message.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }

        true
    }
}

impl From<&str> for LogQuery {
    fn from(namespace: &str) -> Self {
        LogQuery::all().namespace(namespace)
    }
}

impl From<String> for LogQuery {
    fn from(namespace: String) -> Self {
        LogQuery::all().namespace(namespace)
    }
}

impl<const N: usize> From<[&str; N]> for LogQuery {
    fn from(namespaces: [&str; N]) -> Self {
        LogQuery::all().namespaces(namespaces)
    }
}

impl From<Vec<String>> for LogQuery {
    fn from(namespaces: Vec<String>) -> Self {
        LogQuery::all().namespaces(namespaces)
    }
}

impl From<Level> for LogQuery {
    fn from(level: Level) -> Self {
        LogQuery::all().level(level)
    }
}
