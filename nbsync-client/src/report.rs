//! Reconciliation report.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use tracing::error;

/// Append-only collection of human-readable failure lines, grouped by
/// operation key. Lives for one reconciliation cycle.
#[derive(Debug, Default)]
pub struct Report {
    lines: Mutex<BTreeMap<String, Vec<String>>>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line under `key`. Every line is also logged as an error.
    pub fn add(&self, key: &str, line: impl Into<String>) {
        let line = line.into();
        error!(operation = key, "{}", line);
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .push(line);
    }

    /// Append a line built from a message and `key=value` fields.
    pub fn add_fields(&self, key: &str, message: &str, fields: &[(&str, &str)]) {
        let mut line = message.to_string();
        for (k, v) in fields {
            line.push(' ');
            line.push_str(k);
            line.push('=');
            line.push_str(v);
        }
        self.add(key, line);
    }

    pub fn is_empty(&self) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Number of lines recorded under `key`.
    #[cfg(test)]
    fn count(&self, key: &str) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map_or(0, Vec::len)
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
