//! Simulation console: the serial-monitor style log shown while running.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleKind {
    Info,
    Error,
    /// Text the simulated program printed.
    Output,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: ConsoleKind,
    pub message: String,
}

impl fmt::Display for ConsoleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = self.timestamp.format("%H:%M:%S");
        match self.kind {
            ConsoleKind::Info => write!(f, "[{time}] {}", self.message),
            ConsoleKind::Error => write!(f, "[{time}] error: {}", self.message),
            ConsoleKind::Output => write!(f, "[{time}] > {}", self.message),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Console {
    entries: Vec<ConsoleEntry>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ConsoleKind, message: impl Into<String>) {
        self.entries.push(ConsoleEntry {
            timestamp: Utc::now(),
            kind,
            message: message.into(),
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(ConsoleKind::Info, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(ConsoleKind::Error, message);
    }

    pub fn output(&mut self, message: impl Into<String>) {
        self.push(ConsoleKind::Output, message);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[ConsoleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ConsoleEntry> {
        self.entries.last()
    }

    /// Messages of one kind, oldest first.
    pub fn messages(&self, kind: ConsoleKind) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |e| e.kind == kind)
            .map(|e| e.message.as_str())
    }
}
