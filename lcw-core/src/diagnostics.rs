//! Diagnostic log
//!
//! Every lifecycle decision is emitted through `tracing` and also kept in a
//! bounded in-memory log. The browser has no subscriber to read `tracing`
//! output, so the wasm bindings mirror this log to the console and expose it
//! as JSON.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of entries kept before the oldest are dropped
pub const DEFAULT_CAPACITY: usize = 256;

/// Severity of a diagnostic entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warn,
    Error,
}

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    WidgetInjected,
    WidgetTornDown,
    FallbackInjected,
    FallbackExhausted,
    StaleLoadIgnored,
    ConfigurationMiss,
    EnvironmentChanged,
    EnvironmentEmpty,
    ContextRegistered,
    SdkNotReady,
    GateUnlocked,
    GateRejected,
}

impl DiagnosticKind {
    pub fn level(&self) -> DiagnosticLevel {
        match self {
            DiagnosticKind::ConfigurationMiss
            | DiagnosticKind::SdkNotReady
            | DiagnosticKind::GateRejected
            | DiagnosticKind::StaleLoadIgnored => DiagnosticLevel::Warn,
            DiagnosticKind::FallbackExhausted => DiagnosticLevel::Error,
            _ => DiagnosticLevel::Info,
        }
    }
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub at: DateTime<Utc>,
    pub level: DiagnosticLevel,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug)]
struct DiagnosticBuffer {
    entries: VecDeque<Diagnostic>,
    capacity: usize,
    recorded: u64,
}

/// Shared, bounded diagnostic log
///
/// Cloning yields another handle to the same log, so every component of a
/// page session appends to one timeline.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    inner: Arc<RwLock<DiagnosticBuffer>>,
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(DiagnosticBuffer {
                entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                capacity: capacity.max(1),
                recorded: 0,
            })),
        }
    }

    /// Append an entry and forward it to `tracing` at the kind's level
    pub fn record(&self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        let level = kind.level();

        match level {
            DiagnosticLevel::Info => tracing::info!(kind = ?kind, "{}", message),
            DiagnosticLevel::Warn => tracing::warn!(kind = ?kind, "{}", message),
            DiagnosticLevel::Error => tracing::error!(kind = ?kind, "{}", message),
        }

        if let Ok(mut buffer) = self.inner.write() {
            if buffer.entries.len() >= buffer.capacity {
                buffer.entries.pop_front();
            }
            buffer.entries.push_back(Diagnostic {
                at: Utc::now(),
                level,
                kind,
                message,
            });
            buffer.recorded += 1;
        }
    }

    /// Entries ever recorded, including ones since dropped
    pub fn recorded(&self) -> u64 {
        self.inner.read().map(|b| b.recorded).unwrap_or(0)
    }

    /// Entries recorded after the first `seen`, as far as the buffer still
    /// holds them
    pub fn entries_since(&self, seen: u64) -> Vec<Diagnostic> {
        self.inner
            .read()
            .map(|b| {
                let new = b.recorded.saturating_sub(seen) as usize;
                let skip = b.entries.len().saturating_sub(new);
                b.entries.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.inner
            .read()
            .map(|b| b.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Entries of one kind, oldest first
    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<Diagnostic> {
        self.inner
            .read()
            .map(|b| b.entries.iter().filter(|d| d.kind == kind).cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.inner
            .read()
            .map(|b| b.entries.iter().filter(|d| d.kind == kind).count())
            .unwrap_or(0)
    }

    pub fn last(&self) -> Option<Diagnostic> {
        self.inner.read().ok()?.entries.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|b| b.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut buffer) = self.inner.write() {
            buffer.entries.clear();
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.entries())
    }
}
