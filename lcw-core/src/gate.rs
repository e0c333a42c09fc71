//! Access gate
//!
//! A shared access code hides the page until entered. The unlock flag lives
//! in session storage, so a reload within the same tab stays unlocked.

use serde::{Deserialize, Serialize};

use crate::diagnostics::{DiagnosticKind, DiagnosticLog};
use crate::error::Result;
use crate::port::SessionStore;
use crate::registry::AccessConfig;

const UNLOCKED_FLAG: &str = "true";

/// Result of an unlock attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GateOutcome {
    /// `first_unlock` is true only for the transition from locked
    Unlocked { first_unlock: bool },
    /// No stored session to restore
    Locked,
    /// Wrong code
    Rejected,
}

#[derive(Debug)]
pub struct AccessGate {
    config: AccessConfig,
    unlocked: bool,
    diagnostics: DiagnosticLog,
}

impl AccessGate {
    pub fn new(config: AccessConfig) -> Self {
        Self::with_diagnostics(config, DiagnosticLog::new())
    }

    pub fn with_diagnostics(config: AccessConfig, diagnostics: DiagnosticLog) -> Self {
        Self {
            config,
            unlocked: false,
            diagnostics,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Unlock from a flag left by an earlier unlock in this session
    pub fn restore<S: SessionStore + ?Sized>(&mut self, store: &S) -> GateOutcome {
        if store.get(&self.config.session_key).as_deref() == Some(UNLOCKED_FLAG) {
            self.unlock("restored from session")
        } else {
            GateOutcome::Locked
        }
    }

    /// Check an entered code
    pub fn submit<S: SessionStore + ?Sized>(&mut self, store: &mut S, code: &str) -> Result<GateOutcome> {
        if code != self.config.access_code {
            self.diagnostics
                .record(DiagnosticKind::GateRejected, "incorrect access code");
            return Ok(GateOutcome::Rejected);
        }

        store.set(&self.config.session_key, UNLOCKED_FLAG)?;
        Ok(self.unlock("access code accepted"))
    }

    fn unlock(&mut self, how: &str) -> GateOutcome {
        let first_unlock = !self.unlocked;
        self.unlocked = true;
        if first_unlock {
            self.diagnostics
                .record(DiagnosticKind::GateUnlocked, format!("content unlocked ({})", how));
        }
        GateOutcome::Unlocked { first_unlock }
    }
}
