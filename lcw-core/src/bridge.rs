//! Readiness Context Bridge
//!
//! Waits for the widget's readiness signal and registers a context provider
//! with the widget SDK. Each signal takes a fresh snapshot of the live
//! visitor state and replaces whatever provider was registered before.

use crate::diagnostics::{DiagnosticKind, DiagnosticLog};
use crate::error::{Result, WidgetError};
use crate::port::ContextSdk;
use crate::visitor::{VisitorContext, VisitorState};

pub struct ReadinessContextBridge {
    event_name: String,
    entry_point: String,
    subscribed: bool,
    registrations: u64,
    last_snapshot: Option<VisitorContext>,
    diagnostics: DiagnosticLog,
}

impl ReadinessContextBridge {
    pub fn new(event_name: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self::with_diagnostics(event_name, entry_point, DiagnosticLog::new())
    }

    pub fn with_diagnostics(
        event_name: impl Into<String>,
        entry_point: impl Into<String>,
        diagnostics: DiagnosticLog,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            entry_point: entry_point.into(),
            subscribed: false,
            registrations: 0,
            last_snapshot: None,
            diagnostics,
        }
    }

    /// Name of the readiness event to listen for
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Claim the page-lifetime subscription
    ///
    /// Returns true only the first time; hosts attach their listener then.
    pub fn subscribe(&mut self) -> bool {
        if self.subscribed {
            return false;
        }
        self.subscribed = true;
        tracing::debug!(event = %self.event_name, "subscribed to widget readiness");
        true
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Successful provider registrations so far
    pub fn registrations(&self) -> u64 {
        self.registrations
    }

    /// Snapshot handed to the SDK by the latest registration
    pub fn last_snapshot(&self) -> Option<&VisitorContext> {
        self.last_snapshot.as_ref()
    }

    /// Handle one readiness signal
    ///
    /// A missing registration entry point is reported and otherwise ignored:
    /// the widget keeps working without visitor context.
    pub fn on_ready<S>(&mut self, sdk: &mut S, visitor: &VisitorState) -> Result<VisitorContext>
    where
        S: ContextSdk + ?Sized,
    {
        let snapshot = VisitorContext::from_state(visitor);

        if !sdk.has_context_api(&self.entry_point) {
            self.diagnostics.record(
                DiagnosticKind::SdkNotReady,
                format!("'{}' missing at readiness; context not set", self.entry_point),
            );
            return Err(WidgetError::SdkNotReady {
                entry_point: self.entry_point.clone(),
            });
        }

        let provided = snapshot.clone();
        if let Err(err) = sdk.set_context_provider(&self.entry_point, Box::new(move || provided.clone())) {
            self.diagnostics.record(
                DiagnosticKind::SdkNotReady,
                format!("context registration failed: {}", err),
            );
            return Err(err);
        }

        self.registrations += 1;
        self.last_snapshot = Some(snapshot.clone());
        self.diagnostics.record(
            DiagnosticKind::ContextRegistered,
            format!(
                "context provider registered (#{}; referral {}, device {})",
                self.registrations, snapshot.referral.value, snapshot.device_type.value
            ),
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::RecordingContextSdk;
    use crate::registry::{TeardownConfig, VisitorConfig};

    fn bridge() -> ReadinessContextBridge {
        ReadinessContextBridge::new("lcw:ready", TeardownConfig::default().context_api)
    }

    fn visitor() -> VisitorState {
        VisitorState::from_page("Mozilla/5.0 (iPhone)", 5, "?referrer=A1", &VisitorConfig::default())
    }

    #[test]
    fn test_subscribe_once() {
        let mut bridge = bridge();
        assert!(bridge.subscribe());
        assert!(!bridge.subscribe());
        assert!(bridge.is_subscribed());
    }

    #[test]
    fn test_ready_registers_snapshot() {
        let mut bridge = bridge();
        let mut sdk = RecordingContextSdk::new();

        let snapshot = bridge.on_ready(&mut sdk, &visitor()).unwrap();

        assert_eq!(sdk.registrations(), 1);
        assert_eq!(sdk.query().unwrap(), snapshot);
        assert_eq!(snapshot.referral.value, "A1");
        assert_eq!(snapshot.device_type.value, "iPhone");
    }

    #[test]
    fn test_missing_api_is_reported_not_fatal() {
        let mut bridge = bridge();
        let mut sdk = RecordingContextSdk::without_context_api();

        let err = bridge.on_ready(&mut sdk, &visitor()).unwrap_err();

        assert_eq!(err.error_code(), "SDK_NOT_READY");
        assert_eq!(bridge.registrations(), 0);
        assert!(bridge.last_snapshot().is_none());
    }

    #[test]
    fn test_provider_is_frozen_at_registration() {
        let mut bridge = bridge();
        let mut sdk = RecordingContextSdk::new();
        let mut state = visitor();

        bridge.on_ready(&mut sdk, &state).unwrap();
        state.set_ip(Some("192.0.2.1".to_string()));

        // The late IP only appears after the next readiness signal
        assert_eq!(sdk.query().unwrap().visitor_ip.value, "Unavailable");
        bridge.on_ready(&mut sdk, &state).unwrap();
        assert_eq!(sdk.query().unwrap().visitor_ip.value, "192.0.2.1");
    }
}
