//! Page-session integration tests: gate, pickers, readiness and collaborators

use lcw_core::port::{MemorySessionStore, RecordingContextSdk, RecordingScriptPort};
use lcw_core::{
    AgentChosen, AgentType, CoordinateStatus, Coordinates, DiagnosticKind, Environment,
    EnvironmentChosen, GateOutcome, HostPorts, LoaderManifest, SessionStore, VisitorState,
    WidgetApp,
};

type TestApp = WidgetApp<RecordingScriptPort, RecordingContextSdk, MemorySessionStore>;

const IPHONE_SAFARI: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

fn create_app_with(query: &str, session: MemorySessionStore) -> TestApp {
    let manifest = LoaderManifest::builtin().unwrap();
    let visitor = VisitorState::from_page(IPHONE_SAFARI, 5, query, &manifest.visitor);
    let ports = HostPorts {
        script: RecordingScriptPort::new(),
        sdk: RecordingContextSdk::new(),
        session,
    };
    WidgetApp::new(&manifest, ports, visitor).unwrap()
}

fn create_app() -> TestApp {
    create_app_with("", MemorySessionStore::new())
}

fn unlocked_app() -> TestApp {
    let mut app = create_app();
    app.unlock("code123").unwrap();
    app
}

#[test]
fn test_wrong_code_keeps_page_locked() {
    let mut app = create_app();

    assert_eq!(app.unlock("letmein").unwrap(), GateOutcome::Rejected);

    assert!(!app.gate().is_unlocked());
    assert_eq!(app.manager().port().script_count(), 0);
    assert_eq!(app.diagnostics().count(DiagnosticKind::GateRejected), 1);
    let err = app
        .on_environment_chosen(EnvironmentChosen { environment: Environment::Uat })
        .unwrap_err();
    assert_eq!(err.error_code(), "GATE_LOCKED");
}

#[test]
fn test_session_restore_loads_widget() {
    let mut session = MemorySessionStore::new();
    session.set("isAuthenticated", "true").unwrap();
    let mut app = create_app_with("", session);

    let outcome = app.restore_session().unwrap();

    assert_eq!(outcome, GateOutcome::Unlocked { first_unlock: true });
    assert!(app.manager().is_loaded());
    assert_eq!(app.manager().current_agent(), Some(&AgentType::from("default")));
}

#[test]
fn test_unlock_persists_flag() {
    let app = unlocked_app();
    assert_eq!(app.session().get("isAuthenticated").as_deref(), Some("true"));
}

#[test]
fn test_pickers_follow_environment() {
    let mut app = unlocked_app();

    app.on_environment_chosen(EnvironmentChosen { environment: Environment::Prd })
        .unwrap();

    let snapshot = app.snapshot();
    assert_eq!(snapshot.environment, Environment::Prd);
    assert!(snapshot.agent.is_none());
    assert!(snapshot.agents.iter().all(|o| !o.enabled && !o.selected));
    assert_eq!(
        snapshot
            .environments
            .iter()
            .filter(|o| o.selected)
            .map(|o| o.value)
            .collect::<Vec<_>>(),
        vec![Environment::Prd]
    );
    assert_eq!(app.manager().port().script_count(), 0);
}

#[test]
fn test_agent_switch_through_pickers() {
    let mut app = unlocked_app();

    app.on_agent_chosen(AgentChosen { agent: "specialist".into() })
        .unwrap();

    assert_eq!(app.controller().selected_agent(), Some(&AgentType::from("specialist")));
    assert_eq!(app.manager().port().script_count(), 1);
    assert_eq!(app.diagnostics().count(DiagnosticKind::WidgetInjected), 2);
}

#[test]
fn test_script_error_recovers_through_app() {
    let mut app = unlocked_app();
    let ticket = app
        .manager()
        .port()
        .ticket_for("Microsoft_Omnichannel_LCWidget")
        .unwrap();

    app.on_script_error(&ticket).unwrap();

    assert_eq!(app.diagnostics().count(DiagnosticKind::FallbackInjected), 1);
}

#[test]
fn test_referral_reaches_context() {
    let mut app = create_app_with("?referrer='KHL2'", MemorySessionStore::new());

    let ctx = app.on_ready().unwrap();

    assert_eq!(ctx.referral.value, "KHL2");
    assert!(ctx.referral.is_displayable);
}

#[test]
fn test_missing_referral_uses_default() {
    let mut app = create_app();
    assert_eq!(app.on_ready().unwrap().referral.value, "KHL");
}

#[test]
fn test_readiness_twice_overrides_provider() {
    let mut app = unlocked_app();

    let first = app.on_ready().unwrap();
    assert_eq!(first.visitor_ip.value, "Unavailable");
    assert_eq!(first.location.value, "Unavailable");

    app.visitor_mut()
        .apply_ip_lookup(Ok(r#"{"ip":"198.51.100.7"}"#.to_string()));
    app.visitor_mut().apply_geo_lookup(Ok(
        r#"{"city":"Sydney","region":"New South Wales","country_name":"Australia"}"#.to_string(),
    ));
    app.visitor_mut()
        .set_coordinates(CoordinateStatus::Known(Coordinates {
            latitude: -33.868_82,
            longitude: 151.209_29,
        }));

    // Late results stay invisible until the widget signals readiness again
    assert_eq!(app.sdk().query().unwrap(), first);

    let second = app.on_ready().unwrap();

    assert_eq!(app.sdk().registrations(), 2);
    assert_eq!(app.bridge().registrations(), 2);
    assert_eq!(app.sdk().query().unwrap(), second);
    assert_eq!(second.visitor_ip.value, "198.51.100.7");
    assert_eq!(second.location.value, "Sydney, New South Wales, Australia");
    assert_eq!(second.coordinates.value, "-33.8688, 151.2093");
    assert_eq!(second.device_type.value, "iPhone");
    assert_eq!(second.browser.value, "Safari");
}

#[test]
fn test_failed_lookups_are_not_fatal() {
    let mut app = unlocked_app();

    app.visitor_mut().apply_ip_lookup(Ok("not json".to_string()));
    app.visitor_mut().apply_geo_lookup(Ok("{}".to_string()));
    app.visitor_mut().set_coordinates(CoordinateStatus::Unsupported);

    let ctx = app.on_ready().unwrap();
    assert_eq!(ctx.visitor_ip.value, "Unavailable");
    assert_eq!(ctx.location.value, "Location unavailable");
    assert_eq!(ctx.coordinates.value, "Not supported by browser");
}

#[test]
fn test_ready_without_sdk_api_reports() {
    let mut app = unlocked_app();
    app.sdk_mut().set_api_present(false);

    let err = app.on_ready().unwrap_err();

    assert_eq!(err.error_code(), "SDK_NOT_READY");
    assert!(err.is_recoverable());
    assert_eq!(app.diagnostics().count(DiagnosticKind::SdkNotReady), 1);
    assert!(app.manager().is_loaded());
}

#[test]
fn test_readiness_subscription_once() {
    let mut app = create_app();
    assert_eq!(app.readiness_event(), "lcw:ready");
    assert!(app.subscribe_readiness());
    assert!(!app.subscribe_readiness());
}
