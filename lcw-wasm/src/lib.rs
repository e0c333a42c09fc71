//! LCW WebAssembly bindings via wasm-bindgen
//!
//! Runs the widget loader inside the browser. The module boots itself when
//! loaded: it reads the visitor's page, restores an unlocked session, starts
//! the IP, location and coordinate lookups, and listens for the widget's
//! readiness event. The page's own controls call the exported functions.
//!
//! ## Example
//!
//! ```javascript
//! import init, { unlock, select_environment, select_agent, selection_json } from '@lcw/wasm';
//!
//! await init();
//!
//! document.getElementById('access-form').addEventListener('submit', (e) => {
//!   e.preventDefault();
//!   if (unlock(document.getElementById('access-code').value)) {
//!     renderPickers(JSON.parse(selection_json()));
//!   }
//! });
//!
//! for (const radio of document.querySelectorAll('input[name="environment"]')) {
//!   radio.addEventListener('change', () => {
//!     select_environment(radio.value);
//!     renderPickers(JSON.parse(selection_json()));
//!   });
//! }
//!
//! for (const radio of document.querySelectorAll('input[name="agent"]')) {
//!   radio.addEventListener('change', () => select_agent(radio.value));
//! }
//! ```
//!
//! Failures are logged to the console and reported as `false`; nothing here
//! throws into the page.

mod dom;

use std::cell::{Cell, RefCell};

use js_sys::Reflect;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{console, Response, Window};

use lcw_core::{
    AgentChosen, AgentType, CoordinateStatus, Coordinates, DiagnosticLevel, DiagnosticLog,
    Environment, EnvironmentChosen, GateOutcome, HostPorts, LoadTicket, LoaderManifest,
    VisitorContext, VisitorState, WidgetApp, WidgetError,
};

use dom::{BrowserSessionStore, DomScriptPort, WindowSdk};

type BrowserApp = WidgetApp<DomScriptPort, WindowSdk, BrowserSessionStore>;

thread_local! {
    static APP: RefCell<Option<BrowserApp>> = const { RefCell::new(None) };
    static LOG: RefCell<Option<DiagnosticLog>> = const { RefCell::new(None) };
    static MIRRORED: Cell<u64> = const { Cell::new(0) };
}

#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    if let Err(err) = boot() {
        report(&err);
    }
    mirror_diagnostics();
}

fn boot() -> Result<(), WidgetError> {
    let window = web_sys::window().ok_or_else(|| WidgetError::Port {
        reason: "window unavailable".to_string(),
    })?;
    let document = window.document().ok_or_else(|| WidgetError::Port {
        reason: "document unavailable".to_string(),
    })?;

    let navigator = window.navigator();
    let user_agent = navigator.user_agent().unwrap_or_default();
    let touch_points = u32::try_from(navigator.max_touch_points()).unwrap_or(0);
    let query = window.location().search().unwrap_or_default();

    let manifest = LoaderManifest::builtin()?;
    let visitor = VisitorState::from_page(&user_agent, touch_points, &query, &manifest.visitor);
    let ports = HostPorts {
        script: DomScriptPort::new(window.clone(), document, on_script_error),
        sdk: WindowSdk::new(window.clone()),
        session: BrowserSessionStore::new(&window),
    };
    let app = WidgetApp::new(&manifest, ports, visitor)?;

    LOG.with(|log| *log.borrow_mut() = Some(app.diagnostics().clone()));
    APP.with(|slot| *slot.borrow_mut() = Some(app));

    if with_app(|app| app.subscribe_readiness()).unwrap_or(false) {
        listen_for_ready(&window, &manifest)?;
    }

    spawn_local(lookup_ip(manifest.visitor.ip_lookup_url.clone()));
    spawn_local(lookup_location(manifest.visitor.geo_lookup_url.clone()));
    request_coordinates(&window);

    if let Some(Err(err)) = with_app(|app| app.restore_session()) {
        report(&err);
    }
    Ok(())
}

/// Run `f` against the page's app, then mirror new diagnostics
fn with_app<R>(f: impl FnOnce(&mut BrowserApp) -> R) -> Option<R> {
    let result = APP.with(|slot| match slot.try_borrow_mut() {
        Ok(mut app) => app.as_mut().map(f),
        Err(_) => {
            console::warn_1(&"lcw: busy, event dropped".into());
            None
        }
    });
    mirror_diagnostics();
    result
}

fn report(err: &WidgetError) {
    let message = format!("lcw [{}]: {}", err.error_code(), err);
    if err.is_recoverable() {
        console::warn_1(&message.into());
    } else {
        console::error_1(&message.into());
    }
}

fn mirror_diagnostics() {
    LOG.with(|log| {
        let log = log.borrow();
        let Some(log) = log.as_ref() else {
            return;
        };
        let seen = MIRRORED.with(Cell::get);
        for entry in log.entries_since(seen) {
            let line: JsValue = format!("lcw {:?}: {}", entry.kind, entry.message).into();
            match entry.level {
                DiagnosticLevel::Info => console::info_1(&line),
                DiagnosticLevel::Warn => console::warn_1(&line),
                DiagnosticLevel::Error => console::error_1(&line),
            }
        }
        MIRRORED.with(|m| m.set(log.recorded()));
    });
}

fn on_script_error(ticket: LoadTicket) {
    if let Some(Err(err)) = with_app(|app| app.on_script_error(&ticket)) {
        report(&err);
    }
}

fn listen_for_ready(window: &Window, manifest: &LoaderManifest) -> Result<(), WidgetError> {
    let callback = Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
        if let Some(Err(err)) = with_app(|app| app.on_ready()) {
            report(&err);
        }
    });
    window
        .add_event_listener_with_callback(&manifest.readiness_event, callback.as_ref().unchecked_ref())
        .map_err(|e| WidgetError::Port {
            reason: format!("addEventListener: {:?}", e),
        })?;
    // Lives for the whole page
    callback.forget();
    Ok(())
}

async fn fetch_text(url: &str) -> Result<String, WidgetError> {
    let unavailable = |reason: String| WidgetError::CollaboratorDataUnavailable {
        field: url.to_string(),
        reason,
    };

    let window = web_sys::window().ok_or_else(|| unavailable("window unavailable".to_string()))?;
    let response: Response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| unavailable(format!("fetch failed: {:?}", e)))?
        .dyn_into()
        .map_err(|_| unavailable("not a response".to_string()))?;
    if !response.ok() {
        return Err(unavailable(format!("HTTP {}", response.status())));
    }
    let text = response
        .text()
        .map_err(|e| unavailable(format!("body unreadable: {:?}", e)))?;
    JsFuture::from(text)
        .await
        .map_err(|e| unavailable(format!("body unreadable: {:?}", e)))?
        .as_string()
        .ok_or_else(|| unavailable("body is not text".to_string()))
}

async fn lookup_ip(url: String) {
    let body = fetch_text(&url).await;
    with_app(|app| app.visitor_mut().apply_ip_lookup(body));
}

async fn lookup_location(url: String) {
    let body = fetch_text(&url).await;
    with_app(|app| app.visitor_mut().apply_geo_lookup(body));
}

fn request_coordinates(window: &Window) {
    let geolocation = match window.navigator().geolocation() {
        Ok(geolocation) => geolocation,
        Err(_) => {
            with_app(|app| app.visitor_mut().set_coordinates(CoordinateStatus::Unsupported));
            return;
        }
    };

    let on_success = Closure::once_into_js(move |position: JsValue| {
        let status = read_coordinates(&position)
            .map(CoordinateStatus::Known)
            .unwrap_or(CoordinateStatus::Failed);
        with_app(|app| app.visitor_mut().set_coordinates(status));
    });
    let on_failure = Closure::once_into_js(move |_error: JsValue| {
        with_app(|app| app.visitor_mut().set_coordinates(CoordinateStatus::Failed));
    });

    if geolocation
        .get_current_position_with_error_callback(
            on_success.unchecked_ref(),
            Some(on_failure.unchecked_ref()),
        )
        .is_err()
    {
        with_app(|app| app.visitor_mut().set_coordinates(CoordinateStatus::Failed));
    }
}

fn read_coordinates(position: &JsValue) -> Option<Coordinates> {
    let coords = Reflect::get(position, &"coords".into()).ok()?;
    let latitude = Reflect::get(&coords, &"latitude".into()).ok()?.as_f64()?;
    let longitude = Reflect::get(&coords, &"longitude".into()).ok()?.as_f64()?;
    Some(Coordinates::new(latitude, longitude))
}

/// Check an access code; true once the page is unlocked
#[wasm_bindgen]
pub fn unlock(code: &str) -> bool {
    match with_app(|app| app.unlock(code)) {
        Some(Ok(GateOutcome::Unlocked { .. })) => true,
        Some(Ok(_)) | None => false,
        Some(Err(err)) => {
            report(&err);
            false
        }
    }
}

/// Switch environment ("dev", "uat", "prd")
#[wasm_bindgen]
pub fn select_environment(value: &str) -> bool {
    let environment: Environment = match value.parse() {
        Ok(env) => env,
        Err(err) => {
            report(&err);
            return false;
        }
    };
    match with_app(|app| app.on_environment_chosen(EnvironmentChosen { environment })) {
        Some(Ok(_)) => true,
        Some(Err(err)) => {
            report(&err);
            false
        }
        None => false,
    }
}

/// Switch agent within the current environment
#[wasm_bindgen]
pub fn select_agent(agent: &str) -> bool {
    let agent = AgentType::new(agent.trim());
    match with_app(|app| app.on_agent_chosen(AgentChosen { agent })) {
        Some(Ok(_)) => true,
        Some(Err(err)) => {
            report(&err);
            false
        }
        None => false,
    }
}

/// Picker and widget state as JSON
#[wasm_bindgen]
pub fn selection_json() -> String {
    with_app(|app| serde_json::to_string(&app.snapshot()).ok())
        .flatten()
        .unwrap_or_else(|| "null".to_string())
}

/// Visitor context as it would be registered right now
#[wasm_bindgen]
pub fn visitor_context_json() -> String {
    with_app(|app| VisitorContext::from_state(app.visitor()).to_json().ok())
        .flatten()
        .unwrap_or_else(|| "null".to_string())
}

/// Diagnostic timeline as JSON
#[wasm_bindgen]
pub fn diagnostics_json() -> String {
    LOG.with(|log| log.borrow().as_ref().and_then(|l| l.to_json().ok()))
        .unwrap_or_else(|| "[]".to_string())
}

/// Get the loader version
#[wasm_bindgen]
pub fn version() -> String {
    lcw_core::LCW_VERSION.to_string()
}
