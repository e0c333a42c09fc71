//! Browser implementations of the lcw-core ports

use js_sys::{Function, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlScriptElement, Storage, Window};

use lcw_core::{
    ContextProvider, ContextSdk, LoadTicket, Result, ScriptElement, ScriptInjectionPort,
    SessionStore, WidgetError,
};

fn port_error(what: &str, err: JsValue) -> WidgetError {
    WidgetError::Port {
        reason: format!("{}: {:?}", what, err),
    }
}

/// Split a dotted global path into parent segments and the final property
pub(crate) fn split_path(path: &str) -> Option<(Vec<&str>, &str)> {
    let mut segments: Vec<&str> = path.split('.').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    let last = segments.pop()?;
    Some((segments, last))
}

/// Walk `segments` from `root`; `None` once a segment is missing
fn walk(root: &JsValue, segments: &[&str]) -> Option<JsValue> {
    let mut current = root.clone();
    for segment in segments {
        let next = Reflect::get(&current, &JsValue::from_str(segment)).ok()?;
        if next.is_undefined() || next.is_null() {
            return None;
        }
        current = next;
    }
    Some(current)
}

/// Injects widget scripts into the live document
pub struct DomScriptPort {
    window: Window,
    document: Document,
    on_error: fn(LoadTicket),
}

impl DomScriptPort {
    /// `on_error` receives the ticket of any injected element whose load fails
    pub fn new(window: Window, document: Document, on_error: fn(LoadTicket)) -> Self {
        Self {
            window,
            document,
            on_error,
        }
    }
}

impl ScriptInjectionPort for DomScriptPort {
    fn insert_script(&mut self, script: &ScriptElement, ticket: &LoadTicket) -> Result<()> {
        let element: HtmlScriptElement = self
            .document
            .create_element("script")
            .map_err(|e| port_error("create script", e))?
            .dyn_into()
            .map_err(|_| WidgetError::Port {
                reason: "created element is not a script".to_string(),
            })?;

        element.set_id(&script.id);
        element.set_src(&script.src);
        element.set_async(script.is_async);
        for (name, value) in &script.attributes {
            element
                .set_attribute(name, value)
                .map_err(|e| port_error("set attribute", e))?;
        }

        let ticket = ticket.clone();
        let on_error = self.on_error;
        let handler = Closure::once_into_js(move || on_error(ticket));
        element.set_onerror(Some(handler.unchecked_ref()));

        let body = self.document.body().ok_or_else(|| WidgetError::Port {
            reason: "document body unavailable".to_string(),
        })?;
        body.append_child(&element)
            .map_err(|e| port_error("append script", e))?;
        Ok(())
    }

    fn remove_script(&mut self, id: &str) -> bool {
        match self.document.get_element_by_id(id) {
            Some(element) => {
                element.remove();
                true
            }
            None => false,
        }
    }

    fn remove_matching(&mut self, selectors: &str) -> usize {
        let nodes = match self.document.query_selector_all(selectors) {
            Ok(nodes) => nodes,
            Err(e) => {
                web_sys::console::warn_1(&format!("lcw: bad selector '{}': {:?}", selectors, e).into());
                return 0;
            }
        };

        let mut removed = 0;
        for i in 0..nodes.length() {
            if let Some(element) = nodes.item(i).and_then(|n| n.dyn_into::<Element>().ok()) {
                element.remove();
                removed += 1;
            }
        }
        removed
    }

    fn clear_namespace(&mut self, path: &str) -> bool {
        let Some((parents, last)) = split_path(path) else {
            return false;
        };
        let Some(parent) = walk(self.window.as_ref(), &parents) else {
            return false;
        };
        let key = JsValue::from_str(last);
        if !Reflect::has(&parent, &key).unwrap_or(false) {
            return false;
        }
        match parent.dyn_ref::<js_sys::Object>() {
            Some(object) => Reflect::delete_property(object, &key).unwrap_or(false),
            None => false,
        }
    }

    fn name(&self) -> &'static str {
        "dom"
    }
}

/// Widget SDK reached through globals on `window`
pub struct WindowSdk {
    window: Window,
}

impl WindowSdk {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    fn entry(&self, entry_point: &str) -> Option<(JsValue, Function)> {
        let (parents, last) = split_path(entry_point)?;
        let owner = walk(self.window.as_ref(), &parents)?;
        let function = Reflect::get(&owner, &JsValue::from_str(last))
            .ok()?
            .dyn_into::<Function>()
            .ok()?;
        Some((owner, function))
    }
}

impl ContextSdk for WindowSdk {
    fn has_context_api(&self, entry_point: &str) -> bool {
        self.entry(entry_point).is_some()
    }

    fn set_context_provider(&mut self, entry_point: &str, provider: ContextProvider) -> Result<()> {
        let (owner, function) = self.entry(entry_point).ok_or_else(|| WidgetError::SdkNotReady {
            entry_point: entry_point.to_string(),
        })?;

        let callback = Closure::<dyn Fn() -> JsValue>::new(move || {
            provider()
                .to_json()
                .ok()
                .and_then(|json| js_sys::JSON::parse(&json).ok())
                .unwrap_or(JsValue::NULL)
        });
        function
            .call1(&owner, &callback.into_js_value())
            .map_err(|e| port_error("setContextProvider", e))?;
        Ok(())
    }
}

/// `window.sessionStorage`; reads as empty when storage is blocked
pub struct BrowserSessionStore {
    storage: Option<Storage>,
}

impl BrowserSessionStore {
    pub fn new(window: &Window) -> Self {
        Self {
            storage: window.session_storage().ok().flatten(),
        }
    }
}

impl SessionStore for BrowserSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.as_ref()?.get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let storage = self.storage.as_ref().ok_or_else(|| WidgetError::Port {
            reason: "session storage unavailable".to_string(),
        })?;
        storage
            .set_item(key, value)
            .map_err(|e| port_error("sessionStorage.setItem", e))
    }
}
