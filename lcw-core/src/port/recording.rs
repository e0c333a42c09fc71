//! In-memory port backends
//!
//! Record every call so tests can assert on exactly what the lifecycle
//! manager did to the page.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::{ContextProvider, ContextSdk, ScriptInjectionPort, SessionStore};
use crate::error::{Result, WidgetError};
use crate::lifecycle::{LoadTicket, ScriptElement};
use crate::visitor::VisitorContext;

/// A non-script node in the simulated page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockNode {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
}

impl MockNode {
    pub fn new(tag: &str, attributes: &[(&str, &str)]) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Recorded port call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortCall {
    InsertScript { id: String, src: String },
    RemoveScript { id: String, removed: bool },
    RemoveMatching { selectors: String, removed: usize },
    ClearNamespace { path: String, cleared: bool },
}

/// Script injection port backed by an in-memory page
#[derive(Debug, Default)]
pub struct RecordingScriptPort {
    scripts: Vec<(ScriptElement, LoadTicket)>,
    nodes: Vec<MockNode>,
    namespaces: HashSet<String>,
    calls: Vec<PortCall>,
    reject_inserts: bool,
}

impl RecordingScriptPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attached script elements in insertion order
    pub fn scripts(&self) -> Vec<&ScriptElement> {
        self.scripts.iter().map(|(s, _)| s).collect()
    }

    pub fn script(&self, id: &str) -> Option<&ScriptElement> {
        self.scripts.iter().find(|(s, _)| s.id == id).map(|(s, _)| s)
    }

    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    /// Ticket of the attached element with `id`, as a host would hold it
    pub fn ticket_for(&self, id: &str) -> Option<LoadTicket> {
        self.scripts
            .iter()
            .find(|(s, _)| s.id == id)
            .map(|(_, t)| t.clone())
    }

    /// Simulate the widget SDK rendering: an iframe, a container and the
    /// global namespace
    pub fn render_widget(&mut self, namespace: &str) {
        self.nodes.push(MockNode::new(
            "iframe",
            &[
                ("id", "oc-lcw-chat-frame"),
                ("title", "Chat"),
                ("src", "https://oc-cdn-public-oce.azureedge.net/livechatwidget/v2/frame.html"),
            ],
        ));
        self.nodes
            .push(MockNode::new("div", &[("id", "oc-lcw-container"), ("class", "oc-lcw-root")]));
        self.install_namespace(namespace);
    }

    pub fn add_node(&mut self, node: MockNode) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[MockNode] {
        &self.nodes
    }

    pub fn install_namespace(&mut self, path: &str) {
        self.namespaces.insert(path.to_string());
    }

    pub fn has_namespace(&self, path: &str) -> bool {
        self.namespaces.contains(path)
    }

    pub fn calls(&self) -> &[PortCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Make every following insert fail, as a host without a document body would
    pub fn reject_inserts(&mut self, reject: bool) {
        self.reject_inserts = reject;
    }
}

impl ScriptInjectionPort for RecordingScriptPort {
    fn insert_script(&mut self, script: &ScriptElement, ticket: &LoadTicket) -> Result<()> {
        if self.reject_inserts {
            return Err(WidgetError::Port {
                reason: "document body unavailable".to_string(),
            });
        }
        self.calls.push(PortCall::InsertScript {
            id: script.id.clone(),
            src: script.src.clone(),
        });
        self.scripts.push((script.clone(), ticket.clone()));
        Ok(())
    }

    fn remove_script(&mut self, id: &str) -> bool {
        // getElementById + remove(): only the first match goes
        let removed = match self.scripts.iter().position(|(s, _)| s.id == id) {
            Some(idx) => {
                self.scripts.remove(idx);
                true
            }
            None => false,
        };
        self.calls.push(PortCall::RemoveScript {
            id: id.to_string(),
            removed,
        });
        removed
    }

    fn remove_matching(&mut self, selectors: &str) -> usize {
        let parsed = parse_selectors(selectors);
        let before = self.nodes.len();
        self.nodes
            .retain(|node| !parsed.iter().any(|selector| selector.matches(node)));
        let removed = before - self.nodes.len();
        self.calls.push(PortCall::RemoveMatching {
            selectors: selectors.to_string(),
            removed,
        });
        removed
    }

    fn clear_namespace(&mut self, path: &str) -> bool {
        let nested = format!("{}.", path);
        let before = self.namespaces.len();
        self.namespaces
            .retain(|ns| ns != path && !ns.starts_with(&nested));
        let cleared = self.namespaces.len() != before;
        self.calls.push(PortCall::ClearNamespace {
            path: path.to_string(),
            cleared,
        });
        cleared
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// `tag[attr*="value"]`, the only selector form teardown uses
#[derive(Debug)]
struct ContainsSelector {
    tag: Option<String>,
    attribute: String,
    needle: String,
}

impl ContainsSelector {
    fn matches(&self, node: &MockNode) -> bool {
        if let Some(tag) = &self.tag {
            if !tag.eq_ignore_ascii_case(&node.tag) {
                return false;
            }
        }
        node.attributes
            .get(&self.attribute)
            .map(|value| value.contains(&self.needle))
            .unwrap_or(false)
    }
}

fn parse_selectors(selectors: &str) -> Vec<ContainsSelector> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(pattern) = PATTERN
        .get_or_init(|| Regex::new(r#"^\s*([A-Za-z][\w-]*)?\[([\w-]+)\*="([^"]*)"\]\s*$"#).ok())
        .as_ref()
    else {
        return Vec::new();
    };

    selectors
        .split(',')
        .filter_map(|part| {
            let caps = pattern.captures(part)?;
            Some(ContainsSelector {
                tag: caps.get(1).map(|m| m.as_str().to_string()),
                attribute: caps[2].to_string(),
                needle: caps[3].to_string(),
            })
        })
        .collect()
}

/// Widget SDK double whose context API can be present or absent
pub struct RecordingContextSdk {
    api_present: bool,
    provider: Option<ContextProvider>,
    registrations: usize,
}

impl Default for RecordingContextSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordingContextSdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingContextSdk")
            .field("api_present", &self.api_present)
            .field("has_provider", &self.provider.is_some())
            .field("registrations", &self.registrations)
            .finish()
    }
}

impl RecordingContextSdk {
    /// SDK with its context API installed
    pub fn new() -> Self {
        Self {
            api_present: true,
            provider: None,
            registrations: 0,
        }
    }

    /// SDK version without a context API
    pub fn without_context_api() -> Self {
        Self {
            api_present: false,
            ..Self::new()
        }
    }

    pub fn set_api_present(&mut self, present: bool) {
        self.api_present = present;
    }

    pub fn registrations(&self) -> usize {
        self.registrations
    }

    /// Invoke the registered provider as the SDK would
    pub fn query(&self) -> Option<VisitorContext> {
        self.provider.as_ref().map(|provider| provider())
    }
}

impl ContextSdk for RecordingContextSdk {
    fn has_context_api(&self, _entry_point: &str) -> bool {
        self.api_present
    }

    fn set_context_provider(&mut self, entry_point: &str, provider: ContextProvider) -> Result<()> {
        if !self.api_present {
            return Err(WidgetError::SdkNotReady {
                entry_point: entry_point.to_string(),
            });
        }
        self.provider = Some(provider);
        self.registrations += 1;
        Ok(())
    }
}

/// Session storage held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    values: HashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{TeardownConfig, VisitorConfig};
    use crate::visitor::VisitorState;

    #[test]
    fn test_teardown_selectors_match_rendered_widget() {
        let teardown = TeardownConfig::default();
        let mut port = RecordingScriptPort::new();
        port.render_widget(&teardown.sdk_namespace);
        port.add_node(MockNode::new("div", &[("id", "page-header")]));

        assert_eq!(port.remove_matching(&teardown.iframe_selectors), 1);
        assert_eq!(port.remove_matching(&teardown.container_selectors), 1);
        assert_eq!(port.nodes().len(), 1);
        assert_eq!(port.nodes()[0].attributes["id"], "page-header");
    }

    #[test]
    fn test_clear_namespace_removes_nested_paths() {
        let mut port = RecordingScriptPort::new();
        port.install_namespace("Microsoft.Omnichannel.LiveChatWidget");
        port.install_namespace("Microsoft.Omnichannel.LiveChatWidget.SDK");
        port.install_namespace("Microsoft.Omnichannel");

        assert!(port.clear_namespace("Microsoft.Omnichannel.LiveChatWidget"));
        assert!(!port.has_namespace("Microsoft.Omnichannel.LiveChatWidget.SDK"));
        assert!(port.has_namespace("Microsoft.Omnichannel"));
        assert!(!port.clear_namespace("Microsoft.Omnichannel.LiveChatWidget"));
    }

    #[test]
    fn test_unparseable_selector_matches_nothing() {
        let mut port = RecordingScriptPort::new();
        port.add_node(MockNode::new("iframe", &[("id", "oc-lcw")]));
        assert_eq!(port.remove_matching("iframe:not(.x)"), 0);
    }

    #[test]
    fn test_sdk_without_api_rejects_provider() {
        let state = VisitorState::from_page("curl/8.4.0", 0, "", &VisitorConfig::default());
        let snapshot = VisitorContext::from_state(&state);

        let mut sdk = RecordingContextSdk::without_context_api();
        let err = sdk
            .set_context_provider("SDK.setContextProvider", Box::new(move || snapshot.clone()))
            .unwrap_err();
        assert_eq!(err.error_code(), "SDK_NOT_READY");
        assert_eq!(sdk.registrations(), 0);
        assert!(sdk.query().is_none());
    }

    #[test]
    fn test_memory_session_store() {
        let mut store = MemorySessionStore::new();
        assert!(store.get("isAuthenticated").is_none());
        store.set("isAuthenticated", "true").unwrap();
        assert_eq!(store.get("isAuthenticated").as_deref(), Some("true"));
    }
}
