//! Script elements and load tickets

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::registry::{AgentType, Environment, WidgetConfig};

/// Which configured source a script element points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptSource {
    Primary,
    Fallback,
}

/// Host-independent description of a widget `<script>` element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptElement {
    pub id: String,
    pub src: String,
    pub is_async: bool,
    pub attributes: BTreeMap<String, String>,
}

impl ScriptElement {
    /// Element for one source of a configuration
    ///
    /// Primary and fallback elements differ only in `src`.
    pub fn from_config(config: &WidgetConfig, source: ScriptSource) -> Self {
        let src = match source {
            ScriptSource::Primary => &config.primary_source_url,
            ScriptSource::Fallback => &config.fallback_source_url,
        };
        Self {
            id: config.script_element_id.clone(),
            src: src.clone(),
            is_async: true,
            attributes: config.attributes.clone(),
        }
    }

    /// Render as HTML, attributes in name order
    pub fn to_html(&self) -> String {
        let mut html = format!(r#"<script id="{}" src="{}""#, self.id, self.src);
        if self.is_async {
            html.push_str(" async");
        }
        for (name, value) in &self.attributes {
            html.push_str(&format!(r#" {}="{}""#, name, value.replace('"', "&quot;")));
        }
        html.push_str("></script>");
        html
    }
}

/// Identifies one injection attempt
///
/// Hosts hand the ticket back when the element's load fails. A ticket whose
/// generation is older than the manager's current one belongs to a widget that
/// has since been torn down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadTicket {
    pub generation: u64,
    pub environment: Environment,
    pub agent: AgentType,
    pub script_id: String,
    pub source: ScriptSource,
}
