//! Browser name detection from the user agent

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed set of browser names reported to the widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrowserName {
    Firefox,
    #[serde(rename = "Samsung Internet")]
    SamsungInternet,
    Opera,
    #[serde(rename = "Internet Explorer")]
    InternetExplorer,
    #[serde(rename = "Edge (Legacy)")]
    EdgeLegacy,
    Edge,
    Chrome,
    Safari,
    Unknown,
}

// Order matters: most user agents also claim to be Chrome and Safari.
const RULES: [(&str, BrowserName); 8] = [
    ("Firefox|FxiOS", BrowserName::Firefox),
    ("SamsungBrowser", BrowserName::SamsungInternet),
    ("Opera|OPR", BrowserName::Opera),
    ("Trident|MSIE", BrowserName::InternetExplorer),
    ("Edge/", BrowserName::EdgeLegacy),
    ("Edg", BrowserName::Edge),
    ("Chrome|CriOS", BrowserName::Chrome),
    ("Safari", BrowserName::Safari),
];

fn rules() -> &'static [(Regex, BrowserName)] {
    static COMPILED: OnceLock<Vec<(Regex, BrowserName)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|(pattern, name)| Regex::new(pattern).ok().map(|re| (re, *name)))
            .collect()
    })
}

impl BrowserName {
    pub fn detect(user_agent: &str) -> Self {
        rules()
            .iter()
            .find(|(re, _)| re.is_match(user_agent))
            .map(|(_, name)| *name)
            .unwrap_or(BrowserName::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserName::Firefox => "Firefox",
            BrowserName::SamsungInternet => "Samsung Internet",
            BrowserName::Opera => "Opera",
            BrowserName::InternetExplorer => "Internet Explorer",
            BrowserName::EdgeLegacy => "Edge (Legacy)",
            BrowserName::Edge => "Edge",
            BrowserName::Chrome => "Chrome",
            BrowserName::Safari => "Safari",
            BrowserName::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for BrowserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
