//! Device type detection from the user agent

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed set of device classes reported to the widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "iPad")]
    IPad,
    #[serde(rename = "iPhone")]
    IPhone,
    Android,
    Windows,
    Mac,
    Unknown,
}

// Checked in order after the iPad special cases below
const RULES: [(&str, DeviceType); 5] = [
    ("iPad", DeviceType::IPad),
    ("iPhone", DeviceType::IPhone),
    ("Android", DeviceType::Android),
    ("Windows", DeviceType::Windows),
    ("Macintosh", DeviceType::Mac),
];

fn rules() -> &'static [(Regex, DeviceType)] {
    static COMPILED: OnceLock<Vec<(Regex, DeviceType)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|(pattern, device)| Regex::new(pattern).ok().map(|re| (re, *device)))
            .collect()
    })
}

impl DeviceType {
    /// Classify a user agent
    ///
    /// `max_touch_points` distinguishes iPadOS 13+, which reports a desktop
    /// Macintosh user agent but has a touch screen.
    pub fn detect(user_agent: &str, max_touch_points: u32) -> Self {
        let rules = rules();
        let matches = |device: DeviceType| {
            rules
                .iter()
                .any(|(re, d)| *d == device && re.is_match(user_agent))
        };

        if matches(DeviceType::IPad) || (matches(DeviceType::Mac) && max_touch_points > 1) {
            return DeviceType::IPad;
        }
        rules
            .iter()
            .find(|(re, _)| re.is_match(user_agent))
            .map(|(_, device)| *device)
            .unwrap_or(DeviceType::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::IPad => "iPad",
            DeviceType::IPhone => "iPhone",
            DeviceType::Android => "Android",
            DeviceType::Windows => "Windows",
            DeviceType::Mac => "Mac",
            DeviceType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPAD_LEGACY: &str =
        "Mozilla/5.0 (iPad; CPU OS 12_2 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
    const MAC_DESKTOP: &str =
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 Version/17.0 Safari/605.1.15";
    const IPHONE: &str =
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
    const ANDROID: &str =
        "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 Chrome/120.0 Mobile Safari/537.36";
    const WINDOWS: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";

    #[test]
    fn test_detect_devices() {
        assert_eq!(DeviceType::detect(IPAD_LEGACY, 5), DeviceType::IPad);
        assert_eq!(DeviceType::detect(IPHONE, 5), DeviceType::IPhone);
        assert_eq!(DeviceType::detect(ANDROID, 5), DeviceType::Android);
        assert_eq!(DeviceType::detect(WINDOWS, 0), DeviceType::Windows);
        assert_eq!(DeviceType::detect(MAC_DESKTOP, 0), DeviceType::Mac);
        assert_eq!(DeviceType::detect("curl/8.4.0", 0), DeviceType::Unknown);
    }

    #[test]
    fn test_touch_mac_is_ipad() {
        assert_eq!(DeviceType::detect(MAC_DESKTOP, 5), DeviceType::IPad);
        // A single touch point is a trackpad, not a touch screen
        assert_eq!(DeviceType::detect(MAC_DESKTOP, 1), DeviceType::Mac);
    }

    #[test]
    fn test_serializes_display_names() {
        assert_eq!(serde_json::to_string(&DeviceType::IPad).unwrap(), "\"iPad\"");
        assert_eq!(DeviceType::IPhone.to_string(), "iPhone");
    }
}
