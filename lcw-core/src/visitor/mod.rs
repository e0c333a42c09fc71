//! Visitor data - what the widget is told about the person chatting
//!
//! Producers (query string, user agent sniffing, IP and geolocation lookups)
//! write into a live [`VisitorState`]. Each readiness signal takes a fresh
//! [`VisitorContext`] snapshot from it. Fields that are not known carry an
//! explicit placeholder, so the snapshot is always fully populated.
//!
//! Setters overwrite unconditionally. A lookup that resolves late, after the
//! visitor switched environment or agent, still lands in the live state and
//! shows up in the next snapshot; a snapshot that was already registered is
//! not updated.

mod browser;
mod device;
mod geo;
mod referral;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::registry::VisitorConfig;

pub use browser::BrowserName;
pub use device::DeviceType;
pub use geo::{
    CoordinateStatus, Coordinates, GeoLookupResponse, IpLookupResponse, LocationStatus,
};
pub use referral::{parse_referral, query_param};

/// Placeholder for any field whose producer has nothing to report
pub const UNAVAILABLE: &str = "Unavailable";
/// Placeholder for a failed location lookup
pub const LOCATION_UNAVAILABLE: &str = "Location unavailable";
/// Placeholder when the browser has no geolocation API
pub const NOT_SUPPORTED: &str = "Not supported by browser";

/// Live collaborator state for the page session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorState {
    pub ip: Option<String>,
    pub referral: String,
    pub user_agent: String,
    pub device: DeviceType,
    pub browser: BrowserName,
    pub location: LocationStatus,
    pub coordinates: CoordinateStatus,
}

impl VisitorState {
    /// State known synchronously at page start
    pub fn from_page(
        user_agent: &str,
        max_touch_points: u32,
        query: &str,
        config: &VisitorConfig,
    ) -> Self {
        Self {
            ip: None,
            referral: parse_referral(query, &config.referral_parameter, &config.default_referral),
            user_agent: user_agent.to_string(),
            device: DeviceType::detect(user_agent, max_touch_points),
            browser: BrowserName::detect(user_agent),
            location: LocationStatus::Pending,
            coordinates: CoordinateStatus::Pending,
        }
    }

    pub fn set_ip(&mut self, ip: Option<String>) {
        self.ip = ip.filter(|ip| !ip.trim().is_empty());
    }

    /// Apply an IP lookup body; failures leave the address unknown
    pub fn apply_ip_lookup(&mut self, body: Result<String>) {
        let ip = body.and_then(|b| IpLookupResponse::parse(&b)).map(|r| r.ip);
        match ip {
            Ok(ip) => self.set_ip(Some(ip)),
            Err(e) => {
                tracing::debug!(error = %e, "IP lookup unavailable");
                self.set_ip(None);
            }
        }
    }

    pub fn set_location(&mut self, location: LocationStatus) {
        self.location = location;
    }

    /// Apply a geolocation lookup body; failures become `LookupFailed`
    pub fn apply_geo_lookup(&mut self, body: Result<String>) {
        let location = body
            .and_then(|b| GeoLookupResponse::parse(&b))
            .map(|geo| geo.to_location());
        match location {
            Ok(location) => self.set_location(location),
            Err(e) => {
                tracing::debug!(error = %e, "location lookup unavailable");
                self.set_location(LocationStatus::LookupFailed);
            }
        }
    }

    pub fn set_coordinates(&mut self, coordinates: CoordinateStatus) {
        self.coordinates = coordinates;
    }
}

/// One context attribute as the widget SDK expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextField {
    pub value: String,
    #[serde(rename = "isDisplayable")]
    pub is_displayable: bool,
}

impl ContextField {
    fn shown(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            is_displayable: true,
        }
    }
}

/// Snapshot of visitor attributes handed to the widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorContext {
    #[serde(rename = "VisitorIP")]
    pub visitor_ip: ContextField,
    #[serde(rename = "Referral")]
    pub referral: ContextField,
    #[serde(rename = "DeviceType")]
    pub device_type: ContextField,
    #[serde(rename = "UserAgent")]
    pub user_agent: ContextField,
    #[serde(rename = "Browser")]
    pub browser: ContextField,
    #[serde(rename = "Location")]
    pub location: ContextField,
    #[serde(rename = "Coordinates")]
    pub coordinates: ContextField,
}

impl VisitorContext {
    pub fn from_state(state: &VisitorState) -> Self {
        Self {
            visitor_ip: ContextField::shown(
                state.ip.clone().unwrap_or_else(|| UNAVAILABLE.to_string()),
            ),
            referral: ContextField::shown(state.referral.clone()),
            device_type: ContextField::shown(state.device.as_str()),
            user_agent: ContextField::shown(if state.user_agent.is_empty() {
                UNAVAILABLE.to_string()
            } else {
                state.user_agent.clone()
            }),
            browser: ContextField::shown(state.browser.as_str()),
            location: ContextField::shown(state.location.display_value()),
            coordinates: ContextField::shown(state.coordinates.display_value()),
        }
    }

    /// Look up a field by its wire name (e.g. "VisitorIP")
    pub fn get(&self, name: &str) -> Option<&ContextField> {
        match name {
            "VisitorIP" => Some(&self.visitor_ip),
            "Referral" => Some(&self.referral),
            "DeviceType" => Some(&self.device_type),
            "UserAgent" => Some(&self.user_agent),
            "Browser" => Some(&self.browser),
            "Location" => Some(&self.location),
            "Coordinates" => Some(&self.coordinates),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WidgetError;

    const CHROME_WINDOWS: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";

    fn state() -> VisitorState {
        VisitorState::from_page(
            CHROME_WINDOWS,
            0,
            "?referrer=%27KHL2%27",
            &VisitorConfig::default(),
        )
    }

    #[test]
    fn test_fresh_state_uses_placeholders() {
        let ctx = VisitorContext::from_state(&state());

        assert_eq!(ctx.visitor_ip.value, "Unavailable");
        assert_eq!(ctx.referral.value, "KHL2");
        assert_eq!(ctx.device_type.value, "Windows");
        assert_eq!(ctx.browser.value, "Chrome");
        assert_eq!(ctx.location.value, "Unavailable");
        assert_eq!(ctx.coordinates.value, "Unavailable");
        assert!(ctx.user_agent.is_displayable);
    }

    #[test]
    fn test_lookups_update_state() {
        let mut state = state();
        state.apply_ip_lookup(Ok(r#"{"ip":"198.51.100.4"}"#.to_string()));
        state.apply_geo_lookup(Ok(r#"{"city":"Perth","country_name":"Australia"}"#.to_string()));
        state.set_coordinates(CoordinateStatus::Known(Coordinates::new(-31.95, 115.86)));

        let ctx = VisitorContext::from_state(&state);
        assert_eq!(ctx.visitor_ip.value, "198.51.100.4");
        assert_eq!(ctx.location.value, "Perth, Australia");
        assert_eq!(ctx.coordinates.value, "-31.9500, 115.8600");
    }

    #[test]
    fn test_failed_lookups_degrade_to_placeholders() {
        let mut state = state();
        state.apply_ip_lookup(Err(WidgetError::CollaboratorDataUnavailable {
            field: "VisitorIP".to_string(),
            reason: "offline".to_string(),
        }));
        state.apply_geo_lookup(Ok("not json".to_string()));

        let ctx = VisitorContext::from_state(&state);
        assert_eq!(ctx.visitor_ip.value, "Unavailable");
        assert_eq!(ctx.location.value, "Location unavailable");
    }

    #[test]
    fn test_wire_shape() {
        let json: serde_json::Value =
            serde_json::from_str(&VisitorContext::from_state(&state()).to_json().unwrap()).unwrap();

        assert_eq!(json["Referral"]["value"], "KHL2");
        assert_eq!(json["Referral"]["isDisplayable"], true);
        assert_eq!(json.as_object().unwrap().len(), 7);
    }

    #[test]
    fn test_get_by_wire_name() {
        let ctx = VisitorContext::from_state(&state());
        assert_eq!(ctx.get("DeviceType").unwrap().value, "Windows");
        assert!(ctx.get("Email").is_none());
    }
}
