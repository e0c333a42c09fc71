//! IP, location and coordinate data from network lookups and the
//! browser geolocation API

use serde::{Deserialize, Serialize};

use super::{LOCATION_UNAVAILABLE, NOT_SUPPORTED, UNAVAILABLE};
use crate::error::{Result, WidgetError};

/// Body of the IP lookup service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpLookupResponse {
    pub ip: String,
}

impl IpLookupResponse {
    pub fn parse(body: &str) -> Result<Self> {
        let response: IpLookupResponse =
            serde_json::from_str(body).map_err(|e| WidgetError::CollaboratorDataUnavailable {
                field: "VisitorIP".to_string(),
                reason: format!("unexpected lookup response: {}", e),
            })?;
        if response.ip.trim().is_empty() {
            return Err(WidgetError::CollaboratorDataUnavailable {
                field: "VisitorIP".to_string(),
                reason: "lookup returned an empty address".to_string(),
            });
        }
        Ok(response)
    }
}

/// Body of the IP geolocation service; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLookupResponse {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
}

impl GeoLookupResponse {
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| WidgetError::CollaboratorDataUnavailable {
            field: "Location".to_string(),
            reason: format!("unexpected lookup response: {}", e),
        })
    }

    /// Non-empty parts joined as "City, Region, Country"
    pub fn to_location(&self) -> LocationStatus {
        let parts: Vec<&str> = [&self.city, &self.region, &self.country_name]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        if parts.is_empty() {
            LocationStatus::LookupFailed
        } else {
            LocationStatus::Resolved(parts.join(", "))
        }
    }
}

/// Location lookup progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationStatus {
    /// Lookup not attempted or not finished
    #[default]
    Pending,
    Resolved(String),
    LookupFailed,
}

impl LocationStatus {
    pub fn display_value(&self) -> String {
        match self {
            LocationStatus::Pending => UNAVAILABLE.to_string(),
            LocationStatus::Resolved(location) => location.clone(),
            LocationStatus::LookupFailed => LOCATION_UNAVAILABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// "lat, lon" with four decimal places
    pub fn format(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Browser geolocation progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum CoordinateStatus {
    #[default]
    Pending,
    Known(Coordinates),
    /// Permission denied, timeout or position unavailable
    Failed,
    /// The browser has no geolocation API
    Unsupported,
}

impl CoordinateStatus {
    pub fn display_value(&self) -> String {
        match self {
            CoordinateStatus::Pending | CoordinateStatus::Failed => UNAVAILABLE.to_string(),
            CoordinateStatus::Known(coords) => coords.format(),
            CoordinateStatus::Unsupported => NOT_SUPPORTED.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_lookup_parse() {
        let parsed = IpLookupResponse::parse(r#"{"ip":"203.0.113.7"}"#).unwrap();
        assert_eq!(parsed.ip, "203.0.113.7");

        let err = IpLookupResponse::parse("<html>").unwrap_err();
        assert_eq!(err.error_code(), "COLLABORATOR_DATA_UNAVAILABLE");
        assert!(IpLookupResponse::parse(r#"{"ip":""}"#).is_err());
    }

    #[test]
    fn test_location_joins_present_parts() {
        let geo = GeoLookupResponse::parse(
            r#"{"city":"Sydney","region":"New South Wales","country_name":"Australia","org":"x"}"#,
        )
        .unwrap();
        assert_eq!(
            geo.to_location().display_value(),
            "Sydney, New South Wales, Australia"
        );

        let partial = GeoLookupResponse {
            city: Some(" ".to_string()),
            region: None,
            country_name: Some("Australia".to_string()),
        };
        assert_eq!(partial.to_location().display_value(), "Australia");
    }

    #[test]
    fn test_empty_geo_is_lookup_failure() {
        let geo = GeoLookupResponse::parse("{}").unwrap();
        assert_eq!(geo.to_location(), LocationStatus::LookupFailed);
        assert_eq!(geo.to_location().display_value(), "Location unavailable");
        assert_eq!(LocationStatus::Pending.display_value(), "Unavailable");
    }

    #[test]
    fn test_coordinates_four_decimals() {
        let coords = Coordinates::new(-33.868_82, 151.209_296);
        assert_eq!(coords.format(), "-33.8688, 151.2093");
        assert_eq!(CoordinateStatus::Known(coords).display_value(), "-33.8688, 151.2093");
        assert_eq!(CoordinateStatus::Failed.display_value(), "Unavailable");
        assert_eq!(
            CoordinateStatus::Unsupported.display_value(),
            "Not supported by browser"
        );
    }
}
