//! Request and response types for the WG-Gesucht mobile API.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Authenticated session tokens returned by the login endpoint.
///
/// All five values are required on every authenticated request, so the
/// whole struct is persisted and restored between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub dev_ref_no: String,
    /// PHP session cookie issued alongside the tokens.
    pub php_session_id: String,
}

/// A city suggestion from the city name search.
#[derive(Debug, Clone, Deserialize)]
pub struct CityMatch {
    #[serde(deserialize_with = "string_or_number")]
    pub city_id: String,
    #[serde(default)]
    pub city_name: String,
}

/// One listing from the offer search results.
///
/// The search payload carries dozens of fields per offer; only the ones
/// the bot acts on are modeled here.
#[derive(Debug, Clone, Deserialize)]
pub struct OfferSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub offer_id: String,
    #[serde(default)]
    pub offer_title: Option<String>,
    /// Number of current flatmates. The API sends this as a number or a
    /// numeric string depending on the listing.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub flatshare_inhabitants_total: Option<u32>,
}

impl OfferSummary {
    /// Flatmate count, treating a missing or unparseable value as zero.
    pub fn flatshare_total(&self) -> u32 {
        self.flatshare_inhabitants_total.unwrap_or(0)
    }
}

/// Search criteria for the offer list endpoint.
#[derive(Debug, Clone)]
pub struct OfferFilter {
    pub city_id: String,
    /// Offer category codes, comma separated. `"0"` is flatshares.
    pub categories: String,
    /// Maximum rent in euros.
    pub max_rent: Option<u32>,
    /// Minimum room size in square meters.
    pub min_size: Option<u32>,
    /// Maximum number of current flatmates. Applied client side since
    /// the API does not filter on it.
    pub max_flatmates: Option<u32>,
    pub page: u32,
}

impl OfferFilter {
    pub fn new(city_id: impl Into<String>) -> Self {
        Self {
            city_id: city_id.into(),
            categories: "0".to_string(),
            max_rent: None,
            min_size: None,
            max_flatmates: None,
            page: 1,
        }
    }

    pub fn max_rent(mut self, euros: u32) -> Self {
        self.max_rent = Some(euros);
        self
    }

    pub fn min_size(mut self, square_meters: u32) -> Self {
        self.min_size = Some(square_meters);
        self
    }

    pub fn max_flatmates(mut self, count: u32) -> Self {
        self.max_flatmates = Some(count);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Query parameters in the order the mobile app sends them.
    pub(crate) fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("ad_type", "0".to_string()),
            ("categories", self.categories.clone()),
            ("city_id", self.city_id.clone()),
            ("noDeact", "1".to_string()),
            ("img", "1".to_string()),
            ("limit", "20".to_string()),
        ];
        if let Some(rent) = self.max_rent {
            params.push(("rMax", rent.to_string()));
        }
        if let Some(size) = self.min_size {
            params.push(("sMin", size.to_string()));
        }
        params.push(("rent_types", self.categories.clone()));
        params.push(("page", self.page.to_string()));
        params
    }
}

/// Full listing details from the offer detail endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OfferDetail {
    #[serde(default)]
    pub offer_title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub freetext_property_description: String,
    #[serde(default)]
    pub freetext_area_description: String,
    #[serde(default)]
    pub freetext_flatshare: String,
    #[serde(default)]
    pub freetext_other: String,
}

impl OfferDetail {
    /// The listing's free text sections joined into one description.
    pub fn description(&self) -> String {
        let sections = [
            &self.freetext_property_description,
            &self.freetext_area_description,
            &self.freetext_flatshare,
            &self.freetext_other,
        ];
        sections
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// Wire envelopes. The API wraps collections in a HAL-style `_embedded`
// object.

#[derive(Debug, Deserialize)]
pub(crate) struct Embedded<T> {
    #[serde(rename = "_embedded")]
    pub embedded: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CityResults {
    pub cities: Option<Vec<CityMatch>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OfferResults {
    pub offers: Option<Vec<OfferSummary>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationResults {
    pub conversations: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionEnvelope {
    pub detail: SessionDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionDetail {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub dev_ref_no: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshEnvelope {
    pub detail: RefreshDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshDetail {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub dev_ref_no: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContactResponse {
    #[serde(default)]
    pub messages: Vec<Value>,
}

// Request bodies.

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub login_email_username: &'a str,
    pub login_password: &'a str,
    pub client_id: &'a str,
    pub display_language: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub grant_type: &'a str,
    pub access_token: &'a str,
    pub refresh_token: &'a str,
    pub client_id: &'a str,
    pub dev_ref_no: &'a str,
    pub display_language: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ContactRequest<'a> {
    pub user_id: &'a str,
    pub ad_type: u8,
    pub ad_id: i64,
    pub messages: Vec<OutboundMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OutboundMessage<'a> {
    pub content: &'a str,
    pub message_type: &'a str,
}

/// Accepts a JSON string or number and yields it as a string.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Like [`string_or_number`] but maps null to `None`.
fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Accepts a JSON number, numeric string, or null. Anything else maps
/// to `None` rather than failing the whole payload.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_summary_accepts_numeric_or_string_fields() {
        let numeric: OfferSummary =
            serde_json::from_str(r#"{"offer_id": 11369772, "flatshare_inhabitants_total": 3}"#)
                .unwrap();
        assert_eq!(numeric.offer_id, "11369772");
        assert_eq!(numeric.flatshare_total(), 3);

        let stringy: OfferSummary = serde_json::from_str(
            r#"{"offer_id": "11369772", "offer_title": "Helles Zimmer", "flatshare_inhabitants_total": "4"}"#,
        )
        .unwrap();
        assert_eq!(stringy.offer_id, "11369772");
        assert_eq!(stringy.offer_title.as_deref(), Some("Helles Zimmer"));
        assert_eq!(stringy.flatshare_total(), 4);
    }

    #[test]
    fn test_offer_summary_tolerates_missing_flatmate_count() {
        let offer: OfferSummary = serde_json::from_str(r#"{"offer_id": "1"}"#).unwrap();
        assert_eq!(offer.flatshare_inhabitants_total, None);
        assert_eq!(offer.flatshare_total(), 0);

        let junk: OfferSummary =
            serde_json::from_str(r#"{"offer_id": "1", "flatshare_inhabitants_total": "n/a"}"#)
                .unwrap();
        assert_eq!(junk.flatshare_total(), 0);
    }

    #[test]
    fn test_offer_filter_query_params_order() {
        let filter = OfferFilter::new("79")
            .max_rent(450)
            .min_size(12)
            .max_flatmates(5);
        let params = filter.query_params();
        let keys: Vec<&str> = params.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                "ad_type",
                "categories",
                "city_id",
                "noDeact",
                "img",
                "limit",
                "rMax",
                "sMin",
                "rent_types",
                "page"
            ]
        );
        assert_eq!(params[2], ("city_id", "79".to_string()));
        assert_eq!(params[6], ("rMax", "450".to_string()));
        assert_eq!(params[7], ("sMin", "12".to_string()));
        assert_eq!(params[9], ("page", "1".to_string()));
    }

    #[test]
    fn test_offer_filter_omits_unset_bounds() {
        let params = OfferFilter::new("79").query_params();
        assert!(!params.iter().any(|(k, _)| *k == "rMax" || *k == "sMin"));
    }

    #[test]
    fn test_offer_detail_description_joins_sections() {
        let detail = OfferDetail {
            offer_title: "Zimmer in Kreuzberg".into(),
            url: String::new(),
            freetext_property_description: "Helles Zimmer mit Balkon.".into(),
            freetext_area_description: "  ".into(),
            freetext_flatshare: "Wir sind eine 3er WG.".into(),
            freetext_other: String::new(),
        };
        assert_eq!(
            detail.description(),
            "Helles Zimmer mit Balkon.\n\nWir sind eine 3er WG."
        );
    }

    #[test]
    fn test_login_request_serializes_expected_fields() {
        let body = LoginRequest {
            login_email_username: "me@example.com",
            login_password: "hunter2",
            client_id: "wg_mobile_app",
            display_language: "de",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "login_email_username": "me@example.com",
                "login_password": "hunter2",
                "client_id": "wg_mobile_app",
                "display_language": "de",
            })
        );
    }

    #[test]
    fn test_contact_request_serializes_expected_fields() {
        let body = ContactRequest {
            user_id: "123456",
            ad_type: 0,
            ad_id: 11369772,
            messages: vec![OutboundMessage {
                content: "Hallo!",
                message_type: "text",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "user_id": "123456",
                "ad_type": 0,
                "ad_id": 11369772,
                "messages": [{"content": "Hallo!", "message_type": "text"}],
            })
        );
    }

    #[test]
    fn test_session_envelope_parses_login_response() {
        let raw = r#"{
            "detail": {
                "access_token": "at-1",
                "refresh_token": "rt-1",
                "user_id": 987654,
                "dev_ref_no": "dev-ref-1"
            }
        }"#;
        let envelope: SessionEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.detail.access_token, "at-1");
        assert_eq!(envelope.detail.user_id, "987654");
        assert_eq!(envelope.detail.dev_ref_no, "dev-ref-1");
    }

    #[test]
    fn test_refresh_envelope_tolerates_partial_detail() {
        let rotated: RefreshEnvelope = serde_json::from_str(
            r#"{"detail": {"access_token": "at-2", "refresh_token": "rt-2", "dev_ref_no": "dev-2"}}"#,
        )
        .unwrap();
        assert_eq!(rotated.detail.access_token, "at-2");
        assert_eq!(rotated.detail.refresh_token.as_deref(), Some("rt-2"));
        assert_eq!(rotated.detail.dev_ref_no.as_deref(), Some("dev-2"));

        let minimal: RefreshEnvelope =
            serde_json::from_str(r#"{"detail": {"access_token": "at-2"}}"#).unwrap();
        assert_eq!(minimal.detail.access_token, "at-2");
        assert!(minimal.detail.refresh_token.is_none());
        assert!(minimal.detail.dev_ref_no.is_none());
    }

    #[test]
    fn test_embedded_envelope_tolerates_missing_section() {
        let with: Embedded<CityResults> = serde_json::from_str(
            r#"{"_embedded": {"cities": [{"city_id": 79, "city_name": "Berlin"}]}}"#,
        )
        .unwrap();
        let cities = with.embedded.unwrap().cities.unwrap();
        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].city_id, "79");
        assert_eq!(cities[0].city_name, "Berlin");

        let without: Embedded<CityResults> = serde_json::from_str(r#"{"total": 0}"#).unwrap();
        assert!(without.embedded.is_none());

        let inner_missing: Embedded<CityResults> =
            serde_json::from_str(r#"{"_embedded": {"total": 0}}"#).unwrap();
        assert!(inner_missing.embedded.unwrap().cities.is_none());
    }
}
