//! Client for the WG-Gesucht mobile app REST API.
//!
//! There is no public API documentation. The endpoints, headers and
//! cookie conventions here mirror what the Android app sends, so the
//! requests are indistinguishable from the app's own traffic.

pub mod error;
pub mod types;

use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use error::{Result, WgError};
pub use types::{CityMatch, OfferDetail, OfferFilter, OfferSummary, Session};

use types::{
    CityResults, ContactRequest, ContactResponse, ConversationResults, Embedded, LoginRequest,
    OfferResults, OutboundMessage, RefreshEnvelope, RefreshRequest, SessionEnvelope,
};

pub const API_URL: &str = "https://www.wg-gesucht.de/api";
pub const APP_VERSION: &str = "1.28.0";
pub const APP_PACKAGE: &str = "com.wggesucht.android";
pub const CLIENT_ID: &str = "wg_mobile_app";
pub const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 6.0; Google Build/MRA58K; wv) AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/74.0.3729.186 Mobile Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the WG-Gesucht mobile API.
///
/// Construct one, call [`WgClient::login`] or [`WgClient::set_session`],
/// then use the listing and messaging operations. All authenticated
/// calls send the tokens both as headers and as cookies, exactly as the
/// mobile app does.
pub struct WgClient {
    client: reqwest::Client,
    session: Option<Session>,
    display_language: String,
}

impl WgClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            session: None,
            display_language: "de".to_string(),
        })
    }

    /// Sets the display language sent with login and conversation
    /// requests. Defaults to German.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.display_language = language.into();
        self
    }

    /// The current session tokens, if logged in.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Installs previously saved session tokens.
    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    fn require_session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(WgError::NotLoggedIn)
    }

    /// Cookie header in the order the app sends it. Empty values are
    /// skipped entirely rather than sent blank.
    fn cookie_header(&self) -> String {
        let session = self.session.as_ref();
        let mut parts: Vec<String> = Vec::new();
        if let Some(php) = session
            .map(|s| s.php_session_id.as_str())
            .filter(|v| !v.is_empty())
        {
            parts.push(format!("PHPSESSID={php}"));
        }
        parts.push(format!("X-Client-Id={CLIENT_ID}"));
        if let Some(token) = session
            .map(|s| s.refresh_token.as_str())
            .filter(|v| !v.is_empty())
        {
            parts.push(format!("X-Refresh-Token={token}"));
        }
        if let Some(token) = session
            .map(|s| s.access_token.as_str())
            .filter(|v| !v.is_empty())
        {
            parts.push(format!("X-Access-Token={token}"));
        }
        if let Some(dev_ref_no) = session
            .map(|s| s.dev_ref_no.as_str())
            .filter(|v| !v.is_empty())
        {
            parts.push(format!("X-Dev-Ref-No={dev_ref_no}"));
        }
        parts.join("; ")
    }

    /// Builds a request with the app's header set applied. Token headers
    /// are sent only when they have a value, like the cookie parts.
    /// Accept-Encoding is left to reqwest so response bodies stay
    /// auto-decompressed.
    fn request(&self, method: Method, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{API_URL}/{endpoint}");
        let session = self.session.as_ref();
        let access_token = session.map(|s| s.access_token.as_str()).unwrap_or_default();
        let mut builder = self
            .client
            .request(method, url)
            .header("X-App-Version", APP_VERSION)
            .header("User-Agent", USER_AGENT)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("X-Client-Id", CLIENT_ID);
        if !access_token.is_empty() {
            builder = builder.header("X-Authorization", format!("Bearer {access_token}"));
        }
        if let Some(user_id) = session.map(|s| s.user_id.as_str()).filter(|v| !v.is_empty()) {
            builder = builder.header("X-User-Id", user_id);
        }
        if let Some(dev_ref_no) = session
            .map(|s| s.dev_ref_no.as_str())
            .filter(|v| !v.is_empty())
        {
            builder = builder.header("X-Dev-Ref-No", dev_ref_no);
        }
        builder = builder
            .header("Cookie", self.cookie_header())
            .header("X-Requested-With", APP_PACKAGE);
        if access_token.is_empty() {
            // The app runs in a WebView and reports a file:// origin
            // until it holds an access token.
            builder = builder.header("Origin", "file://");
        }
        builder
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(WgError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Logs in with email and password, storing the returned tokens on
    /// the client and returning them for persistence.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<Session> {
        debug!(email, "logging in to WG-Gesucht");
        // A login is a fresh start. Dropping stale tokens first makes
        // the request go out unauthenticated, like the app's own login.
        self.session = None;
        let body = LoginRequest {
            login_email_username: email,
            login_password: password,
            client_id: CLIENT_ID,
            display_language: &self.display_language,
        };
        let response = self
            .request(Method::POST, "sessions")
            .json(&body)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        // The PHP session cookie arrives via Set-Cookie, not the body,
        // so it has to be captured before the body is consumed.
        let php_session_id = response
            .cookies()
            .find(|cookie| cookie.name() == "PHPSESSID")
            .map(|cookie| cookie.value().to_string())
            .unwrap_or_default();

        let envelope: SessionEnvelope = response
            .json()
            .await
            .map_err(|e| WgError::Parse(format!("login response: {e}")))?;
        let session = Session {
            access_token: envelope.detail.access_token,
            refresh_token: envelope.detail.refresh_token,
            user_id: envelope.detail.user_id,
            dev_ref_no: envelope.detail.dev_ref_no,
            php_session_id,
        };
        info!(user_id = %session.user_id, "logged in to WG-Gesucht");
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Exchanges the refresh token for a new access token, keeping the
    /// rest of the session intact. Returns the updated tokens.
    pub async fn refresh_session(&mut self) -> Result<Session> {
        let session = self.require_session()?.clone();
        debug!(user_id = %session.user_id, "refreshing WG-Gesucht session");
        let body = RefreshRequest {
            grant_type: "refresh_token",
            access_token: &session.access_token,
            refresh_token: &session.refresh_token,
            client_id: CLIENT_ID,
            dev_ref_no: &session.dev_ref_no,
            display_language: &self.display_language,
        };
        let endpoint = format!("sessions/users/{}", session.user_id);
        let response = self
            .request(Method::POST, &endpoint)
            .json(&body)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let envelope: RefreshEnvelope = response
            .json()
            .await
            .map_err(|e| WgError::Parse(format!("refresh response: {e}")))?;

        let mut refreshed = session;
        refreshed.access_token = envelope.detail.access_token;
        if let Some(token) = envelope.detail.refresh_token {
            refreshed.refresh_token = token;
        }
        if let Some(dev_ref_no) = envelope.detail.dev_ref_no {
            refreshed.dev_ref_no = dev_ref_no;
        }
        info!(user_id = %refreshed.user_id, "refreshed WG-Gesucht session");
        self.session = Some(refreshed.clone());
        Ok(refreshed)
    }

    /// Fetches the logged-in user's public profile.
    pub async fn my_profile(&self) -> Result<Value> {
        let session = self.require_session()?;
        let endpoint = format!("public/users/{}", session.user_id);
        let response = self.request(Method::GET, &endpoint).send().await?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| WgError::Parse(format!("profile response: {e}")))
    }

    /// Searches cities by name. WG-Gesucht expects the numeric city id
    /// in offer searches, which this lookup resolves.
    pub async fn find_cities(&self, query: &str) -> Result<Vec<CityMatch>> {
        debug!(query, "searching cities");
        let endpoint = format!("location/cities/names/{}", urlencoding::encode(query));
        let response = self.request(Method::GET, &endpoint).send().await?;
        let response = Self::check_status(response).await?;
        let envelope: Embedded<CityResults> = response
            .json()
            .await
            .map_err(|e| WgError::Parse(format!("city search response: {e}")))?;
        match envelope.embedded.and_then(|results| results.cities) {
            Some(cities) => Ok(cities),
            None => {
                warn!(query, "city search response had no _embedded.cities");
                Ok(Vec::new())
            }
        }
    }

    /// Searches offers matching the filter. The flatmate cap is applied
    /// client side because the API does not support it.
    pub async fn offers(&self, filter: &OfferFilter) -> Result<Vec<OfferSummary>> {
        debug!(city_id = %filter.city_id, page = filter.page, "searching offers");
        let response = self
            .request(Method::GET, "asset/offers/")
            .query(&filter.query_params())
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let envelope: Embedded<OfferResults> = response
            .json()
            .await
            .map_err(|e| WgError::Parse(format!("offer search response: {e}")))?;
        let offers = match envelope.embedded.and_then(|results| results.offers) {
            Some(offers) => offers,
            None => {
                warn!(city_id = %filter.city_id, "offer search response had no _embedded.offers");
                return Ok(Vec::new());
            }
        };
        let offers = match filter.max_flatmates {
            Some(max) => offers
                .into_iter()
                .filter(|offer| offer.flatshare_total() <= max)
                .collect(),
            None => offers,
        };
        Ok(offers)
    }

    /// Fetches the full details of one offer.
    pub async fn offer_detail(&self, offer_id: &str) -> Result<OfferDetail> {
        debug!(offer_id, "fetching offer detail");
        let endpoint = format!("public/offers/{offer_id}");
        let response = self.request(Method::GET, &endpoint).send().await?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| WgError::Parse(format!("offer detail response: {e}")))
    }

    /// Sends a contact message to an offer, opening a new conversation.
    /// Returns the messages of the created conversation.
    pub async fn contact_offer(&self, offer_id: &str, message: &str) -> Result<Vec<Value>> {
        let session = self.require_session()?;
        let ad_id: i64 = offer_id
            .trim()
            .parse()
            .map_err(|_| WgError::InvalidOfferId(offer_id.to_string()))?;
        debug!(offer_id, "contacting offer");
        let body = ContactRequest {
            user_id: &session.user_id,
            ad_type: 0,
            ad_id,
            messages: vec![OutboundMessage {
                content: message,
                message_type: "text",
            }],
        };
        let response = self
            .request(Method::POST, "conversations")
            .json(&body)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let contact: ContactResponse = response
            .json()
            .await
            .map_err(|e| WgError::Parse(format!("contact response: {e}")))?;
        info!(offer_id, "contact message sent");
        Ok(contact.messages)
    }

    /// Lists the user's conversation threads, most recent first.
    pub async fn conversations(&self, page: u32) -> Result<Vec<Value>> {
        let session = self.require_session()?;
        debug!(page, "fetching conversations");
        let endpoint = format!("conversations/user/{}", session.user_id);
        let params = [
            ("page", page.to_string()),
            ("limit", "25".to_string()),
            ("language", self.display_language.clone()),
            ("filter_type", "0".to_string()),
        ];
        let response = self
            .request(Method::GET, &endpoint)
            .query(&params)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let envelope: Embedded<ConversationResults> = response
            .json()
            .await
            .map_err(|e| WgError::Parse(format!("conversation list response: {e}")))?;
        match envelope.embedded.and_then(|results| results.conversations) {
            Some(conversations) => Ok(conversations),
            None => Err(WgError::Parse(
                "conversation list response had no _embedded.conversations".to_string(),
            )),
        }
    }

    /// Fetches one conversation thread with all its messages.
    pub async fn conversation_detail(&self, conversation_id: &str) -> Result<Value> {
        let session = self.require_session()?;
        debug!(conversation_id, "fetching conversation detail");
        let endpoint = format!("conversations/{}/user/{}", conversation_id, session.user_id);
        let params = [("language", self.display_language.clone())];
        let response = self
            .request(Method::GET, &endpoint)
            .query(&params)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| WgError::Parse(format!("conversation detail response: {e}")))
    }
}
