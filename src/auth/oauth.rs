use std::time::Duration;

use base64::Engine;
use rand::RngCore;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::auth::config::GoogleOAuthConfig;
use crate::auth::{AuthError, AuthResult};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const GOOGLE_SCOPES: &str =
    "https://www.googleapis.com/auth/userinfo.email https://www.googleapis.com/auth/userinfo.profile";

pub const STATE_COOKIE: &str = "oauth_state";

/// Identity the provider vouches for after a successful exchange.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OAuthProfile {
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub verified_email: bool,
}

#[rocket::async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Consent page the browser is sent to; `state` comes back on the callback.
    fn authorize_url(&self, state: &str) -> AuthResult<String>;
    async fn exchange_code(&self, code: &str) -> AuthResult<String>;
    async fn fetch_profile(&self, access_token: &str) -> AuthResult<OAuthProfile>;
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

pub struct GoogleProvider {
    config: GoogleOAuthConfig,
    http: Client,
}

impl GoogleProvider {
    pub fn new(config: GoogleOAuthConfig) -> AuthResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|err| AuthError::OAuth(format!("failed to build http client: {err}")))?;

        Ok(Self { config, http })
    }
}

#[rocket::async_trait]
impl OAuthProvider for GoogleProvider {
    fn authorize_url(&self, state: &str) -> AuthResult<String> {
        let url = Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", GOOGLE_SCOPES),
                ("access_type", "online"),
                ("state", state),
            ],
        )
        .map_err(|err| AuthError::OAuth(format!("invalid authorize url: {err}")))?;

        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> AuthResult<String> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_url.as_str()),
        ];

        let response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|err| AuthError::OAuth(format!("token exchange failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::OAuth(format!("token exchange HTTP {status}: {body}")));
        }

        let token = response
            .json::<GoogleTokenResponse>()
            .await
            .map_err(|err| AuthError::OAuth(format!("token response parse error: {err}")))?;

        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> AuthResult<OAuthProfile> {
        let response = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| AuthError::OAuth(format!("userinfo request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::OAuth(format!("userinfo HTTP {status}: {body}")));
        }

        response
            .json::<OAuthProfile>()
            .await
            .map_err(|err| AuthError::OAuth(format!("userinfo parse error: {err}")))
    }
}

/// Random value for the `state` round trip.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
