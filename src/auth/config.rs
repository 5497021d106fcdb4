use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::auth::jwt::TokenType;
use crate::auth::{AuthError, AuthResult};

/// Google sign-in credentials. Present only when all three variables are set.
#[derive(Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl fmt::Debug for GoogleOAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleOAuthConfig")
            .field("client_id", &self.client_id)
            .field("redirect_url", &self.redirect_url)
            .finish_non_exhaustive()
    }
}

/// Authentication configuration loaded from environment variables.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_ttl_mins: i64,
    pub refresh_token_ttl_days: i64,
    pub reset_password_ttl_mins: i64,
    pub verify_email_ttl_mins: i64,
    pub app_url: String,
    pub email_from: String,
    pub google: Option<GoogleOAuthConfig>,
    pub oauth_state_ttl_secs: i64,
    pub cookie_secure: bool,
}

impl AuthConfig {
    /// Defaults for everything except the signing secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_token_ttl_mins: 30,
            refresh_token_ttl_days: 30,
            reset_password_ttl_mins: 10,
            verify_email_ttl_mins: 10,
            app_url: "http://localhost:3000".into(),
            email_from: "noreply@localhost".into(),
            google: None,
            oauth_state_ttl_secs: 300,
            cookie_secure: true,
        }
    }

    pub fn from_env() -> AuthResult<Self> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|secret| !secret.trim().is_empty())
            .ok_or_else(|| AuthError::Config("JWT_SECRET is required".into()))?;

        let defaults = Self::new(jwt_secret);

        let google = match (
            std::env::var("GOOGLE_CLIENT_ID"),
            std::env::var("GOOGLE_CLIENT_SECRET"),
            std::env::var("GOOGLE_REDIRECT_URL"),
        ) {
            (Ok(client_id), Ok(client_secret), Ok(redirect_url)) => Some(GoogleOAuthConfig {
                client_id,
                client_secret,
                redirect_url,
            }),
            _ => None,
        };

        let config = Self {
            access_token_ttl_mins: env_i64("JWT_ACCESS_EXP_MINUTES", defaults.access_token_ttl_mins),
            refresh_token_ttl_days: env_i64("JWT_REFRESH_EXP_DAYS", defaults.refresh_token_ttl_days),
            reset_password_ttl_mins: env_i64(
                "JWT_RESET_PASSWORD_EXP_MINUTES",
                defaults.reset_password_ttl_mins,
            ),
            verify_email_ttl_mins: env_i64(
                "JWT_VERIFY_EMAIL_EXP_MINUTES",
                defaults.verify_email_ttl_mins,
            ),
            app_url: std::env::var("APP_URL").unwrap_or(defaults.app_url.clone()),
            email_from: std::env::var("EMAIL_FROM").unwrap_or(defaults.email_from.clone()),
            google,
            oauth_state_ttl_secs: env_i64("OAUTH_STATE_TTL_SECS", defaults.oauth_state_ttl_secs),
            cookie_secure: std::env::var("COOKIE_SECURE")
                .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "on"))
                .unwrap_or(defaults.cookie_secure),
            ..defaults
        };

        for token_type in [
            TokenType::Access,
            TokenType::Refresh,
            TokenType::ResetPassword,
            TokenType::VerifyEmail,
        ] {
            config.ttl_for(token_type)?;
        }

        Ok(config)
    }

    /// Lifetime of a freshly minted token of the given type. Fails when the
    /// configured value does not fit a `chrono` duration.
    pub fn ttl_for(&self, token_type: TokenType) -> AuthResult<Duration> {
        let ttl = match token_type {
            TokenType::Access => Duration::try_minutes(self.access_token_ttl_mins),
            TokenType::Refresh => Duration::try_days(self.refresh_token_ttl_days),
            TokenType::ResetPassword => Duration::try_minutes(self.reset_password_ttl_mins),
            TokenType::VerifyEmail => Duration::try_minutes(self.verify_email_ttl_mins),
        };
        ttl.ok_or_else(|| AuthError::Config(format!("{token_type} token lifetime is out of range")))
    }

    /// Expiry of a token of the given type minted at `now`.
    pub fn expiry_for(&self, token_type: TokenType, now: DateTime<Utc>) -> AuthResult<DateTime<Utc>> {
        now.checked_add_signed(self.ttl_for(token_type)?)
            .ok_or_else(|| AuthError::Config(format!("{token_type} token expiry is out of range")))
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_ttl_mins", &self.access_token_ttl_mins)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("reset_password_ttl_mins", &self.reset_password_ttl_mins)
            .field("verify_email_ttl_mins", &self.verify_email_ttl_mins)
            .field("app_url", &self.app_url)
            .field("email_from", &self.email_from)
            .field("google", &self.google)
            .field("oauth_state_ttl_secs", &self.oauth_state_ttl_secs)
            .field("cookie_secure", &self.cookie_secure)
            .finish_non_exhaustive()
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_defaults_follow_token_type() {
        let config = AuthConfig::new("secret");
        assert_eq!(config.ttl_for(TokenType::Access).ok(), Some(Duration::minutes(30)));
        assert_eq!(config.ttl_for(TokenType::Refresh).ok(), Some(Duration::days(30)));
        assert_eq!(config.ttl_for(TokenType::ResetPassword).ok(), Some(Duration::minutes(10)));
        assert_eq!(config.ttl_for(TokenType::VerifyEmail).ok(), Some(Duration::minutes(10)));
    }

    #[test]
    fn oversized_lifetimes_are_config_errors() {
        let mut config = AuthConfig::new("secret");
        config.refresh_token_ttl_days = 9_000_000_000_000;
        config.verify_email_ttl_mins = i64::MAX;

        assert!(matches!(config.ttl_for(TokenType::Refresh), Err(AuthError::Config(_))));
        assert!(matches!(
            config.expiry_for(TokenType::Refresh, Utc::now()),
            Err(AuthError::Config(_))
        ));
        assert!(matches!(
            config.expiry_for(TokenType::VerifyEmail, Utc::now()),
            Err(AuthError::Config(_))
        ));
        assert!(config.expiry_for(TokenType::Access, Utc::now()).is_ok());
    }

    #[test]
    fn expiry_that_overflows_the_calendar_is_rejected() {
        let mut config = AuthConfig::new("secret");
        config.refresh_token_ttl_days = 100_000_000;

        assert!(config.ttl_for(TokenType::Refresh).is_ok());
        assert!(matches!(
            config.expiry_for(TokenType::Refresh, Utc::now()),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn debug_output_omits_secret() {
        let config = AuthConfig::new("do-not-print-me");
        assert!(!format!("{config:?}").contains("do-not-print-me"));
    }
}
