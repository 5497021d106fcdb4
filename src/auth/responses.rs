use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::jwt::SignedToken;
use crate::models::{STATUS_SUCCESS, User, UserSummary};

// Request bodies default missing fields to empty strings so validation, not
// JSON decoding, reports them.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Body of both logout and refresh-tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenExpiry {
    pub token: String,
    pub expires: DateTime<Utc>,
}

impl From<SignedToken> for TokenExpiry {
    fn from(signed: SignedToken) -> Self {
        Self {
            token: signed.token,
            expires: signed.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access: TokenExpiry,
    pub refresh: TokenExpiry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub status: String,
    pub message: String,
    pub user: UserSummary,
    pub tokens: TokenPair,
}

impl AuthResponse {
    pub fn success(message: impl Into<String>, user: &User, tokens: TokenPair) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: message.into(),
            user: user.into(),
            tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub status: String,
    pub tokens: TokenPair,
}

impl RefreshResponse {
    pub fn success(tokens: TokenPair) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            tokens,
        }
    }
}
