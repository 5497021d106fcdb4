use std::fmt;
use std::str::FromStr;

use base64::Engine;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::error::TokenError;
use crate::auth::{AuthConfig, AuthError, AuthResult};

/// Purpose tag carried in the `type` claim. One secret signs every type; the
/// tag is what keeps a refresh token from being accepted as an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
    ResetPassword,
    VerifyEmail,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
            TokenType::ResetPassword => "reset_password",
            TokenType::VerifyEmail => "verify_email",
        }
    }

    /// Access tokens live only with the client; every other type has a ledger row.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, TokenType::Access)
    }
}

impl FromStr for TokenType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(TokenType::Access),
            "refresh" => Ok(TokenType::Refresh),
            "reset_password" => Ok(TokenType::ResetPassword),
            "verify_email" => Ok(TokenType::VerifyEmail),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: String,
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        if config.jwt_secret.is_empty() {
            return Err(AuthError::Config("jwt secret must not be empty".into()));
        }

        let secret_bytes = config.jwt_secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret_bytes),
            decoding_key: DecodingKey::from_secret(secret_bytes),
            validation,
        })
    }

    /// Sign `{sub, iat, exp, type, jti}`. Past expiries are allowed; parsing
    /// such a token fails with [`TokenError::Expired`].
    pub fn mint(
        &self,
        subject: Uuid,
        expires_at: DateTime<Utc>,
        token_type: TokenType,
    ) -> AuthResult<SignedToken> {
        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
            token_type: token_type.as_str().to_string(),
            jti: token_id(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(SignedToken { token, expires_at })
    }

    pub fn parse(&self, token: &str, expected: TokenType) -> Result<Uuid, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(
            |err| match err.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            },
        )?;

        if data.claims.token_type != expected.as_str() {
            return Err(TokenError::TypeMismatch);
        }

        data.claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| TokenError::Malformed)
    }
}

/// 8 random bytes, URL-safe base64. Keeps tokens minted in the same second
/// distinct while every token type stays within `TOKEN_MAX`.
fn token_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
