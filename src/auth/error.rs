use rocket::http::Status;
use thiserror::Error;

use crate::mailer::MailError;
use crate::store::StoreError;
use crate::validation::ValidationErrors;

pub type AuthResult<T> = Result<T, AuthError>;

/// Why the token codec rejected a token. Only ever logged; clients see a
/// generic message.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("signature does not verify")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token type does not match")]
    TypeMismatch,
    #[error("claims cannot be decoded")]
    Malformed,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Please authenticate")]
    Unauthenticated,
    #[error("Password reset failed")]
    ResetPasswordFailed,
    #[error("Verify email failed")]
    VerifyEmailFailed,
    #[error("States don't match")]
    OAuthStateMismatch,
    #[error("You don't have permission to access this resource")]
    Forbidden,
    #[error("Token not found")]
    TokenNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Email already taken")]
    EmailTaken,
    #[error("Bad Request")]
    Validation(ValidationErrors),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error("email delivery failed: {0}")]
    Email(#[from] MailError),
    #[error("oauth provider error: {0}")]
    OAuth(String),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::InvalidCredentials
            | AuthError::Unauthenticated
            | AuthError::ResetPasswordFailed
            | AuthError::VerifyEmailFailed
            | AuthError::OAuthStateMismatch => Status::Unauthorized,
            AuthError::Forbidden => Status::Forbidden,
            AuthError::TokenNotFound | AuthError::UserNotFound => Status::NotFound,
            AuthError::EmailTaken => Status::Conflict,
            AuthError::Validation(_) => Status::BadRequest,
            AuthError::Config(_)
            | AuthError::Store(_)
            | AuthError::Jwt(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::Email(_)
            | AuthError::OAuth(_) => Status::InternalServerError,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status() == Status::InternalServerError
    }

    /// Text safe to show a client. Internal failures never leak their detail.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}

impl From<ValidationErrors> for AuthError {
    fn from(errors: ValidationErrors) -> Self {
        AuthError::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_map_to_unauthorized() {
        for err in [
            AuthError::InvalidCredentials,
            AuthError::Unauthenticated,
            AuthError::ResetPasswordFailed,
            AuthError::VerifyEmailFailed,
        ] {
            assert_eq!(err.status(), Status::Unauthorized);
        }
    }

    #[test]
    fn internal_errors_hide_detail() {
        let err = AuthError::Config("JWT_SECRET is required".into());
        assert_eq!(err.status(), Status::InternalServerError);
        assert_eq!(err.public_message(), "Internal Server Error");

        let err = AuthError::EmailTaken;
        assert_eq!(err.public_message(), "Email already taken");
    }
}
