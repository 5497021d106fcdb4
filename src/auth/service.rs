use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::jwt::TokenType;
use crate::auth::ledger::TokenLedger;
use crate::auth::oauth::{OAuthProfile, OAuthProvider};
use crate::auth::responses::{LoginRequest, RegisterRequest, TokenPair};
use crate::auth::{AuthConfig, AuthError, AuthResult, JwtService, PasswordService, Role};
use crate::mailer::{Email, EmailSender};
use crate::models::{NewUser, User, UserChanges};
use crate::store::{StoreError, UserStore};
use crate::validation::{EMAIL_MAX, NAME_MAX, TOKEN_MAX, Validator};

/// Orchestrates the credential lifecycle over the user store and the token
/// ledger. Cheap to clone; every collaborator sits behind an `Arc`.
#[derive(Clone)]
pub struct AuthService {
    config: Arc<AuthConfig>,
    passwords: Arc<PasswordService>,
    jwt: Arc<JwtService>,
    users: Arc<dyn UserStore>,
    ledger: Arc<dyn TokenLedger>,
    mailer: Arc<dyn EmailSender>,
    google: Option<Arc<dyn OAuthProvider>>,
}

impl AuthService {
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserStore>,
        ledger: Arc<dyn TokenLedger>,
        mailer: Arc<dyn EmailSender>,
    ) -> AuthResult<Self> {
        let jwt = JwtService::from_config(&config)?;
        let passwords = PasswordService::new()?;

        Ok(Self {
            config: Arc::new(config),
            passwords: Arc::new(passwords),
            jwt: Arc::new(jwt),
            users,
            ledger,
            mailer,
            google: None,
        })
    }

    pub fn with_google(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.google = Some(provider);
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub fn passwords(&self) -> Arc<PasswordService> {
        Arc::clone(&self.passwords)
    }

    pub fn users(&self) -> Arc<dyn UserStore> {
        Arc::clone(&self.users)
    }

    pub fn ledger(&self) -> Arc<dyn TokenLedger> {
        Arc::clone(&self.ledger)
    }

    pub fn google(&self) -> Option<Arc<dyn OAuthProvider>> {
        self.google.clone()
    }

    pub async fn register(&self, request: RegisterRequest) -> AuthResult<(User, TokenPair)> {
        let email = request.email.trim().to_string();
        let name = request.name.trim().to_string();

        Validator::new()
            .required("name", &name)
            .max_len("name", &name, NAME_MAX)
            .required("email", &email)
            .email("email", &email)
            .max_len("email", &email, EMAIL_MAX)
            .required("password", &request.password)
            .password("password", &request.password)
            .finish()?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.passwords.hash_password(&request.password)?;
        let user = self
            .users
            .create(NewUser {
                name,
                email,
                password_hash: Some(password_hash),
                role: Role::User,
                email_verified: false,
            })
            .await
            .map_err(|err| match err {
                StoreError::DuplicateEmail => AuthError::EmailTaken,
                other => AuthError::Store(other),
            })?;

        log::info!("registered user {}", user.id);
        let tokens = self.issue_token_pair(&user).await?;
        Ok((user, tokens))
    }

    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, request: LoginRequest) -> AuthResult<(User, TokenPair)> {
        let email = request.email.trim();

        Validator::new()
            .required("email", email)
            .email("email", email)
            .max_len("email", email, EMAIL_MAX)
            .required("password", &request.password)
            .finish()?;

        let user = self.users.find_by_email(email).await?;
        let stored_hash = user.as_ref().and_then(|u| u.password_hash.as_deref());
        let verified = self
            .passwords
            .verify_optional(&request.password, stored_hash)?;

        match user {
            Some(user) if verified => {
                let tokens = self.issue_token_pair(&user).await?;
                Ok((user, tokens))
            }
            _ => {
                log::debug!("login rejected for {}", email);
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        validate_token_field("refresh_token", refresh_token)?;

        let user_id = self
            .live_subject(refresh_token, TokenType::Refresh)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        self.ledger.revoke(user_id, TokenType::Refresh).await?;
        Ok(())
    }

    /// Rotate: the presented refresh token is replaced by the new one.
    pub async fn refresh_auth(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        validate_token_field("refresh_token", refresh_token)?;

        let user_id = self
            .live_subject(refresh_token, TokenType::Refresh)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        self.issue_token_pair(&user).await
    }

    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        let email = email.trim();
        Validator::new()
            .required("email", email)
            .email("email", email)
            .max_len("email", email, EMAIL_MAX)
            .finish()?;

        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token = self.issue_ledger_token(&user, TokenType::ResetPassword).await?;
        let message = Email::reset_password(&self.config.app_url, &token);
        self.mailer
            .send(&user.email, &message.subject, &message.body)
            .await?;
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<()> {
        Validator::new()
            .required("token", token)
            .max_len("token", token, TOKEN_MAX)
            .required("password", new_password)
            .password("password", new_password)
            .finish()?;

        let user_id = self
            .live_subject(token, TokenType::ResetPassword)
            .await?
            .ok_or(AuthError::ResetPasswordFailed)?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::ResetPasswordFailed)?;

        let password_hash = self.passwords.hash_password(new_password)?;
        self.users
            .update(
                user.id,
                UserChanges {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AuthError::ResetPasswordFailed)?;

        self.ledger.revoke(user.id, TokenType::ResetPassword).await?;
        log::info!("password reset for user {}", user.id);
        Ok(())
    }

    pub async fn send_verification_email(&self, user: &User) -> AuthResult<()> {
        let token = self.issue_ledger_token(user, TokenType::VerifyEmail).await?;
        let message = Email::verification(&self.config.app_url, &token);
        self.mailer
            .send(&user.email, &message.subject, &message.body)
            .await?;
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> AuthResult<()> {
        validate_token_field("token", token)?;

        let user_id = self
            .live_subject(token, TokenType::VerifyEmail)
            .await?
            .ok_or(AuthError::VerifyEmailFailed)?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::VerifyEmailFailed)?;

        self.ledger.revoke(user.id, TokenType::VerifyEmail).await?;
        self.users
            .update(
                user.id,
                UserChanges {
                    email_verified: Some(true),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AuthError::VerifyEmailFailed)?;

        log::info!("verified email for user {}", user.id);
        Ok(())
    }

    /// Sign in with an identity vouched for by an OAuth provider, creating the
    /// account on first use.
    pub async fn oauth_login(&self, profile: OAuthProfile) -> AuthResult<(User, TokenPair)> {
        let email = profile.email.trim().to_string();
        let name = match profile.name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            name => name.chars().take(NAME_MAX).collect(),
        };

        Validator::new()
            .required("email", &email)
            .email("email", &email)
            .max_len("email", &email, EMAIL_MAX)
            .finish()?;

        let user = match self.users.find_by_email(&email).await? {
            None => {
                let created = self
                    .users
                    .create(NewUser {
                        name,
                        email,
                        password_hash: None,
                        role: Role::User,
                        email_verified: true,
                    })
                    .await?;
                log::info!("created user {} from oauth sign-in", created.id);
                created
            }
            Some(existing) => {
                let verified = existing.email_verified || profile.verified_email;
                if verified == existing.email_verified {
                    existing
                } else {
                    self.users
                        .update(
                            existing.id,
                            UserChanges {
                                email_verified: Some(verified),
                                ..Default::default()
                            },
                        )
                        .await?
                        .ok_or(AuthError::UserNotFound)?
                }
            }
        };

        let tokens = self.issue_token_pair(&user).await?;
        Ok((user, tokens))
    }

    /// Mint an access token (never stored) and a refresh token that replaces
    /// the user's previous one in the ledger.
    pub async fn issue_token_pair(&self, user: &User) -> AuthResult<TokenPair> {
        let now = Utc::now();
        let access = self.jwt.mint(
            user.id,
            self.config.expiry_for(TokenType::Access, now)?,
            TokenType::Access,
        )?;
        let refresh = self.jwt.mint(
            user.id,
            self.config.expiry_for(TokenType::Refresh, now)?,
            TokenType::Refresh,
        )?;

        self.ledger
            .issue(user.id, TokenType::Refresh, &refresh.token, refresh.expires_at)
            .await?;

        Ok(TokenPair {
            access: access.into(),
            refresh: refresh.into(),
        })
    }

    /// Resolve a bearer access token to its user.
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<User> {
        let user_id = match self.jwt.parse(access_token, TokenType::Access) {
            Ok(user_id) => user_id,
            Err(err) => {
                log::debug!("rejected access token: {}", err);
                return Err(AuthError::Unauthenticated);
            }
        };

        match self.users.find_by_id(user_id).await? {
            Some(user) => Ok(user),
            None => {
                log::debug!("access token subject {} no longer exists", user_id);
                Err(AuthError::Unauthenticated)
            }
        }
    }

    async fn issue_ledger_token(&self, user: &User, token_type: TokenType) -> AuthResult<String> {
        let signed = self.jwt.mint(
            user.id,
            self.config.expiry_for(token_type, Utc::now())?,
            token_type,
        )?;
        self.ledger
            .issue(user.id, token_type, &signed.token, signed.expires_at)
            .await?;
        Ok(signed.token)
    }

    /// Subject of `token` if it verifies as `token_type` and its ledger record
    /// is still there, unexpired, and owned by that subject.
    async fn live_subject(&self, token: &str, token_type: TokenType) -> AuthResult<Option<Uuid>> {
        let user_id = match self.jwt.parse(token, token_type) {
            Ok(user_id) => user_id,
            Err(err) => {
                log::debug!("rejected {} token: {}", token_type, err);
                return Ok(None);
            }
        };

        match self.ledger.lookup(token).await? {
            Some(record)
                if record.user_id == user_id
                    && record.token_type == token_type
                    && record.is_live_at(Utc::now()) =>
            {
                Ok(Some(user_id))
            }
            Some(_) => {
                log::debug!("{} token record does not match its claims", token_type);
                Ok(None)
            }
            None => {
                log::debug!("{} token for user {} is not in the ledger", token_type, user_id);
                Ok(None)
            }
        }
    }
}

fn validate_token_field(field: &str, value: &str) -> AuthResult<()> {
    Validator::new()
        .required(field, value)
        .max_len(field, value, TOKEN_MAX)
        .finish()?;
    Ok(())
}
