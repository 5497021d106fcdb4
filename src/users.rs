//! Role-gated user administration behind the `/users` routes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthService, PasswordService, Role, TokenLedger};
use crate::error::{ApiError, ApiResult};
use crate::models::{NewUser, User, UserChanges, UserQuery};
use crate::store::UserStore;
use crate::validation::{EMAIL_MAX, NAME_MAX, Validator};

const PAGE_MAX: i64 = 50;
const LIMIT_MAX: i64 = 50;
const SEARCH_MAX: usize = 50;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    ledger: Arc<dyn TokenLedger>,
    passwords: Arc<PasswordService>,
}

impl UserService {
    /// Shares the auth service's stores and hasher.
    pub fn new(auth: &AuthService) -> Self {
        Self {
            users: auth.users(),
            ledger: auth.ledger(),
            passwords: auth.passwords(),
        }
    }

    pub async fn list(&self, query: &UserQuery) -> ApiResult<(Vec<User>, i64)> {
        let mut validator = Validator::new();
        validator
            .range("page", query.page, 1, PAGE_MAX)
            .range("limit", query.limit, 1, LIMIT_MAX);
        if let Some(search) = &query.search {
            validator.max_len("search", search, SEARCH_MAX);
        }
        validator.finish()?;

        Ok(self.users.list(query).await?)
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<User> {
        self.users.find_by_id(id).await?.ok_or_else(user_not_found)
    }

    pub async fn create(&self, request: CreateUserRequest) -> ApiResult<User> {
        let name = request.name.trim().to_string();
        let email = request.email.trim().to_string();

        Validator::new()
            .required("name", &name)
            .max_len("name", &name, NAME_MAX)
            .required("email", &email)
            .email("email", &email)
            .max_len("email", &email, EMAIL_MAX)
            .required("password", &request.password)
            .password("password", &request.password)
            .required("role", &request.role)
            .one_of("role", &request.role, &[Role::User.as_str(), Role::Admin.as_str()])
            .finish()?;

        let role = request
            .role
            .parse::<Role>()
            .map_err(|()| ApiError::BadRequest("Invalid value for field role".to_string()))?;
        let password_hash = self.passwords.hash_password(&request.password)?;

        let user = self
            .users
            .create(NewUser {
                name,
                email,
                password_hash: Some(password_hash),
                role,
                email_verified: false,
            })
            .await?;

        log::info!("created user {} with role {}", user.id, role.as_str());
        Ok(user)
    }

    pub async fn update(&self, id: Uuid, request: UpdateUserRequest) -> ApiResult<User> {
        let name = request.name.as_deref().map(str::trim);
        let email = request.email.as_deref().map(str::trim);

        if name.is_none() && email.is_none() && request.password.is_none() {
            return Err(ApiError::BadRequest("Invalid Request".to_string()));
        }

        let mut validator = Validator::new();
        if let Some(name) = name {
            validator
                .required("name", name)
                .max_len("name", name, NAME_MAX);
        }
        if let Some(email) = email {
            validator
                .required("email", email)
                .email("email", email)
                .max_len("email", email, EMAIL_MAX);
        }
        if let Some(password) = &request.password {
            validator.password("password", password);
        }
        validator.finish()?;

        let password_hash = request
            .password
            .as_deref()
            .map(|password| self.passwords.hash_password(password))
            .transpose()?;

        let changes = UserChanges {
            name: name.map(str::to_string),
            email: email.map(str::to_string),
            password_hash,
            email_verified: None,
        };

        self.users
            .update(id, changes)
            .await?
            .ok_or_else(user_not_found)
    }

    /// Revokes every outstanding token before removing the record.
    pub async fn delete(&self, id: Uuid) -> ApiResult<()> {
        if self.users.find_by_id(id).await?.is_none() {
            return Err(user_not_found());
        }

        let revoked = self.ledger.revoke_all(id).await?;
        if !self.users.delete(id).await? {
            return Err(user_not_found());
        }

        log::info!("deleted user {} and {} outstanding tokens", id, revoked);
        Ok(())
    }
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenType;
    use crate::auth::{AuthConfig, MemoryTokenLedger};
    use crate::mailer::LogMailer;
    use crate::store::MemoryUserStore;
    use chrono::{Duration, Utc};

    fn service() -> (UserService, Arc<MemoryTokenLedger>) {
        let ledger = Arc::new(MemoryTokenLedger::new());
        let auth = AuthService::new(
            AuthConfig::new("users-test-secret"),
            Arc::new(MemoryUserStore::new()),
            ledger.clone(),
            Arc::new(LogMailer::new("noreply@localhost")),
        )
        .expect("auth service");
        (UserService::new(&auth), ledger)
    }

    fn create_request(email: &str, role: &str) -> CreateUserRequest {
        CreateUserRequest {
            name: "fake name".into(),
            email: email.into(),
            password: "password1".into(),
            role: role.into(),
        }
    }

    #[tokio::test]
    async fn create_rejects_unknown_role() {
        let (users, _) = service();
        let err = users
            .create(create_request("fake@example.com", "superuser"))
            .await
            .expect_err("bad role");
        match err {
            ApiError::Validation(errors) => assert!(errors.get("role").is_some()),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_conflicts_on_duplicate_email() {
        let (users, _) = service();
        users
            .create(create_request("fake@example.com", "admin"))
            .await
            .expect("create");
        let err = users
            .create(create_request("fake@example.com", "user"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, ApiError::Conflict(msg) if msg == "Email is already in use"));
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let (users, _) = service();
        let user = users
            .create(create_request("fake@example.com", "user"))
            .await
            .expect("create");
        let err = users
            .update(user.id, UpdateUserRequest::default())
            .await
            .expect_err("nothing to change");
        assert!(matches!(err, ApiError::BadRequest(msg) if msg == "Invalid Request"));
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let (users, _) = service();
        let user = users
            .create(create_request("fake@example.com", "user"))
            .await
            .expect("create");

        let updated = users
            .update(
                user.id,
                UpdateUserRequest {
                    name: Some("renamed".into()),
                    ..Default::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.email, user.email);
        assert_eq!(updated.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn update_missing_user_is_not_found() {
        let (users, _) = service();
        let err = users
            .update(
                Uuid::new_v4(),
                UpdateUserRequest {
                    name: Some("ghost".into()),
                    ..Default::default()
                },
            )
            .await
            .expect_err("missing");
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_revokes_outstanding_tokens() {
        let (users, ledger) = service();
        let user = users
            .create(create_request("fake@example.com", "user"))
            .await
            .expect("create");
        let later = Utc::now() + Duration::days(1);
        ledger
            .issue(user.id, TokenType::Refresh, "refresh", later)
            .await
            .expect("issue");
        ledger
            .issue(user.id, TokenType::ResetPassword, "reset", later)
            .await
            .expect("issue");

        users.delete(user.id).await.expect("delete");
        assert!(ledger.is_empty());
        assert!(matches!(users.get(user.id).await, Err(ApiError::NotFound(_))));
        assert!(matches!(users.delete(user.id).await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_checks_paging_bounds() {
        let (users, _) = service();
        let err = users
            .list(&UserQuery {
                page: 0,
                limit: 51,
                search: None,
            })
            .await
            .expect_err("out of range");
        match err {
            ApiError::Validation(errors) => {
                assert!(errors.get("page").is_some());
                assert!(errors.get("limit").is_some());
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
