use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;

pub const STATUS_SUCCESS: &str = "success";

/// Stored user record. `password_hash` is `None` for accounts created through
/// OAuth sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub email_verified: bool,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub email_verified: Option<bool>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.email_verified.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuery {
    pub page: i64,
    pub limit: i64,
    pub search: Option<String>,
}

impl UserQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            search: None,
        }
    }
}

/// Public view of a user; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub verified_email: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            verified_email: user.email_verified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: String,
    pub message: String,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub status: String,
    pub message: String,
    pub user: UserSummary,
}

impl UserResponse {
    pub fn success(message: impl Into<String>, user: &User) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: message.into(),
            user: user.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub status: String,
    pub message: String,
    pub results: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub total_results: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn success(message: impl Into<String>, results: Vec<T>, query: &UserQuery, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + query.limit - 1) / query.limit
        };

        Self {
            status: STATUS_SUCCESS.to_string(),
            message: message.into(),
            results,
            page: query.page,
            limit: query.limit,
            total_pages,
            total_results: total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_rounds_up() {
        let query = UserQuery {
            page: 2,
            limit: 10,
            search: None,
        };
        assert_eq!(query.offset(), 10);

        let page: PaginatedResponse<u8> = PaginatedResponse::success("ok", vec![], &query, 21);
        assert_eq!(page.total_pages, 3);

        let empty: PaginatedResponse<u8> = PaginatedResponse::success("ok", vec![], &query, 0);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn summary_hides_password_hash() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "fake name".into(),
            email: "fake@example.com".into(),
            password_hash: Some("$argon2id$secret".into()),
            role: Role::User,
            email_verified: true,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(UserSummary::from(&user)).expect("serialize");
        assert_eq!(json["role"], "user");
        assert_eq!(json["verified_email"], true);
        assert!(json.get("password_hash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }
}
