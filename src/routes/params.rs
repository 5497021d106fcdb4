//! Query parameter helpers for the user listing.

use rocket::FromForm;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::UserQuery;

const fn default_page() -> i64 {
    1
}

const fn default_limit() -> i64 {
    10
}

/// `?page&limit&search`. Unparseable numbers read as absent and fall back to
/// the defaults; range checks happen in the user service.
#[derive(Debug, Clone, Default, FromForm)]
pub struct ListUsersParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

impl ListUsersParams {
    pub fn into_query(self) -> UserQuery {
        let search = self
            .search
            .map(|search| search.trim().to_string())
            .filter(|search| !search.is_empty());

        UserQuery {
            page: self.page.unwrap_or(default_page()),
            limit: self.limit.unwrap_or(default_limit()),
            search,
        }
    }
}

pub fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest("Invalid user ID".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_params_use_defaults() {
        let query = ListUsersParams::default().into_query();
        assert_eq!(query, UserQuery::default());
    }

    #[test]
    fn blank_search_is_dropped() {
        let query = ListUsersParams {
            search: Some("   ".into()),
            ..Default::default()
        }
        .into_query();
        assert!(query.search.is_none());
    }

    #[test]
    fn user_ids_must_be_uuids() {
        assert!(parse_user_id("not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&id.to_string()).expect("valid id"), id);
    }
}
