//! Static role table and the permission check behind [`Authorized`](crate::auth::Authorized).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, AuthResult};
use crate::models::User;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Admin => &[Permission::GetUsers, Permission::ManageUsers],
            Role::User => &[],
        }
    }

    pub fn has_all(&self, required: &[Permission]) -> bool {
        let granted = self.permissions();
        required.iter().all(|permission| granted.contains(permission))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    GetUsers,
    ManageUsers,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::GetUsers => "getUsers",
            Permission::ManageUsers => "manageUsers",
        }
    }
}

/// Permission set a route demands, expressed as a type so it can parameterize
/// a request guard.
pub trait RequiredPermissions {
    const PERMISSIONS: &'static [Permission];
}

pub struct CanGetUsers;

impl RequiredPermissions for CanGetUsers {
    const PERMISSIONS: &'static [Permission] = &[Permission::GetUsers];
}

pub struct CanManageUsers;

impl RequiredPermissions for CanManageUsers {
    const PERMISSIONS: &'static [Permission] = &[Permission::ManageUsers];
}

/// Allow when the role grants every required permission, or when `target`
/// names the caller's own account.
pub fn authorize(user: &User, required: &[Permission], target: Option<&str>) -> AuthResult<()> {
    if user.role.has_all(required) {
        return Ok(());
    }

    let own_id = user.id.to_string();
    match target {
        Some(target) if target.eq_ignore_ascii_case(&own_id) => Ok(()),
        _ => Err(AuthError::Forbidden),
    }
}
