use std::marker::PhantomData;

use rocket::Request;
use rocket::State;
use rocket::request::{FromRequest, Outcome};

use crate::auth::roles::{RequiredPermissions, authorize};
use crate::auth::{AuthError, AuthResult, AuthService};
use crate::models::User;

/// Caller resolved from a valid bearer access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_user(request).await {
            Ok(user) => Outcome::Success(AuthUser { user }),
            Err(err) => reject(err),
        }
    }
}

/// Authenticated caller whose role grants every permission in `P`. A caller
/// lacking them still passes when the first dynamic path segment is their own
/// user id.
#[derive(Debug, Clone)]
pub struct Authorized<P> {
    pub user: User,
    _marker: PhantomData<fn() -> P>,
}

#[rocket::async_trait]
impl<'r, P> FromRequest<'r> for Authorized<P>
where
    P: RequiredPermissions + Send + Sync + 'static,
{
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let user = match extract_user(request).await {
            Ok(user) => user,
            Err(err) => return reject(err),
        };

        match authorize(&user, P::PERMISSIONS, first_dynamic_segment(request)) {
            Ok(()) => Outcome::Success(Authorized {
                user,
                _marker: PhantomData,
            }),
            Err(err) => {
                log::debug!(
                    "user {} ({}) denied {:?} on {}",
                    user.id,
                    user.role.as_str(),
                    P::PERMISSIONS,
                    request.uri()
                );
                reject(err)
            }
        }
    }
}

/// Value of the route's first `<param>` segment, e.g. the id in `/users/<user_id>`.
fn first_dynamic_segment<'r>(request: &'r Request<'_>) -> Option<&'r str> {
    let route = request.route()?;
    let index = route
        .uri
        .unmounted_origin
        .path()
        .segments()
        .position(|segment| segment.starts_with('<'))?;
    request.routed_segment(index)
}

fn reject<T>(err: AuthError) -> Outcome<T, AuthError> {
    if err.is_internal() {
        log::error!("request guard failed: {}", err);
    }
    Outcome::Error((err.status(), err))
}

async fn extract_user(request: &Request<'_>) -> AuthResult<User> {
    let token = bearer_token_from_request(request)?;

    let service = request
        .guard::<&State<AuthService>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Config("AuthService missing from state".into()))?;

    service.authenticate(token).await
}

fn bearer_token_from_request<'a>(request: &'a Request<'_>) -> AuthResult<&'a str> {
    let header = request
        .headers()
        .get_one("Authorization")
        .ok_or(AuthError::Unauthenticated)?;
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() {
        Ok(token)
    } else {
        Err(AuthError::Unauthenticated)
    }
}
