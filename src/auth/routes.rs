use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::{Redirect, status};
use rocket::serde::json::Json;
use rocket::{Route, State, get, post, routes};
use time::Duration as TimeDuration;

use crate::auth::guards::AuthUser;
use crate::auth::oauth::{STATE_COOKIE, generate_state};
use crate::auth::responses::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, RefreshResponse, RefreshTokenRequest,
    RegisterRequest, ResetPasswordRequest,
};
use crate::auth::{AuthError, AuthService};
use crate::error::{ApiError, ApiResult};
use crate::models::MessageResponse;
use crate::validation::Validator;

#[post("/auth/register", data = "<payload>")]
pub async fn register(
    service: &State<AuthService>,
    payload: Json<RegisterRequest>,
) -> ApiResult<status::Custom<Json<AuthResponse>>> {
    let (user, tokens) = service.register(payload.into_inner()).await?;

    Ok(status::Custom(
        Status::Created,
        Json(AuthResponse::success("Register successfully", &user, tokens)),
    ))
}

#[post("/auth/login", data = "<payload>")]
pub async fn login(
    service: &State<AuthService>,
    payload: Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let (user, tokens) = service.login(payload.into_inner()).await?;
    Ok(Json(AuthResponse::success("Login successfully", &user, tokens)))
}

#[post("/auth/logout", data = "<payload>")]
pub async fn logout(
    service: &State<AuthService>,
    payload: Json<RefreshTokenRequest>,
) -> ApiResult<Json<MessageResponse>> {
    service.logout(payload.refresh_token.trim()).await?;
    Ok(Json(MessageResponse::success("Logout successfully")))
}

#[post("/auth/refresh-tokens", data = "<payload>")]
pub async fn refresh_tokens(
    service: &State<AuthService>,
    payload: Json<RefreshTokenRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let tokens = service.refresh_auth(payload.refresh_token.trim()).await?;
    Ok(Json(RefreshResponse::success(tokens)))
}

#[post("/auth/forgot-password", data = "<payload>")]
pub async fn forgot_password(
    service: &State<AuthService>,
    payload: Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    service.forgot_password(&payload.email).await?;
    Ok(Json(MessageResponse::success(
        "A password reset link has been sent to your email address.",
    )))
}

#[post("/auth/reset-password?<token>", data = "<payload>")]
pub async fn reset_password(
    service: &State<AuthService>,
    token: Option<&str>,
    payload: Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    service
        .reset_password(token.unwrap_or_default().trim(), &payload.password)
        .await?;
    Ok(Json(MessageResponse::success("Update password successfully")))
}

#[post("/auth/send-verification-email")]
pub async fn send_verification_email(
    service: &State<AuthService>,
    caller: AuthUser,
) -> ApiResult<Json<MessageResponse>> {
    service.send_verification_email(&caller.user).await?;
    Ok(Json(MessageResponse::success(
        "Please check your email for a link to verify your account",
    )))
}

#[post("/auth/verify-email?<token>")]
pub async fn verify_email(
    service: &State<AuthService>,
    token: Option<&str>,
) -> ApiResult<Json<MessageResponse>> {
    service.verify_email(token.unwrap_or_default().trim()).await?;
    Ok(Json(MessageResponse::success("Verify email successfully")))
}

#[get("/auth/google")]
pub async fn google_login(
    service: &State<AuthService>,
    cookies: &CookieJar<'_>,
) -> ApiResult<Redirect> {
    let provider = service.google().ok_or_else(google_not_configured)?;

    let state = generate_state();
    let url = provider.authorize_url(&state)?;

    let cookie = Cookie::build((STATE_COOKIE, state))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(service.config().cookie_secure)
        .max_age(TimeDuration::seconds(service.config().oauth_state_ttl_secs))
        .build();
    cookies.add(cookie);

    Ok(Redirect::to(url))
}

#[get("/auth/google-callback?<state>&<code>")]
pub async fn google_callback(
    service: &State<AuthService>,
    cookies: &CookieJar<'_>,
    state: Option<&str>,
    code: Option<&str>,
) -> ApiResult<Json<AuthResponse>> {
    let provider = service.google().ok_or_else(google_not_configured)?;

    let expected = cookies
        .get(STATE_COOKIE)
        .map(|cookie| cookie.value().to_string());
    cookies.remove(Cookie::build(STATE_COOKIE).path("/"));

    match (expected.as_deref(), state) {
        (Some(expected), Some(state)) if !expected.is_empty() && expected == state => {}
        _ => {
            log::debug!("oauth callback state does not match the cookie");
            return Err(AuthError::OAuthStateMismatch.into());
        }
    }

    let code = code.unwrap_or_default().trim();
    Validator::new().required("code", code).finish()?;

    let access_token = provider.exchange_code(code).await?;
    let profile = provider.fetch_profile(&access_token).await?;
    let (user, tokens) = service.oauth_login(profile).await?;

    Ok(Json(AuthResponse::success("Login successfully", &user, tokens)))
}

fn google_not_configured() -> ApiError {
    ApiError::NotFound("Google sign-in is not configured".to_string())
}

pub fn routes() -> Vec<Route> {
    routes![
        register,
        login,
        logout,
        refresh_tokens,
        forgot_password,
        reset_password,
        send_verification_email,
        verify_email,
        google_login,
        google_callback,
    ]
}
