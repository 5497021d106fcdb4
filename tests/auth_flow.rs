use auth_server::auth::{OAuthProfile, Role, TokenType};
use auth_server::test_support::{MemoryBackend, StubOAuthProvider, TEST_PASSWORD};
use auth_server::validation::TOKEN_MAX;
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use serde_json::{Value, json};

async fn post_json(client: &Client, uri: &str, body: Value) -> (Status, Value) {
    let response = client
        .post(uri.to_string())
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch()
        .await;
    let status = response.status();
    let payload = response.into_json::<Value>().await.unwrap_or(Value::Null);
    (status, payload)
}

async fn post_authed(client: &Client, uri: &str, token: &str) -> (Status, Value) {
    let response = client
        .post(uri.to_string())
        .header(Header::new("Authorization", format!("Bearer {token}")))
        .dispatch()
        .await;
    let status = response.status();
    let payload = response.into_json::<Value>().await.unwrap_or(Value::Null);
    (status, payload)
}

fn registration(email: &str) -> Value {
    json!({"name": "fake name", "email": email, "password": TEST_PASSWORD})
}

fn token_at(payload: &Value, kind: &str) -> String {
    payload["tokens"][kind]["token"]
        .as_str()
        .expect("token present")
        .to_string()
}

#[tokio::test]
async fn register_returns_user_and_token_pair() {
    let backend = MemoryBackend::new();
    let client = backend.client().await;

    let (status, body) =
        post_json(&client, "/v1/auth/register", registration("fake@example.com")).await;
    assert_eq!(status, Status::Created);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Register successfully");
    assert_eq!(body["user"]["email"], "fake@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["user"]["verified_email"], false);
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["tokens"]["access"]["expires"].is_string());
    assert!(body["tokens"]["refresh"]["expires"].is_string());
    assert_eq!(backend.ledger.len(), 1);

    let (status, body) =
        post_json(&client, "/v1/auth/register", registration("fake@example.com")).await;
    assert_eq!(status, Status::Conflict);
    assert_eq!(body["message"], "Email already taken");
}

#[tokio::test]
async fn register_reports_each_invalid_field() {
    let backend = MemoryBackend::new();
    let client = backend.client().await;

    let (status, body) = post_json(
        &client,
        "/v1/auth/register",
        json!({"email": "not-an-email", "password": "password"}),
    )
    .await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["status"], "error");
    assert_eq!(body["errors"]["name"], "Field name must be filled");
    assert_eq!(
        body["errors"]["email"],
        "Invalid email address for field email"
    );
    assert_eq!(
        body["errors"]["password"],
        "Field password must contain at least 1 letter and 1 number"
    );
    assert!(backend.user_store.is_empty());
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let backend = MemoryBackend::new();
    let client = backend.client().await;

    let response = client
        .post("/v1/auth/login")
        .header(ContentType::JSON)
        .body("{not json")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().await.expect("json envelope");
    assert_eq!(body["message"], "Invalid request body");
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let backend = MemoryBackend::new();
    backend.seed_user("fake@example.com", Role::User).await;
    let client = backend.client().await;

    let (wrong_status, wrong_body) = post_json(
        &client,
        "/v1/auth/login",
        json!({"email": "fake@example.com", "password": "wrongpass1"}),
    )
    .await;
    let (unknown_status, unknown_body) = post_json(
        &client,
        "/v1/auth/login",
        json!({"email": "nobody@example.com", "password": TEST_PASSWORD}),
    )
    .await;

    assert_eq!(wrong_status, Status::Unauthorized);
    assert_eq!(unknown_status, Status::Unauthorized);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["message"], "Invalid email or password");

    let (status, body) = post_json(
        &client,
        "/v1/auth/login",
        json!({"email": "fake@example.com", "password": TEST_PASSWORD}),
    )
    .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["message"], "Login successfully");
}

#[tokio::test]
async fn refresh_rotation_retires_the_old_token() {
    let backend = MemoryBackend::new();
    let client = backend.client().await;

    let (_, body) = post_json(&client, "/v1/auth/register", registration("fake@example.com")).await;
    let first = token_at(&body, "refresh");
    assert!(token_at(&body, "access").len() <= TOKEN_MAX);
    assert!(first.len() <= TOKEN_MAX);

    let (status, body) = post_json(
        &client,
        "/v1/auth/refresh-tokens",
        json!({"refresh_token": first}),
    )
    .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["status"], "success");
    let second = token_at(&body, "refresh");
    assert_ne!(first, second);

    let (status, body) = post_json(
        &client,
        "/v1/auth/refresh-tokens",
        json!({"refresh_token": first}),
    )
    .await;
    assert_eq!(status, Status::Unauthorized);
    assert_eq!(body["message"], "Please authenticate");

    let (status, body) =
        post_json(&client, "/v1/auth/logout", json!({"refresh_token": first})).await;
    assert_eq!(status, Status::NotFound);
    assert_eq!(body["message"], "Token not found");

    let (status, body) =
        post_json(&client, "/v1/auth/logout", json!({"refresh_token": second})).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["message"], "Logout successfully");

    let (status, _) = post_json(
        &client,
        "/v1/auth/refresh-tokens",
        json!({"refresh_token": second}),
    )
    .await;
    assert_eq!(status, Status::Unauthorized);
    assert!(backend.ledger.is_empty());
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let backend = MemoryBackend::new();
    let client = backend.client().await;

    let (_, body) = post_json(&client, "/v1/auth/register", registration("fake@example.com")).await;
    let access = token_at(&body, "access");
    let refresh = token_at(&body, "refresh");

    let (status, _) = post_json(
        &client,
        "/v1/auth/refresh-tokens",
        json!({"refresh_token": access}),
    )
    .await;
    assert_eq!(status, Status::Unauthorized);

    // A refresh token cannot authenticate a request either.
    let (status, body) = post_authed(&client, "/v1/auth/send-verification-email", &refresh).await;
    assert_eq!(status, Status::Unauthorized);
    assert_eq!(body["message"], "Please authenticate");
}

#[tokio::test]
async fn logout_requires_a_token() {
    let backend = MemoryBackend::new();
    let client = backend.client().await;

    let (status, body) = post_json(&client, "/v1/auth/logout", json!({})).await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["errors"]["refresh_token"], "Field refresh_token must be filled");
}

#[tokio::test]
async fn reset_password_token_is_single_use() {
    let backend = MemoryBackend::new();
    let user = backend.seed_user("fake@example.com", Role::User).await;
    let client = backend.client().await;

    let (status, body) = post_json(
        &client,
        "/v1/auth/forgot-password",
        json!({"email": "nobody@example.com"}),
    )
    .await;
    assert_eq!(status, Status::NotFound);
    assert_eq!(body["message"], "User not found");

    let (status, body) = post_json(
        &client,
        "/v1/auth/forgot-password",
        json!({"email": "fake@example.com"}),
    )
    .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(
        body["message"],
        "A password reset link has been sent to your email address."
    );

    let mail = backend
        .mailer
        .last_to("fake@example.com")
        .expect("reset mail sent");
    assert_eq!(mail.subject, "Reset password");
    assert!(mail.body.contains("http://app.test/reset-password?token="));
    let token = mail.token().expect("token in link");
    assert_eq!(
        backend
            .ledger
            .record_for(user.id, TokenType::ResetPassword)
            .map(|record| record.token),
        Some(token.clone())
    );

    let uri = format!("/v1/auth/reset-password?token={token}");
    let (status, body) = post_json(&client, &uri, json!({"password": "newpassword1"})).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["message"], "Update password successfully");

    let (status, body) = post_json(&client, &uri, json!({"password": "newpassword2"})).await;
    assert_eq!(status, Status::Unauthorized);
    assert_eq!(body["message"], "Password reset failed");

    let (status, _) = post_json(
        &client,
        "/v1/auth/login",
        json!({"email": "fake@example.com", "password": TEST_PASSWORD}),
    )
    .await;
    assert_eq!(status, Status::Unauthorized);

    let (status, _) = post_json(
        &client,
        "/v1/auth/login",
        json!({"email": "fake@example.com", "password": "newpassword1"}),
    )
    .await;
    assert_eq!(status, Status::Ok);
}

#[tokio::test]
async fn reset_password_validates_before_touching_tokens() {
    let backend = MemoryBackend::new();
    let client = backend.client().await;

    let (status, body) = post_json(
        &client,
        "/v1/auth/reset-password",
        json!({"password": "short"}),
    )
    .await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["errors"]["token"], "Field token must be filled");
    assert!(body["errors"]["password"].is_string());
}

#[tokio::test]
async fn verify_email_flow() {
    let backend = MemoryBackend::new();
    let user = backend.seed_user("fake@example.com", Role::User).await;
    let access = backend.access_token(&user).await;
    let client = backend.client().await;

    let response = client
        .post("/v1/auth/send-verification-email")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);

    let (status, body) = post_authed(&client, "/v1/auth/send-verification-email", &access).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(
        body["message"],
        "Please check your email for a link to verify your account"
    );

    let mail = backend
        .mailer
        .last_to("fake@example.com")
        .expect("verification mail sent");
    assert_eq!(mail.subject, "Email Verification");
    let token = mail.token().expect("token in link");

    let uri = format!("/v1/auth/verify-email?token={token}");
    let response = client.post(uri.clone()).dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    let response = client.post(uri).dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
    let body: Value = response.into_json().await.expect("json envelope");
    assert_eq!(body["message"], "Verify email failed");

    let response = client
        .get(format!("/v1/users/{}", user.id))
        .header(Header::new("Authorization", format!("Bearer {access}")))
        .dispatch()
        .await;
    let body: Value = response.into_json().await.expect("json envelope");
    assert_eq!(body["user"]["verified_email"], true);
}

#[tokio::test]
async fn failed_mail_delivery_is_an_internal_error() {
    let backend = MemoryBackend::new();
    backend.seed_user("fake@example.com", Role::User).await;
    backend.mailer.fail_deliveries(true);
    let client = backend.client().await;

    let (status, body) = post_json(
        &client,
        "/v1/auth/forgot-password",
        json!({"email": "fake@example.com"}),
    )
    .await;
    assert_eq!(status, Status::InternalServerError);
    assert_eq!(body["message"], "Internal Server Error");
    assert!(backend.mailer.sent().is_empty());
}

#[tokio::test]
async fn deleted_account_loses_access() {
    let backend = MemoryBackend::new();
    let user = backend.seed_user("fake@example.com", Role::User).await;
    let access = backend.access_token(&user).await;
    let client = backend.client().await;

    let response = client
        .delete(format!("/v1/users/{}", user.id))
        .header(Header::new("Authorization", format!("Bearer {access}")))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let (status, _) = post_authed(&client, "/v1/auth/send-verification-email", &access).await;
    assert_eq!(status, Status::Unauthorized);
}

#[tokio::test]
async fn google_routes_are_hidden_when_unconfigured() {
    let backend = MemoryBackend::new();
    let client = backend.client().await;

    let response = client.get("/v1/auth/google").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
}

fn google_backend(verified: bool) -> MemoryBackend {
    MemoryBackend::new().with_google(StubOAuthProvider::new(
        OAuthProfile {
            name: "G User".into(),
            email: "g@example.com".into(),
            verified_email: verified,
        },
        "good-code",
    ))
}

async fn start_google_login(client: &Client) -> String {
    let response = client.get("/v1/auth/google").dispatch().await;
    assert_eq!(response.status(), Status::SeeOther);
    let location = response
        .headers()
        .get_one("Location")
        .expect("redirect location")
        .to_string();
    let (_, state) = location.split_once("state=").expect("state in redirect");
    assert!(response.cookies().get("oauth_state").is_some());
    state.to_string()
}

#[tokio::test]
async fn google_sign_in_creates_a_verified_account() {
    let backend = google_backend(true);
    let client = backend.client().await;

    let state = start_google_login(&client).await;
    let response = client
        .get(format!("/v1/auth/google-callback?state={state}&code=good-code"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let body: Value = response.into_json().await.expect("json envelope");
    assert_eq!(body["message"], "Login successfully");
    assert_eq!(body["user"]["email"], "g@example.com");
    assert_eq!(body["user"]["verified_email"], true);
    assert!(body["tokens"]["refresh"]["token"].is_string());
    assert_eq!(backend.user_store.len(), 1);
}

#[tokio::test]
async fn google_callback_rejects_foreign_state() {
    let backend = google_backend(true);
    let client = backend.client().await;

    start_google_login(&client).await;
    let response = client
        .get("/v1/auth/google-callback?state=forged&code=good-code")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
    let body: Value = response.into_json().await.expect("json envelope");
    assert_eq!(body["message"], "States don't match");
    assert!(backend.user_store.is_empty());
}

#[tokio::test]
async fn google_sign_in_never_unverifies() {
    let backend = google_backend(false);
    let existing = backend.seed_user("g@example.com", Role::User).await;
    let client = backend.client().await;

    let state = start_google_login(&client).await;
    let response = client
        .get(format!("/v1/auth/google-callback?state={state}&code=good-code"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let body: Value = response.into_json().await.expect("json envelope");
    assert_eq!(body["user"]["id"], existing.id.to_string());
    assert_eq!(body["user"]["verified_email"], false);
    assert_eq!(backend.user_store.len(), 1);
}
