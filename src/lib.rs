pub mod auth;
pub mod db;
pub mod error;
pub mod mailer;
pub mod models;
pub mod request_logger;
pub mod routes;
pub mod store;
pub mod users;
pub mod validation;

use crate::auth::{
    AuthConfig, AuthResult, AuthService, GoogleProvider, PgTokenLedger,
};
use crate::db::AuthDb;
use crate::mailer::LogMailer;
use crate::request_logger::RequestLogger;
use crate::store::PgUserStore;
use crate::users::UserService;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket, Route};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_db_pools::sqlx::PgPool;
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Every route of the public API, relative to the `/v1` mount point.
pub fn api_routes() -> Vec<Route> {
    let mut all = auth::routes::routes();
    all.extend(routes::routes());
    all
}

fn build_services(pool: PgPool) -> AuthResult<(AuthService, UserService)> {
    let config = AuthConfig::from_env()?;
    let mailer = Arc::new(LogMailer::new(config.email_from.clone()));
    let google = config.google.clone().map(GoogleProvider::new).transpose()?;

    let mut auth = AuthService::new(
        config,
        Arc::new(PgUserStore::new(pool.clone())),
        Arc::new(PgTokenLedger::new(pool)),
        mailer,
    )?;
    if let Some(provider) = google {
        log::info!("google sign-in enabled");
        auth = auth.with_google(Arc::new(provider));
    }

    let users = UserService::new(&auth);
    Ok((auth, users))
}

pub fn rocket() -> Result<Rocket<Build>, rocket_cors::Error> {
    init_logger();

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Patch,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allow_credentials(true)
        .to_cors()?;

    Ok(rocket::build()
        .attach(RequestLogger)
        .attach(AuthDb::init())
        .attach(cors)
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match AuthDb::fetch(&rocket) {
                    Some(db) => match db::run_migrations(db).await {
                        Ok(()) => {
                            log::info!("database migrations successful");
                            Ok(rocket)
                        }
                        Err(e) => {
                            log::error!("database migrations failed: {}", e);
                            Err(rocket)
                        }
                    },
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        .attach(AdHoc::try_on_ignite(
            "Auth Services",
            |rocket| async move {
                let pool = match AuthDb::fetch(&rocket) {
                    Some(db) => (**db).clone(),
                    None => {
                        log::error!("database pool not available for auth services");
                        return Err(rocket);
                    }
                };

                match build_services(pool) {
                    Ok((auth, users)) => Ok(rocket.manage(auth).manage(users)),
                    Err(err) => {
                        log::error!("failed to configure auth services: {}", err);
                        Err(rocket)
                    }
                }
            },
        ))
        .mount("/v1", api_routes())
        .register("/", error::catchers()))
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use std::sync::Arc;

    use chrono::Utc;
    use parking_lot::Mutex;
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::sqlx::{self, PgPool};
    use uuid::Uuid;

    use crate::auth::{
        AuthConfig, AuthError, AuthResult, AuthService, MemoryTokenLedger, OAuthProfile,
        OAuthProvider, Role,
    };
    use crate::mailer::{EmailSender, MailError};
    use crate::models::{NewUser, User};
    use crate::store::{MemoryUserStore, UserStore};
    use crate::users::UserService;

    pub use database::{TestDatabase, TestDatabaseError};

    pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
    pub const TEST_PASSWORD: &str = "password1";

    /// Defaults with a fixed secret and cookies usable over plain http.
    pub fn test_config() -> AuthConfig {
        AuthConfig {
            cookie_secure: false,
            app_url: "http://app.test".into(),
            ..AuthConfig::new(TEST_JWT_SECRET)
        }
    }

    #[derive(Debug, Clone)]
    pub struct SentEmail {
        pub to: String,
        pub subject: String,
        pub body: String,
    }

    impl SentEmail {
        /// Value of the `token` query parameter in the mailed link.
        pub fn token(&self) -> Option<String> {
            let start = self.body.find("token=")? + "token=".len();
            let token: String = self.body[start..]
                .chars()
                .take_while(|c| !c.is_whitespace())
                .collect();
            (!token.is_empty()).then_some(token)
        }
    }

    /// Mailer that keeps every message in memory. Can be switched to fail.
    #[derive(Debug, Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<SentEmail>>,
        failing: Mutex<bool>,
    }

    impl RecordingMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<SentEmail> {
            self.sent.lock().clone()
        }

        pub fn last_to(&self, to: &str) -> Option<SentEmail> {
            self.sent
                .lock()
                .iter()
                .rev()
                .find(|email| email.to == to)
                .cloned()
        }

        pub fn fail_deliveries(&self, failing: bool) {
            *self.failing.lock() = failing;
        }
    }

    #[rocket::async_trait]
    impl EmailSender for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
            if *self.failing.lock() {
                return Err(MailError::Delivery {
                    to: to.to_string(),
                    reason: "recording mailer set to fail".into(),
                });
            }
            self.sent.lock().push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
            Ok(())
        }
    }

    /// OAuth provider answering every exchange with a fixed profile.
    pub struct StubOAuthProvider {
        profile: OAuthProfile,
        valid_code: String,
    }

    impl StubOAuthProvider {
        pub fn new(profile: OAuthProfile, valid_code: impl Into<String>) -> Self {
            Self {
                profile,
                valid_code: valid_code.into(),
            }
        }
    }

    #[rocket::async_trait]
    impl OAuthProvider for StubOAuthProvider {
        fn authorize_url(&self, state: &str) -> AuthResult<String> {
            Ok(format!("https://oauth.test/authorize?state={state}"))
        }

        async fn exchange_code(&self, code: &str) -> AuthResult<String> {
            if code == self.valid_code {
                Ok("stub-access-token".to_string())
            } else {
                Err(AuthError::OAuth(format!("unknown code '{code}'")))
            }
        }

        async fn fetch_profile(&self, _access_token: &str) -> AuthResult<OAuthProfile> {
            Ok(self.profile.clone())
        }
    }

    /// Auth and user services over in-memory stores.
    pub struct MemoryBackend {
        pub auth: AuthService,
        pub users: UserService,
        pub user_store: Arc<MemoryUserStore>,
        pub ledger: Arc<MemoryTokenLedger>,
        pub mailer: Arc<RecordingMailer>,
    }

    impl MemoryBackend {
        pub fn new() -> Self {
            Self::with_config(test_config())
        }

        pub fn with_config(config: AuthConfig) -> Self {
            let user_store = Arc::new(MemoryUserStore::new());
            let ledger = Arc::new(MemoryTokenLedger::new());
            let mailer = Arc::new(RecordingMailer::new());
            let auth = AuthService::new(config, user_store.clone(), ledger.clone(), mailer.clone())
                .expect("auth service over memory stores");
            let users = UserService::new(&auth);

            Self {
                auth,
                users,
                user_store,
                ledger,
                mailer,
            }
        }

        pub fn with_google(mut self, provider: StubOAuthProvider) -> Self {
            self.auth = self.auth.with_google(Arc::new(provider));
            self.users = UserService::new(&self.auth);
            self
        }

        /// Insert a user whose password is [`TEST_PASSWORD`].
        pub async fn seed_user(&self, email: &str, role: Role) -> User {
            let hash = self
                .auth
                .passwords()
                .hash_password(TEST_PASSWORD)
                .expect("hash test password");
            self.user_store
                .create(NewUser {
                    name: "fake name".into(),
                    email: email.into(),
                    password_hash: Some(hash),
                    role,
                    email_verified: false,
                })
                .await
                .expect("seed user")
        }

        pub async fn access_token(&self, user: &User) -> String {
            self.auth
                .issue_token_pair(user)
                .await
                .expect("issue tokens")
                .access
                .token
        }

        /// Async client over every API route with these services managed.
        pub async fn client(&self) -> AsyncClient {
            TestRocketBuilder::new()
                .mount_api_routes(crate::api_routes())
                .manage_services(self.auth.clone())
                .async_client()
                .await
        }
    }

    impl Default for MemoryBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Seeds rows directly through SQL for Postgres-backed tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        pub async fn insert_user(
            &self,
            email: &str,
            role: Role,
            password_hash: Option<&str>,
        ) -> Result<Uuid, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO users (id, name, email, password_hash, role, email_verified) VALUES ($1, $2, $3, $4, $5, FALSE) RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind("fake name")
            .bind(email)
            .bind(password_hash)
            .bind(role.as_str())
            .fetch_one(self.pool)
            .await
        }

        pub async fn insert_token(
            &self,
            user_id: Uuid,
            token: &str,
            token_type: &str,
        ) -> Result<(), sqlx::Error> {
            sqlx::query(
                "INSERT INTO tokens (id, token, user_id, token_type, expires_at) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(token)
            .bind(user_id)
            .bind(token_type)
            .bind(Utc::now() + chrono::Duration::days(1))
            .execute(self.pool)
            .await?;
            Ok(())
        }

        pub async fn count_tokens(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar("SELECT COUNT(*) FROM tokens WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(self.pool)
                .await
        }
    }

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::{ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner};
        use testcontainers_modules::postgres::Postgres;
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        use crate::db::MIGRATOR;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral, migrated database for integration tests. Uses the server
        /// named by `TEST_DATABASE_URL` when set, otherwise a disposable
        /// Postgres container.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let (admin_url, container) = match std::env::var("TEST_DATABASE_URL") {
                    Ok(url) => (url, None),
                    Err(_) => {
                        let container = Postgres::default().start().await?;
                        let host = container.get_host().await?.to_string();
                        let port = container.get_host_port_ipv4(5432).await?;
                        (
                            format!("postgres://postgres:postgres@{}:{}/postgres", host, port),
                            Some(container),
                        )
                    }
                };

                let base_options: PgConnectOptions = admin_url.parse()?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let base_name = base_options
                    .get_database()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "postgres".to_string());

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await?;

                let new_db_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql).execute(&admin_pool).await?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.database(&new_db_name))
                    .await?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name: new_db_name,
                    container,
                })
            }

            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database(self.admin_options.clone(), &self.database_name).await?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_sql = format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", database_name);
            sqlx::query(&drop_sql).execute(&admin_pool).await?;
            Ok(())
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ = drop_database(admin_options, &db_name).await;
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        services: Option<(AuthService, UserService)>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                services: None,
            }
        }

        /// Mount routes under `/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/v1".to_string(), routes));
            self
        }

        /// Manage the auth service and a user service sharing its stores.
        pub fn manage_services(mut self, auth: AuthService) -> Self {
            let users = UserService::new(&auth);
            self.services = Some((auth, users));
            self
        }

        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment).register("/", crate::error::catchers());

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some((auth, users)) = self.services {
                rocket = rocket.manage(auth).manage(users);
            }

            rocket
        }

        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
