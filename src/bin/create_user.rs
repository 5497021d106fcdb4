use std::io::{self, Write};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use auth_server::auth::{PasswordService, Role};
use auth_server::db::run_migrations;
use auth_server::models::NewUser;
use auth_server::store::{PgUserStore, StoreError, UserStore};
use auth_server::validation::{EMAIL_MAX, NAME_MAX, Validator};

#[derive(Parser, Debug)]
#[command(name = "create_user", about = "Create a user account, typically the first admin")]
struct Args {
    /// Display name for the account.
    #[arg(long)]
    name: String,

    /// Email address used to sign in.
    #[arg(long)]
    email: String,

    /// Plaintext password to hash and store for this user.
    #[arg(long)]
    password: String,

    /// Role to assign (`user` or `admin`).
    #[arg(long, default_value = "user")]
    role: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let name = args.name.trim();
    let email = args.email.trim();
    let role_name = args.role.trim().to_lowercase();

    let checked = Validator::new()
        .required("name", name)
        .max_len("name", name, NAME_MAX)
        .required("email", email)
        .email("email", email)
        .max_len("email", email, EMAIL_MAX)
        .password("password", &args.password)
        .one_of("role", &role_name, &[Role::User.as_str(), Role::Admin.as_str()])
        .finish();
    if let Err(errors) = checked {
        for field in errors.fields() {
            writeln!(io::stderr(), "error: {}", errors.get(field).unwrap_or_default())?;
        }
        std::process::exit(1);
    }
    let role = role_name.parse::<Role>().unwrap_or(Role::User);

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;
    run_migrations(&pool).await?;

    let password_hash = PasswordService::new()?.hash_password(&args.password)?;
    let store = PgUserStore::new(pool);
    let created = store
        .create(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: Some(password_hash),
            role,
            email_verified: true,
        })
        .await;

    match created {
        Ok(user) => {
            println!("Created {} user '{}' with id {}", role.as_str(), user.email, user.id);
            Ok(())
        }
        Err(StoreError::DuplicateEmail) => {
            writeln!(io::stderr(), "error: a user with email '{email}' already exists.")?;
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}
