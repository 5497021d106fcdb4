//! Authentication: token codec, token ledger, credential handling, the auth
//! service that ties them together, Rocket request guards and HTTP handlers.

pub mod config;
pub mod error;
pub mod guards;
pub mod jwt;
pub mod ledger;
pub mod oauth;
pub mod passwords;
pub mod responses;
pub mod roles;
pub mod routes;
pub mod service;

pub use config::{AuthConfig, GoogleOAuthConfig};
pub use error::{AuthError, AuthResult, TokenError};
pub use guards::{AuthUser, Authorized};
pub use jwt::{JwtService, SignedToken, TokenType};
pub use ledger::{MemoryTokenLedger, PgTokenLedger, TokenLedger, TokenRecord};
pub use oauth::{GoogleProvider, OAuthProfile, OAuthProvider};
pub use passwords::PasswordService;
pub use roles::{CanGetUsers, CanManageUsers, Permission, RequiredPermissions, Role};
pub use service::AuthService;
