pub mod auth;
pub mod cognito;
pub mod config;
pub mod identity;
pub mod session;
pub mod state;

pub use config::{AppConfig, ConfigError};
pub use identity::{AuthTokens, Identity, IdentityProvider, MemoryIdentityProvider};
pub use session::SessionContext;
pub use state::AppState;
