//! Bearer-token authentication for the import endpoints: configuration,
//! token minting and verification, and Rocket request guards.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod guards;
pub mod jwt;
pub mod roles;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use guards::{AuthUser, RequireAdmin};
pub use jwt::JwtService;
pub use roles::Role;

#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub jwt_service: Arc<JwtService>,
}

impl AuthState {
    pub fn new(config: AuthConfig, jwt_service: JwtService) -> Self {
        Self {
            config,
            jwt_service: Arc::new(jwt_service),
        }
    }

    pub fn from_config(config: AuthConfig) -> AuthResult<Self> {
        let jwt_service = JwtService::from_config(&config)?;
        Ok(Self::new(config, jwt_service))
    }
}
