use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::AppConfig;
use crate::users::{
    jwt::JwtKeys, password::PasswordHasher, repo::UserStore, services::CredentialService,
};

#[derive(Clone)]
pub struct AppState {
    pub credentials: CredentialService,
}

impl AppState {
    pub fn new(config: &AppConfig, store: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        let keys = JwtKeys::new(&config.jwt)?;
        let hasher = PasswordHasher::new(&config.hashing)?;
        Ok(Self {
            credentials: CredentialService::new(store, keys, hasher),
        })
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.credentials.keys().clone()
    }
}
