use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    users::{
        dto::{LoginRequest, MeResponse, RegisterRequest, UserSummary},
        jwt::JwtKeys,
        password::PasswordHasher,
        repo::{StoreError, UserStore},
        repo_types::{NewUser, User},
    },
};

const MISSING_FIELDS: &str = "Please include all fields";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

/// Hashes and checks passwords, issues and checks tokens, and talks to the
/// user store. Cheap to clone.
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
    hasher: PasswordHasher,
}

impl CredentialService {
    pub fn new(store: Arc<dyn UserStore>, keys: JwtKeys, hasher: PasswordHasher) -> Self {
        Self { store, keys, hasher }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<UserSummary, AppError> {
        let name = req.name.trim();
        let email = req.email.trim();

        if name.is_empty() || email.is_empty() || req.password.is_empty() {
            warn!("register with missing fields");
            return Err(AppError::Validation(MISSING_FIELDS.into()));
        }

        if !is_valid_email(email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::Validation("Invalid email".into()));
        }

        // Fast path; the store's uniqueness guarantee below is what actually holds.
        if self.store.find_by_email(email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AppError::DuplicateUser);
        }

        // Token is signed before anything is written, so a signing failure
        // leaves the store untouched.
        let id = Uuid::new_v4();
        let token = self.issue_token(id)?;
        let password_hash = self.hasher.hash_blocking(req.password).await?;

        let created = self
            .store
            .create(NewUser {
                id,
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await;

        let user = match created {
            Ok(Some(u)) => u,
            Ok(None) => {
                error!(email = %email, "store returned no user on create");
                return Err(AppError::InvalidUserData);
            }
            Err(StoreError::Duplicate) => {
                warn!(email = %email, "email registered concurrently");
                return Err(AppError::DuplicateUser);
            }
            Err(e) => return Err(e.into()),
        };

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(UserSummary {
            id: user.id,
            name: user.name,
            email: user.email,
            token,
        })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<UserSummary, AppError> {
        let email = req.email.trim();

        if email.is_empty() || req.password.is_empty() {
            warn!("login with missing fields");
            return Err(AppError::Validation(MISSING_FIELDS.into()));
        }

        let Some(user) = self.store.find_by_email(email).await? else {
            // same Argon2 cost as a real mismatch
            self.hasher.verify_dummy_blocking(req.password).await;
            warn!(email = %email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        let ok = match self
            .hasher
            .verify_blocking(req.password, user.password_hash.clone())
            .await
        {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, user_id = %user.id, "stored hash unusable");
                false
            }
        };

        if !ok {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let summary = self.summary(user)?;
        info!(user_id = %summary.id, email = %summary.email, "user logged in");
        Ok(summary)
    }

    pub fn issue_token(&self, user_id: Uuid) -> Result<String, AppError> {
        self.keys.sign(user_id).map_err(|e| {
            error!(error = %e, "jwt sign failed");
            AppError::Internal(e)
        })
    }

    pub fn authenticate_token(&self, token: &str) -> Result<Uuid, AppError> {
        let claims = self.keys.verify(token)?;
        Ok(claims.sub)
    }

    /// Identity behind an already authenticated user id.
    pub async fn current_user(&self, user_id: Uuid) -> Result<MeResponse, AppError> {
        let Some(user) = self.store.find_by_id(user_id).await? else {
            warn!(user_id = %user_id, "token for unknown user");
            return Err(AppError::InvalidToken);
        };
        Ok(MeResponse {
            id: user.id,
            email: user.email,
            name: user.name,
        })
    }

    fn summary(&self, user: User) -> Result<UserSummary, AppError> {
        let token = self.issue_token(user.id)?;
        Ok(UserSummary {
            id: user.id,
            name: user.name,
            email: user.email,
            token,
        })
    }
}
