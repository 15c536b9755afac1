//! User service.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use flock_common::{AppError, AppResult, IdGenerator, config::AuthConfig};
use flock_db::{UnitOfWork, entities::user, repositories::UserRepository};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::{IntoActiveModel, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
    secret_key: String,
    reset_token_ttl_secs: u64,
}

/// Input for registering a new user.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 64))]
    pub username: String,

    #[validate(email, length(max = 120))]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Input for updating a profile.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 64))]
    pub username: Option<String>,

    #[validate(length(max = 140))]
    pub about_me: Option<String>,
}

/// Claims of a password reset token.
#[derive(Debug, Serialize, Deserialize)]
struct ResetPasswordClaims {
    /// ID of the user allowed to reset their password.
    reset_password: String,
    /// Expiry, Unix seconds.
    exp: u64,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(user_repo: UserRepository, auth: &AuthConfig) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
            secret_key: auth.secret_key.clone(),
            reset_token_ttl_secs: auth.reset_token_ttl_secs,
        }
    }

    /// Register a new user with a hashed password.
    pub async fn register(
        &self,
        uow: &UnitOfWork,
        input: RegisterInput,
    ) -> AppResult<user::Model> {
        input.validate()?;

        if self
            .user_repo
            .identity_taken(uow, &input.username, &input.email)
            .await?
        {
            return Err(AppError::Conflict(
                "Username or email already registered".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password)?;

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username),
            email: Set(input.email),
            password_hash: Set(Some(password_hash)),
            about_me: Set(None),
            last_seen: Set(None),
            last_message_read_time: Set(None),
            created_at: Set(Utc::now().into()),
        };

        let user = self.user_repo.create(uow, model).await?;
        info!(user_id = %user.id, username = %user.username, "Registered user");
        Ok(user)
    }

    /// Get a user by ID.
    pub async fn get(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::UserNotFound(username.to_string()))
    }

    /// Update a user's profile.
    pub async fn update_profile(
        &self,
        uow: &UnitOfWork,
        user_id: &str,
        input: UpdateProfileInput,
    ) -> AppResult<user::Model> {
        input.validate()?;

        let user = self.user_repo.get_by_id_in(uow, user_id).await?;
        if input.username.is_none() && input.about_me.is_none() {
            return Ok(user);
        }

        let mut active = user.into_active_model();
        if let Some(username) = input.username {
            active.username = Set(username);
        }
        if let Some(about_me) = input.about_me {
            active.about_me = Set(Some(about_me));
        }

        self.user_repo.update(uow, active).await
    }

    /// Replace a user's password.
    pub async fn set_password(
        &self,
        uow: &UnitOfWork,
        user_id: &str,
        password: &str,
    ) -> AppResult<user::Model> {
        if password.len() < 8 {
            return Err(AppError::Validation(
                "password must be at least 8 characters".to_string(),
            ));
        }

        let user = self.user_repo.get_by_id_in(uow, user_id).await?;
        let mut active = user.into_active_model();
        active.password_hash = Set(Some(hash_password(password)?));

        self.user_repo.update(uow, active).await
    }

    /// Check a password against the user's stored hash. A user without a
    /// password never matches.
    #[must_use]
    pub fn check_password(&self, user: &user::Model, password: &str) -> bool {
        let Some(ref hash) = user.password_hash else {
            return false;
        };

        match verify_password(password, hash) {
            Ok(matches) => matches,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Stored password hash is unreadable");
                false
            }
        }
    }

    /// Gravatar identicon URL for a user.
    #[must_use]
    pub fn avatar_url(&self, user: &user::Model, size: u32) -> String {
        let digest = md5::compute(user.email.to_lowercase().as_bytes());
        format!("https://www.gravatar.com/avatar/{digest:x}?d=identicon&s={size}")
    }

    /// Signed token allowing a user to reset their password, valid for the
    /// configured lifetime.
    pub fn reset_password_token(&self, user: &user::Model) -> AppResult<String> {
        let exp = Utc::now().timestamp().max(0) as u64 + self.reset_token_ttl_secs;
        self.encode_reset_claims(&user.id, exp)
    }

    fn encode_reset_claims(&self, user_id: &str, exp: u64) -> AppResult<String> {
        let claims = ResetPasswordClaims {
            reset_password: user_id.to_string(),
            exp,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret_key.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to sign reset token: {e}")))
    }

    /// The user a reset token was issued for. A malformed, forged or
    /// expired token yields `None`.
    pub async fn verify_reset_password_token(
        &self,
        token: &str,
    ) -> AppResult<Option<user::Model>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = match decode::<ResetPasswordClaims>(
            token,
            &DecodingKey::from_secret(self.secret_key.as_bytes()),
            &validation,
        ) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "Rejected reset token");
                return Ok(None);
            }
        };

        self.user_repo.find_by_id(&claims.reset_password).await
    }

    /// Record that a user was just seen.
    pub async fn touch_last_seen(
        &self,
        uow: &UnitOfWork,
        user_id: &str,
    ) -> AppResult<user::Model> {
        let user = self.user_repo.get_by_id_in(uow, user_id).await?;
        let mut active = user.into_active_model();
        active.last_seen = Set(Some(Utc::now().into()));

        self.user_repo.update(uow, active).await
    }

    /// Delete a user. Their posts, messages, notifications and follow
    /// edges are removed with them, and their posts leave the search index
    /// when the unit commits.
    pub async fn delete(&self, uow: &mut UnitOfWork, user_id: &str) -> AppResult<bool> {
        let deleted = self.user_repo.delete(uow, user_id).await?;
        if deleted {
            info!(user_id, "Deleted user");
        }
        Ok(deleted)
    }
}

/// Hash a password with Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
