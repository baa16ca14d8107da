use argon2::password_hash::rand_core::OsRng;
use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::errors::{CredentialError, InternalError};
use crate::types::db::password_reset::{self, Entity as PasswordReset};
use crate::types::db::user::{self, Entity as User};
use crate::types::UserId;

/// Canonical form of an email address used for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// CredentialStore manages user accounts and password reset tokens
pub struct CredentialStore {
    db: DatabaseConnection,
    password_pepper: String,
    hash_params: Params,
}

impl CredentialStore {
    /// Create a new CredentialStore
    ///
    /// # Arguments
    /// * `db` - The database connection
    /// * `password_pepper` - Secret mixed into every Argon2id hash
    pub fn new(db: DatabaseConnection, password_pepper: String) -> Self {
        Self {
            db,
            password_pepper,
            hash_params: Params::default(),
        }
    }

    /// Override the Argon2 cost parameters used for new hashes
    pub fn with_hash_params(mut self, hash_params: Params) -> Self {
        self.hash_params = hash_params;
        self
    }

    fn argon2(&self) -> Result<Argon2<'_>, InternalError> {
        Argon2::new_with_secret(
            self.password_pepper.as_bytes(),
            Algorithm::Argon2id,
            Version::V0x13,
            self.hash_params.clone(),
        )
        .map_err(|e| InternalError::crypto("argon2_init", e.to_string()))
    }

    fn hash_password(&self, password: &str) -> Result<String, InternalError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| InternalError::crypto("hash_password", e.to_string()))?
            .to_string();
        Ok(hash)
    }

    /// Add a new user
    ///
    /// # Returns
    /// * `Ok(UserId)` - The id (UUID) of the created user
    /// * `Err(InternalError::Credential(DuplicateEmail))` - Email already registered
    pub async fn add_user(&self, email: &str, password: &str) -> Result<UserId, InternalError> {
        let email = normalize_email(email);

        if self.find_user_id_by_email(&email).await?.is_some() {
            return Err(CredentialError::DuplicateEmail(email).into());
        }

        let user_id = Uuid::new_v4().to_string();
        let password_hash = self.hash_password(password)?;
        let now = Utc::now().timestamp();

        let new_user = user::ActiveModel {
            id: Set(user_id.clone()),
            email: Set(email.clone()),
            password_hash: Set(password_hash),
            created_at: Set(now),
            updated_at: Set(now),
        };

        new_user.insert(&self.db).await.map_err(|e| {
            // Lost a race with a concurrent registration for the same email
            if e.to_string().contains("UNIQUE") {
                InternalError::from(CredentialError::DuplicateEmail(email.clone()))
            } else {
                InternalError::database("insert_user", e)
            }
        })?;

        tracing::debug!(user_id = %user_id, "User created");

        Ok(UserId::from(user_id))
    }

    /// Verify credentials and return the user id on success
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<UserId, InternalError> {
        let user = User::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(&self.db)
            .await
            .map_err(|e| InternalError::database("find_user_by_email", e))?
            .ok_or(CredentialError::InvalidCredentials)?;

        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|e| InternalError::parse("password_hash", e.to_string()))?;

        self.argon2()?
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| CredentialError::InvalidCredentials)?;

        Ok(UserId::from(user.id))
    }

    pub async fn find_user_id_by_email(&self, email: &str) -> Result<Option<UserId>, InternalError> {
        let user = User::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(&self.db)
            .await
            .map_err(|e| InternalError::database("find_user_by_email", e))?;

        Ok(user.map(|u| UserId::from(u.id)))
    }

    /// Replace the password hash of an existing user
    pub async fn update_password(&self, user_id: &UserId, new_password: &str) -> Result<(), InternalError> {
        let existing = User::find_by_id(user_id.as_str().to_owned())
            .one(&self.db)
            .await
            .map_err(|e| InternalError::database("find_user_by_id", e))?
            .ok_or_else(|| CredentialError::UserNotFound(user_id.to_string()))?;

        let mut active: user::ActiveModel = existing.into();
        active.password_hash = Set(self.hash_password(new_password)?);
        active.updated_at = Set(Utc::now().timestamp());

        active
            .update(&self.db)
            .await
            .map_err(|e| InternalError::database("update_password", e))?;

        Ok(())
    }

    /// Store the hash of a password reset token
    ///
    /// # Arguments
    /// * `token_hash` - SHA-256 hash of the plaintext token
    /// * `user_id` - The user the token resets
    /// * `expires_at` - Unix timestamp after which the token is rejected
    pub async fn store_reset_token(
        &self,
        token_hash: String,
        user_id: &UserId,
        expires_at: i64,
    ) -> Result<(), InternalError> {
        let reset = password_reset::ActiveModel {
            token_hash: Set(token_hash),
            user_id: Set(user_id.as_str().to_owned()),
            expires_at: Set(expires_at),
            created_at: Set(Utc::now().timestamp()),
        };

        reset
            .insert(&self.db)
            .await
            .map_err(|e| InternalError::database("store_reset_token", e))?;

        Ok(())
    }

    /// Consume a reset token and return the user it belongs to
    ///
    /// Tokens are single use: the row is deleted whether or not it has expired.
    pub async fn consume_reset_token(&self, token_hash: &str) -> Result<UserId, InternalError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| InternalError::transaction("begin_consume_reset_token", e))?;

        let reset = PasswordReset::find_by_id(token_hash.to_owned())
            .one(&txn)
            .await
            .map_err(|e| InternalError::database("find_reset_token", e))?
            .ok_or(CredentialError::InvalidResetToken)?;

        PasswordReset::delete_by_id(token_hash.to_owned())
            .exec(&txn)
            .await
            .map_err(|e| InternalError::database("delete_reset_token", e))?;

        txn.commit()
            .await
            .map_err(|e| InternalError::transaction("commit_consume_reset_token", e))?;

        if reset.expires_at < Utc::now().timestamp() {
            return Err(CredentialError::ExpiredResetToken.into());
        }

        Ok(UserId::from(reset.user_id))
    }

    /// Drop every outstanding reset token for a user
    pub async fn revoke_reset_tokens(&self, user_id: &UserId) -> Result<u64, InternalError> {
        let result = PasswordReset::delete_many()
            .filter(password_reset::Column::UserId.eq(user_id.as_str()))
            .exec(&self.db)
            .await
            .map_err(|e| InternalError::database("revoke_reset_tokens", e))?;

        Ok(result.rows_affected)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("db", &"<connection>")
            .field("password_pepper", &"<redacted>")
            .finish()
    }
}
