use thiserror::Error;

/// Internal error type for store and infrastructure operations
///
/// Separates infrastructure failures (Database, Transaction, Parse, Crypto) shared by
/// all stores from domain failures raised by a specific store.
///
/// Not exposed to callers of the collaborator traits. Services convert it into
/// `AuthError` or `DataError` at their boundary.
#[derive(Error, Debug)]
pub enum InternalError {
    // ============================================================
    // Infrastructure Errors (shared by all stores)
    // ============================================================

    /// Database query or operation failed
    #[error("Database error: {operation} failed: {source}")]
    Database {
        operation: String,
        #[source]
        source: sea_orm::DbErr,
    },

    /// Database transaction failed
    #[error("Transaction error: {operation} failed: {source}")]
    Transaction {
        operation: String,
        #[source]
        source: sea_orm::DbErr,
    },

    /// Failed to parse a stored value (hash, timestamp, etc.)
    #[error("Parse error: failed to parse {value_type}: {message}")]
    Parse {
        value_type: String,
        message: String,
    },

    /// Cryptographic operation failed (hashing, verification, etc.)
    #[error("Crypto error: {operation} failed: {message}")]
    Crypto {
        operation: String,
        message: String,
    },

    /// Outbound delivery (reset notifications) failed
    #[error("Delivery error: {channel}: {message}")]
    Delivery {
        channel: String,
        message: String,
    },

    // ============================================================
    // Domain-Specific Errors
    // ============================================================

    /// Credential store errors (users, passwords, reset tokens)
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl InternalError {
    /// Create a database error with context
    pub fn database(operation: impl Into<String>, source: sea_orm::DbErr) -> Self {
        Self::Database {
            operation: operation.into(),
            source,
        }
    }

    /// Create a transaction error with context
    pub fn transaction(operation: impl Into<String>, source: sea_orm::DbErr) -> Self {
        Self::Transaction {
            operation: operation.into(),
            source,
        }
    }

    /// Create a parse error with context
    pub fn parse(value_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            value_type: value_type.into(),
            message: message.into(),
        }
    }

    /// Create a crypto error with context
    pub fn crypto(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Crypto {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a delivery error with context
    pub fn delivery(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            channel: channel.into(),
            message: message.into(),
        }
    }
}

/// Credential store specific errors
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Unknown email or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Email already registered
    #[error("User already exists: {0}")]
    DuplicateEmail(String),

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Reset token does not exist or was already used
    #[error("Invalid reset token")]
    InvalidResetToken,

    /// Reset token is past its expiry
    #[error("Expired reset token")]
    ExpiredResetToken,
}
