/// Account model and database operations
///
/// Accounts are the identities that author projects, hold memberships, and
/// write issues and notes. They are created through registration only.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE accounts (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     username VARCHAR(150) NOT NULL UNIQUE,
///     email VARCHAR(254) NOT NULL,          -- unique on LOWER(email)
///     password_hash VARCHAR(255) NOT NULL,
///     age INTEGER NOT NULL CHECK (age >= 0),
///     can_be_contacted BOOLEAN NOT NULL DEFAULT FALSE,
///     can_data_be_shared BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Youngest age accepted at registration
pub const MIN_REGISTRATION_AGE: i32 = 15;

/// A registered account
///
/// The password hash never leaves the server: it is skipped when the account
/// is serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    /// Unique account ID
    pub id: Uuid,

    /// Login name, unique across accounts
    pub username: String,

    /// Email address, unique ignoring case
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Age declared at registration
    pub age: i32,

    /// Consent to be contacted
    pub can_be_contacted: bool,

    /// Consent to data sharing
    pub can_data_be_shared: bool,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account last logged in
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new account
#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub username: String,
    pub email: String,
    /// Argon2id password hash (NOT the plaintext password)
    pub password_hash: String,
    pub age: i32,
    pub can_be_contacted: bool,
    pub can_data_be_shared: bool,
}

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, age, can_be_contacted, \
                               can_data_be_shared, created_at, last_login_at";

impl Account {
    /// Inserts a new account
    ///
    /// # Errors
    ///
    /// Fails with a unique violation (`accounts_username_key` or
    /// `accounts_email_key`) if the username or email is taken.
    pub async fn create(pool: &PgPool, data: CreateAccount) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO accounts (username, email, password_hash, age, can_be_contacted, can_data_be_shared) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ACCOUNT_COLUMNS}"
        );

        sqlx::query_as::<_, Account>(&query)
            .bind(data.username)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.age)
            .bind(data.can_be_contacted)
            .bind(data.can_data_be_shared)
            .fetch_one(pool)
            .await
    }

    /// Finds an account by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");

        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds an account by username (exact match)
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1");

        sqlx::query_as::<_, Account>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Finds an account by email, ignoring case
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE LOWER(email) = LOWER($1)");

        sqlx::query_as::<_, Account>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Checks whether an account with this ID exists
    pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Records a successful login
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE accounts SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists accounts ordered by username
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY username ASC LIMIT $1 OFFSET $2"
        );

        sqlx::query_as::<_, Account>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
