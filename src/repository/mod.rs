use std::{cmp::Ordering, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;

use crate::models::{NewUser, Record, Role, User};

mod memory;
mod postgres;

pub use memory::{MemoryStore, MemoryUserRepository};
pub use postgres::{PostgresStore, PostgresUserRepository};

/// StoreError
///
/// Storage failures, split so handlers can tell "no such row" and constraint violations apart
/// from genuine backend errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    /// The change would leave no account with the admin role.
    #[error("at least one admin account must remain")]
    LastAdmin,

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                let target = db_err.constraint().unwrap_or("unique constraint").to_owned();
                StoreError::Conflict(format!("a record with the same value already exists ({target})"))
            }
            other => StoreError::Database(other),
        }
    }
}

/// A bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    OptionalText(Option<String>),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

/// Columns
///
/// Maps an entity onto its content table. Bookkeeping columns (`id`, timestamps, `deleted_at`)
/// are managed by the store and never appear in [`Columns::values`].
pub trait Columns: Sized {
    const TABLE: &'static str;
    /// Column carrying the table's uniqueness constraint.
    const UNIQUE_COLUMN: &'static str;
    /// `ORDER BY` clause for [`Order::Listing`].
    const LISTING_ORDER: &'static str = "id ASC";

    fn values(&self) -> Vec<(String, SqlValue)>;

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error>;

    /// In-memory equivalent of [`Columns::LISTING_ORDER`]; ties fall back to id order.
    fn listing_cmp(&self, _other: &Self) -> Ordering {
        Ordering::Equal
    }
}

/// Row ordering for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Primary key ascending (admin pages).
    Id,
    /// The entity's public ordering (API listings).
    Listing,
}

/// Limit/offset slice of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: i64,
    pub offset: i64,
}

/// Store
///
/// Persistence contract for one content table. Deleted rows are invisible to every method.
#[async_trait]
pub trait Store<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    async fn list(&self, order: Order, window: Option<Window>) -> Result<Vec<Record<T>>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    async fn find(&self, id: i64) -> Result<Record<T>, StoreError>;

    async fn create(&self, fields: T) -> Result<Record<T>, StoreError>;

    async fn save(&self, id: i64, fields: T) -> Result<Record<T>, StoreError>;

    /// Returns the number of rows affected; zero means there was nothing to delete.
    async fn delete(&self, id: i64) -> Result<u64, StoreError>;
}

pub type StoreState<T> = Arc<dyn Store<T>>;

/// UserRepository
///
/// Account persistence. Users are hard-deleted.
#[async_trait]
pub trait UserRepository: Send + Sync {
    // --- Lookup ---
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn find_user(&self, id: i64) -> Result<User, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn count_by_role(&self, role: Role) -> Result<i64, StoreError>;

    // --- Mutation ---
    // Saving and deleting check the remaining admin count atomically with the write and
    // fail with `StoreError::LastAdmin` instead of removing the last admin.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn save_user(&self, user: &User) -> Result<User, StoreError>;
    async fn delete_user(&self, id: i64) -> Result<u64, StoreError>;
}

pub type UserRepositoryState = Arc<dyn UserRepository>;
