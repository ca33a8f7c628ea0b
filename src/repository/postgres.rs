use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow, query_builder::QueryBuilder};

use super::{Columns, Order, SqlValue, Store, StoreError, UserRepository, Window};
use crate::models::{NewUser, Record, Role, User};

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: SqlValue) {
    match value {
        SqlValue::Text(text) => builder.push_bind(text),
        SqlValue::OptionalText(text) => builder.push_bind(text),
        SqlValue::Float(number) => builder.push_bind(number),
        SqlValue::Timestamp(at) => builder.push_bind(at),
    };
}

fn decode_record<T: Columns>(row: &PgRow) -> Result<Record<T>, sqlx::Error> {
    Ok(Record {
        id: row.try_get("id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        fields: T::from_row(row)?,
    })
}

/// PostgresStore
///
/// [`Store`] over one soft-deleted content table. Queries are assembled with `QueryBuilder` from
/// the entity's [`Columns`] mapping; every value is bound, never interpolated.
pub struct PostgresStore<T> {
    pool: PgPool,
    _entity: PhantomData<fn() -> T>,
}

impl<T> PostgresStore<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<T> Store<T> for PostgresStore<T>
where
    T: Columns + Send + Sync + 'static,
{
    async fn list(&self, order: Order, window: Option<Window>) -> Result<Vec<Record<T>>, StoreError> {
        let order_by = match order {
            Order::Id => "id ASC",
            Order::Listing => T::LISTING_ORDER,
        };

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT * FROM {} WHERE deleted_at IS NULL ORDER BY {order_by}",
            T::TABLE
        ));
        if let Some(window) = window {
            builder.push(" LIMIT ");
            builder.push_bind(window.limit);
            builder.push(" OFFSET ");
            builder.push_bind(window.offset);
        }

        let rows = builder.build().fetch_all(&self.pool).await.map_err(|e| {
            tracing::error!(table = T::TABLE, "list error: {:?}", e);
            StoreError::from(e)
        })?;

        rows.iter()
            .map(decode_record::<T>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let query = format!("SELECT COUNT(*) FROM {} WHERE deleted_at IS NULL", T::TABLE);
        sqlx::query_scalar::<_, i64>(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from)
    }

    async fn find(&self, id: i64) -> Result<Record<T>, StoreError> {
        let query = format!(
            "SELECT * FROM {} WHERE id = $1 AND deleted_at IS NULL",
            T::TABLE
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;

        Ok(decode_record(&row)?)
    }

    async fn create(&self, fields: T) -> Result<Record<T>, StoreError> {
        let values = fields.values();

        let mut builder = QueryBuilder::<Postgres>::new(format!("INSERT INTO {} (", T::TABLE));
        for (index, (column, _)) in values.iter().enumerate() {
            if index > 0 {
                builder.push(", ");
            }
            builder.push(column);
        }
        builder.push(") VALUES (");
        for (index, (_, value)) in values.into_iter().enumerate() {
            if index > 0 {
                builder.push(", ");
            }
            push_value(&mut builder, value);
        }
        builder.push(") RETURNING *");

        let row = builder.build().fetch_one(&self.pool).await.map_err(|e| {
            tracing::error!(table = T::TABLE, "create error: {:?}", e);
            StoreError::from(e)
        })?;

        Ok(decode_record(&row)?)
    }

    async fn save(&self, id: i64, fields: T) -> Result<Record<T>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("UPDATE {} SET ", T::TABLE));
        for (column, value) in fields.values() {
            builder.push(column);
            builder.push(" = ");
            push_value(&mut builder, value);
            builder.push(", ");
        }
        builder.push("updated_at = NOW() WHERE id = ");
        builder.push_bind(id);
        builder.push(" AND deleted_at IS NULL RETURNING *");

        let row = builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(table = T::TABLE, id, "save error: {:?}", e);
                StoreError::from(e)
            })?
            .ok_or(StoreError::NotFound)?;

        Ok(decode_record(&row)?)
    }

    async fn delete(&self, id: i64) -> Result<u64, StoreError> {
        let query = format!(
            "UPDATE {} SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
            T::TABLE
        );
        let result = sqlx::query(&query).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

/// Locks every admin row for the rest of the transaction and returns their ids. Concurrent
/// saves and deletes queue behind the lock and then see the committed roles, so two of them
/// cannot each remove "the other" admin.
async fn lock_admins(tx: &mut Transaction<'_, Postgres>) -> Result<Vec<i64>, StoreError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM users WHERE role = $1 ORDER BY id FOR UPDATE",
    )
    .bind(Role::Admin.as_str())
    .fetch_all(&mut **tx)
    .await?;
    Ok(ids)
}

fn decode_user(row: &PgRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: role.parse().map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// PostgresUserRepository
///
/// [`UserRepository`] backed by the `users` table.
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(decode_user)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    async fn find_user(&self, id: i64) -> Result<User, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(decode_user(&row)?)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(decode_user)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn count_by_role(&self, role: Role) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(username = %user.username, "create_user error: {:?}", e);
            StoreError::from(e)
        })?;
        Ok(decode_user(&row)?)
    }

    async fn save_user(&self, user: &User) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;
        let admins = lock_admins(&mut tx).await?;
        if user.role != Role::Admin && admins == [user.id] {
            return Err(StoreError::LastAdmin);
        }

        let row = sqlx::query(
            "UPDATE users SET username = $1, email = $2, password_hash = $3, role = $4, \
             updated_at = NOW() WHERE id = $5 RETURNING *",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;
        let saved = decode_user(&row)?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn delete_user(&self, id: i64) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let admins = lock_admins(&mut tx).await?;
        if admins == [id] {
            return Err(StoreError::LastAdmin);
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
