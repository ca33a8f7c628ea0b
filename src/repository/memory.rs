use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{Columns, Order, SqlValue, Store, StoreError, UserRepository, Window};
use crate::models::{NewUser, Record, Role, User};

struct Row<T> {
    record: Record<T>,
    deleted: bool,
}

fn unique_value<T: Columns>(fields: &T) -> Option<SqlValue> {
    fields
        .values()
        .into_iter()
        .find(|(column, _)| column == T::UNIQUE_COLUMN)
        .map(|(_, value)| value)
}

/// MemoryStore
///
/// In-process [`Store`] with the same visibility and uniqueness rules as the Postgres store:
/// deleted rows are hidden from reads but keep their unique value reserved, as the table's
/// `UNIQUE` constraint does. Used by the test suite; `failing()` simulates an unreachable backend.
pub struct MemoryStore<T> {
    rows: RwLock<Vec<Row<T>>>,
    next_id: AtomicI64,
    should_fail: bool,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            should_fail: false,
        }
    }
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.should_fail {
            return Err(StoreError::Unavailable(
                "memory store configured to fail".to_owned(),
            ));
        }
        Ok(())
    }
}

impl<T: Columns> MemoryStore<T> {
    fn ensure_unique(rows: &[Row<T>], fields: &T, except: Option<i64>) -> Result<(), StoreError> {
        let Some(candidate) = unique_value(fields) else {
            return Ok(());
        };
        let taken = rows.iter().any(|row| {
            Some(row.record.id) != except
                && unique_value(&row.record.fields).as_ref() == Some(&candidate)
        });
        if taken {
            return Err(StoreError::Conflict(format!(
                "a record with the same {} already exists",
                T::UNIQUE_COLUMN
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<T> Store<T> for MemoryStore<T>
where
    T: Columns + Clone + Send + Sync + 'static,
{
    async fn list(&self, order: Order, window: Option<Window>) -> Result<Vec<Record<T>>, StoreError> {
        self.check_available()?;
        let rows = self.rows.read().await;
        let mut records: Vec<Record<T>> = rows
            .iter()
            .filter(|row| !row.deleted)
            .map(|row| row.record.clone())
            .collect();

        match order {
            Order::Id => records.sort_by_key(|record| record.id),
            Order::Listing => {
                let newest_first = T::LISTING_ORDER.contains("DESC");
                records.sort_by(|a, b| {
                    a.fields.listing_cmp(&b.fields).then_with(|| {
                        if newest_first {
                            b.id.cmp(&a.id)
                        } else {
                            a.id.cmp(&b.id)
                        }
                    })
                })
            }
        }

        Ok(match window {
            Some(window) => records
                .into_iter()
                .skip(usize::try_from(window.offset).unwrap_or(usize::MAX))
                .take(usize::try_from(window.limit).unwrap_or(0))
                .collect(),
            None => records,
        })
    }

    async fn count(&self) -> Result<i64, StoreError> {
        self.check_available()?;
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|row| !row.deleted).count() as i64)
    }

    async fn find(&self, id: i64) -> Result<Record<T>, StoreError> {
        self.check_available()?;
        let rows = self.rows.read().await;
        rows.iter()
            .find(|row| !row.deleted && row.record.id == id)
            .map(|row| row.record.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn create(&self, fields: T) -> Result<Record<T>, StoreError> {
        self.check_available()?;
        let mut rows = self.rows.write().await;
        Self::ensure_unique(&rows, &fields, None)?;

        let now = Utc::now();
        let record = Record {
            id: self.next_id.fetch_add(1, AtomicOrdering::SeqCst),
            created_at: now,
            updated_at: now,
            fields,
        };
        rows.push(Row {
            record: record.clone(),
            deleted: false,
        });
        Ok(record)
    }

    async fn save(&self, id: i64, fields: T) -> Result<Record<T>, StoreError> {
        self.check_available()?;
        let mut rows = self.rows.write().await;
        Self::ensure_unique(&rows, &fields, Some(id))?;

        let row = rows
            .iter_mut()
            .find(|row| !row.deleted && row.record.id == id)
            .ok_or(StoreError::NotFound)?;
        row.record.fields = fields;
        row.record.updated_at = Utc::now();
        Ok(row.record.clone())
    }

    async fn delete(&self, id: i64) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut rows = self.rows.write().await;
        match rows
            .iter_mut()
            .find(|row| !row.deleted && row.record.id == id)
        {
            Some(row) => {
                row.deleted = true;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

/// MemoryUserRepository
///
/// In-process [`UserRepository`] enforcing the same username and email uniqueness as the schema.
pub struct MemoryUserRepository {
    users: RwLock<Vec<User>>,
    next_id: AtomicI64,
}

impl Default for MemoryUserRepository {
    fn default() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_last_admin(users: &[User], id: i64) -> bool {
        let mut admins = users.iter().filter(|user| user.role == Role::Admin);
        matches!((admins.next(), admins.next()), (Some(admin), None) if admin.id == id)
    }

    fn ensure_unique(users: &[User], username: &str, email: &str, except: Option<i64>) -> Result<(), StoreError> {
        let clash = users.iter().find(|user| {
            Some(user.id) != except && (user.username == username || user.email == email)
        });
        match clash {
            Some(user) if user.username == username => Err(StoreError::Conflict(format!(
                "username '{username}' is already taken"
            ))),
            Some(_) => Err(StoreError::Conflict(format!(
                "email '{email}' is already registered"
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users = self.users.read().await.clone();
        users.sort_by_key(|user| user.id);
        Ok(users)
    }

    async fn find_user(&self, id: i64) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .iter()
            .find(|user| user.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn count_by_role(&self, role: Role) -> Result<i64, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|user| user.role == role)
            .count() as i64)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        Self::ensure_unique(&users, &user.username, &user.email, None)?;

        let now = Utc::now();
        let created = User {
            id: self.next_id.fetch_add(1, AtomicOrdering::SeqCst),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn save_user(&self, user: &User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        Self::ensure_unique(&users, &user.username, &user.email, Some(user.id))?;
        if user.role != Role::Admin && Self::is_last_admin(&users, user.id) {
            return Err(StoreError::LastAdmin);
        }

        let stored = users
            .iter_mut()
            .find(|stored| stored.id == user.id)
            .ok_or(StoreError::NotFound)?;
        *stored = User {
            updated_at: Utc::now(),
            ..user.clone()
        };
        Ok(stored.clone())
    }

    async fn delete_user(&self, id: i64) -> Result<u64, StoreError> {
        let mut users = self.users.write().await;
        if Self::is_last_admin(&users, id) {
            return Err(StoreError::LastAdmin);
        }

        let before = users.len();
        users.retain(|user| user.id != id);
        Ok((before - users.len()) as u64)
    }
}
