use std::sync::LazyLock;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

use crate::{
    models::{NewUser, Role, User},
    repository::{StoreError, UserRepository},
};

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("user '{0}' already exists")]
    UsernameTaken(String),

    #[error("{0} must not be empty")]
    Blank(&'static str),

    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Verified against when the username is unknown, so both login failures cost the same.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("clinic-cms-dummy-password").ok());

/// Hashes `password` into a PHC string with a fresh random salt.
///
/// CPU-bound; async callers run it on a blocking thread.
pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(AccountError::Hash)
}

/// Checks `password` against a stored PHC string. Malformed hashes never verify.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        tracing::warn!("stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// authenticate
///
/// Resolves a username and password to the matching user. Unknown users still pay for one
/// verification against [`DUMMY_HASH`].
pub async fn authenticate(
    users: &dyn UserRepository,
    username: &str,
    password: &str,
) -> Result<Option<User>, crate::error::ApiError> {
    let user = users.find_by_username(username).await?;
    let stored_hash = match &user {
        Some(user) => Some(user.password_hash.clone()),
        None => DUMMY_HASH.clone(),
    };
    let password = password.to_owned();

    let verified = tokio::task::spawn_blocking(move || {
        stored_hash.is_some_and(|hash| verify_password(&password, &hash))
    })
    .await?;

    Ok(user.filter(|_| verified))
}

/// create_superuser
///
/// Creates an account with `role`, refusing usernames that already exist. Shared by the
/// `create_admin` binary and the tests.
pub async fn create_superuser(
    users: &dyn UserRepository,
    role: Role,
    username: &str,
    password: &str,
    email: &str,
) -> Result<User, AccountError> {
    let username = username.trim();
    let email = email.trim();
    if username.is_empty() {
        return Err(AccountError::Blank("username"));
    }
    if password.is_empty() {
        return Err(AccountError::Blank("password"));
    }

    if users.find_by_username(username).await?.is_some() {
        return Err(AccountError::UsernameTaken(username.to_owned()));
    }

    let created = users
        .create_user(NewUser {
            username: username.to_owned(),
            email: email.to_owned(),
            password_hash: hash_password(password)?,
            role,
        })
        .await?;

    tracing::info!(user = %created.username, role = %created.role, "account created");
    Ok(created)
}
