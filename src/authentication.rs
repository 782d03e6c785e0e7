use std::sync::LazyLock;

use crate::{
    entities::{validate_email, validate_password, validate_username, User},
    error::{AppError, FieldErrors, InternalError},
};

pub type AuthSession = axum_login::AuthSession<SqliteAuthBackend>;

/// Checked in place of a real hash when the username is unknown, so that
/// both ways of failing a login cost one argon2 verification.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| password_auth::generate_hash("unknown-user-placeholder"));

/// Blocking: runs one argon2 verification whether or not there is a hash.
fn verify_password(password: &str, hash: Option<&str>) -> bool {
    let checked = hash.unwrap_or(DUMMY_HASH.as_str());
    let verified = password_auth::verify_password(password, checked);
    hash.is_some() && verified.is_ok()
}

#[derive(Clone, serde::Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::Sqlx(e) => Self::Internal(e.into()),
            Error::TaskJoin(e) => Self::Internal(e.into()),
        }
    }
}

impl From<axum_login::Error<SqliteAuthBackend>> for AppError {
    fn from(err: axum_login::Error<SqliteAuthBackend>) -> Self {
        match err {
            axum_login::Error::Session(e) => Self::Internal(e.into()),
            axum_login::Error::Backend(e) => e.into(),
        }
    }
}

/// Credential store: users and their argon2 password hashes.
#[derive(Debug, Clone)]
pub struct SqliteAuthBackend {
    pub sqlite_pool: sqlx::SqlitePool,
}

impl SqliteAuthBackend {
    pub fn new(sqlite_pool: sqlx::SqlitePool) -> Self {
        Self { sqlite_pool }
    }

    /// Creates a user after checking username, email and password policy.
    ///
    /// Only the password hash is persisted.
    #[tracing::instrument(skip(self, email, password))]
    pub async fn register(
        &self,
        username: &str,
        email: Option<&str>,
        password: &str,
    ) -> Result<User, AppError> {
        let username = username.trim();
        let email = email.map(str::trim).unwrap_or_default();

        let mut errors = FieldErrors::new();
        validate_username(username, &mut errors);
        validate_email(email, &mut errors);
        validate_password(username, password, &mut errors);

        if errors.get("username").is_empty() && self.username_taken(username).await? {
            errors.add("username", "A user with that username already exists.");
        }
        errors.into_result()?;

        let password = password.to_owned();
        // `password_auth::generate_hash()` is blocking as well
        let password_hash =
            tokio::task::spawn_blocking(move || password_auth::generate_hash(password)).await?;

        let inserted = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?) \
             RETURNING id, username, email, password_hash",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.sqlite_pool)
        .await;

        match inserted {
            Ok(user) => {
                tracing::info!(user_id = user.id, "user registered");
                Ok(user)
            }
            // lost a race against a concurrent registration of the same name
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(AppError::Validation(
                FieldErrors::single("username", "A user with that username already exists."),
            )),
            Err(e) => Err(AppError::Internal(InternalError::Sqlx(e))),
        }
    }

    async fn username_taken(&self, username: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.sqlite_pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn find_user(&self, user_id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT id, username, email, password_hash FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.sqlite_pool)
            .await
    }
}

#[async_trait::async_trait]
impl axum_login::AuthnBackend for SqliteAuthBackend {
    type User = crate::entities::User;
    type Credentials = self::Credentials;
    type Error = self::Error;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        let user: Option<Self::User> = sqlx::query_as(
            "SELECT id, username, email, password_hash FROM users WHERE username = ?",
        )
        .bind(creds.username)
        .fetch_optional(&self.sqlite_pool)
        .await?;

        // argon2 verification is blocking, hence `tokio::task::spawn_blocking()`
        tokio::task::spawn_blocking(move || {
            // compares form input with argon2 password hash
            let hash = user.as_ref().map(|user| user.password_hash.as_str());
            let verified = verify_password(&creds.password, hash);
            Ok(user.filter(|_| verified))
        })
        .await?
    }

    async fn get_user(
        &self,
        user_id: &axum_login::UserId<Self>,
    ) -> Result<Option<Self::User>, Self::Error> {
        Ok(self.find_user(*user_id).await?)
    }
}
