//! SQLite storage implementation
//!
//! The schema carries the invariants itself: `UNIQUE` on `users.email` and
//! `tokens.token_digest`, and `ON DELETE CASCADE` from tokens to users.
//! Constraint failures are translated into the crate's error taxonomy
//! instead of being checked beforehand.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::traits::*;
use crate::auth::token::{Token, TokenDigest};
use crate::auth::user::User;
use crate::error::{Result, RustyKeysError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_digest TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tokens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE ON UPDATE CASCADE,
    token_digest BLOB NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    expiry TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tokens_user_id ON tokens(user_id);
CREATE INDEX IF NOT EXISTS idx_tokens_expiry ON tokens(expiry);
";

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, password_digest, active, created_at, updated_at";
const TOKEN_COLUMNS: &str = "id, user_id, token_digest, created_at, expiry";

/// SQLite-backed combined storage provider
#[derive(Clone)]
pub struct SqliteStorageProvider {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStorageProvider {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let con = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        Self::from_connection(con)
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(con: Connection) -> Result<Self> {
        // Foreign keys are off by default in SQLite, and the cascade depends on them
        con.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            db: Arc::new(Mutex::new(con)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut con = db.lock()?;
            f(&mut con)
        })
        .await?
    }
}

fn constraint_message(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            Some(msg.as_deref().unwrap_or(""))
        }
        _ => None,
    }
}

fn map_user_write_error(err: rusqlite::Error, email: &str) -> RustyKeysError {
    match constraint_message(&err) {
        Some(msg) if msg.contains("users.email") => RustyKeysError::ValidationError(format!(
            "email: {} is already registered",
            email
        )),
        _ => err.into(),
    }
}

fn map_token_write_error(err: rusqlite::Error, token: &Token) -> RustyKeysError {
    match constraint_message(&err) {
        Some(msg) if msg.contains("tokens.token_digest") => RustyKeysError::Conflict(format!(
            "token digest {} already exists",
            token.token_digest.short()
        )),
        Some(msg) if msg.contains("FOREIGN KEY") => {
            RustyKeysError::NotFound(format!("user {}", token.user_id))
        }
        _ => err.into(),
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        email: row.get("email")?,
        password_digest: row.get("password_digest")?,
        active: row.get("active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    let raw: Vec<u8> = row.get("token_digest")?;
    let token_digest = TokenDigest::from_bytes(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Blob,
            format!("token digest must be 32 bytes, got {}", raw.len()).into(),
        )
    })?;

    Ok(Token {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        token_digest,
        created_at: row.get("created_at")?,
        expiry: row.get("expiry")?,
    })
}

#[async_trait]
impl StorageProvider for SqliteStorageProvider {
    async fn initialize(&self) -> Result<()> {
        self.with_db(|con| {
            con.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        log::info!("SQLite storage provider initialized");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        self.with_db(|con| {
            let one: i64 = con.query_row("SELECT 1", [], |row| row.get(0))?;
            Ok(one == 1)
        })
        .await
    }

    fn provider_name(&self) -> &'static str {
        "sqlite"
    }
}

#[async_trait]
impl UserStorage for SqliteStorageProvider {
    async fn insert_user(&self, user: &User) -> Result<i64> {
        let user = user.clone();
        self.with_db(move |con| {
            con.execute(
                "INSERT INTO users (first_name, last_name, email, password_digest, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.first_name,
                    user.last_name,
                    user.email,
                    user.password_digest,
                    user.active,
                    user.created_at,
                    user.updated_at,
                ],
            )
            .map_err(|e| map_user_write_error(e, &user.email))?;
            Ok(con.last_insert_rowid())
        })
        .await
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.with_db(move |con| {
            let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
            Ok(con.query_row(&sql, params![user_id], user_from_row).optional()?)
        })
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();
        self.with_db(move |con| {
            let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
            Ok(con.query_row(&sql, params![email], user_from_row).optional()?)
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.with_db(|con| {
            let sql = format!(
                "SELECT {} FROM users ORDER BY created_at DESC, id DESC",
                USER_COLUMNS
            );
            let mut stmt = con.prepare(&sql)?;
            let users = stmt
                .query_map([], user_from_row)?
                .collect::<rusqlite::Result<Vec<User>>>()?;
            Ok(users)
        })
        .await
    }

    async fn update_user(&self, user: &User) -> Result<bool> {
        let user = user.clone();
        self.with_db(move |con| {
            let changed = con
                .execute(
                    "UPDATE users
                     SET first_name = ?1, last_name = ?2, email = ?3, password_digest = ?4,
                         active = ?5, updated_at = ?6
                     WHERE id = ?7",
                    params![
                        user.first_name,
                        user.last_name,
                        user.email,
                        user.password_digest,
                        user.active,
                        user.updated_at,
                        user.id,
                    ],
                )
                .map_err(|e| map_user_write_error(e, &user.email))?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool> {
        self.with_db(move |con| {
            let changed = con.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
            Ok(changed > 0)
        })
        .await
    }
}

#[async_trait]
impl TokenStorage for SqliteStorageProvider {
    async fn insert_token(&self, token: &Token) -> Result<i64> {
        let token = token.clone();
        self.with_db(move |con| {
            con.execute(
                "INSERT INTO tokens (user_id, token_digest, created_at, expiry)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    token.user_id,
                    &token.token_digest.as_bytes()[..],
                    token.created_at,
                    token.expiry,
                ],
            )
            .map_err(|e| map_token_write_error(e, &token))?;
            Ok(con.last_insert_rowid())
        })
        .await
    }

    async fn get_token(&self, token_id: i64) -> Result<Option<Token>> {
        self.with_db(move |con| {
            let sql = format!("SELECT {} FROM tokens WHERE id = ?1", TOKEN_COLUMNS);
            Ok(con.query_row(&sql, params![token_id], token_from_row).optional()?)
        })
        .await
    }

    async fn get_token_by_digest(&self, digest: &TokenDigest) -> Result<Option<Token>> {
        let digest = *digest;
        self.with_db(move |con| {
            let sql = format!("SELECT {} FROM tokens WHERE token_digest = ?1", TOKEN_COLUMNS);
            Ok(con
                .query_row(&sql, params![&digest.as_bytes()[..]], token_from_row)
                .optional()?)
        })
        .await
    }

    async fn list_user_tokens(&self, user_id: i64) -> Result<Vec<Token>> {
        self.with_db(move |con| {
            let sql = format!(
                "SELECT {} FROM tokens WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
                TOKEN_COLUMNS
            );
            let mut stmt = con.prepare(&sql)?;
            let tokens = stmt
                .query_map(params![user_id], token_from_row)?
                .collect::<rusqlite::Result<Vec<Token>>>()?;
            Ok(tokens)
        })
        .await
    }

    async fn delete_token(&self, token_id: i64) -> Result<bool> {
        self.with_db(move |con| {
            let changed = con.execute("DELETE FROM tokens WHERE id = ?1", params![token_id])?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete_token_by_digest(&self, digest: &TokenDigest) -> Result<bool> {
        let digest = *digest;
        self.with_db(move |con| {
            let changed = con.execute(
                "DELETE FROM tokens WHERE token_digest = ?1",
                params![&digest.as_bytes()[..]],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete_user_tokens(&self, user_id: i64) -> Result<usize> {
        self.with_db(move |con| {
            Ok(con.execute("DELETE FROM tokens WHERE user_id = ?1", params![user_id])?)
        })
        .await
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_db(move |con| {
            Ok(con.execute("DELETE FROM tokens WHERE expiry <= ?1", params![now])?)
        })
        .await
    }
}
