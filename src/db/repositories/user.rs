//! User repository
//!
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing it for SQLite and MySQL

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{MySqlConnection, Row, SqliteConnection};
use std::sync::Arc;

use crate::db::{Connection, UnitOfWork};
use crate::models::{page_offset, NewUser, Page, User};

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user
    async fn create(&self, uow: &mut UnitOfWork, user: &NewUser) -> Result<User>;

    async fn find_by_id(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<User>>;

    async fn find_by_username(&self, uow: &mut UnitOfWork, username: &str) -> Result<Option<User>>;

    async fn find_by_email(&self, uow: &mut UnitOfWork, email: &str) -> Result<Option<User>>;

    /// Find the user holding a pending confirmation token
    async fn find_by_confirmation_token(
        &self,
        uow: &mut UnitOfWork,
        token: &str,
    ) -> Result<Option<User>>;

    /// Write every mutable column of `user` back
    async fn update(&self, uow: &mut UnitOfWork, user: &User) -> Result<User>;

    /// List users ordered by id
    async fn list(&self, uow: &mut UnitOfWork, page: i64, per_page: i64) -> Result<Page<User>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository;

impl SqlxUserRepository {
    /// Create a boxed repository for use with dependency injection
    pub fn boxed() -> Arc<dyn UserRepository> {
        Arc::new(Self)
    }
}

const SELECT_USER: &str = r#"
    SELECT id, username, name, email, password_hash, roles, enabled,
           confirmation_token, password_change_date
    FROM users
"#;

const INSERT_USER: &str = r#"
    INSERT INTO users (username, name, email, password_hash, roles, enabled, confirmation_token)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_USER: &str = r#"
    UPDATE users
    SET name = ?, email = ?, password_hash = ?, roles = ?, enabled = ?,
        confirmation_token = ?, password_change_date = ?
    WHERE id = ?
"#;

/// Column a single-user lookup filters on
#[derive(Clone, Copy)]
enum Lookup {
    Id,
    Username,
    Email,
    ConfirmationToken,
}

impl Lookup {
    fn sql(self) -> String {
        let column = match self {
            Lookup::Id => "id",
            Lookup::Username => "username",
            Lookup::Email => "email",
            Lookup::ConfirmationToken => "confirmation_token",
        };
        format!("{} WHERE {} = ?", SELECT_USER, column)
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, uow: &mut UnitOfWork, user: &NewUser) -> Result<User> {
        let id = match uow.connection() {
            Connection::Sqlite(conn) => create_user_sqlite(conn, user).await?,
            Connection::Mysql(conn) => create_user_mysql(conn, user).await?,
        };

        Ok(User {
            id,
            username: user.username.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            roles: user.roles.clone(),
            enabled: user.enabled,
            confirmation_token: user.confirmation_token.clone(),
            password_change_date: None,
        })
    }

    async fn find_by_id(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<User>> {
        match uow.connection() {
            Connection::Sqlite(conn) => find_user_by_id_sqlite(conn, id).await,
            Connection::Mysql(conn) => find_user_by_id_mysql(conn, id).await,
        }
    }

    async fn find_by_username(&self, uow: &mut UnitOfWork, username: &str) -> Result<Option<User>> {
        match uow.connection() {
            Connection::Sqlite(conn) => find_user_sqlite(conn, Lookup::Username, username).await,
            Connection::Mysql(conn) => find_user_mysql(conn, Lookup::Username, username).await,
        }
    }

    async fn find_by_email(&self, uow: &mut UnitOfWork, email: &str) -> Result<Option<User>> {
        match uow.connection() {
            Connection::Sqlite(conn) => find_user_sqlite(conn, Lookup::Email, email).await,
            Connection::Mysql(conn) => find_user_mysql(conn, Lookup::Email, email).await,
        }
    }

    async fn find_by_confirmation_token(
        &self,
        uow: &mut UnitOfWork,
        token: &str,
    ) -> Result<Option<User>> {
        match uow.connection() {
            Connection::Sqlite(conn) => {
                find_user_sqlite(conn, Lookup::ConfirmationToken, token).await
            }
            Connection::Mysql(conn) => {
                find_user_mysql(conn, Lookup::ConfirmationToken, token).await
            }
        }
    }

    async fn update(&self, uow: &mut UnitOfWork, user: &User) -> Result<User> {
        let updated = match uow.connection() {
            Connection::Sqlite(conn) => {
                update_user_sqlite(&mut *conn, user).await?;
                find_user_by_id_sqlite(conn, user.id).await?
            }
            Connection::Mysql(conn) => {
                update_user_mysql(&mut *conn, user).await?;
                find_user_by_id_mysql(conn, user.id).await?
            }
        };

        updated.ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn list(&self, uow: &mut UnitOfWork, page: i64, per_page: i64) -> Result<Page<User>> {
        let offset = page_offset(page, per_page);
        let users = match uow.connection() {
            Connection::Sqlite(conn) => list_users_sqlite(conn, per_page + 1, offset).await?,
            Connection::Mysql(conn) => list_users_mysql(conn, per_page + 1, offset).await?,
        };
        Ok(Page::from_overfetch(users, page, per_page))
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(conn: &mut SqliteConnection, user: &NewUser) -> Result<i64> {
    let result = sqlx::query(INSERT_USER)
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.roles.to_db_string())
        .bind(user.enabled)
        .bind(&user.confirmation_token)
        .execute(conn)
        .await
        .context("Failed to create user")?;

    Ok(result.last_insert_rowid())
}

async fn find_user_by_id_sqlite(conn: &mut SqliteConnection, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&Lookup::Id.sql())
        .bind(id)
        .fetch_optional(conn)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn find_user_sqlite(
    conn: &mut SqliteConnection,
    lookup: Lookup,
    value: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(&lookup.sql())
        .bind(value)
        .fetch_optional(conn)
        .await
        .context("Failed to look up user")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn update_user_sqlite(conn: &mut SqliteConnection, user: &User) -> Result<()> {
    sqlx::query(UPDATE_USER)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.roles.to_db_string())
        .bind(user.enabled)
        .bind(&user.confirmation_token)
        .bind(user.password_change_date)
        .bind(user.id)
        .execute(conn)
        .await
        .context("Failed to update user")?;
    Ok(())
}

async fn list_users_sqlite(conn: &mut SqliteConnection, limit: i64, offset: i64) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!("{} ORDER BY id ASC LIMIT ? OFFSET ?", SELECT_USER))
        .bind(limit)
        .bind(offset)
        .fetch_all(conn)
        .await
        .context("Failed to list users")?;

    rows.iter().map(row_to_user_sqlite).collect()
}

fn row_to_user_sqlite(row: &SqliteRow) -> Result<User> {
    let roles: String = row.try_get("roles")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        roles: roles.parse()?,
        enabled: row.try_get("enabled")?,
        confirmation_token: row.try_get("confirmation_token")?,
        password_change_date: row.try_get("password_change_date")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(conn: &mut MySqlConnection, user: &NewUser) -> Result<i64> {
    let result = sqlx::query(INSERT_USER)
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.roles.to_db_string())
        .bind(user.enabled)
        .bind(&user.confirmation_token)
        .execute(conn)
        .await
        .context("Failed to create user")?;

    Ok(result.last_insert_id() as i64)
}

async fn find_user_by_id_mysql(conn: &mut MySqlConnection, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&Lookup::Id.sql())
        .bind(id)
        .fetch_optional(conn)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn find_user_mysql(
    conn: &mut MySqlConnection,
    lookup: Lookup,
    value: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(&lookup.sql())
        .bind(value)
        .fetch_optional(conn)
        .await
        .context("Failed to look up user")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn update_user_mysql(conn: &mut MySqlConnection, user: &User) -> Result<()> {
    sqlx::query(UPDATE_USER)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.roles.to_db_string())
        .bind(user.enabled)
        .bind(&user.confirmation_token)
        .bind(user.password_change_date)
        .bind(user.id)
        .execute(conn)
        .await
        .context("Failed to update user")?;
    Ok(())
}

async fn list_users_mysql(conn: &mut MySqlConnection, limit: i64, offset: i64) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!("{} ORDER BY id ASC LIMIT ? OFFSET ?", SELECT_USER))
        .bind(limit)
        .bind(offset)
        .fetch_all(conn)
        .await
        .context("Failed to list users")?;

    rows.iter().map(row_to_user_mysql).collect()
}

fn row_to_user_mysql(row: &MySqlRow) -> Result<User> {
    let roles: String = row.try_get("roles")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        roles: roles.parse()?,
        enabled: row.try_get("enabled")?,
        confirmation_token: row.try_get("confirmation_token")?,
        password_change_date: row.try_get("password_change_date")?,
    })
}
