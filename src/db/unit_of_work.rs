//! Request-scoped unit of work
//!
//! A `UnitOfWork` owns one database transaction. Handlers open it at the start
//! of a request, pass it to every repository call, and commit it once on the
//! success path. Dropping it without committing rolls everything back.

use anyhow::{anyhow, Context, Result};
use sqlx::{MySql, MySqlConnection, Sqlite, SqliteConnection, Transaction};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

enum Tx {
    Sqlite(Transaction<'static, Sqlite>),
    Mysql(Transaction<'static, MySql>),
}

/// Pending changes of one request, committed atomically.
pub struct UnitOfWork {
    tx: Tx,
}

/// Borrowed connection of the running transaction, per driver.
pub enum Connection<'a> {
    Sqlite(&'a mut SqliteConnection),
    Mysql(&'a mut MySqlConnection),
}

impl UnitOfWork {
    /// Begin a new transaction on the pool.
    pub async fn begin(pool: &DynDatabasePool) -> Result<Self> {
        let tx = match pool.driver() {
            DatabaseDriver::Sqlite => {
                let sqlite = pool
                    .as_sqlite()
                    .ok_or_else(|| anyhow!("SQLite driver configured without a SQLite pool"))?;
                Tx::Sqlite(sqlite.begin().await.context("Failed to begin transaction")?)
            }
            DatabaseDriver::Mysql => {
                let mysql = pool
                    .as_mysql()
                    .ok_or_else(|| anyhow!("MySQL driver configured without a MySQL pool"))?;
                Tx::Mysql(mysql.begin().await.context("Failed to begin transaction")?)
            }
        };
        Ok(Self { tx })
    }

    /// Driver of the underlying transaction
    pub fn driver(&self) -> DatabaseDriver {
        match self.tx {
            Tx::Sqlite(_) => DatabaseDriver::Sqlite,
            Tx::Mysql(_) => DatabaseDriver::Mysql,
        }
    }

    /// Connection to run statements on inside this unit of work.
    pub fn connection(&mut self) -> Connection<'_> {
        match &mut self.tx {
            Tx::Sqlite(tx) => Connection::Sqlite(&mut **tx),
            Tx::Mysql(tx) => Connection::Mysql(&mut **tx),
        }
    }

    /// Commit every pending change.
    pub async fn commit(self) -> Result<()> {
        match self.tx {
            Tx::Sqlite(tx) => tx.commit().await,
            Tx::Mysql(tx) => tx.commit().await,
        }
        .context("Failed to commit transaction")
    }

    /// Discard every pending change.
    pub async fn rollback(self) -> Result<()> {
        match self.tx {
            Tx::Sqlite(tx) => tx.rollback().await,
            Tx::Mysql(tx) => tx.rollback().await,
        }
        .context("Failed to roll back transaction")
    }
}
