//! Database layer
//!
//! Persistence for the blog backend over SQLite (default, single file) or
//! MySQL. The driver is selected from configuration.
//!
//! # Usage
//!
//! ```ignore
//! use blogroll::config::DatabaseConfig;
//! use blogroll::db::{create_pool, migrations, UnitOfWork};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//!
//! let mut uow = UnitOfWork::begin(&pool).await?;
//! // repository calls take `&mut uow`
//! uow.commit().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;
pub mod unit_of_work;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
pub use unit_of_work::{Connection, UnitOfWork};
