//! Image repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

use crate::db::{Connection, UnitOfWork};
use crate::models::{page_offset, Image, Page};

/// Image repository trait
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Insert an image record for an already stored file
    async fn create(&self, uow: &mut UnitOfWork, url: &str) -> Result<Image>;

    async fn find_by_id(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Image>>;

    async fn list(&self, uow: &mut UnitOfWork, page: i64, per_page: i64) -> Result<Page<Image>>;

    /// Images attached to a blog post
    async fn list_by_blog_post(&self, uow: &mut UnitOfWork, blog_post_id: i64) -> Result<Vec<Image>>;
}

/// SQLx-based image repository implementation
pub struct SqlxImageRepository;

impl SqlxImageRepository {
    pub fn boxed() -> Arc<dyn ImageRepository> {
        Arc::new(Self)
    }
}

const BY_ID: &str = "SELECT id, url FROM images WHERE id = ?";
const PAGE: &str = "SELECT id, url FROM images ORDER BY id ASC LIMIT ? OFFSET ?";
const BY_POST: &str = r#"
    SELECT i.id, i.url
    FROM images i
    JOIN blog_post_images bpi ON bpi.image_id = i.id
    WHERE bpi.blog_post_id = ?
    ORDER BY i.id ASC
"#;

fn row_to_image_sqlite(row: &SqliteRow) -> Result<Image> {
    Ok(Image {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
    })
}

fn row_to_image_mysql(row: &MySqlRow) -> Result<Image> {
    Ok(Image {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
    })
}

#[async_trait]
impl ImageRepository for SqlxImageRepository {
    async fn create(&self, uow: &mut UnitOfWork, url: &str) -> Result<Image> {
        const SQL: &str = "INSERT INTO images (url) VALUES (?)";

        let id = match uow.connection() {
            Connection::Sqlite(conn) => sqlx::query(SQL)
                .bind(url)
                .execute(conn)
                .await
                .context("Failed to create image")?
                .last_insert_rowid(),
            Connection::Mysql(conn) => sqlx::query(SQL)
                .bind(url)
                .execute(conn)
                .await
                .context("Failed to create image")?
                .last_insert_id() as i64,
        };

        Ok(Image {
            id,
            url: url.to_string(),
        })
    }

    async fn find_by_id(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Image>> {
        match uow.connection() {
            Connection::Sqlite(conn) => sqlx::query(BY_ID)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get image by ID")?
                .as_ref()
                .map(row_to_image_sqlite)
                .transpose(),
            Connection::Mysql(conn) => sqlx::query(BY_ID)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get image by ID")?
                .as_ref()
                .map(row_to_image_mysql)
                .transpose(),
        }
    }

    async fn list(&self, uow: &mut UnitOfWork, page: i64, per_page: i64) -> Result<Page<Image>> {
        let offset = page_offset(page, per_page);
        let images = match uow.connection() {
            Connection::Sqlite(conn) => sqlx::query(PAGE)
                .bind(per_page + 1)
                .bind(offset)
                .fetch_all(conn)
                .await
                .context("Failed to list images")?
                .iter()
                .map(row_to_image_sqlite)
                .collect::<Result<Vec<_>>>()?,
            Connection::Mysql(conn) => sqlx::query(PAGE)
                .bind(per_page + 1)
                .bind(offset)
                .fetch_all(conn)
                .await
                .context("Failed to list images")?
                .iter()
                .map(row_to_image_mysql)
                .collect::<Result<Vec<_>>>()?,
        };
        Ok(Page::from_overfetch(images, page, per_page))
    }

    async fn list_by_blog_post(&self, uow: &mut UnitOfWork, blog_post_id: i64) -> Result<Vec<Image>> {
        match uow.connection() {
            Connection::Sqlite(conn) => sqlx::query(BY_POST)
                .bind(blog_post_id)
                .fetch_all(conn)
                .await
                .context("Failed to list blog post images")?
                .iter()
                .map(row_to_image_sqlite)
                .collect(),
            Connection::Mysql(conn) => sqlx::query(BY_POST)
                .bind(blog_post_id)
                .fetch_all(conn)
                .await
                .context("Failed to list blog post images")?
                .iter()
                .map(row_to_image_mysql)
                .collect(),
        }
    }
}
