//! Blog post repository
//!
//! Posts, their image links, and the filtered listing.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{MySql, MySqlConnection, Row, Sqlite, SqliteConnection};
use std::sync::Arc;

use crate::db::{Connection, UnitOfWork};
use crate::models::{
    page_offset, BlogPost, BlogPostFilter, BlogPostOrderField, NewBlogPost, Page, SortDirection,
};

/// Blog post repository trait
#[async_trait]
pub trait BlogPostRepository: Send + Sync {
    /// Insert a post and link its images. The draft must carry an author
    /// and a publication date.
    async fn create(&self, uow: &mut UnitOfWork, post: &NewBlogPost) -> Result<BlogPost>;

    async fn find_by_id(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<BlogPost>>;

    /// Update title, content and slug; replace the image links when `images`
    /// is given.
    async fn update(
        &self,
        uow: &mut UnitOfWork,
        post: &BlogPost,
        images: Option<&[i64]>,
    ) -> Result<BlogPost>;

    /// Filtered, partially paginated listing
    async fn list(&self, uow: &mut UnitOfWork, filter: &BlogPostFilter) -> Result<Page<BlogPost>>;
}

/// SQLx-based blog post repository implementation
pub struct SqlxBlogPostRepository;

impl SqlxBlogPostRepository {
    pub fn boxed() -> Arc<dyn BlogPostRepository> {
        Arc::new(Self)
    }
}

const SELECT_POST: &str =
    "SELECT p.id, p.title, p.content, p.slug, p.published, p.author_id FROM blog_posts p";

/// Bind value of a dynamically built listing query
#[derive(Debug, Clone, PartialEq)]
enum BindValue {
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
}

/// Build the listing SQL and its bind values. Placeholders are `?` for both
/// drivers.
fn build_list_query(filter: &BlogPostFilter) -> (String, Vec<BindValue>) {
    let mut sql = String::from(SELECT_POST);
    let mut conditions: Vec<&str> = Vec::new();
    let mut binds = Vec::new();

    if filter.author_name.is_some() {
        sql.push_str(" JOIN users u ON u.id = p.author_id");
    }

    let like = |value: &str| BindValue::Text(format!("%{}%", value.to_lowercase()));

    if let Some(title) = &filter.title {
        conditions.push("LOWER(p.title) LIKE ?");
        binds.push(like(title));
    }
    if let Some(content) = &filter.content {
        conditions.push("LOWER(p.content) LIKE ?");
        binds.push(like(content));
    }
    if let Some(name) = &filter.author_name {
        conditions.push("LOWER(u.name) LIKE ?");
        binds.push(like(name));
    }
    if let Some(author) = filter.author {
        conditions.push("p.author_id = ?");
        binds.push(BindValue::Int(author));
    }
    if let Some(after) = filter.published_after {
        conditions.push("p.published >= ?");
        binds.push(BindValue::Time(after));
    }
    if let Some(before) = filter.published_before {
        conditions.push("p.published <= ?");
        binds.push(BindValue::Time(before));
    }
    if let Some(gte) = filter.id_gte {
        conditions.push("p.id >= ?");
        binds.push(BindValue::Int(gte));
    }
    if let Some(lte) = filter.id_lte {
        conditions.push("p.id <= ?");
        binds.push(BindValue::Int(lte));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    let mut order: Vec<(BlogPostOrderField, SortDirection)> = if filter.order.is_empty() {
        vec![(BlogPostOrderField::Published, SortDirection::Desc)]
    } else {
        filter.order.clone()
    };
    // Stable pages need a unique tiebreaker.
    if !order.iter().any(|(field, _)| *field == BlogPostOrderField::Id) {
        order.push((BlogPostOrderField::Id, SortDirection::Desc));
    }
    let order_by: Vec<String> = order
        .iter()
        .map(|(field, direction)| format!("{} {}", field.column(), direction.keyword()))
        .collect();
    sql.push_str(" ORDER BY ");
    sql.push_str(&order_by.join(", "));

    let per_page = filter.items_per_page.clamp(1, BlogPostFilter::MAX_ITEMS_PER_PAGE);
    let page = filter.page.max(1);
    sql.push_str(" LIMIT ? OFFSET ?");
    binds.push(BindValue::Int(per_page + 1));
    binds.push(BindValue::Int(page_offset(page, per_page)));

    (sql, binds)
}

#[async_trait]
impl BlogPostRepository for SqlxBlogPostRepository {
    async fn create(&self, uow: &mut UnitOfWork, post: &NewBlogPost) -> Result<BlogPost> {
        let author_id = post
            .author_id
            .ok_or_else(|| anyhow!("Refusing to persist a blog post without an author"))?;
        let published = post
            .published
            .ok_or_else(|| anyhow!("Refusing to persist a blog post without a publication date"))?;

        let id = match uow.connection() {
            Connection::Sqlite(conn) => {
                create_post_sqlite(conn, post, author_id, published).await?
            }
            Connection::Mysql(conn) => create_post_mysql(conn, post, author_id, published).await?,
        };

        Ok(BlogPost {
            id,
            title: post.title.clone(),
            content: post.content.clone(),
            slug: post.slug.clone(),
            published,
            author_id,
        })
    }

    async fn find_by_id(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<BlogPost>> {
        let sql = format!("{} WHERE p.id = ?", SELECT_POST);
        match uow.connection() {
            Connection::Sqlite(conn) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(conn)
                    .await
                    .context("Failed to get blog post by ID")?;
                row.as_ref().map(row_to_post_sqlite).transpose()
            }
            Connection::Mysql(conn) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(conn)
                    .await
                    .context("Failed to get blog post by ID")?;
                row.as_ref().map(row_to_post_mysql).transpose()
            }
        }
    }

    async fn update(
        &self,
        uow: &mut UnitOfWork,
        post: &BlogPost,
        images: Option<&[i64]>,
    ) -> Result<BlogPost> {
        const SQL: &str = "UPDATE blog_posts SET title = ?, content = ?, slug = ? WHERE id = ?";

        match uow.connection() {
            Connection::Sqlite(conn) => {
                sqlx::query(SQL)
                    .bind(&post.title)
                    .bind(&post.content)
                    .bind(&post.slug)
                    .bind(post.id)
                    .execute(&mut *conn)
                    .await
                    .context("Failed to update blog post")?;
                if let Some(images) = images {
                    replace_images_sqlite(conn, post.id, images).await?;
                }
            }
            Connection::Mysql(conn) => {
                sqlx::query(SQL)
                    .bind(&post.title)
                    .bind(&post.content)
                    .bind(&post.slug)
                    .bind(post.id)
                    .execute(&mut *conn)
                    .await
                    .context("Failed to update blog post")?;
                if let Some(images) = images {
                    replace_images_mysql(conn, post.id, images).await?;
                }
            }
        }

        self.find_by_id(uow, post.id)
            .await?
            .ok_or_else(|| anyhow!("Blog post not found after update"))
    }

    async fn list(&self, uow: &mut UnitOfWork, filter: &BlogPostFilter) -> Result<Page<BlogPost>> {
        let (sql, binds) = build_list_query(filter);
        let per_page = filter.items_per_page.clamp(1, BlogPostFilter::MAX_ITEMS_PER_PAGE);

        let posts = match uow.connection() {
            Connection::Sqlite(conn) => {
                let mut query = sqlx::query(&sql);
                for value in binds {
                    query = bind_sqlite(query, value);
                }
                let rows = query
                    .fetch_all(conn)
                    .await
                    .context("Failed to list blog posts")?;
                rows.iter().map(row_to_post_sqlite).collect::<Result<Vec<_>>>()?
            }
            Connection::Mysql(conn) => {
                let mut query = sqlx::query(&sql);
                for value in binds {
                    query = bind_mysql(query, value);
                }
                let rows = query
                    .fetch_all(conn)
                    .await
                    .context("Failed to list blog posts")?;
                rows.iter().map(row_to_post_mysql).collect::<Result<Vec<_>>>()?
            }
        };

        Ok(Page::from_overfetch(posts, filter.page.max(1), per_page))
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn bind_sqlite<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: BindValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        BindValue::Int(v) => query.bind(v),
        BindValue::Text(v) => query.bind(v),
        BindValue::Time(v) => query.bind(v),
    }
}

async fn create_post_sqlite(
    conn: &mut SqliteConnection,
    post: &NewBlogPost,
    author_id: i64,
    published: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO blog_posts (title, content, slug, published, author_id) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.slug)
    .bind(published)
    .bind(author_id)
    .execute(&mut *conn)
    .await
    .context("Failed to create blog post")?;

    let id = result.last_insert_rowid();
    replace_images_sqlite(conn, id, &post.images).await?;
    Ok(id)
}

async fn replace_images_sqlite(conn: &mut SqliteConnection, post_id: i64, images: &[i64]) -> Result<()> {
    sqlx::query("DELETE FROM blog_post_images WHERE blog_post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear blog post images")?;

    for image_id in images {
        sqlx::query("INSERT OR IGNORE INTO blog_post_images (blog_post_id, image_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(image_id)
            .execute(&mut *conn)
            .await
            .context("Failed to link blog post image")?;
    }
    Ok(())
}

fn row_to_post_sqlite(row: &SqliteRow) -> Result<BlogPost> {
    Ok(BlogPost {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        slug: row.try_get("slug")?,
        published: row.try_get("published")?,
        author_id: row.try_get("author_id")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn bind_mysql<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: BindValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        BindValue::Int(v) => query.bind(v),
        BindValue::Text(v) => query.bind(v),
        BindValue::Time(v) => query.bind(v),
    }
}

async fn create_post_mysql(
    conn: &mut MySqlConnection,
    post: &NewBlogPost,
    author_id: i64,
    published: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO blog_posts (title, content, slug, published, author_id) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.slug)
    .bind(published)
    .bind(author_id)
    .execute(&mut *conn)
    .await
    .context("Failed to create blog post")?;

    let id = result.last_insert_id() as i64;
    replace_images_mysql(conn, id, &post.images).await?;
    Ok(id)
}

async fn replace_images_mysql(conn: &mut MySqlConnection, post_id: i64, images: &[i64]) -> Result<()> {
    sqlx::query("DELETE FROM blog_post_images WHERE blog_post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear blog post images")?;

    for image_id in images {
        sqlx::query("INSERT IGNORE INTO blog_post_images (blog_post_id, image_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(image_id)
            .execute(&mut *conn)
            .await
            .context("Failed to link blog post image")?;
    }
    Ok(())
}

fn row_to_post_mysql(row: &MySqlRow) -> Result<BlogPost> {
    Ok(BlogPost {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        slug: row.try_get("slug")?,
        published: row.try_get("published")?,
        author_id: row.try_get("author_id")?,
    })
}
