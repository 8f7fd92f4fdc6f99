//! Comment repository

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

use crate::db::{Connection, UnitOfWork};
use crate::models::{page_offset, Comment, NewComment, Page};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Insert a comment. The draft must carry an author and a publication date.
    async fn create(&self, uow: &mut UnitOfWork, comment: &NewComment) -> Result<Comment>;

    async fn find_by_id(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Comment>>;

    /// Update the comment content
    async fn update(&self, uow: &mut UnitOfWork, comment: &Comment) -> Result<Comment>;

    /// List comments, newest first
    async fn list(&self, uow: &mut UnitOfWork, page: i64, per_page: i64) -> Result<Page<Comment>>;

    /// Comments of one blog post, oldest first
    async fn list_by_blog_post(&self, uow: &mut UnitOfWork, blog_post_id: i64)
        -> Result<Vec<Comment>>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository;

impl SqlxCommentRepository {
    pub fn boxed() -> Arc<dyn CommentRepository> {
        Arc::new(Self)
    }
}

const SELECT_COMMENT: &str =
    "SELECT id, content, published, author_id, blog_post_id FROM comments";

fn row_to_comment_sqlite(row: &SqliteRow) -> Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        published: row.try_get("published")?,
        author_id: row.try_get("author_id")?,
        blog_post_id: row.try_get("blog_post_id")?,
    })
}

fn row_to_comment_mysql(row: &MySqlRow) -> Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        published: row.try_get("published")?,
        author_id: row.try_get("author_id")?,
        blog_post_id: row.try_get("blog_post_id")?,
    })
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, uow: &mut UnitOfWork, comment: &NewComment) -> Result<Comment> {
        const SQL: &str =
            "INSERT INTO comments (content, published, author_id, blog_post_id) VALUES (?, ?, ?, ?)";

        let author_id = comment
            .author_id
            .ok_or_else(|| anyhow!("Refusing to persist a comment without an author"))?;
        let published = comment
            .published
            .ok_or_else(|| anyhow!("Refusing to persist a comment without a publication date"))?;

        let id = match uow.connection() {
            Connection::Sqlite(conn) => sqlx::query(SQL)
                .bind(&comment.content)
                .bind(published)
                .bind(author_id)
                .bind(comment.blog_post_id)
                .execute(conn)
                .await
                .context("Failed to create comment")?
                .last_insert_rowid(),
            Connection::Mysql(conn) => sqlx::query(SQL)
                .bind(&comment.content)
                .bind(published)
                .bind(author_id)
                .bind(comment.blog_post_id)
                .execute(conn)
                .await
                .context("Failed to create comment")?
                .last_insert_id() as i64,
        };

        Ok(Comment {
            id,
            content: comment.content.clone(),
            published,
            author_id,
            blog_post_id: comment.blog_post_id,
        })
    }

    async fn find_by_id(&self, uow: &mut UnitOfWork, id: i64) -> Result<Option<Comment>> {
        let sql = format!("{} WHERE id = ?", SELECT_COMMENT);
        match uow.connection() {
            Connection::Sqlite(conn) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(conn)
                    .await
                    .context("Failed to get comment by ID")?;
                row.as_ref().map(row_to_comment_sqlite).transpose()
            }
            Connection::Mysql(conn) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(conn)
                    .await
                    .context("Failed to get comment by ID")?;
                row.as_ref().map(row_to_comment_mysql).transpose()
            }
        }
    }

    async fn update(&self, uow: &mut UnitOfWork, comment: &Comment) -> Result<Comment> {
        const SQL: &str = "UPDATE comments SET content = ? WHERE id = ?";

        match uow.connection() {
            Connection::Sqlite(conn) => {
                sqlx::query(SQL)
                    .bind(&comment.content)
                    .bind(comment.id)
                    .execute(conn)
                    .await
                    .context("Failed to update comment")?;
            }
            Connection::Mysql(conn) => {
                sqlx::query(SQL)
                    .bind(&comment.content)
                    .bind(comment.id)
                    .execute(conn)
                    .await
                    .context("Failed to update comment")?;
            }
        }

        self.find_by_id(uow, comment.id)
            .await?
            .ok_or_else(|| anyhow!("Comment not found after update"))
    }

    async fn list(&self, uow: &mut UnitOfWork, page: i64, per_page: i64) -> Result<Page<Comment>> {
        let sql = format!(
            "{} ORDER BY published DESC, id DESC LIMIT ? OFFSET ?",
            SELECT_COMMENT
        );
        let offset = page_offset(page, per_page);

        let comments = match uow.connection() {
            Connection::Sqlite(conn) => {
                let rows = sqlx::query(&sql)
                    .bind(per_page + 1)
                    .bind(offset)
                    .fetch_all(conn)
                    .await
                    .context("Failed to list comments")?;
                rows.iter().map(row_to_comment_sqlite).collect::<Result<Vec<_>>>()?
            }
            Connection::Mysql(conn) => {
                let rows = sqlx::query(&sql)
                    .bind(per_page + 1)
                    .bind(offset)
                    .fetch_all(conn)
                    .await
                    .context("Failed to list comments")?;
                rows.iter().map(row_to_comment_mysql).collect::<Result<Vec<_>>>()?
            }
        };

        Ok(Page::from_overfetch(comments, page, per_page))
    }

    async fn list_by_blog_post(
        &self,
        uow: &mut UnitOfWork,
        blog_post_id: i64,
    ) -> Result<Vec<Comment>> {
        let sql = format!(
            "{} WHERE blog_post_id = ? ORDER BY published ASC, id ASC",
            SELECT_COMMENT
        );

        match uow.connection() {
            Connection::Sqlite(conn) => {
                let rows = sqlx::query(&sql)
                    .bind(blog_post_id)
                    .fetch_all(conn)
                    .await
                    .context("Failed to list blog post comments")?;
                rows.iter().map(row_to_comment_sqlite).collect()
            }
            Connection::Mysql(conn) => {
                let rows = sqlx::query(&sql)
                    .bind(blog_post_id)
                    .fetch_all(conn)
                    .await
                    .context("Failed to list blog post comments")?;
                rows.iter().map(row_to_comment_mysql).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        BlogPostRepository, SqlxBlogPostRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{NewBlogPost, NewUser};
    use chrono::Utc;

    #[tokio::test]
    async fn test_comment_lifecycle() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.unwrap();
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();

        let author = SqlxUserRepository::boxed()
            .create(
                &mut uow,
                &NewUser::pending(
                    "commenter".to_string(),
                    "Commenter".to_string(),
                    "commenter@example.com".to_string(),
                    "hash".to_string(),
                    "token".to_string(),
                ),
            )
            .await
            .unwrap();
        let post = SqlxBlogPostRepository::boxed()
            .create(
                &mut uow,
                &NewBlogPost {
                    title: "A title long enough".to_string(),
                    content: "Content that is certainly long enough".to_string(),
                    slug: "a-title".to_string(),
                    images: Vec::new(),
                    author_id: Some(author.id),
                    published: Some(Utc::now()),
                },
            )
            .await
            .unwrap();

        let repo = SqlxCommentRepository::boxed();
        let mut created = repo
            .create(
                &mut uow,
                &NewComment {
                    content: "First!".to_string(),
                    blog_post_id: post.id,
                    author_id: Some(author.id),
                    published: Some(Utc::now()),
                },
            )
            .await
            .unwrap();
        assert_eq!(created.blog_post_id, post.id);

        created.content = "Edited comment".to_string();
        let updated = repo.update(&mut uow, &created).await.unwrap();
        assert_eq!(updated.content, "Edited comment");

        let for_post = repo.list_by_blog_post(&mut uow, post.id).await.unwrap();
        assert_eq!(for_post.len(), 1);

        let page = repo.list(&mut uow, 1, 30).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_next_page);

        let missing_author = NewComment {
            content: "No author".to_string(),
            blog_post_id: post.id,
            author_id: None,
            published: Some(Utc::now()),
        };
        assert!(repo.create(&mut uow, &missing_author).await.is_err());
    }
}
