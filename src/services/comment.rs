//! Comment service

use anyhow::Context;
use std::sync::Arc;

use crate::db::repositories::{BlogPostRepository, CommentRepository};
use crate::db::UnitOfWork;
use crate::models::{Comment, NewComment, Page, User};
use crate::services::validation::Violations;

pub const MIN_COMMENT_LENGTH: usize = 5;
pub const MAX_COMMENT_LENGTH: usize = 3000;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Validation failed: {0}")]
    ValidationFailed(Violations),

    #[error("Comment not found: {0}")]
    NotFound(i64),

    #[error("Blog post not found: {0}")]
    BlogPostNotFound(i64),

    #[error("Not allowed to edit comment {0}")]
    Forbidden(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<Violations> for CommentServiceError {
    fn from(violations: Violations) -> Self {
        Self::ValidationFailed(violations)
    }
}

/// Comment service
pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn BlogPostRepository>,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentRepository>, posts: Arc<dyn BlogPostRepository>) -> Self {
        Self { comments, posts }
    }

    fn check_content(violations: &mut Violations, content: &str) {
        if violations.not_blank("content", content) {
            violations.min_length("content", content, MIN_COMMENT_LENGTH);
            violations.max_length("content", content, MAX_COMMENT_LENGTH);
        }
    }

    /// Persist a draft that already went through the pre-write rules.
    pub async fn create(
        &self,
        uow: &mut UnitOfWork,
        draft: &NewComment,
    ) -> Result<Comment, CommentServiceError> {
        let mut violations = Violations::new();
        Self::check_content(&mut violations, &draft.content);
        if self.posts.find_by_id(uow, draft.blog_post_id).await?.is_none() {
            violations.add(
                "blogPost",
                format!("Blog post {} does not exist.", draft.blog_post_id),
            );
        }
        violations.into_result()?;

        let comment = self
            .comments
            .create(uow, draft)
            .await
            .context("Failed to create comment")?;

        tracing::info!(
            "Created comment {} on blog post {}",
            comment.id,
            comment.blog_post_id
        );
        Ok(comment)
    }

    /// Replace the content of a comment. Editors may change any comment,
    /// everyone else only their own.
    pub async fn update(
        &self,
        uow: &mut UnitOfWork,
        id: i64,
        content: String,
        editor: &User,
    ) -> Result<Comment, CommentServiceError> {
        let mut comment = self.get(uow, id).await?;

        if !editor.can_edit(comment.author_id) {
            tracing::warn!("User {} may not edit comment {}", editor.id, id);
            return Err(CommentServiceError::Forbidden(id));
        }

        let mut violations = Violations::new();
        Self::check_content(&mut violations, &content);
        violations.into_result()?;

        comment.content = content;
        Ok(self
            .comments
            .update(uow, &comment)
            .await
            .context("Failed to update comment")?)
    }

    pub async fn get(&self, uow: &mut UnitOfWork, id: i64) -> Result<Comment, CommentServiceError> {
        self.comments
            .find_by_id(uow, id)
            .await?
            .ok_or(CommentServiceError::NotFound(id))
    }

    pub async fn list(
        &self,
        uow: &mut UnitOfWork,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Comment>, CommentServiceError> {
        Ok(self.comments.list(uow, page, per_page).await?)
    }

    /// Comments of an existing blog post
    pub async fn list_by_blog_post(
        &self,
        uow: &mut UnitOfWork,
        blog_post_id: i64,
    ) -> Result<Vec<Comment>, CommentServiceError> {
        if self.posts.find_by_id(uow, blog_post_id).await?.is_none() {
            return Err(CommentServiceError::BlogPostNotFound(blog_post_id));
        }
        Ok(self.comments.list_by_blog_post(uow, blog_post_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxBlogPostRepository, SqlxCommentRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{BlogPost, NewBlogPost, NewUser, Role, Roles};
    use chrono::Utc;

    async fn setup() -> (DynDatabasePool, CommentService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = CommentService::new(SqlxCommentRepository::boxed(), SqlxBlogPostRepository::boxed());
        (pool, service)
    }

    async fn user(uow: &mut UnitOfWork, username: &str, role: Role) -> User {
        let mut new_user = NewUser::pending(
            username.to_string(),
            "Someone".to_string(),
            format!("{}@example.com", username),
            "hash".to_string(),
            format!("token-{}", username),
        );
        new_user.roles = Roles::new([role]);
        new_user.enabled = true;
        SqlxUserRepository.create(uow, &new_user).await.unwrap()
    }

    async fn post(uow: &mut UnitOfWork, author: &User) -> BlogPost {
        let draft = NewBlogPost {
            title: "A post about Rust".to_string(),
            content: "Ownership makes memory safety practical.".to_string(),
            slug: "a-post-about-rust".to_string(),
            images: vec![],
            author_id: Some(author.id),
            published: Some(Utc::now()),
        };
        SqlxBlogPostRepository.create(uow, &draft).await.unwrap()
    }

    fn draft(content: &str, blog_post_id: i64, author: &User) -> NewComment {
        NewComment {
            content: content.to_string(),
            blog_post_id,
            author_id: Some(author.id),
            published: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_by_post() {
        let (pool, service) = setup().await;
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let writer = user(&mut uow, "writer1", Role::Writer).await;
        let reader = user(&mut uow, "reader1", Role::Commentator).await;
        let post = post(&mut uow, &writer).await;

        let comment = service
            .create(&mut uow, &draft("Nice article!", post.id, &reader))
            .await
            .unwrap();
        assert_eq!(comment.author_id, reader.id);

        let comments = service.list_by_blog_post(&mut uow, post.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert!(matches!(
            service.list_by_blog_post(&mut uow, 999).await,
            Err(CommentServiceError::BlogPostNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (pool, service) = setup().await;
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let reader = user(&mut uow, "reader1", Role::Commentator).await;

        match service.create(&mut uow, &draft("hey", 999, &reader)).await {
            Err(CommentServiceError::ValidationFailed(v)) => {
                assert!(v.has("content"));
                assert!(v.has("blogPost"));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let long = "x".repeat(MAX_COMMENT_LENGTH + 1);
        assert!(matches!(
            service.create(&mut uow, &draft(&long, 999, &reader)).await,
            Err(CommentServiceError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_update_owner_rules() {
        let (pool, service) = setup().await;
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let writer = user(&mut uow, "writer1", Role::Writer).await;
        let reader = user(&mut uow, "reader1", Role::Commentator).await;
        let editor = user(&mut uow, "editor1", Role::Editor).await;
        let post = post(&mut uow, &writer).await;
        let comment = service
            .create(&mut uow, &draft("First comment", post.id, &reader))
            .await
            .unwrap();

        assert!(matches!(
            service
                .update(&mut uow, comment.id, "Rewritten by writer".to_string(), &writer)
                .await,
            Err(CommentServiceError::Forbidden(_))
        ));

        let updated = service
            .update(&mut uow, comment.id, "Edited by me".to_string(), &reader)
            .await
            .unwrap();
        assert_eq!(updated.content, "Edited by me");

        let updated = service
            .update(&mut uow, comment.id, "Moderated text".to_string(), &editor)
            .await
            .unwrap();
        assert_eq!(updated.content, "Moderated text");
        assert_eq!(updated.author_id, reader.id);
    }
}
