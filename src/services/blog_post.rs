//! Blog post service

use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

use crate::db::repositories::{
    BlogPostRepository, CommentRepository, ImageRepository, UserRepository,
};
use crate::db::UnitOfWork;
use crate::models::{
    BlogPost, BlogPostChanges, BlogPostFilter, Comment, Image, NewBlogPost, Page, User,
};
use crate::services::validation::Violations;

pub const MIN_TITLE_LENGTH: usize = 10;
pub const MIN_CONTENT_LENGTH: usize = 20;

/// Error types for blog post operations
#[derive(Debug, thiserror::Error)]
pub enum BlogPostServiceError {
    #[error("Validation failed: {0}")]
    ValidationFailed(Violations),

    #[error("Blog post not found: {0}")]
    NotFound(i64),

    /// The caller may not change this post
    #[error("Not allowed to edit blog post {0}")]
    Forbidden(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<Violations> for BlogPostServiceError {
    fn from(violations: Violations) -> Self {
        Self::ValidationFailed(violations)
    }
}

/// A post together with its author, comments and images
#[derive(Debug, Clone, Serialize)]
pub struct BlogPostDetails {
    pub post: BlogPost,
    pub author: User,
    pub comments: Vec<Comment>,
    pub images: Vec<Image>,
}

pub struct BlogPostService {
    posts: Arc<dyn BlogPostRepository>,
    users: Arc<dyn UserRepository>,
    comments: Arc<dyn CommentRepository>,
    images: Arc<dyn ImageRepository>,
}

impl BlogPostService {
    pub fn new(
        posts: Arc<dyn BlogPostRepository>,
        users: Arc<dyn UserRepository>,
        comments: Arc<dyn CommentRepository>,
        images: Arc<dyn ImageRepository>,
    ) -> Self {
        Self {
            posts,
            users,
            comments,
            images,
        }
    }

    fn check_title(violations: &mut Violations, title: &str) {
        if violations.not_blank("title", title) {
            violations.min_length("title", title, MIN_TITLE_LENGTH);
        }
    }

    fn check_content(violations: &mut Violations, content: &str) {
        if violations.not_blank("content", content) {
            violations.min_length("content", content, MIN_CONTENT_LENGTH);
        }
    }

    async fn check_images(
        &self,
        uow: &mut UnitOfWork,
        violations: &mut Violations,
        images: &[i64],
    ) -> anyhow::Result<()> {
        for &id in images {
            if self.images.find_by_id(uow, id).await?.is_none() {
                violations.add("images", format!("Image {} does not exist.", id));
            }
        }
        Ok(())
    }

    /// Persist a draft that already went through the pre-write rules.
    pub async fn create(
        &self,
        uow: &mut UnitOfWork,
        draft: &NewBlogPost,
    ) -> Result<BlogPost, BlogPostServiceError> {
        let mut violations = Violations::new();
        Self::check_title(&mut violations, &draft.title);
        Self::check_content(&mut violations, &draft.content);
        violations.not_blank("slug", &draft.slug);
        self.check_images(uow, &mut violations, &draft.images).await?;
        violations.into_result()?;

        let post = self
            .posts
            .create(uow, draft)
            .await
            .context("Failed to create blog post")?;

        tracing::info!("Created blog post {} by user {}", post.id, post.author_id);
        Ok(post)
    }

    /// Apply `changes` on behalf of `editor`. Editors may change any post,
    /// everyone else only their own.
    pub async fn update(
        &self,
        uow: &mut UnitOfWork,
        id: i64,
        changes: BlogPostChanges,
        editor: &User,
    ) -> Result<BlogPost, BlogPostServiceError> {
        let mut post = self.get(uow, id).await?;

        if !editor.can_edit(post.author_id) {
            tracing::warn!("User {} may not edit blog post {}", editor.id, id);
            return Err(BlogPostServiceError::Forbidden(id));
        }

        let mut violations = Violations::new();
        if let Some(title) = &changes.title {
            Self::check_title(&mut violations, title);
        }
        if let Some(content) = &changes.content {
            Self::check_content(&mut violations, content);
        }
        if let Some(slug) = &changes.slug {
            violations.not_blank("slug", slug);
        }
        if let Some(images) = &changes.images {
            self.check_images(uow, &mut violations, images).await?;
        }
        violations.into_result()?;

        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(content) = changes.content {
            post.content = content;
        }
        if let Some(slug) = changes.slug {
            post.slug = slug;
        }

        Ok(self
            .posts
            .update(uow, &post, changes.images.as_deref())
            .await
            .context("Failed to update blog post")?)
    }

    pub async fn get(&self, uow: &mut UnitOfWork, id: i64) -> Result<BlogPost, BlogPostServiceError> {
        self.posts
            .find_by_id(uow, id)
            .await?
            .ok_or(BlogPostServiceError::NotFound(id))
    }

    /// Load a post with everything it links to.
    pub async fn details(
        &self,
        uow: &mut UnitOfWork,
        id: i64,
    ) -> Result<BlogPostDetails, BlogPostServiceError> {
        let post = self.get(uow, id).await?;
        let author = self
            .users
            .find_by_id(uow, post.author_id)
            .await?
            .with_context(|| format!("Author {} of blog post {} is missing", post.author_id, id))?;
        let comments = self.comments.list_by_blog_post(uow, id).await?;
        let images = self.images.list_by_blog_post(uow, id).await?;

        Ok(BlogPostDetails {
            post,
            author,
            comments,
            images,
        })
    }

    pub async fn list(
        &self,
        uow: &mut UnitOfWork,
        filter: &BlogPostFilter,
    ) -> Result<Page<BlogPost>, BlogPostServiceError> {
        Ok(self.posts.list(uow, filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxBlogPostRepository, SqlxCommentRepository, SqlxImageRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{NewUser, Role, Roles};
    use chrono::Utc;

    async fn setup() -> (DynDatabasePool, BlogPostService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = BlogPostService::new(
            SqlxBlogPostRepository::boxed(),
            SqlxUserRepository::boxed(),
            SqlxCommentRepository::boxed(),
            SqlxImageRepository::boxed(),
        );
        (pool, service)
    }

    async fn user(uow: &mut UnitOfWork, username: &str, role: Role) -> User {
        let mut new_user = NewUser::pending(
            username.to_string(),
            format!("{} name", username),
            format!("{}@example.com", username),
            "hash".to_string(),
            format!("token-{}", username),
        );
        new_user.roles = Roles::new([role]);
        new_user.enabled = true;
        SqlxUserRepository.create(uow, &new_user).await.unwrap()
    }

    fn draft(author: &User) -> NewBlogPost {
        NewBlogPost {
            title: "A post about Rust".to_string(),
            content: "Ownership makes memory safety practical.".to_string(),
            slug: "a-post-about-rust".to_string(),
            images: vec![],
            author_id: Some(author.id),
            published: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_create_and_details() {
        let (pool, service) = setup().await;
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let writer = user(&mut uow, "writer1", Role::Writer).await;
        let image = SqlxImageRepository.create(&mut uow, "/images/a.png").await.unwrap();

        let mut new_post = draft(&writer);
        new_post.images = vec![image.id];
        let post = service.create(&mut uow, &new_post).await.unwrap();

        let details = service.details(&mut uow, post.id).await.unwrap();
        assert_eq!(details.author.id, writer.id);
        assert_eq!(details.images.len(), 1);
        assert!(details.comments.is_empty());
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (pool, service) = setup().await;
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let writer = user(&mut uow, "writer1", Role::Writer).await;

        let new_post = NewBlogPost {
            title: "Short".to_string(),
            content: "".to_string(),
            slug: " ".to_string(),
            images: vec![404],
            ..draft(&writer)
        };
        match service.create(&mut uow, &new_post).await {
            Err(BlogPostServiceError::ValidationFailed(v)) => {
                for path in ["title", "content", "slug", "images"] {
                    assert!(v.has(path), "missing violation for {}", path);
                }
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let page = service.list(&mut uow, &BlogPostFilter::default()).await.unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_update_owner_rules() {
        let (pool, service) = setup().await;
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let author = user(&mut uow, "writer1", Role::Writer).await;
        let other = user(&mut uow, "writer2", Role::Writer).await;
        let editor = user(&mut uow, "editor1", Role::Editor).await;
        let post = service.create(&mut uow, &draft(&author)).await.unwrap();

        let retitle = |title: &str| BlogPostChanges {
            title: Some(title.to_string()),
            ..BlogPostChanges::default()
        };

        assert!(matches!(
            service.update(&mut uow, post.id, retitle("Hijacked title"), &other).await,
            Err(BlogPostServiceError::Forbidden(_))
        ));

        let updated = service
            .update(&mut uow, post.id, retitle("Retitled by author"), &author)
            .await
            .unwrap();
        assert_eq!(updated.title, "Retitled by author");
        assert_eq!(updated.slug, "a-post-about-rust");

        let updated = service
            .update(&mut uow, post.id, retitle("Retitled by editor"), &editor)
            .await
            .unwrap();
        assert_eq!(updated.title, "Retitled by editor");
        assert_eq!(updated.author_id, author.id);

        assert!(matches!(
            service.update(&mut uow, post.id, retitle("short"), &author).await,
            Err(BlogPostServiceError::ValidationFailed(_))
        ));
        assert!(matches!(
            service.update(&mut uow, 999, retitle("Does not matter"), &editor).await,
            Err(BlogPostServiceError::NotFound(999))
        ));
    }
}
