//! Database repositories
//!
//! One repository per entity. Every call runs inside the caller's
//! [`UnitOfWork`](crate::db::UnitOfWork).

pub mod blog_post;
pub mod comment;
pub mod image;
pub mod user;

pub use blog_post::{BlogPostRepository, SqlxBlogPostRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use image::{ImageRepository, SqlxImageRepository};
pub use user::{SqlxUserRepository, UserRepository};
