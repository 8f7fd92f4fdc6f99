//! Data models
//!
//! Entities persisted by the repositories, the drafts that precede them, and
//! the capabilities the pre-write rules dispatch on.

mod blog_post;
mod capability;
mod comment;
mod image;
mod user;

pub use blog_post::{
    page_offset, BlogPost, BlogPostChanges, BlogPostFilter, BlogPostOrderField, NewBlogPost, Page,
    SortDirection,
};
pub use capability::{AuthoredEntity, PendingWrite, PublishedDateEntity};
pub use comment::{Comment, NewComment};
pub use image::{Image, ImageUpload, UploadedFile};
pub use user::{NewUser, Role, Roles, User};
