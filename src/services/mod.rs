//! Services layer - Business logic
//!
//! Services implement the business rules on top of the repositories. Each
//! operation takes the request's [`UnitOfWork`](crate::db::UnitOfWork) and
//! leaves committing to the caller.

pub mod blog_post;
pub mod comment;
pub mod confirmation;
pub mod image;
pub mod jwt;
pub mod lifecycle;
pub mod mailer;
pub mod password;
pub mod storage;
pub mod token;
pub mod user;
pub mod validation;

pub use blog_post::{BlogPostDetails, BlogPostService, BlogPostServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use confirmation::{ConfirmationError, UserConfirmationService};
pub use image::{ImageService, ImageServiceError};
pub use jwt::{Claims, JwtTokenIssuer, TokenIssuer};
pub use lifecycle::{pre_write, Anonymous, AuthContext, LifecycleError};
pub use mailer::{build_mailer, confirmation_link, LogMailer, Mailer, SmtpMailer};
pub use password::{hash_password, meets_password_policy, verify_password};
pub use storage::{ImageStorage, LocalImageStorage};
pub use token::{TokenError, TokenGenerator};
pub use user::{
    LoginInput, RegisterInput, ResetPasswordInput, UpdateProfileInput, UserService,
    UserServiceError,
};
pub use validation::{Violation, Violations};
