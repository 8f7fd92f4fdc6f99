//! Shared API response types
//!
//! View models decide what each caller may see; entities are never
//! serialized directly.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{BlogPost, Comment, Image, User};
use crate::services::BlogPostDetails;

/// A user as seen by a particular viewer.
///
/// E-mail, roles and enabled state are only present when the viewer is the
/// user themself or an administrator.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl UserView {
    pub fn for_viewer(user: User, viewer: Option<&User>) -> Self {
        let privileged = viewer.is_some_and(|v| v.id == user.id || v.is_admin());
        if !privileged {
            return Self {
                id: user.id,
                username: user.username,
                name: user.name,
                email: None,
                roles: None,
                enabled: None,
            };
        }

        Self {
            id: user.id,
            roles: Some(user.roles.iter().map(|r| r.to_string()).collect()),
            username: user.username,
            name: user.name,
            email: Some(user.email),
            enabled: Some(user.enabled),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub published: DateTime<Utc>,
    pub author_id: i64,
}

impl From<BlogPost> for BlogPostView {
    fn from(post: BlogPost) -> Self {
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            slug: post.slug,
            published: post.published,
            author_id: post.author_id,
        }
    }
}

/// Blog post with its author, comments and images embedded
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostDetailsView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub published: DateTime<Utc>,
    pub author: UserView,
    pub comments: Vec<CommentView>,
    pub images: Vec<Image>,
}

impl BlogPostDetailsView {
    pub fn new(details: BlogPostDetails, viewer: Option<&User>) -> Self {
        let BlogPostDetails {
            post,
            author,
            comments,
            images,
        } = details;

        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            slug: post.slug,
            published: post.published,
            author: UserView::for_viewer(author, viewer),
            comments: comments.into_iter().map(CommentView::from).collect(),
            images,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i64,
    pub content: String,
    pub published: DateTime<Utc>,
    pub author_id: i64,
    pub blog_post_id: i64,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            content: comment.content,
            published: comment.published,
            author_id: comment.author_id,
            blog_post_id: comment.blog_post_id,
        }
    }
}

/// Authentication token response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, Roles};

    fn user(id: i64, role: Role) -> User {
        User {
            id,
            username: format!("user{}", id),
            name: "Someone".to_string(),
            email: format!("user{}@example.com", id),
            password_hash: "hash".to_string(),
            roles: Roles::new([role]),
            enabled: true,
            confirmation_token: None,
            password_change_date: None,
        }
    }

    #[test]
    fn test_user_view_visibility() {
        let stranger = user(2, Role::Editor);
        let admin = user(3, Role::Admin);

        let public = serde_json::to_value(UserView::for_viewer(user(1, Role::Writer), Some(&stranger))).unwrap();
        assert_eq!(
            public,
            serde_json::json!({ "id": 1, "username": "user1", "name": "Someone" })
        );

        let own = UserView::for_viewer(user(1, Role::Writer), Some(&user(1, Role::Writer)));
        assert_eq!(own.email.as_deref(), Some("user1@example.com"));
        assert_eq!(own.roles, Some(vec!["ROLE_WRITER".to_string()]));

        let by_admin = UserView::for_viewer(user(1, Role::Writer), Some(&admin));
        assert_eq!(by_admin.enabled, Some(true));

        let anonymous = UserView::for_viewer(user(1, Role::Writer), None);
        assert!(anonymous.email.is_none());
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let json = serde_json::to_string(&UserView::for_viewer(user(1, Role::Admin), Some(&user(1, Role::Admin)))).unwrap();
        assert!(!json.contains("hash"));
    }
}
