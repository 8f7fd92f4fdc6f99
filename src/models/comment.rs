//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::capability::{AuthoredEntity, PublishedDateEntity};
use super::User;

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub published: DateTime<Utc>,
    pub author_id: i64,
    pub blog_post_id: i64,
}

/// A comment about to be inserted
#[derive(Debug, Clone, Default)]
pub struct NewComment {
    pub content: String,
    pub blog_post_id: i64,
    pub author_id: Option<i64>,
    pub published: Option<DateTime<Utc>>,
}

impl AuthoredEntity for NewComment {
    fn assign_author(&mut self, author: &User) {
        self.author_id = Some(author.id);
    }
}

impl PublishedDateEntity for NewComment {
    fn assign_published(&mut self, published: DateTime<Utc>) {
        self.published = Some(published);
    }
}
