//! Capabilities of pending writes
//!
//! Draft types opt into the pre-write rules by implementing these traits.
//! The rules dispatch over [`PendingWrite`], a closed set of every draft the
//! API can persist.

use chrono::{DateTime, Utc};

use super::{ImageUpload, NewBlogPost, NewComment, NewUser, User};

/// An entity that records the user who created it.
pub trait AuthoredEntity {
    fn assign_author(&mut self, author: &User);
}

/// An entity that records when it was published.
pub trait PublishedDateEntity {
    fn assign_published(&mut self, published: DateTime<Utc>);
}

/// A draft produced by a write request, before it is persisted.
pub enum PendingWrite<'a> {
    BlogPost(&'a mut NewBlogPost),
    Comment(&'a mut NewComment),
    Image(&'a mut ImageUpload),
    User(&'a mut NewUser),
}

impl<'a> PendingWrite<'a> {
    /// Author capability, when the draft has one.
    pub fn authored(&mut self) -> Option<&mut dyn AuthoredEntity> {
        match self {
            PendingWrite::BlogPost(post) => Some(&mut **post),
            PendingWrite::Comment(comment) => Some(&mut **comment),
            PendingWrite::Image(_) | PendingWrite::User(_) => None,
        }
    }

    /// Publication-date capability, when the draft has one.
    pub fn dated(&mut self) -> Option<&mut dyn PublishedDateEntity> {
        match self {
            PendingWrite::BlogPost(post) => Some(&mut **post),
            PendingWrite::Comment(comment) => Some(&mut **comment),
            PendingWrite::Image(_) | PendingWrite::User(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PendingWrite::BlogPost(_) => "blog_post",
            PendingWrite::Comment(_) => "comment",
            PendingWrite::Image(_) => "image",
            PendingWrite::User(_) => "user",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_per_kind() {
        let mut post = NewBlogPost::default();
        let mut write = PendingWrite::BlogPost(&mut post);
        assert!(write.authored().is_some());
        assert!(write.dated().is_some());
        assert_eq!(write.kind(), "blog_post");

        let mut upload = ImageUpload::default();
        let mut write = PendingWrite::Image(&mut upload);
        assert!(write.authored().is_none());
        assert!(write.dated().is_none());
    }
}
