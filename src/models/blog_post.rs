//! Blog post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::capability::{AuthoredEntity, PublishedDateEntity};
use super::User;

/// Blog post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub published: DateTime<Utc>,
    pub author_id: i64,
}

/// A blog post about to be inserted.
///
/// `author_id` and `published` are filled by the pre-write rules.
#[derive(Debug, Clone, Default)]
pub struct NewBlogPost {
    pub title: String,
    pub content: String,
    pub slug: String,
    pub images: Vec<i64>,
    pub author_id: Option<i64>,
    pub published: Option<DateTime<Utc>>,
}

impl AuthoredEntity for NewBlogPost {
    fn assign_author(&mut self, author: &User) {
        self.author_id = Some(author.id);
    }
}

impl PublishedDateEntity for NewBlogPost {
    fn assign_published(&mut self, published: DateTime<Utc>) {
        self.published = Some(published);
    }
}

/// Changes applied by an update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct BlogPostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub images: Option<Vec<i64>>,
}

/// Sortable columns of the blog post listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlogPostOrderField {
    Id,
    Title,
    Published,
}

impl BlogPostOrderField {
    pub fn column(self) -> &'static str {
        match self {
            Self::Id => "p.id",
            Self::Title => "p.title",
            Self::Published => "p.published",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(format!("Invalid sort direction: {}", s)),
        }
    }
}

/// Filters of the blog post listing. Every field is optional.
#[derive(Debug, Clone)]
pub struct BlogPostFilter {
    /// Partial, case-insensitive match on the title
    pub title: Option<String>,
    /// Partial, case-insensitive match on the content
    pub content: Option<String>,
    /// Partial, case-insensitive match on the author's display name
    pub author_name: Option<String>,
    /// Exact author id
    pub author: Option<i64>,
    pub published_after: Option<DateTime<Utc>>,
    pub published_before: Option<DateTime<Utc>>,
    pub id_gte: Option<i64>,
    pub id_lte: Option<i64>,
    /// Sort keys in priority order; empty means `published DESC`
    pub order: Vec<(BlogPostOrderField, SortDirection)>,
    /// 1-based page number
    pub page: i64,
    pub items_per_page: i64,
}

impl BlogPostFilter {
    pub const MAX_ITEMS_PER_PAGE: i64 = 30;
}

impl Default for BlogPostFilter {
    fn default() -> Self {
        Self {
            title: None,
            content: None,
            author_name: None,
            author: None,
            published_after: None,
            published_before: None,
            id_gte: None,
            id_lte: None,
            order: Vec::new(),
            page: 1,
            items_per_page: Self::MAX_ITEMS_PER_PAGE,
        }
    }
}

/// Row offset of `page` (1-based). Saturates so absurd page numbers read
/// past the end and come back empty.
pub fn page_offset(page: i64, per_page: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(per_page.max(0))
}

/// One page of a partially paginated listing (no total count).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    /// Build a page from up to `per_page + 1` fetched rows.
    pub fn from_overfetch(mut items: Vec<T>, page: i64, per_page: i64) -> Self {
        let has_next_page = items.len() as i64 > per_page;
        items.truncate(per_page.max(0) as usize);
        Self {
            items,
            page,
            has_next_page,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            has_next_page: self.has_next_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(3, 10), 20);
        assert_eq!(page_offset(0, 10), 0);
        assert_eq!(page_offset(i64::MAX, 30), i64::MAX);
        assert_eq!(page_offset(i64::MIN, 30), 0);
    }

    #[test]
    fn test_page_from_overfetch() {
        let page = Page::from_overfetch(vec![1, 2, 3, 4], 1, 3);
        assert_eq!(page.items, vec![1, 2, 3]);
        assert!(page.has_next_page);

        let page = Page::from_overfetch(vec![1, 2], 2, 3);
        assert_eq!(page.items, vec![1, 2]);
        assert!(!page.has_next_page);
        assert_eq!(page.page, 2);
    }

    #[test]
    fn test_sort_direction_from_str() {
        assert_eq!("ASC".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert_eq!("desc".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert!("sideways".parse::<SortDirection>().is_err());
    }

    #[test]
    fn test_filter_defaults() {
        let filter = BlogPostFilter::default();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.items_per_page, 30);
        assert!(filter.order.is_empty());
    }
}
