//! Common API utilities and shared types

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::middleware::ApiError;
use crate::models::{BlogPostFilter, BlogPostOrderField, SortDirection};

/// Default page number (1-indexed)
pub fn default_page() -> i64 {
    1
}

/// Default page size
pub fn default_items_per_page() -> i64 {
    BlogPostFilter::MAX_ITEMS_PER_PAGE
}

/// Pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_items_per_page", rename = "itemsPerPage")]
    pub items_per_page: i64,
}

impl PaginationQuery {
    /// Page and page size forced into their valid ranges
    pub fn clamped(&self) -> (i64, i64) {
        (
            self.page.max(1),
            self.items_per_page.clamp(1, BlogPostFilter::MAX_ITEMS_PER_PAGE),
        )
    }
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::validation_error(format!("Invalid integer for {}: {}", key, value)))
}

/// Accepts RFC 3339 timestamps or plain dates (midnight UTC).
fn parse_datetime(key: &str, value: &str) -> Result<DateTime<Utc>, ApiError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ApiError::validation_error(format!("Invalid date for {}: {}", key, value)))
}

/// Build a blog post filter from raw query pairs such as
/// `title=rust&published[after]=2024-01-01&_order[title]=asc`.
///
/// Unknown keys are ignored.
pub fn parse_blog_post_filter(pairs: &[(String, String)]) -> Result<BlogPostFilter, ApiError> {
    let mut filter = BlogPostFilter::default();

    for (key, value) in pairs {
        match key.as_str() {
            "title" => filter.title = Some(value.clone()),
            "content" => filter.content = Some(value.clone()),
            "author.name" => filter.author_name = Some(value.clone()),
            "author" => filter.author = Some(parse_i64(key, value)?),
            "published[after]" => filter.published_after = Some(parse_datetime(key, value)?),
            "published[before]" => filter.published_before = Some(parse_datetime(key, value)?),
            "id[gte]" => filter.id_gte = Some(parse_i64(key, value)?),
            "id[lte]" => filter.id_lte = Some(parse_i64(key, value)?),
            "page" => filter.page = parse_i64(key, value)?.max(1),
            "itemsPerPage" => {
                filter.items_per_page =
                    parse_i64(key, value)?.clamp(1, BlogPostFilter::MAX_ITEMS_PER_PAGE)
            }
            _ => {
                if let Some(field) = key
                    .strip_prefix("_order[")
                    .and_then(|rest| rest.strip_suffix(']'))
                {
                    let field = match field {
                        "id" => BlogPostOrderField::Id,
                        "title" => BlogPostOrderField::Title,
                        "published" => BlogPostOrderField::Published,
                        other => {
                            return Err(ApiError::validation_error(format!(
                                "Cannot order by {}",
                                other
                            )))
                        }
                    };
                    let direction: SortDirection =
                        value.parse().map_err(ApiError::validation_error)?;
                    filter.order.push((field, direction));
                }
            }
        }
    }

    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_query_gives_defaults() {
        let filter = parse_blog_post_filter(&[]).unwrap();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.items_per_page, 30);
        assert!(filter.order.is_empty());
    }

    #[test]
    fn test_all_filters() {
        let filter = parse_blog_post_filter(&pairs(&[
            ("title", "rust"),
            ("content", "borrow"),
            ("author.name", "ann"),
            ("author", "3"),
            ("published[after]", "2024-01-01"),
            ("published[before]", "2024-06-30T12:00:00Z"),
            ("id[gte]", "2"),
            ("id[lte]", "9"),
            ("_order[title]", "asc"),
            ("_order[id]", "DESC"),
            ("page", "2"),
            ("itemsPerPage", "500"),
            ("unrelated", "x"),
        ]))
        .unwrap();

        assert_eq!(filter.title.as_deref(), Some("rust"));
        assert_eq!(filter.content.as_deref(), Some("borrow"));
        assert_eq!(filter.author_name.as_deref(), Some("ann"));
        assert_eq!(filter.author, Some(3));
        assert_eq!(
            filter.published_after.map(|d| d.to_rfc3339()),
            Some("2024-01-01T00:00:00+00:00".to_string())
        );
        assert!(filter.published_before.is_some());
        assert_eq!((filter.id_gte, filter.id_lte), (Some(2), Some(9)));
        assert_eq!(
            filter.order,
            vec![
                (BlogPostOrderField::Title, SortDirection::Asc),
                (BlogPostOrderField::Id, SortDirection::Desc),
            ]
        );
        assert_eq!(filter.page, 2);
        assert_eq!(filter.items_per_page, 30);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse_blog_post_filter(&pairs(&[("author", "abc")])).is_err());
        assert!(parse_blog_post_filter(&pairs(&[("published[after]", "yesterday")])).is_err());
        assert!(parse_blog_post_filter(&pairs(&[("_order[slug]", "asc")])).is_err());
        assert!(parse_blog_post_filter(&pairs(&[("_order[id]", "up")])).is_err());
    }

    #[test]
    fn test_pagination_clamped() {
        let query = PaginationQuery {
            page: 0,
            items_per_page: 100,
        };
        assert_eq!(query.clamped(), (1, 30));
    }
}
