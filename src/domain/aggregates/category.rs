//! Category Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::product::CategoryRef;
use crate::domain::value_objects::{Slug, SlugError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub slug: Slug,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Category {
    /// New category; a blank `slug` is derived from the name.
    pub fn create(name: impl Into<String>, slug: Option<&str>) -> Result<Self, SlugError> {
        let name = name.into();
        let slug = match slug.map(str::trim).filter(|s| !s.is_empty()) {
            Some(explicit) => Slug::parse(explicit)?,
            None => Slug::from_name(&name),
        };
        if slug.as_str().is_empty() { return Err(SlugError::Empty); }
        Ok(Self { id: String::new(), name, slug, image_url: None, created_at: Some(Utc::now()) })
    }

    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty() || self.name.to_lowercase().contains(&term) || self.slug.as_str().contains(&term)
    }

    pub fn to_ref(&self) -> CategoryRef {
        CategoryRef { id: self.id.clone(), name: self.name.clone(), slug: self.slug.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_derives_slug() {
        let c = Category::create("Home Decor", None).unwrap();
        assert_eq!(c.slug.as_str(), "home-decor");
        let c = Category::create("Home Decor", Some("  ")).unwrap();
        assert_eq!(c.slug.as_str(), "home-decor");
        let c = Category::create("Home Decor", Some("decor")).unwrap();
        assert_eq!(c.slug.as_str(), "decor");
        assert_eq!(Category::create("!!!", None), Err(SlugError::Empty));
    }

    #[test]
    fn test_search_matches_name_or_slug() {
        let mut c = Category::create("Electronics", Some("gadgets")).unwrap();
        c.id = "c1".into();
        assert!(c.matches_search("ELEC"));
        assert!(c.matches_search("gadg"));
        assert!(!c.matches_search("shoes"));
        assert_eq!(c.to_ref().slug, "gadgets");
    }
}
