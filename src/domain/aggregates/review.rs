//! Review Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Product name joined in for listings; never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "productId")]
    pub product_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userFirstName", default)]
    pub user_first_name: String,
    #[serde(rename = "userLastName", default)]
    pub user_last_name: String,
    pub rating: u8,
    pub comment: String,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(rename = "createdAt", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "products", default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummary>,
}

impl Review {
    /// New reviews wait for moderation.
    pub fn submit(
        product_id: impl Into<String>,
        user_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<Self, ReviewError> {
        let comment = comment.into();
        if !(1..=5).contains(&rating) { return Err(ReviewError::RatingOutOfRange); }
        if comment.trim().is_empty() { return Err(ReviewError::EmptyComment); }
        Ok(Self {
            id: String::new(),
            product_id: product_id.into(),
            user_id: user_id.into(),
            user_first_name: first_name.into(),
            user_last_name: last_name.into(),
            rating,
            comment,
            is_approved: false,
            created_at: Utc::now(),
            product: None,
        })
    }

    pub fn reviewer_name(&self) -> String {
        format!("{} {}", self.user_first_name, self.user_last_name).trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ReviewError { RatingOutOfRange, EmptyComment }
impl std::error::Error for ReviewError {}
impl fmt::Display for ReviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RatingOutOfRange => write!(f, "Rating must be between 1 and 5"),
            Self::EmptyComment => write!(f, "Please write a comment"),
        }
    }
}
