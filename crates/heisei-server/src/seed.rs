//! Default categories for a fresh forum.

use crate::services::CategoryService;
use heisei_core::{ForumError, NewCategory, Result};
use tracing::{debug, info};

/// `(name, slug)` pairs inserted by `--seed`
pub const DEFAULT_CATEGORIES: [(&str, &str); 5] = [
    ("General Discussion", "general-discussion"),
    ("Technology", "technology"),
    ("Sports", "sports"),
    ("Entertainment", "entertainment"),
    ("Science", "science"),
];

/// Insert the default categories, skipping slugs that already exist.
///
/// Returns how many were created.
pub async fn seed_default_categories(categories: &CategoryService) -> Result<usize> {
    let mut created = 0;
    for (name, slug) in DEFAULT_CATEGORIES {
        let request = NewCategory {
            name: name.to_string(),
            slug: slug.to_string(),
        };
        match categories.create(request).await {
            Ok(_) => created += 1,
            Err(ForumError::Conflict { .. }) => debug!(slug, "Category already present"),
            Err(err) => return Err(err),
        }
    }
    info!(created, "Seeded default categories");
    Ok(created)
}
