//! Forum domain models
//!
//! Rows as the storage layer holds them, the write requests that create them,
//! and the DTOs handed to API callers. Validation lives on the write requests so
//! it runs before any storage work starts.

use crate::errors::{ForumError, Result};
use crate::types::{CategoryId, PostId, ThreadId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum category name / slug length in characters
pub const CATEGORY_FIELD_MAX_CHARS: usize = 50;

/// Maximum thread title length in characters
pub const THREAD_TITLE_MAX_CHARS: usize = 200;

/// Maximum post body length in characters
pub const POST_CONTENT_MAX_CHARS: usize = 10_000;

fn check_length(field: &'static str, value: &str, max: usize) -> Result<()> {
    let chars = value.chars().count();
    if chars == 0 {
        return Err(ForumError::invalid(field, "must not be empty"));
    }
    if chars > max {
        return Err(ForumError::invalid(
            field,
            format!("{chars} characters exceeds the maximum of {max}"),
        ));
    }
    Ok(())
}

fn check_slug(slug: &str) -> Result<()> {
    check_length("slug", slug, CATEGORY_FIELD_MAX_CHARS)?;
    if !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ForumError::invalid(
            "slug",
            "only ASCII letters, digits and '-' are allowed",
        ));
    }
    Ok(())
}

/// Validate a post body: between 1 and [`POST_CONTENT_MAX_CHARS`] characters.
pub fn validate_post_content(content: &str) -> Result<()> {
    check_length("content", content, POST_CONTENT_MAX_CHARS)
}

/// A forum category row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Row id
    pub id: CategoryId,
    /// Display name
    pub name: String,
    /// Unique URL-safe name
    pub slug: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// A thread row, owner of the aggregate counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    /// Row id
    pub id: ThreadId,
    /// Owning category
    pub category_id: CategoryId,
    /// Title
    pub title: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
    /// Time of the most recent committed post (creation time until then)
    pub last_post_at: DateTime<Utc>,
    /// Number of committed posts
    pub post_count: u64,
}

/// A post row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Row id
    pub id: PostId,
    /// Thread the post belongs to
    pub thread_id: ThreadId,
    /// Body
    pub content: String,
    /// Network address of the author
    pub author_address: String,
    /// Soft-delete flag
    pub is_deleted: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Author address with the last IPv4 octet hidden; other forms are returned as-is.
    pub fn masked_author_address(&self) -> String {
        mask_address(&self.author_address)
    }
}

fn mask_address(address: &str) -> String {
    let parts: Vec<&str> = address.split('.').collect();
    if parts.len() == 4 {
        format!("{}.{}.{}.xxx", parts[0], parts[1], parts[2])
    } else {
        address.to_string()
    }
}

/// Request to create a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    /// Display name
    pub name: String,
    /// Unique URL-safe name
    pub slug: String,
}

impl NewCategory {
    /// Check field lengths and slug alphabet.
    pub fn validate(&self) -> Result<()> {
        check_length("name", &self.name, CATEGORY_FIELD_MAX_CHARS)?;
        check_slug(&self.slug)
    }
}

/// Replacement values for a category
pub type CategoryUpdate = NewCategory;

/// Request to create a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewThread {
    /// Owning category; must exist
    pub category_id: CategoryId,
    /// Title
    pub title: String,
}

impl NewThread {
    /// Check the title length.
    pub fn validate(&self) -> Result<()> {
        check_length("title", &self.title, THREAD_TITLE_MAX_CHARS)
    }
}

/// Replacement title for a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadUpdate {
    /// New title
    pub title: String,
}

impl ThreadUpdate {
    /// Check the title length.
    pub fn validate(&self) -> Result<()> {
        check_length("title", &self.title, THREAD_TITLE_MAX_CHARS)
    }
}

/// Request to create a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    /// Target thread
    pub thread_id: ThreadId,
    /// Body
    pub content: String,
    /// Network address of the author
    pub author_address: String,
}

impl NewPost {
    /// Check the content length.
    pub fn validate(&self) -> Result<()> {
        validate_post_content(&self.content)
    }
}

/// Category as exposed by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDto {
    /// Row id
    pub id: CategoryId,
    /// Display name
    pub name: String,
    /// Unique URL-safe name
    pub slug: String,
}

impl From<&Category> for CategoryDto {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            slug: category.slug.clone(),
        }
    }
}

/// Thread as exposed by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDto {
    /// Row id
    pub id: ThreadId,
    /// Owning category
    pub category_id: CategoryId,
    /// Title
    pub title: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
    /// Time of the most recent post
    pub last_post_at: DateTime<Utc>,
    /// Number of posts
    pub post_count: u64,
}

impl From<&Thread> for ThreadDto {
    fn from(thread: &Thread) -> Self {
        Self {
            id: thread.id,
            category_id: thread.category_id,
            title: thread.title.clone(),
            created_at: thread.created_at,
            updated_at: thread.updated_at,
            last_post_at: thread.last_post_at,
            post_count: thread.post_count,
        }
    }
}

/// Post as exposed by the API; the author address is masked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDto {
    /// Row id
    pub id: PostId,
    /// Thread the post belongs to
    pub thread_id: ThreadId,
    /// Body
    pub content: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Soft-delete flag
    pub is_deleted: bool,
    /// Masked author address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_address: Option<String>,
}

impl From<&Post> for PostDto {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            thread_id: post.thread_id,
            content: post.content.clone(),
            created_at: post.created_at,
            is_deleted: post.is_deleted,
            author_address: Some(post.masked_author_address()),
        }
    }
}
