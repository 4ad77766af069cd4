use super::logged;
use heisei_core::{
    Category, CategoryId, CategoryUpdate, Clock, ForumError, ForumStorage, NewCategory, Result,
};
use std::sync::Arc;
use tracing::info;

/// Category CRUD
#[derive(Clone)]
pub struct CategoryService {
    storage: Arc<dyn ForumStorage>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CategoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryService").finish_non_exhaustive()
    }
}

impl CategoryService {
    pub(crate) fn new(storage: Arc<dyn ForumStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Create a category; slugs must be unique.
    pub async fn create(&self, category: NewCategory) -> Result<Category> {
        category.validate()?;
        let created = self
            .storage
            .create_category(&category, self.clock.now_utc())
            .await
            .map_err(ForumError::from)
            .map_err(logged("create category"))?;
        info!(category_id = %created.id, slug = %created.slug, "Created category");
        Ok(created)
    }

    /// All categories
    pub async fn list(&self) -> Result<Vec<Category>> {
        self.storage
            .list_categories()
            .await
            .map_err(ForumError::from)
            .map_err(logged("list categories"))
    }

    /// One category
    pub async fn get(&self, id: CategoryId) -> Result<Category> {
        self.storage
            .get_category(id)
            .await?
            .ok_or_else(|| ForumError::not_found("category", id.value()))
    }

    /// Replace name and slug.
    pub async fn update(&self, id: CategoryId, update: CategoryUpdate) -> Result<Category> {
        update.validate()?;
        self.storage
            .update_category(id, &update, self.clock.now_utc())
            .await
            .map_err(ForumError::from)
            .map_err(logged("update category"))
    }

    /// Delete a category with its threads and posts.
    pub async fn delete(&self, id: CategoryId) -> Result<()> {
        self.storage
            .delete_category(id)
            .await
            .map_err(ForumError::from)
            .map_err(logged("delete category"))?;
        info!(category_id = %id, "Deleted category");
        Ok(())
    }
}
