use std::sync::Arc;

use crate::application::CatalogRepository;
use crate::domain::{AtlasError, Repository};

pub struct ListRepositoriesUseCase {
    catalog: Arc<dyn CatalogRepository>,
}

impl ListRepositoriesUseCase {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    pub async fn execute(&self) -> Result<Vec<Repository>, AtlasError> {
        self.catalog.list_repositories().await
    }
}
