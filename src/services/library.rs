//! Owned products and their downloads

use std::path::Path;
use std::sync::Arc;

use crate::db::repositories::{LibraryRepository, ProductRepository, UserRepository};
use crate::models::{LibraryEntry, LibraryItem, ListParams, PagedResult};
use crate::services::error::{FieldErrors, ServiceError, ServiceResult};
use crate::services::form::{require, FormData};
use crate::storage::{Disk, Storage};

/// A product file ready to stream
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub struct LibraryService {
    library: Arc<dyn LibraryRepository>,
    products: Arc<dyn ProductRepository>,
    users: Arc<dyn UserRepository>,
    storage: Arc<Storage>,
}

impl LibraryService {
    pub fn new(
        library: Arc<dyn LibraryRepository>,
        products: Arc<dyn ProductRepository>,
        users: Arc<dyn UserRepository>,
        storage: Arc<Storage>,
    ) -> Self {
        Self {
            library,
            products,
            users,
            storage,
        }
    }

    pub async fn list(&self, user_id: i64, params: &ListParams) -> ServiceResult<PagedResult<LibraryItem>> {
        Ok(self.library.list_for_user(user_id, params).await?)
    }

    /// File of an owned product; anything else is reported as not found
    pub async fn download(&self, user_id: i64, product_id: i64) -> ServiceResult<Download> {
        if self.library.find(user_id, product_id).await?.is_none() {
            return Err(ServiceError::NotFound("Product"));
        }
        let product = self
            .products
            .get_by_id(product_id)
            .await?
            .ok_or(ServiceError::NotFound("Product"))?;
        let path = product.file_path.ok_or(ServiceError::NotFound("File"))?;
        let bytes = self
            .storage
            .read(Disk::Private, &path)
            .await?
            .ok_or(ServiceError::NotFound("File"))?;

        let file_name = match Path::new(&path).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", product.slug, ext),
            None => product.slug,
        };
        tracing::debug!("User {} downloading product {}", user_id, product_id);
        Ok(Download { file_name, bytes })
    }

    /// Admin grant; granting an owned product returns the existing entry
    pub async fn grant(&self, form: &FormData) -> ServiceResult<(LibraryEntry, bool)> {
        let (user_id, product_id) = self.validate_pair(form).await?;
        let (entry, created) = self.library.grant(user_id, product_id, None).await?;
        if created {
            tracing::info!("Granted product {} to user {}", product_id, user_id);
        }
        Ok((entry, created))
    }

    pub async fn revoke(&self, user_id: i64, product_id: i64) -> ServiceResult<()> {
        if !self.library.revoke(user_id, product_id).await? {
            return Err(ServiceError::NotFound("Library entry"));
        }
        tracing::info!("Revoked product {} from user {}", product_id, user_id);
        Ok(())
    }

    async fn validate_pair(&self, form: &FormData) -> ServiceResult<(i64, i64)> {
        let mut errors = FieldErrors::new();
        require(&mut errors, "user_id", form.text("user_id").unwrap_or_default());
        require(&mut errors, "product_id", form.text("product_id").unwrap_or_default());
        let user_id = form.integer("user_id", &mut errors);
        let product_id = form.integer("product_id", &mut errors);

        if let Some(id) = user_id {
            if self.users.get_by_id(id).await?.is_none() {
                errors.add("user_id", "The selected user id is invalid.");
            }
        }
        if let Some(id) = product_id {
            if self.products.get_by_id(id).await?.is_none() {
                errors.add("product_id", "The selected product id is invalid.");
            }
        }
        errors.into_result()?;

        match (user_id, product_id) {
            (Some(user_id), Some(product_id)) => Ok((user_id, product_id)),
            _ => Err(ServiceError::field("product_id", "The product id field is required.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxLibraryRepository, SqlxProductRepository, SqlxUserRepository};
    use crate::models::{ContentStatus, UserRole};
    use crate::services::testing;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_grant_download_revoke() {
        let dir = TempDir::new().unwrap();
        let pool = testing::pool().await;
        let storage = Arc::new(testing::storage(&dir));
        let service = LibraryService::new(
            SqlxLibraryRepository::boxed(pool.clone()),
            SqlxProductRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            storage.clone(),
        );
        let user = testing::user(&pool, "Ann", UserRole::Customer).await;
        let mut product = testing::product(&pool, "ebook", 900, ContentStatus::Published).await;
        let stored = storage.store(Disk::Private, "products", &testing::pdf()).await.unwrap();
        product.file_path = Some(stored);
        SqlxProductRepository::new(pool.clone()).update(&product).await.unwrap();

        assert!(matches!(
            service.download(user.id, product.id).await,
            Err(ServiceError::NotFound(_))
        ));

        let form = FormData::new()
            .with("user_id", user.id.to_string())
            .with("product_id", product.id.to_string());
        let (_, created) = service.grant(&form).await.unwrap();
        assert!(created);
        let (_, created) = service.grant(&form).await.unwrap();
        assert!(!created);

        let download = service.download(user.id, product.id).await.unwrap();
        assert_eq!(download.file_name, "ebook.pdf");
        assert_eq!(download.bytes, b"%PDF-1.4".to_vec());
        assert_eq!(service.list(user.id, &ListParams::default()).await.unwrap().total, 1);

        service.revoke(user.id, product.id).await.unwrap();
        assert!(matches!(
            service.revoke(user.id, product.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_grant_validates_references() {
        let dir = TempDir::new().unwrap();
        let pool = testing::pool().await;
        let service = LibraryService::new(
            SqlxLibraryRepository::boxed(pool.clone()),
            SqlxProductRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            Arc::new(testing::storage(&dir)),
        );
        let form = FormData::new().with("user_id", "41").with("product_id", "x");
        match service.grant(&form).await {
            Err(ServiceError::Validation(errors)) => {
                assert!(errors.has("user_id"));
                assert!(errors.has("product_id"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
