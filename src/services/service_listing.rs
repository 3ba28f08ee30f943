//! Service listings (freelance gigs sold off-platform)

use std::sync::Arc;

use crate::db::repositories::ServiceListingRepository;
use crate::models::{ActiveStatus, ListParams, PagedResult, ServiceListing};
use crate::services::error::{FieldErrors, ServiceError, ServiceResult};
use crate::services::form::{max_length, min_value, require, FormData};
use crate::services::slug::slug_for;
use crate::storage::{Disk, FileKind, StagedFiles, Storage};

const SERVICE_DIR: &str = "services";

pub struct ServiceListingService {
    repo: Arc<dyn ServiceListingRepository>,
    storage: Arc<Storage>,
}

impl ServiceListingService {
    pub fn new(repo: Arc<dyn ServiceListingRepository>, storage: Arc<Storage>) -> Self {
        Self { repo, storage }
    }

    pub async fn list(
        &self,
        status: Option<ActiveStatus>,
        q: Option<&str>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<ServiceListing>> {
        Ok(self.repo.list(status, q, params).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<ServiceListing> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Service"))
    }

    pub async fn get_active(&self, slug: &str) -> ServiceResult<ServiceListing> {
        self.repo
            .get_by_slug(slug)
            .await?
            .filter(|listing| listing.status == ActiveStatus::Active)
            .ok_or(ServiceError::NotFound("Service"))
    }

    pub async fn create(&self, form: &FormData, provider_id: i64) -> ServiceResult<ServiceListing> {
        let mut listing = ServiceListing::new(String::new(), String::new());
        listing.provider_id = Some(provider_id);
        self.save(listing, form, true).await
    }

    pub async fn update(&self, id: i64, form: &FormData) -> ServiceResult<ServiceListing> {
        let listing = self.get(id).await?;
        self.save(listing, form, false).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let listing = self.get(id).await?;
        self.repo.delete(id).await?;
        if let Some(image) = &listing.image {
            self.storage.delete(Disk::Public, image).await;
        }
        Ok(())
    }

    async fn save(&self, mut listing: ServiceListing, form: &FormData, creating: bool) -> ServiceResult<ServiceListing> {
        let mut errors = FieldErrors::new();
        if creating || form.has("name") {
            let name = form.text("name").unwrap_or_default();
            require(&mut errors, "name", name);
            max_length(&mut errors, "name", name, 255);
            listing.name = name.to_string();
        }
        let current_slug = (!creating).then(|| listing.slug.clone());
        listing.slug = slug_for(form, "name", current_slug.as_deref(), &mut errors);
        if let Some(description) = form.text("description") {
            listing.description = description.to_string();
        }
        if creating {
            require(&mut errors, "price_cents", form.text("price_cents").unwrap_or_default());
        }
        if let Some(price) = form.integer("price_cents", &mut errors) {
            min_value(&mut errors, "price_cents", price, 0);
            listing.price_cents = price;
        }
        if let Some(days) = form.integer("delivery_days", &mut errors) {
            min_value(&mut errors, "delivery_days", days, 1);
            listing.delivery_days = days;
        }
        if let Some(status) = form.choice::<ActiveStatus>("status", &mut errors) {
            listing.status = status;
        }
        let image = self
            .storage
            .change_for(form, "image", FileKind::Image, &mut errors);
        if !errors.has("slug")
            && !listing.slug.is_empty()
            && self
                .repo
                .slug_taken(&listing.slug, (!creating).then_some(listing.id))
                .await?
        {
            errors.add("slug", "The slug has already been taken.");
        }
        errors.into_result()?;

        let mut staged = StagedFiles::default();
        self.storage
            .apply(&mut staged, Disk::Public, SERVICE_DIR, image, &mut listing.image)
            .await?;
        let result = if creating {
            self.repo.create(&listing).await
        } else {
            self.repo.update(&listing).await
        };
        staged.finish(&self.storage, result.is_ok()).await;

        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxServiceListingRepository;
    use crate::models::UserRole;
    use crate::services::testing;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_crud_and_public_visibility() {
        let dir = TempDir::new().unwrap();
        let pool = testing::pool().await;
        let admin = testing::user(&pool, "Admin", UserRole::Admin).await;
        let service = ServiceListingService::new(
            SqlxServiceListingRepository::boxed(pool),
            Arc::new(testing::storage(&dir)),
        );

        let form = FormData::new()
            .with("name", "Logo Design")
            .with("price_cents", "15000")
            .with("delivery_days", "3")
            .with_file("image", testing::png());
        let listing = service.create(&form, admin.id).await.unwrap();
        assert_eq!(listing.slug, "logo-design");
        assert_eq!(listing.provider_id, Some(admin.id));
        assert_eq!(service.get_active("logo-design").await.unwrap().id, listing.id);

        service
            .update(listing.id, &FormData::new().with("status", "inactive"))
            .await
            .unwrap();
        assert!(matches!(service.get_active("logo-design").await, Err(ServiceError::NotFound(_))));

        service.delete(listing.id).await.unwrap();
        assert!(matches!(service.get(listing.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delivery_days_and_price_bounds() {
        let dir = TempDir::new().unwrap();
        let pool = testing::pool().await;
        let admin = testing::user(&pool, "Admin", UserRole::Admin).await;
        let service = ServiceListingService::new(
            SqlxServiceListingRepository::boxed(pool),
            Arc::new(testing::storage(&dir)),
        );

        let form = FormData::new()
            .with("name", "Audit")
            .with("price_cents", "-1")
            .with("delivery_days", "0");
        match service.create(&form, admin.id).await {
            Err(ServiceError::Validation(errors)) => {
                assert!(errors.has("price_cents"));
                assert!(errors.has("delivery_days"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
