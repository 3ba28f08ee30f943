//! Ad slots and native ads
//!
//! Live ads per placement are served from the memory cache; every slot or
//! ad write drops all cached placements.

use chrono::Utc;
use std::sync::Arc;

use crate::cache::{ads_key, MemoryCache, ADS_PATTERN};
use crate::db::repositories::{AdRepository, UserRepository};
use crate::models::{
    ActiveStatus, AdPlacement, AdSlot, ApprovalStatus, ListParams, NativeAd, PagedResult,
};
use crate::services::error::{FieldErrors, ServiceError, ServiceResult};
use crate::services::form::{is_http_url, max_length, min_value, require, FormData};
use crate::services::slug::slug_for;
use crate::storage::{Disk, FileKind, StagedFiles, Storage};

const AD_DIR: &str = "ads";

pub struct AdService {
    repo: Arc<dyn AdRepository>,
    users: Arc<dyn UserRepository>,
    storage: Arc<Storage>,
    cache: Arc<MemoryCache>,
}

impl AdService {
    pub fn new(
        repo: Arc<dyn AdRepository>,
        users: Arc<dyn UserRepository>,
        storage: Arc<Storage>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            repo,
            users,
            storage,
            cache,
        }
    }

    // ========================================================================
    // Slots
    // ========================================================================

    pub async fn list_slots(
        &self,
        placement: Option<AdPlacement>,
        status: Option<ActiveStatus>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<AdSlot>> {
        Ok(self.repo.list_slots(placement, status, params).await?)
    }

    pub async fn get_slot(&self, id: i64) -> ServiceResult<AdSlot> {
        self.repo
            .get_slot(id)
            .await?
            .ok_or(ServiceError::NotFound("Ad slot"))
    }

    pub async fn create_slot(&self, form: &FormData) -> ServiceResult<AdSlot> {
        self.save_slot(None, form).await
    }

    pub async fn update_slot(&self, id: i64, form: &FormData) -> ServiceResult<AdSlot> {
        let slot = self.get_slot(id).await?;
        self.save_slot(Some(slot), form).await
    }

    /// Deleting a slot cascades to its ads, so their images go too
    pub async fn delete_slot(&self, id: i64) -> ServiceResult<()> {
        self.get_slot(id).await?;
        let images = self.repo.ad_images_in_slot(id).await?;
        self.repo.delete_slot(id).await?;
        for image in &images {
            self.storage.delete(Disk::Public, image).await;
        }
        self.invalidate().await;
        Ok(())
    }

    async fn save_slot(&self, existing: Option<AdSlot>, form: &FormData) -> ServiceResult<AdSlot> {
        let creating = existing.is_none();
        let mut errors = FieldErrors::new();
        let mut slot = existing.unwrap_or_else(|| AdSlot::new(String::new(), String::new()));

        if creating || form.has("name") {
            let name = form.text("name").unwrap_or_default();
            require(&mut errors, "name", name);
            max_length(&mut errors, "name", name, 255);
            slot.name = name.to_string();
        }
        let current_slug = (!creating).then(|| slot.slug.clone());
        slot.slug = slug_for(form, "name", current_slug.as_deref(), &mut errors);
        if creating {
            for field in ["placement", "width", "height"] {
                require(&mut errors, field, form.text(field).unwrap_or_default());
            }
        }
        if let Some(placement) = form.choice::<AdPlacement>("placement", &mut errors) {
            slot.placement = placement;
        }
        if let Some(width) = form.integer("width", &mut errors) {
            min_value(&mut errors, "width", width, 1);
            slot.width = width;
        }
        if let Some(height) = form.integer("height", &mut errors) {
            min_value(&mut errors, "height", height, 1);
            slot.height = height;
        }
        if let Some(price) = form.integer("price_cents", &mut errors) {
            min_value(&mut errors, "price_cents", price, 0);
            slot.price_cents = price;
        }
        if let Some(status) = form.choice::<ActiveStatus>("status", &mut errors) {
            slot.status = status;
        }
        if !errors.has("slug")
            && !slot.slug.is_empty()
            && self
                .repo
                .slot_slug_taken(&slot.slug, (!creating).then_some(slot.id))
                .await?
        {
            errors.add("slug", "The slug has already been taken.");
        }
        errors.into_result()?;

        let slot = if creating {
            self.repo.create_slot(&slot).await?
        } else {
            self.repo.update_slot(&slot).await?
        };
        self.invalidate().await;
        Ok(slot)
    }

    // ========================================================================
    // Ads
    // ========================================================================

    pub async fn list_ads(
        &self,
        slot_id: Option<i64>,
        status: Option<ApprovalStatus>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<NativeAd>> {
        Ok(self.repo.list_ads(slot_id, status, params).await?)
    }

    pub async fn get_ad(&self, id: i64) -> ServiceResult<NativeAd> {
        self.repo
            .get_ad(id)
            .await?
            .ok_or(ServiceError::NotFound("Ad"))
    }

    pub async fn create_ad(&self, form: &FormData) -> ServiceResult<NativeAd> {
        self.save_ad(None, form).await
    }

    pub async fn update_ad(&self, id: i64, form: &FormData) -> ServiceResult<NativeAd> {
        let ad = self.get_ad(id).await?;
        self.save_ad(Some(ad), form).await
    }

    pub async fn delete_ad(&self, id: i64) -> ServiceResult<()> {
        let ad = self.get_ad(id).await?;
        self.repo.delete_ad(id).await?;
        if let Some(image) = &ad.image {
            self.storage.delete(Disk::Public, image).await;
        }
        self.invalidate().await;
        Ok(())
    }

    pub async fn approve(&self, id: i64) -> ServiceResult<NativeAd> {
        self.set_status(id, ApprovalStatus::Approved).await
    }

    pub async fn reject(&self, id: i64) -> ServiceResult<NativeAd> {
        self.set_status(id, ApprovalStatus::Rejected).await
    }

    async fn set_status(&self, id: i64, status: ApprovalStatus) -> ServiceResult<NativeAd> {
        let mut ad = self.get_ad(id).await?;
        ad.status = status;
        let ad = self.repo.update_ad(&ad).await?;
        self.invalidate().await;
        tracing::info!("Ad {} is now {}", ad.id, ad.status);
        Ok(ad)
    }

    async fn save_ad(&self, existing: Option<NativeAd>, form: &FormData) -> ServiceResult<NativeAd> {
        let creating = existing.is_none();
        let mut errors = FieldErrors::new();
        let mut ad = existing.unwrap_or_else(|| NativeAd::new(0, String::new()));

        if creating {
            for field in ["ad_slot_id", "title", "target_url"] {
                require(&mut errors, field, form.text(field).unwrap_or_default());
            }
        }
        if let Some(slot_id) = form.integer("ad_slot_id", &mut errors) {
            if self.repo.get_slot(slot_id).await?.is_none() {
                errors.add("ad_slot_id", "The selected ad slot id is invalid.");
            }
            ad.ad_slot_id = slot_id;
        }
        if let Some(advertiser_id) = form.nullable_integer("advertiser_id", &mut errors) {
            if let Some(id) = advertiser_id {
                if self.users.get_by_id(id).await?.is_none() {
                    errors.add("advertiser_id", "The selected advertiser id is invalid.");
                }
            }
            ad.advertiser_id = advertiser_id;
        }
        if let Some(title) = form.text("title") {
            if !creating {
                require(&mut errors, "title", title);
            }
            max_length(&mut errors, "title", title, 255);
            ad.title = title.to_string();
        }
        if let Some(body) = form.text("body") {
            ad.body = body.to_string();
        }
        if let Some(url) = form.text("target_url") {
            if !url.is_empty() && !is_http_url(url) {
                errors.add("target_url", "The target url must be a valid http or https URL.");
            } else if !creating {
                require(&mut errors, "target_url", url);
            }
            ad.target_url = url.to_string();
        }
        if let Some(starts_at) = form.datetime("starts_at", &mut errors) {
            ad.starts_at = starts_at;
        }
        if let Some(ends_at) = form.datetime("ends_at", &mut errors) {
            ad.ends_at = ends_at;
        }
        if let (Some(start), Some(end)) = (ad.starts_at, ad.ends_at) {
            if end <= start && !errors.has("starts_at") && !errors.has("ends_at") {
                errors.add("ends_at", "The ends at must be a date after starts at.");
            }
        }
        let image = self
            .storage
            .change_for(form, "image", FileKind::Image, &mut errors);
        errors.into_result()?;

        let mut staged = StagedFiles::default();
        self.storage
            .apply(&mut staged, Disk::Public, AD_DIR, image, &mut ad.image)
            .await?;
        let result = if creating {
            self.repo.create_ad(&ad).await
        } else {
            self.repo.update_ad(&ad).await
        };
        staged.finish(&self.storage, result.is_ok()).await;

        let ad = result?;
        self.invalidate().await;
        Ok(ad)
    }

    // ========================================================================
    // Public
    // ========================================================================

    /// Approved ads of active slots in `placement` that are running now
    pub async fn live(&self, placement: AdPlacement) -> ServiceResult<Vec<NativeAd>> {
        let key = ads_key(placement.as_str());
        match self.cache.get::<Vec<NativeAd>>(&key).await {
            Ok(Some(ads)) => return Ok(ads),
            Ok(None) => {}
            Err(e) => tracing::warn!("Discarding unreadable cache entry {}: {}", key, e),
        }

        let generation = self.cache.generation();
        let ads = self.repo.list_live(placement, Utc::now()).await?;
        if let Err(e) = self.cache.set_if_unchanged(&key, &ads, generation).await {
            tracing::warn!("Failed to cache {}: {}", key, e);
        }
        Ok(ads)
    }

    async fn invalidate(&self) {
        self.cache.delete_pattern(ADS_PATTERN).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxAdRepository, SqlxUserRepository};
    use crate::services::testing;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn setup(dir: &TempDir) -> AdService {
        let pool = testing::pool().await;
        AdService::new(
            SqlxAdRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool),
            Arc::new(testing::storage(dir)),
            Arc::new(MemoryCache::new(Duration::from_secs(300))),
        )
    }

    fn slot_form() -> FormData {
        FormData::new()
            .with("name", "Sidebar Top")
            .with("placement", "sidebar")
            .with("width", "300")
            .with("height", "250")
    }

    fn ad_form(slot_id: i64) -> FormData {
        FormData::new()
            .with("ad_slot_id", slot_id.to_string())
            .with("title", "Hosting deal")
            .with("target_url", "https://example.com/deal")
    }

    #[tokio::test]
    async fn test_slot_validation() {
        let dir = TempDir::new().unwrap();
        let service = setup(&dir).await;

        let form = slot_form().with("width", "0").with("placement", "popup");
        match service.create_slot(&form).await {
            Err(ServiceError::Validation(errors)) => {
                assert!(errors.has("width"));
                assert!(errors.has("placement"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let slot = service.create_slot(&slot_form()).await.unwrap();
        assert_eq!(slot.slug, "sidebar-top");
        assert!(matches!(
            service.create_slot(&slot_form()).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_ad_validation() {
        let dir = TempDir::new().unwrap();
        let service = setup(&dir).await;

        let form = ad_form(99)
            .with("target_url", "ftp://example.com")
            .with("starts_at", "2026-05-02")
            .with("ends_at", "2026-05-01");
        match service.create_ad(&form).await {
            Err(ServiceError::Validation(errors)) => {
                assert!(errors.has("ad_slot_id"));
                assert!(errors.has("target_url"));
                assert!(errors.has("ends_at"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_live_ads_follow_approval_and_cache_invalidation() {
        let dir = TempDir::new().unwrap();
        let service = setup(&dir).await;
        let slot = service.create_slot(&slot_form()).await.unwrap();
        let ad = service.create_ad(&ad_form(slot.id)).await.unwrap();
        assert_eq!(ad.status, ApprovalStatus::PendingApproval);

        // Pending ads are not served, and the empty result is now cached.
        assert!(service.live(AdPlacement::Sidebar).await.unwrap().is_empty());

        service.approve(ad.id).await.unwrap();
        let live = service.live(AdPlacement::Sidebar).await.unwrap();
        assert_eq!(live.len(), 1);
        assert!(service.live(AdPlacement::Header).await.unwrap().is_empty());

        service
            .update_slot(slot.id, &FormData::new().with("status", "inactive"))
            .await
            .unwrap();
        assert!(service.live(AdPlacement::Sidebar).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_ads_are_not_live() {
        let dir = TempDir::new().unwrap();
        let service = setup(&dir).await;
        let slot = service.create_slot(&slot_form()).await.unwrap();
        let ad = service
            .create_ad(&ad_form(slot.id).with("starts_at", "2020-01-01").with("ends_at", "2020-02-01"))
            .await
            .unwrap();
        service.approve(ad.id).await.unwrap();

        assert!(service.live(AdPlacement::Sidebar).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_slot_removes_ad_images() {
        let dir = TempDir::new().unwrap();
        let service = setup(&dir).await;
        let slot = service.create_slot(&slot_form()).await.unwrap();
        let ad = service
            .create_ad(&ad_form(slot.id).with_file("image", testing::png()))
            .await
            .unwrap();
        let image = ad.image.clone().unwrap();
        assert!(service.storage.read(Disk::Public, &image).await.unwrap().is_some());

        service.delete_slot(slot.id).await.unwrap();
        assert!(service.storage.read(Disk::Public, &image).await.unwrap().is_none());
        assert!(matches!(service.get_ad(ad.id).await, Err(ServiceError::NotFound(_))));
    }
}
