//! Ad slot and native ad repository

use crate::db::repositories::{delete_by_id, slug_taken};
use crate::db::{DynDatabasePool, InsertedId};
use crate::models::{
    ActiveStatus, AdPlacement, AdSlot, ApprovalStatus, ListParams, NativeAd, PagedResult,
};
use crate::with_pool;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait AdRepository: Send + Sync {
    async fn create_slot(&self, slot: &AdSlot) -> Result<AdSlot>;
    async fn get_slot(&self, id: i64) -> Result<Option<AdSlot>>;
    async fn list_slots(
        &self,
        placement: Option<AdPlacement>,
        status: Option<ActiveStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<AdSlot>>;
    async fn update_slot(&self, slot: &AdSlot) -> Result<AdSlot>;
    async fn delete_slot(&self, id: i64) -> Result<bool>;
    async fn slot_slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool>;

    async fn create_ad(&self, ad: &NativeAd) -> Result<NativeAd>;
    async fn get_ad(&self, id: i64) -> Result<Option<NativeAd>>;
    async fn list_ads(
        &self,
        slot_id: Option<i64>,
        status: Option<ApprovalStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<NativeAd>>;
    async fn update_ad(&self, ad: &NativeAd) -> Result<NativeAd>;
    async fn delete_ad(&self, id: i64) -> Result<bool>;
    /// Approved ads in active slots of `placement` whose window contains `now`
    async fn list_live(&self, placement: AdPlacement, now: DateTime<Utc>) -> Result<Vec<NativeAd>>;
    /// Image paths of every ad in a slot (needed before a cascading delete)
    async fn ad_images_in_slot(&self, slot_id: i64) -> Result<Vec<String>>;
}

pub struct SqlxAdRepository {
    pool: DynDatabasePool,
}

impl SqlxAdRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AdRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AdRepository for SqlxAdRepository {
    async fn create_slot(&self, slot: &AdSlot) -> Result<AdSlot> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO ad_slots (name, slug, placement, width, height, price_cents, status, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&slot.name)
            .bind(&slot.slug)
            .bind(slot.placement.as_str())
            .bind(slot.width)
            .bind(slot.height)
            .bind(slot.price_cents)
            .bind(slot.status.as_str())
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create ad slot")?
            .inserted_id()
        });

        Ok(AdSlot {
            id,
            created_at: now,
            updated_at: now,
            ..slot.clone()
        })
    }

    async fn get_slot(&self, id: i64) -> Result<Option<AdSlot>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, AdSlot>("SELECT * FROM ad_slots WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get ad slot")
        })
    }

    async fn list_slots(
        &self,
        placement: Option<AdPlacement>,
        status: Option<ActiveStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<AdSlot>> {
        let placement = placement.map(|p| p.as_str());
        let status = status.map(|s| s.as_str());
        let filter = "WHERE (? IS NULL OR placement = ?) AND (? IS NULL OR status = ?)";
        let count_sql = format!("SELECT COUNT(*) FROM ad_slots {}", filter);
        let list_sql = format!("SELECT * FROM ad_slots {} ORDER BY id DESC LIMIT ? OFFSET ?", filter);

        let (items, total) = with_pool!(self.pool, |pool| {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(placement)
                .bind(placement)
                .bind(status)
                .bind(status)
                .fetch_one(pool)
                .await
                .context("Failed to count ad slots")?;
            let items = sqlx::query_as::<_, AdSlot>(&list_sql)
                .bind(placement)
                .bind(placement)
                .bind(status)
                .bind(status)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list ad slots")?;
            (items, total)
        });

        Ok(PagedResult::new(items, total, params))
    }

    async fn update_slot(&self, slot: &AdSlot) -> Result<AdSlot> {
        let now = Utc::now();
        with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE ad_slots SET name = ?, slug = ?, placement = ?, width = ?, height = ?, price_cents = ?, \
                 status = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&slot.name)
            .bind(&slot.slug)
            .bind(slot.placement.as_str())
            .bind(slot.width)
            .bind(slot.height)
            .bind(slot.price_cents)
            .bind(slot.status.as_str())
            .bind(now)
            .bind(slot.id)
            .execute(pool)
            .await
            .context("Failed to update ad slot")?;
        });

        Ok(AdSlot {
            updated_at: now,
            ..slot.clone()
        })
    }

    async fn delete_slot(&self, id: i64) -> Result<bool> {
        delete_by_id(&self.pool, "ad_slots", id).await
    }

    async fn slot_slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool> {
        slug_taken(&self.pool, "ad_slots", slug, except_id).await
    }

    async fn create_ad(&self, ad: &NativeAd) -> Result<NativeAd> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO native_ads (ad_slot_id, advertiser_id, title, body, image, target_url, starts_at, \
                 ends_at, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(ad.ad_slot_id)
            .bind(ad.advertiser_id)
            .bind(&ad.title)
            .bind(&ad.body)
            .bind(&ad.image)
            .bind(&ad.target_url)
            .bind(ad.starts_at)
            .bind(ad.ends_at)
            .bind(ad.status.as_str())
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create native ad")?
            .inserted_id()
        });

        Ok(NativeAd {
            id,
            created_at: now,
            updated_at: now,
            ..ad.clone()
        })
    }

    async fn get_ad(&self, id: i64) -> Result<Option<NativeAd>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, NativeAd>("SELECT * FROM native_ads WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get native ad")
        })
    }

    async fn list_ads(
        &self,
        slot_id: Option<i64>,
        status: Option<ApprovalStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<NativeAd>> {
        let status = status.map(|s| s.as_str());
        let filter = "WHERE (? IS NULL OR ad_slot_id = ?) AND (? IS NULL OR status = ?)";
        let count_sql = format!("SELECT COUNT(*) FROM native_ads {}", filter);
        let list_sql = format!("SELECT * FROM native_ads {} ORDER BY id DESC LIMIT ? OFFSET ?", filter);

        let (items, total) = with_pool!(self.pool, |pool| {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(slot_id)
                .bind(slot_id)
                .bind(status)
                .bind(status)
                .fetch_one(pool)
                .await
                .context("Failed to count native ads")?;
            let items = sqlx::query_as::<_, NativeAd>(&list_sql)
                .bind(slot_id)
                .bind(slot_id)
                .bind(status)
                .bind(status)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list native ads")?;
            (items, total)
        });

        Ok(PagedResult::new(items, total, params))
    }

    async fn update_ad(&self, ad: &NativeAd) -> Result<NativeAd> {
        let now = Utc::now();
        with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE native_ads SET ad_slot_id = ?, advertiser_id = ?, title = ?, body = ?, image = ?, \
                 target_url = ?, starts_at = ?, ends_at = ?, status = ?, updated_at = ? WHERE id = ?",
            )
            .bind(ad.ad_slot_id)
            .bind(ad.advertiser_id)
            .bind(&ad.title)
            .bind(&ad.body)
            .bind(&ad.image)
            .bind(&ad.target_url)
            .bind(ad.starts_at)
            .bind(ad.ends_at)
            .bind(ad.status.as_str())
            .bind(now)
            .bind(ad.id)
            .execute(pool)
            .await
            .context("Failed to update native ad")?;
        });

        Ok(NativeAd {
            updated_at: now,
            ..ad.clone()
        })
    }

    async fn delete_ad(&self, id: i64) -> Result<bool> {
        delete_by_id(&self.pool, "native_ads", id).await
    }

    async fn list_live(&self, placement: AdPlacement, now: DateTime<Utc>) -> Result<Vec<NativeAd>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, NativeAd>(
                "SELECT a.* FROM native_ads a JOIN ad_slots s ON s.id = a.ad_slot_id \
                 WHERE s.placement = ? AND s.status = ? AND a.status = ? \
                 AND (a.starts_at IS NULL OR a.starts_at <= ?) \
                 AND (a.ends_at IS NULL OR a.ends_at > ?) \
                 ORDER BY a.id DESC",
            )
            .bind(placement.as_str())
            .bind(ActiveStatus::Active.as_str())
            .bind(ApprovalStatus::Approved.as_str())
            .bind(now)
            .bind(now)
            .fetch_all(pool)
            .await
            .context("Failed to list live ads")
        })
    }

    async fn ad_images_in_slot(&self, slot_id: i64) -> Result<Vec<String>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, String>(
                "SELECT image FROM native_ads WHERE ad_slot_id = ? AND image IS NOT NULL",
            )
            .bind(slot_id)
            .fetch_all(pool)
            .await
            .context("Failed to list ad images")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};
    use chrono::Duration;

    async fn setup_test_repo() -> SqlxAdRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxAdRepository::new(pool)
    }

    async fn slot(repo: &SqlxAdRepository, slug: &str, placement: AdPlacement) -> AdSlot {
        let mut slot = AdSlot::new(slug.to_uppercase(), slug.to_string());
        slot.placement = placement;
        slot.width = 300;
        slot.height = 250;
        repo.create_slot(&slot).await.unwrap()
    }

    async fn ad(repo: &SqlxAdRepository, slot_id: i64, status: ApprovalStatus) -> NativeAd {
        let mut ad = NativeAd::new(slot_id, "Buy things".to_string());
        ad.target_url = "https://example.com".to_string();
        ad.status = status;
        repo.create_ad(&ad).await.unwrap()
    }

    #[tokio::test]
    async fn test_slot_crud() {
        let repo = setup_test_repo().await;
        let mut created = slot(&repo, "top-banner", AdPlacement::Header).await;

        created.status = ActiveStatus::Inactive;
        repo.update_slot(&created).await.unwrap();
        let fetched = repo.get_slot(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ActiveStatus::Inactive);
        assert_eq!(fetched.placement, AdPlacement::Header);

        assert!(repo.slot_slug_taken("top-banner", None).await.unwrap());
        assert!(repo.delete_slot(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_live_filters_status_slot_and_window() {
        let repo = setup_test_repo().await;
        let sidebar = slot(&repo, "side", AdPlacement::Sidebar).await;
        let mut inactive = slot(&repo, "side-off", AdPlacement::Sidebar).await;
        inactive.status = ActiveStatus::Inactive;
        repo.update_slot(&inactive).await.unwrap();
        let footer = slot(&repo, "foot", AdPlacement::Footer).await;

        let live = ad(&repo, sidebar.id, ApprovalStatus::Approved).await;
        ad(&repo, sidebar.id, ApprovalStatus::PendingApproval).await;
        ad(&repo, inactive.id, ApprovalStatus::Approved).await;
        ad(&repo, footer.id, ApprovalStatus::Approved).await;

        let mut expired = ad(&repo, sidebar.id, ApprovalStatus::Approved).await;
        expired.starts_at = Some(Utc::now() - Duration::days(10));
        expired.ends_at = Some(Utc::now() - Duration::days(1));
        repo.update_ad(&expired).await.unwrap();

        let mut future = ad(&repo, sidebar.id, ApprovalStatus::Approved).await;
        future.starts_at = Some(Utc::now() + Duration::days(1));
        repo.update_ad(&future).await.unwrap();

        let results = repo.list_live(AdPlacement::Sidebar, Utc::now()).await.unwrap();
        let ids: Vec<i64> = results.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![live.id]);
    }

    #[tokio::test]
    async fn test_deleting_slot_cascades_ads() {
        let repo = setup_test_repo().await;
        let s = slot(&repo, "side", AdPlacement::Sidebar).await;
        let a = ad(&repo, s.id, ApprovalStatus::Approved).await;

        repo.delete_slot(s.id).await.unwrap();
        assert!(repo.get_ad(a.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_ads_by_slot_and_status() {
        let repo = setup_test_repo().await;
        let a = slot(&repo, "a", AdPlacement::Sidebar).await;
        let b = slot(&repo, "b", AdPlacement::InFeed).await;
        ad(&repo, a.id, ApprovalStatus::Approved).await;
        ad(&repo, a.id, ApprovalStatus::Rejected).await;
        ad(&repo, b.id, ApprovalStatus::Approved).await;

        let in_a = repo.list_ads(Some(a.id), None, &ListParams::default()).await.unwrap();
        assert_eq!(in_a.total, 2);

        let approved = repo
            .list_ads(None, Some(ApprovalStatus::Approved), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(approved.total, 2);
    }
}
