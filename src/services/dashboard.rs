//! Admin dashboard counters

use chrono::Utc;
use std::sync::Arc;

use crate::db::repositories::{DashboardStats, StatsRepository};
use crate::services::error::ServiceResult;

pub struct DashboardService {
    stats: Arc<dyn StatsRepository>,
}

impl DashboardService {
    pub fn new(stats: Arc<dyn StatsRepository>) -> Self {
        Self { stats }
    }

    pub async fn stats(&self) -> ServiceResult<DashboardStats> {
        Ok(self.stats.dashboard(Utc::now()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxStatsRepository;
    use crate::models::{ContentStatus, UserRole};
    use crate::services::testing;

    #[tokio::test]
    async fn test_counts() {
        let pool = testing::pool().await;
        testing::user(&pool, "Admin", UserRole::Admin).await;
        testing::product(&pool, "a", 100, ContentStatus::Published).await;
        testing::product(&pool, "b", 100, ContentStatus::Draft).await;

        let stats = DashboardService::new(SqlxStatsRepository::boxed(pool))
            .stats()
            .await
            .unwrap();
        assert_eq!(stats.users, 1);
        assert_eq!(stats.products, 2);
        assert_eq!(stats.published_products, 1);
        assert_eq!(stats.approved_revenue_cents, 0);
    }
}
