//! Advertising: ad slots and the native ads booked into them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{string_enum, ActiveStatus, ApprovalStatus};

string_enum! {
    /// Where on the site a slot is rendered
    AdPlacement ("placement") {
        Header => "header",
        Sidebar => "sidebar",
        Footer => "footer",
        InFeed => "in_feed",
    }
    default = Sidebar
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AdSlot {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[sqlx(try_from = "String")]
    pub placement: AdPlacement,
    /// Pixel dimensions
    pub width: i64,
    pub height: i64,
    pub price_cents: i64,
    #[sqlx(try_from = "String")]
    pub status: ActiveStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdSlot {
    pub fn new(name: String, slug: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            slug,
            placement: AdPlacement::default(),
            width: 0,
            height: 0,
            price_cents: 0,
            status: ActiveStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NativeAd {
    pub id: i64,
    pub ad_slot_id: i64,
    pub advertiser_id: Option<i64>,
    pub title: String,
    pub body: String,
    pub image: Option<String>,
    pub target_url: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    #[sqlx(try_from = "String")]
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NativeAd {
    pub fn new(ad_slot_id: i64, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            ad_slot_id,
            advertiser_id: None,
            title,
            body: String::new(),
            image: None,
            target_url: String::new(),
            starts_at: None,
            ends_at: None,
            status: ApprovalStatus::PendingApproval,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `now` falls inside the optional schedule window
    pub fn is_running_at(&self, now: DateTime<Utc>) -> bool {
        self.starts_at.map_or(true, |start| start <= now) && self.ends_at.map_or(true, |end| end > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_placement_wire_names() {
        assert_eq!(AdPlacement::InFeed.as_str(), "in_feed");
        assert_eq!("IN_FEED".parse::<AdPlacement>().unwrap(), AdPlacement::InFeed);
        assert!("popup".parse::<AdPlacement>().is_err());
    }

    #[test]
    fn test_schedule_window() {
        let now = Utc::now();
        let mut ad = NativeAd::new(1, "Ad".to_string());
        assert!(ad.is_running_at(now));

        ad.starts_at = Some(now + Duration::hours(1));
        assert!(!ad.is_running_at(now));

        ad.starts_at = Some(now - Duration::hours(2));
        ad.ends_at = Some(now - Duration::hours(1));
        assert!(!ad.is_running_at(now));

        ad.ends_at = Some(now + Duration::hours(1));
        assert!(ad.is_running_at(now));
    }
}
