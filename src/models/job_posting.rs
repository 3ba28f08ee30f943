//! Job board postings

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::common::{string_enum, ContentStatus};

string_enum! {
    EmploymentType ("employment type") {
        FullTime => "full_time",
        PartTime => "part_time",
        Contract => "contract",
        Freelance => "freelance",
        Internship => "internship",
    }
    default = FullTime
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobPosting {
    pub id: i64,
    pub posted_by: Option<i64>,
    pub title: String,
    pub slug: String,
    pub company: String,
    pub location: String,
    #[sqlx(try_from = "String")]
    pub employment_type: EmploymentType,
    pub remote: bool,
    pub salary_min_cents: Option<i64>,
    pub salary_max_cents: Option<i64>,
    pub description: String,
    /// http(s) or mailto link
    pub apply_url: String,
    #[sqlx(try_from = "String")]
    pub status: ContentStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobPosting {
    pub fn new(title: String, slug: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            posted_by: None,
            title,
            slug,
            company: String::new(),
            location: String::new(),
            employment_type: EmploymentType::FullTime,
            remote: false,
            salary_min_cents: None,
            salary_max_cents: None,
            description: String::new(),
            apply_url: String::new(),
            status: ContentStatus::Draft,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Published and not past its expiry
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ContentStatus::Published && self.expires_at.map_or(true, |at| at > now)
    }
}
