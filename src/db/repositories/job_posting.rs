//! Job posting repository

use crate::db::repositories::{delete_by_id, slug_taken};
use crate::db::{like_pattern, DynDatabasePool, InsertedId};
use crate::models::{ContentStatus, JobPosting, ListParams, PagedResult};
use crate::with_pool;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait JobPostingRepository: Send + Sync {
    async fn create(&self, job: &JobPosting) -> Result<JobPosting>;
    async fn get_by_id(&self, id: i64) -> Result<Option<JobPosting>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<JobPosting>>;
    async fn list(
        &self,
        status: Option<ContentStatus>,
        q: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<JobPosting>>;
    /// Published postings that have not expired at `now`
    async fn list_open(
        &self,
        now: DateTime<Utc>,
        q: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<JobPosting>>;
    async fn update(&self, job: &JobPosting) -> Result<JobPosting>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool>;
}

pub struct SqlxJobPostingRepository {
    pool: DynDatabasePool,
}

impl SqlxJobPostingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn JobPostingRepository> {
        Arc::new(Self::new(pool))
    }
}

const SEARCH: &str = "(? IS NULL OR title LIKE ? ESCAPE '!' OR company LIKE ? ESCAPE '!')";

#[async_trait]
impl JobPostingRepository for SqlxJobPostingRepository {
    async fn create(&self, job: &JobPosting) -> Result<JobPosting> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO job_postings (posted_by, title, slug, company, location, employment_type, remote, \
                 salary_min_cents, salary_max_cents, description, apply_url, status, expires_at, created_at, \
                 updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(job.posted_by)
            .bind(&job.title)
            .bind(&job.slug)
            .bind(&job.company)
            .bind(&job.location)
            .bind(job.employment_type.as_str())
            .bind(job.remote)
            .bind(job.salary_min_cents)
            .bind(job.salary_max_cents)
            .bind(&job.description)
            .bind(&job.apply_url)
            .bind(job.status.as_str())
            .bind(job.expires_at)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create job posting")?
            .inserted_id()
        });

        Ok(JobPosting {
            id,
            created_at: now,
            updated_at: now,
            ..job.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<JobPosting>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, JobPosting>("SELECT * FROM job_postings WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get job posting")
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<JobPosting>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, JobPosting>("SELECT * FROM job_postings WHERE slug = ?")
                .bind(slug)
                .fetch_optional(pool)
                .await
                .context("Failed to get job posting by slug")
        })
    }

    async fn list(
        &self,
        status: Option<ContentStatus>,
        q: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<JobPosting>> {
        let status = status.map(|s| s.as_str());
        let pattern = q.map(like_pattern);
        let filter = format!("WHERE (? IS NULL OR status = ?) AND {}", SEARCH);
        let count_sql = format!("SELECT COUNT(*) FROM job_postings {}", filter);
        let list_sql = format!(
            "SELECT * FROM job_postings {} ORDER BY id DESC LIMIT ? OFFSET ?",
            filter
        );

        let (items, total) = with_pool!(self.pool, |pool| {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(status)
                .bind(status)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .fetch_one(pool)
                .await
                .context("Failed to count job postings")?;
            let items = sqlx::query_as::<_, JobPosting>(&list_sql)
                .bind(status)
                .bind(status)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list job postings")?;
            (items, total)
        });

        Ok(PagedResult::new(items, total, params))
    }

    async fn list_open(
        &self,
        now: DateTime<Utc>,
        q: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<JobPosting>> {
        let pattern = q.map(like_pattern);
        let filter = format!(
            "WHERE status = ? AND (expires_at IS NULL OR expires_at > ?) AND {}",
            SEARCH
        );
        let count_sql = format!("SELECT COUNT(*) FROM job_postings {}", filter);
        let list_sql = format!(
            "SELECT * FROM job_postings {} ORDER BY id DESC LIMIT ? OFFSET ?",
            filter
        );
        let published = ContentStatus::Published.as_str();

        let (items, total) = with_pool!(self.pool, |pool| {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(published)
                .bind(now)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .fetch_one(pool)
                .await
                .context("Failed to count open job postings")?;
            let items = sqlx::query_as::<_, JobPosting>(&list_sql)
                .bind(published)
                .bind(now)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list open job postings")?;
            (items, total)
        });

        Ok(PagedResult::new(items, total, params))
    }

    async fn update(&self, job: &JobPosting) -> Result<JobPosting> {
        let now = Utc::now();
        with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE job_postings SET posted_by = ?, title = ?, slug = ?, company = ?, location = ?, \
                 employment_type = ?, remote = ?, salary_min_cents = ?, salary_max_cents = ?, description = ?, \
                 apply_url = ?, status = ?, expires_at = ?, updated_at = ? WHERE id = ?",
            )
            .bind(job.posted_by)
            .bind(&job.title)
            .bind(&job.slug)
            .bind(&job.company)
            .bind(&job.location)
            .bind(job.employment_type.as_str())
            .bind(job.remote)
            .bind(job.salary_min_cents)
            .bind(job.salary_max_cents)
            .bind(&job.description)
            .bind(&job.apply_url)
            .bind(job.status.as_str())
            .bind(job.expires_at)
            .bind(now)
            .bind(job.id)
            .execute(pool)
            .await
            .context("Failed to update job posting")?;
        });

        Ok(JobPosting {
            updated_at: now,
            ..job.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        delete_by_id(&self.pool, "job_postings", id).await
    }

    async fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool> {
        slug_taken(&self.pool, "job_postings", slug, except_id).await
    }
}
