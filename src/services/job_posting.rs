//! Job board postings

use chrono::Utc;
use std::sync::Arc;

use crate::db::repositories::JobPostingRepository;
use crate::models::{ContentStatus, EmploymentType, JobPosting, ListParams, PagedResult};
use crate::services::error::{FieldErrors, ServiceError, ServiceResult};
use crate::services::form::{is_email, is_http_url, max_length, min_value, require, FormData};
use crate::services::slug::slug_for;

/// `http(s)://` URL or `mailto:` address
fn is_apply_target(value: &str) -> bool {
    match value.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("mailto:") => is_email(&value[7..]),
        _ => is_http_url(value),
    }
}

pub struct JobPostingService {
    repo: Arc<dyn JobPostingRepository>,
}

impl JobPostingService {
    pub fn new(repo: Arc<dyn JobPostingRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(
        &self,
        status: Option<ContentStatus>,
        q: Option<&str>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<JobPosting>> {
        Ok(self.repo.list(status, q, params).await?)
    }

    /// Published postings that have not expired
    pub async fn list_open(&self, q: Option<&str>, params: &ListParams) -> ServiceResult<PagedResult<JobPosting>> {
        Ok(self.repo.list_open(Utc::now(), q, params).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<JobPosting> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Job posting"))
    }

    pub async fn get_open(&self, slug: &str) -> ServiceResult<JobPosting> {
        let now = Utc::now();
        self.repo
            .get_by_slug(slug)
            .await?
            .filter(|job| job.is_open_at(now))
            .ok_or(ServiceError::NotFound("Job posting"))
    }

    pub async fn create(&self, form: &FormData, posted_by: i64) -> ServiceResult<JobPosting> {
        let mut job = JobPosting::new(String::new(), String::new());
        job.posted_by = Some(posted_by);
        self.save(job, form, true).await
    }

    pub async fn update(&self, id: i64, form: &FormData) -> ServiceResult<JobPosting> {
        let job = self.get(id).await?;
        self.save(job, form, false).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        if !self.repo.delete(id).await? {
            return Err(ServiceError::NotFound("Job posting"));
        }
        Ok(())
    }

    async fn save(&self, mut job: JobPosting, form: &FormData, creating: bool) -> ServiceResult<JobPosting> {
        let mut errors = FieldErrors::new();

        for (field, value) in [
            ("title", &mut job.title),
            ("company", &mut job.company),
            ("apply_url", &mut job.apply_url),
        ] {
            if creating || form.has(field) {
                let text = form.text(field).unwrap_or_default();
                require(&mut errors, field, text);
                max_length(&mut errors, field, text, 255);
                *value = text.to_string();
            }
        }
        let current_slug = (!creating).then(|| job.slug.clone());
        job.slug = slug_for(form, "title", current_slug.as_deref(), &mut errors);
        if !job.apply_url.is_empty() && !errors.has("apply_url") && !is_apply_target(&job.apply_url) {
            errors.add("apply_url", "The apply url must be an http(s) URL or a mailto: address.");
        }
        if let Some(location) = form.text("location") {
            max_length(&mut errors, "location", location, 255);
            job.location = location.to_string();
        }
        if let Some(description) = form.text("description") {
            job.description = description.to_string();
        }
        if let Some(employment_type) = form.choice::<EmploymentType>("employment_type", &mut errors) {
            job.employment_type = employment_type;
        }
        if let Some(remote) = form.boolean("remote", &mut errors) {
            job.remote = remote;
        }
        if let Some(min) = form.nullable_integer("salary_min_cents", &mut errors) {
            job.salary_min_cents = min;
        }
        if let Some(max) = form.nullable_integer("salary_max_cents", &mut errors) {
            job.salary_max_cents = max;
        }
        for (field, value) in [
            ("salary_min_cents", job.salary_min_cents),
            ("salary_max_cents", job.salary_max_cents),
        ] {
            if let Some(value) = value {
                min_value(&mut errors, field, value, 0);
            }
        }
        if let (Some(min), Some(max)) = (job.salary_min_cents, job.salary_max_cents) {
            if min > max && !errors.has("salary_min_cents") {
                errors.add(
                    "salary_max_cents",
                    "The salary max cents must be greater than or equal to salary min cents.",
                );
            }
        }
        if let Some(status) = form.choice::<ContentStatus>("status", &mut errors) {
            job.status = status;
        }
        if let Some(expires_at) = form.datetime("expires_at", &mut errors) {
            job.expires_at = expires_at;
        }
        if !errors.has("slug")
            && !job.slug.is_empty()
            && self.repo.slug_taken(&job.slug, (!creating).then_some(job.id)).await?
        {
            errors.add("slug", "The slug has already been taken.");
        }
        errors.into_result()?;

        let job = if creating {
            self.repo.create(&job).await?
        } else {
            self.repo.update(&job).await?
        };
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxJobPostingRepository;
    use crate::models::UserRole;
    use crate::services::testing;

    async fn setup() -> (JobPostingService, i64) {
        let pool = testing::pool().await;
        let admin = testing::user(&pool, "Admin", UserRole::Admin).await;
        (JobPostingService::new(SqlxJobPostingRepository::boxed(pool)), admin.id)
    }

    fn job_form(title: &str) -> FormData {
        FormData::new()
            .with("title", title)
            .with("company", "Acme")
            .with("apply_url", "mailto:jobs@acme.test")
            .with("employment_type", "contract")
            .with("status", "published")
    }

    #[test]
    fn test_apply_targets() {
        assert!(is_apply_target("https://acme.test/jobs/1"));
        assert!(is_apply_target("MAILTO:jobs@acme.test"));
        assert!(!is_apply_target("mailto:"));
        assert!(!is_apply_target("ftp://acme.test"));
    }

    #[tokio::test]
    async fn test_validation() {
        let (service, admin) = setup().await;
        let form = job_form("Rust Engineer")
            .with("apply_url", "javascript:alert(1)")
            .with("employment_type", "gig")
            .with("salary_min_cents", "900000")
            .with("salary_max_cents", "100000");
        match service.create(&form, admin).await {
            Err(ServiceError::Validation(errors)) => {
                assert!(errors.has("apply_url"));
                assert!(errors.has("employment_type"));
                assert!(errors.has("salary_max_cents"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_postings_are_hidden() {
        let (service, admin) = setup().await;
        let open = service.create(&job_form("Rust Engineer"), admin).await.unwrap();
        assert_eq!(open.employment_type, EmploymentType::Contract);
        service
            .create(&job_form("Old Role").with("expires_at", "2020-01-01"), admin)
            .await
            .unwrap();
        service
            .create(&job_form("Draft Role").with("status", "draft"), admin)
            .await
            .unwrap();

        let listed = service.list_open(None, &ListParams::default()).await.unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.items[0].id, open.id);
        assert!(service.get_open("rust-engineer").await.is_ok());
        assert!(matches!(service.get_open("old-role").await, Err(ServiceError::NotFound(_))));
        assert!(matches!(service.get_open("draft-role").await, Err(ServiceError::NotFound(_))));
    }
}
