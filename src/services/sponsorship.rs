//! Sponsored posts

use std::sync::Arc;

use crate::db::repositories::SponsorshipRepository;
use crate::models::{ContentStatus, ListParams, PagedResult, SponsorshipPost};
use crate::services::blog::stamp_published;
use crate::services::error::{FieldErrors, ServiceError, ServiceResult};
use crate::services::form::{is_http_url, max_length, min_value, require, FormData};
use crate::services::markdown::MarkdownRenderer;
use crate::services::slug::slug_for;
use crate::storage::{Disk, FileKind, StagedFiles, Storage};

const SPONSORSHIP_DIR: &str = "sponsorships";

pub struct SponsorshipService {
    repo: Arc<dyn SponsorshipRepository>,
    storage: Arc<Storage>,
    renderer: MarkdownRenderer,
}

impl SponsorshipService {
    pub fn new(repo: Arc<dyn SponsorshipRepository>, storage: Arc<Storage>) -> Self {
        Self {
            repo,
            storage,
            renderer: MarkdownRenderer::new(),
        }
    }

    pub async fn list(
        &self,
        status: Option<ContentStatus>,
        q: Option<&str>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<SponsorshipPost>> {
        Ok(self.repo.list(status, q, params).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<SponsorshipPost> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Sponsorship post"))
    }

    pub async fn get_published(&self, slug: &str) -> ServiceResult<SponsorshipPost> {
        self.repo
            .get_by_slug(slug)
            .await?
            .filter(|post| post.status == ContentStatus::Published)
            .ok_or(ServiceError::NotFound("Sponsorship post"))
    }

    pub async fn create(&self, form: &FormData) -> ServiceResult<SponsorshipPost> {
        self.save(SponsorshipPost::new(String::new(), String::new()), form, true)
            .await
    }

    pub async fn update(&self, id: i64, form: &FormData) -> ServiceResult<SponsorshipPost> {
        let post = self.get(id).await?;
        self.save(post, form, false).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let post = self.get(id).await?;
        self.repo.delete(id).await?;
        if let Some(image) = &post.image {
            self.storage.delete(Disk::Public, image).await;
        }
        Ok(())
    }

    async fn save(&self, mut post: SponsorshipPost, form: &FormData, creating: bool) -> ServiceResult<SponsorshipPost> {
        let mut errors = FieldErrors::new();

        for (field, value) in [
            ("title", &mut post.title),
            ("sponsor_name", &mut post.sponsor_name),
            ("sponsor_url", &mut post.sponsor_url),
        ] {
            if creating || form.has(field) {
                let text = form.text(field).unwrap_or_default();
                require(&mut errors, field, text);
                max_length(&mut errors, field, text, 255);
                *value = text.to_string();
            }
        }
        if !post.sponsor_url.is_empty() && !errors.has("sponsor_url") && !is_http_url(&post.sponsor_url) {
            errors.add("sponsor_url", "The sponsor url must be a valid http or https URL.");
        }
        let current_slug = (!creating).then(|| post.slug.clone());
        post.slug = slug_for(form, "title", current_slug.as_deref(), &mut errors);
        if creating || form.has("content") {
            let content = form.text("content").unwrap_or_default();
            require(&mut errors, "content", content);
            post.content = content.to_string();
        }
        if let Some(price) = form.integer("price_cents", &mut errors) {
            min_value(&mut errors, "price_cents", price, 0);
            post.price_cents = price;
        }
        if let Some(status) = form.choice::<ContentStatus>("status", &mut errors) {
            post.status = status;
        }
        let image = self
            .storage
            .change_for(form, "image", FileKind::Image, &mut errors);
        if !errors.has("slug")
            && !post.slug.is_empty()
            && self.repo.slug_taken(&post.slug, (!creating).then_some(post.id)).await?
        {
            errors.add("slug", "The slug has already been taken.");
        }
        errors.into_result()?;

        post.content_html = self.renderer.render(&post.content);
        stamp_published(post.status, &mut post.published_at);

        let mut staged = StagedFiles::default();
        self.storage
            .apply(&mut staged, Disk::Public, SPONSORSHIP_DIR, image, &mut post.image)
            .await?;
        let result = if creating {
            self.repo.create(&post).await
        } else {
            self.repo.update(&post).await
        };
        staged.finish(&self.storage, result.is_ok()).await;

        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxSponsorshipRepository;
    use crate::services::testing;
    use tempfile::TempDir;

    async fn setup(dir: &TempDir) -> SponsorshipService {
        let pool = testing::pool().await;
        SponsorshipService::new(SqlxSponsorshipRepository::boxed(pool), Arc::new(testing::storage(dir)))
    }

    fn post_form() -> FormData {
        FormData::new()
            .with("title", "Brought to you by Acme")
            .with("sponsor_name", "Acme")
            .with("sponsor_url", "https://acme.test")
            .with("content", "Try *Acme* today")
            .with("price_cents", "50000")
    }

    #[tokio::test]
    async fn test_publish_flow() {
        let dir = TempDir::new().unwrap();
        let service = setup(&dir).await;
        let post = service.create(&post_form()).await.unwrap();
        assert!(post.content_html.contains("<em>Acme</em>"));
        assert!(post.published_at.is_none());
        assert!(service.get_published(&post.slug).await.is_err());

        let published = service
            .update(post.id, &FormData::new().with("status", "published"))
            .await
            .unwrap();
        assert!(published.published_at.is_some());
        assert_eq!(service.get_published(&post.slug).await.unwrap().id, post.id);
    }

    #[tokio::test]
    async fn test_sponsor_url_must_be_http() {
        let dir = TempDir::new().unwrap();
        let service = setup(&dir).await;
        match service.create(&post_form().with("sponsor_url", "acme.test")).await {
            Err(ServiceError::Validation(errors)) => assert!(errors.has("sponsor_url")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
