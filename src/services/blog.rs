//! Blog posts
//!
//! Content is Markdown; the rendered HTML is stored next to it so public
//! reads never render.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::repositories::BlogRepository;
use crate::models::{Blog, ContentStatus, ListParams, PagedResult};
use crate::services::error::{FieldErrors, ServiceError, ServiceResult};
use crate::services::form::{max_length, require, FormData};
use crate::services::markdown::MarkdownRenderer;
use crate::services::slug::slug_for;
use crate::storage::{Disk, FileKind, StagedFiles, Storage};

const BLOG_DIR: &str = "blogs";
const EXCERPT_LENGTH: usize = 200;

/// Stamp `published_at` the first time content goes live; later status
/// changes keep the original date.
pub(crate) fn stamp_published(status: ContentStatus, published_at: &mut Option<DateTime<Utc>>) {
    if status == ContentStatus::Published && published_at.is_none() {
        *published_at = Some(Utc::now());
    }
}

pub struct BlogService {
    repo: Arc<dyn BlogRepository>,
    storage: Arc<Storage>,
    renderer: MarkdownRenderer,
}

impl BlogService {
    pub fn new(repo: Arc<dyn BlogRepository>, storage: Arc<Storage>) -> Self {
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
    ) -> ServiceResult<PagedResult<Blog>> {
        Ok(self.repo.list(status, q, params).await?)
    }

    pub async fn list_published(&self, q: Option<&str>, params: &ListParams) -> ServiceResult<PagedResult<Blog>> {
        self.list(Some(ContentStatus::Published), q, params).await
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Blog> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Blog"))
    }

    pub async fn get_published(&self, slug: &str) -> ServiceResult<Blog> {
        self.repo
            .get_by_slug(slug)
            .await?
            .filter(|blog| blog.status == ContentStatus::Published)
            .ok_or(ServiceError::NotFound("Blog"))
    }

    pub async fn create(&self, form: &FormData, author_id: i64) -> ServiceResult<Blog> {
        let mut blog = Blog::new(String::new(), String::new());
        blog.author_id = Some(author_id);
        self.save(blog, form, true).await
    }

    pub async fn update(&self, id: i64, form: &FormData) -> ServiceResult<Blog> {
        let blog = self.get(id).await?;
        self.save(blog, form, false).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let blog = self.get(id).await?;
        self.repo.delete(id).await?;
        if let Some(cover) = &blog.cover_image {
            self.storage.delete(Disk::Public, cover).await;
        }
        Ok(())
    }

    async fn save(&self, mut blog: Blog, form: &FormData, creating: bool) -> ServiceResult<Blog> {
        let mut errors = FieldErrors::new();

        if creating || form.has("title") {
            let title = form.text("title").unwrap_or_default();
            require(&mut errors, "title", title);
            max_length(&mut errors, "title", title, 255);
            blog.title = title.to_string();
        }
        let current_slug = (!creating).then(|| blog.slug.clone());
        blog.slug = slug_for(form, "title", current_slug.as_deref(), &mut errors);
        if creating || form.has("content") {
            let content = form.text("content").unwrap_or_default();
            require(&mut errors, "content", content);
            blog.content = content.to_string();
        }
        if let Some(excerpt) = form.nullable_text("excerpt") {
            if let Some(text) = &excerpt {
                max_length(&mut errors, "excerpt", text, 500);
            }
            blog.excerpt = excerpt;
        }
        if let Some(status) = form.choice::<ContentStatus>("status", &mut errors) {
            blog.status = status;
        }
        let cover = self
            .storage
            .change_for(form, "cover_image", FileKind::Image, &mut errors);
        if !errors.has("slug")
            && !blog.slug.is_empty()
            && self.repo.slug_taken(&blog.slug, (!creating).then_some(blog.id)).await?
        {
            errors.add("slug", "The slug has already been taken.");
        }
        errors.into_result()?;

        blog.content_html = self.renderer.render(&blog.content);
        if blog.excerpt.is_none() {
            blog.excerpt = Some(self.renderer.excerpt(&blog.content, EXCERPT_LENGTH));
        }
        stamp_published(blog.status, &mut blog.published_at);

        let mut staged = StagedFiles::default();
        self.storage
            .apply(&mut staged, Disk::Public, BLOG_DIR, cover, &mut blog.cover_image)
            .await?;
        let result = if creating {
            self.repo.create(&blog).await
        } else {
            self.repo.update(&blog).await
        };
        staged.finish(&self.storage, result.is_ok()).await;

        Ok(result?)
    }
}
