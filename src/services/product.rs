//! Product catalogue
//!
//! Products carry a public cover image and a private downloadable file.

use std::sync::Arc;

use crate::db::repositories::ProductRepository;
use crate::models::{ContentStatus, ListParams, PagedResult, Product};
use crate::services::error::{FieldErrors, ServiceError, ServiceResult};
use crate::services::form::{max_length, min_value, require, FormData};
use crate::services::slug::slug_for;
use crate::storage::{Disk, FileKind, StagedFiles, Storage};

const PRODUCT_DIR: &str = "products";

pub struct ProductService {
    repo: Arc<dyn ProductRepository>,
    storage: Arc<Storage>,
}

impl ProductService {
    pub fn new(repo: Arc<dyn ProductRepository>, storage: Arc<Storage>) -> Self {
        Self { repo, storage }
    }

    pub async fn list(
        &self,
        status: Option<ContentStatus>,
        q: Option<&str>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Product>> {
        Ok(self.repo.list(status, q, params).await?)
    }

    pub async fn list_published(&self, q: Option<&str>, params: &ListParams) -> ServiceResult<PagedResult<Product>> {
        self.list(Some(ContentStatus::Published), q, params).await
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Product> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Product"))
    }

    /// Drafts and archived products are hidden from the storefront
    pub async fn get_published(&self, slug: &str) -> ServiceResult<Product> {
        self.repo
            .get_by_slug(slug)
            .await?
            .filter(Product::is_published)
            .ok_or(ServiceError::NotFound("Product"))
    }

    pub async fn create(&self, form: &FormData) -> ServiceResult<Product> {
        self.save(None, form).await
    }

    pub async fn update(&self, id: i64, form: &FormData) -> ServiceResult<Product> {
        let product = self.get(id).await?;
        self.save(Some(product), form).await
    }

    /// Paid products are archived instead; their payments stay on record
    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let product = self.get(id).await?;
        if self.repo.has_payments(id).await? {
            return Err(ServiceError::InvalidState(
                "This product has payments and cannot be deleted.".to_string(),
            ));
        }
        self.repo.delete(id).await?;
        if let Some(cover) = &product.cover_image {
            self.storage.delete(Disk::Public, cover).await;
        }
        if let Some(file) = &product.file_path {
            self.storage.delete(Disk::Private, file).await;
        }
        Ok(())
    }

    async fn save(&self, existing: Option<Product>, form: &FormData) -> ServiceResult<Product> {
        let creating = existing.is_none();
        let mut errors = FieldErrors::new();
        let mut product = existing.unwrap_or_else(|| Product::new(String::new(), String::new()));

        if creating || form.has("name") {
            let name = form.text("name").unwrap_or_default();
            require(&mut errors, "name", name);
            max_length(&mut errors, "name", name, 255);
            product.name = name.to_string();
        }
        let current_slug = (!creating).then(|| product.slug.clone());
        product.slug = slug_for(form, "name", current_slug.as_deref(), &mut errors);
        if let Some(description) = form.text("description") {
            product.description = description.to_string();
        }
        if creating {
            require(&mut errors, "price_cents", form.text("price_cents").unwrap_or_default());
        }
        if let Some(price) = form.integer("price_cents", &mut errors) {
            min_value(&mut errors, "price_cents", price, 0);
            product.price_cents = price;
        }
        if let Some(status) = form.choice::<ContentStatus>("status", &mut errors) {
            product.status = status;
        }
        let cover = self
            .storage
            .change_for(form, "cover_image", FileKind::Image, &mut errors);
        let file = self
            .storage
            .change_for(form, "file", FileKind::ProductFile, &mut errors);

        if !errors.has("slug")
            && !product.slug.is_empty()
            && self.repo.slug_taken(&product.slug, (!creating).then_some(product.id)).await?
        {
            errors.add("slug", "The slug has already been taken.");
        }
        errors.into_result()?;

        let mut staged = StagedFiles::default();
        self.storage
            .apply(&mut staged, Disk::Public, PRODUCT_DIR, cover, &mut product.cover_image)
            .await?;
        self.storage
            .apply(&mut staged, Disk::Private, PRODUCT_DIR, file, &mut product.file_path)
            .await?;
        let result = if creating {
            self.repo.create(&product).await
        } else {
            self.repo.update(&product).await
        };
        staged.finish(&self.storage, result.is_ok()).await;

        let product = result?;
        tracing::debug!("Saved product {} ({})", product.id, product.slug);
        Ok(product)
    }
}
