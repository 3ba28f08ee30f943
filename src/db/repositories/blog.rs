//! Blog repository

use crate::db::repositories::{delete_by_id, slug_taken};
use crate::db::{like_pattern, DynDatabasePool, InsertedId};
use crate::models::{Blog, ContentStatus, ListParams, PagedResult};
use crate::with_pool;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait BlogRepository: Send + Sync {
    async fn create(&self, blog: &Blog) -> Result<Blog>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Blog>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Blog>>;
    /// Published posts sort by publish date, everything else by id
    async fn list(
        &self,
        status: Option<ContentStatus>,
        q: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<Blog>>;
    async fn update(&self, blog: &Blog) -> Result<Blog>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool>;
}

pub struct SqlxBlogRepository {
    pool: DynDatabasePool,
}

impl SqlxBlogRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BlogRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_FILTER: &str = "WHERE (? IS NULL OR status = ?) \
     AND (? IS NULL OR title LIKE ? ESCAPE '!' OR content LIKE ? ESCAPE '!')";

#[async_trait]
impl BlogRepository for SqlxBlogRepository {
    async fn create(&self, blog: &Blog) -> Result<Blog> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO blogs (author_id, title, slug, excerpt, content, content_html, cover_image, \
                 status, published_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(blog.author_id)
            .bind(&blog.title)
            .bind(&blog.slug)
            .bind(&blog.excerpt)
            .bind(&blog.content)
            .bind(&blog.content_html)
            .bind(&blog.cover_image)
            .bind(blog.status.as_str())
            .bind(blog.published_at)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create blog")?
            .inserted_id()
        });

        Ok(Blog {
            id,
            created_at: now,
            updated_at: now,
            ..blog.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Blog>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Blog>("SELECT * FROM blogs WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get blog")
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Blog>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Blog>("SELECT * FROM blogs WHERE slug = ?")
                .bind(slug)
                .fetch_optional(pool)
                .await
                .context("Failed to get blog by slug")
        })
    }

    async fn list(
        &self,
        status: Option<ContentStatus>,
        q: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<Blog>> {
        let order = match status {
            Some(ContentStatus::Published) => "published_at DESC, id DESC",
            _ => "id DESC",
        };
        let status = status.map(|s| s.as_str());
        let pattern = q.map(like_pattern);
        let count_sql = format!("SELECT COUNT(*) FROM blogs {}", LIST_FILTER);
        let list_sql = format!(
            "SELECT * FROM blogs {} ORDER BY {} LIMIT ? OFFSET ?",
            LIST_FILTER, order
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
                .context("Failed to count blogs")?;
            let items = sqlx::query_as::<_, Blog>(&list_sql)
                .bind(status)
                .bind(status)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list blogs")?;
            (items, total)
        });

        Ok(PagedResult::new(items, total, params))
    }

    async fn update(&self, blog: &Blog) -> Result<Blog> {
        let now = Utc::now();
        with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE blogs SET author_id = ?, title = ?, slug = ?, excerpt = ?, content = ?, content_html = ?, \
                 cover_image = ?, status = ?, published_at = ?, updated_at = ? WHERE id = ?",
            )
            .bind(blog.author_id)
            .bind(&blog.title)
            .bind(&blog.slug)
            .bind(&blog.excerpt)
            .bind(&blog.content)
            .bind(&blog.content_html)
            .bind(&blog.cover_image)
            .bind(blog.status.as_str())
            .bind(blog.published_at)
            .bind(now)
            .bind(blog.id)
            .execute(pool)
            .await
            .context("Failed to update blog")?;
        });

        Ok(Blog {
            updated_at: now,
            ..blog.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        delete_by_id(&self.pool, "blogs", id).await
    }

    async fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool> {
        slug_taken(&self.pool, "blogs", slug, except_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};
    use chrono::Duration;

    async fn setup_test_repo() -> SqlxBlogRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxBlogRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_by_slug() {
        let repo = setup_test_repo().await;
        let mut blog = Blog::new("Hello".to_string(), "hello".to_string());
        blog.content = "# Hi".to_string();
        blog.content_html = "<h1>Hi</h1>\n".to_string();
        let created = repo.create(&blog).await.unwrap();

        let fetched = repo.get_by_slug("hello").await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.content_html, "<h1>Hi</h1>\n");
        assert_eq!(fetched.status, ContentStatus::Draft);
    }

    #[tokio::test]
    async fn test_published_listing_orders_by_publish_date() {
        let repo = setup_test_repo().await;
        let now = Utc::now();

        let mut old = Blog::new("Old".to_string(), "old".to_string());
        old.status = ContentStatus::Published;
        old.published_at = Some(now - Duration::days(3));
        let mut new = Blog::new("New".to_string(), "new".to_string());
        new.status = ContentStatus::Published;
        new.published_at = Some(now);
        // Created last but published in between.
        let mut mid = Blog::new("Mid".to_string(), "mid".to_string());
        mid.status = ContentStatus::Published;
        mid.published_at = Some(now - Duration::days(1));

        repo.create(&old).await.unwrap();
        repo.create(&new).await.unwrap();
        repo.create(&mid).await.unwrap();
        repo.create(&Blog::new("Draft".to_string(), "draft".to_string()))
            .await
            .unwrap();

        let published = repo
            .list(Some(ContentStatus::Published), None, &ListParams::default())
            .await
            .unwrap();
        let slugs: Vec<&str> = published.items.iter().map(|b| b.slug.as_str()).collect();
        assert_eq!(slugs, vec!["new", "mid", "old"]);

        let all = repo.list(None, None, &ListParams::default()).await.unwrap();
        assert_eq!(all.total, 4);
    }

    #[tokio::test]
    async fn test_search_matches_title() {
        let repo = setup_test_repo().await;
        repo.create(&Blog::new("Rust tips".to_string(), "rust-tips".to_string()))
            .await
            .unwrap();
        repo.create(&Blog::new("Cooking".to_string(), "cooking".to_string()))
            .await
            .unwrap();

        let found = repo.list(None, Some("rust"), &ListParams::default()).await.unwrap();
        assert_eq!(found.total, 1);
    }
}
