//! Upload storage
//!
//! Two disks: the public disk is served under `upload.public_url`, the
//! private disk holds product files that are only streamed to their owners.
//! Stored paths are relative to the disk root and look like
//! `<dir>/<uuid>.<ext>`.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::services::error::FieldErrors;
use crate::services::form::{label, FormData, UploadedFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disk {
    Public,
    Private,
}

/// What an upload field may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    ProductFile,
}

/// Requested change to a file column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Keep,
    Replace(UploadedFile),
    Remove,
}

pub struct Storage {
    config: UploadConfig,
}

impl Storage {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    fn root(&self, disk: Disk) -> &Path {
        match disk {
            Disk::Public => &self.config.path,
            Disk::Private => &self.config.private_path,
        }
    }

    /// Create both disk roots
    pub async fn ensure_dirs(&self) -> Result<()> {
        for disk in [Disk::Public, Disk::Private] {
            let root = self.root(disk);
            fs::create_dir_all(root)
                .await
                .with_context(|| format!("Failed to create upload dir {}", root.display()))?;
        }
        Ok(())
    }

    /// Check type and size; the message is ready for a field error
    pub fn validate(&self, field: &str, kind: FileKind, file: &UploadedFile) -> Result<(), String> {
        let allowed = match kind {
            FileKind::Image => self.config.is_type_allowed(&file.content_type),
            FileKind::ProductFile => self.config.is_product_type_allowed(&file.content_type),
        };
        if !allowed {
            let noun = match kind {
                FileKind::Image => "an image",
                FileKind::ProductFile => "a file of an allowed type",
            };
            return Err(format!("The {} must be {}.", label(field), noun));
        }
        if file.size() > self.config.max_file_size {
            return Err(format!(
                "The {} may not be greater than {} kilobytes.",
                label(field),
                self.config.max_file_size / 1024
            ));
        }
        Ok(())
    }

    /// Read the change requested for `field`: a new upload wins over `remove_<field>`
    pub fn change_for(
        &self,
        form: &FormData,
        field: &str,
        kind: FileKind,
        errors: &mut FieldErrors,
    ) -> FileChange {
        if let Some(file) = form.file(field) {
            return match self.validate(field, kind, file) {
                Ok(()) => FileChange::Replace(file.clone()),
                Err(message) => {
                    errors.add(field, message);
                    FileChange::Keep
                }
            };
        }
        if form.flag(&format!("remove_{}", field)) {
            FileChange::Remove
        } else {
            FileChange::Keep
        }
    }

    /// Write `file` under `dir` and return its disk-relative path
    pub async fn store(&self, disk: Disk, dir: &str, file: &UploadedFile) -> Result<String> {
        let target_dir = self.root(disk).join(dir);
        fs::create_dir_all(&target_dir)
            .await
            .with_context(|| format!("Failed to create upload dir {}", target_dir.display()))?;

        let ext = self.config.get_extension(&file.content_type);
        let name = format!("{}.{}", Uuid::new_v4(), ext);
        fs::write(target_dir.join(&name), &file.bytes)
            .await
            .context("Failed to save uploaded file")?;

        Ok(format!("{}/{}", dir, name))
    }

    /// Delete a stored file; a file that is already gone is not an error
    pub async fn delete(&self, disk: Disk, path: &str) {
        let Some(full) = self.resolve(disk, path) else {
            tracing::warn!("Refusing to delete suspicious upload path {}", path);
            return;
        };
        match fs::remove_file(&full).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to delete {}: {}", full.display(), e),
        }
    }

    /// Absolute path of a stored file, rejecting anything that escapes the disk
    pub fn resolve(&self, disk: Disk, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| self.root(disk).join(relative))
    }

    pub async fn read(&self, disk: Disk, path: &str) -> Result<Option<Vec<u8>>> {
        let Some(full) = self.resolve(disk, path) else {
            return Ok(None);
        };
        match fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", full.display())),
        }
    }

    /// Public URL of a file on the public disk
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.public_url.trim_end_matches('/'), path)
    }

    /// Serialize `value` and add `<field>_url` next to each listed file field
    pub fn present<T: Serialize>(&self, value: &T, fields: &[&str]) -> Value {
        let mut json = serde_json::to_value(value).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut json {
            for field in fields {
                let url = match map.get(*field) {
                    Some(Value::String(path)) => Value::String(self.url(path)),
                    _ => Value::Null,
                };
                map.insert(format!("{}_url", field), url);
            }
        }
        json
    }

    /// Apply `change` to `current`, staging writes so they can be undone
    pub async fn apply(
        &self,
        staged: &mut StagedFiles,
        disk: Disk,
        dir: &str,
        change: FileChange,
        current: &mut Option<String>,
    ) -> Result<()> {
        match change {
            FileChange::Keep => {}
            FileChange::Remove => {
                if let Some(old) = current.take() {
                    staged.replaced.push((disk, old));
                }
            }
            FileChange::Replace(file) => {
                let path = self.store(disk, dir, &file).await?;
                staged.stored.push((disk, path.clone()));
                if let Some(old) = current.replace(path) {
                    staged.replaced.push((disk, old));
                }
            }
        }
        Ok(())
    }
}

/// Files written or superseded during one save
#[derive(Debug, Default)]
pub struct StagedFiles {
    stored: Vec<(Disk, String)>,
    replaced: Vec<(Disk, String)>,
}

impl StagedFiles {
    /// On success drop the superseded files, on failure drop the new ones
    pub async fn finish(self, storage: &Storage, saved: bool) {
        let doomed = if saved { self.replaced } else { self.stored };
        for (disk, path) in doomed {
            storage.delete(disk, &path).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> Storage {
        let mut config = UploadConfig::default();
        config.path = dir.path().join("public");
        config.private_path = dir.path().join("private");
        config.max_file_size = 1024;
        Storage::new(config)
    }

    fn png() -> UploadedFile {
        UploadedFile::new("cover.png", "image/png", vec![1, 2, 3])
    }

    #[tokio::test]
    async fn test_store_read_delete() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let path = storage.store(Disk::Public, "products", &png()).await.unwrap();
        assert!(path.starts_with("products/"));
        assert!(path.ends_with(".png"));
        assert_eq!(storage.read(Disk::Public, &path).await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(storage.read(Disk::Private, &path).await.unwrap(), None);

        storage.delete(Disk::Public, &path).await;
        assert_eq!(storage.read(Disk::Public, &path).await.unwrap(), None);
        // Second delete of a missing file is silent.
        storage.delete(Disk::Public, &path).await;
    }

    #[test]
    fn test_validate_type_and_size() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        assert!(storage.validate("cover_image", FileKind::Image, &png()).is_ok());
        let pdf = UploadedFile::new("a.pdf", "application/pdf", vec![0]);
        assert_eq!(
            storage.validate("cover_image", FileKind::Image, &pdf).unwrap_err(),
            "The cover image must be an image."
        );
        assert!(storage.validate("file", FileKind::ProductFile, &pdf).is_ok());

        let big = UploadedFile::new("big.png", "image/png", vec![0; 2048]);
        assert!(storage.validate("image", FileKind::Image, &big).is_err());
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        assert!(storage.resolve(Disk::Private, "../secret").is_none());
        assert!(storage.resolve(Disk::Private, "/etc/passwd").is_none());
        assert!(storage.resolve(Disk::Private, "products/a.pdf").is_some());
    }

    #[test]
    fn test_present_adds_urls() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let value = serde_json::json!({ "cover_image": "products/a.png", "image": null });
        let json = storage.present(&value, &["cover_image", "image"]);
        assert_eq!(json["cover_image_url"], "/storage/products/a.png");
        assert!(json["image_url"].is_null());
    }

    #[tokio::test]
    async fn test_apply_replace_then_finish() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let old = storage.store(Disk::Public, "blogs", &png()).await.unwrap();

        let mut current = Some(old.clone());
        let mut staged = StagedFiles::default();
        storage
            .apply(&mut staged, Disk::Public, "blogs", FileChange::Replace(png()), &mut current)
            .await
            .unwrap();
        let new = current.clone().unwrap();
        assert_ne!(new, old);

        staged.finish(&storage, true).await;
        assert!(storage.read(Disk::Public, &old).await.unwrap().is_none());
        assert!(storage.read(Disk::Public, &new).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_save_removes_new_file() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let mut current = None;
        let mut staged = StagedFiles::default();
        storage
            .apply(&mut staged, Disk::Public, "ads", FileChange::Replace(png()), &mut current)
            .await
            .unwrap();
        let new = current.unwrap();

        staged.finish(&storage, false).await;
        assert!(storage.read(Disk::Public, &new).await.unwrap().is_none());
    }

    #[test]
    fn test_change_for_prefers_upload_over_remove() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let mut errors = FieldErrors::new();

        let form = FormData::new().with("remove_image", "true");
        assert_eq!(
            storage.change_for(&form, "image", FileKind::Image, &mut errors),
            FileChange::Remove
        );

        let form = form.with_file("image", png());
        assert_eq!(
            storage.change_for(&form, "image", FileKind::Image, &mut errors),
            FileChange::Replace(png())
        );
        assert!(errors.is_empty());
    }
}
