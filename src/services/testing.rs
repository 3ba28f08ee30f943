//! Fixtures shared by service tests

use tempfile::TempDir;

use crate::config::UploadConfig;
use crate::db::repositories::{SqlxProductRepository, SqlxTransactionRepository, SqlxUserRepository};
use crate::db::{create_test_pool, migrations, DynDatabasePool};
use crate::models::{ContentStatus, Product, Transaction, User, UserRole};
use crate::services::form::UploadedFile;
use crate::storage::Storage;

pub async fn pool() -> DynDatabasePool {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

pub fn storage(dir: &TempDir) -> Storage {
    let mut config = UploadConfig::default();
    config.path = dir.path().join("public");
    config.private_path = dir.path().join("private");
    Storage::new(config)
}

pub fn png() -> UploadedFile {
    UploadedFile::new("image.png", "image/png", vec![137, 80, 78, 71])
}

pub fn pdf() -> UploadedFile {
    UploadedFile::new("book.pdf", "application/pdf", b"%PDF-1.4".to_vec())
}

pub async fn user(pool: &DynDatabasePool, name: &str, role: UserRole) -> User {
    let email = format!("{}@example.com", name.to_lowercase());
    SqlxUserRepository::boxed(pool.clone())
        .create(&User::new(name.to_string(), email, "hash".to_string(), role))
        .await
        .expect("Failed to create user")
}

pub async fn product(pool: &DynDatabasePool, slug: &str, price_cents: i64, status: ContentStatus) -> Product {
    let mut product = Product::new(slug.to_string(), slug.to_string());
    product.price_cents = price_cents;
    product.status = status;
    product.file_path = Some(format!("products/{}.pdf", slug));
    SqlxProductRepository::boxed(pool.clone())
        .create(&product)
        .await
        .expect("Failed to create product")
}

/// A pending payment with a proof image path
pub async fn payment(pool: &DynDatabasePool, user_id: i64, product_id: i64) -> Transaction {
    let mut transaction = Transaction::new(user_id, product_id, 100, "BANK-1".to_string());
    transaction.proof_image = Some("proofs/proof.png".to_string());
    SqlxTransactionRepository::boxed(pool.clone())
        .create(&transaction)
        .await
        .expect("Failed to create payment")
}
