//! Manual payment review
//!
//! Buyers pay off-platform and submit a reference (and optionally a proof
//! image). An admin approves or rejects; approval grants the product and
//! records any affiliate commission atomically.

use std::sync::Arc;

use crate::db::repositories::{
    AffiliateRepository, Approval, LibraryRepository, ProductRepository, TransactionRepository,
};
use crate::models::{ListParams, PagedResult, Transaction, TransactionFilter, TransactionSummary};
use crate::services::affiliate::commission_for;
use crate::services::error::{FieldErrors, ServiceError, ServiceResult};
use crate::services::form::{max_length, require, FormData};
use crate::storage::{Disk, FileKind, StagedFiles, Storage};

const PROOF_DIR: &str = "payments";

pub struct PaymentService {
    transactions: Arc<dyn TransactionRepository>,
    products: Arc<dyn ProductRepository>,
    library: Arc<dyn LibraryRepository>,
    affiliates: Arc<dyn AffiliateRepository>,
    storage: Arc<Storage>,
}

impl PaymentService {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        products: Arc<dyn ProductRepository>,
        library: Arc<dyn LibraryRepository>,
        affiliates: Arc<dyn AffiliateRepository>,
        storage: Arc<Storage>,
    ) -> Self {
        Self {
            transactions,
            products,
            library,
            affiliates,
            storage,
        }
    }

    pub async fn submit(&self, user_id: i64, form: &FormData) -> ServiceResult<Transaction> {
        let mut errors = FieldErrors::new();
        require(&mut errors, "product_id", form.text("product_id").unwrap_or_default());
        let reference = form.text("payment_reference").unwrap_or_default();
        require(&mut errors, "payment_reference", reference);
        max_length(&mut errors, "payment_reference", reference, 255);

        let mut product = None;
        if let Some(product_id) = form.integer("product_id", &mut errors) {
            match self.products.get_by_id(product_id).await? {
                Some(p) if p.is_published() => {
                    if self.library.find(user_id, p.id).await?.is_some() {
                        errors.add("product_id", "You already own this product.");
                    } else if self.transactions.has_pending(user_id, p.id).await? {
                        errors.add("product_id", "A payment for this product is already awaiting approval.");
                    }
                    product = Some(p);
                }
                _ => errors.add("product_id", "The selected product id is invalid."),
            }
        }

        let mut affiliate_link_id = None;
        if let Some(code) = form.filled("affiliate_code") {
            match self.affiliates.get_link_by_code(code).await? {
                Some(link) if link.user_id == user_id => {}
                Some(link) => affiliate_link_id = Some(link.id),
                None => errors.add("affiliate_code", "The selected affiliate code is invalid."),
            }
        }

        let proof = self
            .storage
            .change_for(form, "proof_image", FileKind::Image, &mut errors);
        errors.into_result()?;
        let product = product.ok_or(ServiceError::NotFound("Product"))?;

        let mut transaction = Transaction::new(user_id, product.id, product.price_cents, reference.to_string());
        transaction.affiliate_link_id = affiliate_link_id;

        let mut staged = StagedFiles::default();
        self.storage
            .apply(&mut staged, Disk::Public, PROOF_DIR, proof, &mut transaction.proof_image)
            .await?;
        let result = self.transactions.create(&transaction).await;
        staged.finish(&self.storage, result.is_ok()).await;

        let transaction = result?;
        tracing::info!(
            "Payment {} submitted by user {} for product {}",
            transaction.id,
            user_id,
            product.id
        );
        Ok(transaction)
    }

    pub async fn list(
        &self,
        filter: &TransactionFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<TransactionSummary>> {
        Ok(self.transactions.list(filter, params).await?)
    }

    pub async fn list_mine(&self, user_id: i64, params: &ListParams) -> ServiceResult<PagedResult<TransactionSummary>> {
        let filter = TransactionFilter {
            user_id: Some(user_id),
            ..TransactionFilter::default()
        };
        self.list(&filter, params).await
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Transaction> {
        self.transactions
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Payment"))
    }

    /// Approve a pending payment, granting the product to the buyer
    pub async fn approve(&self, id: i64, reviewer_id: i64) -> ServiceResult<(Transaction, Approval)> {
        let transaction = self.get(id).await?;
        if !transaction.is_pending() {
            return Err(not_pending());
        }

        let mut commission = None;
        if let Some(link_id) = transaction.affiliate_link_id {
            if let Some(link) = self.affiliates.get_link(link_id).await? {
                if let Some(program) = self.affiliates.get_program(link.program_id).await? {
                    commission = commission_for(&program, &link, &transaction);
                }
            }
        }

        let approval = self
            .transactions
            .approve(id, reviewer_id, commission)
            .await?
            .ok_or_else(not_pending)?;
        tracing::info!(
            "Payment {} approved by {} (library entry {}, new: {}, commission: {:?})",
            id,
            reviewer_id,
            approval.library_entry.id,
            approval.library_created,
            approval.commission_id
        );

        Ok((self.get(id).await?, approval))
    }

    pub async fn reject(&self, id: i64, reviewer_id: i64, reason: Option<&str>) -> ServiceResult<Transaction> {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        if let Some(reason) = reason {
            let mut errors = FieldErrors::new();
            max_length(&mut errors, "reason", reason, 1000);
            errors.into_result()?;
        }
        self.get(id).await?;
        if !self.transactions.reject(id, reviewer_id, reason).await? {
            return Err(not_pending());
        }
        tracing::info!("Payment {} rejected by {}", id, reviewer_id);
        self.get(id).await
    }
}

fn not_pending() -> ServiceError {
    ServiceError::InvalidState("This payment is not pending approval.".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxAffiliateRepository, SqlxLibraryRepository, SqlxProductRepository, SqlxTransactionRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::{ApprovalStatus, CommissionType, ContentStatus, User, UserRole};
    use crate::services::affiliate::AffiliateService;
    use crate::services::testing;
    use tempfile::TempDir;

    struct Fixture {
        pool: DynDatabasePool,
        service: PaymentService,
        affiliates: AffiliateService,
        admin: User,
        buyer: User,
        product_id: i64,
        _dir: TempDir,
    }

    async fn setup() -> Fixture {
        let dir = TempDir::new().unwrap();
        let pool = testing::pool().await;
        let admin = testing::user(&pool, "Admin", UserRole::Admin).await;
        let buyer = testing::user(&pool, "Buyer", UserRole::Customer).await;
        let product = testing::product(&pool, "course", 5000, ContentStatus::Published).await;
        let service = PaymentService::new(
            SqlxTransactionRepository::boxed(pool.clone()),
            SqlxProductRepository::boxed(pool.clone()),
            SqlxLibraryRepository::boxed(pool.clone()),
            SqlxAffiliateRepository::boxed(pool.clone()),
            Arc::new(testing::storage(&dir)),
        );
        let affiliates = AffiliateService::new(
            SqlxAffiliateRepository::boxed(pool.clone()),
            SqlxProductRepository::boxed(pool.clone()),
        );
        Fixture {
            pool,
            service,
            affiliates,
            admin,
            buyer,
            product_id: product.id,
            _dir: dir,
        }
    }

    fn submission(product_id: i64) -> FormData {
        FormData::new()
            .with("product_id", product_id.to_string())
            .with("payment_reference", "BANK-42")
    }

    #[tokio::test]
    async fn test_submit_uses_current_price() {
        let f = setup().await;
        let tx = f
            .service
            .submit(f.buyer.id, &submission(f.product_id).with_file("proof_image", testing::png()))
            .await
            .unwrap();
        assert_eq!(tx.amount_cents, 5000);
        assert_eq!(tx.status, ApprovalStatus::PendingApproval);
        assert!(tx.proof_image.is_some());
    }

    #[tokio::test]
    async fn test_submit_rejects_duplicates_and_drafts() {
        let f = setup().await;
        f.service.submit(f.buyer.id, &submission(f.product_id)).await.unwrap();

        match f.service.submit(f.buyer.id, &submission(f.product_id)).await {
            Err(ServiceError::Validation(errors)) => assert!(errors.has("product_id")),
            other => panic!("expected validation error, got {:?}", other),
        }

        let draft = testing::product(&f.pool, "draft", 100, ContentStatus::Draft).await;
        match f.service.submit(f.buyer.id, &submission(draft.id)).await {
            Err(ServiceError::Validation(errors)) => assert!(errors.has("product_id")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_affiliate_code() {
        let f = setup().await;
        let form = submission(f.product_id).with("affiliate_code", "nope");
        match f.service.submit(f.buyer.id, &form).await {
            Err(ServiceError::Validation(errors)) => assert!(errors.has("affiliate_code")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_approve_twice_and_owned_afterwards() {
        let f = setup().await;
        let tx = f.service.submit(f.buyer.id, &submission(f.product_id)).await.unwrap();

        let (approved, approval) = f.service.approve(tx.id, f.admin.id).await.unwrap();
        assert_eq!(approved.status, ApprovalStatus::Approved);
        assert_eq!(approved.reviewed_by, Some(f.admin.id));
        assert!(approval.library_created);

        assert!(matches!(
            f.service.approve(tx.id, f.admin.id).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            f.service.reject(tx.id, f.admin.id, None).await,
            Err(ServiceError::InvalidState(_))
        ));
        match f.service.submit(f.buyer.id, &submission(f.product_id)).await {
            Err(ServiceError::Validation(errors)) => assert!(errors.has("product_id")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reject_records_reason() {
        let f = setup().await;
        let tx = f.service.submit(f.buyer.id, &submission(f.product_id)).await.unwrap();
        let rejected = f
            .service
            .reject(tx.id, f.admin.id, Some("  No funds received "))
            .await
            .unwrap();
        assert_eq!(rejected.status, ApprovalStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("No funds received"));
    }

    #[tokio::test]
    async fn test_referred_payment_earns_commission() {
        let f = setup().await;
        let affiliate = testing::user(&f.pool, "Aff", UserRole::Customer).await;
        let program = f
            .affiliates
            .create_program(
                &FormData::new()
                    .with("name", "Partners")
                    .with("commission_type", CommissionType::Percentage.as_str())
                    .with("commission_value", "1250"),
            )
            .await
            .unwrap();
        let (link, _) = f.affiliates.join(program.id, affiliate.id).await.unwrap();

        let tx = f
            .service
            .submit(f.buyer.id, &submission(f.product_id).with("affiliate_code", link.code.clone()))
            .await
            .unwrap();
        assert_eq!(tx.affiliate_link_id, Some(link.id));

        let (_, approval) = f.service.approve(tx.id, f.admin.id).await.unwrap();
        assert!(approval.commission_id.is_some());
        let commissions = f
            .affiliates
            .my_commissions(affiliate.id, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(commissions.items[0].amount_cents, 625);
    }

    #[tokio::test]
    async fn test_own_affiliate_code_is_ignored() {
        let f = setup().await;
        let program = f
            .affiliates
            .create_program(
                &FormData::new()
                    .with("name", "Partners")
                    .with("commission_type", "fixed")
                    .with("commission_value", "100"),
            )
            .await
            .unwrap();
        let (link, _) = f.affiliates.join(program.id, f.buyer.id).await.unwrap();

        let tx = f
            .service
            .submit(f.buyer.id, &submission(f.product_id).with("affiliate_code", link.code))
            .await
            .unwrap();
        assert_eq!(tx.affiliate_link_id, None);
    }
}
