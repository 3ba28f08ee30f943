//! Affiliate programs, links and commissions
//!
//! A percentage program stores basis points (1..=10000); a fixed program
//! stores cents. Commissions are created when a referred payment is approved.

use std::sync::Arc;
use uuid::Uuid;

use crate::db::repositories::{AffiliateRepository, ProductRepository};
use crate::models::{
    ActiveStatus, AffiliateCommission, AffiliateLink, AffiliateProgram, CommissionStatus,
    CommissionType, ListParams, NewCommission, PagedResult, Transaction,
};
use crate::services::error::{FieldErrors, ServiceError, ServiceResult};
use crate::services::form::{label, max_length, require, FormData};
use crate::services::slug::slug_for;

pub const CODE_LENGTH: usize = 10;
const MAX_BASIS_POINTS: i64 = 10_000;

/// Commission owed on `amount_cents`.
///
/// Percentages round half up and never exceed the amount; fixed values are
/// capped at the amount.
pub fn commission_amount(commission_type: CommissionType, value: i64, amount_cents: i64) -> i64 {
    let amount = amount_cents.max(0);
    match commission_type {
        CommissionType::Percentage => {
            let bps = value.clamp(0, MAX_BASIS_POINTS) as i128;
            ((amount as i128 * bps + MAX_BASIS_POINTS as i128 / 2) / MAX_BASIS_POINTS as i128) as i64
        }
        CommissionType::Fixed => value.max(0).min(amount),
    }
}

/// Commission for an approved payment referred through `link`, if it qualifies
pub fn commission_for(
    program: &AffiliateProgram,
    link: &AffiliateLink,
    transaction: &Transaction,
) -> Option<NewCommission> {
    if !program.is_active() || !program.covers(transaction.product_id) || link.user_id == transaction.user_id {
        return None;
    }
    Some(NewCommission {
        program_id: program.id,
        link_id: link.id,
        affiliate_user_id: link.user_id,
        transaction_id: transaction.id,
        amount_cents: commission_amount(
            program.commission_type,
            program.commission_value,
            transaction.amount_cents,
        ),
    })
}

fn generate_code() -> String {
    Uuid::new_v4().simple().to_string()[..CODE_LENGTH].to_string()
}

pub struct AffiliateService {
    repo: Arc<dyn AffiliateRepository>,
    products: Arc<dyn ProductRepository>,
}

impl AffiliateService {
    pub fn new(repo: Arc<dyn AffiliateRepository>, products: Arc<dyn ProductRepository>) -> Self {
        Self { repo, products }
    }

    pub async fn list_programs(
        &self,
        status: Option<ActiveStatus>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<AffiliateProgram>> {
        Ok(self.repo.list_programs(status, params).await?)
    }

    pub async fn get_program(&self, id: i64) -> ServiceResult<AffiliateProgram> {
        self.repo
            .get_program(id)
            .await?
            .ok_or(ServiceError::NotFound("Affiliate program"))
    }

    pub async fn create_program(&self, form: &FormData) -> ServiceResult<AffiliateProgram> {
        self.save_program(None, form).await
    }

    pub async fn update_program(&self, id: i64, form: &FormData) -> ServiceResult<AffiliateProgram> {
        let program = self.get_program(id).await?;
        self.save_program(Some(program), form).await
    }

    pub async fn delete_program(&self, id: i64) -> ServiceResult<()> {
        if !self.repo.delete_program(id).await? {
            return Err(ServiceError::NotFound("Affiliate program"));
        }
        Ok(())
    }

    async fn save_program(&self, existing: Option<AffiliateProgram>, form: &FormData) -> ServiceResult<AffiliateProgram> {
        let creating = existing.is_none();
        let mut errors = FieldErrors::new();
        let mut program = existing.unwrap_or_else(|| AffiliateProgram::new(String::new(), String::new()));

        if creating || form.has("name") {
            let name = form.text("name").unwrap_or_default();
            require(&mut errors, "name", name);
            max_length(&mut errors, "name", name, 255);
            program.name = name.to_string();
        }
        let current_slug = (!creating).then(|| program.slug.clone());
        program.slug = slug_for(form, "name", current_slug.as_deref(), &mut errors);
        if let Some(description) = form.text("description") {
            program.description = description.to_string();
        }
        if let Some(product_id) = form.nullable_integer("product_id", &mut errors) {
            if let Some(id) = product_id {
                if self.products.get_by_id(id).await?.is_none() {
                    errors.add("product_id", "The selected product id is invalid.");
                }
            }
            program.product_id = product_id;
        }
        if creating {
            require(&mut errors, "commission_type", form.text("commission_type").unwrap_or_default());
            require(&mut errors, "commission_value", form.text("commission_value").unwrap_or_default());
        }
        if let Some(commission_type) = form.choice::<CommissionType>("commission_type", &mut errors) {
            program.commission_type = commission_type;
        }
        if let Some(value) = form.integer("commission_value", &mut errors) {
            program.commission_value = value;
        }
        if !errors.has("commission_type") && !errors.has("commission_value") {
            validate_commission(&mut errors, program.commission_type, program.commission_value);
        }
        if let Some(status) = form.choice::<ActiveStatus>("status", &mut errors) {
            program.status = status;
        }
        if !errors.has("slug")
            && !program.slug.is_empty()
            && self
                .repo
                .program_slug_taken(&program.slug, (!creating).then_some(program.id))
                .await?
        {
            errors.add("slug", "The slug has already been taken.");
        }
        errors.into_result()?;

        let program = if creating {
            self.repo.create_program(&program).await?
        } else {
            self.repo.update_program(&program).await?
        };
        Ok(program)
    }

    /// Link of `user_id` for a program, created on first join
    pub async fn join(&self, program_id: i64, user_id: i64) -> ServiceResult<(AffiliateLink, bool)> {
        let program = self.get_program(program_id).await?;
        if let Some(link) = self.repo.find_link(program.id, user_id).await? {
            return Ok((link, false));
        }
        if !program.is_active() {
            return Err(ServiceError::InvalidState(
                "This affiliate program is not accepting new affiliates.".to_string(),
            ));
        }

        let mut code = generate_code();
        while self.repo.get_link_by_code(&code).await?.is_some() {
            code = generate_code();
        }
        match self.repo.create_link(program.id, user_id, &code).await {
            Ok(link) => {
                tracing::info!("User {} joined affiliate program {}", user_id, program.id);
                Ok((link, true))
            }
            // A concurrent join for the same user won the unique index.
            Err(e) => match self.repo.find_link(program.id, user_id).await? {
                Some(link) => Ok((link, false)),
                None => Err(e.into()),
            },
        }
    }

    pub async fn my_links(&self, user_id: i64) -> ServiceResult<Vec<AffiliateLink>> {
        Ok(self.repo.list_links_for_user(user_id).await?)
    }

    pub async fn my_commissions(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<AffiliateCommission>> {
        Ok(self.repo.list_commissions(None, Some(user_id), params).await?)
    }

    pub async fn list_commissions(
        &self,
        status: Option<CommissionStatus>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<AffiliateCommission>> {
        Ok(self.repo.list_commissions(status, None, params).await?)
    }

    pub async fn mark_paid(&self, id: i64) -> ServiceResult<AffiliateCommission> {
        if self.repo.get_commission(id).await?.is_none() {
            return Err(ServiceError::NotFound("Commission"));
        }
        if !self.repo.mark_paid(id).await? {
            return Err(ServiceError::InvalidState("Commission is already paid.".to_string()));
        }
        self.repo
            .get_commission(id)
            .await?
            .ok_or(ServiceError::NotFound("Commission"))
    }
}

fn validate_commission(errors: &mut FieldErrors, commission_type: CommissionType, value: i64) {
    let field = "commission_value";
    match commission_type {
        CommissionType::Percentage if !(1..=MAX_BASIS_POINTS).contains(&value) => errors.add(
            field,
            format!("The {} must be between 1 and {} basis points.", label(field), MAX_BASIS_POINTS),
        ),
        CommissionType::Fixed if value < 0 => {
            errors.add(field, format!("The {} must be at least 0.", label(field)))
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxAffiliateRepository, SqlxProductRepository};
    use crate::db::DynDatabasePool;
    use crate::models::{ContentStatus, UserRole};
    use crate::services::testing;
    use proptest::prelude::*;

    async fn setup() -> (DynDatabasePool, AffiliateService) {
        let pool = testing::pool().await;
        let service = AffiliateService::new(
            SqlxAffiliateRepository::boxed(pool.clone()),
            SqlxProductRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    fn program_form(name: &str) -> FormData {
        FormData::new()
            .with("name", name)
            .with("commission_type", "percentage")
            .with("commission_value", "1500")
    }

    #[test]
    fn test_commission_amount() {
        assert_eq!(commission_amount(CommissionType::Percentage, 1000, 5000), 500);
        // 12.5 rounds up
        assert_eq!(commission_amount(CommissionType::Percentage, 250, 500), 13);
        assert_eq!(commission_amount(CommissionType::Percentage, 10_000, 999), 999);
        assert_eq!(commission_amount(CommissionType::Fixed, 700, 500), 500);
        assert_eq!(commission_amount(CommissionType::Fixed, 300, 500), 300);
    }

    #[test]
    fn test_commission_for_rules() {
        let mut program = AffiliateProgram::new("P".into(), "p".into());
        program.id = 1;
        program.commission_value = 1000;
        let link = AffiliateLink {
            id: 2,
            program_id: 1,
            user_id: 10,
            code: "abcdefghij".into(),
            created_at: chrono::Utc::now(),
        };
        let mut tx = Transaction::new(20, 5, 5000, "REF".into());
        tx.id = 3;

        let commission = commission_for(&program, &link, &tx).unwrap();
        assert_eq!(commission.amount_cents, 500);
        assert_eq!(commission.affiliate_user_id, 10);

        program.product_id = Some(6);
        assert!(commission_for(&program, &link, &tx).is_none());
        program.product_id = Some(5);
        program.status = ActiveStatus::Inactive;
        assert!(commission_for(&program, &link, &tx).is_none());
        program.status = ActiveStatus::Active;
        tx.user_id = 10;
        assert!(commission_for(&program, &link, &tx).is_none());
    }

    #[tokio::test]
    async fn test_program_validation() {
        let (_, service) = setup().await;
        let form = program_form("Partners").with("commission_value", "0").with("product_id", "99");
        match service.create_program(&form).await {
            Err(ServiceError::Validation(errors)) => {
                assert!(errors.has("commission_value"));
                assert!(errors.has("product_id"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let fixed = program_form("Fixed").with("commission_type", "fixed").with("commission_value", "25000");
        let program = service.create_program(&fixed).await.unwrap();
        assert_eq!(program.commission_type, CommissionType::Fixed);
        assert_eq!(program.slug, "fixed");
    }

    #[tokio::test]
    async fn test_join_is_first_or_create() {
        let (pool, service) = setup().await;
        let user = testing::user(&pool, "Ann", UserRole::Customer).await;
        let program = service.create_program(&program_form("Partners")).await.unwrap();

        let (link, created) = service.join(program.id, user.id).await.unwrap();
        assert!(created);
        assert_eq!(link.code.len(), CODE_LENGTH);

        let (again, created) = service.join(program.id, user.id).await.unwrap();
        assert!(!created);
        assert_eq!(again.id, link.id);
        assert_eq!(service.my_links(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_join_inactive_program() {
        let (pool, service) = setup().await;
        let user = testing::user(&pool, "Ann", UserRole::Customer).await;
        let program = service
            .create_program(&program_form("Closed").with("status", "inactive"))
            .await
            .unwrap();

        assert!(matches!(
            service.join(program.id, user.id).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            service.join(program.id + 100, user.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_restricting_to_product() {
        let (pool, service) = setup().await;
        let product = testing::product(&pool, "course", 5000, ContentStatus::Published).await;
        let program = service
            .create_program(&program_form("Course partners").with("product_id", product.id.to_string()))
            .await
            .unwrap();
        assert_eq!(program.product_id, Some(product.id));

        let cleared = service
            .update_program(program.id, &FormData::new().with("product_id", ""))
            .await
            .unwrap();
        assert_eq!(cleared.product_id, None);
    }

    proptest! {
        #[test]
        fn percentage_never_exceeds_amount(bps in 1i64..=10_000, amount in 0i64..1_000_000_000) {
            let commission = commission_amount(CommissionType::Percentage, bps, amount);
            prop_assert!(commission >= 0);
            prop_assert!(commission <= amount);
        }

        #[test]
        fn fixed_is_min_of_value_and_amount(value in 0i64..1_000_000, amount in 0i64..1_000_000) {
            prop_assert_eq!(commission_amount(CommissionType::Fixed, value, amount), value.min(amount));
        }
    }
}
