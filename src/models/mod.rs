//! Data models
//!
//! Database entities (mapped with `sqlx::FromRow`), their status enums and
//! the pagination types shared by repositories and the API.

mod ad;
mod affiliate;
mod blog;
mod common;
mod job_posting;
mod library;
mod newsletter;
mod product;
mod service_listing;
mod session;
mod sponsorship;
mod transaction;
mod user;

pub use ad::{AdPlacement, AdSlot, NativeAd};
pub use affiliate::{
    AffiliateCommission, AffiliateLink, AffiliateProgram, CommissionStatus, CommissionType,
    NewCommission,
};
pub use blog::Blog;
pub use common::{ActiveStatus, ApprovalStatus, ContentStatus, ListParams, PagedResult, UnknownVariant};
pub use job_posting::{EmploymentType, JobPosting};
pub use library::{LibraryEntry, LibraryItem};
pub use newsletter::{Newsletter, NewsletterStatus, NewsletterSubscriber};
pub use product::Product;
pub use service_listing::ServiceListing;
pub use session::Session;
pub use sponsorship::SponsorshipPost;
pub use transaction::{Transaction, TransactionFilter, TransactionSummary};
pub use user::{User, UserFilter, UserRole, UserStatus};
