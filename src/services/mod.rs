//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They:
//! - merge submitted form fields into records and validate them
//! - store and clean up uploaded files
//! - enforce state transitions (payment review, newsletter sending)
//!
//! Every operation returns [`ServiceResult`]; the API layer maps
//! [`ServiceError`] variants to status codes.

pub mod ad;
pub mod affiliate;
pub mod auth;
pub mod blog;
pub mod dashboard;
pub mod error;
pub mod form;
pub mod job_posting;
pub mod library;
pub mod mailer;
pub mod markdown;
pub mod newsletter;
pub mod password;
pub mod payment;
pub mod product;
pub mod rate_limiter;
pub mod service_listing;
pub mod slug;
pub mod sponsorship;
pub mod user;

#[cfg(test)]
pub(crate) mod testing;

pub use ad::AdService;
pub use affiliate::{commission_amount, AffiliateService};
pub use auth::{AuthService, AuthSession};
pub use blog::BlogService;
pub use dashboard::DashboardService;
pub use error::{FieldErrors, ServiceError, ServiceResult};
pub use form::{FormData, UploadedFile};
pub use job_posting::JobPostingService;
pub use library::{Download, LibraryService};
pub use mailer::{Mailer, MemoryMailer, OutgoingMail, SmtpMailer};
pub use markdown::MarkdownRenderer;
pub use newsletter::{Delivery, NewsletterService};
pub use password::{hash_password, verify_password};
pub use payment::PaymentService;
pub use product::ProductService;
pub use rate_limiter::LoginRateLimiter;
pub use service_listing::ServiceListingService;
pub use slug::generate_slug;
pub use sponsorship::SponsorshipService;
pub use user::UserService;
