//! Shared model types: status enums stored as strings, and pagination.

use serde::Serialize;

/// Error returned when a stored or submitted string is not a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declare a string-backed enum with serde, Display, FromStr and
/// `TryFrom<String>` (the latter is what `#[sqlx(try_from = "String")]` uses).
///
/// Parsing ignores ASCII case so `approved` and `APPROVED` are both accepted.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) {
            $($(#[$vmeta:meta])* $variant:ident => $value:literal),+ $(,)?
        }
        default = $default:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $value)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($value) {
                        return Ok($name::$variant);
                    }
                )+
                Err($crate::models::UnknownVariant {
                    kind: $label,
                    value: s.to_string(),
                })
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

pub(crate) use string_enum;

string_enum! {
    /// Lifecycle of publishable content (products, blogs, jobs, sponsored posts).
    ContentStatus ("content status") {
        Draft => "draft",
        Published => "published",
        Archived => "archived",
    }
    default = Draft
}

string_enum! {
    /// Review state of payments and native ads.
    ApprovalStatus ("approval status") {
        PendingApproval => "PENDING_APPROVAL",
        Approved => "APPROVED",
        Rejected => "REJECTED",
    }
    default = PendingApproval
}

string_enum! {
    /// On/off switch for slots, programs and service listings.
    ActiveStatus ("status") {
        Active => "active",
        Inactive => "inactive",
    }
    default = Active
}

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: i64,
    /// Number of items per page
    pub per_page: i64,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: Self::DEFAULT_PER_PAGE,
        }
    }
}

impl ListParams {
    pub const DEFAULT_PER_PAGE: i64 = 20;
    pub const MAX_PER_PAGE: i64 = 100;

    /// Create new pagination parameters
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    /// Build from optional query values, applying the defaults
    pub fn from_query(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self::new(
            page.unwrap_or(1),
            per_page.unwrap_or(Self::DEFAULT_PER_PAGE),
        )
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: i64,
    /// Number of items per page
    pub per_page: i64,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Last page number; an empty result still has page 1.
    pub fn last_page(&self) -> i64 {
        if self.total <= 0 || self.per_page <= 0 {
            return 1;
        }
        (self.total + self.per_page - 1) / self.per_page
    }

    /// Transform the items, keeping the paging metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_status_wire_format() {
        assert_eq!(ApprovalStatus::PendingApproval.to_string(), "PENDING_APPROVAL");
        assert_eq!(
            serde_json::to_string(&ApprovalStatus::Approved).unwrap(),
            "\"APPROVED\""
        );
        assert_eq!("approved".parse::<ApprovalStatus>().unwrap(), ApprovalStatus::Approved);
    }

    #[test]
    fn test_unknown_variant_message() {
        let err = "live".parse::<ContentStatus>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid content status: live");
    }

    #[test]
    fn test_try_from_string() {
        assert_eq!(
            ActiveStatus::try_from("inactive".to_string()).unwrap(),
            ActiveStatus::Inactive
        );
        assert!(ActiveStatus::try_from(String::new()).is_err());
    }

    #[test]
    fn test_list_params_defaults_and_clamping() {
        let params = ListParams::from_query(None, None);
        assert_eq!((params.page, params.per_page), (1, 20));
        assert_eq!(params.offset(), 0);

        let params = ListParams::from_query(Some(0), Some(1000));
        assert_eq!((params.page, params.per_page), (1, 100));

        let params = ListParams::from_query(Some(3), Some(0));
        assert_eq!(params.per_page, 1);
        assert_eq!(params.offset(), 2);
    }

    #[test]
    fn test_last_page() {
        let params = ListParams::new(1, 20);
        assert_eq!(PagedResult::<i32>::new(vec![], 0, &params).last_page(), 1);
        assert_eq!(PagedResult::<i32>::new(vec![], 20, &params).last_page(), 1);
        assert_eq!(PagedResult::<i32>::new(vec![], 21, &params).last_page(), 2);
    }
}
