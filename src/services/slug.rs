//! URL slugs

use super::error::FieldErrors;
use super::form::{label, FormData};

/// Lowercase, hyphen-separated slug.
///
/// Alphanumeric characters (including non-ASCII letters) are kept, every other
/// run of characters becomes a single hyphen, and edge hyphens are trimmed.
pub fn generate_slug(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_hyphen && !result.is_empty() {
                result.push('-');
            }
            pending_hyphen = false;
            result.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    result
}

/// Slug for a create or update form.
///
/// A filled `slug` field wins. Otherwise an existing record keeps `current`
/// and a new one derives its slug from the `source` field.
pub fn slug_for(form: &FormData, source: &str, current: Option<&str>, errors: &mut FieldErrors) -> String {
    if let Some(raw) = form.filled("slug") {
        let slug = generate_slug(raw);
        if slug.is_empty() {
            errors.add("slug", "The slug format is invalid.");
        }
        return slug;
    }
    if let Some(current) = current {
        return current.to_string();
    }
    let text = form.text(source).unwrap_or_default();
    let slug = generate_slug(text);
    if slug.is_empty() && !text.is_empty() {
        errors.add(
            "slug",
            format!("A slug could not be generated from the {}.", label(source)),
        );
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("  Rust & Axum: 2026!  "), "rust-axum-2026");
        assert_eq!(generate_slug("already-a-slug"), "already-a-slug");
        assert_eq!(generate_slug("snake_case__name"), "snake-case-name");
        assert_eq!(generate_slug("Café Crème"), "café-crème");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[test]
    fn test_slug_for_forms() {
        let mut errors = FieldErrors::new();
        let form = FormData::new().with("title", "Hello World");
        assert_eq!(slug_for(&form, "title", None, &mut errors), "hello-world");
        assert_eq!(slug_for(&form, "title", Some("kept"), &mut errors), "kept");

        let form = form.with("slug", "Custom Slug");
        assert_eq!(slug_for(&form, "title", Some("kept"), &mut errors), "custom-slug");
        assert!(errors.is_empty());

        let form = FormData::new().with("title", "!!!");
        slug_for(&form, "title", None, &mut errors);
        let form = FormData::new().with("slug", "???");
        slug_for(&form, "title", Some("kept"), &mut errors);
        assert_eq!(errors.get("slug").map(|m| m.len()), Some(2));
    }

    proptest! {
        #[test]
        fn slug_is_idempotent(input in "[a-zA-Z0-9 _.,:!?éÉüÜ-]{0,40}") {
            let once = generate_slug(&input);
            prop_assert_eq!(generate_slug(&once), once.clone());
        }

        #[test]
        fn slug_has_no_edge_or_double_hyphens(input in "[a-zA-Z0-9 _.!-]{0,40}") {
            let slug = generate_slug(&input);
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert_eq!(slug.to_lowercase(), slug.clone());
            prop_assert!(!slug.contains(' '));
        }
    }
}
