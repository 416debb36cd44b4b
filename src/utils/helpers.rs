//! Helper functions and utilities
//!
//! This module contains common helper functions used throughout the application.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new UUID v4
pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Format a timestamp for display
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Generate an opaque public slug for an activity.
///
/// Lowercase alphanumeric, no ambiguous characters (0/o, 1/l), long enough
/// that collisions are retried rather than prevented.
pub fn generate_public_slug() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"abcdefghijkmnpqrstuvwxyz23456789";
    const LENGTH: usize = 12;
    let mut rng = rand::thread_rng();

    (0..LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Normalize a control number for storage and matching
pub fn normalize_control_number(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Validate email format
pub fn is_valid_email(email: &str) -> bool {
    email.contains('@') && email.contains('.') && email.len() > 5
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_public_slug() {
        let slug = generate_public_slug();
        assert_eq!(slug.len(), 12);
        assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert!(!slug.contains('0'));
        assert!(!slug.contains('1'));
        assert!(!slug.contains('l'));
        assert!(!slug.contains('o'));
    }

    #[test]
    fn test_slugs_are_distinct() {
        let a = generate_public_slug();
        let b = generate_public_slug();
        assert_ne!(a, b);
    }

    #[test]
    fn test_normalize_control_number() {
        assert_eq!(normalize_control_number("  c19210001 "), "C19210001");
        assert_eq!(normalize_control_number("19210001"), "19210001");
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("student@university.edu"));
        assert!(!is_valid_email("bad"));
        assert!(!is_valid_email("a@b"));
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  Ana   María  "), "Ana María");
    }

    #[test]
    fn test_generate_uuid() {
        let id = generate_uuid();
        assert_eq!(id.len(), 36);
        assert_ne!(id, generate_uuid());
    }
}
