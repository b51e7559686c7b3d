//! Name normalization into platform-valid slugs.
//!
//! Automation platforms accept bare identifiers of the form
//! `[a-z0-9_]+`. User-entered display names are normalized once at
//! device creation and the result becomes the immutable device id.

use crate::error::{Error, Result};

/// Normalize an arbitrary name into a slug.
///
/// Lowercases, replaces whitespace/punctuation runs with a single `_`,
/// strips everything outside `[a-z0-9_]`, collapses repeated separators
/// and trims leading/trailing ones.
///
/// Idempotent: `normalize(normalize(x)) == normalize(x)`.
///
/// Returns [`Error::InvalidName`] when nothing survives the stripping.
pub fn normalize(raw: &str) -> Result<String> {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_sep = false;

    for ch in raw.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch);
        } else if ch == '_' || ch.is_whitespace() || ch.is_ascii_punctuation() {
            // Separator-like characters collapse into one underscore;
            // anything else (emoji, control chars) is dropped outright.
            pending_sep = true;
        }
    }

    if slug.is_empty() {
        return Err(Error::InvalidName(raw.to_string()));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_normalization() {
        assert_eq!(normalize("Bedroom Fan").unwrap(), "bedroom_fan");
        assert_eq!(normalize("Tony's Office Light").unwrap(), "tonys_office_light");
        assert_eq!(normalize("TV (living room)").unwrap(), "tv_living_room");
    }

    #[test]
    fn test_collapses_separator_runs() {
        assert_eq!(normalize("a  -  b").unwrap(), "a_b");
        assert_eq!(normalize("__leading__and__trailing__").unwrap(), "leading_and_trailing");
    }

    #[test]
    fn test_strips_non_ascii() {
        assert_eq!(normalize("Déck Fan").unwrap(), "dck_fan");
        assert_eq!(normalize("fan 🌀 2").unwrap(), "fan_2");
    }

    #[test]
    fn test_idempotent() {
        for raw in ["Bedroom Fan", "a--b__c", "X9 Pro MAX!", "speed_1"] {
            let once = normalize(raw).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_empty_is_invalid() {
        assert!(normalize("").is_err());
        assert!(normalize("!!! ---").is_err());
        assert!(normalize("   ").is_err());
    }
}
