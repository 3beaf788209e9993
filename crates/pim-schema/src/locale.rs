//! BCP-47 language tag helpers.
//!
//! Only well-formedness is checked here (the syntax of RFC 5646), not whether
//! the subtags are registered.

use std::sync::LazyLock;

use regex::Regex;

static BCP47: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?xi)^(?:
            (?:[a-z]{2,3}(?:-[a-z]{3}){0,3}|[a-z]{4}|[a-z]{5,8})   # language
            (?:-[a-z]{4})?                                         # script
            (?:-(?:[a-z]{2}|[0-9]{3}))?                            # region
            (?:-(?:[a-z0-9]{5,8}|[0-9][a-z0-9]{3}))*               # variants
            (?:-[0-9a-wy-z](?:-[a-z0-9]{2,8})+)*                   # extensions
            (?:-x(?:-[a-z0-9]{1,8})+)?                             # private use
          | x(?:-[a-z0-9]{1,8})+                                   # private use only
        )$",
    )
    .unwrap_or_else(|e| unreachable!("static BCP-47 pattern is valid: {e}"))
});

/// Returns `true` if `tag` is a syntactically well-formed BCP-47 language tag.
///
/// ```
/// use pim_schema::locale::is_well_formed;
///
/// assert!(is_well_formed("en-US"));
/// assert!(!is_well_formed("xx_"));
/// ```
pub fn is_well_formed(tag: &str) -> bool {
    BCP47.is_match(tag)
}

/// Primary language subtag of a tag (`en` for `en-US`).
pub fn language(tag: &str) -> &str {
    tag.split('-').next().unwrap_or(tag)
}

/// How closely an installer's locale satisfies a requested locale.
///
/// Variants are declared best-first, so the derived `Ord` ranks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LocaleMatch {
    /// Same tag, ignoring case.
    Exact,
    /// Same primary language subtag.
    Language,
    /// Installer declares no locale.
    Untagged,
    /// Different language.
    Mismatch,
}

impl LocaleMatch {
    /// Grade `installer` against `requested`.
    pub fn grade(requested: &str, installer: Option<&str>) -> Self {
        match installer {
            None => Self::Untagged,
            Some(tag) if tag.eq_ignore_ascii_case(requested) => Self::Exact,
            Some(tag) if language(tag).eq_ignore_ascii_case(language(requested)) => {
                Self::Language
            }
            Some(_) => Self::Mismatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_tags() {
        for tag in ["en", "en-US", "zh-Hant-TW", "es-419", "de-CH-1996", "x-private", "EN-us"] {
            assert!(is_well_formed(tag), "{tag} should be well formed");
        }
    }

    #[test]
    fn rejects_malformed_tags() {
        for tag in ["", "xx_", "en_US", "e", "en-", "toolonglanguage", "en--US"] {
            assert!(!is_well_formed(tag), "{tag} should be rejected");
        }
    }

    #[test]
    fn grades_in_precedence_order() {
        assert_eq!(LocaleMatch::grade("en-US", Some("en-us")), LocaleMatch::Exact);
        assert_eq!(LocaleMatch::grade("en-US", Some("en-GB")), LocaleMatch::Language);
        assert_eq!(LocaleMatch::grade("en-US", None), LocaleMatch::Untagged);
        assert_eq!(LocaleMatch::grade("en-US", Some("fr-FR")), LocaleMatch::Mismatch);
        assert!(LocaleMatch::Exact < LocaleMatch::Language);
        assert!(LocaleMatch::Untagged < LocaleMatch::Mismatch);
    }
}
