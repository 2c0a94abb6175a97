//! Text normalisation shared by matching, deduplication and keyword extraction.
//!
//! Everything here is a pure string transform. Missing cells normalise to an empty
//! string, so callers never have to special-case nulls.

use std::sync::LazyLock;

use crate::Value;
use crate::regex::{Captures, Regex};

static UNICODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<U\+([0-9A-Fa-f]+)>").unwrap());

/// Suffixes stripped by [`lemmatise`], tried in order.
const LEMMA_SUFFIXES: [&str; 4] = ["ing", "ed", "es", "s"];

/// Shortest stem [`lemmatise`] will leave behind.
const MIN_STEM_LEN: usize = 3;

/// Normalises text for matching.
///
/// Decodes `<U+XXXX>` escapes found in some database exports, lowercases, replaces
/// every character other than letters, digits and hyphens with a space, and collapses
/// runs of whitespace.
///
/// # Examples
///
/// ```
/// use bibmetrics::text::normalise_text;
///
/// assert_eq!(normalise_text("  GAN;  Urban   Design "), "gan urban design");
/// assert_eq!(normalise_text("Rule-based (planning)"), "rule-based planning");
/// ```
pub fn normalise_text(value: &str) -> String {
    let decoded = convert_unicode_escapes(value);
    let cleaned: String = decoded
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`normalise_text`] for a table cell. Missing values yield an empty string.
pub fn normalise_value(value: &Value) -> String {
    if value.is_missing() {
        return String::new();
    }
    normalise_text(&value.to_text())
}

/// Splits normalised text into tokens. Hyphenated words stay whole.
pub fn tokenise(text: &str) -> Vec<String> {
    normalise_text(text)
        .split_whitespace()
        .map(String::from)
        .collect()
}

/// Strips one common English inflectional suffix (`ing`, `ed`, `es`, `s`), but only
/// when at least three characters of stem remain.
///
/// This is a crude heuristic: no dictionary, no irregular forms.
///
/// # Examples
///
/// ```
/// use bibmetrics::text::lemmatise;
///
/// assert_eq!(lemmatise("networks"), "network");
/// assert_eq!(lemmatise("gas"), "gas");
/// ```
pub fn lemmatise(token: &str) -> String {
    for suffix in LEMMA_SUFFIXES {
        if let Some(stem) = token.strip_suffix(suffix) {
            if stem.chars().count() >= MIN_STEM_LEN {
                return stem.to_string();
            }
        }
    }
    token.to_string()
}

/// Comparison key for titles: normalised text with hyphens treated as spaces, so
/// "GAN-assisted" and "GAN assisted" compare equal.
pub fn title_key(title: &str) -> String {
    normalise_text(title)
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Replaces `<U+03B1>`-style escapes with the character they encode. Invalid code
/// points are left untouched.
pub fn convert_unicode_escapes(input: &str) -> String {
    UNICODE_REGEX
        .replace_all(input, |caps: &Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("Deep Learning for BIM.", "deep learning for bim")]
    #[case("  tabs\tand\nnewlines  ", "tabs and newlines")]
    #[case("data-driven, rule-based", "data-driven rule-based")]
    #[case("Ω<U+03A9>!", "ωω")]
    #[case("", "")]
    fn test_normalise_text(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalise_text(input), expected);
    }

    #[test]
    fn test_normalise_value_handles_missing() {
        assert_eq!(normalise_value(&Value::Null), "");
        assert_eq!(normalise_value(&Value::Float(f64::NAN)), "");
        assert_eq!(normalise_value(&Value::Int(2021)), "2021");
        assert_eq!(
            normalise_value(&Value::from(vec!["Deep Learning", "BIM"])),
            "deep learning bim"
        );
    }

    #[rstest]
    #[case("planning", "plann")]
    #[case("learned", "learn")]
    #[case("techniques", "techniqu")]
    #[case("models", "model")]
    #[case("gas", "gas")]
    #[case("bus", "bus")]
    #[case("sing", "sing")]
    #[case("bim", "bim")]
    fn test_lemmatise(#[case] token: &str, #[case] expected: &str) {
        assert_eq!(lemmatise(token), expected);
    }

    #[test]
    fn test_tokenise_keeps_hyphens() {
        assert_eq!(
            tokenise("GAN-assisted Urban Design"),
            vec!["gan-assisted", "urban", "design"]
        );
    }

    #[test]
    fn test_title_key() {
        assert_eq!(title_key("GAN-assisted  Urban Design!"), "gan assisted urban design");
        assert_eq!(title_key("GAN assisted urban design"), "gan assisted urban design");
    }

    #[test]
    fn test_convert_unicode_escapes() {
        assert_eq!(convert_unicode_escapes("2<U+0391>-amino"), "2Α-amino");
        assert_eq!(convert_unicode_escapes("<U+0391><U+0392>"), "ΑΒ");
        assert_eq!(convert_unicode_escapes("<U+D800>"), "<U+D800>");
        assert_eq!(convert_unicode_escapes("plain"), "plain");
    }
}
