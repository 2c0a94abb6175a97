//! RAKE-style keyword phrase extraction.
//!
//! Text is cut into candidate phrases at punctuation and stopwords. Each word is
//! scored `(degree + frequency) / frequency`, where degree counts the other words it
//! shares phrases with, and a phrase scores the sum of its words.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::regex::Regex;

static PHRASE_DELIMITERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,.!?;:\n]\s*").unwrap());

static WORD_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9+\-#]").unwrap());

/// Words that break candidate phrases.
pub const STOPWORDS: [&str; 10] = ["and", "of", "the", "to", "in", "for", "a", "an", "on", "with"];

fn candidate_phrases(text: &str) -> Vec<Vec<String>> {
    let lowered = text.to_lowercase();
    let mut phrases = Vec::new();
    for sentence in PHRASE_DELIMITERS.split(&lowered) {
        let mut phrase: Vec<String> = Vec::new();
        for word in WORD_SPLIT.split(sentence).filter(|w| !w.is_empty()) {
            if STOPWORDS.contains(&word) {
                if !phrase.is_empty() {
                    phrases.push(std::mem::take(&mut phrase));
                }
            } else {
                phrase.push(word.to_string());
            }
        }
        if !phrase.is_empty() {
            phrases.push(phrase);
        }
    }
    phrases
}

/// Ranks the candidate phrases of `text`, best first, keeping at most `top_k`.
///
/// Phrases with equal scores keep their order of appearance. A phrase occurring
/// several times is listed each time.
///
/// # Examples
///
/// ```
/// use bibmetrics::keywords::rake_keywords;
///
/// let text = "Design research explores collaboration and innovation in architecture.";
/// let keywords = rake_keywords(text, 3);
///
/// assert_eq!(keywords[0].0, "design research explores collaboration");
/// assert_eq!(keywords[0].1, 16.0);
/// ```
pub fn rake_keywords(text: &str, top_k: usize) -> Vec<(String, f64)> {
    let phrases = candidate_phrases(text);

    let mut frequency: HashMap<&str, usize> = HashMap::new();
    let mut degree: HashMap<&str, usize> = HashMap::new();
    for phrase in &phrases {
        let unique: HashSet<&str> = phrase.iter().map(String::as_str).collect();
        for word in unique {
            *frequency.entry(word).or_default() += 1;
            *degree.entry(word).or_default() += phrase.len() - 1;
        }
    }

    let word_score = |word: &str| -> f64 {
        let freq = frequency.get(word).copied().unwrap_or(1) as f64;
        let deg = degree.get(word).copied().unwrap_or_default() as f64;
        (deg + freq) / freq
    };

    let mut scored: Vec<(String, f64)> = phrases
        .iter()
        .map(|phrase| {
            let score = phrase.iter().map(|w| word_score(w)).sum();
            (phrase.join(" "), score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rake_keywords() {
        let text = "Design research explores collaboration and innovation in architecture.";
        let keywords = rake_keywords(text, 3);
        assert_eq!(
            keywords,
            vec![
                ("design research explores collaboration".to_string(), 16.0),
                ("innovation".to_string(), 1.0),
                ("architecture".to_string(), 1.0),
            ]
        );
    }

    #[test]
    fn test_candidate_phrases_split_on_punctuation_and_stopwords() {
        let phrases = candidate_phrases("Parametric design; the C++ toolkit, and generative-AI!");
        assert_eq!(
            phrases,
            vec![
                vec!["parametric", "design"],
                vec!["c++", "toolkit"],
                vec!["generative-ai"],
            ]
        );
    }

    #[test]
    fn test_repeated_words_raise_scores() {
        let keywords = rake_keywords("urban design. urban form. timber", 10);
        // "urban" appears in two phrases of two words: (2 + 2) / 2 = 2
        assert_eq!(keywords[0], ("urban design".to_string(), 4.0));
        assert_eq!(keywords[1], ("urban form".to_string(), 4.0));
        assert_eq!(keywords[2], ("timber".to_string(), 1.0));
    }

    #[test]
    fn test_empty_input() {
        assert!(rake_keywords("", 5).is_empty());
        assert!(rake_keywords("the and of", 5).is_empty());
        assert!(rake_keywords("some words here", 0).is_empty());
    }
}
