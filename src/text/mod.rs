//! Text normalisation primitives shared by the summarizer and topic labelers.
//!
//! Everything here is a pure function of its input.

pub mod tagger;

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"[A-Za-z][A-Za-z']*")
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"\s+")
}

fn disallowed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"[^\w\s.!?,:;\-']")
}

/// English stopwords, sorted for binary search.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "don", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "it's", "its",
    "itself", "just", "let's", "me", "more", "most", "my", "myself", "no", "nor", "not", "now",
    "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over",
    "own", "s", "same", "she", "should", "so", "some", "such", "t", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
    "yours", "yourself", "yourselves",
];

#[must_use]
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.binary_search(&word).is_ok()
}

/// Collapses whitespace and strips characters that break sentence structure.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let collapsed = whitespace_re().replace_all(text, " ");
    let stripped = disallowed_re().replace_all(&collapsed, " ");
    whitespace_re().replace_all(&stripped, " ").trim().to_string()
}

/// Lower-cased word tokens, stopwords included.
#[must_use]
pub fn words(text: &str) -> Vec<String> {
    word_re()
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Lower-cased content words: stopwords and words shorter than three letters removed.
#[must_use]
pub fn content_words(text: &str) -> Vec<String> {
    words(text)
        .into_iter()
        .filter(|w| w.len() > 2 && !is_stopword(w))
        .collect()
}

/// Counts items and orders them by descending frequency, ties broken by the
/// position of their first occurrence.
#[must_use]
pub fn rank_by_frequency<I>(items: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = String>,
{
    let mut first_seen: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for item in items {
        let count = counts.entry(item.clone()).or_insert(0);
        if *count == 0 {
            first_seen.push(item);
        }
        *count += 1;
    }

    let mut ranked: Vec<(String, usize)> = first_seen
        .into_iter()
        .map(|item| {
            let count = counts.get(&item).copied().unwrap_or(0);
            (item, count)
        })
        .collect();
    // Stable sort keeps first-seen order among equal counts.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Splits cleaned text into sentences on terminal punctuation.
///
/// A terminator only ends a sentence when followed by whitespace and an
/// uppercase letter or digit, so abbreviations like "e.g. this" stay joined.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut current = String::new();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        current.push(c);

        if matches!(c, '.' | '!' | '?') {
            let mut j = i + 1;
            while j < chars.len() && matches!(chars[j], '.' | '!' | '?') {
                current.push(chars[j]);
                j += 1;
            }
            let at_end = j >= chars.len();
            let boundary = at_end
                || (chars[j].is_whitespace()
                    && chars[j + 1..]
                        .iter()
                        .find(|ch| !ch.is_whitespace())
                        .is_some_and(|ch| ch.is_uppercase() || ch.is_ascii_digit()));

            if boundary {
                let sentence = current.trim().to_string();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                current.clear();
            }
            i = j;
            continue;
        }

        i += 1;
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}
