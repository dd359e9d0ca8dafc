//! Extractive summarization and topic labeling.
//!
//! [`ExtractiveSummarizer`] is a pure function of `(text, SummarizerConfig)`:
//! the same input always produces byte-identical output. Topic labels come
//! from an injected [`TopicLabeler`], which may be model-backed and therefore
//! non-deterministic; it reports that through [`TopicLabeler::is_deterministic`].

use crate::config::SummarizerConfig;
use crate::text::{self, tagger};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Returned as the summary when the input has no usable sentences.
pub const EMPTY_SUMMARY: &str = "No content available for summarization.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Summary {
    pub text: String,
    pub talking_points: Vec<String>,
    pub keywords: Vec<String>,
    pub sentence_count: usize,
    pub word_count: usize,
}

pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str) -> Summary;
}

/// Contract for the topic labeling capability.
///
/// Input is the sentence sequence of one document, output is a ranked list of
/// at most `max_labels` labels. Implementations backed by a statistical model
/// must return `false` from [`is_deterministic`](Self::is_deterministic).
pub trait TopicLabeler: Send + Sync {
    fn name(&self) -> &'static str;

    fn label(&self, sentences: &[String], max_labels: usize) -> Vec<String>;

    fn is_deterministic(&self) -> bool {
        true
    }
}

/// Labels a document with its most frequent content words.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordTopicLabeler;

impl TopicLabeler for KeywordTopicLabeler {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn label(&self, sentences: &[String], max_labels: usize) -> Vec<String> {
        text::rank_by_frequency(sentences.iter().flat_map(|s| text::content_words(s)))
            .into_iter()
            .take(max_labels)
            .map(|(word, _)| word)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ExtractiveSummarizer {
    config: SummarizerConfig,
}

struct ScoredSentence {
    index: usize,
    score: f64,
}

impl ExtractiveSummarizer {
    #[must_use]
    pub const fn new(config: SummarizerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    fn score_sentences(
        &self,
        sentences: &[String],
        frequencies: &HashMap<String, usize>,
    ) -> Vec<ScoredSentence> {
        let max_frequency = frequencies.values().copied().max().unwrap_or(1).max(1) as f64;

        sentences
            .iter()
            .enumerate()
            .filter_map(|(index, sentence)| {
                let words = text::content_words(sentence);
                if words.is_empty() {
                    return None;
                }

                let total: usize = words
                    .iter()
                    .map(|w| frequencies.get(w).copied().unwrap_or(0))
                    .sum();
                let term_frequency = total as f64 / words.len() as f64 / max_frequency;

                let position = 1.0 / (index as f64 + 1.0);

                let in_band = (self.config.min_sentence_words..=self.config.max_sentence_words)
                    .contains(&words.len());
                let length = if in_band { 1.0 } else { 0.5 };

                let score = self.config.frequency_weight * term_frequency
                    + self.config.position_weight * position
                    + self.config.length_weight * length;

                Some(ScoredSentence { index, score })
            })
            .collect()
    }

    fn talking_points(&self, sentences: &[String], keywords: &[String]) -> Vec<String> {
        let limit = self.config.max_talking_points;
        let mut points: Vec<String> =
            text::rank_by_frequency(sentences.iter().flat_map(|s| tagger::noun_phrases(s)))
                .into_iter()
                .take(limit)
                .map(|(phrase, _)| phrase)
                .collect();

        for keyword in keywords {
            if points.len() >= limit {
                break;
            }
            if !points.iter().any(|p| p == keyword) {
                points.push(keyword.clone());
            }
        }

        points
    }
}

impl Summarizer for ExtractiveSummarizer {
    fn summarize(&self, input: &str) -> Summary {
        let cleaned = text::clean_text(input);
        let sentences = text::split_sentences(&cleaned);

        let all_words: Vec<String> = sentences
            .iter()
            .flat_map(|s| text::content_words(s))
            .collect();

        if all_words.is_empty() {
            return Summary {
                text: EMPTY_SUMMARY.to_string(),
                sentence_count: sentences.len(),
                ..Summary::default()
            };
        }

        let mut frequencies: HashMap<String, usize> = HashMap::new();
        for word in &all_words {
            *frequencies.entry(word.clone()).or_insert(0) += 1;
        }

        let mut scored = self.score_sentences(&sentences, &frequencies);
        scored.sort_by(|a, b| match b.score.total_cmp(&a.score) {
            Ordering::Equal => a.index.cmp(&b.index),
            other => other,
        });
        scored.truncate(self.config.max_sentences);
        // Selected sentences are emitted in document order.
        scored.sort_by_key(|s| s.index);

        let summary = scored
            .iter()
            .map(|s| sentences[s.index].as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let keywords: Vec<String> = text::rank_by_frequency(all_words.iter().cloned())
            .into_iter()
            .take(self.config.max_talking_points)
            .map(|(word, _)| word)
            .collect();

        let talking_points = self.talking_points(&sentences, &keywords);

        Summary {
            text: summary,
            talking_points,
            keywords,
            sentence_count: sentences.len(),
            word_count: text::words(&cleaned).len(),
        }
    }
}

/// Summarizes a document and labels its topics in one pass.
pub fn summarize_document(
    summarizer: &dyn Summarizer,
    labeler: &dyn TopicLabeler,
    document: &str,
    max_topics: usize,
) -> (Summary, Vec<String>) {
    let summary = summarizer.summarize(document);
    let sentences = text::split_sentences(&text::clean_text(document));
    let topics = labeler.label(&sentences, max_topics);
    (summary, topics)
}

/// Topics shared across several transcripts, most frequent first.
pub fn extract_topics(
    labeler: &dyn TopicLabeler,
    transcripts: &[String],
    max_topics: usize,
) -> Vec<String> {
    let sentences: Vec<String> = transcripts
        .iter()
        .flat_map(|t| text::split_sentences(&text::clean_text(t)))
        .collect();
    labeler.label(&sentences, max_topics)
}
