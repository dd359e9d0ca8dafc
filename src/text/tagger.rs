//! Lexicon and suffix based part-of-speech tagger.
//!
//! Closed word classes come from fixed tables; open classes are guessed from
//! suffixes and the previous tag. Anything unrecognised is a noun, which suits
//! the noun-phrase chunker that consumes these tags.

use super::words;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Noun,
    Adjective,
    Verb,
    Adverb,
    Determiner,
    Pronoun,
    Preposition,
    Conjunction,
    Number,
}

const DETERMINERS: &[&str] = &[
    "a", "all", "an", "another", "any", "each", "every", "many", "much", "no", "several", "some",
    "that", "the", "these", "this", "those",
];

const PRONOUNS: &[&str] = &[
    "he", "her", "hers", "him", "his", "i", "it", "its", "me", "mine", "my", "our", "ours", "she",
    "their", "them", "they", "us", "we", "what", "which", "who", "whom", "you", "your",
];

const PREPOSITIONS: &[&str] = &[
    "about", "above", "across", "after", "against", "along", "among", "around", "as", "at",
    "before", "behind", "below", "beneath", "beside", "between", "beyond", "by", "despite",
    "down", "during", "except", "for", "from", "in", "inside", "into", "like", "near", "of",
    "off", "on", "onto", "out", "over", "past", "since", "through", "to", "toward", "towards",
    "under", "until", "up", "upon", "via", "with", "within", "without",
];

const CONJUNCTIONS: &[&str] = &[
    "although", "and", "because", "but", "if", "nor", "or", "so", "than", "though", "unless",
    "when", "whereas", "whether", "while", "yet",
];

const VERBS: &[&str] = &[
    "am", "are", "be", "been", "being", "can", "could", "did", "do", "does", "get", "gets", "go",
    "goes", "got", "had", "has", "have", "is", "know", "let", "make", "makes", "may", "might",
    "must", "need", "say", "says", "see", "shall", "should", "show", "shows", "take", "takes",
    "think", "use", "uses", "want", "was", "were", "will", "would",
];

const ADVERBS: &[&str] = &[
    "again", "almost", "already", "also", "always", "even", "here", "how", "just", "never",
    "not", "now", "often", "only", "quite", "really", "still", "then", "there", "too", "very",
    "well", "why",
];

const ADJECTIVE_SUFFIXES: &[&str] = &[
    "able", "ible", "ical", "ful", "ive", "less", "ous", "ish", "ic", "al", "ary",
];

const NOUN_SUFFIXES: &[&str] = &[
    "tion", "sion", "ment", "ness", "ity", "ism", "ist", "ance", "ence", "ship", "hood", "er",
    "or", "ics",
];

fn contains(table: &[&str], word: &str) -> bool {
    table.binary_search(&word).is_ok()
}

fn tag_word(word: &str, previous: Option<Tag>) -> Tag {
    if word.chars().all(|c| c.is_ascii_digit()) {
        return Tag::Number;
    }
    if contains(DETERMINERS, word) {
        return Tag::Determiner;
    }
    if contains(PRONOUNS, word) {
        return Tag::Pronoun;
    }
    if contains(PREPOSITIONS, word) {
        return Tag::Preposition;
    }
    if contains(CONJUNCTIONS, word) {
        return Tag::Conjunction;
    }
    if contains(VERBS, word) {
        return Tag::Verb;
    }
    if contains(ADVERBS, word) || (word.len() > 4 && word.ends_with("ly")) {
        return Tag::Adverb;
    }

    let after_determiner = matches!(previous, Some(Tag::Determiner | Tag::Adjective));

    if word.len() > 4 && (word.ends_with("ing") || word.ends_with("ed")) {
        // "the trending topic", "a supervised model", "machine learning"
        return if after_determiner {
            Tag::Adjective
        } else if previous == Some(Tag::Noun) && word.ends_with("ing") {
            Tag::Noun
        } else {
            Tag::Verb
        };
    }

    if NOUN_SUFFIXES
        .iter()
        .any(|s| word.len() > s.len() + 2 && word.ends_with(s))
    {
        return Tag::Noun;
    }

    if ADJECTIVE_SUFFIXES
        .iter()
        .any(|s| word.len() > s.len() + 2 && word.ends_with(s))
    {
        return Tag::Adjective;
    }

    if matches!(previous, Some(Tag::Pronoun | Tag::Noun)) && word.len() > 3 && word.ends_with('s')
    {
        // "it explains", "the model predicts"
        return Tag::Verb;
    }

    Tag::Noun
}

/// Tags every word of one sentence.
#[must_use]
pub fn tag_sentence(sentence: &str) -> Vec<(String, Tag)> {
    let mut previous = None;
    words(sentence)
        .into_iter()
        .map(|word| {
            let tag = tag_word(&word, previous);
            previous = Some(tag);
            (word, tag)
        })
        .collect()
}

/// Extracts noun-phrase candidates: an optional adjective run followed by a
/// noun run, at least two content words long.
#[must_use]
pub fn noun_phrases(sentence: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut adjectives: Vec<String> = Vec::new();
    let mut nouns: Vec<String> = Vec::new();

    let mut flush = |adjectives: &mut Vec<String>, nouns: &mut Vec<String>| {
        if !nouns.is_empty() && adjectives.len() + nouns.len() > 1 {
            let mut parts = std::mem::take(adjectives);
            parts.append(nouns);
            phrases.push(parts.join(" "));
        }
        adjectives.clear();
        nouns.clear();
    };

    for (word, tag) in tag_sentence(sentence) {
        let content = word.len() > 2 && !super::is_stopword(&word);
        match tag {
            Tag::Noun if content => nouns.push(word),
            Tag::Adjective if content && nouns.is_empty() => adjectives.push(word),
            Tag::Adjective if content => {
                flush(&mut adjectives, &mut nouns);
                adjectives.push(word);
            }
            _ => flush(&mut adjectives, &mut nouns),
        }
    }
    flush(&mut adjectives, &mut nouns);

    phrases
}
