use std::collections::HashSet;

pub const MAX_WORD_CHARS: usize = 64;

/// Cleans a word list read from an image: trims whitespace and surrounding
/// punctuation, drops empty or overlong entries, removes case-insensitive
/// duplicates (first one wins) and keeps at most `limit` words.
pub fn normalize_words<I, S>(raw: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut words = collect_words(raw, clean_word);
    words.truncate(limit);
    words
}

/// Like [`normalize_words`] for words a user typed: only whitespace is
/// trimmed, so "C++" stays "C++". No cap is applied.
pub fn dedupe_words<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    collect_words(raw, str::trim)
}

fn collect_words<I, S>(raw: I, clean: fn(&str) -> &str) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut words = Vec::new();

    for item in raw {
        let word = clean(item.as_ref());
        if word.is_empty() || word.chars().count() > MAX_WORD_CHARS {
            continue;
        }
        if seen.insert(fold(word)) {
            words.push(word.to_string());
        }
    }

    words
}

fn clean_word(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .trim()
}

/// Comparison key for answers and words.
pub fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}
