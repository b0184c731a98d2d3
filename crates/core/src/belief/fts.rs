//! FTS5 query sanitization, shared by belief and knowledge search.
//!
//! Grounded on the corpus' widespread pattern of sanitizing free text before
//! handing it to FTS5 (the query syntax treats `AND`/`OR`/`NOT`/`NEAR` and
//! punctuation specially, so raw user text must be escaped or it either
//! errors or silently changes meaning).

const FTS_OPERATORS: &[&str] = &["and", "or", "not", "near"];

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "to", "of", "in", "on",
    "for", "with", "at", "by", "from", "about", "as", "into", "like", "through", "after",
    "over", "between", "out", "against", "during", "without", "before", "under", "around",
    "among", "this", "that", "these", "those", "it", "its", "i", "you", "he", "she", "we",
    "they", "do", "does", "did", "has", "have", "had", "can", "will", "would", "should",
    "could", "and", "but", "or", "if", "so", "what", "which", "who", "whom",
];

/// Sanitize free text into a query FTS5's `MATCH` operator accepts: strip
/// special characters, drop operator words and stop words, quote each
/// surviving term, and OR them together. An empty or all-stopword input
/// yields an empty string, which callers must treat as "no results" rather
/// than passing to `MATCH` (an empty `MATCH` string is a syntax error).
pub fn sanitize_fts5_query(input: &str) -> String {
    input
        .split_whitespace()
        .map(|token| {
            token
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
        .filter(|token| !FTS_OPERATORS.contains(&token.as_str()))
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .map(|token| format!("\"{token}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_yields_empty_string() {
        assert_eq!(sanitize_fts5_query(""), "");
        assert_eq!(sanitize_fts5_query("   "), "");
    }

    #[test]
    fn all_stopword_query_yields_empty_string() {
        assert_eq!(sanitize_fts5_query("the AND of"), "");
    }

    #[test]
    fn strips_special_characters_and_quotes_terms() {
        let sanitized = sanitize_fts5_query("TypeScript! user's-prefs?");
        assert_eq!(sanitized, "\"typescript\" OR \"users\" OR \"prefs\"");
    }
}
