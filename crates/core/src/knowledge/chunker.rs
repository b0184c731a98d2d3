//! Paragraph-aware chunking with a contextual header (spec §4.6).

/// Target chunk size in whitespace-tokenized words. Greedy packing stops
/// adding paragraphs once a chunk reaches this size.
pub const TARGET_WORDS: usize = 500;

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Split markdown into paragraphs on blank-line boundaries.
fn split_paragraphs(markdown: &str) -> Vec<&str> {
    markdown
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Greedily pack paragraphs into chunks targeting [`TARGET_WORDS`] words,
/// never splitting a paragraph across chunks. A single paragraph longer
/// than the target still becomes its own (oversized) chunk.
fn pack_paragraphs(paragraphs: &[&str]) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_words = 0;

    for paragraph in paragraphs {
        let words = word_count(paragraph);
        if !current.is_empty() && current_words + words > TARGET_WORDS {
            chunks.push(current.join("\n\n"));
            current = Vec::new();
            current_words = 0;
        }
        current.push(paragraph);
        current_words += words;
    }
    if !current.is_empty() {
        chunks.push(current.join("\n\n"));
    }
    chunks
}

/// The contextual header prepended to every stored chunk, so embeddings and
/// FTS capture source context (spec §3, §4.6).
pub fn header(title: &str, hostname: &str) -> String {
    format!("# {title}\nSource: {hostname}\n\n")
}

/// Chunk `markdown` into contextually-headered pieces.
pub fn chunk_markdown(markdown: &str, title: &str, hostname: &str) -> Vec<String> {
    let header = header(title, hostname);
    pack_paragraphs(&split_paragraphs(markdown))
        .into_iter()
        .map(|body| format!("{header}{body}"))
        .collect()
}

/// Strip the exact contextual header from a previously stored chunk, for
/// re-chunking during `reindexSource`. Returns `None` if the content does
/// not start with the expected header.
pub fn strip_header<'a>(content: &'a str, title: &str, hostname: &str) -> Option<&'a str> {
    content.strip_prefix(&header(title, hostname))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_paragraphs_under_target() {
        let markdown = "Para one.\n\nPara two.\n\nPara three.";
        let chunks = chunk_markdown(markdown, "Title", "example.com");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("# Title\nSource: example.com\n\n"));
        assert!(chunks[0].contains("Para one."));
        assert!(chunks[0].contains("Para three."));
    }

    #[test]
    fn never_splits_a_paragraph_across_chunks() {
        let long_paragraph = "word ".repeat(600);
        let markdown = format!("{long_paragraph}\n\nshort paragraph");
        let chunks = chunk_markdown(&markdown, "T", "h");
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].contains(long_paragraph.trim()));
        assert!(chunks[1].contains("short paragraph"));
    }

    #[test]
    fn strip_header_round_trips() {
        let chunk = header("T", "h") + "body text";
        assert_eq!(strip_header(&chunk, "T", "h"), Some("body text"));
        assert_eq!(strip_header("no header here", "T", "h"), None);
    }
}
