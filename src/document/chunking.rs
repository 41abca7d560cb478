//! Document chunking strategies (spec §4.6). No direct teacher analogue
//! exists (the teacher indexes whole documents); grounded on the
//! teacher's `analysis::tokenizer` word-boundary handling, generalized
//! from token counting to byte-range splitting.

use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone)]
pub enum ChunkStrategy {
    Headers,
    Size { max_tokens: usize, overlap: usize },
    Hybrid { max_tokens: usize, overlap: usize },
}

impl ChunkStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ChunkStrategy::Headers => "headers",
            ChunkStrategy::Size { .. } => "size",
            ChunkStrategy::Hybrid { .. } => "hybrid",
        }
    }

    pub fn max_tokens(&self) -> Option<u32> {
        match self {
            ChunkStrategy::Headers => None,
            ChunkStrategy::Size { max_tokens, .. } | ChunkStrategy::Hybrid { max_tokens, .. } => {
                Some(*max_tokens as u32)
            }
        }
    }

    pub fn overlap(&self) -> Option<u32> {
        match self {
            ChunkStrategy::Headers => None,
            ChunkStrategy::Size { overlap, .. } | ChunkStrategy::Hybrid { overlap, .. } => Some(*overlap as u32),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkSpec {
    pub title: Option<String>,
    pub body: String,
}

pub fn chunk_body(body: &str, strategy: &ChunkStrategy) -> Vec<ChunkSpec> {
    match strategy {
        ChunkStrategy::Headers => split_by_headers(body)
            .into_iter()
            .map(|(title, text)| ChunkSpec { title, body: text })
            .collect(),
        ChunkStrategy::Size { max_tokens, overlap } => split_by_size(body, *max_tokens, *overlap)
            .into_iter()
            .map(|(start, end)| ChunkSpec { title: None, body: body[start..end].to_string() })
            .collect(),
        ChunkStrategy::Hybrid { max_tokens, overlap } => split_by_headers(body)
            .into_iter()
            .flat_map(|(title, section)| {
                if unicode_word_count(&section) > *max_tokens {
                    split_by_size(&section, *max_tokens, *overlap)
                        .into_iter()
                        .map(|(start, end)| ChunkSpec { title: title.clone(), body: section[start..end].to_string() })
                        .collect::<Vec<_>>()
                } else {
                    vec![ChunkSpec { title, body: section }]
                }
            })
            .collect(),
    }
}

fn unicode_word_count(text: &str) -> usize {
    text.unicode_words().count()
}

fn is_header_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#') && trimmed.trim_start_matches('#').starts_with(' ')
}

fn split_by_headers(body: &str) -> Vec<(Option<String>, String)> {
    let mut sections: Vec<(Option<String>, Vec<&str>)> = Vec::new();
    let mut current_title: Option<String> = None;
    let mut current_lines: Vec<&str> = Vec::new();
    let mut started = false;

    for line in body.lines() {
        if is_header_line(line) {
            if started {
                sections.push((current_title.take(), std::mem::take(&mut current_lines)));
            }
            current_title = Some(line.trim_start_matches('#').trim().to_string());
            started = true;
        }
        current_lines.push(line);
    }
    sections.push((current_title, current_lines));

    let rendered: Vec<(Option<String>, String)> = sections
        .into_iter()
        .map(|(title, lines)| (title, lines.join("\n")))
        .filter(|(_, text)| !text.trim().is_empty())
        .collect();

    if rendered.is_empty() {
        vec![(None, body.to_string())]
    } else {
        rendered
    }
}

/// Splits `body` into byte ranges of roughly `max_tokens` words each,
/// backing up `overlap` words at the start of every range after the
/// first.
fn split_by_size(body: &str, max_tokens: usize, overlap: usize) -> Vec<(usize, usize)> {
    let bounds: Vec<(usize, &str)> = body.split_word_bound_indices().collect();
    let word_indices: Vec<usize> = bounds
        .iter()
        .enumerate()
        .filter(|(_, (_, w))| w.chars().next().is_some_and(|c| c.is_alphanumeric()))
        .map(|(i, _)| i)
        .collect();

    if word_indices.is_empty() || max_tokens == 0 {
        return vec![(0, body.len())];
    }

    let mut ranges = Vec::new();
    let mut start_word = 0;
    while start_word < word_indices.len() {
        let end_word = (start_word + max_tokens).min(word_indices.len());
        let start_byte = bounds[word_indices[start_word]].0;
        let end_byte =
            if end_word < word_indices.len() { bounds[word_indices[end_word]].0 } else { body.len() };
        ranges.push((start_byte, end_byte));

        if end_word >= word_indices.len() {
            break;
        }
        let next_start = end_word.saturating_sub(overlap);
        start_word = next_start.max(start_word + 1);
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_strategy_splits_on_markdown_headers() {
        let body = "# First\nintro text\n## Second\nmore text\n";
        let chunks = chunk_body(body, &ChunkStrategy::Headers);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].title.as_deref(), Some("First"));
        assert_eq!(chunks[1].title.as_deref(), Some("Second"));
    }

    #[test]
    fn headers_strategy_falls_back_to_single_chunk_without_headers() {
        let body = "just plain text with no headers at all";
        let chunks = chunk_body(body, &ChunkStrategy::Headers);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].title.is_none());
    }

    #[test]
    fn size_strategy_respects_token_budget_and_overlap() {
        let body = "one two three four five six seven eight nine ten";
        let chunks = chunk_body(body, &ChunkStrategy::Size { max_tokens: 4, overlap: 1 });
        assert!(chunks.len() >= 3);
        assert!(chunks[0].body.contains("one"));
    }

    #[test]
    fn hybrid_strategy_splits_oversized_sections_further() {
        let mut body = String::from("# Section\n");
        for i in 0..50 {
            body.push_str(&format!("word{} ", i));
        }
        let chunks = chunk_body(&body, &ChunkStrategy::Hybrid { max_tokens: 10, overlap: 0 });
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.title.as_deref() == Some("Section")));
    }
}
