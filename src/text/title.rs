//! Title selection and chunk-title composition: pure functions with no
//! teacher analog, following the spec's `pickTitle`/`composeChunkTitle`.

const MAX_TITLE_LEN: usize = 120;
const UNTITLED: &str = "Untitled Idea";

/// If `explicit_title` is given (non-empty after trim), use it; else take
/// the first non-empty line of `body`, trimmed and truncated.
pub fn pick_title(body: &str, explicit_title: Option<&str>) -> String {
    if let Some(title) = explicit_title {
        let trimmed = title.trim();
        if !trimmed.is_empty() {
            return truncate(trimmed);
        }
    }

    for line in body.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return truncate(trimmed);
        }
    }

    UNTITLED.to_string()
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_TITLE_LEN {
        text.to_string()
    } else {
        text.chars().take(MAX_TITLE_LEN).collect()
    }
}

pub fn compose_chunk_title(doc_title: &str, chunk_order: u32, total_chunks: u32, section_title: &str) -> String {
    format!("{} [{}/{}] {}", doc_title, chunk_order + 1, total_chunks, section_title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_title_wins() {
        assert_eq!(pick_title("body text", Some("My Title")), "My Title");
    }

    #[test]
    fn falls_back_to_first_nonempty_line() {
        assert_eq!(pick_title("\n\n  First real line  \nsecond", None), "First real line");
    }

    #[test]
    fn empty_input_falls_back_to_untitled() {
        assert_eq!(pick_title("", None), "Untitled Idea");
    }

    #[test]
    fn composes_chunk_title_with_one_based_order() {
        let title = compose_chunk_title("My Doc", 1, 4, "Installation");
        assert_eq!(title, "My Doc [2/4] Installation");
    }
}
