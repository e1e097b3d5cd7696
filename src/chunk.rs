//! Heading-scoped structural chunker.
//!
//! Splits a markdown (or plain text) document into [`ChunkDraft`]s, one per
//! heading section. A heading line starts a new chunk and belongs to it; the
//! chunk's heading path is the stack of enclosing H1..H6 titles joined with
//! `" > "`. Fenced code blocks (```` ``` ```` or `~~~`) are opaque: nothing
//! inside them is treated as a heading.
//!
//! Line numbers are 1-indexed and inclusive. Text before the first heading
//! gets an empty heading path, and a document without headings yields exactly
//! one chunk (or none, if it is blank).

use sha2::{Digest, Sha256};

use crate::models::ChunkDraft;

const MAX_HEADING_LEVEL: usize = 6;

/// Split `text` into heading-scoped chunks in document order.
pub fn chunk_text(text: &str) -> Vec<ChunkDraft> {
    let mut chunker = Chunker::default();
    let mut line_count = 0;
    for (i, line) in text.lines().enumerate() {
        line_count = i + 1;
        chunker.push_line(line_count as i64, line);
    }
    chunker.flush(line_count as i64);
    chunker.chunks
}

/// SHA-256 of a chunk's text, hex encoded.
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Default)]
struct Chunker {
    headings: [Option<String>; MAX_HEADING_LEVEL],
    buf: Vec<String>,
    buf_start: i64,
    fence: Option<String>,
    chunks: Vec<ChunkDraft>,
}

impl Chunker {
    fn push_line(&mut self, line_no: i64, line: &str) {
        if self.buf.is_empty() {
            self.buf_start = line_no;
        }

        if let Some(marker) = fence_marker(line) {
            match &self.fence {
                None => self.fence = Some(marker),
                Some(open) if *open == marker => self.fence = None,
                Some(_) => {}
            }
            self.buf.push(line.to_string());
            return;
        }

        if self.fence.is_none() {
            if let Some((level, title)) = parse_heading(line) {
                self.flush(line_no - 1);
                self.buf_start = line_no;
                self.headings[level - 1] = (!title.is_empty()).then(|| title.to_string());
                for slot in self.headings.iter_mut().skip(level) {
                    *slot = None;
                }
            }
        }

        self.buf.push(line.to_string());
    }

    fn heading_path(&self) -> String {
        self.headings
            .iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" > ")
    }

    fn flush(&mut self, end_line: i64) {
        if self.buf.is_empty() {
            return;
        }
        let content = self.buf.join("\n");
        let content = content.trim();
        if !content.is_empty() {
            self.chunks.push(ChunkDraft {
                heading_path: self.heading_path(),
                start_line: self.buf_start,
                end_line,
                text: content.to_string(),
            });
        }
        self.buf.clear();
    }
}

/// The three-character fence marker if `line` opens or closes a code block.
fn fence_marker(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
        Some(trimmed[..3].to_string())
    } else {
        None
    }
}

/// Parse an ATX heading (`#` to `######`, whitespace, title).
///
/// The title may be blank (`"#  "`); such a heading still splits and clears
/// its level but contributes nothing to the heading path.
fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > MAX_HEADING_LEVEL {
        return None;
    }
    let rest = &line[level..];
    // Whitespace, then at least one more character of any kind.
    if !rest.starts_with(char::is_whitespace) || rest.chars().count() < 2 {
        return None;
    }
    Some((level, rest.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headingless_document_single_chunk() {
        let chunks = chunk_text("just some notes\nand another line\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading_path, "");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
        assert_eq!(chunks[0].text, "just some notes\nand another line");
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(chunk_text("").is_empty());
        assert!(chunk_text("\n   \n\t\n").is_empty());
    }

    #[test]
    fn test_splits_on_headings() {
        let text = "intro\n# One\nalpha\n## Two\nbeta\n# Three\ngamma";
        let chunks = chunk_text(text);
        let got: Vec<(&str, i64, i64)> = chunks
            .iter()
            .map(|c| (c.heading_path.as_str(), c.start_line, c.end_line))
            .collect();
        assert_eq!(
            got,
            vec![
                ("", 1, 1),
                ("One", 2, 3),
                ("One > Two", 4, 5),
                ("Three", 6, 7),
            ]
        );
        assert_eq!(chunks[1].text, "# One\nalpha");
    }

    #[test]
    fn test_fenced_hash_is_not_a_heading() {
        let chunks = chunk_text("# Title\n```\n# not a heading\n```\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading_path, "Title");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 4);
        assert!(chunks[0].text.contains("# not a heading"));
    }

    #[test]
    fn test_tilde_fence_not_closed_by_backticks() {
        let text = "# A\n~~~\n```\n# inside\n~~~\n# B\nbody";
        let chunks = chunk_text(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].heading_path, "A");
        assert_eq!(chunks[0].end_line, 5);
        assert_eq!(chunks[1].heading_path, "B");
    }

    #[test]
    fn test_unterminated_fence_still_flushed() {
        let chunks = chunk_text("# A\ntext\n```rust\n# x\nfn main() {}");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading_path, "A");
        assert_eq!(chunks[0].end_line, 5);
        assert!(chunks[0].text.ends_with("fn main() {}"));
    }

    #[test]
    fn test_heading_level_skip() {
        let chunks = chunk_text("# A\n### B\ntext");
        let last = chunks.last().unwrap();
        assert_eq!(last.heading_path, "A > B");
        assert_eq!(last.start_line, 2);
        assert_eq!(last.end_line, 3);
    }

    #[test]
    fn test_shallower_heading_clears_deeper() {
        let chunks = chunk_text("# A\n## B\n### C\nx\n## D\ny");
        let last = chunks.last().unwrap();
        assert_eq!(last.heading_path, "A > D");
    }

    #[test]
    fn test_not_headings() {
        assert_eq!(parse_heading("#hashtag"), None);
        assert_eq!(parse_heading("####### seven"), None);
        assert_eq!(parse_heading("  # indented"), None);
        assert_eq!(parse_heading("# "), None);
        assert_eq!(parse_heading("#"), None);
        assert_eq!(parse_heading("### Deep  "), Some((3, "Deep")));
    }

    #[test]
    fn test_blank_title_heading_splits_and_clears() {
        assert_eq!(parse_heading("#   "), Some((1, "")));

        let chunks = chunk_text("# A
## B
x
##  
y");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].heading_path, "A > B");
        assert_eq!(chunks[2].heading_path, "A");
        assert_eq!(chunks[2].start_line, 4);
        assert_eq!(chunks[2].text, "##  \ny");
    }

    #[test]
    fn test_deterministic() {
        let text = "# A\none\n\n## B\ntwo\n```\n# c\n```\n### D\nthree";
        assert_eq!(chunk_text(text), chunk_text(text));
    }

    #[test]
    fn test_text_hash_stable() {
        assert_eq!(text_hash("abc"), text_hash("abc"));
        assert_ne!(text_hash("abc"), text_hash("abd"));
        assert_eq!(text_hash("").len(), 64);
    }
}
