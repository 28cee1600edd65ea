//! Output chunks and the two chunking policies.

use serde::Serialize;

use crate::config::ChunkPolicy;

/// One unit of an incrementally delivered reply.
///
/// Serializes to the wire shape of one streamed line: `{"response": …}`
/// or, for the final error marker, `{"error": …}`. The end of a
/// successful stream is signalled by the stream ending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OutputChunk {
    #[serde(rename = "response")]
    Text(String),
    #[serde(rename = "error")]
    Error(String),
}

impl OutputChunk {
    pub fn is_error(&self) -> bool {
        matches!(self, OutputChunk::Error(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            OutputChunk::Text(t) => Some(t),
            OutputChunk::Error(_) => None,
        }
    }
}

/// Split `text` on whitespace boundaries without losing a byte.
///
/// Every chunk is one token followed by the whitespace after it; leading
/// whitespace stays with the first token. Concatenating the result gives
/// back `text`.
pub fn split_words(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut seen_token = false;
    let mut prev_ws = false;

    for (i, c) in text.char_indices() {
        let ws = c.is_whitespace();
        if !ws && prev_ws && seen_token {
            chunks.push(text[start..i].to_owned());
            start = i;
        }
        seen_token |= !ws;
        prev_ws = ws;
    }
    if start < text.len() {
        chunks.push(text[start..].to_owned());
    }
    chunks
}

/// Apply `policy` to the text parts of a reply. Empty parts are dropped.
pub fn rechunk(parts: Vec<String>, policy: ChunkPolicy) -> Vec<String> {
    match policy {
        ChunkPolicy::Parts => parts.into_iter().filter(|p| !p.is_empty()).collect(),
        ChunkPolicy::Words => split_words(&parts.concat()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn words_keep_trailing_whitespace() {
        assert_eq!(split_words("hi there"), vec!["hi ", "there"]);
        assert_eq!(split_words("a  b\n"), vec!["a  ", "b\n"]);
    }

    #[test]
    fn leading_whitespace_joins_first_token() {
        assert_eq!(split_words("  hello world "), vec!["  hello ", "world "]);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(split_words("").is_empty());
        assert_eq!(split_words("   "), vec!["   "]);
        assert_eq!(split_words("single"), vec!["single"]);
    }

    #[test]
    fn reassembly_is_lossless() {
        let samples = [
            "The quick brown fox",
            "\tTabs\tand\r\nCRLF lines\n\n",
            "ünïcödé   wörds ✓ done",
            "trailing   ",
            "line one\nline two\n\nparagraph",
        ];
        for text in samples {
            assert_eq!(split_words(text).concat(), text, "lossless for {text:?}");
        }
    }

    #[test]
    fn parts_policy_forwards_parts_unchanged() {
        let parts = vec!["Hello, ".to_owned(), String::new(), "world.".to_owned()];
        assert_eq!(rechunk(parts, ChunkPolicy::Parts), vec!["Hello, ", "world."]);
    }

    #[test]
    fn words_policy_spans_part_boundaries() {
        let parts = vec!["Hel".to_owned(), "lo wor".to_owned(), "ld".to_owned()];
        assert_eq!(rechunk(parts, ChunkPolicy::Words), vec!["Hello ", "world"]);
    }

    #[test]
    fn chunks_serialize_to_wire_lines() {
        let text = serde_json::to_string(&OutputChunk::Text("hi ".into())).unwrap();
        assert_eq!(text, r#"{"response":"hi "}"#);
        let err = serde_json::to_string(&OutputChunk::Error("boom".into())).unwrap();
        assert_eq!(err, r#"{"error":"boom"}"#);
    }
}
