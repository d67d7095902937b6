use serde::{Deserialize, Serialize};

use super::Language;

/// A contiguous span of a source file, suitable for embedding and
/// lexical/dense retrieval (§3 "Chunk").
///
/// `id` is derived from `file` + `primary_symbol` + line span so it stays
/// stable across reparses of unchanged content (§3 invariant on chunk ids).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    id: String,
    file: String,
    start_line: u32,
    end_line: u32,
    content: String,
    primary_symbol: Option<String>,
    symbols: Vec<String>,
    language_tag: Language,
    token_count: u32,
    created_at: i64,
}

impl Chunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file: impl Into<String>,
        start_line: u32,
        end_line: u32,
        content: String,
        language_tag: Language,
        primary_symbol: Option<String>,
        created_at: i64,
    ) -> Self {
        let file = file.into();
        let id = Self::derive_id(&file, primary_symbol.as_deref(), start_line, end_line);
        let token_count = estimate_token_count(&content);
        Self {
            id,
            file,
            start_line,
            end_line,
            content,
            primary_symbol,
            symbols: Vec::new(),
            language_tag,
            token_count,
            created_at,
        }
    }

    /// Derives a chunk id stable across reparses of the same symbol/span
    /// (§3: "`id` is stable across reparses of the same symbol/lines").
    pub fn derive_id(file: &str, primary_symbol: Option<&str>, start: u32, end: u32) -> String {
        format!("{}::{}::{}-{}", file, primary_symbol.unwrap_or(""), start, end)
    }

    pub fn with_symbols(mut self, symbols: Vec<String>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn primary_symbol(&self) -> Option<&str> {
        self.primary_symbol.as_deref()
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn language_tag(&self) -> Language {
        self.language_tag
    }

    pub fn token_count(&self) -> u32 {
        self.token_count
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file, self.start_line, self.end_line)
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn preview(&self, max_lines: usize) -> String {
        self.content
            .lines()
            .take(max_lines)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Approximates tokens as 1 per 4 bytes of code (§3: "a real tokenizer if
/// supplied" is the pluggable alternative; consumers must not depend on
/// the exact count, §9 open question).
pub fn estimate_token_count(content: &str) -> u32 {
    ((content.len() as f64) / 4.0).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_stable_across_reparse() {
        let a = Chunk::new(
            "src/lib.rs",
            10,
            12,
            "fn add() {}".to_string(),
            Language::Rust,
            Some("add".to_string()),
            0,
        );
        let b = Chunk::new(
            "src/lib.rs",
            10,
            12,
            "fn add() { /* reformatted */ }".to_string(),
            Language::Rust,
            Some("add".to_string()),
            1,
        );
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_location_format() {
        let chunk = Chunk::new(
            "test.rs",
            5,
            10,
            "code".to_string(),
            Language::Rust,
            None,
            0,
        );
        assert_eq!(chunk.location(), "test.rs:5-10");
    }

    #[test]
    fn test_token_estimate() {
        assert_eq!(estimate_token_count("abcd"), 1);
        assert_eq!(estimate_token_count("abcdefgh"), 2);
        assert_eq!(estimate_token_count(""), 0);
    }
}
