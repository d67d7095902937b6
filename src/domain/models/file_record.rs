use serde::{Deserialize, Serialize};

use super::{Chunk, ImportRef, Language, Symbol};

/// A parse error captured rather than propagated (§4.3, §7 `ParseFailure`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// Output of the external parser adapter (§4.3 contract). The core treats
/// this as authoritative and never inspects the parser's internals.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub symbols: Vec<Symbol>,
    pub imports: Vec<ImportRef>,
    pub exports: Vec<String>,
    pub calls: Vec<String>,
    pub chunks: Vec<Chunk>,
    pub doc: Option<String>,
    pub errors: Vec<ParseError>,
}

/// Per-file parsed record, keyed by project-relative, forward-slash
/// normalized path (§3 "File record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    path: String,
    hash: String,
    mtime: i64,
    size: u64,
    language_tag: Language,
    symbols: Vec<Symbol>,
    imports: Vec<ImportRef>,
    exports: Vec<String>,
    calls: Vec<String>,
    chunks: Vec<Chunk>,
    doc: Option<String>,
    errors: Vec<ParseError>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, hash: impl Into<String>, mtime: i64, size: u64, language_tag: Language) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
            mtime,
            size,
            language_tag,
            symbols: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            calls: Vec::new(),
            chunks: Vec::new(),
            doc: None,
            errors: Vec::new(),
        }
    }

    /// Builds a record from a parsed result, per I5 (a changed file's old
    /// chunks are fully replaced, never merged).
    pub fn from_parse(
        path: impl Into<String>,
        hash: impl Into<String>,
        mtime: i64,
        size: u64,
        language_tag: Language,
        parsed: ParseResult,
    ) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
            mtime,
            size,
            language_tag,
            symbols: parsed.symbols,
            imports: parsed.imports,
            exports: parsed.exports,
            calls: parsed.calls,
            chunks: parsed.chunks,
            doc: parsed.doc,
            errors: parsed.errors,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn mtime(&self) -> i64 {
        self.mtime
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn language_tag(&self) -> Language {
        self.language_tag
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn imports(&self) -> &[ImportRef] {
        &self.imports
    }

    pub fn exports(&self) -> &[String] {
        &self.exports
    }

    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Relative import sources only, per §4.5 (external imports never
    /// contribute a graph edge).
    pub fn relative_import_sources(&self) -> impl Iterator<Item = &str> {
        self.imports
            .iter()
            .filter(|i| i.is_relative())
            .map(|i| i.source.as_str())
    }
}

/// Normalizes a path to forward-slash form, per §4.1.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::symbol::Span;
    use crate::domain::models::{SymbolKind};

    #[test]
    fn test_from_parse_carries_errors() {
        let parsed = ParseResult {
            errors: vec![ParseError::new("unexpected token", 3)],
            ..Default::default()
        };
        let record = FileRecord::from_parse("a.rs", "deadbeef", 0, 10, Language::Rust, parsed);
        assert!(record.has_errors());
        assert_eq!(record.chunks().len(), 0);
    }

    #[test]
    fn test_relative_import_sources_filters_external() {
        let parsed = ParseResult {
            imports: vec![
                ImportRef::classify("./a"),
                ImportRef::classify("react"),
                ImportRef::classify("../b"),
            ],
            symbols: vec![Symbol::new(SymbolKind::Function, "f", Span::new(1, 1))],
            ..Default::default()
        };
        let record = FileRecord::from_parse("x.ts", "h", 0, 1, Language::TypeScript, parsed);
        let rels: Vec<&str> = record.relative_import_sources().collect();
        assert_eq!(rels, vec!["./a", "../b"]);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a\\b\\c.rs"), "a/b/c.rs");
    }
}
