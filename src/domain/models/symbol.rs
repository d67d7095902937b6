use serde::{Deserialize, Serialize};

/// A 1-based, inclusive line span, per the parser adapter contract (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn line_count(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn contains_line(&self, line: u32) -> bool {
        line >= self.start && line <= self.end
    }
}

/// Kind of a definition produced by the parser adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Struct,
    Enum,
    Trait,
    Impl,
    Module,
    Constant,
    TypeDef,
    Interface,
    Block,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Struct => "struct",
            SymbolKind::Enum => "enum",
            SymbolKind::Trait => "trait",
            SymbolKind::Impl => "impl",
            SymbolKind::Module => "module",
            SymbolKind::Constant => "constant",
            SymbolKind::TypeDef => "typedef",
            SymbolKind::Interface => "interface",
            SymbolKind::Block => "block",
        }
    }

    pub fn is_type_definition(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class
                | SymbolKind::Struct
                | SymbolKind::Enum
                | SymbolKind::Interface
                | SymbolKind::TypeDef
        )
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single definition extracted by the parser adapter (§3 `symbols[]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub span: Span,
    pub doc: Option<String>,
}

impl Symbol {
    pub fn new(kind: SymbolKind, name: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            name: name.into(),
            span,
            doc: None,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// Classification of an `imports[].source` string (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Relative,
    External,
}

/// A single import edge as emitted by the parser, pre-resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRef {
    pub source: String,
    pub kind: ImportKind,
}

impl ImportRef {
    /// Classifies `source` per §4.5: relative/absolute path-like strings
    /// start with `./`, `../`, or `/`; everything else is external.
    pub fn classify(source: impl Into<String>) -> Self {
        let source = source.into();
        let kind = if source.starts_with("./") || source.starts_with("../") || source.starts_with('/')
        {
            ImportKind::Relative
        } else {
            ImportKind::External
        };
        Self { source, kind }
    }

    pub fn is_relative(&self) -> bool {
        matches!(self.kind, ImportKind::Relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_line_count() {
        assert_eq!(Span::new(5, 10).line_count(), 6);
    }

    #[test]
    fn test_import_classification() {
        assert!(ImportRef::classify("./foo").is_relative());
        assert!(ImportRef::classify("../bar").is_relative());
        assert!(ImportRef::classify("/abs/path").is_relative());
        assert!(!ImportRef::classify("react").is_relative());
        assert!(!ImportRef::classify("lodash/fp").is_relative());
    }
}
