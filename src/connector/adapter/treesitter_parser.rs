use async_trait::async_trait;
use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Parser, Query, QueryCursor};

use crate::application::SourceParser;
use crate::domain::{
    Chunk, DomainError, ImportKind, ImportRef, Language, ParseError, ParseResult, Span, Symbol,
    SymbolKind,
};

/// Strips surrounding quotes from an import path literal as captured by a
/// tree-sitter query (Go `"fmt"`, PHP use-clause names come unquoted already).
fn normalize_import_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.len() < 2 {
        return trimmed.to_string();
    }
    if (trimmed.starts_with('"') && trimmed.ends_with('"'))
        || (trimmed.starts_with('\'') && trimmed.ends_with('\''))
    {
        return trimmed[1..trimmed.len() - 1].to_string();
    }
    trimmed.to_string()
}

/// Tree-sitter backed implementation of the external parser boundary (C3),
/// the default `SourceParser` for the seven languages the core classifies
/// during discovery (§4.1).
pub struct TreeSitterParser {
    supported_languages: Vec<Language>,
}

impl TreeSitterParser {
    pub fn new() -> Self {
        Self {
            supported_languages: Language::all_supported(),
        }
    }

    fn get_ts_language(&self, language: Language) -> Option<tree_sitter::Language> {
        match language {
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::HCL => Some(tree_sitter_hcl::LANGUAGE.into()),
            Language::Php => Some(tree_sitter_php::LANGUAGE_PHP.into()),
            Language::Unknown => None,
        }
    }

    fn symbol_query_patterns(language: Language) -> &'static str {
        match language {
            Language::Rust => {
                r#"
                (function_item name: (identifier) @name) @function
                (impl_item) @impl
                (struct_item name: (type_identifier) @name) @struct
                (enum_item name: (type_identifier) @name) @enum
                (trait_item name: (type_identifier) @name) @trait
                (mod_item name: (identifier) @name) @module
                (const_item name: (identifier) @name) @constant
                (static_item name: (identifier) @name) @constant
                (type_item name: (type_identifier) @name) @typedef
                "#
            }
            Language::Python => {
                r#"
                (function_definition name: (identifier) @name) @function
                (class_definition name: (identifier) @name) @class
                "#
            }
            Language::JavaScript => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (class_declaration name: (identifier) @name) @class
                (method_definition name: (property_identifier) @name) @function
                "#
            }
            Language::TypeScript => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (class_declaration name: (type_identifier) @name) @class
                (method_definition name: (property_identifier) @name) @function
                (interface_declaration name: (type_identifier) @name) @interface
                (type_alias_declaration name: (type_identifier) @name) @typedef
                "#
            }
            Language::Go => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (method_declaration name: (field_identifier) @name) @function
                (type_declaration (type_spec name: (type_identifier) @name)) @struct
                "#
            }
            Language::HCL => {
                r#"
                (block (identifier) @name) @block
                "#
            }
            Language::Php => {
                r#"
                (function_definition name: (name) @name) @function
                (method_declaration name: (name) @name) @function
                (class_declaration name: (name) @name) @class
                (interface_declaration name: (name) @name) @interface
                (trait_declaration name: (name) @name) @trait
                (namespace_definition name: (namespace_name) @name) @module
                (enum_declaration name: (name) @name) @enum
                "#
            }
            Language::Unknown => "",
        }
    }

    fn capture_to_symbol_kind(capture_name: &str) -> SymbolKind {
        match capture_name {
            "function" => SymbolKind::Function,
            "class" => SymbolKind::Class,
            "struct" => SymbolKind::Struct,
            "enum" => SymbolKind::Enum,
            "trait" => SymbolKind::Trait,
            "impl" => SymbolKind::Impl,
            "module" => SymbolKind::Module,
            "constant" => SymbolKind::Constant,
            "typedef" => SymbolKind::TypeDef,
            "interface" => SymbolKind::Interface,
            _ => SymbolKind::Block,
        }
    }

    /// Query patterns for calls and import edges, reusing the same captured
    /// node kinds the symbol query does but over expressions instead of
    /// definitions.
    fn reference_query_patterns(language: Language) -> &'static str {
        match language {
            Language::Rust => {
                r#"
                (call_expression
                    function: (identifier) @callee) @call
                (call_expression
                    function: (field_expression
                        field: (field_identifier) @callee)) @call
                (call_expression
                    function: (scoped_identifier
                        name: (identifier) @callee)) @call
                (use_declaration
                    argument: (scoped_identifier
                        name: (identifier) @source)) @import
                (use_declaration
                    argument: (identifier) @source) @import
                "#
            }
            Language::Python => {
                r#"
                (call
                    function: (identifier) @callee) @call
                (call
                    function: (attribute
                        attribute: (identifier) @callee)) @call
                (import_statement
                    name: (dotted_name) @source) @import
                (import_from_statement
                    module_name: (dotted_name) @source) @import
                (import_from_statement
                    module_name: (relative_import) @source) @import
                "#
            }
            Language::JavaScript => {
                r#"
                (call_expression
                    function: (identifier) @callee) @call
                (call_expression
                    function: (member_expression
                        property: (property_identifier) @callee)) @call
                (import_statement
                    source: (string (string_fragment) @source)) @import
                (call_expression
                    function: (identifier) @_req
                    arguments: (arguments (string (string_fragment) @source))
                    (#eq? @_req "require")) @import
                "#
            }
            Language::TypeScript => {
                r#"
                (call_expression
                    function: (identifier) @callee) @call
                (call_expression
                    function: (member_expression
                        property: (property_identifier) @callee)) @call
                (import_statement
                    source: (string (string_fragment) @source)) @import
                "#
            }
            Language::Go => {
                r#"
                (call_expression
                    function: (identifier) @callee) @call
                (call_expression
                    function: (selector_expression
                        field: (field_identifier) @callee)) @call
                (import_spec
                    path: (interpreted_string_literal) @source) @import
                "#
            }
            Language::HCL => {
                r#"
                (function_call
                    (identifier) @callee) @call
                "#
            }
            Language::Php => {
                r#"
                (function_call_expression
                    function: (name) @callee) @call
                (member_call_expression
                    name: (name) @callee) @call
                (namespace_use_clause
                    (qualified_name) @source) @import
                (require_once_expression (string) @source) @import
                (require_expression (string) @source) @import
                (include_once_expression (string) @source) @import
                (include_expression (string) @source) @import
                "#
            }
            Language::Unknown => "",
        }
    }

    /// Best-effort doc comment: a contiguous block of `//`/`///`/`#` comment
    /// lines immediately preceding `start_line` (1-based).
    fn doc_comment_above(content: &str, start_line: u32, language: Language) -> Option<String> {
        let marker: &[&str] = match language {
            Language::Rust => &["///", "//!", "//"],
            Language::Go | Language::JavaScript | Language::TypeScript => &["//", "*", "/**"],
            Language::Python => &["#"],
            Language::Php => &["//", "*", "/**", "#"],
            Language::HCL => &["#", "//"],
            Language::Unknown => return None,
        };

        let lines: Vec<&str> = content.lines().collect();
        if start_line < 2 {
            return None;
        }
        let mut collected = Vec::new();
        let mut idx = (start_line as usize).saturating_sub(2);
        loop {
            let line = lines.get(idx)?;
            let trimmed = line.trim();
            if trimmed.is_empty() || !marker.iter().any(|m| trimmed.starts_with(m)) {
                break;
            }
            collected.push(trimmed.to_string());
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        if collected.is_empty() {
            None
        } else {
            collected.reverse();
            Some(collected.join("\n"))
        }
    }

    fn classify_import(language: Language, raw: &str) -> ImportRef {
        let normalized = normalize_import_path(raw);
        match language {
            Language::Python => {
                if let Some(rest) = normalized.strip_prefix('.') {
                    let mut dots = 1;
                    let mut tail = rest;
                    while let Some(r) = tail.strip_prefix('.') {
                        dots += 1;
                        tail = r;
                    }
                    let prefix = "../".repeat(dots.saturating_sub(1));
                    let prefix = if prefix.is_empty() { "./".to_string() } else { prefix };
                    let source = format!("{}{}", prefix, tail.replace('.', "/"));
                    ImportRef::classify(source)
                } else {
                    ImportRef::classify(normalized.replace('.', "/"))
                }
            }
            Language::Php => {
                if normalized.starts_with('.') {
                    ImportRef::classify(normalized)
                } else {
                    // Namespace use-clauses are always external symbol
                    // references, never a same-project file edge.
                    ImportRef {
                        source: normalized,
                        kind: ImportKind::External,
                    }
                }
            }
            _ => ImportRef::classify(normalized),
        }
    }
}

impl Default for TreeSitterParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceParser for TreeSitterParser {
    async fn parse_file(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<ParseResult, DomainError> {
        let ts_language = match self.get_ts_language(language) {
            Some(lang) => lang,
            None => {
                return Ok(ParseResult {
                    errors: vec![ParseError::new(
                        format!("unsupported language: {}", language),
                        0,
                    )],
                    ..Default::default()
                })
            }
        };

        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| DomainError::parse(format!("failed to set language: {}", e)))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| DomainError::parse("failed to parse file"))?;

        let mut errors = Vec::new();
        if tree.root_node().has_error() {
            errors.push(ParseError::new("file contains syntax errors", 0));
        }

        let mut symbols = Vec::new();
        let mut chunks = Vec::new();

        let symbol_source = Self::symbol_query_patterns(language);
        if !symbol_source.is_empty() {
            let query = Query::new(&ts_language, symbol_source)
                .map_err(|e| DomainError::parse(format!("failed to build symbol query: {}", e)))?;
            let capture_names: Vec<&str> = query.capture_names().to_vec();
            let mut cursor = QueryCursor::new();
            let text_bytes = content.as_bytes();
            let mut matches_iter = cursor.matches(&query, tree.root_node(), text_bytes);

            while let Some(query_match) = matches_iter.next() {
                let mut name: Option<String> = None;
                let mut main_node = None;
                let mut kind = SymbolKind::Block;

                for capture in query_match.captures {
                    let capture_name = capture_names.get(capture.index as usize).copied().unwrap_or("");
                    if capture_name == "name" {
                        name = Some(content[capture.node.byte_range()].to_string());
                    } else {
                        main_node = Some(capture.node);
                        kind = Self::capture_to_symbol_kind(capture_name);
                    }
                }

                let Some(node) = main_node else { continue };
                let start_line = node.start_position().row as u32 + 1;
                let end_line = node.end_position().row as u32 + 1;
                let node_content = content[node.byte_range()].to_string();
                if node_content.trim().len() < 4 {
                    continue;
                }

                let span = Span::new(start_line, end_line);
                let doc = Self::doc_comment_above(content, start_line, language);
                let mut symbol = Symbol::new(kind, name.clone().unwrap_or_default(), span);
                if let Some(ref d) = doc {
                    symbol = symbol.with_doc(d.clone());
                }
                symbols.push(symbol);

                let chunk = Chunk::new(
                    file_path.to_string(),
                    start_line,
                    end_line,
                    node_content,
                    language,
                    name,
                    0,
                );
                chunks.push(chunk);
            }
        }

        if chunks.is_empty() && !content.trim().is_empty() {
            let line_count = content.lines().count().max(1) as u32;
            chunks.push(Chunk::new(
                file_path.to_string(),
                1,
                line_count,
                content.to_string(),
                language,
                None,
                0,
            ));
        }

        let mut imports = Vec::new();
        let mut calls = Vec::new();

        let reference_source = Self::reference_query_patterns(language);
        if !reference_source.is_empty() {
            let query = Query::new(&ts_language, reference_source)
                .map_err(|e| DomainError::parse(format!("failed to build reference query: {}", e)))?;
            let capture_names: Vec<&str> = query.capture_names().to_vec();
            let mut cursor = QueryCursor::new();
            let text_bytes = content.as_bytes();
            let mut matches_iter = cursor.matches(&query, tree.root_node(), text_bytes);

            while let Some(query_match) = matches_iter.next() {
                for capture in query_match.captures {
                    let capture_name = capture_names.get(capture.index as usize).copied().unwrap_or("");
                    let text = content[capture.node.byte_range()].to_string();
                    match capture_name {
                        "callee" => {
                            if text.len() >= 2 && !calls.contains(&text) {
                                calls.push(text);
                            }
                        }
                        "source" => {
                            imports.push(Self::classify_import(language, &text));
                        }
                        _ => {}
                    }
                }
            }
        }

        debug!(
            "parsed {} symbols, {} chunks, {} imports, {} calls from {} ({})",
            symbols.len(),
            chunks.len(),
            imports.len(),
            calls.len(),
            file_path,
            language
        );

        let doc = symbols.first().and_then(|s| s.doc.clone());

        Ok(ParseResult {
            symbols,
            imports,
            exports: Vec::new(),
            calls,
            chunks,
            doc,
            errors,
        })
    }

    fn supported_languages(&self) -> Vec<Language> {
        self.supported_languages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_rust_function_and_struct() {
        let parser = TreeSitterParser::new();
        let content = r#"
/// Adds two numbers.
fn add(a: i32, b: i32) -> i32 {
    a + b
}

struct Point {
    x: i32,
    y: i32,
}
"#;
        let result = parser.parse_file(content, "calc.rs", Language::Rust).await.unwrap();
        assert!(result.symbols.iter().any(|s| s.name == "add" && s.kind == SymbolKind::Function));
        assert!(result.symbols.iter().any(|s| s.name == "Point" && s.kind == SymbolKind::Struct));
        assert!(!result.chunks.is_empty());
    }

    #[tokio::test]
    async fn test_parse_rust_use_declaration_is_relative_import() {
        let parser = TreeSitterParser::new();
        let content = "use crate::foo::Bar;\nfn f() {}\n";
        let result = parser.parse_file(content, "lib.rs", Language::Rust).await.unwrap();
        assert!(!result.imports.is_empty());
    }

    #[tokio::test]
    async fn test_parse_python_relative_import() {
        let parser = TreeSitterParser::new();
        let content = "from .utils import helper\n\ndef run():\n    helper()\n";
        let result = parser.parse_file(content, "pkg/main.py", Language::Python).await.unwrap();
        assert!(result.imports.iter().any(|i| i.is_relative()));
        assert!(result.calls.contains(&"helper".to_string()));
    }

    #[tokio::test]
    async fn test_parse_javascript_import_and_call() {
        let parser = TreeSitterParser::new();
        let content = "import { helper } from './utils';\n\nfunction run() {\n  helper();\n}\n";
        let result = parser.parse_file(content, "main.js", Language::JavaScript).await.unwrap();
        assert!(result.imports.iter().any(|i| i.source == "./utils"));
    }

    #[tokio::test]
    async fn test_parse_go_function_and_import() {
        let parser = TreeSitterParser::new();
        let content = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"hi\")\n}\n";
        let result = parser.parse_file(content, "main.go", Language::Go).await.unwrap();
        assert!(result.symbols.iter().any(|s| s.name == "main"));
        assert!(result.imports.iter().any(|i| i.source == "fmt" && !i.is_relative()));
    }

    #[tokio::test]
    async fn test_unsupported_language_reports_parse_error() {
        let parser = TreeSitterParser::new();
        let result = parser.parse_file("whatever", "x.bin", Language::Unknown).await.unwrap();
        assert!(result.errors.iter().any(|e| e.message.contains("unsupported")));
    }
}
