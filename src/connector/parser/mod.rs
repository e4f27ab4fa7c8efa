//! Tree-sitter backed parsing with a regex fallback.

mod fallback;
mod imports;
mod queries;

pub use fallback::regex_fallback_parse;
pub use imports::{is_import_kind, parse_import_statement, parse_js_export};
pub use queries::{declaration_query, kind_for_capture, DECISION_KINDS};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Node, Parser, Query, QueryCursor};

use crate::application::ParserService;
use crate::domain::{
    AtlasError, ExportInfo, ImportInfo, Language, NodeKind, ParseResult, ParsedNode,
};

static PARAMS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^)]*)\)").expect("params pattern"));
static RETURN_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\)\s*(?:->|:)\s*([^{;=]+)").expect("return type pattern"));

pub struct TreeSitterParser {
    supported_languages: Vec<Language>,
}

impl TreeSitterParser {
    pub fn new() -> Self {
        Self {
            supported_languages: Language::all_supported(),
        }
    }

    fn grammar(language: Language) -> Option<tree_sitter::Language> {
        match language {
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
            Language::C => Some(tree_sitter_c::LANGUAGE.into()),
            Language::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
            Language::CSharp => Some(tree_sitter_c_sharp::LANGUAGE.into()),
            Language::Ruby => Some(tree_sitter_ruby::LANGUAGE.into()),
            Language::Php => Some(tree_sitter_php::LANGUAGE_PHP.into()),
            Language::Kotlin => Some(tree_sitter_kotlin_ng::LANGUAGE.into()),
            Language::Markdown | Language::Unknown => None,
        }
    }

    fn extract(
        &self,
        content: &str,
        language: Language,
        grammar: &tree_sitter::Language,
        tree: &tree_sitter::Tree,
    ) -> Result<ParseResult, AtlasError> {
        let pattern = declaration_query(language)
            .ok_or_else(|| AtlasError::parse(format!("no query for {language}")))?;
        let query = Query::new(grammar, pattern)
            .map_err(|e| AtlasError::parse(format!("query compile for {language}: {e}")))?;
        let capture_names = query.capture_names();

        let mut nodes: Vec<ParsedNode> = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), content.as_bytes());
        while let Some(m) = matches.next() {
            let mut kind: Option<NodeKind> = None;
            let mut decl_node: Option<Node> = None;
            let mut name: Option<String> = None;

            for capture in m.captures {
                let capture_name = capture_names[capture.index as usize];
                if capture_name == "name" {
                    name = Some(
                        content[capture.node.byte_range()].to_string(),
                    );
                } else if let Some(k) = kind_for_capture(capture_name) {
                    kind = Some(k);
                    decl_node = Some(capture.node);
                }
            }

            let (Some(kind), Some(decl)) = (kind, decl_node) else {
                continue;
            };
            let start_line = decl.start_position().row as u32 + 1;
            let end_line = decl.end_position().row as u32 + 1;
            // The same declaration can satisfy several patterns.
            if nodes
                .iter()
                .any(|n| n.start_line == start_line && n.name.as_str() == name.as_deref().unwrap_or("<anonymous>"))
            {
                continue;
            }

            let code_text = content[decl.byte_range()].to_string();
            let signature = code_text.lines().next().unwrap_or("").to_string();

            let mut node = match name {
                Some(name) => ParsedNode::new(kind, name, start_line, end_line, code_text),
                None => ParsedNode::anonymous(kind, start_line, end_line, code_text),
            };
            node.complexity = complexity_of(decl, &node.code_text);
            node.is_async = signature.contains("async ") || signature.starts_with("async");
            node.docstring = preceding_comment(decl, content);
            if kind.is_callable() {
                node.parameters = PARAMS.captures(&signature).map(|cap| {
                    cap[1]
                        .split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect()
                });
                node.return_type = RETURN_TYPE
                    .captures(&signature)
                    .map(|cap| cap[1].trim().to_string());
            }
            nodes.push(node);
        }
        nodes.sort_by_key(|n| n.start_line);

        let nodes = nest_class_members(nodes);
        let imports = extract_imports(language, tree.root_node(), content);
        let exports = extract_exports(language, &nodes, tree.root_node(), content);

        Ok(ParseResult {
            nodes,
            imports,
            exports,
            used_fallback: false,
        })
    }
}

impl Default for TreeSitterParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParserService for TreeSitterParser {
    async fn parse(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<ParseResult, AtlasError> {
        let Some(grammar) = Self::grammar(language) else {
            debug!("No grammar for {}; using regex fallback", file_path);
            return Ok(regex_fallback_parse(content));
        };

        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| AtlasError::parse(format!("{}: {}", file_path, e)))?;

        let Some(tree) = parser.parse(content, None) else {
            debug!("Parse of {} produced no tree; using regex fallback", file_path);
            return Ok(regex_fallback_parse(content));
        };
        if tree.root_node().has_error() {
            debug!("Parse tree for {} has errors; using regex fallback", file_path);
            return Ok(regex_fallback_parse(content));
        }

        self.extract(content, language, &grammar, &tree)
    }

    fn supported_languages(&self) -> Vec<Language> {
        self.supported_languages.clone()
    }
}

/// 1 + decision nodes in the subtree + textual logical operators.
fn complexity_of(node: Node, code_text: &str) -> u32 {
    let mut count = 1 + count_decision_nodes(node);
    count += code_text.matches("&&").count() as u32;
    count += code_text.matches("||").count() as u32;
    count.max(1)
}

fn count_decision_nodes(node: Node) -> u32 {
    let mut count = 0;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if DECISION_KINDS.contains(&child.kind()) {
            count += 1;
        }
        count += count_decision_nodes(child);
    }
    count
}

/// The immediately preceding comment node, when adjacent.
fn preceding_comment(node: Node, content: &str) -> Option<String> {
    let candidate = node
        .prev_named_sibling()
        .or_else(|| node.parent().and_then(|p| p.prev_named_sibling()))?;
    if !candidate.kind().contains("comment") {
        return None;
    }
    if node.start_position().row.saturating_sub(candidate.end_position().row) > 1 {
        return None;
    }
    Some(content[candidate.byte_range()].trim().to_string())
}

/// Move callable nodes that sit inside a class-like node's span into that
/// node's children as methods.
fn nest_class_members(nodes: Vec<ParsedNode>) -> Vec<ParsedNode> {
    let class_spans: Vec<(u32, u32)> = nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Class | NodeKind::Interface))
        .map(|n| (n.start_line, n.end_line))
        .collect();
    if class_spans.is_empty() {
        return nodes;
    }

    let mut top_level: Vec<ParsedNode> = Vec::with_capacity(nodes.len());
    let mut members: Vec<((u32, u32), ParsedNode)> = Vec::new();

    for node in nodes {
        // Strictly inside a class span (the class itself starts at the
        // span start, so it never matches).
        let owner = class_spans
            .iter()
            .find(|(start, end)| node.start_line > *start && node.end_line <= *end);
        match owner {
            Some(span) if node.kind.is_callable() => {
                let mut member = node;
                member.kind = NodeKind::Method;
                members.push((*span, member));
            }
            _ => top_level.push(node),
        }
    }

    for ((start, end), member) in members {
        if let Some(class) = top_level.iter_mut().find(|n| {
            n.start_line == start
                && n.end_line == end
                && matches!(n.kind, NodeKind::Class | NodeKind::Interface)
        }) {
            class.children.push(member);
        }
    }
    top_level
}

fn extract_imports(language: Language, root: Node, content: &str) -> Vec<ImportInfo> {
    let mut imports = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if !is_import_kind(language, child.kind()) {
            continue;
        }
        let text = &content[child.byte_range()];
        if language == Language::Ruby && !text.trim_start().starts_with("require") {
            continue;
        }
        let line = child.start_position().row as u32 + 1;
        imports.extend(parse_import_statement(language, text, line));
    }
    imports
}

fn extract_exports(
    language: Language,
    nodes: &[ParsedNode],
    root: Node,
    content: &str,
) -> Vec<ExportInfo> {
    match language {
        Language::JavaScript | Language::TypeScript => {
            let mut exports = Vec::new();
            let mut cursor = root.walk();
            for child in root.named_children(&mut cursor) {
                if child.kind() == "export_statement" {
                    let text = &content[child.byte_range()];
                    let line = child.start_position().row as u32 + 1;
                    exports.extend(parse_js_export(text, line));
                }
            }
            exports
        }
        // Python has no export construct.
        Language::Python => Vec::new(),
        Language::Go => nodes
            .iter()
            .filter(|n| n.name.chars().next().is_some_and(|c| c.is_uppercase()))
            .map(|n| ExportInfo::new(&n.name, n.start_line))
            .collect(),
        Language::Rust => nodes
            .iter()
            .filter(|n| n.code_text.trim_start().starts_with("pub "))
            .map(|n| ExportInfo::new(&n.name, n.start_line))
            .collect(),
        Language::Java | Language::CSharp => nodes
            .iter()
            .filter(|n| {
                n.code_text
                    .trim_start()
                    .split_whitespace()
                    .take(3)
                    .any(|word| word == "public")
            })
            .map(|n| ExportInfo::new(&n.name, n.start_line))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_typescript_functions_and_exports() {
        let parser = TreeSitterParser::new();
        let code = r#"import { Router } from 'express';

export async function listUsers(req, res) {
    const users = await store.all();
    res.json(users);
}

function internalHelper() {
    return 1;
}
"#;
        let result = parser
            .parse(code, "users.ts", Language::TypeScript)
            .await
            .expect("parse");
        assert!(!result.used_fallback);

        let names: Vec<&str> = result.nodes.iter().map(|n| n.name.as_str()).collect();
        assert!(names.contains(&"listUsers"));
        assert!(names.contains(&"internalHelper"));

        let list_users = result.nodes.iter().find(|n| n.name == "listUsers").unwrap();
        assert!(list_users.is_async);
        assert_eq!(list_users.parameters.as_deref(), Some(&["req".to_string(), "res".to_string()][..]));

        assert_eq!(result.imports.len(), 1);
        assert_eq!(result.imports[0].source, "express");
        assert!(result.is_exported("listUsers"));
        assert!(!result.is_exported("internalHelper"));
    }

    #[tokio::test]
    async fn test_python_class_members_nested() {
        let parser = TreeSitterParser::new();
        let code = r#"import json

class Calculator:
    def add(self, x):
        return x

    def sub(self, x):
        if x > 0:
            return -x
        return x

def top_level():
    pass
"#;
        let result = parser
            .parse(code, "calc.py", Language::Python)
            .await
            .expect("parse");

        let class = result.nodes.iter().find(|n| n.name == "Calculator").unwrap();
        assert_eq!(class.kind, NodeKind::Class);
        assert_eq!(class.method_names(), vec!["add", "sub"]);
        assert!(result.nodes.iter().any(|n| n.name == "top_level"));
        // Python exports nothing.
        assert!(result.exports.is_empty());
        assert_eq!(result.imports[0].source, "json");
    }

    #[tokio::test]
    async fn test_rust_pub_exports_and_complexity() {
        let parser = TreeSitterParser::new();
        let code = r#"use std::collections::HashMap;

pub fn branchy(x: i32) -> i32 {
    if x > 0 {
        for i in 0..x {
            if i % 2 == 0 && i > 2 {
                return i;
            }
        }
    }
    x
}

fn private_helper() {}
"#;
        let result = parser
            .parse(code, "lib.rs", Language::Rust)
            .await
            .expect("parse");

        let branchy = result.nodes.iter().find(|n| n.name == "branchy").unwrap();
        assert!(branchy.complexity >= 4);
        assert_eq!(branchy.return_type.as_deref(), Some("i32"));
        assert!(result.is_exported("branchy"));
        assert!(!result.is_exported("private_helper"));
    }

    #[tokio::test]
    async fn test_go_uppercase_exports() {
        let parser = TreeSitterParser::new();
        let code = "package main\n\nimport \"fmt\"\n\nfunc Public() {\n\tfmt.Println(1)\n}\n\nfunc private() {}\n";
        let result = parser
            .parse(code, "main.go", Language::Go)
            .await
            .expect("parse");
        assert!(result.is_exported("Public"));
        assert!(!result.is_exported("private"));
    }

    #[tokio::test]
    async fn test_broken_source_falls_back() {
        let parser = TreeSitterParser::new();
        let code = "function broken( {{{\nclass Salvage {\n}\n";
        let result = parser
            .parse(code, "broken.js", Language::JavaScript)
            .await
            .expect("parse");
        assert!(result.used_fallback);
    }

    #[tokio::test]
    async fn test_unknown_language_uses_fallback() {
        let parser = TreeSitterParser::new();
        let result = parser
            .parse("# just text\n", "notes.txt", Language::Unknown)
            .await
            .expect("parse");
        assert!(result.used_fallback);
        assert!(!parser.supports_language(Language::Unknown));
    }

    #[tokio::test]
    async fn test_docstring_extraction() {
        let parser = TreeSitterParser::new();
        let code = "/// Adds two numbers.\npub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n";
        let result = parser
            .parse(code, "math.rs", Language::Rust)
            .await
            .expect("parse");
        let add = result.nodes.iter().find(|n| n.name == "add").unwrap();
        assert_eq!(add.docstring.as_deref(), Some("/// Adds two numbers."));
    }
}
