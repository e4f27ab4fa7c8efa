use serde::{Deserialize, Serialize};

/// Kind of declaration extracted by a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Function,
    Method,
    Class,
    Interface,
    Variable,
    Constant,
    Type,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Class => "class",
            NodeKind::Interface => "interface",
            NodeKind::Variable => "variable",
            NodeKind::Constant => "constant",
            NodeKind::Type => "type",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, NodeKind::Function | NodeKind::Method)
    }
}

/// A declaration found in a parsed file. Line numbers are 1-indexed and
/// inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedNode {
    pub kind: NodeKind,
    pub name: String,
    pub start_line: u32,
    pub end_line: u32,
    pub code_text: String,
    pub parameters: Option<Vec<String>>,
    pub return_type: Option<String>,
    pub docstring: Option<String>,
    /// Class members (methods, fields) for class-like nodes.
    pub children: Vec<ParsedNode>,
    pub complexity: u32,
    pub is_async: bool,
}

impl ParsedNode {
    pub fn new(kind: NodeKind, name: impl Into<String>, start_line: u32, end_line: u32, code_text: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            start_line,
            end_line,
            code_text: code_text.into(),
            parameters: None,
            return_type: None,
            docstring: None,
            children: Vec::new(),
            complexity: 1,
            is_async: false,
        }
    }

    pub fn anonymous(kind: NodeKind, start_line: u32, end_line: u32, code_text: impl Into<String>) -> Self {
        Self::new(kind, "<anonymous>", start_line, end_line, code_text)
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn signature_line(&self) -> &str {
        self.code_text.lines().next().unwrap_or("")
    }

    pub fn method_names(&self) -> Vec<String> {
        self.children
            .iter()
            .filter(|c| c.kind.is_callable())
            .map(|c| c.name.clone())
            .collect()
    }
}

/// One import statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    /// Named imports; empty for bare/namespace-only imports.
    pub symbols: Vec<String>,
    /// Module path as written in the source.
    pub source: String,
    pub is_default: bool,
    pub is_namespace: bool,
    pub line_number: u32,
}

impl ImportInfo {
    pub fn new(source: impl Into<String>, line_number: u32) -> Self {
        Self {
            symbols: Vec::new(),
            source: source.into(),
            is_default: false,
            is_namespace: false,
            line_number,
        }
    }

    pub fn with_symbols(mut self, symbols: Vec<String>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn default_import(mut self, name: impl Into<String>) -> Self {
        self.symbols = vec![name.into()];
        self.is_default = true;
        self
    }

    pub fn namespace_import(mut self, name: impl Into<String>) -> Self {
        self.symbols = vec![name.into()];
        self.is_namespace = true;
        self
    }

    /// Relative imports stay inside the repository.
    pub fn is_relative(&self) -> bool {
        self.source.starts_with("./") || self.source.starts_with("../")
    }
}

/// One exported name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub name: String,
    pub line_number: u32,
    pub is_reexport: bool,
    pub reexport_source: Option<String>,
}

impl ExportInfo {
    pub fn new(name: impl Into<String>, line_number: u32) -> Self {
        Self {
            name: name.into(),
            line_number,
            is_reexport: false,
            reexport_source: None,
        }
    }

    pub fn reexport(name: impl Into<String>, line_number: u32, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            line_number,
            is_reexport: true,
            reexport_source: Some(source.into()),
        }
    }
}

/// Result of parsing a file with either the grammar-backed extractor or
/// the regex fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseResult {
    pub nodes: Vec<ParsedNode>,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    pub used_fallback: bool,
}

impl ParseResult {
    pub fn fallback(nodes: Vec<ParsedNode>) -> Self {
        Self {
            nodes,
            imports: Vec::new(),
            exports: Vec::new(),
            used_fallback: true,
        }
    }

    pub fn export_names(&self) -> Vec<&str> {
        self.exports.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn is_exported(&self, name: &str) -> bool {
        self.exports.iter().any(|e| e.name == name)
    }

    /// Flatten top-level nodes and class members into one iterator.
    pub fn all_nodes(&self) -> Vec<&ParsedNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            out.push(node);
            for child in &node.children {
                out.push(child);
            }
        }
        out
    }

    pub fn functions(&self) -> impl Iterator<Item = &ParsedNode> {
        self.nodes.iter().filter(|n| n.kind.is_callable())
    }

    pub fn classes(&self) -> impl Iterator<Item = &ParsedNode> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Class | NodeKind::Interface))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_node_line_count() {
        let node = ParsedNode::new(NodeKind::Function, "sum", 10, 24, "fn sum() {}");
        assert_eq!(node.line_count(), 15);
    }

    #[test]
    fn test_method_names_only_includes_callables() {
        let mut class = ParsedNode::new(NodeKind::Class, "Calc", 1, 20, "class Calc {}");
        class.children.push(ParsedNode::new(NodeKind::Method, "add", 2, 4, "add() {}"));
        class.children.push(ParsedNode::new(NodeKind::Variable, "total", 5, 5, "total = 0"));
        assert_eq!(class.method_names(), vec!["add".to_string()]);
    }

    #[test]
    fn test_import_relative_detection() {
        assert!(ImportInfo::new("./utils", 1).is_relative());
        assert!(ImportInfo::new("../shared/api", 1).is_relative());
        assert!(!ImportInfo::new("express", 1).is_relative());
    }

    #[test]
    fn test_parse_result_export_lookup() {
        let mut result = ParseResult::default();
        result.exports.push(ExportInfo::new("handler", 3));
        assert!(result.is_exported("handler"));
        assert!(!result.is_exported("internal"));
    }

    #[test]
    fn test_fallback_constructor_flags() {
        let result = ParseResult::fallback(vec![]);
        assert!(result.used_fallback);
        assert!(result.imports.is_empty());
        assert!(result.exports.is_empty());
    }
}
