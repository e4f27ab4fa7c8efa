use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{NodeKind, ParseResult, ParsedNode};

/// Synthesized span for a fallback function node.
const FUNCTION_SPAN: u32 = 50;
/// Synthesized span for a fallback class node.
const CLASS_SPAN: u32 = 100;

static FUNCTION_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:pub\s+)?(async\s+)?(?:function|fn|def|func)\s+(\w+)")
        .expect("fallback function pattern")
});
static CLASS_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:pub\s+)?(?:abstract\s+)?(?:class|struct|interface)\s+(\w+)")
        .expect("fallback class pattern")
});

/// Line-oriented fallback used when no grammar exists or the parse tree
/// carries the error flag. Imports and exports are left empty; node end
/// lines are synthesized.
pub fn regex_fallback_parse(content: &str) -> ParseResult {
    let lines: Vec<&str> = content.split('\n').collect();
    let file_end = lines.len() as u32;
    let mut nodes = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let start_line = idx as u32 + 1;

        if let Some(cap) = FUNCTION_DECL.captures(line) {
            let end_line = (start_line + FUNCTION_SPAN).min(file_end);
            let mut node = ParsedNode::new(
                NodeKind::Function,
                &cap[2],
                start_line,
                end_line,
                snippet(&lines, start_line, end_line),
            );
            node.is_async = cap.get(1).is_some();
            nodes.push(node);
        } else if let Some(cap) = CLASS_DECL.captures(line) {
            let end_line = (start_line + CLASS_SPAN).min(file_end);
            nodes.push(ParsedNode::new(
                NodeKind::Class,
                &cap[1],
                start_line,
                end_line,
                snippet(&lines, start_line, end_line),
            ));
        }
    }

    ParseResult::fallback(nodes)
}

fn snippet(lines: &[&str], start: u32, end: u32) -> String {
    let start = start.saturating_sub(1) as usize;
    let end = (end as usize).min(lines.len());
    lines[start..end].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_finds_declarators() {
        let content = "export async function fetchUsers() {\n}\n\nclass UserStore {\n}\n";
        let result = regex_fallback_parse(content);
        assert!(result.used_fallback);
        assert_eq!(result.nodes.len(), 2);

        let func = &result.nodes[0];
        assert_eq!(func.name, "fetchUsers");
        assert_eq!(func.kind, NodeKind::Function);
        assert!(func.is_async);

        let class = &result.nodes[1];
        assert_eq!(class.name, "UserStore");
        assert_eq!(class.kind, NodeKind::Class);
    }

    #[test]
    fn test_fallback_end_lines_clamped_to_file() {
        let content = "def tiny():\n    pass\n";
        let result = regex_fallback_parse(content);
        assert_eq!(result.nodes[0].end_line, 3);
    }

    #[test]
    fn test_fallback_leaves_imports_empty() {
        let result = regex_fallback_parse("import { x } from 'y';\nfunction f() {}\n");
        assert!(result.imports.is_empty());
        assert!(result.exports.is_empty());
    }
}
