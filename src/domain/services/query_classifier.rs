use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::models::QueryKind;

/// Structure that only shows up in pasted code, not in prose.
static CODE_STRUCTURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        =>            | # arrow functions
        ::\w          | # path separators
        [{};]         | # block/statement punctuation
        \(\)          | # call parens
        \w+\.\w+\(    | # method calls
        ^\s*(fn|def|func|function|class|import|const|let|var|pub)\b
        ",
    )
    .expect("code structure pattern")
});

/// Classify a query as pasted code or natural language.
pub fn classify_query(query: &str) -> QueryKind {
    let trimmed = query.trim();
    if CODE_STRUCTURE.is_match(trimmed) {
        return QueryKind::CodeSnippet;
    }
    // Heavy non-alphabetic density also reads as code.
    let symbols = trimmed
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    let total = trimmed.chars().count().max(1);
    if symbols * 4 > total {
        QueryKind::CodeSnippet
    } else {
        QueryKind::NaturalLanguage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_language_queries() {
        assert_eq!(
            classify_query("function to calculate sum"),
            QueryKind::NaturalLanguage
        );
        assert_eq!(
            classify_query("where is the retry logic for uploads"),
            QueryKind::NaturalLanguage
        );
    }

    #[test]
    fn test_code_snippet_queries() {
        assert_eq!(
            classify_query("const sum = (a, b) => a + b;"),
            QueryKind::CodeSnippet
        );
        assert_eq!(classify_query("fn main() {"), QueryKind::CodeSnippet);
        assert_eq!(classify_query("res.status(404).send()"), QueryKind::CodeSnippet);
        assert_eq!(classify_query("Vec::<String>::new()"), QueryKind::CodeSnippet);
    }
}
