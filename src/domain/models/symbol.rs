use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of a persisted symbol definition text.
pub const MAX_DEFINITION_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolType {
    Function,
    Class,
    Variable,
    Type,
    Interface,
}

impl SymbolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolType::Function => "function",
            SymbolType::Class => "class",
            SymbolType::Variable => "variable",
            SymbolType::Type => "type",
            SymbolType::Interface => "interface",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "function" => SymbolType::Function,
            "class" => SymbolType::Class,
            "type" => SymbolType::Type,
            "interface" => SymbolType::Interface,
            _ => SymbolType::Variable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolScope {
    Exported,
    Internal,
}

impl SymbolScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolScope::Exported => "exported",
            SymbolScope::Internal => "internal",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "exported" => SymbolScope::Exported,
            _ => SymbolScope::Internal,
        }
    }
}

/// A named declaration persisted in `code_symbols`, owned by its file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    id: String,
    name: String,
    symbol_type: SymbolType,
    file_path: String,
    repo_id: String,
    line_number: u32,
    definition: String,
    scope: SymbolScope,
}

impl Symbol {
    pub fn new(
        name: impl Into<String>,
        symbol_type: SymbolType,
        file_path: impl Into<String>,
        repo_id: impl Into<String>,
        line_number: u32,
        definition: impl Into<String>,
        scope: SymbolScope,
    ) -> Self {
        let mut definition = definition.into();
        if definition.chars().count() > MAX_DEFINITION_CHARS {
            definition = definition.chars().take(MAX_DEFINITION_CHARS).collect();
        }
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            symbol_type,
            file_path: file_path.into(),
            repo_id: repo_id.into(),
            line_number,
            definition,
            scope,
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        name: String,
        symbol_type: SymbolType,
        file_path: String,
        repo_id: String,
        line_number: u32,
        definition: String,
        scope: SymbolScope,
    ) -> Self {
        Self {
            id,
            name,
            symbol_type,
            file_path,
            repo_id,
            line_number,
            definition,
            scope,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol_type(&self) -> SymbolType {
        self.symbol_type
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn scope(&self) -> SymbolScope {
        self.scope
    }

    pub fn is_exported(&self) -> bool {
        matches!(self.scope, SymbolScope::Exported)
    }

    pub fn location(&self) -> String {
        format!("{}:{}", self.file_path, self.line_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_truncation() {
        let long = "x".repeat(900);
        let symbol = Symbol::new(
            "Big",
            SymbolType::Type,
            "types.ts",
            "repo",
            1,
            long,
            SymbolScope::Exported,
        );
        assert_eq!(symbol.definition().chars().count(), MAX_DEFINITION_CHARS);
    }

    #[test]
    fn test_scope_round_trip() {
        assert_eq!(SymbolScope::parse("exported"), SymbolScope::Exported);
        assert_eq!(SymbolScope::parse("anything-else"), SymbolScope::Internal);
        assert!(Symbol::new("f", SymbolType::Function, "a.ts", "r", 1, "fn", SymbolScope::Exported).is_exported());
    }

    #[test]
    fn test_symbol_type_parse_defaults_to_variable() {
        assert_eq!(SymbolType::parse("interface"), SymbolType::Interface);
        assert_eq!(SymbolType::parse("whatever"), SymbolType::Variable);
    }
}
