use crate::domain::models::{
    NodeKind, ParseResult, ParsedNode, Symbol, SymbolScope, SymbolType,
};

/// Build the symbol table for one parsed file. Embeddings for the
/// definition texts are computed downstream by the embedding stage.
pub fn extract_symbols(repo_id: &str, file_path: &str, parse: &ParseResult) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    for node in parse.all_nodes() {
        let symbol_type = match node.kind {
            NodeKind::Function | NodeKind::Method => SymbolType::Function,
            NodeKind::Class => SymbolType::Class,
            NodeKind::Interface => SymbolType::Interface,
            NodeKind::Variable | NodeKind::Constant => SymbolType::Variable,
            NodeKind::Type => SymbolType::Type,
        };
        if node.name == "<anonymous>" {
            continue;
        }

        let scope = if parse.is_exported(&node.name) {
            SymbolScope::Exported
        } else {
            SymbolScope::Internal
        };

        symbols.push(Symbol::new(
            &node.name,
            symbol_type,
            file_path,
            repo_id,
            node.start_line,
            definition_text(node, symbol_type),
            scope,
        ));
    }
    symbols
}

/// Definition text per symbol kind: the signature line for functions, the
/// class header with its method list, the first line (or a typed const
/// rendering) for variables, and the verbatim code for types. Length is
/// capped by the Symbol constructor.
fn definition_text(node: &ParsedNode, symbol_type: SymbolType) -> String {
    match symbol_type {
        SymbolType::Function => node.signature_line().to_string(),
        SymbolType::Class | SymbolType::Interface => {
            let methods = node.method_names();
            if methods.is_empty() {
                node.signature_line().to_string()
            } else {
                format!("{} {{ {} }}", node.signature_line(), methods.join(", "))
            }
        }
        SymbolType::Variable => match &node.return_type {
            Some(ty) => format!("const {}: {}", node.name, ty),
            None => node.signature_line().to_string(),
        },
        SymbolType::Type => node.code_text.clone(),
    }
}
