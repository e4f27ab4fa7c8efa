use crate::domain::{Language, NodeKind};

/// Declaration query patterns per language. Capture names map to
/// [`NodeKind`] via [`kind_for_capture`]; `@name` marks the identifier.
pub fn declaration_query(language: Language) -> Option<&'static str> {
    let query = match language {
        Language::Rust => {
            r#"
            (function_item name: (identifier) @name) @function
            (struct_item name: (type_identifier) @name) @type
            (enum_item name: (type_identifier) @name) @type
            (trait_item name: (type_identifier) @name) @interface
            (const_item name: (identifier) @name) @constant
            (static_item name: (identifier) @name) @constant
            (type_item name: (type_identifier) @name) @type
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
            (method_definition name: (property_identifier) @name) @method
            (variable_declarator name: (identifier) @name value: (arrow_function)) @function
            (variable_declarator name: (identifier) @name value: (function_expression)) @function
            "#
        }
        Language::TypeScript => {
            r#"
            (function_declaration name: (identifier) @name) @function
            (class_declaration name: (type_identifier) @name) @class
            (method_definition name: (property_identifier) @name) @method
            (variable_declarator name: (identifier) @name value: (arrow_function)) @function
            (interface_declaration name: (type_identifier) @name) @interface
            (type_alias_declaration name: (type_identifier) @name) @type
            (enum_declaration name: (identifier) @name) @type
            "#
        }
        Language::Java => {
            r#"
            (class_declaration name: (identifier) @name) @class
            (interface_declaration name: (identifier) @name) @interface
            (method_declaration name: (identifier) @name) @method
            (enum_declaration name: (identifier) @name) @type
            "#
        }
        Language::Go => {
            r#"
            (function_declaration name: (identifier) @name) @function
            (method_declaration name: (field_identifier) @name) @function
            (type_declaration (type_spec name: (type_identifier) @name)) @type
            (const_declaration (const_spec name: (identifier) @name)) @constant
            "#
        }
        Language::C => {
            r#"
            (function_definition declarator: (function_declarator declarator: (identifier) @name)) @function
            (struct_specifier name: (type_identifier) @name) @type
            (enum_specifier name: (type_identifier) @name) @type
            (type_definition declarator: (type_identifier) @name) @type
            "#
        }
        Language::Cpp => {
            r#"
            (class_specifier name: (type_identifier) @name) @class
            (struct_specifier name: (type_identifier) @name) @class
            (function_definition declarator: (function_declarator declarator: (identifier) @name)) @function
            (function_definition declarator: (function_declarator declarator: (field_identifier) @name)) @method
            (function_definition
              declarator: (function_declarator
                declarator: (qualified_identifier name: (identifier) @name))) @function
            (enum_specifier name: (type_identifier) @name) @type
            (type_definition declarator: (type_identifier) @name) @type
            "#
        }
        Language::CSharp => {
            r#"
            (class_declaration name: (identifier) @name) @class
            (interface_declaration name: (identifier) @name) @interface
            (method_declaration name: (identifier) @name) @method
            (struct_declaration name: (identifier) @name) @type
            (enum_declaration name: (identifier) @name) @type
            "#
        }
        Language::Ruby => {
            r#"
            (method name: (identifier) @name) @method
            (singleton_method name: (identifier) @name) @method
            (class name: (constant) @name) @class
            (module name: (constant) @name) @class
            "#
        }
        Language::Php => {
            r#"
            (function_definition name: (name) @name) @function
            (method_declaration name: (name) @name) @method
            (class_declaration name: (name) @name) @class
            (interface_declaration name: (name) @name) @interface
            (trait_declaration name: (name) @name) @class
            (enum_declaration name: (name) @name) @type
            "#
        }
        Language::Kotlin => {
            r#"
            (function_declaration (simple_identifier) @name) @function
            (class_declaration (type_identifier) @name) @class
            (object_declaration (type_identifier) @name) @class
            "#
        }
        Language::Markdown | Language::Unknown => return None,
    };
    Some(query)
}

/// Capture-name → node-kind mapping shared by every language table.
pub fn kind_for_capture(capture: &str) -> Option<NodeKind> {
    match capture {
        "function" => Some(NodeKind::Function),
        "method" => Some(NodeKind::Method),
        "class" => Some(NodeKind::Class),
        "interface" => Some(NodeKind::Interface),
        "variable" => Some(NodeKind::Variable),
        "constant" => Some(NodeKind::Constant),
        "type" => Some(NodeKind::Type),
        _ => None,
    }
}

/// Subtree node kinds counted as decision points for cyclomatic
/// complexity (logical operators are counted textually).
pub const DECISION_KINDS: &[&str] = &[
    "if_statement",
    "if_expression",
    "if",
    "elif_clause",
    "else_clause",
    "while_statement",
    "while_expression",
    "for_statement",
    "for_expression",
    "for_in_statement",
    "switch_case",
    "case_clause",
    "switch_section",
    "match_arm",
    "when_entry",
    "catch_clause",
    "rescue",
    "except_clause",
    "ternary_expression",
    "conditional_expression",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_supported_language_has_a_query() {
        for language in Language::all_supported() {
            assert!(
                declaration_query(language).is_some(),
                "missing query for {language}"
            );
        }
        assert!(declaration_query(Language::Markdown).is_none());
    }

    #[test]
    fn test_capture_kinds() {
        assert_eq!(kind_for_capture("function"), Some(NodeKind::Function));
        assert_eq!(kind_for_capture("interface"), Some(NodeKind::Interface));
        assert_eq!(kind_for_capture("name"), None);
    }
}
