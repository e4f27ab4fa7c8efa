use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{ExportInfo, ImportInfo, Language};

static JS_NAMED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^}]*)\}").expect("js named"));
static JS_NAMESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\s+as\s+(\w+)").expect("js namespace"));
static JS_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^import\s+(\w+)").expect("js default"));
static JS_SOURCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"from\s+['"]([^'"]+)['"]|^import\s+['"]([^'"]+)['"]"#).expect("js source"));
static JS_REQUIRE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:const|let|var)\s+(?:\{([^}]*)\}|(\w+))\s*=\s*require\(\s*['"]([^'"]+)['"]"#)
        .expect("js require")
});

static PY_FROM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^from\s+([\w.]+)\s+import\s+(.+)$").expect("py from"));
static PY_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^import\s+([\w.]+)").expect("py import"));

static JAVA_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^import\s+(?:static\s+)?([\w.]+?)(?:\.(\w+|\*))?\s*;").expect("java import"));

static GO_SPEC: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("go spec"));

static RUST_USE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:pub\s+)?use\s+([\w:]+?)(?:::\{([^}]*)\}|::(\w+|\*))?\s*;").expect("rust use"));

static C_INCLUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^#\s*include\s+[<"]([^>"]+)[>"]"#).expect("c include"));

static CSHARP_USING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^using\s+(?:static\s+)?([\w.]+)\s*;").expect("csharp using"));

static RUBY_REQUIRE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^require(?:_relative)?\s+['"]([^'"]+)['"]"#).expect("ruby require"));

static PHP_USE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^use\s+([\w\\]+?)(?:\\(\w+))?\s*(?:as\s+\w+\s*)?;").expect("php use"));

static KT_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^import\s+([\w.]+?)(?:\.(\w+|\*))?$").expect("kotlin import"));

static JS_EXPORT_NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^export\s+\{([^}]*)\}(?:\s*from\s+['"]([^'"]+)['"])?"#).expect("js export named")
});
static JS_EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^export\s+(?:default\s+)?(?:async\s+)?(?:function|class|const|let|var|interface|type|enum)\s+(\w+)")
        .expect("js export decl")
});
static JS_EXPORT_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^export\s+default\s+(\w+)?").expect("js export default"));

/// Tree-sitter statement kinds treated as imports per language.
pub fn is_import_kind(language: Language, kind: &str) -> bool {
    let kinds: &[&str] = match language {
        Language::JavaScript | Language::TypeScript => {
            &["import_statement", "lexical_declaration", "variable_declaration"]
        }
        Language::Python => &["import_statement", "import_from_statement"],
        Language::Java => &["import_declaration"],
        Language::Go => &["import_declaration"],
        Language::Rust => &["use_declaration"],
        Language::C | Language::Cpp => &["preproc_include"],
        Language::CSharp => &["using_directive"],
        Language::Ruby => &["call"],
        Language::Php => &["namespace_use_declaration"],
        Language::Kotlin => &["import_header", "import"],
        _ => &[],
    };
    kinds.contains(&kind)
}

/// Parse one import-ish statement's text into `ImportInfo`s. Statements
/// that look like imports but are not (e.g. a plain `const`) yield
/// nothing.
pub fn parse_import_statement(
    language: Language,
    text: &str,
    line_number: u32,
) -> Vec<ImportInfo> {
    let text = text.trim();
    match language {
        Language::JavaScript | Language::TypeScript => parse_js_import(text, line_number),
        Language::Python => parse_python_import(text, line_number),
        Language::Java => JAVA_IMPORT
            .captures(text)
            .map(|cap| {
                let mut info = ImportInfo::new(&cap[1], line_number);
                if let Some(symbol) = cap.get(2) {
                    if symbol.as_str() == "*" {
                        info = info.namespace_import(&cap[1]);
                    } else {
                        info.symbols = vec![symbol.as_str().to_string()];
                    }
                }
                vec![info]
            })
            .unwrap_or_default(),
        Language::Go => {
            // One import_declaration may hold several specs.
            GO_SPEC
                .captures_iter(text)
                .map(|cap| ImportInfo::new(&cap[1], line_number))
                .collect()
        }
        Language::Rust => RUST_USE
            .captures(text)
            .map(|cap| {
                let mut info = ImportInfo::new(&cap[1], line_number);
                if let Some(list) = cap.get(2) {
                    info.symbols = split_symbols(list.as_str());
                } else if let Some(single) = cap.get(3) {
                    if single.as_str() == "*" {
                        info = info.namespace_import(&cap[1]);
                    } else {
                        info.symbols = vec![single.as_str().to_string()];
                    }
                }
                vec![info]
            })
            .unwrap_or_default(),
        Language::C | Language::Cpp => C_INCLUDE
            .captures(text)
            .map(|cap| vec![ImportInfo::new(&cap[1], line_number)])
            .unwrap_or_default(),
        Language::CSharp => CSHARP_USING
            .captures(text)
            .map(|cap| vec![ImportInfo::new(&cap[1], line_number)])
            .unwrap_or_default(),
        Language::Ruby => RUBY_REQUIRE
            .captures(text)
            .map(|cap| vec![ImportInfo::new(&cap[1], line_number)])
            .unwrap_or_default(),
        Language::Php => PHP_USE
            .captures(text)
            .map(|cap| {
                let mut info = ImportInfo::new(&cap[1], line_number);
                if let Some(symbol) = cap.get(2) {
                    info.symbols = vec![symbol.as_str().to_string()];
                }
                vec![info]
            })
            .unwrap_or_default(),
        Language::Kotlin => KT_IMPORT
            .captures(text)
            .map(|cap| {
                let mut info = ImportInfo::new(&cap[1], line_number);
                if let Some(symbol) = cap.get(2) {
                    if symbol.as_str() == "*" {
                        info = info.namespace_import(&cap[1]);
                    } else {
                        info.symbols = vec![symbol.as_str().to_string()];
                    }
                }
                vec![info]
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn parse_js_import(text: &str, line_number: u32) -> Vec<ImportInfo> {
    if let Some(cap) = JS_REQUIRE.captures(text) {
        let mut info = ImportInfo::new(&cap[3], line_number);
        if let Some(named) = cap.get(1) {
            info.symbols = split_symbols(named.as_str());
        } else if let Some(binding) = cap.get(2) {
            info = info.default_import(binding.as_str());
        }
        return vec![info];
    }

    if !text.starts_with("import") {
        return Vec::new();
    }
    let Some(source) = JS_SOURCE
        .captures(text)
        .and_then(|cap| cap.get(1).or(cap.get(2)).map(|m| m.as_str().to_string()))
    else {
        return Vec::new();
    };

    let mut info = ImportInfo::new(source, line_number);
    if let Some(cap) = JS_NAMESPACE.captures(text) {
        info = info.namespace_import(&cap[1]);
    } else if let Some(cap) = JS_NAMED.captures(text) {
        info.symbols = split_symbols(&cap[1]);
        // `import Default, { a, b } from 'x'` keeps the default too.
        if let Some(default) = JS_DEFAULT.captures(text) {
            if default[1] != *"type" {
                info.symbols.insert(0, default[1].to_string());
                info.is_default = true;
            }
        }
    } else if let Some(cap) = JS_DEFAULT.captures(text) {
        if cap[1] != *"type" {
            info = info.default_import(&cap[1]);
        }
    }
    vec![info]
}

fn parse_python_import(text: &str, line_number: u32) -> Vec<ImportInfo> {
    if let Some(cap) = PY_FROM.captures(text) {
        let mut info = ImportInfo::new(&cap[1], line_number);
        info.symbols = split_symbols(&cap[2]);
        return vec![info];
    }
    if let Some(cap) = PY_IMPORT.captures(text) {
        return vec![ImportInfo::new(&cap[1], line_number)];
    }
    Vec::new()
}

/// Split a `{ a, b as c }`-style list, keeping local binding names.
fn split_symbols(list: &str) -> Vec<String> {
    list.split(',')
        .map(|part| {
            let part = part.trim();
            match part.split_whitespace().collect::<Vec<_>>().as_slice() {
                [name, "as", alias] if *name != "*" => (*alias).to_string(),
                _ => part
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .trim_start_matches("type ")
                    .to_string(),
            }
        })
        .filter(|s| !s.is_empty() && s != "*")
        .collect()
}

/// Parse a JS/TS `export_statement` text into `ExportInfo`s.
pub fn parse_js_export(text: &str, line_number: u32) -> Vec<ExportInfo> {
    let text = text.trim();
    if let Some(cap) = JS_EXPORT_NAMED.captures(text) {
        let source = cap.get(2).map(|m| m.as_str().to_string());
        return split_symbols(&cap[1])
            .into_iter()
            .map(|name| match &source {
                Some(src) => ExportInfo::reexport(name, line_number, src.clone()),
                None => ExportInfo::new(name, line_number),
            })
            .collect();
    }
    if let Some(cap) = JS_EXPORT_DECL.captures(text) {
        return vec![ExportInfo::new(&cap[1], line_number)];
    }
    if let Some(cap) = JS_EXPORT_DEFAULT.captures(text) {
        let name = cap.get(1).map(|m| m.as_str()).unwrap_or("default");
        return vec![ExportInfo::new(name, line_number)];
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_named_import() {
        let infos = parse_import_statement(
            Language::TypeScript,
            "import { readFile, writeFile as write } from 'fs/promises';",
            3,
        );
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].source, "fs/promises");
        assert_eq!(infos[0].symbols, vec!["readFile", "write"]);
        assert_eq!(infos[0].line_number, 3);
    }

    #[test]
    fn test_js_default_and_namespace() {
        let default = parse_import_statement(Language::JavaScript, "import express from 'express'", 1);
        assert!(default[0].is_default);
        assert_eq!(default[0].symbols, vec!["express"]);

        let ns = parse_import_statement(Language::TypeScript, "import * as path from 'path';", 1);
        assert!(ns[0].is_namespace);
        assert_eq!(ns[0].source, "path");
    }

    #[test]
    fn test_js_require() {
        let infos = parse_import_statement(
            Language::JavaScript,
            "const { Router } = require('express');",
            2,
        );
        assert_eq!(infos[0].source, "express");
        assert_eq!(infos[0].symbols, vec!["Router"]);

        let none = parse_import_statement(Language::JavaScript, "const x = 1;", 2);
        assert!(none.is_empty());
    }

    #[test]
    fn test_python_imports() {
        let from = parse_import_statement(Language::Python, "from collections import OrderedDict, deque", 1);
        assert_eq!(from[0].source, "collections");
        assert_eq!(from[0].symbols, vec!["OrderedDict", "deque"]);

        let plain = parse_import_statement(Language::Python, "import os.path", 1);
        assert_eq!(plain[0].source, "os.path");
    }

    #[test]
    fn test_rust_use() {
        let infos = parse_import_statement(Language::Rust, "use std::collections::{HashMap, HashSet};", 1);
        assert_eq!(infos[0].source, "std::collections");
        assert_eq!(infos[0].symbols, vec!["HashMap", "HashSet"]);

        let single = parse_import_statement(Language::Rust, "pub use crate::domain::AtlasError;", 1);
        assert_eq!(single[0].source, "crate::domain");
        assert_eq!(single[0].symbols, vec!["AtlasError"]);
    }

    #[test]
    fn test_go_import_block() {
        let infos = parse_import_statement(
            Language::Go,
            "import (\n  \"fmt\"\n  \"net/http\"\n)",
            1,
        );
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[1].source, "net/http");
    }

    #[test]
    fn test_misc_languages() {
        assert_eq!(
            parse_import_statement(Language::Java, "import java.util.List;", 1)[0].symbols,
            vec!["List"]
        );
        assert_eq!(
            parse_import_statement(Language::C, "#include <stdio.h>", 1)[0].source,
            "stdio.h"
        );
        assert_eq!(
            parse_import_statement(Language::CSharp, "using System.Text;", 1)[0].source,
            "System.Text"
        );
        assert_eq!(
            parse_import_statement(Language::Ruby, "require 'json'", 1)[0].source,
            "json"
        );
        assert_eq!(
            parse_import_statement(Language::Php, "use App\\Models\\User;", 1)[0].symbols,
            vec!["User"]
        );
        assert_eq!(
            parse_import_statement(Language::Kotlin, "import kotlinx.coroutines.flow.Flow", 1)[0]
                .source,
            "kotlinx.coroutines.flow"
        );
    }

    #[test]
    fn test_js_exports() {
        let decl = parse_js_export("export async function handler() {}", 4);
        assert_eq!(decl[0].name, "handler");
        assert!(!decl[0].is_reexport);

        let named = parse_js_export("export { a, b as c } from './other';", 9);
        assert_eq!(named.len(), 2);
        assert!(named[0].is_reexport);
        assert_eq!(named[0].reexport_source.as_deref(), Some("./other"));
        assert_eq!(named[1].name, "c");

        let default = parse_js_export("export default App;", 1);
        assert_eq!(default[0].name, "App");
    }
}
