use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::domain::AtlasError;

/// Database-level statements never issued by this crate; anything
/// matching is rejected before reaching the connection.
static DANGEROUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(DROP\s+(DATABASE|SCHEMA)|ATTACH\b|DETACH\b|EXPORT\s+DATABASE|IMPORT\s+DATABASE|COPY\s+.+\s+TO\b|PRAGMA\s+\w+\s*=|CREATE\s+EXTENSION)",
    )
    .expect("dangerous statement pattern")
});

/// Extension management is only ever allowed for the vector extension.
static INSTALL_OR_LOAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(INSTALL|LOAD)\s+(\w+)").expect("install pattern"));

/// Qualified table references outside the expected schemas.
static SCHEMA_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([a-z_][a-z0-9_]*)\.[a-z_][a-z0-9_]*\b").expect("schema ref"));

const KNOWN_SCHEMAS: &[&str] = &["main", "information_schema", "pg_catalog", "temp"];

/// Defense-in-depth check applied to dynamically assembled SQL before
/// execution. Rejects dangerous database-level statements and warns on
/// references to unexpected schemas.
pub fn check_query(sql: &str) -> Result<(), AtlasError> {
    if DANGEROUS.is_match(sql) {
        return Err(AtlasError::security(format!(
            "Blocked dangerous SQL statement: {}",
            sql.chars().take(120).collect::<String>()
        )));
    }

    for cap in INSTALL_OR_LOAD.captures_iter(sql) {
        if !cap[2].eq_ignore_ascii_case("vss") {
            return Err(AtlasError::security(format!(
                "Blocked extension statement: {} {}",
                &cap[1],
                &cap[2]
            )));
        }
    }

    for cap in SCHEMA_REF.captures_iter(sql) {
        let schema = cap[1].to_lowercase();
        // Table aliases like c.file_path also match; only warn on names
        // longer than a typical alias.
        if schema.len() > 2 && !KNOWN_SCHEMAS.contains(&schema.as_str()) && is_schema_like(&schema)
        {
            warn!("Query references unexpected schema '{}'", schema);
        }
    }
    Ok(())
}

fn is_schema_like(name: &str) -> bool {
    // Our own tables referenced as qualifier-free aliases are fine.
    ![
        "repositories",
        "code_files",
        "code_chunks",
        "code_symbols",
        "workspaces",
        "services",
    ]
    .contains(&name)
}
