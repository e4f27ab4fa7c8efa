use std::path::Path;

use crate::domain::{AtlasError, SearchOptions};

/// Parameter validation for the tool-call boundary. Every rule raises
/// `AtlasError::Validation` naming the offending parameter; nothing here
/// is retried.
pub fn validate_query(query: &str) -> Result<(), AtlasError> {
    if query.trim().chars().count() < 2 {
        return Err(AtlasError::validation(
            "query",
            "must be at least 2 characters",
        ));
    }
    Ok(())
}

pub fn validate_repo_path(repo_path: &str) -> Result<(), AtlasError> {
    if !Path::new(repo_path).is_absolute() {
        return Err(AtlasError::validation(
            "repo_path",
            "must be an absolute path",
        ));
    }
    Ok(())
}

pub fn validate_file_path(file_path: &str) -> Result<(), AtlasError> {
    if !Path::new(file_path).is_absolute() {
        return Err(AtlasError::validation(
            "file_path",
            "must be an absolute path",
        ));
    }
    Ok(())
}

pub fn validate_similarity_threshold(value: f32) -> Result<(), AtlasError> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(AtlasError::validation(
            "similarity_threshold",
            "must be within [0, 1]",
        ));
    }
    Ok(())
}

pub fn validate_max_files(value: usize) -> Result<(), AtlasError> {
    if !(1..=50).contains(&value) {
        return Err(AtlasError::validation("max_files", "must be within [1, 50]"));
    }
    Ok(())
}

pub fn validate_max_snippets(value: usize) -> Result<(), AtlasError> {
    if !(1..=100).contains(&value) {
        return Err(AtlasError::validation(
            "max_snippets",
            "must be within [1, 100]",
        ));
    }
    Ok(())
}

pub fn validate_import_depth(value: u32) -> Result<(), AtlasError> {
    if !(1..=3).contains(&value) {
        return Err(AtlasError::validation(
            "import_depth",
            "must be within [1, 3]",
        ));
    }
    Ok(())
}

pub fn validate_dependency_depth(value: u32) -> Result<(), AtlasError> {
    if !(1..=5).contains(&value) {
        return Err(AtlasError::validation(
            "dependency_depth",
            "must be within [1, 5]",
        ));
    }
    Ok(())
}

/// Validate every bounded field of a search request.
pub fn validate_search_options(query: &str, options: &SearchOptions) -> Result<(), AtlasError> {
    validate_query(query)?;
    validate_max_files(options.max_files)?;
    validate_max_snippets(options.max_snippets)?;
    validate_import_depth(options.import_depth)?;
    validate_similarity_threshold(options.similarity_threshold)?;
    validate_similarity_threshold(options.dedup_threshold).map_err(|_| {
        AtlasError::validation("dedup_threshold", "must be within [0, 1]")
    })?;
    Ok(())
}
