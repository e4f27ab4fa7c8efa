//! Retrieval pipeline tests: scoping, two-level search, deduplication,
//! caching, and validation.

mod common;

use codeatlas::{AtlasError, IndexingOptions, RepoType, SearchOptions, WarningKind};
use common::{build_fixture_repo, write_file, TestEnv};

fn indexed_options(repo_id: &str) -> IndexingOptions {
    IndexingOptions {
        repo_id: Some(repo_id.to_string()),
        ..Default::default()
    }
}

fn search_options() -> SearchOptions {
    SearchOptions {
        max_files: 10,
        similarity_threshold: 0.5,
        ..Default::default()
    }
}

async fn indexed_env(repo_id: &str) -> (tempfile::TempDir, TestEnv) {
    let dir = tempfile::tempdir().expect("tempdir");
    build_fixture_repo(dir.path());
    let env = TestEnv::new();
    env.index_use_case()
        .execute(dir.path().to_str().unwrap(), indexed_options(repo_id))
        .await
        .expect("index");
    (dir, env)
}

#[tokio::test]
async fn test_semantic_search_finds_sum_function() {
    let (_dir, env) = indexed_env("search-repo").await;
    let search = env.search_use_case();

    let result = search
        .execute("function to calculate sum", &search_options())
        .await
        .expect("search");

    assert_eq!(result.query, "function to calculate sum");
    assert!(result.metadata.files_retrieved > 0);
    assert!(result.metadata.chunks_after_dedup <= result.metadata.chunks_retrieved);
    assert!(result
        .relevant_files
        .iter()
        .any(|f| f.file_path == "src/math.ts"));
    assert!(result
        .code_locations
        .iter()
        .any(|c| c.content.contains("calculateSum")));
    // Ordering is similarity-descending.
    for pair in result.code_locations.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[tokio::test]
async fn test_unrelated_vocabulary_stays_out_of_scope() {
    let (_dir, env) = indexed_env("scope-repo").await;
    let search = env.search_use_case();

    let result = search
        .execute("user store lookups", &search_options())
        .await
        .expect("search");

    assert!(result
        .relevant_files
        .iter()
        .any(|f| f.file_path == "src/users.ts"));
    assert!(!result
        .code_locations
        .iter()
        .any(|c| c.content.contains("calculateSum")));
}

#[tokio::test]
async fn test_query_cache_hit_is_fast_and_single_entry() {
    let (_dir, env) = indexed_env("cache-repo").await;
    let search = env.search_use_case();
    let options = search_options();

    let first = search
        .execute("function to calculate sum", &options)
        .await
        .expect("first search");
    assert_eq!(env.query_cache.len(), 1);

    let second = search
        .execute("function to calculate sum", &options)
        .await
        .expect("second search");
    assert_eq!(env.query_cache.len(), 1, "identical query reuses the cache");
    assert!(second.metadata.query_time_ms < 50);
    assert_eq!(
        first.metadata.chunks_after_dedup,
        second.metadata.chunks_after_dedup
    );
}

#[tokio::test]
async fn test_result_cache_invalidated_by_reindex() {
    let (dir, env) = indexed_env("invalidate-repo").await;
    let search = env.search_use_case();
    let options = search_options();

    search
        .execute("sum helpers", &options)
        .await
        .expect("warm the cache");
    assert!(env.result_cache.len() > 0);

    write_file(
        dir.path(),
        "src/math.ts",
        "// sum helpers\nexport function calculateSum(xs: number[]) {\n    return xs.reduce((a, b) => a + b, 0);\n}\n",
    );
    env.index_use_case()
        .execute(dir.path().to_str().unwrap(), indexed_options("invalidate-repo"))
        .await
        .expect("reindex");

    assert_eq!(env.result_cache.len(), 0, "reindex drops cached results");
}

#[tokio::test]
async fn test_validation_rejections() {
    let (_dir, env) = indexed_env("validation-repo").await;
    let search = env.search_use_case();

    let err = search
        .execute("", &search_options())
        .await
        .expect_err("empty query");
    match err {
        AtlasError::Validation { parameter, .. } => assert_eq!(parameter, "query"),
        other => panic!("expected validation error, got {other}"),
    }

    let mut bad = search_options();
    bad.similarity_threshold = 1.5;
    let err = search
        .execute("calculate sum", &bad)
        .await
        .expect_err("threshold out of range");
    match err {
        AtlasError::Validation { parameter, .. } => {
            assert_eq!(parameter, "similarity_threshold")
        }
        other => panic!("expected validation error, got {other}"),
    }

    let mut bad_depth = search_options();
    bad_depth.import_depth = 4;
    assert!(search.execute("calculate sum", &bad_depth).await.is_err());
}

#[tokio::test]
async fn test_no_match_returns_empty_context() {
    let (_dir, env) = indexed_env("empty-repo").await;
    let search = env.search_use_case();

    let mut options = search_options();
    options.similarity_threshold = 0.99;
    let result = search
        .execute("billing reconciliation", &options)
        .await
        .expect("search");

    assert!(result.is_empty());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::EmptyStage));
}

#[tokio::test]
async fn test_import_expansion_reaches_imported_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(
        dir.path(),
        "src/orders.ts",
        "// billing order intake\nimport { billingTotal } from './billing';\n\nexport function orderBilling(values: number[]) {\n    return billingTotal(values);\n}\n",
    );
    write_file(
        dir.path(),
        "src/billing.ts",
        "// billing math\nexport function billingTotal(values: number[]) {\n    return values.length;\n}\n",
    );
    let env = TestEnv::new();
    env.index_use_case()
        .execute(dir.path().to_str().unwrap(), indexed_options("imports-repo"))
        .await
        .expect("index");

    let result = env
        .search_use_case()
        .execute("billing order intake", &search_options())
        .await
        .expect("search");

    let chain = result
        .imports
        .iter()
        .find(|c| c.root_file == "src/orders.ts")
        .expect("chain rooted at orders.ts");
    assert!(chain
        .files
        .iter()
        .any(|entry| entry.file_path == "src/billing.ts" && entry.depth == 1));
    assert!(result.metadata.import_depth_reached >= 1);
}

#[tokio::test]
async fn test_symbols_resolved_for_imported_names() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(
        dir.path(),
        "src/orders.ts",
        "// billing order intake\nimport { billingTotal } from './billing';\n\nexport function orderBilling(values: number[]) {\n    if (values.length === 0) {\n        return 0;\n    }\n    return billingTotal(values);\n}\n",
    );
    write_file(
        dir.path(),
        "src/billing.ts",
        "// billing math\nexport function billingTotal(values: number[]) {\n    return values.length;\n}\n",
    );
    let env = TestEnv::new();
    env.index_use_case()
        .execute(dir.path().to_str().unwrap(), indexed_options("symbols-repo"))
        .await
        .expect("index");

    let result = env
        .search_use_case()
        .execute("billing order intake", &search_options())
        .await
        .expect("search");

    assert!(result
        .symbols
        .iter()
        .any(|s| s.name() == "billingTotal" && s.is_exported()));
    assert_eq!(result.metadata.symbols_resolved, result.symbols.len());
}

#[tokio::test]
async fn test_reference_repositories_dropped_by_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_fixture_repo(dir.path());
    let env = TestEnv::new();

    let mut options = indexed_options("reference-repo");
    options.repo_type = RepoType::Reference;
    env.index_use_case()
        .execute(dir.path().to_str().unwrap(), options)
        .await
        .expect("index");

    let search = env.search_use_case();
    let result = search
        .execute("function to calculate sum", &search_options())
        .await
        .expect("search");
    assert!(result.is_empty(), "reference repos are out of default scope");

    let mut include = search_options();
    include.include_references = true;
    let result = search
        .execute("function to calculate sum", &include)
        .await
        .expect("search with references");
    assert!(!result.is_empty());
}

#[tokio::test]
async fn test_token_budget_trims_results() {
    let (_dir, env) = indexed_env("budget-repo").await;
    let search = env.search_use_case();

    let mut options = search_options();
    options.token_budget = Some(10);
    let result = search
        .execute("function to calculate sum", &options)
        .await
        .expect("search");

    assert!(result.metadata.total_tokens <= 10);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::PartialResults));
}

#[tokio::test]
async fn test_post_filter_variant_excludes_other_repos() {
    let (_dir, env) = indexed_env("filter-repo").await;
    let search = env.search_use_case();

    let result = search
        .execute_filtered(
            "function to calculate sum",
            &search_options(),
            &["some-other-repo".to_string()],
        )
        .await
        .expect("filtered search");

    assert!(result.relevant_files.is_empty());
    assert!(result.code_locations.is_empty());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::Info && w.message.contains("excluded")));
}
