//! End-to-end indexing pipeline tests over a temporary fixture
//! repository with an in-memory store.

mod common;

use codeatlas::{IndexingOptions, ListRepositoriesUseCase, RepoType};
use common::{build_fixture_repo, write_file, TestEnv};

fn options_for(repo_id: &str) -> IndexingOptions {
    IndexingOptions {
        repo_id: Some(repo_id.to_string()),
        repo_type: RepoType::Monolithic,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_index_then_list() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_fixture_repo(dir.path());
    let env = TestEnv::new();

    let report = env
        .index_use_case()
        .execute(dir.path().to_str().unwrap(), options_for("test-repo-1"))
        .await
        .expect("index");

    assert_eq!(report.repository.id(), "test-repo-1");
    assert_eq!(report.repository.repo_type(), RepoType::Monolithic);
    assert!(report.files_indexed > 0);
    assert!(report.chunks_created > 0);
    assert!(report.symbols_created > 0);

    let repos = ListRepositoriesUseCase::new(env.catalog.clone())
        .execute()
        .await
        .expect("list");
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0].id(), "test-repo-1");
    assert_eq!(repos[0].repo_type(), RepoType::Monolithic);
    assert!(repos[0].file_count() > 0);
    assert!(repos[0].last_indexed().is_some());
}

#[tokio::test]
async fn test_gitignore_and_dependency_dirs_filtered() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_fixture_repo(dir.path());
    let env = TestEnv::new();

    let report = env
        .index_use_case()
        .execute(dir.path().to_str().unwrap(), options_for("gitignore-repo"))
        .await
        .expect("index");

    assert!(report
        .changes
        .added
        .iter()
        .any(|p| p.contains("src/index.ts")));
    assert!(!report
        .changes
        .added
        .iter()
        .any(|p| p.contains("node_modules")));
    assert!(!report.changes.added.iter().any(|p| p.contains("dist/")));
    assert!(report.walk_stats.excluded_ignored > 0);
}

#[tokio::test]
async fn test_reindex_same_repo_is_all_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_fixture_repo(dir.path());
    let env = TestEnv::new();
    let use_case = env.index_use_case();
    let path = dir.path().to_str().unwrap();

    let first = use_case
        .execute(path, options_for("repo-idempotent"))
        .await
        .expect("first index");
    let second = use_case
        .execute(path, options_for("repo-idempotent"))
        .await
        .expect("second index");

    assert_eq!(second.changes.modified.len(), 0);
    assert_eq!(second.changes.added.len(), 0);
    assert_eq!(second.changes.deleted.len(), 0);
    assert_eq!(
        second.changes.unchanged.len() as u64,
        first.files_indexed,
        "every previously indexed file should be unchanged"
    );
    assert_eq!(second.files_indexed, 0);
}

#[tokio::test]
async fn test_modified_file_reindexes_only_that_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_fixture_repo(dir.path());
    let env = TestEnv::new();
    let use_case = env.index_use_case();
    let path = dir.path().to_str().unwrap();

    use_case
        .execute(path, options_for("repo-modify"))
        .await
        .expect("first index");

    write_file(
        dir.path(),
        "src/math.ts",
        "// sum helpers, rewritten\nexport function calculateSum(values: number[]): number {\n    return values.reduce((a, b) => a + b, 0);\n}\n",
    );

    let second = use_case
        .execute(path, options_for("repo-modify"))
        .await
        .expect("second index");

    assert_eq!(second.changes.modified, vec!["src/math.ts".to_string()]);
    assert_eq!(second.changes.added.len(), 0);
    assert_eq!(second.changes.deleted.len(), 0);
    assert_eq!(second.files_indexed, 1);
}

#[tokio::test]
async fn test_deleted_file_removes_chunks_and_symbols() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_fixture_repo(dir.path());
    let env = TestEnv::new();
    let use_case = env.index_use_case();
    let path = dir.path().to_str().unwrap();

    use_case
        .execute(path, options_for("repo-delete"))
        .await
        .expect("first index");
    let chunks_before = env.vectors.count_chunks("repo-delete").await.unwrap();
    let symbols_before = env.vectors.count_symbols("repo-delete").await.unwrap();

    std::fs::remove_file(dir.path().join("src/users.ts")).expect("remove file");

    let second = use_case
        .execute(path, options_for("repo-delete"))
        .await
        .expect("second index");

    assert_eq!(second.changes.deleted, vec!["src/users.ts".to_string()]);
    let chunks_after = env.vectors.count_chunks("repo-delete").await.unwrap();
    let symbols_after = env.vectors.count_symbols("repo-delete").await.unwrap();
    assert!(chunks_after < chunks_before);
    assert!(symbols_after < symbols_before);
    assert!(env
        .catalog
        .find_file("repo-delete", "src/users.ts")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_force_reindex_matches_fresh_counts() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_fixture_repo(dir.path());
    let env = TestEnv::new();
    let use_case = env.index_use_case();
    let path = dir.path().to_str().unwrap();

    let fresh = use_case
        .execute(path, options_for("repo-force"))
        .await
        .expect("fresh index");
    let fresh_chunks = env.vectors.count_chunks("repo-force").await.unwrap();
    let fresh_symbols = env.vectors.count_symbols("repo-force").await.unwrap();

    let mut force_options = options_for("repo-force");
    force_options.force_reindex = true;
    let forced = use_case
        .execute(path, force_options)
        .await
        .expect("forced index");

    assert!(forced.decision.force);
    assert_eq!(forced.files_indexed, fresh.files_indexed);
    assert_eq!(env.vectors.count_chunks("repo-force").await.unwrap(), fresh_chunks);
    assert_eq!(
        env.vectors.count_symbols("repo-force").await.unwrap(),
        fresh_symbols
    );
}

#[tokio::test]
async fn test_version_change_triggers_full_reindex() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_fixture_repo(dir.path());
    let env = TestEnv::new();
    let use_case = env.index_use_case();
    let path = dir.path().to_str().unwrap();

    let mut v1 = options_for("repo-versioned");
    v1.version = Some("1.0.0".to_string());
    use_case.execute(path, v1).await.expect("v1 index");

    let mut v2 = options_for("repo-versioned");
    v2.version = Some("2.0.0".to_string());
    let second = use_case.execute(path, v2).await.expect("v2 index");

    assert!(second.decision.reindex);
    assert!(second.decision.version_changed);
    // A cleared store sees every file as new again.
    assert!(second.changes.added.len() > 0);

    let repo = env
        .catalog
        .find_repository("repo-versioned")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(repo.version(), Some("2.0.0"));
}

#[tokio::test]
async fn test_stored_hash_matches_content() {
    let dir = tempfile::tempdir().expect("tempdir");
    build_fixture_repo(dir.path());
    let env = TestEnv::new();

    env.index_use_case()
        .execute(dir.path().to_str().unwrap(), options_for("repo-hash"))
        .await
        .expect("index");

    let stored = env
        .catalog
        .find_file("repo-hash", "src/math.ts")
        .await
        .unwrap()
        .expect("file row");
    let on_disk = std::fs::read_to_string(dir.path().join("src/math.ts")).unwrap();
    assert_eq!(stored.file_hash(), codeatlas::compute_file_hash(&on_disk));
    assert!(stored.file_summary().is_some());
    assert!(!stored.exports().is_empty());
}

#[tokio::test]
async fn test_workspace_detection_assigns_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    write_file(root, "package.json", r#"{"name":"mono","workspaces":["packages/*"]}"#);
    write_file(
        root,
        "packages/core/package.json",
        r#"{"name":"@acme/core","version":"1.0.0"}"#,
    );
    write_file(
        root,
        "packages/core/src/index.ts",
        "// sum utilities\nexport function sum(a: number, b: number) {\n    return a + b;\n}\n",
    );
    let env = TestEnv::new();

    env.index_use_case()
        .execute(root.to_str().unwrap(), options_for("repo-workspace"))
        .await
        .expect("index");

    let workspaces = env
        .catalog
        .workspaces_by_repository("repo-workspace")
        .await
        .unwrap();
    assert_eq!(workspaces.len(), 1);
    assert_eq!(workspaces[0].package_name(), "@acme/core");

    let file = env
        .catalog
        .find_file("repo-workspace", "packages/core/src/index.ts")
        .await
        .unwrap()
        .expect("file row");
    assert_eq!(file.workspace_id(), Some(workspaces[0].id()));
    assert_eq!(file.package_name(), Some("@acme/core"));
}
