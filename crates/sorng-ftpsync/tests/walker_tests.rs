mod common;

use common::{unix_dir, unix_file, FakeServer};
use sorng_ftpsync::{DirectoryWalker, DownloadPlan, FallbackPolicy, ListingParser, WalkerConfig};
use std::path::Path;
use tempfile::TempDir;

async fn plan(server: &FakeServer, remote: &str, local: &Path, config: WalkerConfig) -> DownloadPlan {
    let mut transport = server.connected_transport().await;
    let parser = ListingParser::default();
    let mut walker = DirectoryWalker::new(&mut *transport, &parser, &config);
    walker.plan_download(remote, local).await
}

fn sample_tree() -> FakeServer {
    FakeServer::new()
        .dir("/a/", &[unix_file("f.txt", 3), unix_dir("b")])
        .dir("/a/b/", &[unix_file("g.txt", 5)])
}

#[tokio::test]
async fn test_plans_tree_in_pre_order() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");

    let plan = plan(&sample_tree(), "/a/", &out, WalkerConfig::default()).await;

    let summary: Vec<(bool, String, std::path::PathBuf)> = plan
        .tasks
        .iter()
        .map(|t| (t.is_directory, t.remote_path.clone(), t.local_path.clone()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (true, "/a/".to_string(), out.clone()),
            (false, "/a/f.txt".to_string(), out.join("f.txt")),
            (true, "/a/b/".to_string(), out.join("b")),
            (false, "/a/b/g.txt".to_string(), out.join("b").join("g.txt")),
        ]
    );
    assert!(plan.abandoned.is_empty());
    assert_eq!(plan.total_bytes(), 8);
    assert_eq!(plan.file_count(), 2);
}

#[tokio::test]
async fn test_creates_local_directories_while_planning() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");

    plan(&sample_tree(), "/a/", &out, WalkerConfig::default()).await;

    assert!(out.is_dir());
    assert!(out.join("b").is_dir());
    // Planning never downloads payload.
    assert!(!out.join("f.txt").exists());
}

#[tokio::test]
async fn test_every_file_follows_its_directory() {
    let server = FakeServer::new()
        .dir("/r/", &[unix_dir("x"), unix_file("top.bin", 1), unix_dir("y")])
        .dir("/r/x/", &[unix_dir("deep"), unix_file("x1", 1)])
        .dir("/r/x/deep/", &[unix_file("d1", 1), unix_file("d2", 1)])
        .dir("/r/y/", &[unix_file("y1", 1)]);
    let tmp = TempDir::new().unwrap();

    let plan = plan(&server, "/r/", tmp.path(), WalkerConfig::default()).await;

    for (idx, task) in plan.tasks.iter().enumerate().filter(|(_, t)| !t.is_directory) {
        let parent = task.local_path.parent().unwrap();
        let dir_idx = plan
            .tasks
            .iter()
            .position(|t| t.is_directory && t.local_path == parent)
            .expect("parent directory task");
        assert!(dir_idx < idx, "{} scheduled before its directory", task.remote_path);
    }
    assert_eq!(plan.tasks.len(), 9);
}

#[tokio::test]
async fn test_failed_branch_does_not_stop_siblings() {
    let server = FakeServer::new()
        .dir("/a/", &[unix_dir("locked"), unix_file("after.txt", 2)])
        .fail("/a/locked/");
    let tmp = TempDir::new().unwrap();

    let plan = plan(&server, "/a/", tmp.path(), WalkerConfig::default()).await;

    let remotes: Vec<&str> = plan.tasks.iter().map(|t| t.remote_path.as_str()).collect();
    assert_eq!(remotes, vec!["/a/", "/a/locked/", "/a/after.txt"]);
    assert_eq!(plan.abandoned.len(), 1);
    assert_eq!(plan.abandoned[0].remote_path, "/a/locked/");
}

#[tokio::test]
async fn test_unlistable_root_yields_only_root_task() {
    let server = FakeServer::new().fail("/gone/");
    let tmp = TempDir::new().unwrap();

    let plan = plan(&server, "/gone/", tmp.path(), WalkerConfig::default()).await;

    assert_eq!(plan.tasks.len(), 1);
    assert!(plan.tasks[0].is_directory);
    assert_eq!(plan.abandoned.len(), 1);
}

#[tokio::test]
async fn test_local_directory_failure_abandons_branch() {
    let server = FakeServer::new()
        .dir("/a/", &[unix_dir("blocked"), unix_file("ok.txt", 1)])
        .dir("/a/blocked/", &[unix_file("never.txt", 1)]);
    let tmp = TempDir::new().unwrap();
    // A regular file where the directory should go.
    std::fs::write(tmp.path().join("blocked"), b"x").unwrap();

    let plan = plan(&server, "/a/", tmp.path(), WalkerConfig::default()).await;

    let remotes: Vec<&str> = plan.tasks.iter().map(|t| t.remote_path.as_str()).collect();
    assert_eq!(remotes, vec!["/a/", "/a/ok.txt"]);
    assert_eq!(plan.abandoned[0].remote_path, "/a/blocked/");
    assert!(!server.calls().contains(&"list /a/blocked/".to_string()));
}

#[tokio::test]
async fn test_max_depth_stops_descent() {
    let tmp = TempDir::new().unwrap();
    let config = WalkerConfig { max_depth: Some(0) };

    let plan = plan(&sample_tree(), "/a/", tmp.path(), config).await;

    let remotes: Vec<&str> = plan.tasks.iter().map(|t| t.remote_path.as_str()).collect();
    assert_eq!(remotes, vec!["/a/", "/a/f.txt"]);
    assert_eq!(plan.abandoned[0].remote_path, "/a/b/");
    assert!(!tmp.path().join("b").exists());
}

#[tokio::test]
async fn test_unsafe_names_are_not_planned() {
    let server = FakeServer::new().dir("/a/", &[unix_file("../escape.sh", 1), unix_file("fine", 1)]);
    let tmp = TempDir::new().unwrap();

    let plan = plan(&server, "/a/", tmp.path(), WalkerConfig::default()).await;

    assert_eq!(plan.file_count(), 1);
    assert_eq!(plan.abandoned.len(), 1);
    assert!(plan.abandoned[0].reason.contains("escape.sh"));
}

#[tokio::test]
async fn test_walker_applies_fallback_policy() {
    let server = FakeServer::new()
        .dir("/w/", &["odd-format subdir".to_string()])
        .dir("/w/subdir/", &[unix_file("inner", 1)]);
    let tmp = TempDir::new().unwrap();
    let mut transport = server.connected_transport().await;
    let parser = ListingParser::new(FallbackPolicy::NoExtension);
    let config = WalkerConfig::default();

    let plan = DirectoryWalker::new(&mut *transport, &parser, &config)
        .plan_download("/w/", tmp.path())
        .await;

    let remotes: Vec<&str> = plan.tasks.iter().map(|t| t.remote_path.as_str()).collect();
    assert_eq!(remotes, vec!["/w/", "/w/subdir/", "/w/subdir/inner"]);
}
