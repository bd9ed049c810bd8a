//! Integration tests for watch mode with real engines and a real watcher.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use strata_bundler::{
    BaseOptions, Bundle, BundleConfig, BundleStatus, BundlerKind, EventSender, ScriptOptions,
};
use strata_cli::commands::SharedBundle;
use strata_cli::watch::WatchSession;
use tempfile::TempDir;

fn project() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(
        root.join("src/main.js"),
        "import './util.js';\nconsole.log('main');\n",
    )
    .unwrap();
    fs::write(root.join("src/util.js"), "console.log('util v1');\n").unwrap();
    fs::write(root.join("src/other.js"), "console.log('other');\n").unwrap();
    (temp, root)
}

async fn script_bundle(root: &Path, input: &str, output: &str) -> SharedBundle {
    let mut options = BaseOptions::file(input, output).with_root(root);
    options.map = false;
    let mut bundle = Bundle::new(BundlerKind::Script, EventSender::noop());
    bundle
        .setup(BundleConfig::Script(ScriptOptions::new(options)))
        .unwrap();
    bundle.build(&[]).await.unwrap();
    bundle.write().await.unwrap();
    Arc::new(tokio::sync::Mutex::new(bundle))
}

async fn wait_for(path: &Path, needle: &str) -> bool {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if fs::read_to_string(path).is_ok_and(|s| s.contains(needle)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn test_dependency_change_rewrites_output() {
    let (_temp, root) = project();
    let session = WatchSession::attach(&root, &["dist".to_string()]).unwrap();

    let main = script_bundle(&root, "src/main.js", "dist/main.js").await;
    let other = script_bundle(&root, "src/other.js", "dist/other.js").await;
    let other_before = fs::metadata(root.join("dist/other.js"))
        .unwrap()
        .modified()
        .unwrap();

    let active = session
        .start(&[main.clone(), other], Duration::from_millis(50))
        .await;

    fs::write(root.join("src/util.js"), "console.log('util v2');\n").unwrap();
    assert!(wait_for(&root.join("dist/main.js"), "util v2").await);

    active.shutdown().await;
    let other_after = fs::metadata(root.join("dist/other.js"))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(other_before, other_after);
}

#[tokio::test]
async fn test_new_import_is_tracked_after_rebuild() {
    let (_temp, root) = project();
    let session = WatchSession::attach(&root, &["dist".to_string()]).unwrap();
    let index = Arc::clone(session.index());

    let main = script_bundle(&root, "src/main.js", "dist/main.js").await;
    let active = session
        .start(&[main.clone()], Duration::from_millis(50))
        .await;
    assert!(!index.contains(&root.join("src/extra.js")));

    fs::write(root.join("src/extra.js"), "console.log('extra v1');\n").unwrap();
    fs::write(
        root.join("src/main.js"),
        "import './util.js';\nimport './extra.js';\nconsole.log('main');\n",
    )
    .unwrap();
    assert!(wait_for(&root.join("dist/main.js"), "extra v1").await);
    active.scheduler().wait_idle().await;
    assert!(index.contains(&root.join("src/extra.js")));

    fs::write(root.join("src/extra.js"), "console.log('extra v2');\n").unwrap();
    assert!(wait_for(&root.join("dist/main.js"), "extra v2").await);

    active.shutdown().await;
}

#[tokio::test]
async fn test_failed_rebuild_recovers_on_fix() {
    let (_temp, root) = project();
    let session = WatchSession::attach(&root, &["dist".to_string()]).unwrap();

    let main = script_bundle(&root, "src/main.js", "dist/main.js").await;
    let active = session
        .start(&[main.clone()], Duration::from_millis(50))
        .await;

    fs::write(
        root.join("src/main.js"),
        "import './util.js';\nimport './missing.js';\nconsole.log('main');\n",
    )
    .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    active.scheduler().wait_idle().await;
    let written = fs::read_to_string(root.join("dist/main.js")).unwrap();
    assert!(written.contains("util v1"));

    fs::write(
        root.join("src/main.js"),
        "import './util.js';\nconsole.log('main fixed');\n",
    )
    .unwrap();
    assert!(wait_for(&root.join("dist/main.js"), "main fixed").await);

    active.shutdown().await;
    assert!(main.lock().await.files().contains(&root.join("src/util.js")));
}

#[tokio::test]
async fn test_dropped_and_failed_imports_match_full_build() {
    let (_temp, root) = project();
    let session = WatchSession::attach(&root, &["dist".to_string()]).unwrap();

    let main = script_bundle(&root, "src/main.js", "dist/main.js").await;
    let active = session
        .start(&[main.clone()], Duration::from_millis(50))
        .await;

    fs::write(root.join("src/main.js"), "console.log('main alone');\n").unwrap();
    assert!(wait_for(&root.join("dist/main.js"), "main alone").await);
    active.scheduler().wait_idle().await;

    fs::write(root.join("src/util.js"), "console.log('util v3');\n").unwrap();
    fs::write(root.join("src/late.js"), "import './nowhere.js';\n").unwrap();
    fs::write(
        root.join("src/main.js"),
        "import './util.js';\nimport './late.js';\nconsole.log('main');\n",
    )
    .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    active.scheduler().wait_idle().await;
    assert_eq!(main.lock().await.status(), BundleStatus::Error);

    fs::write(root.join("src/late.js"), "console.log('late fixed');\n").unwrap();
    fs::write(
        root.join("src/main.js"),
        "import './util.js';\nimport './late.js';\nconsole.log('main again');\n",
    )
    .unwrap();
    assert!(wait_for(&root.join("dist/main.js"), "main again").await);
    active.shutdown().await;

    let written = fs::read_to_string(root.join("dist/main.js")).unwrap();
    assert!(written.contains("util v3"));
    assert!(written.contains("late fixed"));
}
