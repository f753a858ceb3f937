//! Integration tests for Rebundle

mod fake_bundler;

mod incremental_tests {
    use crate::fake_bundler::RequireBundler;
    use futures_util::StreamExt;
    use rebundle::{
        BundleOptions, BundlerError, ByteStream, CacheEvent, EventReceiver, IncrementalBundler,
        ModuleId,
    };
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    /// a.js requires b.js requires c.js
    fn project() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "require(\"./b\");\nconsole.log('a');\n").unwrap();
        fs::write(dir.path().join("b.js"), "require(\"./c\");\nmodule.exports = 'b';\n").unwrap();
        fs::write(dir.path().join("c.js"), "module.exports = 'c';\n").unwrap();
        let entry = dir.path().join("a.js");
        (dir, entry)
    }

    fn mtime(path: &Path) -> SystemTime {
        fs::metadata(path).unwrap().modified().unwrap()
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    async fn build(entry: &Path) -> IncrementalBundler<RequireBundler> {
        let incremental = IncrementalBundler::builder(RequireBundler::default())
            .build()
            .await;
        incremental.add_entry_file(entry);
        incremental
    }

    async fn bundle_bytes(stream: ByteStream) -> Result<Vec<u8>, BundlerError> {
        let mut out = Vec::new();
        let mut stream = stream;
        while let Some(chunk) = stream.next().await {
            out.extend(chunk?);
        }
        Ok(out)
    }

    fn invalidated(rx: &mut EventReceiver) -> Vec<Vec<ModuleId>> {
        let mut updates = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let CacheEvent::Update(ids) = event {
                updates.push(ids);
            }
        }
        updates
    }

    #[tokio::test]
    async fn cold_start_walks_every_module() {
        let (_dir, entry) = project();
        let incremental = build(&entry).await;
        let mut rx = incremental.subscribe();

        let bundle = bundle_bytes(incremental.bundle(BundleOptions::default()).await)
            .await
            .unwrap();
        let text = String::from_utf8(bundle).unwrap();

        assert_eq!(invalidated(&mut rx), vec![Vec::<ModuleId>::new()]);
        assert!(text.contains("'a'") && text.contains("'b'") && text.contains("'c'"));
        assert_eq!(incremental.bundler().reads(), 3);
        assert_eq!(incremental.snapshot().await.dependency_cache.len(), 3);
    }

    #[tokio::test]
    async fn unchanged_files_rebuild_from_cache() {
        let (_dir, entry) = project();
        let incremental = build(&entry).await;

        let first = bundle_bytes(incremental.bundle(BundleOptions::default()).await)
            .await
            .unwrap();
        let mut rx = incremental.subscribe();
        let second = bundle_bytes(incremental.bundle(BundleOptions::default()).await)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(invalidated(&mut rx), vec![Vec::<ModuleId>::new()]);
        assert_eq!(incremental.bundler().reads(), 3);
    }

    #[tokio::test]
    async fn touching_one_file_invalidates_only_it() {
        let (dir, entry) = project();
        let incremental = build(&entry).await;
        bundle_bytes(incremental.bundle(BundleOptions::default()).await)
            .await
            .unwrap();

        let c = dir.path().join("c.js");
        fs::write(&c, "module.exports = 'c2';\n").unwrap();
        set_mtime(&c, SystemTime::now() + Duration::from_secs(10));

        let mut rx = incremental.subscribe();
        let bundle = bundle_bytes(incremental.bundle(BundleOptions::default()).await)
            .await
            .unwrap();

        assert_eq!(invalidated(&mut rx), vec![vec![ModuleId::from_path(&c)]]);
        assert!(String::from_utf8(bundle).unwrap().contains("'c2'"));
        assert_eq!(incremental.bundler().reads(), 4);
    }

    #[tokio::test]
    async fn equal_mtime_counts_as_fresh() {
        let (dir, entry) = project();
        let incremental = build(&entry).await;
        bundle_bytes(incremental.bundle(BundleOptions::default()).await)
            .await
            .unwrap();

        let b = dir.path().join("b.js");
        let recorded = mtime(&b);
        fs::write(&b, "require(\"./c\");\nmodule.exports = 'B';\n").unwrap();
        set_mtime(&b, recorded);

        let mut rx = incremental.subscribe();
        let bundle = bundle_bytes(incremental.bundle(BundleOptions::default()).await)
            .await
            .unwrap();

        assert_eq!(invalidated(&mut rx), vec![Vec::<ModuleId>::new()]);
        assert!(String::from_utf8(bundle).unwrap().contains("'b'"));
    }

    #[tokio::test]
    async fn cache_file_carries_state_across_instances() {
        let (dir, entry) = project();
        let cache_file = dir.path().join(".rebundle-cache.json");

        let first = IncrementalBundler::builder(RequireBundler::default())
            .cache_file(&cache_file)
            .build()
            .await;
        first.add_entry_file(&entry);
        let mut rx = first.subscribe();
        let expected = bundle_bytes(first.bundle(BundleOptions::default()).await)
            .await
            .unwrap();

        let mut written = false;
        while let Ok(event) = rx.try_recv() {
            written |= event == CacheEvent::CacheFileWritten(cache_file.clone());
        }
        assert!(written);

        let second = IncrementalBundler::builder(RequireBundler::default())
            .cache_file(&cache_file)
            .build()
            .await;
        second.add_entry_file(&entry);
        let bundle = bundle_bytes(second.bundle(BundleOptions::default()).await)
            .await
            .unwrap();

        assert_eq!(bundle, expected);
        assert_eq!(second.bundler().reads(), 0);
    }

    #[tokio::test]
    async fn corrupted_cache_file_degrades_to_full_rebuild() {
        let (dir, entry) = project();
        let cache_file = dir.path().join(".rebundle-cache.json");
        fs::write(&cache_file, "definitely not json").unwrap();

        let builder =
            IncrementalBundler::builder(RequireBundler::default()).cache_file(&cache_file);
        let mut rx = builder.subscribe();
        let incremental = builder.build().await;
        incremental.add_entry_file(&entry);

        assert!(matches!(
            rx.try_recv().unwrap(),
            CacheEvent::CacheFileReadError { .. }
        ));

        bundle_bytes(incremental.bundle(BundleOptions::default()).await)
            .await
            .unwrap();
        assert_eq!(incremental.bundler().reads(), 3);
    }

    #[tokio::test]
    async fn unresolved_import_surfaces_in_stream() {
        let (dir, entry) = project();
        fs::write(dir.path().join("c.js"), "require(\"./missing\");\n").unwrap();
        let incremental = build(&entry).await;

        let chunks: Vec<_> = incremental
            .bundle(BundleOptions::default())
            .await
            .collect()
            .await;

        let errors: Vec<&BundlerError> = chunks.iter().filter_map(|c| c.as_ref().err()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].module,
            Some(ModuleId::from_path(dir.path().join("missing.js")))
        );
        assert_eq!(chunks.len(), 4);
        assert!(!incremental.is_bundling());
    }
}

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use tempfile::TempDir;

    fn rebundle(dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("rebundle");
        cmd.current_dir(dir.path())
            .env("REBUNDLE_CONFIG", dir.path().join("config.toml"))
            .arg("--no-local");
        cmd
    }

    /// Cache file recording `a.js` at its current mtime and `b.js` at epoch+1s
    fn write_cache(dir: &TempDir) -> std::path::PathBuf {
        let a = dir.path().join("a.js");
        let b = dir.path().join("b.js");
        fs::write(&a, "require(\"./b\");\n").unwrap();
        fs::write(&b, "module.exports = 1;\n").unwrap();

        let a_mtime = fs::metadata(&a)
            .unwrap()
            .modified()
            .unwrap()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        let b_file = fs::File::options().write(true).open(&b).unwrap();
        b_file
            .set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();

        let a_id = a.to_str().unwrap();
        let b_id = b.to_str().unwrap();
        let cache = serde_json::json!({
            "cache": {
                a_id: { "id": a_id, "source": "require(\"./b\");\n", "deps": { "./b": b_id }, "entry": true },
                b_id: { "id": b_id, "source": "module.exports = 1;\n" }
            },
            "mtimes": { a_id: a_mtime, b_id: 1000 }
        });

        let path = dir.path().join(".rebundle-cache.json");
        fs::write(&path, cache.to_string()).unwrap();
        path
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        rebundle(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Incremental rebuild cache"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        rebundle(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("rebundle"));
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        rebundle(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        rebundle(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn show_missing_cache() {
        let dir = TempDir::new().unwrap();
        rebundle(&dir)
            .args(["cache", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache file not found"));
    }

    #[test]
    fn show_lists_modules() {
        let dir = TempDir::new().unwrap();
        write_cache(&dir);
        rebundle(&dir)
            .args(["cache", "show", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("a.js").and(predicate::str::contains("b.js")));
    }

    #[test]
    fn check_reports_stale_module() {
        let dir = TempDir::new().unwrap();
        write_cache(&dir);
        rebundle(&dir)
            .args(["cache", "check"])
            .assert()
            .success()
            .stdout(predicate::str::contains("2 checked, 1 stale, 0 unreadable"));
    }

    #[test]
    fn check_write_prunes_cache_file() {
        let dir = TempDir::new().unwrap();
        let path = write_cache(&dir);
        rebundle(&dir)
            .args(["cache", "check", "--write"])
            .assert()
            .success();

        let cache: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(cache["cache"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn corrupt_cache_has_hint() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".rebundle-cache.json"), "[").unwrap();
        rebundle(&dir)
            .args(["cache", "check"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("rebundle cache clear"));
    }

    #[test]
    fn clear_removes_cache_file() {
        let dir = TempDir::new().unwrap();
        let path = write_cache(&dir);
        rebundle(&dir)
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed"));
        assert!(!path.exists());
    }
}
