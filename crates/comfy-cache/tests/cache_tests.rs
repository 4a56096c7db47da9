//! NodeCache behaviour: integrity, accounting, clearing, concurrency.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use comfy_cache::{Error, NodeCache, generate_cache_key};
use comfy_fs::LockMode;
use comfy_manifest::{CustomNodeSpec, InstallMethod};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn node_tree(root: &Path) {
    fs::create_dir_all(root.join("nodes")).unwrap();
    fs::write(root.join("__init__.py"), "NODE_CLASS_MAPPINGS = {}\n").unwrap();
    fs::write(root.join("nodes/sampler.py"), "def sample(): pass\n").unwrap();
    fs::write(root.join("requirements.txt"), "numpy>=1.25\n").unwrap();
}

fn git_spec(name: &str) -> CustomNodeSpec {
    CustomNodeSpec::git(
        name,
        format!("https://github.com/o/{name}.git"),
        Some("0123abc".to_string()),
    )
}

#[test]
fn integrity_holds_after_caching_and_breaks_after_byte_edit() {
    let root = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    node_tree(src.path());

    let cache = NodeCache::new(root.path());
    let info = cache
        .cache_node(&git_spec("Foo"), src.path(), None, serde_json::Value::Null)
        .unwrap();
    assert!(info.content_hash.starts_with("sha256:"));
    assert!(cache.verify_cache_integrity(&info.cache_key).unwrap());

    let cached = root
        .path()
        .join("nodes")
        .join(&info.cache_key)
        .join("content/nodes/sampler.py");
    let mut bytes = fs::read(&cached).unwrap();
    bytes[0] ^= 0x01;
    fs::write(&cached, bytes).unwrap();

    assert!(!cache.verify_cache_integrity(&info.cache_key).unwrap());
    let report = cache.verify_all().unwrap();
    assert_eq!(report.len(), 1);
    assert!(!report[0].1);
}

#[test]
fn unknown_key_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    let cache = NodeCache::new(root.path());
    assert!(matches!(
        cache.verify_cache_integrity("0000000000000000"),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn hits_are_counted_and_copied() {
    let root = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    node_tree(src.path());

    let cache = NodeCache::new(root.path());
    let spec = git_spec("Foo");
    assert_eq!(cache.get_cached_path(&spec).unwrap(), None);
    cache
        .cache_node(&spec, src.path(), None, serde_json::json!({"commit": "0123abc"}))
        .unwrap();

    let target = dest.path().join("Foo");
    fs::create_dir_all(&target).unwrap();
    fs::write(target.join("stale.txt"), "old").unwrap();
    assert!(cache.copy_from_cache(&spec, &target).unwrap());
    assert!(target.join("nodes/sampler.py").is_file());
    assert!(!target.join("stale.txt").exists());

    cache.get_cached_path(&spec).unwrap().unwrap();
    let listed = cache.list_cached_nodes().unwrap();
    assert_eq!(listed[0].access_count, 2);
    assert_eq!(listed[0].source_info["commit"], "0123abc");

    let stats = cache.stats().unwrap();
    assert_eq!(stats.total_nodes, 1);
    assert_eq!(stats.total_accesses, 2);
    assert_eq!(stats.by_method.get("git"), Some(&1));
    assert!(stats.total_size_bytes > 0);
}

#[test]
fn archive_layout_is_flattened_on_copy() {
    let root = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    node_tree(&src.path().join("ComfyUI-Foo-2.0.1"));

    let cache = NodeCache::new(root.path());
    let spec = CustomNodeSpec::archive("ComfyUI-Foo", "https://example.com/foo-2.0.1.zip");
    cache
        .cache_node(&spec, src.path(), None, serde_json::Value::Null)
        .unwrap();

    let target = dest.path().join("ComfyUI-Foo");
    assert!(cache.copy_from_cache(&spec, &target).unwrap());
    assert!(target.join("__init__.py").is_file());
}

#[test]
fn clear_by_name_leaves_other_entries() {
    let root = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    node_tree(src.path());

    let cache = NodeCache::new(root.path());
    for name in ["Foo", "Bar"] {
        cache
            .cache_node(&git_spec(name), src.path(), None, serde_json::Value::Null)
            .unwrap();
    }
    let archive_foo = CustomNodeSpec::archive("Foo", "https://example.com/foo.zip");
    cache
        .cache_node(&archive_foo, src.path(), None, serde_json::Value::Null)
        .unwrap();

    assert_eq!(cache.clear_cache(Some("Foo")).unwrap(), 2);
    let names: Vec<String> = cache
        .list_cached_nodes()
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(names, vec!["Bar"]);
    assert_eq!(cache.get_cached_path(&git_spec("Foo")).unwrap(), None);

    assert_eq!(cache.clear_cache(None).unwrap(), 1);
    assert!(cache.list_cached_nodes().unwrap().is_empty());
}

#[test]
fn concurrent_writers_keep_the_index_consistent() {
    let root = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    node_tree(src.path());

    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            let root = root.path().to_path_buf();
            let src = src.path().to_path_buf();
            thread::spawn(move || {
                let cache = NodeCache::new(root).with_lock_mode(LockMode::Blocking);
                barrier.wait();
                cache
                    .cache_node(&git_spec(&format!("Node{i}")), &src, None, serde_json::Value::Null)
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let cache = NodeCache::new(root.path());
    let listed = cache.list_cached_nodes().unwrap();
    assert_eq!(listed.len(), threads);
    for info in listed {
        assert!(cache.verify_cache_integrity(&info.cache_key).unwrap());
    }
}

#[test]
fn same_key_writers_in_one_process_do_not_collide() {
    let root = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    node_tree(src.path());
    let spec = git_spec("Shared");
    let cache = NodeCache::new(root.path()).with_lock_mode(LockMode::Blocking);

    for _ in 0..5 {
        let threads = 6;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let cache = cache.clone();
                let spec = spec.clone();
                let src = src.path().to_path_buf();
                thread::spawn(move || {
                    barrier.wait();
                    cache.cache_node(&spec, &src, None, serde_json::Value::Null)
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
    }

    let listed = cache.list_cached_nodes().unwrap();
    assert_eq!(listed.len(), 1);
    assert!(cache.verify_cache_integrity(&listed[0].cache_key).unwrap());

    let leftovers: Vec<_> = fs::read_dir(root.path().join("nodes"))
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with('.'))
        .collect();
    assert!(leftovers.is_empty(), "staging directories left behind: {leftovers:?}");
}

fn method() -> impl Strategy<Value = InstallMethod> {
    prop_oneof![
        Just(InstallMethod::Archive),
        Just(InstallMethod::Git),
        Just(InstallMethod::Local),
    ]
}

proptest! {
    #[test]
    fn cache_key_is_deterministic(url in "https://[a-z]{1,12}\\.com/[a-z/]{0,20}", m in method(), r in proptest::option::of("[0-9a-f]{7,40}")) {
        let a = generate_cache_key(&url, m, r.as_deref());
        let b = generate_cache_key(&url, m, r.as_deref());
        prop_assert_eq!(a.len(), 16);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn distinct_triples_get_distinct_keys(
        triples in proptest::collection::hash_set(
            ("https://[a-z]{1,8}\\.com/[a-z]{1,8}", method(), proptest::option::of("[0-9a-f]{1,12}")),
            1..40,
        )
    ) {
        let mut seen = HashMap::new();
        for (url, m, r) in &triples {
            // `None` and `Some("")` are the same descriptor
            let normalized = (url.clone(), *m, r.clone().unwrap_or_default());
            let key = generate_cache_key(url, *m, r.as_deref());
            if let Some(previous) = seen.insert(key.clone(), normalized.clone()) {
                prop_assert_eq!(previous, normalized, "collision on {}", key);
            }
        }
    }
}
