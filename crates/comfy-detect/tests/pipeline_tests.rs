//! End-to-end detection against a fake interpreter and a local metadata
//! server standing in for the registry and GitHub.
#![cfg(unix)]

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use comfy_detect::{DetectConfig, Detector, InstallPriority};
use comfy_manifest::{InstallMethod, MigrationManifest};
use comfy_remote::{RemoteConfig, RetryPolicy};
use comfy_test_utils::git::repo_with_commit;
use comfy_test_utils::toolchain::FakeToolchain;
use comfy_test_utils::tree::ComfyTree;
use comfy_tools::PipTool;
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves fixed JSON bodies by request path; anything else is a 404.
async fn metadata_server(routes: Vec<(&str, &str)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let routes: Arc<HashMap<String, String>> = Arc::new(
        routes
            .into_iter()
            .map(|(p, b)| (p.to_string(), b.to_string()))
            .collect(),
    );
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let request = String::from_utf8_lossy(&buf);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = match routes.get(&path) {
                    Some(body) => (200, body.clone()),
                    None => (404, "{}".to_string()),
                };
                let response = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    base
}

fn config(tc: &FakeToolchain, base: Option<&str>) -> DetectConfig {
    let mut remote = RemoteConfig {
        min_interval: Duration::ZERO,
        retry: RetryPolicy::none(),
        ..RemoteConfig::default()
    };
    if let Some(base) = base {
        remote.registry_url = base.to_string();
        remote.github_api_url = base.to_string();
    }
    DetectConfig {
        python: Some(tc.python()),
        validate_registry: base.is_some(),
        nvidia_smi: tc.bin().join("nvidia-smi"),
        remote,
        ..DetectConfig::default()
    }
}

#[tokio::test]
async fn captures_conflicts_pytorch_and_vcs_packages() {
    let tree = ComfyTree::new();
    tree.requirements("torch\nnumpy\n").app_version("0.3.9");
    tree.node_with_requirements("NodeA", "numpy==1.24.0\n");
    tree.node_with_requirements("NodeB", "numpy>=1.25.0\npillow\n");

    let tc = FakeToolchain::new();
    tc.preinstall("numpy", "1.23.0")
        .preinstall("torch", "2.1.0+cu121")
        .preinstall("pillow", "10.2.0")
        .freeze_line("clip @ git+https://github.com/openai/CLIP.git");

    let detector = Detector::new(config(&tc, None), Box::new(PipTool::new()));
    let report = detector.run(&tree.app()).await.unwrap();
    let manifest = &report.manifest;

    assert_eq!(manifest.system_info.python_version, "3.11.5");
    assert_eq!(manifest.system_info.torch_version.as_deref(), Some("2.1.0+cu121"));
    assert_eq!(manifest.system_info.comfyui_version.as_deref(), Some("0.3.9"));
    assert_eq!(manifest.system_info.cuda_version, None);

    let deps = &manifest.dependencies;
    assert_eq!(deps.packages.get("numpy").map(String::as_str), Some("1.23.0"));
    assert_eq!(deps.packages.get("pillow").map(String::as_str), Some("10.2.0"));
    assert!(!deps.packages.contains_key("torch"));
    let pytorch = deps.pytorch.as_ref().unwrap();
    assert_eq!(pytorch.index_url, "https://download.pytorch.org/whl/cu121");
    assert_eq!(deps.git_requirements, vec!["clip @ git+https://github.com/openai/CLIP.git"]);

    let violating_lower_bound: Vec<_> = report
        .conflicts
        .iter()
        .filter(|c| c.package == "numpy" && c.required == ">=1.25.0")
        .collect();
    assert_eq!(violating_lower_bound.len(), 1);
    assert_eq!(violating_lower_bound[0].resolved_to, "1.23.0");

    let names: Vec<_> = manifest.custom_nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["NodeA", "NodeB"]);
    assert!(manifest
        .custom_nodes
        .iter()
        .all(|n| n.install_method == InstallMethod::Local));

    let out = tempfile::tempdir().unwrap();
    let paths = report.write_outputs(out.path()).unwrap();
    assert_eq!(&MigrationManifest::load(&paths.manifest).unwrap(), manifest);
    let requirements = fs::read_to_string(&paths.requirements).unwrap();
    assert!(requirements.starts_with("--extra-index-url https://download.pytorch.org/whl/cu121\n"));
    assert!(requirements.contains("numpy==1.23.0\n"));
    let log: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&paths.log).unwrap()).unwrap();
    assert!(log["installed_packages"]["torch"].is_string());
    assert_eq!(log["extensions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn validation_selects_registry_archive_and_pins_git_commit() {
    let base = metadata_server(vec![
        (
            "/nodes/comfyui-bar",
            r#"{"id": "comfyui-bar", "latest_version": {"version": "2.0.0"}}"#,
        ),
        (
            "/nodes/comfyui-bar/versions?page=1&limit=100",
            r#"[{"version": "2.0.0", "downloadUrl": "https://cdn.example/bar-2.0.0.zip"}]"#,
        ),
        (
            "/repos/o/ComfyUI-Foo/releases?per_page=100&page=1",
            r#"[{"tag_name": "v1.4.0"}]"#,
        ),
        (
            "/repos/o/ComfyUI-Foo/tags?per_page=100&page=1",
            r#"[{"name": "v1.4.0", "commit": {"sha": "1111111111111111111111111111111111111111"}}]"#,
        ),
    ])
    .await;

    let tree = ComfyTree::new();
    tree.node_with_pyproject("ComfyUI-Bar", "comfyui-bar", "2.0.0", &[]);
    let foo = tree.node_with_pyproject("ComfyUI-Foo", "comfyui-foo", "1.4.2", &[]);
    let (_repo, head) = repo_with_commit(&foo, Some("https://github.com/o/ComfyUI-Foo.git"));
    tree.node("Plain");

    let tc = FakeToolchain::new();
    let detector = Detector::new(config(&tc, Some(&base)), Box::new(PipTool::new()));
    let report = detector.run(&tree.app()).await.unwrap();

    let by_name = |name: &str| {
        report
            .manifest
            .custom_nodes
            .iter()
            .find(|n| n.name == name)
            .unwrap()
            .clone()
    };

    let bar = by_name("ComfyUI-Bar");
    assert_eq!(bar.install_method, InstallMethod::Archive);
    assert_eq!(bar.url, "https://cdn.example/bar-2.0.0.zip");

    let foo = by_name("ComfyUI-Foo");
    assert_eq!(foo.install_method, InstallMethod::Git);
    assert_eq!(foo.url, "https://github.com/o/ComfyUI-Foo.git");
    assert_eq!(foo.git_ref.as_deref(), Some(head.as_str()));

    assert_eq!(by_name("Plain").install_method, InstallMethod::Local);

    let priorities: Vec<_> = report
        .extensions
        .iter()
        .map(|e| (e.name.as_str(), e.install_priority, e.priority_score))
        .collect();
    assert_eq!(
        priorities,
        vec![
            ("ComfyUI-Bar", InstallPriority::Registry, 100),
            ("ComfyUI-Foo", InstallPriority::Github, 70),
            ("Plain", InstallPriority::Local, 0),
        ]
    );
}

#[tokio::test]
async fn missing_application_is_an_error() {
    let tc = FakeToolchain::new();
    let detector = Detector::new(config(&tc, None), Box::new(PipTool::new()));
    let err = detector.run(std::path::Path::new("/definitely/not/here")).await.unwrap_err();
    assert!(matches!(err, comfy_detect::Error::AppNotFound { .. }));
}
