//! Drives UvTool against a shell-script stand-in that records its argv.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use comfy_tools::{Error, InstallOptions, PackageManager, UvTool};
use pretty_assertions::assert_eq;

fn fake_uv(dir: &Path) -> (PathBuf, PathBuf) {
    let log = dir.join("uv.log");
    let script = dir.join("uv");
    let body = format!(
        r#"#!/bin/sh
echo "$UV_CACHE_DIR|$*" >> "{log}"
case "$*" in
  *"pip list"*) echo '[{{"name": "numpy", "version": "1.26.0"}}]' ;;
  *"pip freeze"*) printf 'numpy==1.26.0\nclip @ git+https://github.com/openai/CLIP.git\n' ;;
  *"does-not-exist"*) echo "No solution found" >&2; exit 1 ;;
esac
exit 0
"#,
        log = log.display()
    );
    fs::write(&script, body).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    (script, log)
}

fn logged(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn install_passes_index_prerelease_and_cache_dir() {
    let dir = tempfile::tempdir().unwrap();
    let (bin, log) = fake_uv(dir.path());
    let uv = UvTool::new(&bin).with_cache_dir("/cache/uv");

    let options = InstallOptions::default()
        .with_index_url("https://download.pytorch.org/whl/cu121")
        .with_prerelease(true);
    uv.install(Path::new("/t/py"), &["torch==2.1.0".to_string()], &options)
        .await
        .unwrap();

    assert_eq!(
        logged(&log),
        vec![
            "/cache/uv|pip install --python /t/py --index-url https://download.pytorch.org/whl/cu121 --prerelease=allow torch==2.1.0"
        ]
    );
}

#[tokio::test]
async fn list_and_freeze_are_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let (bin, _log) = fake_uv(dir.path());
    let uv = UvTool::new(&bin);

    let listed = uv.list_installed(Path::new("/t/py")).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "numpy");

    let frozen = uv.freeze(Path::new("/t/py")).await.unwrap();
    assert_eq!(frozen.len(), 2);
    assert!(frozen[1].starts_with("clip @ git+"));
}

#[tokio::test]
async fn failed_install_carries_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let (bin, _log) = fake_uv(dir.path());
    let uv = UvTool::new(&bin);

    let err = uv
        .install(
            Path::new("/t/py"),
            &["does-not-exist==9.9".to_string()],
            &InstallOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CommandFailed { ref stderr, .. } if stderr.contains("No solution")));
}

#[tokio::test]
async fn venv_forwards_python_request() {
    let dir = tempfile::tempdir().unwrap();
    let (bin, log) = fake_uv(dir.path());
    let uv = UvTool::new(&bin);

    uv.venv(Path::new("/t/.venv"), "3.11.5").await.unwrap();
    let lines = logged(&log);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("|venv --python 3.11.5 /t/.venv"), "{}", lines[0]);
}
