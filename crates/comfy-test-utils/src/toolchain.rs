//! [`FakeToolchain`]: POSIX shell stand-ins for `uv`, `git` and `python`.
//!
//! Every invocation is appended to a call log. Installs of `name==version`
//! specs are recorded in a state file that `pip list` / `pip freeze` report
//! back, so install-then-validate flows behave consistently. Any call whose
//! argument line contains a registered failure pattern exits 1.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

const PRELUDE: &str = r#"#!/bin/sh
fail_check() {
  while IFS= read -r pattern; do
    [ -n "$pattern" ] || continue
    case "$*" in
      *"$pattern"*) echo "fake failure: $pattern" >&2; exit 1 ;;
    esac
  done < "@FAIL@"
}
record() {
  skip=0
  for a; do
    if [ "$skip" = 1 ]; then skip=0; continue; fi
    case "$a" in
      --python|--index-url|-r) skip=1 ;;
      -*) ;;
      *==*) echo "$a" >> "@STATE@" ;;
    esac
  done
}
list() {
  printf '['
  first=1
  while IFS= read -r line; do
    [ -n "$line" ] || continue
    [ "$first" = 1 ] || printf ', '
    first=0
    printf '{"name": "%s", "version": "%s"}' "${line%%==*}" "${line#*==}"
  done < "@STATE@"
  printf ']\n'
}
"#;

const UV: &str = r#"echo "uv $*" >> "@LOG@"
fail_check "$@"
case "$1" in
  --version) echo "uv 0.5.0 (fake)" ;;
  venv)
    for a; do venv="$a"; done
    mkdir -p "$venv/bin"
    cp "@BIN@/python" "$venv/bin/python"
    ;;
  pip)
    case "$2" in
      install) shift 2; record "$@" ;;
      list) list ;;
      freeze) cat "@STATE@" "@FREEZE@" ;;
    esac
    ;;
esac
exit 0
"#;

const GIT: &str = r#"echo "git $*" >> "@LOG@"
fail_check "$@"
case "$1" in
  --version) echo "git version 2.43.0 (fake)" ;;
  clone)
    url=""
    dest=""
    for a; do url="$dest"; dest="$a"; done
    mkdir -p "$dest"
    echo "cloned from $url" > "$dest/README.md"
    name=$(basename "$url" .git)
    if [ -d "@CLONES@/$name" ]; then cp -R "@CLONES@/$name/." "$dest/"; fi
    ;;
  -C)
    case "$3" in
      rev-parse) echo "0000000000000000000000000000000000000000" ;;
    esac
    ;;
esac
exit 0
"#;

const PYTHON: &str = r#"echo "python $*" >> "@LOG@"
fail_check "$@"
case "$1" in
  --version) echo "Python @PYVER@" ;;
  -c)
    v=$(sed -n 's/^torch==//p' "@STATE@" | head -n 1)
    if [ -n "$v" ]; then echo "$v"; exit 0; fi
    echo "ModuleNotFoundError: No module named 'torch'" >&2
    exit 1
    ;;
  -m)
    if [ "$2" = pip ]; then
      case "$3" in
        list) list ;;
        freeze) cat "@STATE@" "@FREEZE@" ;;
        install) shift 3; record "$@" ;;
      esac
    fi
    ;;
esac
exit 0
"#;

/// A directory of fake executables plus their shared state.
pub struct FakeToolchain {
    dir: TempDir,
}

impl Default for FakeToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeToolchain {
    /// Toolchain whose interpreter reports Python 3.11.5.
    pub fn new() -> Self {
        Self::with_python_version("3.11.5")
    }

    pub fn with_python_version(version: &str) -> Self {
        let toolchain = Self {
            dir: TempDir::new().unwrap(),
        };
        fs::create_dir_all(toolchain.bin()).unwrap();
        fs::create_dir_all(toolchain.clones()).unwrap();
        for file in ["calls.log", "state.txt", "fail.txt", "freeze.txt"] {
            fs::write(toolchain.dir.path().join(file), "").unwrap();
        }
        toolchain.install_script("uv", UV, version);
        toolchain.install_script("git", GIT, version);
        toolchain.install_script("python", PYTHON, version);
        toolchain
    }

    fn install_script(&self, name: &str, body: &str, python_version: &str) {
        let root = self.dir.path();
        let script = format!("{PRELUDE}{body}")
            .replace("@LOG@", &root.join("calls.log").display().to_string())
            .replace("@STATE@", &root.join("state.txt").display().to_string())
            .replace("@FAIL@", &root.join("fail.txt").display().to_string())
            .replace("@FREEZE@", &root.join("freeze.txt").display().to_string())
            .replace("@CLONES@", &self.clones().display().to_string())
            .replace("@BIN@", &self.bin().display().to_string())
            .replace("@PYVER@", python_version);
        let path = self.bin().join(name);
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    pub fn bin(&self) -> PathBuf {
        self.dir.path().join("bin")
    }

    pub fn uv(&self) -> PathBuf {
        self.bin().join("uv")
    }

    pub fn git(&self) -> PathBuf {
        self.bin().join("git")
    }

    /// The interpreter outside any venv (also copied into venvs by `uv venv`).
    pub fn python(&self) -> PathBuf {
        self.bin().join("python")
    }

    fn clones(&self) -> PathBuf {
        self.dir.path().join("clones")
    }

    /// Directory whose contents `git clone` copies for URLs ending in
    /// `<repo_name>(.git)`.
    pub fn clone_source(&self, repo_name: &str) -> PathBuf {
        let dir = self.clones().join(repo_name);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Make any call whose arguments contain `pattern` fail.
    pub fn fail_on(&self, pattern: &str) -> &Self {
        append(&self.dir.path().join("fail.txt"), pattern);
        self
    }

    /// Pretend `name==version` is already installed.
    pub fn preinstall(&self, name: &str, version: &str) -> &Self {
        append(&self.dir.path().join("state.txt"), &format!("{name}=={version}"));
        self
    }

    /// Extra line reported by `pip freeze` (VCS or editable entries).
    pub fn freeze_line(&self, line: &str) -> &Self {
        append(&self.dir.path().join("freeze.txt"), line);
        self
    }

    /// Every recorded call, as `"<tool> <args...>"`.
    pub fn calls(&self) -> Vec<String> {
        read_lines(&self.dir.path().join("calls.log"))
    }

    /// Recorded calls of one tool, without the tool prefix.
    pub fn calls_to(&self, tool: &str) -> Vec<String> {
        let prefix = format!("{tool} ");
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// `name==version` lines currently "installed".
    pub fn installed(&self) -> Vec<String> {
        read_lines(&self.dir.path().join("state.txt"))
    }
}

fn append(path: &Path, line: &str) {
    let mut content = fs::read_to_string(path).unwrap_or_default();
    content.push_str(line);
    content.push('\n');
    fs::write(path, content).unwrap();
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
