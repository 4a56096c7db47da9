//! Git repository fixtures built with `git2`.
//!
//! No `git` executable or user config is needed; the signature is fixed.

use std::path::Path;

use git2::{IndexAddOption, Repository, Signature};

/// Initialise `path` as a repository, optionally add an `origin` remote, and
/// commit everything already in the directory. Returns the repository and
/// the commit hash.
///
/// # Panics
/// Panics if any git operation fails.
pub fn repo_with_commit(path: &Path, origin: Option<&str>) -> (Repository, String) {
    let repo = Repository::init(path)
        .unwrap_or_else(|e| panic!("repo_with_commit: init {} failed: {e}", path.display()));
    if let Some(url) = origin {
        repo.remote("origin", url)
            .unwrap_or_else(|e| panic!("repo_with_commit: adding origin failed: {e}"));
    }
    let commit = commit_all(&repo, "Initial commit");
    (repo, commit)
}

/// Stage every file in the work tree and commit on `HEAD`.
///
/// # Panics
/// Panics if any git operation fails.
pub fn commit_all(repo: &Repository, message: &str) -> String {
    let mut index = repo.index().expect("commit_all: index");
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .expect("commit_all: add_all");
    index.write().expect("commit_all: index write");
    let tree_id = index.write_tree().expect("commit_all: write_tree");
    let tree = repo.find_tree(tree_id).expect("commit_all: find_tree");
    let sig = Signature::now("Test User", "test@test.com").expect("commit_all: signature");

    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .expect("commit_all: commit")
        .to_string()
}

/// Put a lightweight tag on `HEAD`.
///
/// # Panics
/// Panics if `HEAD` cannot be resolved or the tag exists.
pub fn tag_head(repo: &Repository, name: &str) {
    let head = repo
        .head()
        .and_then(|h| h.peel_to_commit())
        .expect("tag_head: HEAD");
    repo.tag_lightweight(name, head.as_object(), false)
        .unwrap_or_else(|e| panic!("tag_head: tagging {name} failed: {e}"));
}
