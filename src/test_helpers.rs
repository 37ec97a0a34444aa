//! Common test helper functions shared across test modules.
//!
//! [`TestRepo`] builds a scratch working repository with a committed
//! `pyproject.toml`, wired to a bare repository on disk acting as the
//! `origin` remote.
use git2::Oid;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

use crate::{config::GitConfig, repo::Repository};

pub const TEST_USER: &str = "Test User";
pub const TEST_EMAIL: &str = "test@example.com";

/// Minimal PEP 621 manifest at `version`.
pub fn pyproject(version: &str) -> String {
    format!(
        r#"[build-system]
requires = ["hatchling"]
build-backend = "hatchling.build"

[project]
name = "wizelit-sdk"
version = "{version}"
requires-python = ">=3.10"
"#
    )
}

/// Write `content` to `name` in `workdir` and commit it on HEAD.
pub fn commit_file(workdir: &Path, name: &str, content: &str, msg: &str) -> Oid {
    let repo = git2::Repository::open(workdir).unwrap();
    let file_path = workdir.join(name);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&file_path, content).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(name)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = git2::Signature::now(TEST_USER, TEST_EMAIL).unwrap();

    let parents = match repo.head() {
        Ok(head) => vec![head.peel_to_commit().unwrap()],
        Err(_) => vec![],
    };
    let parent_refs = parents.iter().collect::<Vec<_>>();

    repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &parent_refs)
        .unwrap()
}

fn configure_user(repo: &git2::Repository) {
    let mut config = repo.config().unwrap();
    config.set_str("user.name", TEST_USER).unwrap();
    config.set_str("user.email", TEST_EMAIL).unwrap();
}

/// Scratch repository with a bare remote.
pub struct TestRepo {
    dir: TempDir,
    workdir: PathBuf,
    remote_dir: PathBuf,
    repo: git2::Repository,
}

impl TestRepo {
    /// Working repository whose manifest is at `version`, with that initial
    /// commit already pushed to `origin`.
    pub fn new(version: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let workdir = dir.path().join("work");
        let remote_dir = dir.path().join("remote.git");

        let remote = git2::Repository::init_bare(&remote_dir).unwrap();
        let repo = git2::Repository::init(&workdir).unwrap();
        configure_user(&repo);

        commit_file(&workdir, "pyproject.toml", &pyproject(version), "init");

        let branch = repo.head().unwrap().shorthand().unwrap().to_string();
        remote.set_head(&format!("refs/heads/{branch}")).unwrap();

        {
            let mut origin = repo
                .remote("origin", remote_dir.to_str().unwrap())
                .unwrap();
            origin
                .push(
                    &[format!("refs/heads/{branch}:refs/heads/{branch}")],
                    None,
                )
                .unwrap();
        }

        Self {
            dir,
            workdir,
            remote_dir,
            repo,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Raw git2 handle on the working repository.
    pub fn git(&self) -> &git2::Repository {
        &self.repo
    }

    /// Raw git2 handle on the bare remote.
    pub fn remote(&self) -> git2::Repository {
        git2::Repository::open_bare(&self.remote_dir).unwrap()
    }

    /// Open the working repository the way the tool does.
    pub fn open(&self) -> Repository {
        Repository::open(&self.workdir, &GitConfig::default()).unwrap()
    }

    pub fn branch(&self) -> String {
        self.repo.head().unwrap().shorthand().unwrap().to_string()
    }

    pub fn head(&self) -> Oid {
        self.repo.head().unwrap().peel_to_commit().unwrap().id()
    }

    pub fn commit_count(&self) -> usize {
        let mut walk = self.repo.revwalk().unwrap();
        walk.push_head().unwrap();
        walk.count()
    }

    pub fn tag_names(&self) -> Vec<String> {
        let names = self.repo.tag_names(None).unwrap();
        names.iter().flatten().map(|n| n.to_string()).collect()
    }

    pub fn remote_has_ref(&self, refname: &str) -> bool {
        self.remote().find_reference(refname).is_ok()
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.workdir.join(name)).unwrap()
    }

    /// Push a commit to the remote from a second clone, so the working
    /// repository falls behind.
    pub fn advance_remote(&self, msg: &str) -> Oid {
        let other_dir = self.dir.path().join("other");
        let other = git2::Repository::clone(
            self.remote_dir.to_str().unwrap(),
            &other_dir,
        )
        .unwrap();
        configure_user(&other);

        let oid = commit_file(&other_dir, "remote.txt", msg, msg);

        let branch = self.branch();
        let mut origin = other.find_remote("origin").unwrap();
        origin
            .push(&[format!("refs/heads/{branch}:refs/heads/{branch}")], None)
            .unwrap();

        oid
    }
}
