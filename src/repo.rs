//! Git repository operations backing the release workflow.
//!
//! This module wraps `git2::Repository` with the handful of operations a
//! release needs:
//!
//! - Working tree status (the dirty/clean gate)
//! - Tag lookup and listing
//! - Staging and committing the manifest bump
//! - Annotated tag creation at HEAD
//! - Pushing branches and tags without force
//! - Listing remote refs to confirm a tag was published
//!
//! # Authentication
//!
//! Network operations try, in order: an ssh-agent key when the remote
//! allows ssh, a token from the configured environment variable for HTTPS,
//! then the git credential helper. Local (path) remotes need none of these.
//!
//! # Usage
//!
//! ```rust,ignore
//! let repo = Repository::open(Path::new("."), &config.git)?;
//! repo.stage_path(Path::new("pyproject.toml"))?;
//! repo.commit_path(Path::new("pyproject.toml"), "chore(release): 1.0.0")?;
//! repo.tag_head("v1.0.0", "Release 1.0.0")?;
//! repo.push(&[branch_refspec("main"), tag_refspec("v1.0.0")])?;
//! ```
use git2::{
    Cred, CredentialType, Direction, ErrorCode, Oid, RemoteCallbacks, Status,
    StatusOptions,
};
use log::*;
use secrecy::{ExposeSecret, SecretString};
use std::{
    env,
    path::{Path, PathBuf},
};

use crate::{
    config::GitConfig,
    error::{ReleaseError, Result},
};

/// Credential callbacks give up after this many attempts; libgit2 would
/// otherwise keep asking for ever when a credential is refused.
const MAX_AUTH_ATTEMPTS: usize = 3;

/// Refspec pushing a local branch to the same name on the remote.
pub fn branch_refspec(branch: &str) -> String {
    format!("refs/heads/{branch}:refs/heads/{branch}")
}

/// Refspec pushing a tag to the same name on the remote.
pub fn tag_refspec(tag: &str) -> String {
    format!("refs/tags/{tag}:refs/tags/{tag}")
}

/// Root of the working tree containing `path`.
pub fn discover_workdir(path: &Path) -> Result<PathBuf> {
    let repo = git2::Repository::discover(path)?;
    repo.workdir().map(Path::to_path_buf).ok_or_else(|| {
        ReleaseError::invalid_config(format!(
            "{} is a bare repository",
            repo.path().display()
        ))
    })
}

/// Local git repository used for releasing.
pub struct Repository {
    /// Name of the remote that branches and tags are pushed to.
    remote_name: String,
    /// Optional HTTPS token resolved from the environment.
    token: Option<SecretString>,
    /// The underlying git2 repository instance.
    repo: git2::Repository,
}

impl Repository {
    /// Open the repository containing `path`, searching parent directories
    /// the way `git` itself does.
    pub fn open(path: &Path, config: &GitConfig) -> Result<Self> {
        let repo = git2::Repository::discover(path)?;

        if repo.is_bare() {
            return Err(ReleaseError::invalid_config(format!(
                "{} is a bare repository",
                repo.path().display()
            )));
        }

        let token = config
            .token_env
            .as_ref()
            .and_then(|name| env::var(name).ok())
            .filter(|t| !t.is_empty())
            .map(SecretString::from);

        debug!(
            "opened repository at {} (remote: {}, token: {})",
            repo.path().display(),
            config.remote,
            if token.is_some() { "set" } else { "unset" }
        );

        Ok(Self {
            remote_name: config.remote.clone(),
            token,
            repo,
        })
    }

    /// Get the repository's working directory path.
    pub fn workdir(&self) -> Result<&Path> {
        self.repo.workdir().ok_or_else(|| {
            ReleaseError::invalid_config("repository has no working directory")
        })
    }

    /// Path of the `.git` directory.
    pub fn git_dir(&self) -> PathBuf {
        self.repo.path().to_path_buf()
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    /// Name of the checked out branch.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::DetachedHead`] when HEAD does not point at a
    /// branch, since there would be nothing sensible to push.
    pub fn current_branch(&self) -> Result<String> {
        let head = self.repo.head()?;

        if !head.is_branch() {
            return Err(ReleaseError::DetachedHead);
        }

        head.shorthand()
            .map(|s| s.to_string())
            .ok_or(ReleaseError::DetachedHead)
    }

    pub fn head_commit_id(&self) -> Result<Oid> {
        Ok(self.repo.head()?.peel_to_commit()?.id())
    }

    /// Paths with staged, unstaged or untracked changes, relative to the
    /// working directory. Ignored files are not reported.
    ///
    /// An empty list means the working tree is clean.
    pub fn dirty_paths(&self) -> Result<Vec<String>> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .exclude_submodules(true);

        let statuses = self.repo.statuses(Some(&mut opts))?;

        let paths = statuses
            .iter()
            .filter(|entry| {
                let status = entry.status();
                status != Status::CURRENT && !status.is_ignored()
            })
            .filter_map(|entry| entry.path().map(|p| p.to_string()))
            .collect::<Vec<_>>();

        debug!("dirty paths: {paths:?}");

        Ok(paths)
    }

    /// Returns true if `refs/tags/<tag>` exists locally.
    pub fn tag_exists(&self, tag: &str) -> Result<bool> {
        Ok(self.tag_ref_target(tag)?.is_some())
    }

    /// Object id the tag ref points at: the tag object for annotated tags,
    /// the commit for lightweight ones.
    pub fn tag_ref_target(&self, tag: &str) -> Result<Option<Oid>> {
        match self.repo.find_reference(&format!("refs/tags/{tag}")) {
            Ok(reference) => Ok(reference.target()),
            Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Commit a tag ultimately points at.
    pub fn tag_commit_id(&self, tag: &str) -> Result<Option<Oid>> {
        match self.repo.find_reference(&format!("refs/tags/{tag}")) {
            Ok(reference) => Ok(Some(reference.peel_to_commit()?.id())),
            Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// All local tag names, in whatever order git stores them.
    pub fn tag_names(&self) -> Result<Vec<String>> {
        let names = self.repo.tag_names(None)?;
        Ok(names.iter().flatten().map(|n| n.to_string()).collect())
    }

    /// Add a single file to the index.
    ///
    /// `path` is relative to the working directory.
    pub fn stage_path(&self, path: &Path) -> Result<()> {
        debug!("staging {}", path.display());
        let mut index = self.repo.index()?;
        index.read(false)?;
        index.add_path(path)?;
        index.write()?;
        Ok(())
    }

    /// Commit the staged version of `path`, and nothing else, on top of HEAD.
    ///
    /// The commit tree is HEAD's tree with only the index entry for `path`
    /// swapped in, so anything else the user has staged stays staged and
    /// out of the release commit. Returns `None` without committing when
    /// that tree equals HEAD's tree; an empty release commit is never
    /// created.
    ///
    /// # Git Configuration Requirements
    ///
    /// `user.name` and `user.email` must be set; they are used for both author
    /// and committer.
    pub fn commit_path(&self, path: &Path, msg: &str) -> Result<Option<Oid>> {
        let mut staged = self.repo.index()?;
        staged.read(false)?;

        let parent_commit = self.repo.head()?.peel_to_commit()?;

        let mut index = git2::Index::new()?;
        index.read_tree(&parent_commit.tree()?)?;
        if let Some(entry) = staged.get_path(path, 0) {
            index.add(&entry)?;
        }
        let tree_id = index.write_tree_to(&self.repo)?;

        if parent_commit.tree_id() == tree_id {
            info!("{} unchanged: skipping commit", path.display());
            return Ok(None);
        }

        debug!("committing {} with msg: {msg}", path.display());
        let tree = self.repo.find_tree(tree_id)?;
        let committer = self.signature()?;
        let oid = self.repo.commit(
            Some("HEAD"),
            &committer,
            &committer,
            msg,
            &tree,
            &[&parent_commit],
        )?;

        Ok(Some(oid))
    }

    /// Create an annotated tag pointing at the HEAD commit.
    ///
    /// Tags are never overwritten. If `tag` exists by the time git writes it,
    /// [`ReleaseError::TagAlreadyExists`] is returned and nothing changes.
    pub fn tag_head(&self, tag: &str, message: &str) -> Result<Oid> {
        let commit = self.repo.head()?.peel_to_commit()?;
        let tagger = self.signature()?;

        info!("tagging {} as {tag}", commit.id());

        match self.repo.tag(tag, commit.as_object(), &tagger, message, false) {
            Ok(oid) => Ok(oid),
            Err(err) if err.code() == ErrorCode::Exists => {
                Err(ReleaseError::TagAlreadyExists { tag: tag.into() })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Push refspecs to the release remote.
    ///
    /// Refspecs are pushed as given; callers never pass `+` so the remote only
    /// accepts fast-forwards. Any transport error or per-ref rejection
    /// reported by the server becomes [`ReleaseError::PushRejected`]. Pushing
    /// a ref the remote already has is a no-op.
    pub fn push(&self, refspecs: &[String]) -> Result<()> {
        info!("pushing {} to {}", refspecs.join(", "), self.remote_name);

        let mut remote = self.repo.find_remote(&self.remote_name)?;
        let mut rejections: Vec<(String, String)> = vec![];

        {
            let mut callbacks = self.auth_callbacks()?;
            callbacks.push_update_reference(|refname, status| {
                if let Some(reason) = status {
                    rejections.push((refname.to_string(), reason.to_string()));
                }
                Ok(())
            });

            let mut push_opts = git2::PushOptions::new();
            push_opts.remote_callbacks(callbacks);

            remote.push(refspecs, Some(&mut push_opts)).map_err(|err| {
                ReleaseError::push_rejected(refspecs.join(" "), err.message())
            })?;
        }

        if let Some((refname, reason)) = rejections.into_iter().next() {
            return Err(ReleaseError::push_rejected(refname, reason));
        }

        Ok(())
    }

    /// Object id of `refname` on the release remote, if present.
    pub fn remote_ref(&self, refname: &str) -> Result<Option<Oid>> {
        let mut remote = self.repo.find_remote(&self.remote_name)?;
        let callbacks = self.auth_callbacks()?;
        let connection =
            remote.connect_auth(Direction::Fetch, Some(callbacks), None)?;

        let oid = connection
            .list()?
            .iter()
            .find(|head| head.name() == refname)
            .map(|head| head.oid());

        Ok(oid)
    }

    fn signature(&self) -> Result<git2::Signature<'static>> {
        let config = self.repo.config()?.snapshot()?;
        let user = config.get_str("user.name")?;
        let email = config.get_str("user.email")?;
        debug!("using signature: user: {user}, email: {email}");
        Ok(git2::Signature::now(user, email)?)
    }

    fn auth_callbacks<'r>(&self) -> Result<RemoteCallbacks<'r>> {
        let git_config = self.repo.config()?;
        let token = self.token.clone();
        let mut attempts = 0;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username_from_url, allowed| {
            attempts += 1;
            if attempts > MAX_AUTH_ATTEMPTS {
                return Err(git2::Error::from_str(
                    "authentication failed: credentials rejected",
                ));
            }

            let username = username_from_url.unwrap_or("git");

            if allowed.contains(CredentialType::SSH_KEY) {
                return Cred::ssh_key_from_agent(username);
            }

            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                if let Some(token) = &token {
                    return Cred::userpass_plaintext(
                        username,
                        token.expose_secret(),
                    );
                }
                return Cred::credential_helper(
                    &git_config,
                    url,
                    username_from_url,
                );
            }

            Cred::default()
        });

        Ok(callbacks)
    }
}
