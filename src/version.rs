//! Release version parsing and tag naming.
use log::*;
use regex::Regex;
use semver::Version;
use serde::Serialize;
use std::fmt;

use crate::error::{ReleaseError, Result};

/// Default prefix prepended to versions to build tag names.
pub const DEFAULT_TAG_PREFIX: &str = "v";

const RELEASE_VERSION_PATTERN: &str = r"^\d+\.\d+\.\d+$";

/// A `MAJOR.MINOR.PATCH` version accepted for release.
///
/// Pre-release and build metadata are rejected on input; the tool only cuts
/// plain releases.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReleaseVersion(Version);

impl ReleaseVersion {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let version_regex = Regex::new(RELEASE_VERSION_PATTERN)?;

        if !version_regex.is_match(input) {
            return Err(ReleaseError::InvalidVersion(input.into()));
        }

        // semver additionally rejects leading zeros ("01.2.3")
        let version = Version::parse(input)
            .map_err(|_| ReleaseError::InvalidVersion(input.into()))?;

        Ok(Self(version))
    }

    pub fn semver(&self) -> &Version {
        &self.0
    }

    /// Tag name for this version, e.g. `v1.2.3` for prefix `v`.
    pub fn tag_name(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.0)
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An existing repository tag that parses as a release version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseTag {
    pub name: String,
    pub version: Version,
}

/// Keep tags of the form `<prefix><semver>` and order them by semantic
/// version, ascending. Tags that don't parse are skipped.
pub fn sort_release_tags<I, S>(prefix: &str, names: I) -> Vec<ReleaseTag>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags = names
        .into_iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let stripped = name.strip_prefix(prefix)?;
            match Version::parse(stripped) {
                Ok(version) => Some(ReleaseTag {
                    name: name.to_string(),
                    version,
                }),
                Err(_) => {
                    debug!("ignoring non-release tag: {name}");
                    None
                }
            }
        })
        .collect::<Vec<_>>();

    tags.sort_by(|a, b| a.version.cmp(&b.version));
    tags
}
