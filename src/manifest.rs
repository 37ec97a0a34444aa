//! Version field access for `pyproject.toml` manifests.
//!
//! The document is edited through `toml_edit` so comments, ordering and
//! formatting survive the version bump.
use log::*;
use std::{
    fs::OpenOptions,
    io::{Read, Write},
    path::{Path, PathBuf},
};
use toml_edit::{DocumentMut, Item, Table, value};

use crate::error::{ReleaseError, Result};

/// Default manifest filename, relative to the repository root.
pub const DEFAULT_MANIFEST: &str = "pyproject.toml";

/// Which table in the manifest holds the version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSection {
    /// PEP 621 `[project]`
    Project,
    /// `[tool.poetry]`
    Poetry,
}

pub struct Manifest {
    path: PathBuf,
    doc: DocumentMut,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).open(path)?;
        let mut content = String::from("");
        file.read_to_string(&mut content)?;
        let doc = content.parse::<DocumentMut>()?;
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current version string stored in the manifest.
    pub fn version(&self) -> Result<String> {
        let (section, table) = self.version_table()?;

        table
            .get("version")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .ok_or_else(|| {
                ReleaseError::invalid_manifest(
                    &self.path,
                    format!("no version string in {}", section_name(section)),
                )
            })
    }

    /// Set the version in memory. Returns false when the manifest already
    /// holds `version`.
    pub fn set_version(&mut self, version: &str) -> Result<bool> {
        let current = self.version()?;

        if current == version {
            debug!(
                "{} already at version {version}: nothing to update",
                self.path.display()
            );
            return Ok(false);
        }

        let path = self.path.clone();
        let (section, table) = self.version_table_mut()?;

        info!(
            "updating {} {} version from {current} to {version}",
            path.display(),
            section_name(section)
        );

        // keep any inline comment attached to the old value
        let decor = table
            .get("version")
            .and_then(|item| item.as_value())
            .map(|v| v.decor().clone());

        table["version"] = value(version);

        if let Some(decor) = decor
            && let Some(v) = table["version"].as_value_mut()
        {
            *v.decor_mut() = decor;
        }

        Ok(true)
    }

    pub fn save(&self) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        file.write_all(self.doc.to_string().as_bytes())?;
        Ok(())
    }

    fn version_table(&self) -> Result<(VersionSection, &Table)> {
        let section = self.detect_section()?;
        let table = match section {
            VersionSection::Project => self.doc.get("project"),
            VersionSection::Poetry => self
                .doc
                .get("tool")
                .and_then(|t| t.as_table())
                .and_then(|t| t.get("poetry")),
        }
        .and_then(Item::as_table)
        .ok_or_else(|| {
            ReleaseError::invalid_manifest(&self.path, "version table missing")
        })?;

        Ok((section, table))
    }

    fn version_table_mut(&mut self) -> Result<(VersionSection, &mut Table)> {
        let section = self.detect_section()?;
        let table = match section {
            VersionSection::Project => self.doc.get_mut("project"),
            VersionSection::Poetry => self
                .doc
                .get_mut("tool")
                .and_then(|t| t.as_table_mut())
                .and_then(|t| t.get_mut("poetry")),
        }
        .and_then(Item::as_table_mut)
        .ok_or_else(|| {
            ReleaseError::invalid_manifest(&self.path, "version table missing")
        })?;

        Ok((section, table))
    }

    /// `[project]` wins over `[tool.poetry]`. A dynamic version can't be
    /// written by us, so it is an error rather than a skip.
    fn detect_section(&self) -> Result<VersionSection> {
        if let Some(project) = self.doc.get("project").and_then(Item::as_table)
        {
            if is_dynamic(project) {
                return Err(ReleaseError::invalid_manifest(
                    &self.path,
                    "[project] declares a dynamic version",
                ));
            }
            return Ok(VersionSection::Project);
        }

        if let Some(poetry) = self
            .doc
            .get("tool")
            .and_then(Item::as_table)
            .and_then(|t| t.get("poetry"))
            .and_then(Item::as_table)
        {
            if is_dynamic(poetry) {
                return Err(ReleaseError::invalid_manifest(
                    &self.path,
                    "[tool.poetry] declares a dynamic version",
                ));
            }
            return Ok(VersionSection::Poetry);
        }

        Err(ReleaseError::invalid_manifest(
            &self.path,
            "neither [project] nor [tool.poetry] found",
        ))
    }
}

fn is_dynamic(table: &Table) -> bool {
    table
        .get("dynamic")
        .and_then(|d| d.as_array())
        .map(|arr| arr.iter().any(|v| v.as_str() == Some("version")))
        .unwrap_or(false)
}

fn section_name(section: VersionSection) -> &'static str {
    match section {
        VersionSection::Project => "[project]",
        VersionSection::Poetry => "[tool.poetry]",
    }
}
