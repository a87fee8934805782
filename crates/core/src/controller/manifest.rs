//! Version tags and precache manifests.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Routes every portfolio build needs offline.
const DEFAULT_ROUTES: &[&str] = &["/", "/projects", "/agents", "/about", "/contact", "/resume", "/manifest.json"];

/// Name of a cache generation, e.g. `portfolio-v1`.
///
/// Exactly one store, the one named by the active tag, is current.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Result<Self, Error> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(Error::InvalidInput("version tag must not be empty".into()));
        }
        if tag.chars().any(char::is_whitespace) {
            return Err(Error::InvalidInput(format!("version tag must not contain whitespace: {tag:?}")));
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VersionTag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VersionTag> for String {
    fn from(tag: VersionTag) -> Self {
        tag.0
    }
}

/// Ordered set of paths fetched at install time.
///
/// Duplicates are dropped on construction, keeping the first occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheManifest {
    paths: Vec<String>,
}

impl PrecacheManifest {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for path in paths.into_iter().map(Into::into) {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        Self { paths: unique }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Default for PrecacheManifest {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTES.iter().copied())
    }
}
