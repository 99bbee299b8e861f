//! Resource identity and record types.
//!
//! A resource is addressed by an identifier of the form `<scheme>://<path>`
//! with one of nine fixed schemes. Each registered resource carries a
//! location reference plus the metadata the override rule needs: source
//! tier, numeric priority, and registration timestamp.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::error::ResourceError;

/// The fixed set of recognised identifier schemes.
///
/// This is a closed enum by design: an identifier with any other scheme is
/// rejected at parse time and never reaches a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// A role definition (persona prompt).
    Role,
    /// A thought pattern referenced by a role.
    Thought,
    /// An execution pattern referenced by a role.
    Execution,
    /// A knowledge document referenced by a role.
    Knowledge,
    /// A generic registered resource.
    Resource,
    /// A standalone prompt fragment.
    Prompt,
    /// A path relative to the package tier root.
    Package,
    /// A path relative to the project tier root.
    Project,
    /// A path relative to the user tier root.
    User,
}

impl Scheme {
    /// All nine schemes, in documentation order.
    pub const ALL: [Self; 9] = [
        Self::Role,
        Self::Thought,
        Self::Execution,
        Self::Knowledge,
        Self::Resource,
        Self::Prompt,
        Self::Package,
        Self::Project,
        Self::User,
    ];

    /// Returns the scheme name as it appears in identifiers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Thought => "thought",
            Self::Execution => "execution",
            Self::Knowledge => "knowledge",
            Self::Resource => "resource",
            Self::Prompt => "prompt",
            Self::Package => "package",
            Self::Project => "project",
            Self::User => "user",
        }
    }

    /// Whether this scheme resolves a path against a tier root rather than
    /// through the registry.
    #[must_use]
    pub const fn is_tier_scheme(self) -> bool {
        matches!(self, Self::Package | Self::Project | Self::User)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "role" => Ok(Self::Role),
            "thought" => Ok(Self::Thought),
            "execution" => Ok(Self::Execution),
            "knowledge" => Ok(Self::Knowledge),
            "resource" => Ok(Self::Resource),
            "prompt" => Ok(Self::Prompt),
            "package" => Ok(Self::Package),
            "project" => Ok(Self::Project),
            "user" => Ok(Self::User),
            other => Err(ResourceError::unsupported_scheme(other)),
        }
    }
}

/// A parsed resource identifier: `<scheme>://<path>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// The identifier scheme.
    pub scheme: Scheme,
    /// The path component after `://`. Never empty.
    pub path: String,
}

impl ResourceId {
    /// Creates an identifier from a scheme and path.
    pub fn new(scheme: Scheme, path: impl Into<String>) -> Self {
        Self {
            scheme,
            path: path.into(),
        }
    }

    /// Parses a fully-qualified identifier.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedScheme` for a scheme outside the fixed nine and
    /// `InvalidIdentifier` when the `<scheme>://<path>` shape is malformed
    /// or the path is empty.
    pub fn parse(identifier: &str) -> Result<Self, ResourceError> {
        let (scheme_str, path) = identifier.split_once("://").ok_or_else(|| {
            ResourceError::invalid_identifier(identifier, "expected the form <scheme>://<path>")
        })?;

        let scheme: Scheme = scheme_str.parse()?;

        if path.is_empty() {
            return Err(ResourceError::invalid_identifier(
                identifier,
                "path component is empty",
            ));
        }

        Ok(Self::new(scheme, path))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.path)
    }
}

/// Precedence class of a resource's origin.
///
/// Ordering is by precedence: `User` beats `Project` beats `Package` beats
/// `Internet`, regardless of any other record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceTier {
    /// User-level resources (highest precedence).
    User,
    /// Project-level resources.
    Project,
    /// Package-bundled resources.
    Package,
    /// Remotely discovered resources (lowest precedence).
    Internet,
}

impl SourceTier {
    /// Precedence rank; a smaller rank wins.
    const fn rank(self) -> u8 {
        match self {
            Self::User => 0,
            Self::Project => 1,
            Self::Package => 2,
            Self::Internet => 3,
        }
    }

    /// Returns `true` if `self` takes precedence over `other`.
    #[must_use]
    pub const fn outranks(self, other: Self) -> bool {
        self.rank() < other.rank()
    }

    /// The tier name as displayed to clients.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Project => "PROJECT",
            Self::Package => "PACKAGE",
            Self::Internet => "INTERNET",
        }
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resource's content lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Location {
    /// A file on the local filesystem.
    File {
        /// Absolute or workspace-relative path.
        path: PathBuf,
    },
    /// A remote URL. Registered but not fetchable in this build.
    Url {
        /// The remote locator.
        url: String,
    },
}

impl Location {
    /// Creates a file location.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    /// Creates a URL location.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }
}

/// One registered resource: identity, location, and override metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Unique identifier, e.g. `role://writer`.
    pub identifier: String,
    /// Where the content lives.
    pub location: Location,
    /// Precedence class of the record's origin.
    pub tier: SourceTier,
    /// Numeric priority within a tier; smaller wins.
    pub priority: u32,
    /// When the record was registered.
    pub registered_at: DateTime<Utc>,
}

impl ResourceRecord {
    /// Creates a record stamped with the current time.
    pub fn new(
        identifier: impl Into<String>,
        location: Location,
        tier: SourceTier,
        priority: u32,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            location,
            tier,
            priority,
            registered_at: Utc::now(),
        }
    }

    /// Returns `true` if this record takes precedence over `other`.
    ///
    /// Decision order: tier, then numeric priority (smaller wins), then
    /// registration timestamp (later wins). Equal on all three counts as
    /// not-winning, so an exact duplicate leaves the existing record alone.
    #[must_use]
    pub fn wins_over(&self, other: &Self) -> bool {
        if self.tier != other.tier {
            return self.tier.outranks(other.tier);
        }
        if self.priority != other.priority {
            return self.priority < other.priority;
        }
        self.registered_at > other.registered_at
    }
}
