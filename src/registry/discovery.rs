//! Layered resource discovery.
//!
//! Three sources — user, project, package — each scan their tier root for
//! resource files. The scans run concurrently (parallel fan-out, single
//! fan-in); one failed source is reported as a warning and never aborts the
//! others. Merge applies the results to the registry in the fixed order
//! USER → PROJECT → PACKAGE → INTERNET, which together with the override
//! rule means a lower-precedence source can never clobber an
//! already-registered higher-precedence record.
//!
//! # Identifier derivation
//!
//! A discovered file named `<name>.<scheme>.md` (e.g. `writer.role.md`)
//! registers as `<scheme>://<name>` when `<scheme>` is one of the logical
//! schemes. Any other matched file registers as `resource://<relative path>`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use glob::Pattern;
use tokio::task::JoinSet;

use crate::registry::error::{ResourceError, ResourceResult};
use crate::registry::record::{Location, ResourceRecord, Scheme, SourceTier};
use crate::registry::store::{RegisterOutcome, ResourceRegistry};

/// Default within-tier priority for discovered records.
pub const DEFAULT_PRIORITY: u32 = 10;

/// The records produced by one scan of one source.
///
/// Immutable once produced; represents a single finished scan.
#[derive(Debug)]
pub struct DiscoveryResult {
    /// The tier that was scanned.
    pub tier: SourceTier,
    /// The records found, in scan order.
    pub records: Vec<ResourceRecord>,
}

/// A collaborator that scans one tier for available resources.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// The tier this source feeds.
    fn tier(&self) -> SourceTier;

    /// Performs a single scan.
    ///
    /// # Errors
    ///
    /// Returns a `DiscoverySource` error when the scan itself fails; the
    /// caller treats this as a non-fatal warning.
    async fn discover(&self) -> ResourceResult<DiscoveryResult>;
}

/// A discovery source backed by a directory tree.
#[derive(Debug)]
pub struct DirectorySource {
    tier: SourceTier,
    root: PathBuf,
    patterns: Vec<Pattern>,
    priority: u32,
}

impl DirectorySource {
    /// Creates a source scanning `root` for files matching `patterns`.
    #[must_use]
    pub fn new(tier: SourceTier, root: PathBuf, patterns: Vec<Pattern>) -> Self {
        Self {
            tier,
            root,
            patterns,
            priority: DEFAULT_PRIORITY,
        }
    }

    /// Overrides the within-tier priority assigned to discovered records.
    #[must_use]
    pub const fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    fn matches(&self, relative: &Path) -> bool {
        self.patterns.iter().any(|p| p.matches_path(relative))
    }
}

#[async_trait]
impl DiscoverySource for DirectorySource {
    fn tier(&self) -> SourceTier {
        self.tier
    }

    async fn discover(&self) -> ResourceResult<DiscoveryResult> {
        let mut records = Vec::new();

        // An absent tier root is normal (e.g. no project-level resources).
        if !self.root.exists() {
            tracing::debug!(tier = %self.tier, root = %self.root.display(), "Tier root absent, empty scan");
            return Ok(DiscoveryResult {
                tier: self.tier,
                records,
            });
        }

        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
                ResourceError::discovery_source(
                    self.tier,
                    format!("failed to read directory {}: {e}", dir.display()),
                )
            })?;

            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                ResourceError::discovery_source(
                    self.tier,
                    format!("failed to enumerate {}: {e}", dir.display()),
                )
            })? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| {
                    ResourceError::discovery_source(
                        self.tier,
                        format!("failed to stat {}: {e}", path.display()),
                    )
                })?;

                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };

                if self.matches(relative) {
                    let identifier = derive_identifier(relative);
                    records.push(ResourceRecord::new(
                        identifier,
                        Location::file(path),
                        self.tier,
                        self.priority,
                    ));
                }
            }
        }

        tracing::debug!(tier = %self.tier, count = records.len(), "Discovery scan complete");

        Ok(DiscoveryResult {
            tier: self.tier,
            records,
        })
    }
}

/// Derives a resource identifier from a path relative to the tier root.
fn derive_identifier(relative: &Path) -> String {
    if let Some(stem) = relative.file_stem().and_then(|s| s.to_str()) {
        // "writer.role" -> name "writer", suffix "role"
        if let Some((name, suffix)) = stem.rsplit_once('.') {
            if let Ok(scheme) = suffix.parse::<Scheme>() {
                if !scheme.is_tier_scheme() && !name.is_empty() {
                    return format!("{scheme}://{name}");
                }
            }
        }
    }

    // Fall back to a generic resource identifier with forward slashes.
    let rel = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("resource://{rel}")
}

/// The fan-in result of one discovery pass across all sources.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Records registered as new entries.
    pub inserted: usize,
    /// Records that overrode an existing entry.
    pub replaced: usize,
    /// Records dropped because the existing entry won.
    pub retained: usize,
    /// Non-fatal per-source failures.
    pub warnings: Vec<String>,
}

impl DiscoveryReport {
    /// Total records applied to the registry (inserted + replaced).
    #[must_use]
    pub const fn applied(&self) -> usize {
        self.inserted + self.replaced
    }
}

/// Runs every source concurrently and merges the results into the registry.
///
/// Sources run as a parallel fan-out; the single fan-in point orders the
/// results USER → PROJECT → PACKAGE → INTERNET before applying them, so the
/// merge order and the override rule agree on final precedence.
pub async fn discover_and_merge(
    sources: &[Arc<dyn DiscoverySource>],
    registry: &mut ResourceRegistry,
) -> DiscoveryReport {
    let mut set = JoinSet::new();
    for source in sources {
        let source = Arc::clone(source);
        set.spawn(async move {
            let tier = source.tier();
            (tier, source.discover().await)
        });
    }

    let mut report = DiscoveryReport::default();
    let mut results: Vec<(SourceTier, DiscoveryResult)> = Vec::new();

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((tier, Ok(result))) => results.push((tier, result)),
            Ok((tier, Err(e))) => {
                tracing::warn!(tier = %tier, error = %e, "Discovery source failed");
                report.warnings.push(e.to_string());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Discovery task panicked");
                report.warnings.push(format!("discovery task failed: {e}"));
            }
        }
    }

    // Fixed merge precedence order, independent of completion order.
    results.sort_by_key(|(tier, _)| match tier {
        SourceTier::User => 0u8,
        SourceTier::Project => 1,
        SourceTier::Package => 2,
        SourceTier::Internet => 3,
    });

    for (_, result) in results {
        for record in result.records {
            match registry.register(record) {
                RegisterOutcome::Inserted => report.inserted += 1,
                RegisterOutcome::Replaced => report.replaced += 1,
                RegisterOutcome::Retained => report.retained += 1,
            }
        }
    }

    report
}
