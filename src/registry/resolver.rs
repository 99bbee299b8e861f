//! Protocol resolution for `<scheme>://<path>` identifiers.
//!
//! The resolver recognises exactly nine schemes. Logical schemes (`role`,
//! `thought`, `execution`, `knowledge`, `resource`, `prompt`) resolve
//! through the registry, which is the single source of truth for tier
//! precedence; there is no separate resolution-time tier scan. Tier schemes
//! (`package`, `project`, `user`) resolve a path against that tier's root
//! directory, with an escape guard so a crafted path cannot read outside
//! the root.

use std::path::{Path, PathBuf};

use crate::registry::error::{ResourceError, ResourceResult};
use crate::registry::record::{Location, ResourceId, Scheme};
use crate::registry::store::ResourceRegistry;

/// The root directories for the three local tiers.
#[derive(Debug, Clone)]
pub struct TierRoots {
    /// User-level resource root.
    pub user: PathBuf,
    /// Project-level resource root.
    pub project: PathBuf,
    /// Package-bundled resource root.
    pub package: PathBuf,
}

impl TierRoots {
    fn for_scheme(&self, scheme: Scheme) -> Option<&Path> {
        match scheme {
            Scheme::User => Some(&self.user),
            Scheme::Project => Some(&self.project),
            Scheme::Package => Some(&self.package),
            _ => None,
        }
    }
}

/// Resolves resource identifiers to their content.
#[derive(Debug, Clone)]
pub struct ProtocolResolver {
    roots: TierRoots,
}

impl ProtocolResolver {
    /// Creates a resolver with the given tier roots.
    #[must_use]
    pub const fn new(roots: TierRoots) -> Self {
        Self { roots }
    }

    /// Resolves a fully-qualified identifier to its textual content.
    ///
    /// # Errors
    ///
    /// - `UnsupportedScheme` / `InvalidIdentifier` before any handler runs;
    /// - `NotFound` when a logical identifier has no registry record;
    /// - `ContentResolution` when the located content cannot be loaded.
    pub async fn resolve(
        &self,
        identifier: &str,
        registry: &ResourceRegistry,
    ) -> ResourceResult<String> {
        // Parse first: an unknown scheme must fail before any handler work.
        let id = ResourceId::parse(identifier)?;

        if let Some(root) = self.roots.for_scheme(id.scheme) {
            return self.resolve_tier_path(&id, root).await;
        }

        self.resolve_logical(&id, registry).await
    }

    /// Resolves a logical identifier through the registry.
    async fn resolve_logical(
        &self,
        id: &ResourceId,
        registry: &ResourceRegistry,
    ) -> ResourceResult<String> {
        let identifier = id.to_string();
        match registry.resolve(&identifier)? {
            Location::File { path } => read_content(&identifier, path).await,
            Location::Url { url } => Err(ResourceError::content_resolution(
                identifier,
                format!("remote fetch not supported for {url}"),
                None,
            )),
        }
    }

    /// Resolves a tier-scheme identifier against the tier root.
    async fn resolve_tier_path(&self, id: &ResourceId, root: &Path) -> ResourceResult<String> {
        let identifier = id.to_string();
        let candidate = root.join(&id.path);

        // Canonicalise both sides so `..` segments and symlinks cannot
        // escape the tier root.
        let canonical_root = root.canonicalize().map_err(|e| {
            ResourceError::content_resolution(
                identifier.clone(),
                format!("tier root {} is inaccessible", root.display()),
                Some(e),
            )
        })?;

        let canonical = candidate.canonicalize().map_err(|_| {
            // Report the identifier rather than the internal path layout.
            ResourceError::not_found(identifier.clone())
        })?;

        if !canonical.starts_with(&canonical_root) {
            return Err(ResourceError::content_resolution(
                identifier,
                "path escapes the tier root".to_string(),
                None,
            ));
        }

        read_content(&identifier, &canonical).await
    }
}

async fn read_content(identifier: &str, path: &Path) -> ResourceResult<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        ResourceError::content_resolution(
            identifier,
            format!("failed to read {}", path.display()),
            Some(e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::record::{ResourceRecord, SourceTier};

    fn roots(base: &Path) -> TierRoots {
        TierRoots {
            user: base.join("user"),
            project: base.join("project"),
            package: base.join("package"),
        }
    }

    #[tokio::test]
    async fn unsupported_scheme_fails_before_any_handler() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ProtocolResolver::new(roots(dir.path()));
        let registry = ResourceRegistry::new();

        let err = resolver
            .resolve("gopher://whatever", &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::UnsupportedScheme { .. }));
    }

    #[tokio::test]
    async fn logical_scheme_resolves_through_registry() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("writer.role.md");
        std::fs::write(&file, "# The Writer").unwrap();

        let mut registry = ResourceRegistry::new();
        registry.register(ResourceRecord::new(
            "role://writer",
            Location::file(&file),
            SourceTier::Package,
            10,
        ));

        let resolver = ProtocolResolver::new(roots(dir.path()));
        let content = resolver.resolve("role://writer", &registry).await.unwrap();
        assert_eq!(content, "# The Writer");
    }

    #[tokio::test]
    async fn unregistered_logical_identifier_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ProtocolResolver::new(roots(dir.path()));
        let registry = ResourceRegistry::new();

        let err = resolver
            .resolve("role://missing", &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn url_location_reports_content_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ResourceRegistry::new();
        registry.register(ResourceRecord::new(
            "prompt://remote",
            Location::url("https://example.com/prompt.md"),
            SourceTier::Internet,
            10,
        ));

        let resolver = ProtocolResolver::new(roots(dir.path()));
        let err = resolver
            .resolve("prompt://remote", &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::ContentResolution { .. }));
    }

    #[tokio::test]
    async fn tier_scheme_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let user_root = dir.path().join("user");
        std::fs::create_dir_all(user_root.join("memory")).unwrap();
        std::fs::write(user_root.join("memory/notes.md"), "remembered").unwrap();

        let resolver = ProtocolResolver::new(roots(dir.path()));
        let registry = ResourceRegistry::new();

        let content = resolver
            .resolve("user://memory/notes.md", &registry)
            .await
            .unwrap();
        assert_eq!(content, "remembered");
    }

    #[tokio::test]
    async fn tier_scheme_blocks_root_escape() {
        let dir = tempfile::tempdir().unwrap();
        let project_root = dir.path().join("project");
        std::fs::create_dir_all(&project_root).unwrap();
        std::fs::write(dir.path().join("secret.md"), "outside").unwrap();

        let resolver = ProtocolResolver::new(roots(dir.path()));
        let registry = ResourceRegistry::new();

        let err = resolver
            .resolve("project://../secret.md", &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::ContentResolution { .. }));
    }
}
