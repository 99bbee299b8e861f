//! Error types for registry, discovery, and protocol resolution.

use std::io;

use thiserror::Error;

use crate::registry::record::SourceTier;

/// Result type for registry and resolver operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors that can occur while registering, discovering, or resolving
/// resources.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The identifier is not registered.
    #[error("Resource not found: {identifier}")]
    NotFound {
        /// The identifier that was looked up.
        identifier: String,
    },

    /// The identifier uses a scheme outside the fixed nine.
    #[error("Unsupported scheme: {scheme}")]
    UnsupportedScheme {
        /// The offending scheme.
        scheme: String,
    },

    /// The identifier does not have the `<scheme>://<path>` shape.
    #[error("Invalid identifier '{identifier}': {message}")]
    InvalidIdentifier {
        /// The offending identifier.
        identifier: String,
        /// Description of what's wrong.
        message: String,
    },

    /// A scheme handler located the resource but could not load its content.
    #[error("Failed to resolve content for {identifier}: {message}")]
    ContentResolution {
        /// The identifier being resolved.
        identifier: String,
        /// Description of the failure.
        message: String,
        /// Underlying I/O error if available.
        #[source]
        source: Option<io::Error>,
    },

    /// A discovery source failed its scan. Non-fatal: the other sources
    /// still merge.
    #[error("Discovery failed for {tier} tier: {message}")]
    DiscoverySource {
        /// The tier whose scan failed.
        tier: SourceTier,
        /// Description of the failure.
        message: String,
    },

    /// A command definition failed validation at registration time.
    #[error("Invalid command definition '{command}': {message}")]
    Construction {
        /// The command being registered.
        command: String,
        /// Description of what's wrong.
        message: String,
    },
}

impl ResourceError {
    /// Creates a not-found error.
    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }

    /// Creates an unsupported-scheme error.
    pub fn unsupported_scheme(scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            scheme: scheme.into(),
        }
    }

    /// Creates an invalid-identifier error.
    pub fn invalid_identifier(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    /// Creates a content-resolution error.
    pub fn content_resolution(
        identifier: impl Into<String>,
        message: impl Into<String>,
        source: Option<io::Error>,
    ) -> Self {
        Self::ContentResolution {
            identifier: identifier.into(),
            message: message.into(),
            source,
        }
    }

    /// Creates a discovery-source error.
    pub fn discovery_source(tier: SourceTier, message: impl Into<String>) -> Self {
        Self::DiscoverySource {
            tier,
            message: message.into(),
        }
    }

    /// Creates a construction error.
    pub fn construction(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construction {
            command: command.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = ResourceError::not_found("role://missing");
        assert_eq!(err.to_string(), "Resource not found: role://missing");
    }

    #[test]
    fn unsupported_scheme_display() {
        let err = ResourceError::unsupported_scheme("ftp");
        assert_eq!(err.to_string(), "Unsupported scheme: ftp");
    }

    #[test]
    fn discovery_source_display() {
        let err = ResourceError::discovery_source(SourceTier::Project, "directory unreadable");
        assert_eq!(
            err.to_string(),
            "Discovery failed for PROJECT tier: directory unreadable"
        );
    }
}
